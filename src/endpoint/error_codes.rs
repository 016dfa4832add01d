// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Status codes shared by the radar endpoints.

#![allow(missing_docs)]

pub const BUSY: u16 = 0x0002;
pub const INCOMPATIBLE_MODE: u16 = 0x0003;
pub const TIME_OUT: u16 = 0x0004;
pub const UNSUPPORTED_FRAME_INTERVAL: u16 = 0x0005;
pub const ANTENNA_DOES_NOT_EXIST: u16 = 0x0006;
pub const SENSOR_DOES_NOT_EXIST: u16 = 0x0007;
pub const UNSUPPORTED_FRAME_FORMAT: u16 = 0x0008;
pub const FREQUENCY_OUT_OF_RANGE: u16 = 0x0009;
pub const POWER_OUT_OF_RANGE: u16 = 0x000A;
pub const UNAVAILABLE_SIGNAL_PART: u16 = 0x000B;
pub const UNSUPPORTED_DIRECTION: u16 = 0x0020;
pub const SAMPLERATE_OUT_OF_RANGE: u16 = 0x0050;
pub const UNSUPPORTED_RESOLUTION: u16 = 0x0051;
pub const UNSUPPORTED_TX_MODE: u16 = 0x0100;
pub const UNSUPPORTED_HP_GAIN: u16 = 0x0101;
pub const UNSUPPORTED_HP_CUTOFF: u16 = 0x0102;
pub const UNSUPPORTED_VGA_GAIN: u16 = 0x0103;
pub const RESET_TIMER_OUT_OF_RANGE: u16 = 0x0104;
pub const INVALID_CHARGE_PUMP_CURRENT: u16 = 0x0105;
pub const INVALID_PULSE_WIDTH: u16 = 0x0106;
pub const INVALID_FRAC_ORDER: u16 = 0x0107;
pub const INVALID_DITHER_MODE: u16 = 0x0108;
pub const INVALID_CYCLE_SLIP_MODE: u16 = 0x0109;
pub const CALIBRATION_FAILED: u16 = 0x010A;
pub const INVALID_PHASE_SETTING: u16 = 0x010B;
pub const UNDEFINED_TRACKING_MODE: u16 = 0x0110;
pub const UNDEFINED_ADC_SAMPLE_TIME: u16 = 0x0111;
pub const UNDEFINED_ADC_OVERSAMPLING: u16 = 0x0112;
pub const NONCONTINUOUS_SHAPE_SEQUENCE: u16 = 0x0120;
pub const UNSUPPORTED_NUM_REPETITIONS: u16 = 0x0121;
pub const UNSUPPORTED_POWER_MODE: u16 = 0x0122;
pub const POST_DELAY_OUT_OF_RANGE: u16 = 0x0123;
pub const NUM_FRAMES_OUT_OF_RANGE: u16 = 0x0124;
pub const SHAPE_NUMBER_OUT_OF_RANGE: u16 = 0x0125;
pub const PRECHIRPDELAY_OUT_OF_RANGE: u16 = 0x0126;
pub const POSTCHIRPDELAY_OUT_OF_RANGE: u16 = 0x0127;
pub const PADELAY_OUT_OF_RANGE: u16 = 0x0128;
pub const ADCDELAY_OUT_OF_RANGE: u16 = 0x0129;
pub const WAKEUPTIME_OUT_OF_RANGE: u16 = 0x012A;
pub const SETTLETIME_OUT_OF_RANGE: u16 = 0x012B;
pub const UNSUPPORTED_FIFO_SLICE_SIZE: u16 = 0x012C;
pub const SLICES_NOT_RELEASABLE: u16 = 0x012D;
pub const FIFO_OVERFLOW: u16 = 0x012E;
pub const NO_MEMORY: u16 = 0x012F;
pub const SPI_SEQUENCE_MISMATCH: u16 = 0x0130;
pub const CHIP_SETUP_FAILED: u16 = 0x0131;
pub const FIFO_MEMORY_TEST_FAILED: u16 = 0x0132;
pub const UNSUPPORTED_DEVICE: u16 = 0x0133;
pub const FEATURE_NOT_SUPPORTED: u16 = 0x0134;
pub const PA_DELAY_SHORTER_THAN_PRECHIRP: u16 = 0x0135;
pub const INVALID_REGISTER_OVERRIDE: u16 = 0x0136;

/// Human readable description of a radar endpoint status code.
pub fn description(code: u16) -> &'static str {
    match code {
        BUSY => "The device is busy. Maybe test mode or automatic trigger is active.",
        INCOMPATIBLE_MODE => {
            "The requested operation is not supported by the currently active mode of operation."
        }
        TIME_OUT => "A timeout has occurred while waiting for a data frame to be acquired.",
        UNSUPPORTED_FRAME_INTERVAL => "The requested time interval is out of range.",
        ANTENNA_DOES_NOT_EXIST => {
            "One or more of the selected antennas is not present on the device."
        }
        SENSOR_DOES_NOT_EXIST => "The requested temperature sensor does not exist.",
        UNSUPPORTED_FRAME_FORMAT => "The specified frame format is not supported.",
        FREQUENCY_OUT_OF_RANGE => "The specified RF frequency is out of range.",
        POWER_OUT_OF_RANGE => "The specified TX power is out of range.",
        UNAVAILABLE_SIGNAL_PART => {
            "The device is not capable to capture the requested part of the complex signal."
        }
        UNSUPPORTED_DIRECTION => "The specified FMCW ramp direction is not supported by the device.",
        SAMPLERATE_OUT_OF_RANGE => "The specified sampling rate is out of range.",
        UNSUPPORTED_RESOLUTION => "The specified ADC resolution is out of range.",
        UNSUPPORTED_TX_MODE => "The specified TX mode is not supported by the device.",
        UNSUPPORTED_HP_GAIN => "The specified high pass filter gain is not supported by the device.",
        UNSUPPORTED_HP_CUTOFF => {
            "The specified high pass filter cutoff frequency is not supported by the device."
        }
        UNSUPPORTED_VGA_GAIN => {
            "The specified gain adjustment setting is not supported by the device."
        }
        RESET_TIMER_OUT_OF_RANGE => "The specified reset timer period is out of range.",
        INVALID_CHARGE_PUMP_CURRENT => "The specified charge pump current is out of range.",
        INVALID_PULSE_WIDTH => "The specified charge pump pulse width is not defined.",
        INVALID_FRAC_ORDER => "The specified modulator order is not defined.",
        INVALID_DITHER_MODE => "The specified dither mode is not defined.",
        INVALID_CYCLE_SLIP_MODE => "The specified cycle slip reduction mode is not defined.",
        CALIBRATION_FAILED => {
            "The calibration of phase settings or base band chain did not succeed."
        }
        INVALID_PHASE_SETTING => {
            "The provided oscillator phase setting is not valid. It's forbidden to disable both phase modulators."
        }
        UNDEFINED_TRACKING_MODE => "The specified ADC tracking mode is not supported by the device.",
        UNDEFINED_ADC_SAMPLE_TIME => {
            "The specified ADC sampling time is not supported by the device."
        }
        UNDEFINED_ADC_OVERSAMPLING => {
            "The specified ADC oversampling factors is not supported by the device."
        }
        NONCONTINUOUS_SHAPE_SEQUENCE => {
            "The specified shape sequence is not supported. There must not be a gap between used shapes."
        }
        UNSUPPORTED_NUM_REPETITIONS => {
            "One or more specified number of repetition is not supported. Only powers of two are allowed. Total numbers of shape groups must not exceed 4096."
        }
        UNSUPPORTED_POWER_MODE => "One or more of the specified power modes is not supported.",
        POST_DELAY_OUT_OF_RANGE => {
            "One or more of the specified post shape / post shape set delays is not supported."
        }
        NUM_FRAMES_OUT_OF_RANGE => "The specified number of frames is out of range.",
        SHAPE_NUMBER_OUT_OF_RANGE => "The requested shape does not exist.",
        PRECHIRPDELAY_OUT_OF_RANGE => "The specified pre-chirp delay is out of range.",
        POSTCHIRPDELAY_OUT_OF_RANGE => "The specified post-chirp delay is out of range.",
        PADELAY_OUT_OF_RANGE => "The specified PA delay is out of range.",
        ADCDELAY_OUT_OF_RANGE => "The specified ADC delay is out of range.",
        WAKEUPTIME_OUT_OF_RANGE => "The specified wake up time is out of range.",
        SETTLETIME_OUT_OF_RANGE => "The specified PLL settle time is out of range.",
        UNSUPPORTED_FIFO_SLICE_SIZE => "The specified FIFO slice size is not supported.",
        SLICES_NOT_RELEASABLE => "The FIFO slice can't be released. It has not been used.",
        FIFO_OVERFLOW => "A FIFO overflow has occurred. A reset is needed.",
        NO_MEMORY => "No memory buffer has been provided to store the radar data.",
        SPI_SEQUENCE_MISMATCH => "The received SPI data sequence does not match the expected one.",
        CHIP_SETUP_FAILED => "The chip could not be programmed.",
        FIFO_MEMORY_TEST_FAILED => "The On-Chip FIFO memory test faild.",
        UNSUPPORTED_DEVICE => "The Device is not supported by the driver.",
        FEATURE_NOT_SUPPORTED => "The requested feature is not supported by the connected device.",
        PA_DELAY_SHORTER_THAN_PRECHIRP => "The PA Delay is shorter than the pre chirp delay.",
        INVALID_REGISTER_OVERRIDE => "The register selected for override does not exist.",
        _ => "Unknown Error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptions() {
        assert_eq!(
            description(FREQUENCY_OUT_OF_RANGE),
            "The specified RF frequency is out of range."
        );
        assert_eq!(
            description(0x0125),
            "The requested shape does not exist."
        );
        assert_eq!(description(0x0001), "Unknown Error");
        assert_eq!(description(0x7777), "Unknown Error");
    }
}
