// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use super::{call, take_response, Callback, Definition, EndpointKind};
use crate::{
    connection::Connection,
    protocol::{c_string, le_i32, le_u32, Error, Transport},
};
use log::warn;
use num::Complex;
use std::fmt;

/// Radar base endpoint, type code `RBAS`.
pub static DEFINITION: Definition = Definition {
    kind: EndpointKind::RadarBase,
    type_code: 0x52424153,
    min_version: 1,
    max_version: 1,
    description: "ifxRadarBase",
};

const MSG_FRAME_DATA: u8 = 0x00;
const MSG_GET_FRAME_DATA: u8 = 0x01;
const MSG_SET_AUTOMATIC_TRIGGER: u8 = 0x02;
const MSG_ENABLE_TEST_MODE: u8 = 0x03;
const MSG_GET_DRIVER_VERSION: u8 = 0x20;
const MSG_SET_DRIVER_VERSION: u8 = 0x21;
const MSG_GET_DEVICE_INFO: u8 = 0x22;
const MSG_SET_DEVICE_INFO: u8 = 0x23;
const MSG_GET_TEMPERATURE: u8 = 0x30;
const MSG_SET_TEMPERATURE: u8 = 0x31;
const MSG_GET_TX_POWER: u8 = 0x32;
const MSG_SET_TX_POWER: u8 = 0x33;
const MSG_GET_CHIRP_DURATION: u8 = 0x34;
const MSG_SET_CHIRP_DURATION: u8 = 0x35;
const MSG_GET_MIN_INTERVAL: u8 = 0x36;
const MSG_SET_MIN_INTERVAL: u8 = 0x37;
const MSG_GET_FRAME_FORMAT: u8 = 0x40;
const MSG_SET_FRAME_FORMAT: u8 = 0x41;

const FRAME_HEADER_LEN: usize = 18;
const DEVICE_INFO_HEADER_LEN: usize = 17;

/// Sample layout of the acquired radar data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxDataFormat {
    /// Only the I or the Q signal is captured.
    Real = 0,
    /// I and Q are captured in separate blocks.
    Complex = 1,
    /// I and Q are captured in one block of interleaved pairs.
    ComplexInterleaved = 2,
}

impl TryFrom<u8> for RxDataFormat {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RxDataFormat::Real),
            1 => Ok(RxDataFormat::Complex),
            2 => Ok(RxDataFormat::ComplexInterleaved),
            _ => Err(value),
        }
    }
}

impl RxDataFormat {
    /// Number of values captured per sample.
    pub fn values_per_sample(&self) -> usize {
        match self {
            RxDataFormat::Real => 1,
            RxDataFormat::Complex | RxDataFormat::ComplexInterleaved => 2,
        }
    }
}

/// The part of the complex base band signal to capture.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum SignalPart {
    /// Only the I signal.
    OnlyI = 0,
    /// Only the Q signal.
    OnlyQ = 1,
    /// Both signals.
    IAndQ = 2,
}

impl TryFrom<u8> for SignalPart {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SignalPart::OnlyI),
            1 => Ok(SignalPart::OnlyQ),
            2 => Ok(SignalPart::IAndQ),
            _ => Err(value),
        }
    }
}

impl fmt::Display for SignalPart {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SignalPart::OnlyI => write!(f, "only-i"),
            SignalPart::OnlyQ => write!(f, "only-q"),
            SignalPart::IAndQ => write!(f, "i-and-q"),
        }
    }
}

/// One frame of raw radar data.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Running frame counter
    pub frame_number: u32,
    /// Number of chirps in the frame
    pub num_chirps: u32,
    /// Number of enabled RX antennas
    pub num_rx_antennas: u8,
    /// Samples per chirp and antenna
    pub samples_per_chirp: u32,
    /// Bit mask of the enabled RX antennas
    pub rx_mask: u8,
    /// Layout of the sample data
    pub data_format: RxDataFormat,
    /// ADC resolution in bits
    pub adc_resolution: u8,
    /// Antennas are interleaved sample by sample
    pub interleaved_rx: bool,
    /// Samples normalized to the range 0.0 to 1.0
    pub samples: Vec<f32>,
}

impl Frame {
    /// Returns the samples of one chirp captured by the n-th enabled antenna.
    ///
    /// Real valued frames have a zero imaginary part.
    pub fn chirp(&self, chirp: usize, antenna: usize) -> Option<Vec<Complex<f32>>> {
        let n = self.samples_per_chirp as usize;
        let rx = self.num_rx_antennas as usize;
        if chirp >= self.num_chirps as usize || antenna >= rx {
            return None;
        }

        let start = chirp * rx * n * self.data_format.values_per_sample();
        let frame = self.samples.get(start..)?;

        (0..n)
            .map(|s| {
                let (re, im) = match (self.interleaved_rx, self.data_format) {
                    (false, RxDataFormat::Real) => (antenna * n + s, None),
                    (false, RxDataFormat::Complex) => {
                        (2 * antenna * n + s, Some((2 * antenna + 1) * n + s))
                    }
                    (false, RxDataFormat::ComplexInterleaved) => {
                        let i = 2 * (antenna * n + s);
                        (i, Some(i + 1))
                    }
                    (true, RxDataFormat::Real) => (s * rx + antenna, None),
                    (true, RxDataFormat::Complex) => {
                        (s * rx + antenna, Some((n + s) * rx + antenna))
                    }
                    (true, RxDataFormat::ComplexInterleaved) => {
                        let i = 2 * (s * rx + antenna);
                        (i, Some(i + 1))
                    }
                };
                let re = *frame.get(re)?;
                let im = match im {
                    Some(im) => *frame.get(im)?,
                    None => 0.0,
                };
                Some(Complex::new(re, im))
            })
            .collect()
    }
}

/// Version of the radar driver running on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverVersion {
    /// Major version
    pub major: u8,
    /// Minor version
    pub minor: u8,
    /// Revision
    pub revision: u8,
}

impl fmt::Display for DriverVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)
    }
}

/// Capabilities of the radar front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Human readable device name
    pub description: String,
    /// Lowest supported RF frequency in kHz
    pub min_rf_frequency_khz: u32,
    /// Highest supported RF frequency in kHz
    pub max_rf_frequency_khz: u32,
    /// Number of TX antennas
    pub num_tx_antennas: u8,
    /// Number of RX antennas
    pub num_rx_antennas: u8,
    /// Highest TX power setting
    pub max_tx_power: u8,
    /// Number of temperature sensors
    pub num_temp_sensors: u8,
    /// Hardware major version
    pub major_version_hw: u8,
    /// Hardware minor version
    pub minor_version_hw: u8,
    /// Antennas are interleaved sample by sample in frame data
    pub interleaved_rx: bool,
    /// Sample layout of frame data
    pub data_format: RxDataFormat,
}

/// Shape of the radar frames to acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameFormat {
    /// Samples per chirp and antenna
    pub num_samples_per_chirp: u32,
    /// Chirps per frame
    pub num_chirps_per_frame: u32,
    /// Bit mask of the enabled RX antennas
    pub rx_mask: u8,
    /// Signal part to capture
    pub signal_part: SignalPart,
}

impl FrameFormat {
    fn encode(&self) -> Vec<u8> {
        let mut msg = Vec::with_capacity(11);
        msg.push(MSG_SET_FRAME_FORMAT);
        msg.extend_from_slice(&self.num_samples_per_chirp.to_le_bytes());
        msg.extend_from_slice(&self.num_chirps_per_frame.to_le_bytes());
        msg.push(self.rx_mask);
        msg.push(self.signal_part as u8);
        msg
    }
}

/// A temperature sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Temperature {
    /// Sensor number
    pub sensor: u8,
    /// Temperature in 0.001 °C
    pub millidegrees: i32,
}

impl Temperature {
    /// Temperature in °C.
    pub fn celsius(&self) -> f32 {
        self.millidegrees as f32 / 1000.0
    }
}

/// TX power of one antenna.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxPower {
    /// Antenna number
    pub antenna: u8,
    /// Power in 0.001 dBm
    pub millidbm: i32,
}

impl TxPower {
    /// Power in dBm.
    pub fn dbm(&self) -> f32 {
        self.millidbm as f32 / 1000.0
    }
}

/// Parameters of the continuous wave test mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestMode {
    /// Bit mask of the TX antennas to enable
    pub tx_mask: u8,
    /// Bit mask of the RX antennas to enable
    pub rx_mask: u8,
    /// RF frequency in kHz
    pub frequency_khz: u32,
    /// TX power setting
    pub tx_power: u8,
}

/// Responses of the radar base endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Acquired frame data
    Frame(Frame),
    /// Driver version
    DriverVersion(DriverVersion),
    /// Device capabilities
    DeviceInfo(DeviceInfo),
    /// Current frame format
    FrameFormat(FrameFormat),
    /// Temperature reading
    Temperature(Temperature),
    /// TX power
    TxPower(TxPower),
    /// Chirp duration in ns
    ChirpDuration(u32),
    /// Minimum frame interval in µs
    MinFrameInterval(u32),
}

/// Decodes a radar base payload.
pub fn decode(payload: &[u8]) -> Option<Response> {
    let size = payload.len();

    match *payload.first()? {
        MSG_FRAME_DATA if size >= FRAME_HEADER_LEN => decode_frame(payload).map(Response::Frame),
        MSG_SET_TEMPERATURE if size == 6 => Some(Response::Temperature(Temperature {
            sensor: payload[1],
            millidegrees: le_i32(payload, 2),
        })),
        MSG_SET_TX_POWER if size == 6 => Some(Response::TxPower(TxPower {
            antenna: payload[1],
            millidbm: le_i32(payload, 2),
        })),
        MSG_SET_CHIRP_DURATION if size == 5 => {
            Some(Response::ChirpDuration(le_u32(payload, 1)))
        }
        MSG_SET_MIN_INTERVAL if size == 5 => Some(Response::MinFrameInterval(le_u32(payload, 1))),
        MSG_SET_FRAME_FORMAT if size == 11 => {
            let signal_part = match SignalPart::try_from(payload[10]) {
                Ok(part) => part,
                Err(part) => {
                    warn!("unknown signal part {}", part);
                    return None;
                }
            };
            Some(Response::FrameFormat(FrameFormat {
                num_samples_per_chirp: le_u32(payload, 1),
                num_chirps_per_frame: le_u32(payload, 5),
                rx_mask: payload[9],
                signal_part,
            }))
        }
        MSG_SET_DEVICE_INFO if size >= DEVICE_INFO_HEADER_LEN => {
            let data_format = match RxDataFormat::try_from(payload[16]) {
                Ok(format) => format,
                Err(format) => {
                    warn!("unknown rx data format {}", format);
                    return None;
                }
            };
            Some(Response::DeviceInfo(DeviceInfo {
                description: c_string(&payload[DEVICE_INFO_HEADER_LEN..]),
                min_rf_frequency_khz: le_u32(payload, 1),
                max_rf_frequency_khz: le_u32(payload, 5),
                num_tx_antennas: payload[9],
                num_rx_antennas: payload[10],
                max_tx_power: payload[11],
                num_temp_sensors: payload[12],
                major_version_hw: payload[13],
                minor_version_hw: payload[14],
                interleaved_rx: payload[15] != 0,
                data_format,
            }))
        }
        MSG_SET_DRIVER_VERSION if size == 4 => Some(Response::DriverVersion(DriverVersion {
            major: payload[1],
            minor: payload[2],
            revision: payload[3],
        })),
        _ => None,
    }
}

fn decode_frame(payload: &[u8]) -> Option<Frame> {
    let num_chirps = le_u32(payload, 5);
    let num_rx_antennas = payload[9];
    let samples_per_chirp = le_u32(payload, 10);
    let adc_resolution = payload[16];

    let data_format = match RxDataFormat::try_from(payload[15]) {
        Ok(format) => format,
        Err(format) => {
            warn!("dropping frame with unknown data format {}", format);
            return None;
        }
    };

    if !(1..=16).contains(&adc_resolution) {
        warn!("dropping frame with adc resolution {}", adc_resolution);
        return None;
    }

    // Header fields come straight from the device, reject sizes that overflow.
    let sizes = (num_chirps as u64)
        .checked_mul(samples_per_chirp as u64)
        .and_then(|n| n.checked_mul(num_rx_antennas as u64))
        .and_then(|n| n.checked_mul(data_format.values_per_sample() as u64))
        .and_then(|total| {
            let bits = total.checked_mul(adc_resolution as u64)?;
            let expected = (FRAME_HEADER_LEN as u64).checked_add(bits.div_ceil(8))?;
            Some((total, expected))
        });
    let Some((total_samples, expected)) = sizes else {
        warn!(
            "dropping frame with oversized header: {} chirps of {} samples",
            num_chirps, samples_per_chirp
        );
        return None;
    };
    if payload.len() as u64 != expected {
        warn!(
            "dropping frame of {} bytes, expected {}",
            payload.len(),
            expected
        );
        return None;
    }

    Some(Frame {
        frame_number: le_u32(payload, 1),
        num_chirps,
        num_rx_antennas,
        samples_per_chirp,
        rx_mask: payload[14],
        data_format,
        adc_resolution,
        interleaved_rx: payload[17] != 0,
        samples: unpack_samples(
            &payload[FRAME_HEADER_LEN..],
            total_samples as usize,
            adc_resolution,
        ),
    })
}

/// Unpacks LSB-first bit packed samples and normalizes them to 0.0..=1.0.
fn unpack_samples(data: &[u8], count: usize, resolution: u8) -> Vec<f32> {
    let mask = (1u32 << resolution) - 1;
    let norm = 1.0 / mask as f32;

    (0..count)
        .map(|n| {
            let bit = n * resolution as usize;
            let byte = bit / 8;
            let mut window = [0u8; 4];
            let available = data.len().saturating_sub(byte).min(4);
            window[..available].copy_from_slice(&data[byte..byte + available]);
            let value = (u32::from_le_bytes(window) >> (bit % 8)) & mask;
            value as f32 * norm
        })
        .collect()
}

/// Callbacks for radar base responses.
#[derive(Default)]
pub struct Callbacks {
    data_frame: Option<Callback<Frame>>,
    driver_version: Option<Callback<DriverVersion>>,
    device_info: Option<Callback<DeviceInfo>>,
    frame_format: Option<Callback<FrameFormat>>,
    temperature: Option<Callback<Temperature>>,
    tx_power: Option<Callback<TxPower>>,
    chirp_duration: Option<Callback<u32>>,
    min_frame_interval: Option<Callback<u32>>,
}

impl Callbacks {
    /// Called for every received radar frame.
    pub fn set_callback_data_frame(&mut self, f: impl FnMut(u8, &Frame) + Send + 'static) {
        self.data_frame = Some(Box::new(f));
    }

    /// Called when the device reports its driver version.
    pub fn set_callback_driver_version(
        &mut self,
        f: impl FnMut(u8, &DriverVersion) + Send + 'static,
    ) {
        self.driver_version = Some(Box::new(f));
    }

    /// Called when the device reports its capabilities.
    pub fn set_callback_device_info(&mut self, f: impl FnMut(u8, &DeviceInfo) + Send + 'static) {
        self.device_info = Some(Box::new(f));
    }

    /// Called when the device reports its frame format.
    pub fn set_callback_frame_format(
        &mut self,
        f: impl FnMut(u8, &FrameFormat) + Send + 'static,
    ) {
        self.frame_format = Some(Box::new(f));
    }

    /// Called for every temperature reading.
    pub fn set_callback_temperature(
        &mut self,
        f: impl FnMut(u8, &Temperature) + Send + 'static,
    ) {
        self.temperature = Some(Box::new(f));
    }

    /// Called when the device reports an antenna's TX power.
    pub fn set_callback_tx_power(&mut self, f: impl FnMut(u8, &TxPower) + Send + 'static) {
        self.tx_power = Some(Box::new(f));
    }

    /// Called with the chirp duration in ns.
    pub fn set_callback_chirp_duration(&mut self, f: impl FnMut(u8, &u32) + Send + 'static) {
        self.chirp_duration = Some(Box::new(f));
    }

    /// Called with the minimum frame interval in µs.
    pub fn set_callback_min_frame_interval(&mut self, f: impl FnMut(u8, &u32) + Send + 'static) {
        self.min_frame_interval = Some(Box::new(f));
    }

    /// Removes all radar base callbacks.
    pub fn clear(&mut self) {
        *self = Callbacks::default();
    }

    pub(crate) fn dispatch(&mut self, endpoint: u8, response: &Response) {
        match response {
            Response::Frame(v) => call(&mut self.data_frame, endpoint, v),
            Response::DriverVersion(v) => call(&mut self.driver_version, endpoint, v),
            Response::DeviceInfo(v) => call(&mut self.device_info, endpoint, v),
            Response::FrameFormat(v) => call(&mut self.frame_format, endpoint, v),
            Response::Temperature(v) => call(&mut self.temperature, endpoint, v),
            Response::TxPower(v) => call(&mut self.tx_power, endpoint, v),
            Response::ChirpDuration(v) => call(&mut self.chirp_duration, endpoint, v),
            Response::MinFrameInterval(v) => call(&mut self.min_frame_interval, endpoint, v),
        }
    }
}

fn pick(response: super::Response) -> Option<Response> {
    match response {
        super::Response::RadarBase(response) => Some(response),
        _ => None,
    }
}

/// Checks that the endpoint is a supported radar base endpoint.
pub fn is_compatible_endpoint<T: Transport>(
    conn: &Connection<T>,
    endpoint: u8,
) -> Result<(), Error> {
    conn.is_endpoint_compatible(endpoint, &DEFINITION)
}

/// Acquires one frame of radar data.
///
/// Without `wait` the device fails with a time out status if no frame is
/// ready.
pub async fn get_frame_data<T: Transport>(
    conn: &mut Connection<T>,
    endpoint: u8,
    wait: bool,
) -> Result<Frame, Error> {
    let responses = conn
        .send_and_receive(endpoint, &DEFINITION, &[MSG_GET_FRAME_DATA, wait as u8])
        .await?;
    take_response(responses, "frame data", |r| match pick(r)? {
        Response::Frame(frame) => Some(frame),
        _ => None,
    })
}

/// Starts acquiring frames every `interval_us`, 0 stops the trigger.
///
/// Frames are delivered to the data frame callback as they arrive, see
/// [`Connection::poll`].
pub async fn set_automatic_frame_trigger<T: Transport>(
    conn: &mut Connection<T>,
    endpoint: u8,
    interval_us: u32,
) -> Result<(), Error> {
    let mut msg = vec![MSG_SET_AUTOMATIC_TRIGGER];
    msg.extend_from_slice(&interval_us.to_le_bytes());
    conn.send_and_receive(endpoint, &DEFINITION, &msg).await?;
    Ok(())
}

/// Transmits a continuous wave for RF measurements.
pub async fn enable_test_mode<T: Transport>(
    conn: &mut Connection<T>,
    endpoint: u8,
    mode: &TestMode,
) -> Result<(), Error> {
    let mut msg = Vec::with_capacity(8);
    msg.push(MSG_ENABLE_TEST_MODE);
    msg.push(mode.tx_mask);
    msg.push(mode.rx_mask);
    msg.extend_from_slice(&mode.frequency_khz.to_le_bytes());
    msg.push(mode.tx_power);
    conn.send_and_receive(endpoint, &DEFINITION, &msg).await?;
    Ok(())
}

/// Queries the radar driver version.
pub async fn get_driver_version<T: Transport>(
    conn: &mut Connection<T>,
    endpoint: u8,
) -> Result<DriverVersion, Error> {
    let responses = conn
        .send_and_receive(endpoint, &DEFINITION, &[MSG_GET_DRIVER_VERSION])
        .await?;
    take_response(responses, "driver version", |r| match pick(r)? {
        Response::DriverVersion(v) => Some(v),
        _ => None,
    })
}

/// Queries the front end capabilities.
pub async fn get_device_info<T: Transport>(
    conn: &mut Connection<T>,
    endpoint: u8,
) -> Result<DeviceInfo, Error> {
    let responses = conn
        .send_and_receive(endpoint, &DEFINITION, &[MSG_GET_DEVICE_INFO])
        .await?;
    take_response(responses, "device info", |r| match pick(r)? {
        Response::DeviceInfo(v) => Some(v),
        _ => None,
    })
}

/// Changes the frame format.
pub async fn set_frame_format<T: Transport>(
    conn: &mut Connection<T>,
    endpoint: u8,
    format: &FrameFormat,
) -> Result<(), Error> {
    conn.send_and_receive(endpoint, &DEFINITION, &format.encode())
        .await?;
    Ok(())
}

/// Queries the current frame format.
pub async fn get_frame_format<T: Transport>(
    conn: &mut Connection<T>,
    endpoint: u8,
) -> Result<FrameFormat, Error> {
    let responses = conn
        .send_and_receive(endpoint, &DEFINITION, &[MSG_GET_FRAME_FORMAT])
        .await?;
    take_response(responses, "frame format", |r| match pick(r)? {
        Response::FrameFormat(v) => Some(v),
        _ => None,
    })
}

/// Reads a temperature sensor.
pub async fn get_temperature<T: Transport>(
    conn: &mut Connection<T>,
    endpoint: u8,
    sensor: u8,
) -> Result<Temperature, Error> {
    let responses = conn
        .send_and_receive(endpoint, &DEFINITION, &[MSG_GET_TEMPERATURE, sensor])
        .await?;
    take_response(responses, "temperature", |r| match pick(r)? {
        Response::Temperature(v) => Some(v),
        _ => None,
    })
}

/// Queries the TX power of an antenna.
pub async fn get_tx_power<T: Transport>(
    conn: &mut Connection<T>,
    endpoint: u8,
    antenna: u8,
) -> Result<TxPower, Error> {
    let responses = conn
        .send_and_receive(endpoint, &DEFINITION, &[MSG_GET_TX_POWER, antenna])
        .await?;
    take_response(responses, "tx power", |r| match pick(r)? {
        Response::TxPower(v) => Some(v),
        _ => None,
    })
}

/// Queries the chirp duration in ns.
pub async fn get_chirp_duration<T: Transport>(
    conn: &mut Connection<T>,
    endpoint: u8,
) -> Result<u32, Error> {
    let responses = conn
        .send_and_receive(endpoint, &DEFINITION, &[MSG_GET_CHIRP_DURATION])
        .await?;
    take_response(responses, "chirp duration", |r| match pick(r)? {
        Response::ChirpDuration(v) => Some(v),
        _ => None,
    })
}

/// Queries the minimum frame interval in µs.
pub async fn get_min_frame_interval<T: Transport>(
    conn: &mut Connection<T>,
    endpoint: u8,
) -> Result<u32, Error> {
    let responses = conn
        .send_and_receive(endpoint, &DEFINITION, &[MSG_GET_MIN_INTERVAL])
        .await?;
    take_response(responses, "min frame interval", |r| match pick(r)? {
        Response::MinFrameInterval(v) => Some(v),
        _ => None,
    })
}
