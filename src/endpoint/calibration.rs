// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use super::{call, take_response, Callback, Definition, EndpointKind};
use crate::{
    connection::Connection,
    protocol::{le_i16, le_u16, Error, Transport},
};
use log::warn;
use std::fmt;

/// Calibration endpoint, type code `RCAL`.
pub static DEFINITION: Definition = Definition {
    kind: EndpointKind::Calibration,
    type_code: 0x5243414C,
    min_version: 1,
    max_version: 1,
    description: "ifxRadar Calibration",
};

const MSG_SET_ADC_FLASH: u8 = 0x01;
const MSG_GET_ADC_FLASH: u8 = 0x02;
const MSG_CLEAR_ADC_FLASH: u8 = 0x03;
const MSG_SET_ADC_SRAM: u8 = 0x04;
const MSG_GET_ADC_SRAM: u8 = 0x05;
const MSG_CLEAR_ADC_SRAM: u8 = 0x06;
const MSG_SET_ALGO_FLASH: u8 = 0x07;
const MSG_GET_ALGO_FLASH: u8 = 0x08;
const MSG_CLEAR_ALGO_FLASH: u8 = 0x09;
const MSG_SET_ALGO_SRAM: u8 = 0x0A;
const MSG_GET_ALGO_SRAM: u8 = 0x0B;
const MSG_CLEAR_ALGO_SRAM: u8 = 0x0C;

const ADC_HEADER_LEN: usize = 3;
const ADC_SAMPLE_MASK: u16 = (1 << 12) - 1;

/// Where calibration data is kept on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Storage {
    /// Persistent flash memory.
    Flash,
    /// Volatile memory, lost on reset.
    Sram,
}

impl fmt::Display for Storage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Storage::Flash => write!(f, "flash"),
            Storage::Sram => write!(f, "sram"),
        }
    }
}

/// Range and angle offsets applied by the target detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlgoCalibration {
    /// Distance offset in cm
    pub distance_offset_cm: u16,
    /// Angle offset in degrees
    pub angle_offset_deg: i16,
}

/// ADC calibration samples as stored on the device.
#[derive(Debug, Clone, PartialEq)]
pub struct AdcCalibration {
    /// Storage the data was read from
    pub storage: Storage,
    /// Samples normalized to 0.0..=1.0
    pub samples: Vec<f32>,
}

/// Algorithm calibration as stored on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredAlgoCalibration {
    /// Storage the data was read from
    pub storage: Storage,
    /// Calibration values
    pub calibration: AlgoCalibration,
}

/// Responses of the calibration endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// ADC calibration data
    AdcCalibration(AdcCalibration),
    /// Algorithm calibration data
    AlgoCalibration(StoredAlgoCalibration),
}

/// Decodes a calibration payload.
pub fn decode(payload: &[u8]) -> Option<Response> {
    let size = payload.len();

    match *payload.first()? {
        code @ (MSG_GET_ADC_FLASH | MSG_GET_ADC_SRAM) if size >= ADC_HEADER_LEN => {
            let count = le_u16(payload, 1) as usize / 2;
            if size != ADC_HEADER_LEN + 2 * count {
                warn!("dropping adc calibration of {} bytes for {} samples", size, count);
                return None;
            }
            let storage = if code == MSG_GET_ADC_FLASH {
                Storage::Flash
            } else {
                Storage::Sram
            };
            let samples = payload[ADC_HEADER_LEN..]
                .chunks_exact(2)
                .map(|s| {
                    let value = u16::from_le_bytes([s[0], s[1]]) & ADC_SAMPLE_MASK;
                    value as f32 / ADC_SAMPLE_MASK as f32
                })
                .collect();
            Some(Response::AdcCalibration(AdcCalibration { storage, samples }))
        }
        code @ (MSG_GET_ALGO_FLASH | MSG_GET_ALGO_SRAM) if size == 5 => {
            let storage = if code == MSG_GET_ALGO_FLASH {
                Storage::Flash
            } else {
                Storage::Sram
            };
            Some(Response::AlgoCalibration(StoredAlgoCalibration {
                storage,
                calibration: AlgoCalibration {
                    distance_offset_cm: le_u16(payload, 1),
                    angle_offset_deg: le_i16(payload, 3),
                },
            }))
        }
        _ => None,
    }
}

/// Callbacks for calibration responses.
#[derive(Default)]
pub struct Callbacks {
    adc_calibration_data: Option<Callback<AdcCalibration>>,
    algo_calibration_data: Option<Callback<StoredAlgoCalibration>>,
}

impl Callbacks {
    /// Called with ADC calibration data read from the device.
    pub fn set_callback_adc_calibration_data(
        &mut self,
        f: impl FnMut(u8, &AdcCalibration) + Send + 'static,
    ) {
        self.adc_calibration_data = Some(Box::new(f));
    }

    /// Called with algorithm calibration data read from the device.
    pub fn set_callback_algo_calibration_data(
        &mut self,
        f: impl FnMut(u8, &StoredAlgoCalibration) + Send + 'static,
    ) {
        self.algo_calibration_data = Some(Box::new(f));
    }

    /// Removes all calibration callbacks.
    pub fn clear(&mut self) {
        *self = Callbacks::default();
    }

    pub(crate) fn dispatch(&mut self, endpoint: u8, response: &Response) {
        match response {
            Response::AdcCalibration(v) => call(&mut self.adc_calibration_data, endpoint, v),
            Response::AlgoCalibration(v) => call(&mut self.algo_calibration_data, endpoint, v),
        }
    }
}

fn pick(response: super::Response) -> Option<Response> {
    match response {
        super::Response::Calibration(response) => Some(response),
        _ => None,
    }
}

/// Checks that the endpoint is a supported calibration endpoint.
pub fn is_compatible_endpoint<T: Transport>(
    conn: &Connection<T>,
    endpoint: u8,
) -> Result<(), Error> {
    conn.is_endpoint_compatible(endpoint, &DEFINITION)
}

/// Captures ADC calibration data and stores it.
pub async fn set_adc_calibration_data<T: Transport>(
    conn: &mut Connection<T>,
    endpoint: u8,
    storage: Storage,
) -> Result<(), Error> {
    let code = match storage {
        Storage::Flash => MSG_SET_ADC_FLASH,
        Storage::Sram => MSG_SET_ADC_SRAM,
    };
    conn.send_and_receive(endpoint, &DEFINITION, &[code]).await?;
    Ok(())
}

/// Reads stored ADC calibration data.
pub async fn get_adc_calibration_data<T: Transport>(
    conn: &mut Connection<T>,
    endpoint: u8,
    storage: Storage,
) -> Result<AdcCalibration, Error> {
    let code = match storage {
        Storage::Flash => MSG_GET_ADC_FLASH,
        Storage::Sram => MSG_GET_ADC_SRAM,
    };
    let responses = conn.send_and_receive(endpoint, &DEFINITION, &[code]).await?;
    take_response(responses, "adc calibration", |r| match pick(r)? {
        Response::AdcCalibration(v) => Some(v),
        _ => None,
    })
}

/// Erases stored ADC calibration data.
pub async fn clear_adc_calibration_data<T: Transport>(
    conn: &mut Connection<T>,
    endpoint: u8,
    storage: Storage,
) -> Result<(), Error> {
    let code = match storage {
        Storage::Flash => MSG_CLEAR_ADC_FLASH,
        Storage::Sram => MSG_CLEAR_ADC_SRAM,
    };
    conn.send_and_receive(endpoint, &DEFINITION, &[code]).await?;
    Ok(())
}

/// Stores algorithm calibration values.
pub async fn set_algo_calibration_data<T: Transport>(
    conn: &mut Connection<T>,
    endpoint: u8,
    storage: Storage,
    calibration: &AlgoCalibration,
) -> Result<(), Error> {
    let code = match storage {
        Storage::Flash => MSG_SET_ALGO_FLASH,
        Storage::Sram => MSG_SET_ALGO_SRAM,
    };
    let mut msg = vec![code];
    msg.extend_from_slice(&calibration.distance_offset_cm.to_le_bytes());
    msg.extend_from_slice(&calibration.angle_offset_deg.to_le_bytes());
    conn.send_and_receive(endpoint, &DEFINITION, &msg).await?;
    Ok(())
}

/// Reads stored algorithm calibration values.
pub async fn get_algo_calibration_data<T: Transport>(
    conn: &mut Connection<T>,
    endpoint: u8,
    storage: Storage,
) -> Result<AlgoCalibration, Error> {
    let code = match storage {
        Storage::Flash => MSG_GET_ALGO_FLASH,
        Storage::Sram => MSG_GET_ALGO_SRAM,
    };
    let responses = conn.send_and_receive(endpoint, &DEFINITION, &[code]).await?;
    take_response(responses, "algo calibration", |r| match pick(r)? {
        Response::AlgoCalibration(v) => Some(v.calibration),
        _ => None,
    })
}

/// Erases stored algorithm calibration values.
pub async fn clear_algo_calibration_data<T: Transport>(
    conn: &mut Connection<T>,
    endpoint: u8,
    storage: Storage,
) -> Result<(), Error> {
    let code = match storage {
        Storage::Flash => MSG_CLEAR_ALGO_FLASH,
        Storage::Sram => MSG_CLEAR_ALGO_SRAM,
    };
    conn.send_and_receive(endpoint, &DEFINITION, &[code]).await?;
    Ok(())
}
