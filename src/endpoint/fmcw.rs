// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use super::{call, take_response, Callback, Definition, EndpointKind};
use crate::{
    connection::Connection,
    protocol::{le_u32, Error, Transport},
};
use log::warn;
use std::fmt;

/// FMCW endpoint, type code `RFMC`.
pub static DEFINITION: Definition = Definition {
    kind: EndpointKind::Fmcw,
    type_code: 0x52464D43,
    min_version: 1,
    max_version: 1,
    description: "ifxRadar FMCW",
};

const MSG_GET_CONFIGURATION: u8 = 0x00;
const MSG_SET_CONFIGURATION: u8 = 0x01;
const MSG_GET_BW_PER_SECOND: u8 = 0x02;
const MSG_SET_BW_PER_SECOND: u8 = 0x02;

/// Direction of the frequency ramps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ChirpDirection {
    /// Rising frequency only.
    UpchirpOnly = 0,
    /// Falling frequency only.
    DownchirpOnly = 1,
    /// Alternating, starting with a rising chirp.
    AlternatingFirstUp = 2,
    /// Alternating, starting with a falling chirp.
    AlternatingFirstDown = 3,
}

impl TryFrom<u8> for ChirpDirection {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ChirpDirection::UpchirpOnly),
            1 => Ok(ChirpDirection::DownchirpOnly),
            2 => Ok(ChirpDirection::AlternatingFirstUp),
            3 => Ok(ChirpDirection::AlternatingFirstDown),
            _ => Err(value),
        }
    }
}

impl fmt::Display for ChirpDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChirpDirection::UpchirpOnly => write!(f, "upchirp-only"),
            ChirpDirection::DownchirpOnly => write!(f, "downchirp-only"),
            ChirpDirection::AlternatingFirstUp => write!(f, "alternating-first-up"),
            ChirpDirection::AlternatingFirstDown => write!(f, "alternating-first-down"),
        }
    }
}

/// FMCW ramp configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Configuration {
    /// Start frequency in kHz
    pub lower_frequency_khz: u32,
    /// End frequency in kHz
    pub upper_frequency_khz: u32,
    /// Ramp direction
    pub direction: ChirpDirection,
    /// TX power setting
    pub tx_power: u8,
}

impl Configuration {
    /// Swept bandwidth in kHz.
    pub fn bandwidth_khz(&self) -> u32 {
        self.upper_frequency_khz
            .saturating_sub(self.lower_frequency_khz)
    }

    /// Center frequency in kHz.
    pub fn center_frequency_khz(&self) -> u32 {
        ((self.lower_frequency_khz as u64 + self.upper_frequency_khz as u64) / 2) as u32
    }

    fn encode(&self) -> Vec<u8> {
        let mut msg = Vec::with_capacity(11);
        msg.push(MSG_SET_CONFIGURATION);
        msg.extend_from_slice(&self.lower_frequency_khz.to_le_bytes());
        msg.extend_from_slice(&self.upper_frequency_khz.to_le_bytes());
        msg.push(self.direction as u8);
        msg.push(self.tx_power);
        msg
    }
}

/// Responses of the FMCW endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Current ramp configuration
    Configuration(Configuration),
    /// Bandwidth per second in MHz/s
    BandwidthPerSecond(u32),
}

/// Decodes an FMCW payload.
pub fn decode(payload: &[u8]) -> Option<Response> {
    match (*payload.first()?, payload.len()) {
        (MSG_SET_BW_PER_SECOND, 5) => Some(Response::BandwidthPerSecond(le_u32(payload, 1))),
        (MSG_SET_CONFIGURATION, 11) => {
            let direction = match ChirpDirection::try_from(payload[9]) {
                Ok(direction) => direction,
                Err(direction) => {
                    warn!("unknown chirp direction {}", direction);
                    return None;
                }
            };
            Some(Response::Configuration(Configuration {
                lower_frequency_khz: le_u32(payload, 1),
                upper_frequency_khz: le_u32(payload, 5),
                direction,
                tx_power: payload[10],
            }))
        }
        _ => None,
    }
}

/// Callbacks for FMCW responses.
#[derive(Default)]
pub struct Callbacks {
    fmcw_configuration: Option<Callback<Configuration>>,
    bandwidth_per_second: Option<Callback<u32>>,
}

impl Callbacks {
    /// Called when the device reports its ramp configuration.
    pub fn set_callback_fmcw_configuration(
        &mut self,
        f: impl FnMut(u8, &Configuration) + Send + 'static,
    ) {
        self.fmcw_configuration = Some(Box::new(f));
    }

    /// Called with the bandwidth per second in MHz/s.
    pub fn set_callback_bandwidth_per_second(
        &mut self,
        f: impl FnMut(u8, &u32) + Send + 'static,
    ) {
        self.bandwidth_per_second = Some(Box::new(f));
    }

    /// Removes all FMCW callbacks.
    pub fn clear(&mut self) {
        *self = Callbacks::default();
    }

    pub(crate) fn dispatch(&mut self, endpoint: u8, response: &Response) {
        match response {
            Response::Configuration(v) => call(&mut self.fmcw_configuration, endpoint, v),
            Response::BandwidthPerSecond(v) => call(&mut self.bandwidth_per_second, endpoint, v),
        }
    }
}

fn pick(response: super::Response) -> Option<Response> {
    match response {
        super::Response::Fmcw(response) => Some(response),
        _ => None,
    }
}

/// Checks that the endpoint is a supported FMCW endpoint.
pub fn is_compatible_endpoint<T: Transport>(
    conn: &Connection<T>,
    endpoint: u8,
) -> Result<(), Error> {
    conn.is_endpoint_compatible(endpoint, &DEFINITION)
}

/// Changes the ramp configuration.
pub async fn set_fmcw_configuration<T: Transport>(
    conn: &mut Connection<T>,
    endpoint: u8,
    config: &Configuration,
) -> Result<(), Error> {
    conn.send_and_receive(endpoint, &DEFINITION, &config.encode())
        .await?;
    Ok(())
}

/// Queries the ramp configuration.
pub async fn get_fmcw_configuration<T: Transport>(
    conn: &mut Connection<T>,
    endpoint: u8,
) -> Result<Configuration, Error> {
    let responses = conn
        .send_and_receive(endpoint, &DEFINITION, &[MSG_GET_CONFIGURATION])
        .await?;
    take_response(responses, "fmcw configuration", |r| match pick(r)? {
        Response::Configuration(v) => Some(v),
        _ => None,
    })
}

/// Queries the bandwidth per second in MHz/s.
pub async fn get_bandwidth_per_second<T: Transport>(
    conn: &mut Connection<T>,
    endpoint: u8,
) -> Result<u32, Error> {
    let responses = conn
        .send_and_receive(endpoint, &DEFINITION, &[MSG_GET_BW_PER_SECOND])
        .await?;
    take_response(responses, "bandwidth per second", |r| match pick(r)? {
        Response::BandwidthPerSecond(v) => Some(v),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_encoding() {
        let config = Configuration {
            lower_frequency_khz: 58_000_000,
            upper_frequency_khz: 63_000_000,
            direction: ChirpDirection::AlternatingFirstUp,
            tx_power: 31,
        };
        let msg = config.encode();
        assert_eq!(msg.len(), 11);
        assert_eq!(msg[0], 0x01);
        assert_eq!(msg[9], 2);
        assert_eq!(decode(&msg), Some(Response::Configuration(config)));
        assert_eq!(config.bandwidth_khz(), 5_000_000);
        assert_eq!(config.center_frequency_khz(), 60_500_000);
    }

    #[test]
    fn test_decode() {
        assert_eq!(
            decode(&[0x02, 0x10, 0x27, 0x00, 0x00]),
            Some(Response::BandwidthPerSecond(10_000))
        );

        // a get request echoed back is not a response
        assert_eq!(decode(&[0x00]), None);

        let mut msg = vec![0x01];
        msg.extend_from_slice(&[0; 8]);
        msg.extend_from_slice(&[9, 0]);
        assert_eq!(decode(&msg), None);
    }
}
