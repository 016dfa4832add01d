// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Endpoint registry and response dispatch.
//!
//! The device reports its endpoints as `(type, version)` pairs when a
//! connection is established. Each pair is matched against the definitions
//! known to this crate, which supply the payload decoder and the status code
//! descriptions for that endpoint. Decoded responses are handed to the
//! callbacks registered in [`Callbacks`].

use crate::protocol::Error;
use std::fmt;

/// Radar base endpoint: frame acquisition and front end control
pub mod base;
/// Calibration data stored on the device
pub mod calibration;
/// Status codes shared by all radar endpoints
pub mod error_codes;
/// FMCW chirp configuration
pub mod fmcw;
/// On-device target detection
pub mod target_detection;

/// Boxed callback receiving the endpoint number and the decoded value.
pub type Callback<T> = Box<dyn FnMut(u8, &T) + Send>;

/// The endpoint types this crate can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    /// Radar base endpoint
    RadarBase,
    /// FMCW configuration endpoint
    Fmcw,
    /// Target detection endpoint
    TargetDetection,
    /// Calibration endpoint
    Calibration,
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EndpointKind::RadarBase => write!(f, "radar-base"),
            EndpointKind::Fmcw => write!(f, "fmcw"),
            EndpointKind::TargetDetection => write!(f, "target-detection"),
            EndpointKind::Calibration => write!(f, "calibration"),
        }
    }
}

/// Static description of an endpoint type.
#[derive(Debug, PartialEq, Eq)]
pub struct Definition {
    /// Endpoint kind
    pub kind: EndpointKind,
    /// 32-bit type code reported by the device, four ASCII characters
    pub type_code: u32,
    /// Oldest supported endpoint version
    pub min_version: u16,
    /// Newest supported endpoint version
    pub max_version: u16,
    /// Human readable endpoint name
    pub description: &'static str,
}

impl Definition {
    /// True if the reported type and version are handled by this definition.
    pub fn supports(&self, type_code: u32, version: u16) -> bool {
        self.type_code == type_code && (self.min_version..=self.max_version).contains(&version)
    }

    /// Decodes a payload received from an endpoint of this type.
    ///
    /// Malformed or unknown payloads yield `None`.
    pub fn decode(&self, payload: &[u8]) -> Option<Response> {
        match self.kind {
            EndpointKind::RadarBase => base::decode(payload).map(Response::RadarBase),
            EndpointKind::Fmcw => fmcw::decode(payload).map(Response::Fmcw),
            EndpointKind::TargetDetection => {
                target_detection::decode(payload).map(Response::TargetDetection)
            }
            EndpointKind::Calibration => calibration::decode(payload).map(Response::Calibration),
        }
    }

    /// Describes a status code reported by an endpoint of this type.
    pub fn status_description(&self, code: u16) -> &'static str {
        error_codes::description(code)
    }
}

/// All endpoint types known to this crate.
pub static KNOWN_ENDPOINTS: [&Definition; 4] = [
    &base::DEFINITION,
    &fmcw::DEFINITION,
    &target_detection::DEFINITION,
    &calibration::DEFINITION,
];

/// Looks up the definition handling an endpoint reported by the device.
pub fn find_definition(type_code: u32, version: u16) -> Option<&'static Definition> {
    KNOWN_ENDPOINTS
        .iter()
        .copied()
        .find(|def| def.supports(type_code, version))
}

/// Renders a type code as its four character tag, e.g. `RBAS`.
pub fn type_tag(type_code: u32) -> String {
    type_code
        .to_be_bytes()
        .iter()
        .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
        .collect()
}

/// A decoded payload from any known endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Radar base endpoint response
    RadarBase(base::Response),
    /// FMCW endpoint response
    Fmcw(fmcw::Response),
    /// Target detection endpoint response
    TargetDetection(target_detection::Response),
    /// Calibration endpoint response
    Calibration(calibration::Response),
}

/// Callbacks for all endpoint types of a connection.
///
/// ```no_run
/// # async fn example(conn: &mut ifxradar::Connection<tokio::io::DuplexStream>) {
/// conn.callbacks_mut()
///     .radar_base
///     .set_callback_temperature(|endpoint, temperature| {
///         println!("endpoint {} sensor {}: {}", endpoint, temperature.sensor, temperature.celsius());
///     });
/// # }
/// ```
#[derive(Default)]
pub struct Callbacks {
    /// Radar base endpoint callbacks
    pub radar_base: base::Callbacks,
    /// FMCW endpoint callbacks
    pub fmcw: fmcw::Callbacks,
    /// Target detection endpoint callbacks
    pub target_detection: target_detection::Callbacks,
    /// Calibration endpoint callbacks
    pub calibration: calibration::Callbacks,
}

impl Callbacks {
    pub(crate) fn dispatch(&mut self, endpoint: u8, response: &Response) {
        match response {
            Response::RadarBase(r) => self.radar_base.dispatch(endpoint, r),
            Response::Fmcw(r) => self.fmcw.dispatch(endpoint, r),
            Response::TargetDetection(r) => self.target_detection.dispatch(endpoint, r),
            Response::Calibration(r) => self.calibration.dispatch(endpoint, r),
        }
    }
}

pub(crate) fn call<T>(callback: &mut Option<Callback<T>>, endpoint: u8, value: &T) {
    if let Some(callback) = callback {
        callback(endpoint, value);
    }
}

/// Picks the first response `pick` accepts from a request's responses.
pub(crate) fn take_response<T>(
    responses: Vec<Response>,
    what: &'static str,
    pick: impl FnMut(Response) -> Option<T>,
) -> Result<T, Error> {
    responses
        .into_iter()
        .find_map(pick)
        .ok_or(Error::MissingResponse(what))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_definition() {
        let def = find_definition(0x52424153, 1).unwrap();
        assert_eq!(def.kind, EndpointKind::RadarBase);
        assert_eq!(def.description, "ifxRadarBase");

        let def = find_definition(0x52544443, 1).unwrap();
        assert_eq!(def.kind, EndpointKind::TargetDetection);

        assert!(find_definition(0x52424153, 2).is_none());
        assert!(find_definition(0x12345678, 1).is_none());
    }

    #[test]
    fn test_type_tag() {
        assert_eq!(type_tag(base::DEFINITION.type_code), "RBAS");
        assert_eq!(type_tag(calibration::DEFINITION.type_code), "RCAL");
        assert_eq!(type_tag(0x52440001), "RD..");
    }

    #[test]
    fn test_dispatch_reaches_endpoint_callbacks() {
        use std::sync::{Arc, Mutex};

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut callbacks = Callbacks::default();
        let sink = seen.clone();
        callbacks
            .fmcw
            .set_callback_bandwidth_per_second(move |ep, bw| sink.lock().unwrap().push((ep, *bw)));

        let response = fmcw::DEFINITION.decode(&[0x02, 0xE8, 0x03, 0x00, 0x00]).unwrap();
        callbacks.dispatch(2, &response);

        // Responses for other endpoint types do not reach it.
        let other = base::DEFINITION
            .decode(&[0x37, 0x10, 0x27, 0x00, 0x00])
            .unwrap();
        callbacks.dispatch(1, &other);

        assert_eq!(*seen.lock().unwrap(), vec![(2, 1000)]);
    }
}
