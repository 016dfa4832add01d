// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Connection to a radar device.
//!
//! A [`Connection`] owns the transport for its whole lifetime. Opening one
//! queries the endpoint table of the device, every request afterwards is
//! checked against that table before it is sent.

use crate::{
    endpoint::{find_definition, type_tag, Callbacks, Definition, EndpointKind, Response},
    protocol::{
        device_status, read_message, send_message, Error, Message, Transport, DEFAULT_TIMEOUT,
    },
};
use log::{debug, trace, warn};
use std::{fmt, time::Duration};
use tokio::io::AsyncWriteExt;

const MSG_QUERY_ENDPOINTS: u8 = 0x00;
const MSG_ENDPOINT_INFO: u8 = 0x00;
const MSG_QUERY_FW_INFO: u8 = 0x01;
const MSG_FW_INFO: u8 = 0x01;
const MSG_FIRMWARE_RESET: u8 = 0x02;

const ENDPOINT_RECORD_LEN: usize = 6;
const FW_INFO_HEADER_LEN: usize = 7;

/// An endpoint reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointInfo {
    /// Endpoint number, starting at 1
    pub number: u8,
    /// Type code, four ASCII characters
    pub type_code: u32,
    /// Endpoint version
    pub version: u16,
    /// Matching definition, `None` for endpoints this crate does not know
    pub definition: Option<&'static Definition>,
}

impl EndpointInfo {
    /// Human readable endpoint name, empty for unknown endpoints.
    pub fn description(&self) -> &'static str {
        self.definition.map(|def| def.description).unwrap_or("")
    }
}

impl fmt::Display for EndpointInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}: {} v{} {}",
            self.number,
            type_tag(self.type_code),
            self.version,
            self.description()
        )
    }
}

/// Firmware version and description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareInformation {
    /// Firmware name reported by the device
    pub description: String,
    /// Major version
    pub version_major: u16,
    /// Minor version
    pub version_minor: u16,
    /// Build number
    pub version_build: u16,
}

impl fmt::Display for FirmwareInformation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            self.version_major, self.version_minor, self.version_build
        )
    }
}

/// An open connection to a radar device.
pub struct Connection<T: Transport> {
    transport: T,
    endpoints: Vec<EndpointInfo>,
    callbacks: Callbacks,
    timeout: Duration,
}

impl<T: Transport> Connection<T> {
    /// Opens a connection with the default receive timeout.
    ///
    /// Fails with [`Error::DeviceNotCompatible`] when the device does not
    /// answer the endpoint discovery.
    pub async fn connect(transport: T) -> Result<Self, Error> {
        Self::connect_with_timeout(transport, DEFAULT_TIMEOUT).await
    }

    /// Opens a connection waiting at most `timeout` for each read.
    pub async fn connect_with_timeout(transport: T, timeout: Duration) -> Result<Self, Error> {
        let mut conn = Connection {
            transport,
            endpoints: Vec::new(),
            callbacks: Callbacks::default(),
            timeout,
        };

        conn.endpoints = conn.query_endpoints().await.map_err(|err| match err {
            Error::DeviceNotCompatible(_) => err,
            err => Error::DeviceNotCompatible(err.to_string()),
        })?;

        for ep in &conn.endpoints {
            debug!("endpoint {}", ep);
        }

        Ok(conn)
    }

    async fn query_endpoints(&mut self) -> Result<Vec<EndpointInfo>, Error> {
        send_message(&mut self.transport, 0, &[MSG_QUERY_ENDPOINTS]).await?;

        let payload = self.expect_payload().await?;
        if payload.len() < 2 || payload[0] != MSG_ENDPOINT_INFO {
            return Err(Error::DeviceNotCompatible(format!(
                "unexpected endpoint list {:02X?}",
                payload
            )));
        }

        let count = payload[1] as usize;
        if count == 0 || payload.len() != 2 + ENDPOINT_RECORD_LEN * count {
            return Err(Error::DeviceNotCompatible(format!(
                "endpoint list of {} bytes for {} endpoints",
                payload.len(),
                count
            )));
        }

        let endpoints = payload[2..]
            .chunks_exact(ENDPOINT_RECORD_LEN)
            .enumerate()
            .map(|(n, record)| {
                let type_code = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
                let version = u16::from_le_bytes([record[4], record[5]]);
                EndpointInfo {
                    number: n as u8 + 1,
                    type_code,
                    version,
                    definition: find_definition(type_code, version),
                }
            })
            .collect();

        self.expect_ok().await?;
        Ok(endpoints)
    }

    /// Reads a payload message from endpoint 0.
    async fn expect_payload(&mut self) -> Result<Vec<u8>, Error> {
        match read_message(&mut self.transport, self.timeout).await? {
            Message::Payload {
                endpoint: 0,
                payload,
            } => Ok(payload),
            msg => Err(Error::DeviceNotCompatible(format!(
                "unexpected message {:?}",
                msg
            ))),
        }
    }

    /// Reads the status message terminating a request to endpoint 0.
    async fn expect_ok(&mut self) -> Result<(), Error> {
        match read_message(&mut self.transport, self.timeout).await? {
            Message::Status {
                endpoint: 0,
                code: device_status::OK,
            } => Ok(()),
            Message::Status { endpoint: 0, code } => Err(Error::Status {
                endpoint: 0,
                code,
                description: protocol_status_description(code),
            }),
            msg => Err(Error::DeviceNotCompatible(format!(
                "unexpected message {:?}",
                msg
            ))),
        }
    }

    /// Number of endpoints reported by the device.
    pub fn num_endpoints(&self) -> usize {
        self.endpoints.len()
    }

    /// All endpoints reported by the device.
    pub fn endpoints(&self) -> &[EndpointInfo] {
        &self.endpoints
    }

    /// Information about endpoint `endpoint`, numbered from 1.
    pub fn endpoint_info(&self, endpoint: u8) -> Result<&EndpointInfo, Error> {
        (endpoint as usize)
            .checked_sub(1)
            .and_then(|n| self.endpoints.get(n))
            .ok_or(Error::EndpointDoesNotExist(endpoint))
    }

    /// Checks that `endpoint` is of the definition's type and version range.
    pub fn is_endpoint_compatible(&self, endpoint: u8, definition: &Definition) -> Result<(), Error> {
        let info = self.endpoint_info(endpoint)?;

        if info.type_code != definition.type_code {
            Err(Error::EndpointWrongType(endpoint))
        } else if info.version < definition.min_version {
            Err(Error::EndpointVersionTooOld(endpoint))
        } else if info.version > definition.max_version {
            Err(Error::EndpointVersionTooNew(endpoint))
        } else {
            Ok(())
        }
    }

    /// Number of the first compatible endpoint of the given kind.
    pub fn find_endpoint(&self, kind: EndpointKind) -> Option<u8> {
        self.endpoints
            .iter()
            .find(|ep| ep.definition.is_some_and(|def| def.kind == kind))
            .map(|ep| ep.number)
    }

    /// Describes a status code of the given endpoint.
    pub fn status_code_description(&self, endpoint: u8, code: u16) -> &'static str {
        if endpoint == 0 || code == device_status::OK {
            return protocol_status_description(code);
        }

        match self.endpoint_info(endpoint) {
            Ok(EndpointInfo {
                definition: Some(def),
                ..
            }) => def.status_description(code),
            Ok(_) => "Unknown Error",
            Err(_) => "Invalid Endpoint.",
        }
    }

    /// Queries the firmware version and description.
    pub async fn firmware_information(&mut self) -> Result<FirmwareInformation, Error> {
        send_message(&mut self.transport, 0, &[MSG_QUERY_FW_INFO]).await?;

        let payload = self.expect_payload().await?;
        if payload.len() < FW_INFO_HEADER_LEN || payload[0] != MSG_FW_INFO {
            return Err(Error::MissingResponse("firmware information"));
        }

        let description = String::from_utf8_lossy(&payload[FW_INFO_HEADER_LEN..])
            .trim_end_matches('\0')
            .to_string();
        let info = FirmwareInformation {
            description,
            version_major: u16::from_le_bytes([payload[1], payload[2]]),
            version_minor: u16::from_le_bytes([payload[3], payload[4]]),
            version_build: u16::from_le_bytes([payload[5], payload[6]]),
        };

        self.expect_ok().await?;
        Ok(info)
    }

    /// Resets the device. The connection is unusable afterwards.
    pub async fn firmware_reset(&mut self) -> Result<(), Error> {
        send_message(&mut self.transport, 0, &[MSG_FIRMWARE_RESET]).await?;
        self.expect_ok().await
    }

    /// Sends a request to an endpoint and collects its responses.
    ///
    /// Every payload received before the terminating status message is
    /// decoded, handed to the registered callbacks and returned.
    pub async fn send_and_receive(
        &mut self,
        endpoint: u8,
        definition: &Definition,
        payload: &[u8],
    ) -> Result<Vec<Response>, Error> {
        self.is_endpoint_compatible(endpoint, definition)?;
        send_message(&mut self.transport, endpoint, payload).await?;

        let mut responses = Vec::new();
        loop {
            match read_message(&mut self.transport, self.timeout).await? {
                Message::Payload { endpoint, payload } => {
                    if let Some(response) = self.dispatch(endpoint, &payload) {
                        responses.push(response);
                    }
                }
                Message::Status { endpoint, code } => {
                    return if code == device_status::OK {
                        Ok(responses)
                    } else {
                        Err(Error::Status {
                            endpoint,
                            code,
                            description: self.status_code_description(endpoint, code),
                        })
                    };
                }
            }
        }
    }

    /// Waits for one unsolicited message, such as a frame from the automatic
    /// trigger, and dispatches it.
    ///
    /// Returns `None` when nothing arrived within the timeout or the message
    /// could not be decoded.
    pub async fn poll(&mut self) -> Result<Option<Response>, Error> {
        match read_message(&mut self.transport, self.timeout).await {
            Ok(Message::Payload { endpoint, payload }) => Ok(self.dispatch(endpoint, &payload)),
            Ok(Message::Status {
                code: device_status::OK,
                ..
            }) => Ok(None),
            Ok(Message::Status { endpoint, code }) => Err(Error::Status {
                endpoint,
                code,
                description: self.status_code_description(endpoint, code),
            }),
            Err(Error::NoMessage) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn dispatch(&mut self, endpoint: u8, payload: &[u8]) -> Option<Response> {
        let definition = match self.endpoint_info(endpoint) {
            Ok(EndpointInfo {
                definition: Some(def),
                ..
            }) => *def,
            _ => {
                trace!("ignoring payload from endpoint {}", endpoint);
                return None;
            }
        };

        let response = definition.decode(payload);
        match &response {
            Some(response) => self.callbacks.dispatch(endpoint, response),
            None => warn!(
                "undecodable payload from endpoint {}: {:02X?}",
                endpoint,
                &payload[..payload.len().min(16)]
            ),
        }
        response
    }

    /// Callbacks receiving every decoded response.
    pub fn callbacks_mut(&mut self) -> &mut Callbacks {
        &mut self.callbacks
    }

    /// Receive timeout for each read.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Changes the receive timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Shuts the transport down.
    pub async fn disconnect(mut self) -> Result<(), Error> {
        self.transport.shutdown().await?;
        Ok(())
    }

    /// Releases the transport without shutting it down.
    pub fn into_inner(self) -> T {
        self.transport
    }
}

/// Describes a status code reported by endpoint 0.
pub fn protocol_status_description(code: u16) -> &'static str {
    match code {
        device_status::OK => "No Error.",
        device_status::TIME_OUT => {
            "A time out occured during message transmission from host to device."
        }
        device_status::BAD_MESSAGE_START => {
            "The device received a message with a bad start sequence."
        }
        device_status::BAD_ENDPOINT_ID => {
            "The device received a message for a non existing endpoint."
        }
        device_status::NO_PAYLOAD => "The device received a data message without payload.",
        device_status::OUT_OF_MEMORY => {
            "The device's memory is not sufficient to process the receive data message."
        }
        device_status::BAD_PAYLOAD_END => "The device received a message with a bad end sequence.",
        device_status::BAD_COMMAND => {
            "The device received a message at endpoint 0 that could not be understood."
        }
        _ => "Unknown Error",
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        endpoint::{
            base::{self, tests::frame_payload, RxDataFormat},
            calibration, error_codes,
            target_detection::{self, tests::target_payload, Target},
        },
        protocol::{encode_payload_message, encode_status_message},
    };
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    pub(crate) const TIMEOUT: Duration = Duration::from_millis(50);

    const ENDPOINTS: [(u32, u16); 3] = [
        (0x52424153, 1),
        (0x52544443, 1),
        (0x52440001, 3),
    ];

    pub(crate) fn endpoint_list(endpoints: &[(u32, u16)]) -> Vec<u8> {
        let mut payload = vec![MSG_ENDPOINT_INFO, endpoints.len() as u8];
        for (type_code, version) in endpoints {
            payload.extend_from_slice(&type_code.to_le_bytes());
            payload.extend_from_slice(&version.to_le_bytes());
        }
        payload
    }

    pub(crate) async fn reply(device: &mut DuplexStream, endpoint: u8, payloads: &[&[u8]], status: u16) {
        for payload in payloads {
            let msg = encode_payload_message(endpoint, payload).unwrap();
            device.write_all(&msg).await.unwrap();
        }
        device
            .write_all(&encode_status_message(endpoint, status))
            .await
            .unwrap();
    }

    pub(crate) async fn request(device: &mut DuplexStream) -> (u8, Vec<u8>) {
        let mut header = [0u8; 4];
        device.read_exact(&mut header).await.unwrap();
        assert_eq!(header[0], 0x5A);
        let mut payload = vec![0u8; u16::from_le_bytes([header[2], header[3]]) as usize];
        device.read_exact(&mut payload).await.unwrap();
        let mut tail = [0u8; 2];
        device.read_exact(&mut tail).await.unwrap();
        assert_eq!(tail, [0xDB, 0xE0]);
        (header[1], payload)
    }

    async fn connected() -> (Connection<DuplexStream>, DuplexStream) {
        let (host, mut device) = tokio::io::duplex(1 << 16);
        reply(&mut device, 0, &[&endpoint_list(&ENDPOINTS)], 0).await;
        let conn = Connection::connect_with_timeout(host, TIMEOUT).await.unwrap();
        assert_eq!(request(&mut device).await, (0, vec![0x00]));
        (conn, device)
    }

    #[tokio::test]
    async fn test_connect_lists_endpoints() {
        let (conn, _device) = connected().await;

        assert_eq!(conn.num_endpoints(), 3);
        assert_eq!(conn.timeout(), TIMEOUT);

        let info = conn.endpoint_info(1).unwrap();
        assert_eq!(info.description(), "ifxRadarBase");
        assert_eq!(info.to_string(), "1: RBAS v1 ifxRadarBase");

        let info = conn.endpoint_info(3).unwrap();
        assert_eq!(info.version, 3);
        assert!(info.definition.is_none());
        assert_eq!(info.description(), "");

        assert!(matches!(
            conn.endpoint_info(0),
            Err(Error::EndpointDoesNotExist(0))
        ));
        assert!(matches!(
            conn.endpoint_info(4),
            Err(Error::EndpointDoesNotExist(4))
        ));

        assert_eq!(conn.find_endpoint(EndpointKind::RadarBase), Some(1));
        assert_eq!(conn.find_endpoint(EndpointKind::TargetDetection), Some(2));
        assert_eq!(conn.find_endpoint(EndpointKind::Calibration), None);
    }

    #[tokio::test]
    async fn test_connect_rejects_incompatible_devices() {
        // silent device
        let (host, _device) = tokio::io::duplex(1024);
        assert!(matches!(
            Connection::connect_with_timeout(host, TIMEOUT).await,
            Err(Error::DeviceNotCompatible(_))
        ));

        // size does not match the endpoint count
        let (host, mut device) = tokio::io::duplex(1024);
        let mut list = endpoint_list(&ENDPOINTS);
        list.pop();
        reply(&mut device, 0, &[&list], 0).await;
        assert!(matches!(
            Connection::connect_with_timeout(host, TIMEOUT).await,
            Err(Error::DeviceNotCompatible(_))
        ));

        // no endpoints at all
        let (host, mut device) = tokio::io::duplex(1024);
        reply(&mut device, 0, &[&[0x00, 0x00]], 0).await;
        assert!(matches!(
            Connection::connect_with_timeout(host, TIMEOUT).await,
            Err(Error::DeviceNotCompatible(_))
        ));

        // failing status
        let (host, mut device) = tokio::io::duplex(1024);
        reply(&mut device, 0, &[&endpoint_list(&ENDPOINTS)], 0xFFFF).await;
        assert!(matches!(
            Connection::connect_with_timeout(host, TIMEOUT).await,
            Err(Error::DeviceNotCompatible(_))
        ));
    }

    #[tokio::test]
    async fn test_endpoint_compatibility() {
        let (conn, _device) = connected().await;

        assert!(conn.is_endpoint_compatible(1, &base::DEFINITION).is_ok());
        assert!(base::is_compatible_endpoint(&conn, 1).is_ok());
        assert!(target_detection::is_compatible_endpoint(&conn, 2).is_ok());
        assert!(matches!(
            base::is_compatible_endpoint(&conn, 2),
            Err(Error::EndpointWrongType(2))
        ));
        assert!(matches!(
            calibration::is_compatible_endpoint(&conn, 9),
            Err(Error::EndpointDoesNotExist(9))
        ));

        let newer = Definition {
            min_version: 4,
            max_version: 5,
            ..base::DEFINITION
        };
        assert!(matches!(
            conn.is_endpoint_compatible(1, &newer),
            Err(Error::EndpointVersionTooOld(1))
        ));
        let older = Definition {
            type_code: 0x52440001,
            max_version: 2,
            ..base::DEFINITION
        };
        assert!(matches!(
            conn.is_endpoint_compatible(3, &older),
            Err(Error::EndpointVersionTooNew(3))
        ));
    }

    #[tokio::test]
    async fn test_status_code_descriptions() {
        let (conn, _device) = connected().await;

        assert_eq!(conn.status_code_description(0, 0), "No Error.");
        assert_eq!(conn.status_code_description(1, 0), "No Error.");
        assert_eq!(conn.status_code_description(9, 0), "No Error.");
        assert_eq!(
            conn.status_code_description(0, device_status::BAD_COMMAND),
            "The device received a message at endpoint 0 that could not be understood."
        );
        assert_eq!(
            conn.status_code_description(0, device_status::TIME_OUT),
            "A time out occured during message transmission from host to device."
        );
        assert_eq!(conn.status_code_description(0, 0x1234), "Unknown Error");
        assert_eq!(
            conn.status_code_description(1, error_codes::FREQUENCY_OUT_OF_RANGE),
            "The specified RF frequency is out of range."
        );
        assert_eq!(conn.status_code_description(3, 0x0002), "Unknown Error");
        assert_eq!(conn.status_code_description(9, 5), "Invalid Endpoint.");
    }

    #[tokio::test]
    async fn test_firmware_information() {
        let (mut conn, mut device) = connected().await;

        let mut payload = vec![MSG_FW_INFO, 2, 0, 5, 0, 0x39, 0x30];
        payload.extend_from_slice(b"Radar Baseboard MCU7\0\0");
        reply(&mut device, 0, &[&payload], 0).await;

        let info = conn.firmware_information().await.unwrap();
        assert_eq!(request(&mut device).await, (0, vec![0x01]));
        assert_eq!(info.description, "Radar Baseboard MCU7");
        assert_eq!(info.to_string(), "2.5.12345");

        reply(&mut device, 0, &[], 0).await;
        conn.firmware_reset().await.unwrap();
        assert_eq!(request(&mut device).await, (0, vec![0x02]));

        reply(&mut device, 0, &[], device_status::BAD_COMMAND).await;
        match conn.firmware_reset().await {
            Err(Error::Status {
                endpoint: 0,
                code: 0xFFFF,
                description,
            }) => assert_eq!(
                description,
                "The device received a message at endpoint 0 that could not be understood."
            ),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_request_invokes_callbacks() {
        let (mut conn, mut device) = connected().await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        conn.callbacks_mut()
            .radar_base
            .set_callback_temperature(move |ep, t| sink.lock().unwrap().push((ep, t.millidegrees)));

        let mut payload = vec![0x31, 0x00];
        payload.extend_from_slice(&41_250i32.to_le_bytes());
        reply(&mut device, 1, &[&payload], 0).await;

        let temperature = base::get_temperature(&mut conn, 1, 0).await.unwrap();
        assert_eq!(request(&mut device).await, (1, vec![0x30, 0x00]));
        assert_eq!(temperature.celsius(), 41.25);
        assert_eq!(*seen.lock().unwrap(), vec![(1, 41_250)]);

        conn.callbacks_mut().radar_base.clear();
        reply(&mut device, 1, &[&payload], 0).await;
        base::get_temperature(&mut conn, 1, 0).await.unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_request_status_errors() {
        let (mut conn, mut device) = connected().await;

        reply(&mut device, 1, &[], error_codes::FREQUENCY_OUT_OF_RANGE).await;
        match base::get_frame_data(&mut conn, 1, true).await {
            Err(Error::Status {
                endpoint: 1,
                code,
                description,
            }) => {
                assert_eq!(code, error_codes::FREQUENCY_OUT_OF_RANGE);
                assert_eq!(description, "The specified RF frequency is out of range.");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(request(&mut device).await, (1, vec![0x01, 0x01]));

        // acknowledged without data
        reply(&mut device, 2, &[], 0).await;
        assert!(matches!(
            target_detection::get_targets(&mut conn, 2).await,
            Err(Error::MissingResponse("targets"))
        ));

        // request to an endpoint of the wrong type is never sent
        assert!(matches!(
            target_detection::get_targets(&mut conn, 1).await,
            Err(Error::EndpointWrongType(1))
        ));

        // no answer at all
        assert!(matches!(
            base::get_chirp_duration(&mut conn, 1).await,
            Err(Error::NoMessage)
        ));
    }

    #[tokio::test]
    async fn test_get_targets() {
        let (mut conn, mut device) = connected().await;

        let targets = [
            Target {
                target_id: 1,
                level: 120.0,
                radius: 250.0,
                azimuth: -12.5,
                ..Default::default()
            },
            Target {
                target_id: 2,
                level: 80.0,
                radius: 410.0,
                azimuth: 20.0,
                radial_speed: -0.5,
                ..Default::default()
            },
        ];
        reply(&mut device, 2, &[&target_payload(&targets)], 0).await;

        let received = target_detection::get_targets(&mut conn, 2).await.unwrap();
        assert_eq!(received, targets);
        assert_eq!(received[0].range_m(), 2.5);
    }

    #[tokio::test]
    async fn test_poll_delivers_frames() {
        let (mut conn, mut device) = connected().await;

        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = frames.clone();
        conn.callbacks_mut()
            .radar_base
            .set_callback_data_frame(move |_, frame| sink.lock().unwrap().push(frame.frame_number));

        let payload = frame_payload(1, 4, 1, RxDataFormat::Real, 12, &[1, 2, 3, 4]);
        let msg = encode_payload_message(1, &payload).unwrap();
        device.write_all(&msg).await.unwrap();

        match conn.poll().await.unwrap() {
            Some(Response::RadarBase(base::Response::Frame(frame))) => {
                assert_eq!(frame.samples.len(), 4)
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(*frames.lock().unwrap(), vec![7]);

        // payloads of unknown endpoints are skipped
        let msg = encode_payload_message(3, &[0x01, 0x02]).unwrap();
        device.write_all(&msg).await.unwrap();
        assert!(conn.poll().await.unwrap().is_none());

        assert!(conn.poll().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disconnect() {
        let (conn, mut device) = connected().await;
        conn.disconnect().await.unwrap();

        let mut buf = [0u8; 1];
        assert_eq!(device.read(&mut buf).await.unwrap(), 0);
    }
}
