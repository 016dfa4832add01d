// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Message framing for the radar communication protocol.
//!
//! Every exchange with the device is built from two kinds of messages. A
//! payload message carries data for one endpoint:
//!
//! ```text
//! 0x5A | endpoint | size (u16 LE) | payload[size] | 0xDB 0xE0
//! ```
//!
//! A status message terminates every request and carries a 16-bit code:
//!
//! ```text
//! 0x5B | endpoint | code (u16 LE)
//! ```
//!
//! Endpoint 0 is reserved for the protocol itself (endpoint discovery,
//! firmware information and reset). Endpoints 1 and up are the functional
//! endpoints discovered at connection time.

use crate::endpoint::EndpointKind;
use log::{debug, trace, warn};
use std::{fmt, io, time::Duration};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Start byte of a payload message.
pub const START_PAYLOAD: u8 = 0x5A;
/// Start byte of a status message.
pub const START_STATUS: u8 = 0x5B;
/// End of payload marker, transmitted low byte first.
pub const END_OF_PAYLOAD: u16 = 0xE0DB;

/// Length of the message header shared by both message kinds.
pub const HEADER_LEN: usize = 4;
/// Length of the tail following the payload of a payload message.
pub const TAIL_LEN: usize = 2;

/// Receive timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

const RECOVERY_CHUNK: usize = 1024;

/// Status codes reported by the device at endpoint 0.
pub mod device_status {
    /// The request was processed without error.
    pub const OK: u16 = 0x0000;
    /// The device timed out while receiving a message from the host.
    pub const TIME_OUT: u16 = 0x0001;
    /// The device received a message with a bad start sequence.
    pub const BAD_MESSAGE_START: u16 = 0x0002;
    /// The device received a message for an endpoint it does not have.
    pub const BAD_ENDPOINT_ID: u16 = 0x0003;
    /// The device received a payload message without payload.
    pub const NO_PAYLOAD: u16 = 0x0005;
    /// The device could not allocate memory for the received payload.
    pub const OUT_OF_MEMORY: u16 = 0x0006;
    /// The device received a message with a bad end sequence.
    pub const BAD_PAYLOAD_END: u16 = 0x0007;
    /// The device did not understand a message sent to endpoint 0.
    pub const BAD_COMMAND: u16 = 0xFFFF;
}

/// Protocol error types.
///
/// The variants that exist in the legacy C interface keep its numeric codes,
/// available through [`Error::code`], and its descriptions as `Display`.
#[derive(Debug)]
pub enum Error {
    /// I/O error from the underlying transport
    Io(io::Error),
    /// The serial port could not be opened
    OpenPort(String, io::Error),
    /// The device did not answer the endpoint discovery as expected
    DeviceNotCompatible(String),
    /// Nothing was received before the timeout
    NoMessage,
    /// A message was only partially received before the timeout
    Timeout,
    /// A message started with an unknown start byte
    BadMessageStart(u8),
    /// A payload message did not end with the end of payload marker
    BadMessageEnd,
    /// The payload does not fit the 16-bit size field
    PayloadTooLarge(usize),
    /// The endpoint number is not in the device's endpoint table
    EndpointDoesNotExist(u8),
    /// The endpoint is not of the requested type
    EndpointWrongType(u8),
    /// The endpoint version is older than supported
    EndpointVersionTooOld(u8),
    /// The endpoint version is newer than supported
    EndpointVersionTooNew(u8),
    /// The device terminated a request with a non-zero status code
    Status {
        /// Endpoint that reported the status
        endpoint: u8,
        /// Status code reported by the device
        code: u16,
        /// Human readable description of the code
        description: &'static str,
    },
    /// The device acknowledged a request without sending the expected data
    MissingResponse(&'static str),
    /// The device has no endpoint of the kind needed for a request
    MissingEndpoint(EndpointKind),
    /// No serial port answered the endpoint discovery
    NoDevice,
}

impl Error {
    /// Numeric code of the error as used by the legacy C interface.
    ///
    /// Device status errors return the status code itself. Errors that have
    /// no legacy counterpart return `None`.
    pub fn code(&self) -> Option<i32> {
        match self {
            Error::OpenPort(..) => Some(-100),
            Error::DeviceNotCompatible(_) => Some(-101),
            Error::NoMessage => Some(-1000),
            Error::Timeout => Some(-1001),
            Error::BadMessageStart(_) => Some(-1002),
            Error::BadMessageEnd => Some(-1003),
            Error::EndpointDoesNotExist(_) => Some(-2000),
            Error::EndpointWrongType(_) => Some(-2001),
            Error::EndpointVersionTooOld(_) => Some(-2002),
            Error::EndpointVersionTooNew(_) => Some(-2003),
            Error::Status { code, .. } => Some(*code as i32),
            Error::Io(_)
            | Error::PayloadTooLarge(_)
            | Error::MissingResponse(_)
            | Error::MissingEndpoint(_)
            | Error::NoDevice => None,
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) | Error::OpenPort(_, err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {}", err),
            Error::OpenPort(port, err) => {
                write!(f, "The specified COM port could not be opened. ({}: {})", port, err)
            }
            Error::DeviceNotCompatible(reason) => write!(
                f,
                "The device at the specified COM port is not compatible with the protocol. ({})",
                reason
            ),
            Error::NoMessage => write!(f, "The device didn't send any message."),
            Error::Timeout => write!(
                f,
                "A timeout occurred while receiving a message from the device."
            ),
            Error::BadMessageStart(byte) => write!(
                f,
                "The device sent a message with a bad start sequence. (0x{:02X})",
                byte
            ),
            Error::BadMessageEnd => {
                write!(f, "The device sent a message with a bad end sequence.")
            }
            Error::PayloadTooLarge(size) => write!(f, "payload too large: {} bytes", size),
            Error::EndpointDoesNotExist(ep) => {
                write!(f, "The requested endpoint does not exist. ({})", ep)
            }
            Error::EndpointWrongType(ep) => write!(
                f,
                "The requested endpoint is not of the type checked for. ({})",
                ep
            ),
            Error::EndpointVersionTooOld(ep) => write!(
                f,
                "The requested endpoint's version is too old to be supported. ({})",
                ep
            ),
            Error::EndpointVersionTooNew(ep) => write!(
                f,
                "The requested endpoint's version is too new to be supported. ({})",
                ep
            ),
            Error::Status {
                endpoint,
                code,
                description,
            } => write!(
                f,
                "endpoint {} status 0x{:04X}: {}",
                endpoint, code, description
            ),
            Error::MissingResponse(what) => write!(f, "missing {} response", what),
            Error::MissingEndpoint(kind) => write!(f, "device has no {} endpoint", kind),
            Error::NoDevice => write!(f, "no compatible radar device found"),
        }
    }
}

/// A message received from or sent to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Data addressed to or sent from an endpoint.
    Payload {
        /// Endpoint number
        endpoint: u8,
        /// Message payload, the first byte is the endpoint's command code
        payload: Vec<u8>,
    },
    /// Terminates a request.
    Status {
        /// Endpoint number
        endpoint: u8,
        /// Status code, zero on success
        code: u16,
    },
}

/// Any duplex byte stream the protocol can run on.
///
/// Implemented for the serial port as well as in-memory streams such as
/// [`tokio::io::DuplexStream`].
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// Builds a complete payload message for the endpoint.
pub fn encode_payload_message(endpoint: u8, payload: &[u8]) -> Result<Vec<u8>, Error> {
    let size = u16::try_from(payload.len()).map_err(|_| Error::PayloadTooLarge(payload.len()))?;

    let mut msg = Vec::with_capacity(HEADER_LEN + payload.len() + TAIL_LEN);
    msg.push(START_PAYLOAD);
    msg.push(endpoint);
    msg.extend_from_slice(&size.to_le_bytes());
    msg.extend_from_slice(payload);
    msg.extend_from_slice(&END_OF_PAYLOAD.to_le_bytes());
    Ok(msg)
}

/// Builds a status message for the endpoint.
pub fn encode_status_message(endpoint: u8, code: u16) -> [u8; HEADER_LEN] {
    let code = code.to_le_bytes();
    [START_STATUS, endpoint, code[0], code[1]]
}

/// Decodes the first message of the slice.
///
/// Returns the message and the number of bytes it occupied, or `None` when
/// the slice does not yet hold a complete message.
pub fn decode_message(slice: &[u8]) -> Result<Option<(Message, usize)>, Error> {
    if slice.len() < HEADER_LEN {
        return Ok(None);
    }

    let endpoint = slice[1];
    let value = u16::from_le_bytes([slice[2], slice[3]]);

    match slice[0] {
        START_STATUS => Ok(Some((
            Message::Status {
                endpoint,
                code: value,
            },
            HEADER_LEN,
        ))),
        START_PAYLOAD => {
            let end = HEADER_LEN + value as usize;
            if slice.len() < end + TAIL_LEN {
                return Ok(None);
            }

            if u16::from_le_bytes([slice[end], slice[end + 1]]) != END_OF_PAYLOAD {
                return Err(Error::BadMessageEnd);
            }

            Ok(Some((
                Message::Payload {
                    endpoint,
                    payload: slice[HEADER_LEN..end].to_vec(),
                },
                end + TAIL_LEN,
            )))
        }
        start => Err(Error::BadMessageStart(start)),
    }
}

/// Sends a payload message to the endpoint.
pub async fn send_message<W>(writer: &mut W, endpoint: u8, payload: &[u8]) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    let msg = encode_payload_message(endpoint, payload)?;
    trace!("send endpoint={} {:02X?}", endpoint, payload);
    writer.write_all(&msg).await?;
    writer.flush().await?;
    Ok(())
}

/// Receives the next message from the device.
///
/// Each read waits at most `timeout` for new data. After a framing error the
/// stream is drained until the device goes quiet so that the next call
/// starts on a message boundary again.
pub async fn read_message<R>(reader: &mut R, timeout: Duration) -> Result<Message, Error>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    let mut received = fill(reader, &mut header, timeout).await?;

    // A header that is missing or split across a timeout gets one more chance.
    if received < HEADER_LEN {
        received += fill(reader, &mut header[received..], timeout).await?;
    }

    if received == 0 {
        return Err(Error::NoMessage);
    }

    if received < HEADER_LEN {
        debug!("partial message header: {:02X?}", &header[..received]);
        recover(reader, timeout).await?;
        return Err(Error::Timeout);
    }

    let endpoint = header[1];
    let value = u16::from_le_bytes([header[2], header[3]]);

    match header[0] {
        START_PAYLOAD => {
            let mut payload = vec![0u8; value as usize];
            if fill(reader, &mut payload, timeout).await? < payload.len() {
                debug!("incomplete payload from endpoint {}", endpoint);
                recover(reader, timeout).await?;
                return Err(Error::Timeout);
            }

            let mut tail = [0u8; TAIL_LEN];
            if fill(reader, &mut tail, timeout).await? != TAIL_LEN
                || u16::from_le_bytes(tail) != END_OF_PAYLOAD
            {
                recover(reader, timeout).await?;
                return Err(Error::BadMessageEnd);
            }

            trace!("recv endpoint={} {:02X?}", endpoint, payload);
            Ok(Message::Payload { endpoint, payload })
        }
        START_STATUS => {
            trace!("recv endpoint={} status=0x{:04X}", endpoint, value);
            Ok(Message::Status {
                endpoint,
                code: value,
            })
        }
        start => {
            warn!("bad message start 0x{:02X}", start);
            recover(reader, timeout).await?;
            Err(Error::BadMessageStart(start))
        }
    }
}

/// Reads until `buf` is full, the stream ends or a read times out.
async fn fill<R>(reader: &mut R, buf: &mut [u8], timeout: Duration) -> Result<usize, Error>
where
    R: AsyncRead + Unpin,
{
    let mut received = 0;

    while received < buf.len() {
        match tokio::time::timeout(timeout, reader.read(&mut buf[received..])).await {
            Ok(Ok(0)) | Err(_) => break,
            Ok(Ok(n)) => received += n,
            Ok(Err(err)) => return Err(err.into()),
        }
    }

    Ok(received)
}

/// Discards incoming data until a read comes back short.
async fn recover<R>(reader: &mut R, timeout: Duration) -> Result<(), Error>
where
    R: AsyncRead + Unpin,
{
    let mut dummy = [0u8; RECOVERY_CHUNK];
    while fill(reader, &mut dummy, timeout).await? == RECOVERY_CHUNK {}
    Ok(())
}

#[inline]
pub(crate) fn le_u16(slice: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([slice[offset], slice[offset + 1]])
}

#[inline]
pub(crate) fn le_i16(slice: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([slice[offset], slice[offset + 1]])
}

#[inline]
pub(crate) fn le_u32(slice: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        slice[offset],
        slice[offset + 1],
        slice[offset + 2],
        slice[offset + 3],
    ])
}

#[inline]
pub(crate) fn le_i32(slice: &[u8], offset: usize) -> i32 {
    le_u32(slice, offset) as i32
}

#[inline]
pub(crate) fn le_f32(slice: &[u8], offset: usize) -> f32 {
    f32::from_bits(le_u32(slice, offset))
}

/// Text up to the first NUL byte, lossily converted to UTF-8.
pub(crate) fn c_string(slice: &[u8]) -> String {
    let end = slice.iter().position(|&b| b == 0).unwrap_or(slice.len());
    String::from_utf8_lossy(&slice[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(50);

    #[test]
    fn test_encode_payload() {
        let msg = encode_payload_message(3, &[0x41, 0x01, 0x02]).unwrap();
        assert_eq!(msg, [0x5A, 0x03, 0x03, 0x00, 0x41, 0x01, 0x02, 0xDB, 0xE0]);

        let empty = encode_payload_message(0, &[]).unwrap();
        assert_eq!(empty, [0x5A, 0x00, 0x00, 0x00, 0xDB, 0xE0]);

        let big = vec![0u8; 70000];
        assert!(matches!(
            encode_payload_message(1, &big),
            Err(Error::PayloadTooLarge(70000))
        ));
    }

    #[test]
    fn test_encode_status() {
        assert_eq!(encode_status_message(2, 0x0125), [0x5B, 0x02, 0x25, 0x01]);
    }

    #[test]
    fn test_decode_message() {
        let mut stream = encode_payload_message(1, &[0x30, 0x00]).unwrap();
        stream.extend_from_slice(&encode_status_message(1, 0));

        let (msg, used) = decode_message(&stream).unwrap().unwrap();
        assert_eq!(
            msg,
            Message::Payload {
                endpoint: 1,
                payload: vec![0x30, 0x00]
            }
        );
        assert_eq!(used, 8);

        let (msg, used) = decode_message(&stream[used..]).unwrap().unwrap();
        assert_eq!(
            msg,
            Message::Status {
                endpoint: 1,
                code: 0
            }
        );
        assert_eq!(used, 4);

        assert!(decode_message(&stream[..6]).unwrap().is_none());
        assert!(matches!(
            decode_message(&[0x11, 0, 0, 0]),
            Err(Error::BadMessageStart(0x11))
        ));
        assert!(matches!(
            decode_message(&[0x5A, 1, 1, 0, 0xAA, 0xDB, 0xE1]),
            Err(Error::BadMessageEnd)
        ));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::NoMessage.code(), Some(-1000));
        assert_eq!(Error::BadMessageEnd.code(), Some(-1003));
        assert_eq!(Error::EndpointVersionTooNew(2).code(), Some(-2003));
        assert_eq!(Error::PayloadTooLarge(1).code(), None);
        let status = Error::Status {
            endpoint: 1,
            code: 0x0009,
            description: "",
        };
        assert_eq!(status.code(), Some(9));
        assert_eq!(
            Error::Timeout.to_string(),
            "A timeout occurred while receiving a message from the device."
        );
    }

    #[test]
    fn test_payload_readers() {
        let data = [0x01, 0x34, 0x12, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x80, 0x3F];
        assert_eq!(le_u16(&data, 1), 0x1234);
        assert_eq!(le_i16(&data, 3), -1);
        assert_eq!(le_i32(&data, 3), -1);
        assert_eq!(le_f32(&data, 7), 1.0);
        assert_eq!(c_string(b"BGT60\0\0junk"), "BGT60");
        assert_eq!(c_string(b"no terminator"), "no terminator");
    }

    #[tokio::test]
    async fn test_read_messages() {
        let (mut host, mut device) = tokio::io::duplex(4096);

        let mut data = encode_payload_message(4, &[0x02, 0x00]).unwrap();
        data.extend_from_slice(&encode_status_message(4, 0x0004));
        device.write_all(&data).await.unwrap();

        let msg = read_message(&mut host, TIMEOUT).await.unwrap();
        assert_eq!(
            msg,
            Message::Payload {
                endpoint: 4,
                payload: vec![0x02, 0x00]
            }
        );

        let msg = read_message(&mut host, TIMEOUT).await.unwrap();
        assert_eq!(
            msg,
            Message::Status {
                endpoint: 4,
                code: 4
            }
        );

        assert!(matches!(
            read_message(&mut host, TIMEOUT).await,
            Err(Error::NoMessage)
        ));
    }

    #[tokio::test]
    async fn test_read_waits_two_timeouts_for_header() {
        let (mut host, mut device) = tokio::io::duplex(4096);
        let timeout = Duration::from_millis(100);

        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            device
                .write_all(&encode_status_message(2, 0))
                .await
                .unwrap();
            device
        });

        assert_eq!(
            read_message(&mut host, timeout).await.unwrap(),
            Message::Status {
                endpoint: 2,
                code: 0
            }
        );
        let _device = writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_read_recovers_after_bad_start() {
        let (mut host, mut device) = tokio::io::duplex(4096);

        device.write_all(&[0x42, 0x01, 0x02, 0x03, 0x04]).await.unwrap();
        assert!(matches!(
            read_message(&mut host, TIMEOUT).await,
            Err(Error::BadMessageStart(0x42))
        ));

        // Garbage was drained, the next message is received intact.
        device
            .write_all(&encode_status_message(0, 0))
            .await
            .unwrap();
        assert_eq!(
            read_message(&mut host, TIMEOUT).await.unwrap(),
            Message::Status {
                endpoint: 0,
                code: 0
            }
        );
    }

    #[tokio::test]
    async fn test_read_timeouts() {
        let (mut host, mut device) = tokio::io::duplex(4096);

        device.write_all(&[0x5B, 0x01]).await.unwrap();
        assert!(matches!(
            read_message(&mut host, TIMEOUT).await,
            Err(Error::Timeout)
        ));

        device.write_all(&[0x5A, 0x01, 0x05, 0x00, 0x01]).await.unwrap();
        assert!(matches!(
            read_message(&mut host, TIMEOUT).await,
            Err(Error::Timeout)
        ));

        device
            .write_all(&[0x5A, 0x01, 0x01, 0x00, 0x01, 0xDB, 0xDB])
            .await
            .unwrap();
        assert!(matches!(
            read_message(&mut host, TIMEOUT).await,
            Err(Error::BadMessageEnd)
        ));
    }
}
