// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! IfxRadar Library
//!
//! This library talks to Infineon 60 GHz radar sensor boards over their USB
//! virtual COM port and provides the pieces needed to publish radar data to
//! the EdgeFirst Perception Middleware.
//!
//! # Features
//!
//! - **Protocol** - Framed payload and status messages with recovery
//! - **Endpoints** - Radar base, FMCW, target detection and calibration
//! - **Callbacks** - Per connection `set_callback_*` hooks for every response
//! - **Serial** - Raw mode, exclusive access USB CDC ports (feature `serial`)
//! - **DSP** - Range FFT of raw frames
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> Result<(), ifxradar::Error> {
//! let mut radar = ifxradar::Radar::connect_any().await?;
//! radar.set_automatic_frame_trigger(true, 100_000).await?;
//! let measurement = radar.measure().await?;
//! for target in &measurement.targets {
//!     println!("{:.2} m at {:.1}°", target.range_m(), target.azimuth);
//! }
//! radar.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

/// Common platform helpers
pub mod common;

/// Connection handling and endpoint discovery
pub mod connection;

/// Range processing of raw frames
pub mod dsp;

/// Endpoint definitions, requests and callbacks
pub mod endpoint;

/// Message framing and protocol errors
pub mod protocol;

/// High level radar session
pub mod radar;

/// USB CDC serial port transport
#[cfg(feature = "serial")]
pub mod serial;

/// JSON settings files
pub mod settings;

pub use connection::{Connection, EndpointInfo, FirmwareInformation};
pub use endpoint::{Callbacks, EndpointKind, Response};
pub use protocol::{Error, Transport};
pub use radar::{Measurement, Radar};
#[cfg(feature = "serial")]
pub use serial::{list_ports, SerialPort};
