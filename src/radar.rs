// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! High level radar session.
//!
//! [`Radar`] wraps a [`Connection`] with the endpoints of a typical
//! sensor board already located: the radar base endpoint is required, the
//! FMCW, target detection and calibration endpoints are used when present.

use crate::{
    connection::{Connection, FirmwareInformation},
    endpoint::{
        base::{self, Frame, FrameFormat},
        calibration, fmcw,
        target_detection::{self, DspSettings, Target},
        EndpointKind,
    },
    protocol::{Error, Transport},
    settings::Settings,
};
use log::{debug, info, warn};

#[cfg(feature = "serial")]
use crate::serial::{self, SerialPort};

/// Temperature sensor polled by [`Radar::measure`].
pub const TEMPERATURE_SENSOR: u8 = 0;

/// The result of one measurement cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Measurement {
    /// Board temperature in °C
    pub temperature: Option<f32>,
    /// Raw frame, if one was ready
    pub frame: Option<Frame>,
    /// Targets detected by the device
    pub targets: Vec<Target>,
}

/// A connected radar sensor.
pub struct Radar<T: Transport> {
    conn: Connection<T>,
    firmware: FirmwareInformation,
    base: u8,
    fmcw: Option<u8>,
    target_detection: Option<u8>,
    calibration: Option<u8>,
    capture_frames: bool,
}

#[cfg(feature = "serial")]
impl Radar<SerialPort> {
    /// Connects to the first serial port with a compatible radar.
    pub async fn connect_any() -> Result<Self, Error> {
        for port in serial::list_ports()? {
            match Radar::connect_port(&port).await {
                Ok(radar) => return Ok(radar),
                Err(err) => debug!("{}: {}", port.display(), err),
            }
        }
        Err(Error::NoDevice)
    }

    /// Connects to the radar on the given serial port.
    pub async fn connect_port<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Error> {
        let port = SerialPort::open(&path)?;
        let radar = Radar::open(port).await?;
        info!("connected to radar on {}", path.as_ref().display());
        Ok(radar)
    }
}

impl<T: Transport> Radar<T> {
    /// Performs the handshake on the transport and locates the endpoints.
    pub async fn open(transport: T) -> Result<Self, Error> {
        Radar::from_connection(Connection::connect(transport).await?).await
    }

    /// Locates the endpoints of an established connection.
    pub async fn from_connection(mut conn: Connection<T>) -> Result<Self, Error> {
        let firmware = conn.firmware_information().await?;
        info!("firmware {} {}", firmware.description, firmware);

        let base = conn
            .find_endpoint(EndpointKind::RadarBase)
            .ok_or(Error::MissingEndpoint(EndpointKind::RadarBase))?;
        let fmcw = conn.find_endpoint(EndpointKind::Fmcw);
        let target_detection = conn.find_endpoint(EndpointKind::TargetDetection);
        let calibration = conn.find_endpoint(EndpointKind::Calibration);

        debug!(
            "endpoints base={} fmcw={:?} target_detection={:?} calibration={:?}",
            base, fmcw, target_detection, calibration
        );

        Ok(Radar {
            conn,
            firmware,
            base,
            fmcw,
            target_detection,
            calibration,
            capture_frames: true,
        })
    }

    /// Firmware reported at connection time.
    pub fn firmware(&self) -> &FirmwareInformation {
        &self.firmware
    }

    /// The underlying connection, for requests not wrapped here.
    pub fn connection(&mut self) -> &mut Connection<T> {
        &mut self.conn
    }

    /// Endpoint number of the radar base endpoint.
    pub fn base_endpoint(&self) -> u8 {
        self.base
    }

    /// Endpoint number of the FMCW endpoint, if present.
    pub fn fmcw_endpoint(&self) -> Result<u8, Error> {
        self.fmcw.ok_or(Error::MissingEndpoint(EndpointKind::Fmcw))
    }

    /// Endpoint number of the target detection endpoint, if present.
    pub fn target_detection_endpoint(&self) -> Result<u8, Error> {
        self.target_detection
            .ok_or(Error::MissingEndpoint(EndpointKind::TargetDetection))
    }

    /// Endpoint number of the calibration endpoint, if present.
    pub fn calibration_endpoint(&self) -> Result<u8, Error> {
        self.calibration
            .ok_or(Error::MissingEndpoint(EndpointKind::Calibration))
    }

    /// Starts or stops acquiring frames every `interval_us`.
    pub async fn set_automatic_frame_trigger(
        &mut self,
        enable: bool,
        interval_us: u32,
    ) -> Result<(), Error> {
        let interval_us = if enable { interval_us } else { 0 };
        base::set_automatic_frame_trigger(&mut self.conn, self.base, interval_us).await
    }

    /// Selects whether [`Radar::measure`] requests raw frames. Enabled by
    /// default.
    pub fn set_frame_capture(&mut self, enable: bool) {
        self.capture_frames = enable;
    }

    /// Polls temperature, the latest frame and the detected targets.
    ///
    /// A request the device rejects leaves its part of the measurement
    /// empty. Transport errors abort the measurement.
    pub async fn measure(&mut self) -> Result<Measurement, Error> {
        let temperature = tolerate(
            "temperature",
            base::get_temperature(&mut self.conn, self.base, TEMPERATURE_SENSOR).await,
        )?
        .map(|t| t.celsius());

        let frame = match self.capture_frames {
            true => tolerate(
                "frame",
                base::get_frame_data(&mut self.conn, self.base, false).await,
            )?,
            false => None,
        };

        let targets = match self.target_detection {
            Some(ep) => tolerate(
                "targets",
                target_detection::get_targets(&mut self.conn, ep).await,
            )?
            .unwrap_or_default(),
            None => Vec::new(),
        };

        Ok(Measurement {
            temperature,
            frame,
            targets,
        })
    }

    /// Queries the frame format.
    pub async fn frame_format(&mut self) -> Result<FrameFormat, Error> {
        base::get_frame_format(&mut self.conn, self.base).await
    }

    /// Changes the frame format.
    pub async fn set_frame_format(&mut self, format: &FrameFormat) -> Result<(), Error> {
        base::set_frame_format(&mut self.conn, self.base, format).await
    }

    /// Queries the DSP settings of the target detection.
    pub async fn dsp_settings(&mut self) -> Result<DspSettings, Error> {
        let ep = self.target_detection_endpoint()?;
        target_detection::get_dsp_settings(&mut self.conn, ep).await
    }

    /// Changes the DSP settings of the target detection.
    pub async fn set_dsp_settings(&mut self, settings: &DspSettings) -> Result<(), Error> {
        let ep = self.target_detection_endpoint()?;
        target_detection::set_dsp_settings(&mut self.conn, ep, settings).await
    }

    /// Queries the FMCW ramp configuration.
    pub async fn fmcw_configuration(&mut self) -> Result<fmcw::Configuration, Error> {
        let ep = self.fmcw_endpoint()?;
        fmcw::get_fmcw_configuration(&mut self.conn, ep).await
    }

    /// Reads the algorithm calibration.
    pub async fn algo_calibration(
        &mut self,
        storage: calibration::Storage,
    ) -> Result<calibration::AlgoCalibration, Error> {
        let ep = self.calibration_endpoint()?;
        calibration::get_algo_calibration_data(&mut self.conn, ep, storage).await
    }

    /// Applies the DSP settings, frame format and trigger of a settings file.
    pub async fn apply(&mut self, settings: &Settings) -> Result<(), Error> {
        if let Some(dsp) = settings.dsp_settings() {
            self.set_dsp_settings(&dsp).await?;
        }
        if let Some(format) = &settings.frame_format {
            self.set_frame_format(format).await?;
        }
        if let Some(interval_us) = settings.frame_interval_us {
            self.set_automatic_frame_trigger(interval_us > 0, interval_us)
                .await?;
        }
        Ok(())
    }

    /// Resets the device and closes the connection.
    pub async fn shutdown(mut self) -> Result<(), Error> {
        if let Err(err) = self.conn.firmware_reset().await {
            warn!("firmware reset failed: {}", err);
        }
        self.conn.disconnect().await
    }
}

fn tolerate<V>(what: &str, result: Result<V, Error>) -> Result<Option<V>, Error> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err @ (Error::Status { .. } | Error::MissingResponse(_))) => {
            warn!("{}: {}", what, err);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        connection::tests::{endpoint_list, reply, request, TIMEOUT},
        endpoint::{
            base::{tests::frame_payload, RxDataFormat, SignalPart},
            error_codes,
            target_detection::tests::target_payload,
        },
        settings::DspSection,
    };
    use tokio::io::{AsyncReadExt, DuplexStream};

    const FIRMWARE: &[u8] = &[0x01, 1, 0, 2, 0, 3, 0, b'F', b'W', 0];

    async fn radar(endpoints: &[(u32, u16)]) -> (Result<Radar<DuplexStream>, Error>, DuplexStream) {
        let (host, mut device) = tokio::io::duplex(1 << 16);
        reply(&mut device, 0, &[&endpoint_list(endpoints)], 0).await;
        reply(&mut device, 0, &[FIRMWARE], 0).await;
        let conn = Connection::connect_with_timeout(host, TIMEOUT).await.unwrap();
        let radar = Radar::from_connection(conn).await;
        assert_eq!(request(&mut device).await, (0, vec![0x00]));
        assert_eq!(request(&mut device).await, (0, vec![0x01]));
        (radar, device)
    }

    #[tokio::test]
    async fn test_open_locates_endpoints() {
        let (radar, _device) = radar(&[(0x52544443, 1), (0x52424153, 1)]).await;
        let radar = radar.unwrap();
        assert_eq!(radar.firmware().to_string(), "1.2.3");
        assert_eq!(radar.firmware().description, "FW");
        assert_eq!(radar.base_endpoint(), 2);
        assert_eq!(radar.target_detection_endpoint().unwrap(), 1);
        assert!(matches!(
            radar.fmcw_endpoint(),
            Err(Error::MissingEndpoint(EndpointKind::Fmcw))
        ));
    }

    #[tokio::test]
    async fn test_open_requires_radar_base() {
        let (radar, _device) = radar(&[(0x52544443, 1)]).await;
        assert!(matches!(
            radar,
            Err(Error::MissingEndpoint(EndpointKind::RadarBase))
        ));
    }

    #[tokio::test]
    async fn test_measure() {
        let (radar, mut device) = radar(&[(0x52424153, 1), (0x52544443, 1)]).await;
        let mut radar = radar.unwrap();

        let mut temperature = vec![0x31, 0x00];
        temperature.extend_from_slice(&38_500i32.to_le_bytes());
        let frame = frame_payload(1, 2, 1, RxDataFormat::Real, 12, &[0, 4095]);
        let targets = [Target {
            target_id: 4,
            radius: 120.0,
            ..Default::default()
        }];

        reply(&mut device, 1, &[&temperature], 0).await;
        reply(&mut device, 1, &[&frame], 0).await;
        reply(&mut device, 2, &[&target_payload(&targets)], 0).await;

        let m = radar.measure().await.unwrap();
        assert_eq!(m.temperature, Some(38.5));
        assert_eq!(m.frame.unwrap().samples, vec![0.0, 1.0]);
        assert_eq!(m.targets, targets);

        assert_eq!(request(&mut device).await, (1, vec![0x30, 0x00]));
        assert_eq!(request(&mut device).await, (1, vec![0x01, 0x00]));
        assert_eq!(request(&mut device).await, (2, vec![0x02]));
    }

    #[tokio::test]
    async fn test_measure_without_frames() {
        let (radar, mut device) = radar(&[(0x52424153, 1), (0x52544443, 1)]).await;
        let mut radar = radar.unwrap();
        radar.set_frame_capture(false);

        let mut temperature = vec![0x31, 0x00];
        temperature.extend_from_slice(&21_000i32.to_le_bytes());
        reply(&mut device, 1, &[&temperature], 0).await;
        reply(&mut device, 2, &[&target_payload(&[])], 0).await;

        let m = radar.measure().await.unwrap();
        assert_eq!(m.temperature, Some(21.0));
        assert_eq!(m.frame, None);
        assert!(m.targets.is_empty());

        assert_eq!(request(&mut device).await, (1, vec![0x30, 0x00]));
        assert_eq!(request(&mut device).await, (2, vec![0x02]));
    }

    #[tokio::test]
    async fn test_measure_tolerates_rejected_requests() {
        let (radar, mut device) = radar(&[(0x52424153, 1)]).await;
        let mut radar = radar.unwrap();

        reply(&mut device, 1, &[], error_codes::BUSY).await;
        reply(&mut device, 1, &[], error_codes::TIME_OUT).await;

        let m = radar.measure().await.unwrap();
        assert_eq!(m, Measurement::default());

        // a silent device is a transport failure
        assert!(matches!(radar.measure().await, Err(Error::NoMessage)));
    }

    #[tokio::test]
    async fn test_apply_settings() {
        let (radar, mut device) = radar(&[(0x52424153, 1), (0x52544443, 1)]).await;
        let mut radar = radar.unwrap();

        let settings = Settings {
            dsp: Some(DspSection {
                max_range_cm: 500,
                ..Default::default()
            }),
            frame_format: Some(FrameFormat {
                num_samples_per_chirp: 64,
                num_chirps_per_frame: 1,
                rx_mask: 1,
                signal_part: SignalPart::IAndQ,
            }),
            frame_interval_us: Some(100_000),
        };
        reply(&mut device, 2, &[], 0).await;
        reply(&mut device, 1, &[], 0).await;
        reply(&mut device, 1, &[], 0).await;
        radar.apply(&settings).await.unwrap();

        let (ep, dsp) = request(&mut device).await;
        assert_eq!((ep, dsp[0], dsp.len()), (2, 0x01, 27));
        assert_eq!(&dsp[4..6], &500u16.to_le_bytes());
        let (ep, format) = request(&mut device).await;
        assert_eq!((ep, format[0]), (1, 0x41));
        let (ep, trigger) = request(&mut device).await;
        assert_eq!((ep, trigger[0]), (1, 0x02));
        assert_eq!(&trigger[1..], &100_000u32.to_le_bytes());
    }

    #[tokio::test]
    async fn test_shutdown_resets_device() {
        let (radar, mut device) = radar(&[(0x52424153, 1)]).await;
        let radar = radar.unwrap();

        reply(&mut device, 0, &[], 0).await;
        radar.shutdown().await.unwrap();
        assert_eq!(request(&mut device).await, (0, vec![0x02]));

        let mut buf = [0u8; 1];
        assert_eq!(device.read(&mut buf).await.unwrap(), 0);
    }
}
