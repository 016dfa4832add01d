// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! JSON settings files for the radar.
//!
//! The target detection parameters live under a `DspSettings` object with
//! the key names used by the Infineon demo software, so existing files can be
//! reused as is:
//!
//! ```json
//! {
//!     "DspSettings": {
//!         "RangeMovingAverageFilterLength": 2,
//!         "MinRange": 50,
//!         "MaxRange": 1000,
//!         "Tracking": 1,
//!         "NumberOfTracks": 5
//!     },
//!     "FrameFormat": {
//!         "num_samples_per_chirp": 64,
//!         "num_chirps_per_frame": 1,
//!         "rx_mask": 3,
//!         "signal_part": "i-and-q"
//!     },
//!     "FrameIntervalUs": 150000
//! }
//! ```
//!
//! Missing DSP keys read as zero. Unknown keys are ignored.

use crate::endpoint::{base::FrameFormat, target_detection::DspSettings};
use serde::{Deserialize, Serialize};
use std::{fmt, io, path::Path};

/// Errors reading or writing a settings file.
#[derive(Debug)]
pub enum Error {
    /// The file could not be read or written
    Io(io::Error),
    /// The file is not valid settings JSON
    Json(serde_json::Error),
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::Json(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {}", err),
            Error::Json(err) => write!(f, "invalid settings: {}", err),
        }
    }
}

/// Target detection parameters as stored in the settings file.
///
/// Fields match [`DspSettings`], the angle limits are not stored.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DspSection {
    #[serde(rename = "RangeMovingAverageFilterLength")]
    pub range_mvg_avg_length: u8,
    #[serde(rename = "MinRange")]
    pub min_range_cm: u16,
    #[serde(rename = "MaxRange")]
    pub max_range_cm: u16,
    #[serde(rename = "MinSpeed")]
    pub min_speed_kmh: u16,
    #[serde(rename = "MaxSpeed")]
    pub max_speed_kmh: u16,
    #[serde(rename = "SpeedThreshold")]
    pub speed_threshold: u16,
    #[serde(rename = "RangeThreshold")]
    pub range_threshold: u16,
    #[serde(rename = "Tracking")]
    pub enable_tracking: u8,
    #[serde(rename = "NumberOfTracks")]
    pub num_of_tracks: u8,
    #[serde(rename = "MedianFilterDepth")]
    pub median_filter_length: u8,
    #[serde(rename = "MTIFilterSelection")]
    pub enable_mti_filter: u8,
    #[serde(rename = "MTIFilterWeight")]
    pub mti_filter_length: u16,
}

impl From<DspSection> for DspSettings {
    fn from(dsp: DspSection) -> Self {
        DspSettings {
            range_mvg_avg_length: dsp.range_mvg_avg_length,
            min_range_cm: dsp.min_range_cm,
            max_range_cm: dsp.max_range_cm,
            min_speed_kmh: dsp.min_speed_kmh,
            max_speed_kmh: dsp.max_speed_kmh,
            min_angle_degree: 0,
            max_angle_degree: 0,
            range_threshold: dsp.range_threshold,
            speed_threshold: dsp.speed_threshold,
            enable_tracking: dsp.enable_tracking,
            num_of_tracks: dsp.num_of_tracks,
            median_filter_length: dsp.median_filter_length,
            enable_mti_filter: dsp.enable_mti_filter,
            mti_filter_length: dsp.mti_filter_length,
        }
    }
}

impl From<DspSettings> for DspSection {
    fn from(dsp: DspSettings) -> Self {
        DspSection {
            range_mvg_avg_length: dsp.range_mvg_avg_length,
            min_range_cm: dsp.min_range_cm,
            max_range_cm: dsp.max_range_cm,
            min_speed_kmh: dsp.min_speed_kmh,
            max_speed_kmh: dsp.max_speed_kmh,
            speed_threshold: dsp.speed_threshold,
            range_threshold: dsp.range_threshold,
            enable_tracking: dsp.enable_tracking,
            num_of_tracks: dsp.num_of_tracks,
            median_filter_length: dsp.median_filter_length,
            enable_mti_filter: dsp.enable_mti_filter,
            mti_filter_length: dsp.mti_filter_length,
        }
    }
}

/// Radar settings applied after connecting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Target detection parameters
    #[serde(rename = "DspSettings", default, skip_serializing_if = "Option::is_none")]
    pub dsp: Option<DspSection>,
    /// Raw frame format
    #[serde(rename = "FrameFormat", default, skip_serializing_if = "Option::is_none")]
    pub frame_format: Option<FrameFormat>,
    /// Automatic frame trigger interval in µs
    #[serde(rename = "FrameIntervalUs", default, skip_serializing_if = "Option::is_none")]
    pub frame_interval_us: Option<u32>,
}

impl Settings {
    /// Reads a settings file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Settings, Error> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Writes the settings as pretty printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// DSP settings to send to the target detection endpoint.
    pub fn dsp_settings(&self) -> Option<DspSettings> {
        self.dsp.map(DspSettings::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::base::SignalPart;

    #[test]
    fn test_parse_demo_settings() {
        let settings: Settings = serde_json::from_str(
            r#"{
                "StatusbarEnabled": true,
                "ToolbarEnabled": false,
                "DspSettings": {
                    "RangeMovingAverageFilterLength": 2,
                    "MinRange": 50,
                    "MaxRange": 1000,
                    "MinSpeed": 0,
                    "MaxSpeed": 30,
                    "SpeedThreshold": 600,
                    "RangeThreshold": 200,
                    "Tracking": 1,
                    "NumberOfTracks": 5,
                    "MedianFilterDepth": 5,
                    "MTIFilterSelection": 1,
                    "MTIFilterWeight": 100
                }
            }"#,
        )
        .unwrap();

        let dsp = settings.dsp_settings().unwrap();
        assert_eq!(dsp.range_mvg_avg_length, 2);
        assert_eq!(dsp.max_range_cm, 1000);
        assert_eq!(dsp.speed_threshold, 600);
        assert_eq!(dsp.range_threshold, 200);
        assert_eq!(dsp.num_of_tracks, 5);
        assert_eq!(dsp.enable_mti_filter, 1);
        assert_eq!(dsp.mti_filter_length, 100);
        assert_eq!(dsp.min_angle_degree, 0);
        assert!(settings.frame_format.is_none());
        assert!(settings.frame_interval_us.is_none());
    }

    #[test]
    fn test_missing_keys_read_as_zero() {
        let settings: Settings =
            serde_json::from_str(r#"{ "DspSettings": { "MaxRange": 700 } }"#).unwrap();
        let dsp = settings.dsp.unwrap();
        assert_eq!(dsp.max_range_cm, 700);
        assert_eq!(dsp.num_of_tracks, 0);
        assert_eq!(dsp.median_filter_length, 0);

        let empty: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, Settings::default());
    }

    #[test]
    fn test_frame_settings() {
        let settings: Settings = serde_json::from_str(
            r#"{
                "FrameFormat": {
                    "num_samples_per_chirp": 64,
                    "num_chirps_per_frame": 1,
                    "rx_mask": 3,
                    "signal_part": "i-and-q"
                },
                "FrameIntervalUs": 150000
            }"#,
        )
        .unwrap();
        let format = settings.frame_format.unwrap();
        assert_eq!(format.num_samples_per_chirp, 64);
        assert_eq!(format.rx_mask, 3);
        assert_eq!(format.signal_part, SignalPart::IAndQ);
        assert_eq!(settings.frame_interval_us, Some(150_000));
    }

    #[test]
    fn test_invalid_settings() {
        assert!(matches!(
            serde_json::from_str::<Settings>(r#"{ "DspSettings": { "Tracking": 300 } }"#)
                .map_err(Error::from),
            Err(Error::Json(_))
        ));
        assert!(matches!(
            Settings::load("/nonexistent/radar.json"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_dsp_section_round_trip() {
        let dsp = DspSettings {
            min_range_cm: 20,
            num_of_tracks: 3,
            ..Default::default()
        };
        assert_eq!(DspSettings::from(DspSection::from(dsp)), dsp);
    }
}
