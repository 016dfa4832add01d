// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use super::{call, take_response, Callback, Definition, EndpointKind};
use crate::{
    connection::Connection,
    protocol::{le_f32, le_u16, le_u32, Error, Transport},
};
use log::warn;

/// Target detection endpoint, type code `RTDC`.
pub static DEFINITION: Definition = Definition {
    kind: EndpointKind::TargetDetection,
    type_code: 0x52544443,
    min_version: 1,
    max_version: 1,
    description: "ifxRadar Target Detection",
};

const MSG_GET_DSP_SETTINGS: u8 = 0x00;
const MSG_SET_DSP_SETTINGS: u8 = 0x01;
const MSG_GET_TARGETS: u8 = 0x02;
const MSG_GET_RANGE_THRESHOLD: u8 = 0x03;

const DSP_SETTINGS_MIN_LEN: usize = 18;
const DSP_SETTINGS_LEN: usize = 27;
const TARGET_LEN: usize = 32;

/// Signal processing parameters of the on-device target detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DspSettings {
    /// Moving average filter length used for range
    pub range_mvg_avg_length: u8,
    /// Targets closer than this are ignored
    pub min_range_cm: u16,
    /// Targets further away than this are ignored
    pub max_range_cm: u16,
    /// Targets slower than this are ignored
    pub min_speed_kmh: u16,
    /// Targets faster than this are ignored
    pub max_speed_kmh: u16,
    /// Minimum angle, not evaluated by current firmware
    pub min_angle_degree: u16,
    /// Maximum angle, not evaluated by current firmware
    pub max_angle_degree: u16,
    /// Linear range FFT threshold
    pub range_threshold: u16,
    /// Linear doppler FFT threshold
    pub speed_threshold: u16,
    /// Enables tracking
    pub enable_tracking: u8,
    /// Number of active tracks
    pub num_of_tracks: u8,
    /// Depth of the median filter smoothing the angles
    pub median_filter_length: u8,
    /// Enables the MTI filter removing static targets
    pub enable_mti_filter: u8,
    /// Frames after which static targets are removed
    pub mti_filter_length: u16,
}

impl Default for DspSettings {
    /// Zeroed filter limits, with the tracking and MTI values older firmware
    /// runs with.
    fn default() -> Self {
        DspSettings {
            range_mvg_avg_length: 0,
            min_range_cm: 0,
            max_range_cm: 0,
            min_speed_kmh: 0,
            max_speed_kmh: 0,
            min_angle_degree: 0,
            max_angle_degree: 0,
            range_threshold: 0,
            speed_threshold: 0,
            enable_tracking: 0,
            num_of_tracks: 1,
            median_filter_length: 5,
            enable_mti_filter: 0,
            mti_filter_length: 10,
        }
    }
}

impl DspSettings {
    fn encode(&self) -> Vec<u8> {
        let mut msg = Vec::with_capacity(DSP_SETTINGS_LEN);
        msg.push(MSG_SET_DSP_SETTINGS);
        msg.push(self.range_mvg_avg_length);
        for value in [
            self.min_range_cm,
            self.max_range_cm,
            self.min_speed_kmh,
            self.max_speed_kmh,
            self.min_angle_degree,
            self.max_angle_degree,
            self.range_threshold,
            self.speed_threshold,
            0,
        ] {
            msg.extend_from_slice(&value.to_le_bytes());
        }
        msg.push(self.enable_tracking);
        msg.push(self.num_of_tracks);
        msg.push(self.median_filter_length);
        msg.push(self.enable_mti_filter);
        msg.extend_from_slice(&self.mti_filter_length.to_le_bytes());
        msg.push(0);
        msg
    }

    fn decode(payload: &[u8]) -> DspSettings {
        // Older firmware omits the tracking and MTI fields.
        let extended = payload.len() == DSP_SETTINGS_LEN;
        let defaults = DspSettings::default();

        DspSettings {
            range_mvg_avg_length: payload[1],
            min_range_cm: le_u16(payload, 2),
            max_range_cm: le_u16(payload, 4),
            min_speed_kmh: le_u16(payload, 6),
            max_speed_kmh: le_u16(payload, 8),
            min_angle_degree: le_u16(payload, 10),
            max_angle_degree: le_u16(payload, 12),
            range_threshold: le_u16(payload, 14),
            speed_threshold: le_u16(payload, 16),
            enable_tracking: if extended { payload[20] } else { defaults.enable_tracking },
            num_of_tracks: if extended { payload[21] } else { defaults.num_of_tracks },
            median_filter_length: if extended {
                payload[22]
            } else {
                defaults.median_filter_length
            },
            enable_mti_filter: if extended { payload[23] } else { defaults.enable_mti_filter },
            mti_filter_length: if extended {
                le_u16(payload, 24)
            } else {
                defaults.mti_filter_length
            },
        }
    }
}

/// A target reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Target {
    /// Unique target id
    pub target_id: u32,
    /// Level at the peak in dB relative to the threshold
    pub level: f32,
    /// Distance from the sensor in cm
    pub radius: f32,
    /// Azimuth in degrees, positive to the right
    pub azimuth: f32,
    /// Elevation in degrees, positive upwards
    pub elevation: f32,
    /// Change of radius per second
    pub radial_speed: f32,
    /// Change of azimuth per second
    pub azimuth_speed: f32,
    /// Change of elevation per second
    pub elevation_speed: f32,
}

impl Target {
    /// Distance from the sensor in meters.
    pub fn range_m(&self) -> f32 {
        self.radius / 100.0
    }

    fn decode(slice: &[u8]) -> Target {
        Target {
            target_id: le_u32(slice, 0),
            level: le_f32(slice, 4),
            radius: le_f32(slice, 8),
            azimuth: le_f32(slice, 12),
            elevation: le_f32(slice, 16),
            radial_speed: le_f32(slice, 20),
            azimuth_speed: le_f32(slice, 24),
            elevation_speed: le_f32(slice, 28),
        }
    }
}

/// Responses of the target detection endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Current DSP settings
    DspSettings(DspSettings),
    /// Detected targets
    Targets(Vec<Target>),
    /// Current range threshold
    RangeThreshold(u16),
}

/// Decodes a target detection payload.
pub fn decode(payload: &[u8]) -> Option<Response> {
    let size = payload.len();

    match *payload.first()? {
        MSG_GET_DSP_SETTINGS if size >= DSP_SETTINGS_MIN_LEN => {
            Some(Response::DspSettings(DspSettings::decode(payload)))
        }
        MSG_GET_TARGETS if size >= 2 => {
            let count = payload[1] as usize;
            if size != 2 + count * TARGET_LEN {
                warn!("dropping target list of {} bytes for {} targets", size, count);
                return None;
            }
            Some(Response::Targets(
                payload[2..]
                    .chunks_exact(TARGET_LEN)
                    .map(Target::decode)
                    .collect(),
            ))
        }
        MSG_GET_RANGE_THRESHOLD if size == 3 => {
            Some(Response::RangeThreshold(le_u16(payload, 1)))
        }
        _ => None,
    }
}

/// Callbacks for target detection responses.
#[derive(Default)]
pub struct Callbacks {
    dsp_settings: Option<Callback<DspSettings>>,
    target_processing: Option<Callback<Vec<Target>>>,
    range_threshold: Option<Callback<u16>>,
}

impl Callbacks {
    /// Called when the device reports its DSP settings.
    pub fn set_callback_dsp_settings(
        &mut self,
        f: impl FnMut(u8, &DspSettings) + Send + 'static,
    ) {
        self.dsp_settings = Some(Box::new(f));
    }

    /// Called with every list of detected targets.
    pub fn set_callback_target_processing(
        &mut self,
        f: impl FnMut(u8, &Vec<Target>) + Send + 'static,
    ) {
        self.target_processing = Some(Box::new(f));
    }

    /// Called with the range threshold.
    pub fn set_callback_range_threshold(&mut self, f: impl FnMut(u8, &u16) + Send + 'static) {
        self.range_threshold = Some(Box::new(f));
    }

    /// Removes all target detection callbacks.
    pub fn clear(&mut self) {
        *self = Callbacks::default();
    }

    pub(crate) fn dispatch(&mut self, endpoint: u8, response: &Response) {
        match response {
            Response::DspSettings(v) => call(&mut self.dsp_settings, endpoint, v),
            Response::Targets(v) => call(&mut self.target_processing, endpoint, v),
            Response::RangeThreshold(v) => call(&mut self.range_threshold, endpoint, v),
        }
    }
}

fn pick(response: super::Response) -> Option<Response> {
    match response {
        super::Response::TargetDetection(response) => Some(response),
        _ => None,
    }
}

/// Checks that the endpoint is a supported target detection endpoint.
pub fn is_compatible_endpoint<T: Transport>(
    conn: &Connection<T>,
    endpoint: u8,
) -> Result<(), Error> {
    conn.is_endpoint_compatible(endpoint, &DEFINITION)
}

/// Changes the DSP settings.
pub async fn set_dsp_settings<T: Transport>(
    conn: &mut Connection<T>,
    endpoint: u8,
    settings: &DspSettings,
) -> Result<(), Error> {
    conn.send_and_receive(endpoint, &DEFINITION, &settings.encode())
        .await?;
    Ok(())
}

/// Queries the DSP settings.
pub async fn get_dsp_settings<T: Transport>(
    conn: &mut Connection<T>,
    endpoint: u8,
) -> Result<DspSettings, Error> {
    let responses = conn
        .send_and_receive(endpoint, &DEFINITION, &[MSG_GET_DSP_SETTINGS])
        .await?;
    take_response(responses, "dsp settings", |r| match pick(r)? {
        Response::DspSettings(v) => Some(v),
        _ => None,
    })
}

/// Queries the targets detected in the latest frame.
pub async fn get_targets<T: Transport>(
    conn: &mut Connection<T>,
    endpoint: u8,
) -> Result<Vec<Target>, Error> {
    let responses = conn
        .send_and_receive(endpoint, &DEFINITION, &[MSG_GET_TARGETS])
        .await?;
    take_response(responses, "targets", |r| match pick(r)? {
        Response::Targets(v) => Some(v),
        _ => None,
    })
}

/// Queries the range threshold.
pub async fn get_range_threshold<T: Transport>(
    conn: &mut Connection<T>,
    endpoint: u8,
) -> Result<u16, Error> {
    let responses = conn
        .send_and_receive(endpoint, &DEFINITION, &[MSG_GET_RANGE_THRESHOLD])
        .await?;
    take_response(responses, "range threshold", |r| match pick(r)? {
        Response::RangeThreshold(v) => Some(v),
        _ => None,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn target_payload(targets: &[Target]) -> Vec<u8> {
        let mut payload = vec![MSG_GET_TARGETS, targets.len() as u8];
        for t in targets {
            payload.extend_from_slice(&t.target_id.to_le_bytes());
            for v in [
                t.level,
                t.radius,
                t.azimuth,
                t.elevation,
                t.radial_speed,
                t.azimuth_speed,
                t.elevation_speed,
            ] {
                payload.extend_from_slice(&v.to_le_bytes());
            }
        }
        payload
    }

    pub(crate) fn dsp_settings_payload(settings: &DspSettings) -> Vec<u8> {
        let mut payload = settings.encode();
        payload[0] = MSG_GET_DSP_SETTINGS;
        payload
    }

    #[test]
    fn test_dsp_settings_layout() {
        let settings = DspSettings {
            range_mvg_avg_length: 2,
            min_range_cm: 50,
            max_range_cm: 0x0102,
            enable_tracking: 1,
            num_of_tracks: 3,
            mti_filter_length: 0x0304,
            ..Default::default()
        };
        let msg = settings.encode();
        assert_eq!(msg.len(), 27);
        assert_eq!(msg[0], MSG_SET_DSP_SETTINGS);
        assert_eq!(&msg[4..6], &[0x02, 0x01]);
        assert_eq!(&msg[18..20], &[0, 0]);
        assert_eq!(msg[20], 1);
        assert_eq!(msg[21], 3);
        assert_eq!(&msg[24..26], &[0x04, 0x03]);
        assert_eq!(msg[26], 0);

        assert_eq!(
            decode(&dsp_settings_payload(&settings)),
            Some(Response::DspSettings(settings))
        );
    }

    #[test]
    fn test_short_dsp_settings_use_defaults() {
        let settings = DspSettings {
            min_range_cm: 10,
            enable_tracking: 1,
            num_of_tracks: 4,
            ..Default::default()
        };
        let payload = dsp_settings_payload(&settings);

        let decoded = match decode(&payload[..18]) {
            Some(Response::DspSettings(s)) => s,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(decoded.min_range_cm, 10);
        assert_eq!(decoded.enable_tracking, 0);
        assert_eq!(decoded.num_of_tracks, 1);
        assert_eq!(decoded.median_filter_length, 5);
        assert_eq!(decoded.mti_filter_length, 10);

        assert_eq!(decode(&payload[..17]), None);
    }

    #[test]
    fn test_decode_targets() {
        let target = Target {
            target_id: 9,
            level: 12.5,
            radius: 250.0,
            azimuth: -10.0,
            elevation: 0.0,
            radial_speed: 1.5,
            azimuth_speed: 0.0,
            elevation_speed: 0.0,
        };
        let payload = target_payload(&[target, Target { target_id: 10, ..target }]);
        assert_eq!(payload.len(), 66);

        match decode(&payload) {
            Some(Response::Targets(targets)) => {
                assert_eq!(targets.len(), 2);
                assert_eq!(targets[0], target);
                assert_eq!(targets[1].target_id, 10);
                assert_eq!(targets[0].range_m(), 2.5);
            }
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(
            decode(&[MSG_GET_TARGETS, 0]),
            Some(Response::Targets(vec![]))
        );
        assert_eq!(decode(&payload[..65]), None);
        assert_eq!(
            decode(&[MSG_GET_RANGE_THRESHOLD, 0xE8, 0x03]),
            Some(Response::RangeThreshold(1000))
        );
    }
}
