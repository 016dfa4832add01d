// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Range processing of raw radar frames.
//!
//! A chirp of complex baseband samples is turned into a range profile: the
//! DC offset is removed, a Hann window applied, the chirp zero-padded and
//! transformed. The beat frequency of each bin maps linearly to range.

use crate::endpoint::base::Frame;
use num::Complex;
use rustfft::{Fft, FftPlanner};
use std::{f32::consts::PI, sync::Arc};

/// ADC sampling rate of the radar front end in Hz.
pub const SAMPLE_RATE_HZ: f32 = 213.34e3;
/// Effective ramp time of one chirp in seconds.
pub const RAMP_TIME_S: f32 = 300e-6;
/// Effective swept bandwidth of one chirp in Hz.
pub const BANDWIDTH_HZ: f32 = 200e6;
/// Chirps are zero-padded to this multiple of their length.
pub const ZERO_PADDING: usize = 4;

const SPEED_OF_LIGHT: f32 = 3e8;

/// Chirp timing used to convert beat frequencies into ranges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChirpParameters {
    /// ADC sampling rate in Hz
    pub sample_rate_hz: f32,
    /// Ramp time in seconds
    pub ramp_time_s: f32,
    /// Swept bandwidth in Hz
    pub bandwidth_hz: f32,
}

impl Default for ChirpParameters {
    fn default() -> Self {
        ChirpParameters {
            sample_rate_hz: SAMPLE_RATE_HZ,
            ramp_time_s: RAMP_TIME_S,
            bandwidth_hz: BANDWIDTH_HZ,
        }
    }
}

impl ChirpParameters {
    /// Range in meters of a beat frequency in Hz.
    pub fn beat_to_range(&self, frequency_hz: f32) -> f32 {
        frequency_hz * self.ramp_time_s * SPEED_OF_LIGHT / (2.0 * self.bandwidth_hz)
    }
}

/// A range profile with its range axis.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeProfile {
    /// Range of each bin in meters
    pub ranges: Vec<f32>,
    /// Magnitude of each bin
    pub magnitudes: Vec<f32>,
}

impl RangeProfile {
    /// Range and magnitude of the strongest bin.
    pub fn strongest(&self) -> Option<(f32, f32)> {
        self.magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(bin, &magnitude)| (self.ranges[bin], magnitude))
    }
}

/// Reusable range FFT for chirps of a fixed length.
pub struct RangeProcessor {
    fft: Arc<dyn Fft<f32>>,
    size: usize,
    window: Vec<f32>,
    ranges: Vec<f32>,
}

impl RangeProcessor {
    /// Creates a processor for chirps of `samples` samples.
    pub fn new(samples: usize, chirp: ChirpParameters) -> Self {
        let size = samples * ZERO_PADDING;
        let mut planner = FftPlanner::new();
        // The front end reports beat frequencies with negative sign.
        let fft = planner.plan_fft_inverse(size);

        let window = hann(samples);
        let bin_hz = chirp.sample_rate_hz / size as f32;
        let ranges = (0..size / 2)
            .map(|bin| chirp.beat_to_range(bin as f32 * bin_hz))
            .collect();

        RangeProcessor {
            fft,
            size,
            window,
            ranges,
        }
    }

    /// Number of samples per chirp.
    pub fn samples(&self) -> usize {
        self.window.len()
    }

    /// Range of each output bin in meters.
    pub fn ranges(&self) -> &[f32] {
        &self.ranges
    }

    /// Magnitudes of the positive range bins of one chirp.
    ///
    /// Chirps shorter than the configured length are padded with their
    /// mean, longer chirps are truncated.
    pub fn magnitudes(&self, chirp: &[Complex<f32>]) -> Vec<f32> {
        let samples = self.samples().min(chirp.len());
        if samples == 0 {
            return vec![0.0; self.ranges.len()];
        }

        let chirp = &chirp[..samples];
        let mean = chirp.iter().sum::<Complex<f32>>() / samples as f32;

        let mut buffer = vec![Complex::new(0.0, 0.0); self.size];
        for ((out, &sample), &w) in buffer.iter_mut().zip(chirp).zip(&self.window) {
            *out = (sample - mean) * w;
        }

        self.fft.process(&mut buffer);
        buffer[..self.ranges.len()]
            .iter()
            .map(|c| c.norm())
            .collect()
    }

    /// Range profile of the first chirp of the first antenna.
    pub fn process(&self, frame: &Frame) -> Option<RangeProfile> {
        let chirp = frame.chirp(0, 0)?;
        Some(RangeProfile {
            ranges: self.ranges.clone(),
            magnitudes: self.magnitudes(&chirp),
        })
    }
}

/// Range profile of a frame with the default chirp timing.
pub fn range_profile(frame: &Frame) -> Option<RangeProfile> {
    RangeProcessor::new(frame.samples_per_chirp as usize, ChirpParameters::default()).process(frame)
}

fn hann(len: usize) -> Vec<f32> {
    if len < 2 {
        return vec![1.0; len];
    }
    let n = (len - 1) as f32;
    (0..len)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / n).cos()))
        .collect()
}

/// Indices of the local maxima standing out by at least `min_prominence`,
/// strongest first.
///
/// The prominence of a peak is its height above the higher of the two
/// minima separating it from a higher value or the profile's end.
pub fn peaks(profile: &[f32], min_prominence: f32) -> Vec<usize> {
    let mut found = Vec::new();

    for i in 1..profile.len().saturating_sub(1) {
        let value = profile[i];
        if value <= profile[i - 1] || value < profile[i + 1] {
            continue;
        }

        let mut left = value;
        for &v in profile[..i].iter().rev() {
            if v > value {
                break;
            }
            left = left.min(v);
        }

        let mut right = value;
        for &v in &profile[i + 1..] {
            if v > value {
                break;
            }
            right = right.min(v);
        }

        if value - left.max(right) >= min_prominence {
            found.push(i);
        }
    }

    found.sort_by(|&a, &b| profile[b].total_cmp(&profile[a]));
    found
}
