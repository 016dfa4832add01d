// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use std::path::PathBuf;

use clap::Parser;
use serde_json::json;
use tracing::level_filters::LevelFilter;
use zenoh::config::{Config, WhatAmI};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Serial port of the radar, the first detected radar is used if unset.
    #[arg(long, env)]
    pub port: Option<PathBuf>,

    /// JSON settings file applied after connecting.
    #[arg(long, env)]
    pub settings: Option<PathBuf>,

    /// Measurement period in milliseconds.
    #[arg(long, env, default_value = "100")]
    pub interval: u64,

    /// Automatic frame trigger interval in microseconds, 0 disables raw
    /// frames. Overridden by FrameIntervalUs in the settings file.
    #[arg(long, env, default_value = "100000")]
    pub frame_interval: u32,

    /// Receive timeout in milliseconds.
    #[arg(long, env, default_value = "1000")]
    pub timeout: u64,

    /// Consecutive failed measurements before the radar is reset and the
    /// daemon exits.
    #[arg(long, env, default_value = "10")]
    pub max_errors: usize,

    /// mirror the radar data
    #[arg(long, env)]
    pub mirror: bool,

    /// radar frame transform vector from base_link
    #[arg(
        long,
        env,
        default_value = "0 0 0",
        value_delimiter = ' ',
        num_args = 3
    )]
    pub radar_tf_vec: Vec<f64>,

    /// radar frame transform quaternion from base_link
    #[arg(
        long,
        env,
        default_value = "0 0 0 1",
        value_delimiter = ' ',
        num_args = 4
    )]
    pub radar_tf_quat: Vec<f64>,

    /// The name of the base frame
    #[arg(long, env, default_value = "base_link")]
    pub base_frame_id: String,

    /// The name of the radar frame
    #[arg(long, env, default_value = "radar")]
    pub radar_frame_id: String,

    /// radar targets topic name
    #[arg(long, default_value = "rt/radar/targets")]
    pub targets_topic: String,

    /// Application log level
    #[arg(long, env, default_value = "info")]
    pub rust_log: LevelFilter,

    /// Enable Tracy profiler broadcast
    #[arg(long, env)]
    pub tracy: bool,

    /// zenoh connection mode
    #[arg(long, env, default_value = "peer")]
    mode: WhatAmI,

    /// connect to zenoh endpoints
    #[arg(long, env)]
    connect: Vec<String>,

    /// listen to zenoh endpoints
    #[arg(long, env)]
    listen: Vec<String>,

    /// disable zenoh multicast scouting
    #[arg(long, env)]
    no_multicast_scouting: bool,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let mut config = Config::default();

        config
            .insert_json5("mode", &json!(args.mode).to_string())
            .unwrap();

        if !args.connect.is_empty() {
            config
                .insert_json5("connect/endpoints", &json!(args.connect).to_string())
                .unwrap();
        }

        if !args.listen.is_empty() {
            config
                .insert_json5("listen/endpoints", &json!(args.listen).to_string())
                .unwrap();
        }

        if args.no_multicast_scouting {
            config
                .insert_json5("scouting/multicast/enabled", &json!(false).to_string())
                .unwrap();
        }

        config
            .insert_json5("scouting/multicast/interface", &json!("lo").to_string())
            .unwrap();

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["ifxradarpub"]);
        assert_eq!(args.interval, 100);
        assert_eq!(args.frame_interval, 100_000);
        assert_eq!(args.max_errors, 10);
        assert_eq!(args.radar_tf_quat, vec![0.0, 0.0, 0.0, 1.0]);
        assert_eq!(args.targets_topic, "rt/radar/targets");
        assert_eq!(args.rust_log, LevelFilter::INFO);
    }

    #[test]
    fn test_port_and_transform() {
        let args = Args::parse_from([
            "ifxradarpub",
            "--port",
            "/dev/ttyACM0",
            "--radar-tf-vec",
            "0.1",
            "0",
            "0.5",
            "--mirror",
        ]);
        assert_eq!(args.port, Some(PathBuf::from("/dev/ttyACM0")));
        assert_eq!(args.radar_tf_vec, vec![0.1, 0.0, 0.5]);
        assert!(args.mirror);
    }
}
