// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod args;

use args::Args;
use clap::Parser;
use edgefirst_schemas::{
    builtin_interfaces::{self, Time},
    edgefirst_msgs::RadarInfo,
    geometry_msgs::{Quaternion, Transform, TransformStamped, Vector3},
    sensor_msgs, serde_cdr,
    std_msgs::{self, Header},
};
use ifxradar::{
    common::{monotonic, set_process_priority},
    endpoint::target_detection::Target,
    settings::Settings,
    Measurement, Radar, SerialPort,
};
use kanal::{AsyncReceiver, AsyncSender};
use std::{f32::consts::PI, thread, time::Duration};
use tracing::{error, info, info_span, instrument, warn, Instrument};
use tracing_subscriber::{layer::SubscriberExt as _, Layer as _, Registry};
use tracy_client::{frame_mark, plot};
use zenoh::{
    bytes::{Encoding, ZBytes},
    qos::{CongestionControl, Priority},
    Session,
};

#[cfg(feature = "profiling")]
#[global_allocator]
static GLOBAL: tracy_client::ProfiledAllocator<std::alloc::System> =
    tracy_client::ProfiledAllocator::new(std::alloc::System, 100);

#[derive(Debug)]
#[allow(dead_code)]
pub enum PointFieldType {
    INT8 = 1,
    UINT8 = 2,
    INT16 = 3,
    UINT16 = 4,
    INT32 = 5,
    UINT32 = 6,
    FLOAT32 = 7,
    FLOAT64 = 8,
}

const TARGET_FIELDS: [&str; 5] = ["x", "y", "z", "speed", "level"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    args.tracy.then(tracy_client::Client::start);

    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(args.rust_log);

    let journald = match tracing_journald::layer() {
        Ok(journald) => Some(journald.with_filter(args.rust_log)),
        Err(_) => None,
    };

    let tracy = match args.tracy {
        true => Some(tracing_tracy::TracyLayer::default().with_filter(args.rust_log)),
        false => None,
    };

    let subscriber = Registry::default()
        .with(stdout_log)
        .with(journald)
        .with(tracy);
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
    tracing_log::LogTracer::init()?;

    let session = zenoh::open(args.clone()).await.unwrap();

    let tf_session = session.clone();
    let tf_msg = TransformStamped {
        header: Header {
            frame_id: args.base_frame_id.clone(),
            stamp: timestamp().unwrap_or(Time { sec: 0, nanosec: 0 }),
        },
        child_frame_id: args.radar_frame_id.clone(),
        transform: Transform {
            translation: Vector3 {
                x: args.radar_tf_vec[0],
                y: args.radar_tf_vec[1],
                z: args.radar_tf_vec[2],
            },
            rotation: Quaternion {
                x: args.radar_tf_quat[0],
                y: args.radar_tf_quat[1],
                z: args.radar_tf_quat[2],
                w: args.radar_tf_quat[3],
            },
        },
    };
    let tf_msg = ZBytes::from(serde_cdr::serialize(&tf_msg).unwrap());
    let tf_enc = Encoding::APPLICATION_CDR.with_schema("geometry_msgs/msg/TransformStamped");
    let tf_task = tokio::spawn(async move { tf_static(tf_session, tf_msg, tf_enc).await.unwrap() });
    std::mem::drop(tf_task);

    let (tx, rx) = kanal::bounded_async(16);
    {
        let session = session.clone();
        let args = args.clone();

        // The serial port registers with the reactor of the runtime that
        // opens it, so the radar lives entirely on the measurement thread.
        thread::Builder::new()
            .name("radar".to_string())
            .spawn(move || {
                let result = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap()
                    .block_on(measure_loop(session, args, tx));
                if let Err(err) = result {
                    error!("radar error: {}", err);
                }
            })?;
    }

    stream(session, args, rx).await
}

async fn open_radar(args: &Args) -> Result<Radar<SerialPort>, Box<dyn std::error::Error>> {
    let mut radar = match &args.port {
        Some(port) => Radar::connect_port(port).await?,
        None => Radar::connect_any().await?,
    };
    radar
        .connection()
        .set_timeout(Duration::from_millis(args.timeout));
    // only targets are published
    radar.set_frame_capture(false);

    let firmware = radar.firmware();
    info!("Firmware: {} {}", firmware.description, firmware);
    for endpoint in radar.connection().endpoints() {
        info!("Endpoint {}", endpoint);
    }

    let settings = match &args.settings {
        Some(path) => {
            let settings = Settings::load(path)?;
            radar.apply(&settings).await?;
            info!("applied settings from {}", path.display());
            settings
        }
        None => Settings::default(),
    };

    if settings.frame_interval_us.is_none() {
        radar
            .set_automatic_frame_trigger(args.frame_interval > 0, args.frame_interval)
            .await?;
    }

    Ok(radar)
}

async fn radar_info_msg(radar: &mut Radar<SerialPort>, args: &Args) -> RadarInfo {
    let (center_frequency, frequency_sweep) = match radar.fmcw_configuration().await {
        Ok(config) => (
            format!("{} kHz", config.center_frequency_khz()),
            format!(
                "{}-{} kHz {}",
                config.lower_frequency_khz, config.upper_frequency_khz, config.direction
            ),
        ),
        Err(err) => {
            warn!("fmcw configuration unavailable: {}", err);
            (String::from("unknown"), String::from("unknown"))
        }
    };

    let (range_toggle, detection_sensitivity) = match radar.dsp_settings().await {
        Ok(dsp) => (
            format!("{}-{} cm", dsp.min_range_cm, dsp.max_range_cm),
            format!(
                "range {} speed {}",
                dsp.range_threshold, dsp.speed_threshold
            ),
        ),
        Err(err) => {
            warn!("dsp settings unavailable: {}", err);
            (String::from("unknown"), String::from("unknown"))
        }
    };

    RadarInfo {
        header: Header {
            frame_id: args.base_frame_id.clone(),
            stamp: timestamp().unwrap_or(Time { sec: 0, nanosec: 0 }),
        },
        center_frequency,
        frequency_sweep,
        range_toggle,
        detection_sensitivity,
        cube: false,
    }
}

async fn measure_loop(
    session: Session,
    args: Args,
    tx: AsyncSender<Measurement>,
) -> Result<(), Box<dyn std::error::Error>> {
    set_process_priority();

    let mut radar = open_radar(&args).await?;

    let info_msg = radar_info_msg(&mut radar, &args).await;
    let info_msg = ZBytes::from(serde_cdr::serialize(&info_msg)?);
    let info_enc = Encoding::APPLICATION_CDR.with_schema("edgefirst_msgs/msg/RadarInfo");
    let info_task = tokio::spawn(async move {
        if let Err(err) = radar_info(session, info_msg, info_enc).await {
            error!("radar info error: {}", err);
        }
    });
    std::mem::drop(info_task);

    let mut interval = tokio::time::interval(Duration::from_millis(args.interval));
    let mut errors = 0;
    let result = loop {
        interval.tick().await;
        let measurement = match radar.measure().await {
            Ok(measurement) => measurement,
            Err(err) => {
                errors += 1;
                error!("measurement error {}/{}: {}", errors, args.max_errors, err);
                if errors >= args.max_errors {
                    break Err(err.into());
                }
                continue;
            }
        };
        errors = 0;

        if tx.send(measurement).await.is_err() {
            break Ok(());
        }
    };

    info!("resetting radar");
    if let Err(err) = radar.shutdown().await {
        warn!("radar shutdown failed: {}", err);
    }
    result
}

async fn stream(
    session: Session,
    args: Args,
    rx: AsyncReceiver<Measurement>,
) -> Result<(), Box<dyn std::error::Error>> {
    let targets_publisher = session
        .declare_publisher(args.targets_topic.clone())
        .priority(Priority::DataHigh)
        .congestion_control(CongestionControl::Drop)
        .await
        .unwrap();

    while let Ok(measurement) = rx.recv().await {
        let targets = &measurement.targets;
        args.tracy.then(|| plot!("targets", targets.len() as f64));
        if let Some(temperature) = measurement.temperature {
            args.tracy.then(|| plot!("temperature", temperature as f64));
        }

        let (msg, enc) = format_targets(targets, args.mirror, &args.radar_frame_id)?;

        let span = info_span!("targets_publish");
        async {
            match targets_publisher.put(msg).encoding(enc).await {
                Ok(_) => {}
                Err(e) => error!("{} publish error: {:?}", args.targets_topic, e),
            }
        }
        .instrument(span)
        .await;

        args.tracy.then(frame_mark);
    }

    Err("radar measurement thread stopped".into())
}

#[instrument(skip_all)]
fn format_targets(
    targets: &[Target],
    mirror: bool,
    frame_id: &str,
) -> Result<(ZBytes, Encoding), Box<dyn std::error::Error>> {
    let n_targets = targets.len() as u32;
    let point_step = 4 * TARGET_FIELDS.len() as u32;
    let data: Vec<_> = targets
        .iter()
        .flat_map(|target| {
            let xyz = transform_xyz(target.range_m(), target.azimuth, target.elevation, mirror);
            [xyz[0], xyz[1], xyz[2], target.radial_speed, target.level]
        })
        .flat_map(|elem| elem.to_ne_bytes())
        .collect();

    let fields = TARGET_FIELDS
        .iter()
        .zip((0..).step_by(4))
        .map(|(name, offset)| sensor_msgs::PointField {
            name: name.to_string(),
            offset,
            datatype: PointFieldType::FLOAT32 as u8,
            count: 1,
        })
        .collect();

    let msg = sensor_msgs::PointCloud2 {
        header: std_msgs::Header {
            stamp: timestamp()?,
            frame_id: frame_id.to_string(),
        },
        height: 1,
        width: n_targets,
        fields,
        is_bigendian: false,
        point_step,
        row_step: point_step * n_targets,
        data,
        is_dense: true,
    };

    let msg = ZBytes::from(serde_cdr::serialize(&msg)?);
    let enc = Encoding::APPLICATION_CDR.with_schema("sensor_msgs/msg/PointCloud2");

    Ok((msg, enc))
}

fn transform_xyz(range: f32, azimuth: f32, elevation: f32, mirror: bool) -> [f32; 3] {
    let azi = azimuth / 180.0 * PI;
    let ele = elevation / 180.0 * PI;
    let x = range * ele.cos() * azi.cos();
    let y = range * ele.cos() * azi.sin();
    let z = range * ele.sin();
    if mirror {
        [x, -y, z]
    } else {
        [x, y, z]
    }
}

async fn tf_static(
    session: Session,
    msg: ZBytes,
    enc: Encoding,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let topic = "rt/tf_static".to_string();
    let mut interval = tokio::time::interval(Duration::from_secs(1));

    loop {
        interval.tick().await;
        let span = info_span!("tf_static_publish");
        async { session.put(&topic, msg.clone()).encoding(enc.clone()).await }
            .instrument(span)
            .await?;
    }
}

async fn radar_info(
    session: Session,
    msg: ZBytes,
    enc: Encoding,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let topic = "rt/radar/info".to_string();
    let mut interval = tokio::time::interval(Duration::from_secs(1));

    loop {
        interval.tick().await;
        let span = info_span!("radar_info_publish");
        async { session.put(&topic, msg.clone()).encoding(enc.clone()).await }
            .instrument(span)
            .await?;
    }
}

fn timestamp() -> Result<builtin_interfaces::Time, std::io::Error> {
    let time = monotonic()?;
    Ok(builtin_interfaces::Time {
        sec: time.as_secs() as i32,
        nanosec: time.subsec_nanos(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_xyz() {
        let [x, y, z] = transform_xyz(2.0, 90.0, 0.0, false);
        assert!(x.abs() < 1e-5);
        assert!((y - 2.0).abs() < 1e-5);
        assert!(z.abs() < 1e-5);

        let [_, y, _] = transform_xyz(2.0, 90.0, 0.0, true);
        assert!((y + 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_format_targets() {
        let targets = vec![
            Target {
                target_id: 1,
                radius: 150.0,
                level: 30.0,
                ..Default::default()
            },
            Target {
                target_id: 2,
                radius: 300.0,
                azimuth: 10.0,
                radial_speed: -0.5,
                ..Default::default()
            },
        ];
        let (msg, _) = format_targets(&targets, false, "radar").unwrap();
        let cloud: sensor_msgs::PointCloud2 = cdr::deserialize(&msg.to_bytes()).unwrap();
        assert_eq!(cloud.width, 2);
        assert_eq!(cloud.point_step, 20);
        assert_eq!(cloud.row_step, 40);
        assert_eq!(cloud.data.len(), 40);
        assert_eq!(cloud.fields.len(), 5);
        assert_eq!(cloud.fields[4].name, "level");
        assert_eq!(cloud.fields[4].offset, 16);

        let x = f32::from_ne_bytes(cloud.data[0..4].try_into().unwrap());
        assert!((x - 1.5).abs() < 1e-5);
        let level = f32::from_ne_bytes(cloud.data[16..20].try_into().unwrap());
        assert_eq!(level, 30.0);
    }
}
