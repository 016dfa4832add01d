// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::{Parser, Subcommand, ValueEnum};
use ifxradar::{
    dsp,
    endpoint::{
        base::{self, SignalPart},
        calibration::{self, AlgoCalibration, Storage},
        fmcw::{self, ChirpDirection},
        type_tag,
    },
    settings::{DspSection, Settings},
    Radar, SerialPort,
};
use log::debug;
use std::{path::PathBuf, time::Duration};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Serial port of the radar, the first detected radar is used if unset.
    #[arg(short, long)]
    port: Option<PathBuf>,

    /// Receive timeout in milliseconds.
    #[arg(long, default_value = "1000")]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// List serial ports with radar boards.
    List,

    /// Print firmware, endpoints and front end information.
    Info,

    /// Reset the device firmware.
    Reset,

    /// Get or set the frame format.
    FrameFormat {
        /// Samples per chirp
        #[arg(long)]
        samples: Option<u32>,
        /// Chirps per frame
        #[arg(long)]
        chirps: Option<u32>,
        /// Bit mask of the RX antennas
        #[arg(long)]
        rx_mask: Option<u8>,
        /// Signal part to capture
        #[arg(long, value_enum)]
        signal_part: Option<SignalPart>,
    },

    /// Get or set the FMCW ramp configuration.
    Fmcw {
        /// Lower frequency in kHz
        #[arg(long)]
        lower: Option<u32>,
        /// Upper frequency in kHz
        #[arg(long)]
        upper: Option<u32>,
        /// Ramp direction
        #[arg(long, value_enum)]
        direction: Option<ChirpDirection>,
        /// TX power setting
        #[arg(long)]
        power: Option<u8>,
    },

    /// Print the DSP settings, optionally loading them from a settings file.
    Dsp {
        /// JSON settings file
        #[arg(long)]
        settings: Option<PathBuf>,
    },

    /// Print the targets of consecutive measurements.
    Targets {
        /// Number of measurements
        #[arg(long, default_value = "1")]
        count: usize,
        /// Frame interval in milliseconds
        #[arg(long, default_value = "100")]
        interval: u64,
    },

    /// Print the board temperature.
    Temperature,

    /// Acquire a frame and print the strongest ranges.
    Range {
        /// Minimum peak prominence
        #[arg(long, default_value = "0.5")]
        prominence: f32,
    },

    /// Read, clear or store calibration data.
    Calibration {
        /// Operation
        #[arg(value_enum)]
        action: CalibrationAction,
        /// Calibration storage
        #[arg(long, value_enum, default_value = "flash")]
        storage: Storage,
        /// Use the ADC calibration instead of the algorithm offsets
        #[arg(long)]
        adc: bool,
        /// Distance offset in cm
        #[arg(long)]
        distance: Option<u16>,
        /// Angle offset in degrees
        #[arg(long, allow_hyphen_values = true)]
        angle: Option<i16>,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum CalibrationAction {
    Get,
    Clear,
    Set,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    if let Command::List = args.command {
        for port in ifxradar::list_ports()? {
            println!("{}", port.display());
        }
        return Ok(());
    }

    let mut radar: Radar<SerialPort> = match &args.port {
        Some(port) => Radar::connect_port(port).await?,
        None => Radar::connect_any().await?,
    };
    debug!("connected, firmware {}", radar.firmware());
    radar
        .connection()
        .set_timeout(Duration::from_millis(args.timeout));
    let ep = radar.base_endpoint();

    match args.command {
        Command::List => {}
        Command::Info => {
            let firmware = radar.firmware().clone();
            println!("Firmware: {} {}", firmware.description, firmware);
            for info in radar.connection().endpoints() {
                println!(
                    "Endpoint {}: {} v{} {}",
                    info.number,
                    type_tag(info.type_code),
                    info.version,
                    info.description()
                );
            }

            let driver = base::get_driver_version(radar.connection(), ep).await?;
            println!("Driver: {}", driver);
            let device = base::get_device_info(radar.connection(), ep).await?;
            println!("Device: {}", device.description);
            println!(
                "Hardware: {}.{}",
                device.major_version_hw, device.minor_version_hw
            );
            println!(
                "RF: {}-{} kHz, {} TX, {} RX, max power {}",
                device.min_rf_frequency_khz,
                device.max_rf_frequency_khz,
                device.num_tx_antennas,
                device.num_rx_antennas,
                device.max_tx_power
            );
            println!(
                "Data: {:?}, interleaved {}, {} temperature sensors",
                device.data_format, device.interleaved_rx, device.num_temp_sensors
            );
        }
        Command::Reset => {
            radar.shutdown().await?;
            println!("reset");
        }
        Command::FrameFormat {
            samples,
            chirps,
            rx_mask,
            signal_part,
        } => {
            let mut format = radar.frame_format().await?;
            if samples.is_some() || chirps.is_some() || rx_mask.is_some() || signal_part.is_some()
            {
                format.num_samples_per_chirp = samples.unwrap_or(format.num_samples_per_chirp);
                format.num_chirps_per_frame = chirps.unwrap_or(format.num_chirps_per_frame);
                format.rx_mask = rx_mask.unwrap_or(format.rx_mask);
                format.signal_part = signal_part.unwrap_or(format.signal_part);
                radar.set_frame_format(&format).await?;
                format = radar.frame_format().await?;
            }
            println!("samples per chirp: {}", format.num_samples_per_chirp);
            println!("chirps per frame: {}", format.num_chirps_per_frame);
            println!("rx mask: 0x{:02X}", format.rx_mask);
            println!("signal part: {}", format.signal_part);
        }
        Command::Fmcw {
            lower,
            upper,
            direction,
            power,
        } => {
            let fmcw_ep = radar.fmcw_endpoint()?;
            let mut config = fmcw::get_fmcw_configuration(radar.connection(), fmcw_ep).await?;
            if lower.is_some() || upper.is_some() || direction.is_some() || power.is_some() {
                config.lower_frequency_khz = lower.unwrap_or(config.lower_frequency_khz);
                config.upper_frequency_khz = upper.unwrap_or(config.upper_frequency_khz);
                config.direction = direction.unwrap_or(config.direction);
                config.tx_power = power.unwrap_or(config.tx_power);
                fmcw::set_fmcw_configuration(radar.connection(), fmcw_ep, &config).await?;
                config = fmcw::get_fmcw_configuration(radar.connection(), fmcw_ep).await?;
            }
            let bandwidth = fmcw::get_bandwidth_per_second(radar.connection(), fmcw_ep).await?;
            println!(
                "frequency: {}-{} kHz (center {} kHz)",
                config.lower_frequency_khz,
                config.upper_frequency_khz,
                config.center_frequency_khz()
            );
            println!("direction: {}", config.direction);
            println!("tx power: {}", config.tx_power);
            println!("bandwidth per second: {} MHz/s", bandwidth);
        }
        Command::Dsp { settings } => {
            if let Some(path) = settings {
                let settings = Settings::load(&path)?;
                match settings.dsp_settings() {
                    Some(dsp) => radar.set_dsp_settings(&dsp).await?,
                    None => println!("{} has no DspSettings", path.display()),
                }
            }
            let dsp = radar.dsp_settings().await?;
            println!("{}", serde_json::to_string_pretty(&DspSection::from(dsp))?);
        }
        Command::Targets { count, interval } => {
            let interval = Duration::from_millis(interval);
            radar
                .set_automatic_frame_trigger(true, interval.as_micros() as u32)
                .await?;
            let mut ticker = tokio::time::interval(interval);
            for n in 0..count {
                ticker.tick().await;
                let measurement = radar.measure().await?;
                println!("measurement {}: {} targets", n, measurement.targets.len());
                for t in &measurement.targets {
                    println!(
                        "  #{} range {:.2} m azimuth {:.1}° speed {:.2} level {:.1}",
                        t.target_id,
                        t.range_m(),
                        t.azimuth,
                        t.radial_speed,
                        t.level
                    );
                }
            }
            radar.set_automatic_frame_trigger(false, 0).await?;
        }
        Command::Temperature => {
            let temperature = base::get_temperature(radar.connection(), ep, 0).await?;
            println!("{:.3} °C", temperature.celsius());
        }
        Command::Range { prominence } => {
            let frame = base::get_frame_data(radar.connection(), ep, true).await?;
            let profile = dsp::range_profile(&frame).ok_or("frame holds no chirp")?;
            for bin in dsp::peaks(&profile.magnitudes, prominence).iter().take(5) {
                println!(
                    "{:6.2} m  {:8.3}",
                    profile.ranges[*bin], profile.magnitudes[*bin]
                );
            }
        }
        Command::Calibration {
            action,
            storage,
            adc,
            distance,
            angle,
        } => {
            let cal_ep = radar.calibration_endpoint()?;
            let conn = radar.connection();
            match (action, adc) {
                (CalibrationAction::Get, true) => {
                    let cal = calibration::get_adc_calibration_data(conn, cal_ep, storage).await?;
                    println!("{} adc samples from {}", cal.samples.len(), cal.storage);
                    for chunk in cal.samples.chunks(8) {
                        let line: Vec<_> = chunk.iter().map(|s| format!("{:.4}", s)).collect();
                        println!("  {}", line.join(" "));
                    }
                }
                (CalibrationAction::Get, false) => {
                    let cal = calibration::get_algo_calibration_data(conn, cal_ep, storage).await?;
                    println!("distance offset: {} cm", cal.distance_offset_cm);
                    println!("angle offset: {}°", cal.angle_offset_deg);
                }
                (CalibrationAction::Clear, true) => {
                    calibration::clear_adc_calibration_data(conn, cal_ep, storage).await?
                }
                (CalibrationAction::Clear, false) => {
                    calibration::clear_algo_calibration_data(conn, cal_ep, storage).await?
                }
                (CalibrationAction::Set, true) => {
                    calibration::set_adc_calibration_data(conn, cal_ep, storage).await?
                }
                (CalibrationAction::Set, false) => {
                    let cal = AlgoCalibration {
                        distance_offset_cm: distance.ok_or("--distance is required")?,
                        angle_offset_deg: angle.ok_or("--angle is required")?,
                    };
                    calibration::set_algo_calibration_data(conn, cal_ep, storage, &cal).await?
                }
            }
        }
    }

    Ok(())
}
