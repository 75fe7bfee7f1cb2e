//! Command-line driver for [`gestures_core::replay`]: loads a recorded
//! activity log and prints the gestures a fresh chain produces from it.
//!
//! Usage: `gestures-replay <log.json> [--device-class=touchpad|touchscreen|mouse|pointing-stick|multitouch-mouse]`

use gestures_core::gesture_interpreter::DeviceClass;
use gestures_core::replay::ActivityReplay;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

fn parse_device_class(s: &str) -> Option<DeviceClass> {
    match s {
        "touchpad" => Some(DeviceClass::Touchpad),
        "touchscreen" => Some(DeviceClass::Touchscreen),
        "mouse" => Some(DeviceClass::Mouse),
        "pointing-stick" => Some(DeviceClass::PointingStick),
        "multitouch-mouse" => Some(DeviceClass::MultitouchMouse),
        _ => None,
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let mut log_path: Option<PathBuf> = None;
    let mut device_class = DeviceClass::Touchpad;

    for arg in std::env::args().skip(1) {
        if let Some(value) = arg.strip_prefix("--device-class=") {
            match parse_device_class(value) {
                Some(dc) => device_class = dc,
                None => {
                    eprintln!("unrecognized device class: {value}");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            log_path = Some(PathBuf::from(arg));
        }
    }

    let Some(log_path) = log_path else {
        eprintln!("usage: gestures-replay <log.json> [--device-class=...]");
        return ExitCode::FAILURE;
    };

    let replay = match ActivityReplay::load(&log_path) {
        Ok(r) => r,
        Err(e) => {
            error!("failed to load {}: {e}", log_path.display());
            return ExitCode::FAILURE;
        }
    };

    info!("loaded {} entries from {}", replay.entry_count(), log_path.display());
    let gestures = replay.replay(device_class);
    info!("replay produced {} gesture(s)", gestures.len());
    for g in &gestures {
        println!("{g:?}");
    }

    ExitCode::SUCCESS
}
