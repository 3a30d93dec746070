// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Camera hotplug monitor.

use crate::error::CliError;
use crate::utils::install_signal_handler;
use clap::Args as ClapArgs;
use mediadev::backend::BackendKind;
use mediadev::camera::Camera;
use mediadev::manager::{CameraListener, CameraManager};
use mediadev::ListenerId;
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Stop after this many seconds (default: run until interrupted)
    #[arg(short, long, value_name = "SECONDS")]
    duration: Option<u64>,
}

#[derive(Debug, Serialize)]
struct CameraEvent<'a> {
    event: &'static str,
    id: &'a str,
    pipeline: &'a str,
    device: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    video_node: Option<&'a str>,
}

/// Prints camera events as they arrive on the event loop thread
struct Printer {
    json: bool,
}

impl Printer {
    fn print(&self, event: &'static str, camera: &Camera) {
        if self.json {
            let record = CameraEvent {
                event,
                id: camera.id(),
                pipeline: camera.pipeline(),
                device: camera.device().device_node(),
                video_node: camera.video_node(),
            };
            match serde_json::to_string(&record) {
                Ok(line) => println!("{}", line),
                Err(e) => log::error!("Failed to serialize camera event: {}", e),
            }
        } else {
            let sign = if event == "removed" { '-' } else { '+' };
            println!("{} {}", sign, camera);
        }
    }
}

impl CameraListener for Printer {
    fn camera_added(&self, camera: &Arc<Camera>) {
        self.print("added", camera);
    }

    fn camera_removed(&self, camera: &Arc<Camera>) {
        self.print("removed", camera);
    }
}

/// Subscribe `listener`, then start the manager.
///
/// Cameras bound during start are reported as added, so none is missed
/// between the initial scan and the first hotplug event.
fn start_watching(
    manager: &CameraManager,
    listener: Weak<dyn CameraListener>,
) -> Result<ListenerId, CliError> {
    let id = manager.subscribe(listener);
    if let Err(err) = manager.start() {
        manager.unsubscribe(id);
        return Err(err.into());
    }
    Ok(id)
}

pub fn execute(args: Args, backend: Option<BackendKind>, json: bool) -> Result<(), CliError> {
    log::debug!("Executing monitor command: {:?}", args);

    if args.duration == Some(0) {
        return Err(CliError::InvalidArgs("--duration must be positive".into()));
    }

    let term = install_signal_handler()?;
    let deadline = args
        .duration
        .map(|secs| Instant::now() + Duration::from_secs(secs));

    let manager = match backend {
        Some(kind) => CameraManager::new().with_backend(move || kind.create()),
        None => CameraManager::new(),
    };

    let printer = Arc::new(Printer { json });
    let listener: Weak<dyn CameraListener> = Arc::downgrade(&printer) as Weak<dyn CameraListener>;
    let id = start_watching(&manager, listener)?;

    if !json {
        eprintln!("Monitoring cameras (Ctrl+C to stop)...");
    }

    while !term.load(Ordering::Relaxed) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    manager.unsubscribe(id);
    manager.stop();
    log::debug!("Monitor stopped");
    Ok(())
}
