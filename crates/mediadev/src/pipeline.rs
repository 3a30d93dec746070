// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Pipeline Handlers
//!
//! A pipeline handler knows how to drive one family of hardware. For device
//! discovery it only declares the [`DeviceMatch`] its hardware satisfies and
//! how a bound camera is named.

use std::fmt;
use std::sync::Arc;

use crate::device_match::DeviceMatch;
use crate::media::MediaDevice;

/// Entities exposed by the `vimc` virtual media controller driver
pub const VIMC_ENTITIES: &[&str] = &[
    "Raw Capture 0",
    "Raw Capture 1",
    "RGB/YUV Capture",
    "Sensor A",
    "Sensor B",
    "Debayer A",
    "Debayer B",
    "RGB/YUV Input",
    "Scaler",
];

/// Hardware family that can back cameras
///
/// Handlers are registered with the
/// [`CameraManager`](crate::manager::CameraManager) before it starts. Every
/// unclaimed device satisfying [`device_match`](Self::device_match) becomes
/// one camera.
pub trait PipelineHandler: Send + Sync {
    /// Handler name, used in camera listings and log messages
    fn name(&self) -> &str;

    /// Hardware requirements of this handler
    fn device_match(&self) -> &DeviceMatch;

    /// Identifier of the camera created for `device`.
    ///
    /// Defaults to the device's bus location and model, which stay stable
    /// across re-plugs into the same port. Falls back to the device node
    /// when the driver reports no bus information.
    fn camera_name(&self, device: &MediaDevice) -> String {
        if device.bus_info().is_empty() {
            format!("{}:{}", self.name(), device.device_node())
        } else if device.model().is_empty() {
            device.bus_info().to_owned()
        } else {
            format!("{} {}", device.bus_info(), device.model())
        }
    }
}

/// Pipeline handler defined entirely by a [`DeviceMatch`]
#[derive(Debug, Clone)]
pub struct SimplePipelineHandler {
    name: String,
    dm: DeviceMatch,
}

impl SimplePipelineHandler {
    pub fn new(name: &str, dm: DeviceMatch) -> Self {
        Self {
            name: name.to_owned(),
            dm,
        }
    }

    /// USB Video Class cameras; any device of the `uvcvideo` driver
    pub fn uvcvideo() -> Self {
        Self::new("uvcvideo", DeviceMatch::new("uvcvideo"))
    }

    /// Virtual media controller test driver with its fixed topology
    pub fn vimc() -> Self {
        let dm = VIMC_ENTITIES
            .iter()
            .fold(DeviceMatch::new("vimc"), |dm, name| dm.with_entity(name));
        Self::new("vimc", dm)
    }
}

impl PipelineHandler for SimplePipelineHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn device_match(&self) -> &DeviceMatch {
        &self.dm
    }
}

impl fmt::Display for SimplePipelineHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.dm)
    }
}

/// Handlers registered when none are given explicitly
pub fn default_pipelines() -> Vec<Arc<dyn PipelineHandler>> {
    vec![
        Arc::new(SimplePipelineHandler::uvcvideo()),
        Arc::new(SimplePipelineHandler::vimc()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaDeviceBuilder;

    #[test]
    fn test_vimc_match() {
        let handler = SimplePipelineHandler::vimc();
        assert_eq!(handler.device_match().entities().len(), VIMC_ENTITIES.len());

        let complete = VIMC_ENTITIES
            .iter()
            .fold(MediaDeviceBuilder::new("/dev/media0", "vimc"), |b, name| {
                b.entity(name)
            })
            .build()
            .unwrap();
        assert!(handler.device_match().matches(&complete));

        let partial = MediaDeviceBuilder::new("/dev/media0", "vimc")
            .entity("Sensor A")
            .entity("Scaler")
            .build()
            .unwrap();
        assert!(!handler.device_match().matches(&partial));
    }

    #[test]
    fn test_camera_name() {
        let handler = SimplePipelineHandler::uvcvideo();

        let device = MediaDeviceBuilder::new("/dev/media2", "uvcvideo")
            .with_model("HD Webcam")
            .with_bus_info("usb-0000:00:14.0-1")
            .build()
            .unwrap();
        assert_eq!(handler.camera_name(&device), "usb-0000:00:14.0-1 HD Webcam");

        let device = MediaDeviceBuilder::new("/dev/media2", "uvcvideo")
            .build()
            .unwrap();
        assert_eq!(handler.camera_name(&device), "uvcvideo:/dev/media2");
    }

    #[test]
    fn test_default_pipelines() {
        let names: Vec<_> = default_pipelines()
            .iter()
            .map(|p| p.name().to_owned())
            .collect();
        assert_eq!(names, vec!["uvcvideo", "vimc"]);
    }
}
