// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::media::{DeviceClaim, MediaDevice};

/// Logical camera bound to a media device
///
/// A camera is created by the [`CameraManager`](crate::manager::CameraManager)
/// when a pipeline handler claims a matching device, and owns that claim for
/// its whole life. When the device is unplugged the camera is marked
/// disconnected and removed from the manager; applications still holding it
/// can keep reading its description, but the hardware is gone.
#[derive(Debug)]
pub struct Camera {
    id: String,
    pipeline: String,
    claim: DeviceClaim,
    disconnected: AtomicBool,
}

impl Camera {
    pub(crate) fn new(id: String, pipeline: &str, claim: DeviceClaim) -> Self {
        Self {
            id,
            pipeline: pipeline.to_owned(),
            claim,
            disconnected: AtomicBool::new(false),
        }
    }

    /// Unique camera identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name of the pipeline handler that created the camera
    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    /// Media device backing the camera
    pub fn device(&self) -> &Arc<MediaDevice> {
        self.claim.device()
    }

    /// Device node of the first video capture entity, if resolved.
    ///
    /// Prefers the entity flagged as default.
    pub fn video_node(&self) -> Option<&str> {
        let device = self.device();
        let mut nodes = device.entities().iter().filter(|e| e.is_video_node());
        let first = nodes.clone().find(|e| e.is_default());
        first
            .or_else(|| nodes.next())
            .and_then(|entity| entity.device_node())
    }

    /// Whether the backing hardware has been unplugged
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Acquire)
    }

    pub(crate) fn disconnect(&self) {
        if !self.disconnected.swap(true, Ordering::AcqRel) {
            log::info!("Camera {} disconnected", self.id);
        }
    }
}

impl fmt::Display for Camera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.id,
            self.pipeline,
            self.device().device_node()
        )
    }
}
