// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Media Controller Device Model
//!
//! This module models Linux media controller devices (`/dev/media*`) as
//! passive, immutable data: identification strings plus the graph of named
//! entities, pads and links the kernel exposes.
//!
//! # Graph Objects
//!
//! | Type | Description | Example |
//! |------|-------------|---------|
//! | [`MediaEntity`] | Named functional block | "ov5640 1-003c", "Raw Capture 0" |
//! | [`MediaPad`] | Sink or source connection point on an entity | pad 0 of "Scaler" |
//! | [`MediaLink`] | Data link from a source pad to a sink pad | sensor → CSI receiver |
//!
//! # Ownership
//!
//! A [`MediaDevice`] is shared through `Arc`. The registry keeps one handle
//! and a bound camera keeps another through a [`DeviceClaim`]; see
//! [`DeviceState`] for the claim lifecycle.
//!
//! # Building Devices
//!
//! Real devices come from [`MediaDevice::open`], which reads the topology with
//! `MEDIA_IOC_G_TOPOLOGY`. Synthetic devices for tests and in-memory
//! backends come from [`MediaDeviceBuilder`]:
//!
//! ```
//! use mediadev::media::MediaDeviceBuilder;
//!
//! let device = MediaDeviceBuilder::new("/dev/media1", "uvcvideo")
//!     .entity("sensor")
//!     .entity("uvcvideo-source")
//!     .build()?;
//! assert_eq!(device.entities().len(), 2);
//! # Ok::<(), mediadev::Error>(())
//! ```

mod device;
mod entity;
mod topology;

pub use device::{DeviceClaim, DeviceState, MediaDevice, MediaDeviceBuilder};
pub use entity::{MediaEntity, MediaLink, MediaPad};
