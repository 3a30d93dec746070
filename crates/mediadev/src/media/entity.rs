// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Media graph objects
//!
//! This module defines the nodes and edges of a media controller graph:
//!
//! - [`MediaEntity`] - A named functional block (sensor, ISP stage, capture node)
//! - [`MediaPad`] - A connection point on an entity
//! - [`MediaLink`] - A data link between a source pad and a sink pad

use std::fmt;

use mediadev_sys as ffi;

/// Connection point on a [`MediaEntity`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPad {
    id: u32,
    index: u32,
    entity_id: u32,
    flags: u32,
}

impl MediaPad {
    pub fn new(id: u32, index: u32, entity_id: u32, flags: u32) -> Self {
        Self {
            id,
            index,
            entity_id,
            flags,
        }
    }

    /// Graph-wide object id
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Index of the pad within its entity
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Id of the entity owning this pad
    pub fn entity_id(&self) -> u32 {
        self.entity_id
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn is_sink(&self) -> bool {
        self.flags & ffi::MEDIA_PAD_FL_SINK != 0
    }

    pub fn is_source(&self) -> bool {
        self.flags & ffi::MEDIA_PAD_FL_SOURCE != 0
    }
}

/// Data link between two pads
///
/// Interface links are resolved into entity device numbers while the graph
/// is built and never appear as [`MediaLink`] objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLink {
    id: u32,
    source_pad: u32,
    sink_pad: u32,
    source_entity: u32,
    sink_entity: u32,
    flags: u32,
}

impl MediaLink {
    pub(crate) fn new(
        id: u32,
        (source_pad, source_entity): (u32, u32),
        (sink_pad, sink_entity): (u32, u32),
        flags: u32,
    ) -> Self {
        Self {
            id,
            source_pad,
            sink_pad,
            source_entity,
            sink_entity,
            flags,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Id of the source pad
    pub fn source_pad(&self) -> u32 {
        self.source_pad
    }

    /// Id of the sink pad
    pub fn sink_pad(&self) -> u32 {
        self.sink_pad
    }

    /// Id of the entity owning the source pad
    pub fn source_entity(&self) -> u32 {
        self.source_entity
    }

    /// Id of the entity owning the sink pad
    pub fn sink_entity(&self) -> u32 {
        self.sink_entity
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn is_enabled(&self) -> bool {
        self.flags & ffi::MEDIA_LNK_FL_ENABLED != 0
    }

    pub fn is_immutable(&self) -> bool {
        self.flags & ffi::MEDIA_LNK_FL_IMMUTABLE != 0
    }
}

/// Named functional block within a media device
///
/// Entities are immutable once the owning [`MediaDevice`](super::MediaDevice)
/// has been built. Only the name takes part in device matching; function,
/// flags, pads and device numbers are topology metadata.
///
/// # Example
///
/// ```
/// use mediadev::MediaEntity;
///
/// let sensor = MediaEntity::new(1, "ov5640 1-003c").with_function(0x00020001);
/// assert!(sensor.is_sensor());
/// assert_eq!(sensor.function_name(), "Camera Sensor");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaEntity {
    id: u32,
    name: String,
    function: u32,
    flags: u32,
    device_number: Option<(u32, u32)>,
    device_node: Option<String>,
    pads: Vec<MediaPad>,
}

impl MediaEntity {
    pub fn new(id: u32, name: &str) -> Self {
        Self {
            id,
            name: name.to_owned(),
            function: ffi::MEDIA_ENT_F_UNKNOWN,
            flags: 0,
            device_number: None,
            device_node: None,
            pads: Vec::new(),
        }
    }

    pub fn with_function(self, function: u32) -> Self {
        Self { function, ..self }
    }

    pub fn with_flags(self, flags: u32) -> Self {
        Self { flags, ..self }
    }

    /// Character device numbers of the interface exposing this entity
    pub fn with_device_number(self, major: u32, minor: u32) -> Self {
        Self {
            device_number: Some((major, minor)),
            ..self
        }
    }

    pub fn with_device_node(self, node: &str) -> Self {
        Self {
            device_node: Some(node.to_owned()),
            ..self
        }
    }

    /// Append a pad; its index is the number of pads already present.
    pub fn with_pad(mut self, id: u32, flags: u32) -> Self {
        let index = self.pads.len() as u32;
        self.pads.push(MediaPad::new(id, index, self.id, flags));
        self
    }

    pub(crate) fn push_pad(&mut self, pad: MediaPad) {
        self.pads.push(pad);
    }

    pub(crate) fn set_device_number(&mut self, major: u32, minor: u32) {
        self.device_number = Some((major, minor));
    }

    pub(crate) fn set_device_node(&mut self, node: String) {
        self.device_node = Some(node);
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entity function code (`MEDIA_ENT_F_*`)
    pub fn function(&self) -> u32 {
        self.function
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Whether this is the default entity of its function type
    pub fn is_default(&self) -> bool {
        self.flags & ffi::MEDIA_ENT_FL_DEFAULT != 0
    }

    pub fn is_sensor(&self) -> bool {
        self.function == ffi::MEDIA_ENT_F_CAM_SENSOR
    }

    /// Whether the entity is a V4L2 video capture/output node
    pub fn is_video_node(&self) -> bool {
        self.function == ffi::MEDIA_ENT_F_IO_V4L
    }

    /// `(major, minor)` of the character device exposing the entity, if any
    pub fn device_number(&self) -> Option<(u32, u32)> {
        self.device_number
    }

    /// Resolved `/dev` path of the entity, if it exposes one and the node exists
    pub fn device_node(&self) -> Option<&str> {
        self.device_node.as_deref()
    }

    /// True when the entity has a device number that could not be resolved
    pub fn is_missing_device_node(&self) -> bool {
        self.device_number.is_some() && self.device_node.is_none()
    }

    pub fn pads(&self) -> &[MediaPad] {
        &self.pads
    }

    /// Pad by index within this entity
    pub fn pad(&self, index: u32) -> Option<&MediaPad> {
        self.pads.iter().find(|pad| pad.index == index)
    }

    /// Human-readable name of the entity function
    pub fn function_name(&self) -> &'static str {
        match self.function {
            ffi::MEDIA_ENT_F_IO_V4L => "V4L2 I/O",
            ffi::MEDIA_ENT_F_IO_DTV => "DVB I/O",
            ffi::MEDIA_ENT_F_IO_VBI => "VBI I/O",
            ffi::MEDIA_ENT_F_IO_SWRADIO => "SDR I/O",
            ffi::MEDIA_ENT_F_CAM_SENSOR => "Camera Sensor",
            ffi::MEDIA_ENT_F_FLASH => "Flash",
            ffi::MEDIA_ENT_F_LENS => "Lens",
            ffi::MEDIA_ENT_F_PROC_VIDEO_COMPOSER => "Video Composer",
            ffi::MEDIA_ENT_F_PROC_VIDEO_PIXEL_FORMATTER => "Pixel Formatter",
            ffi::MEDIA_ENT_F_PROC_VIDEO_PIXEL_ENC_CONV => "Pixel Encoding Converter",
            ffi::MEDIA_ENT_F_PROC_VIDEO_LUT => "Look-Up Table",
            ffi::MEDIA_ENT_F_PROC_VIDEO_SCALER => "Scaler",
            ffi::MEDIA_ENT_F_PROC_VIDEO_STATISTICS => "Statistics",
            ffi::MEDIA_ENT_F_PROC_VIDEO_ENCODER => "Encoder",
            ffi::MEDIA_ENT_F_PROC_VIDEO_DECODER => "Decoder",
            ffi::MEDIA_ENT_F_PROC_VIDEO_ISP => "ISP",
            ffi::MEDIA_ENT_F_VID_MUX => "Video Mux",
            ffi::MEDIA_ENT_F_VID_IF_BRIDGE => "Video Interface Bridge",
            ffi::MEDIA_ENT_F_V4L2_SUBDEV_UNKNOWN => "V4L2 Subdevice",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for MediaEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" ({})", self.name, self.function_name())?;
        if let Some(node) = &self.device_node {
            write!(f, " {}", node)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_direction() {
        let entity = MediaEntity::new(1, "Scaler")
            .with_pad(2, ffi::MEDIA_PAD_FL_SINK)
            .with_pad(3, ffi::MEDIA_PAD_FL_SOURCE);

        assert_eq!(entity.pads().len(), 2);
        assert!(entity.pad(0).unwrap().is_sink());
        assert!(entity.pad(1).unwrap().is_source());
        assert_eq!(entity.pad(1).unwrap().entity_id(), 1);
        assert!(entity.pad(2).is_none());
    }

    #[test]
    fn test_missing_device_node() {
        let entity = MediaEntity::new(1, "Raw Capture 0").with_device_number(81, 3);
        assert!(entity.is_missing_device_node());

        let entity = entity.with_device_node("/dev/video3");
        assert!(!entity.is_missing_device_node());

        let sensor = MediaEntity::new(2, "Sensor A");
        assert!(!sensor.is_missing_device_node());
    }

    #[test]
    fn test_entity_display() {
        let entity = MediaEntity::new(1, "Raw Capture 0")
            .with_function(ffi::MEDIA_ENT_F_IO_V4L)
            .with_device_node("/dev/video0");
        assert_eq!(format!("{}", entity), "\"Raw Capture 0\" (V4L2 I/O) /dev/video0");
    }
}
