// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Media device descriptor and claim tracking

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use super::entity::{MediaEntity, MediaLink};
use crate::Error;

/// Claim state of a [`MediaDevice`]
///
/// ```text
/// Unclaimed ──claim()──▶ Claimed ──claim dropped──▶ Unclaimed
///     │                     │
///     └──── removed ────────┴──▶ PendingRemoval ──last handle dropped──▶ (destroyed)
/// ```
///
/// `PendingRemoval` is terminal: the device has left the registry and will
/// never be returned by a search again, whatever handles are still alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeviceState {
    /// Registered and available for binding
    Unclaimed = 0,
    /// Bound to a camera
    Claimed = 1,
    /// Removed from the registry, alive only through outstanding handles
    PendingRemoval = 2,
}

impl DeviceState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => DeviceState::Unclaimed,
            1 => DeviceState::Claimed,
            _ => DeviceState::PendingRemoval,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeviceState::Unclaimed => "unclaimed",
            DeviceState::Claimed => "claimed",
            DeviceState::PendingRemoval => "pending removal",
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Kernel media controller device
///
/// A `MediaDevice` describes one `/dev/media*` node: its identification
/// strings and the graph of entities, pads and links it exposes. The graph
/// and the driver name never change once the device is built; a topology
/// change is a remove followed by a fresh add.
///
/// Devices are shared through `Arc` handles. The
/// [`DeviceEnumerator`](crate::DeviceEnumerator) holds one handle for every
/// registered device; a camera binding the device holds a [`DeviceClaim`]
/// that owns a second one. The device is freed when the last handle goes,
/// in whichever order they are released.
///
/// # Example
///
/// ```
/// use mediadev::media::MediaDeviceBuilder;
///
/// let device = MediaDeviceBuilder::new("/dev/media0", "uvcvideo")
///     .with_model("HD Webcam")
///     .entity("HD Webcam: Video Capture")
///     .build()?;
///
/// assert_eq!(device.driver(), "uvcvideo");
/// assert!(device.entity_by_name("HD Webcam: Video Capture").is_some());
/// # Ok::<(), mediadev::Error>(())
/// ```
#[derive(Debug)]
pub struct MediaDevice {
    device_node: String,
    driver: String,
    model: String,
    serial: String,
    bus_info: String,
    hw_revision: u32,
    media_version: u32,
    driver_version: u32,
    topology_version: u64,
    entities: Vec<MediaEntity>,
    links: Vec<MediaLink>,
    state: AtomicU8,
}

impl MediaDevice {
    /// Device node path (e.g., "/dev/media0"), unique among live devices
    pub fn device_node(&self) -> &str {
        &self.device_node
    }

    /// Kernel driver name (e.g., "uvcvideo", "vimc")
    pub fn driver(&self) -> &str {
        &self.driver
    }

    /// Device model name reported by the driver
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Bus location (e.g., "usb-0000:00:14.0-1")
    pub fn bus_info(&self) -> &str {
        &self.bus_info
    }

    pub fn hw_revision(&self) -> u32 {
        self.hw_revision
    }

    /// Media API version as `(major << 16) | (minor << 8) | patch`
    pub fn media_version(&self) -> u32 {
        self.media_version
    }

    pub fn driver_version(&self) -> u32 {
        self.driver_version
    }

    pub fn topology_version(&self) -> u64 {
        self.topology_version
    }

    /// Entities in the order the kernel reported them
    pub fn entities(&self) -> &[MediaEntity] {
        &self.entities
    }

    /// Look up an entity by exact name
    pub fn entity_by_name(&self, name: &str) -> Option<&MediaEntity> {
        self.entities.iter().find(|entity| entity.name() == name)
    }

    /// Look up an entity by graph id
    pub fn entity(&self, id: u32) -> Option<&MediaEntity> {
        self.entities.iter().find(|entity| entity.id() == id)
    }

    pub fn links(&self) -> &[MediaLink] {
        &self.links
    }

    /// Links whose source pad belongs to the given entity
    pub fn links_from(&self, entity_id: u32) -> impl Iterator<Item = &MediaLink> {
        self.links
            .iter()
            .filter(move |link| link.source_entity() == entity_id)
    }

    /// Number of entities whose device node could not be resolved yet
    pub fn missing_device_nodes(&self) -> usize {
        self.entities
            .iter()
            .filter(|entity| entity.is_missing_device_node())
            .count()
    }

    pub fn state(&self) -> DeviceState {
        DeviceState::from_raw(self.state.load(Ordering::Acquire))
    }

    pub fn is_claimed(&self) -> bool {
        self.state() == DeviceState::Claimed
    }

    /// Whether the device has left the registry
    pub fn is_removed(&self) -> bool {
        self.state() == DeviceState::PendingRemoval
    }

    /// Claim the device for binding.
    ///
    /// Succeeds only for an `Unclaimed` device; returns `None` if it is
    /// already claimed or has been removed. The returned guard owns a handle
    /// to the device and releases the claim when dropped.
    pub fn claim(self: &Arc<Self>) -> Option<DeviceClaim> {
        self.state
            .compare_exchange(
                DeviceState::Unclaimed as u8,
                DeviceState::Claimed as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()?;

        log::debug!("Media device {} claimed", self.device_node);
        Some(DeviceClaim {
            device: Arc::clone(self),
        })
    }

    /// Move the device to `PendingRemoval`, returning the previous state.
    pub(crate) fn mark_removed(&self) -> DeviceState {
        DeviceState::from_raw(
            self.state
                .swap(DeviceState::PendingRemoval as u8, Ordering::AcqRel),
        )
    }
}

impl fmt::Display for MediaDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.device_node, self.model, self.driver)
    }
}

impl Drop for MediaDevice {
    fn drop(&mut self) {
        log::debug!("Media device {} destroyed", self.device_node);
    }
}

/// Exclusive binding of a [`MediaDevice`]
///
/// Holding a claim keeps the device alive even after it has been removed
/// from the registry. Dropping the claim returns a still-registered device to
/// `Unclaimed`; a removed device stays `PendingRemoval`.
#[derive(Debug)]
pub struct DeviceClaim {
    device: Arc<MediaDevice>,
}

impl DeviceClaim {
    pub fn device(&self) -> &Arc<MediaDevice> {
        &self.device
    }
}

impl Drop for DeviceClaim {
    fn drop(&mut self) {
        let released = self
            .device
            .state
            .compare_exchange(
                DeviceState::Claimed as u8,
                DeviceState::Unclaimed as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();

        if released {
            log::debug!("Media device {} released", self.device.device_node);
        }
    }
}

/// Builder for [`MediaDevice`]
///
/// Used by backends after reading a device topology, and by tests and
/// in-memory backends to describe hardware directly. Object ids for
/// entities, pads and links added through the convenience methods are
/// allocated automatically.
#[derive(Debug, Clone)]
pub struct MediaDeviceBuilder {
    device_node: String,
    driver: String,
    model: String,
    serial: String,
    bus_info: String,
    hw_revision: u32,
    media_version: u32,
    driver_version: u32,
    topology_version: u64,
    entities: Vec<MediaEntity>,
    links: Vec<(u32, u32, u32, u32)>,
    next_id: u32,
}

impl MediaDeviceBuilder {
    pub fn new(device_node: &str, driver: &str) -> Self {
        Self {
            device_node: device_node.to_owned(),
            driver: driver.to_owned(),
            model: String::new(),
            serial: String::new(),
            bus_info: String::new(),
            hw_revision: 0,
            media_version: 0,
            driver_version: 0,
            topology_version: 0,
            entities: Vec::new(),
            links: Vec::new(),
            next_id: 1,
        }
    }

    pub fn device_node(&self) -> &str {
        &self.device_node
    }

    pub fn with_model(self, model: &str) -> Self {
        Self {
            model: model.to_owned(),
            ..self
        }
    }

    pub fn with_serial(self, serial: &str) -> Self {
        Self {
            serial: serial.to_owned(),
            ..self
        }
    }

    pub fn with_bus_info(self, bus_info: &str) -> Self {
        Self {
            bus_info: bus_info.to_owned(),
            ..self
        }
    }

    pub fn with_hw_revision(self, hw_revision: u32) -> Self {
        Self {
            hw_revision,
            ..self
        }
    }

    pub fn with_media_version(self, media_version: u32) -> Self {
        Self {
            media_version,
            ..self
        }
    }

    pub fn with_driver_version(self, driver_version: u32) -> Self {
        Self {
            driver_version,
            ..self
        }
    }

    pub fn with_topology_version(self, topology_version: u64) -> Self {
        Self {
            topology_version,
            ..self
        }
    }

    /// Add a fully described entity
    pub fn with_entity(mut self, entity: MediaEntity) -> Self {
        self.reserve_id(entity.id());
        for pad in entity.pads() {
            self.reserve_id(pad.id());
        }
        self.entities.push(entity);
        self
    }

    /// Add an entity with only a name and an automatically allocated id
    pub fn entity(self, name: &str) -> Self {
        let id = self.next_id;
        self.with_entity(MediaEntity::new(id, name))
    }

    /// Add a data link between two pad ids
    pub fn with_link(mut self, source_pad: u32, sink_pad: u32, flags: u32) -> Self {
        let id = self.next_id;
        self.reserve_id(id);
        self.links.push((id, source_pad, sink_pad, flags));
        self
    }

    pub(crate) fn push_link(&mut self, id: u32, source_pad: u32, sink_pad: u32, flags: u32) {
        self.reserve_id(id);
        self.links.push((id, source_pad, sink_pad, flags));
    }

    pub(crate) fn push_entity(&mut self, entity: MediaEntity) {
        self.reserve_id(entity.id());
        self.entities.push(entity);
    }

    pub(crate) fn entities_mut(&mut self) -> &mut [MediaEntity] {
        &mut self.entities
    }

    fn reserve_id(&mut self, id: u32) {
        if id >= self.next_id {
            self.next_id = id.saturating_add(1);
        }
    }

    /// Validate the graph and build the device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceOpenFailure`] if the driver name is empty, two
    /// entities share a name or an id, or a link references an unknown pad.
    pub fn build(self) -> Result<MediaDevice, Error> {
        let node = self.device_node.as_str();

        if self.driver.is_empty() {
            return Err(Error::open_failure(node, "driver name is empty"));
        }

        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        let mut pad_owner = HashMap::new();
        for entity in &self.entities {
            if !names.insert(entity.name()) {
                return Err(Error::open_failure(
                    node,
                    format!("duplicate entity name \"{}\"", entity.name()),
                ));
            }
            if !ids.insert(entity.id()) {
                return Err(Error::open_failure(
                    node,
                    format!("duplicate entity id {}", entity.id()),
                ));
            }
            for pad in entity.pads() {
                pad_owner.insert(pad.id(), entity.id());
            }
        }

        let mut links = Vec::with_capacity(self.links.len());
        for &(id, source_pad, sink_pad, flags) in &self.links {
            let source_entity = pad_owner.get(&source_pad).copied().ok_or_else(|| {
                Error::open_failure(node, format!("link {} has unknown source pad {}", id, source_pad))
            })?;
            let sink_entity = pad_owner.get(&sink_pad).copied().ok_or_else(|| {
                Error::open_failure(node, format!("link {} has unknown sink pad {}", id, sink_pad))
            })?;
            links.push(MediaLink::new(
                id,
                (source_pad, source_entity),
                (sink_pad, sink_entity),
                flags,
            ));
        }

        Ok(MediaDevice {
            device_node: self.device_node,
            driver: self.driver,
            model: self.model,
            serial: self.serial,
            bus_info: self.bus_info,
            hw_revision: self.hw_revision,
            media_version: self.media_version,
            driver_version: self.driver_version,
            topology_version: self.topology_version,
            entities: self.entities,
            links,
            state: AtomicU8::new(DeviceState::Unclaimed as u8),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediadev_sys as ffi;

    fn vimc_like() -> MediaDeviceBuilder {
        MediaDeviceBuilder::new("/dev/media0", "vimc")
            .with_model("VIMC MDEV")
            .with_entity(
                MediaEntity::new(1, "Sensor A")
                    .with_function(ffi::MEDIA_ENT_F_CAM_SENSOR)
                    .with_pad(2, ffi::MEDIA_PAD_FL_SOURCE),
            )
            .with_entity(
                MediaEntity::new(3, "Raw Capture 0")
                    .with_function(ffi::MEDIA_ENT_F_IO_V4L)
                    .with_pad(4, ffi::MEDIA_PAD_FL_SINK),
            )
            .with_link(2, 4, ffi::MEDIA_LNK_FL_ENABLED | ffi::MEDIA_LNK_FL_IMMUTABLE)
    }

    #[test]
    fn test_build_resolves_links() {
        let device = vimc_like().build().unwrap();
        assert_eq!(device.links().len(), 1);

        let link = &device.links()[0];
        assert_eq!(link.source_entity(), 1);
        assert_eq!(link.sink_entity(), 3);
        assert!(link.is_enabled());
        assert!(link.is_immutable());
        assert_eq!(device.links_from(1).count(), 1);
        assert_eq!(device.links_from(3).count(), 0);
    }

    #[test]
    fn test_build_rejects_duplicate_names() {
        let result = MediaDeviceBuilder::new("/dev/media0", "vimc")
            .entity("Scaler")
            .entity("Scaler")
            .build();
        assert!(matches!(result, Err(Error::DeviceOpenFailure { .. })));
    }

    #[test]
    fn test_build_rejects_dangling_link() {
        let result = vimc_like().with_link(2, 99, 0).build();
        assert!(matches!(result, Err(Error::DeviceOpenFailure { .. })));
    }

    #[test]
    fn test_build_rejects_empty_driver() {
        let result = MediaDeviceBuilder::new("/dev/media0", "").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_auto_ids_do_not_collide() {
        let device = vimc_like().entity("Debayer A").build().unwrap();
        let debayer = device.entity_by_name("Debayer A").unwrap();
        assert!(debayer.id() > 4);
        assert_eq!(device.entity(debayer.id()).unwrap().name(), "Debayer A");
    }

    #[test]
    fn test_claim_is_exclusive() {
        let device = Arc::new(vimc_like().build().unwrap());
        assert_eq!(device.state(), DeviceState::Unclaimed);

        let claim = device.claim().expect("first claim succeeds");
        assert!(device.is_claimed());
        assert!(device.claim().is_none());
        assert!(Arc::ptr_eq(claim.device(), &device));

        drop(claim);
        assert_eq!(device.state(), DeviceState::Unclaimed);
        assert!(device.claim().is_some());
    }

    #[test]
    fn test_removed_device_stays_removed() {
        let device = Arc::new(vimc_like().build().unwrap());
        let claim = device.claim().unwrap();

        assert_eq!(device.mark_removed(), DeviceState::Claimed);
        drop(claim);

        assert_eq!(device.state(), DeviceState::PendingRemoval);
        assert!(device.claim().is_none());
    }

    #[test]
    fn test_claim_keeps_device_alive() {
        let device = Arc::new(vimc_like().build().unwrap());
        let claim = device.claim().unwrap();
        drop(device);

        assert_eq!(claim.device().driver(), "vimc");
        assert_eq!(Arc::strong_count(claim.device()), 1);
    }
}
