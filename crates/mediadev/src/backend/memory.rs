// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Scripted in-memory backend

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use super::{Backend, HotplugEvent, Subsystem};
use crate::media::{MediaDevice, MediaDeviceBuilder};
use crate::Error;

#[derive(Debug, Default)]
struct State {
    /// Present nodes; `None` marks a node that cannot be opened
    devices: BTreeMap<String, Option<MediaDeviceBuilder>>,
    /// Insertion order of present nodes
    order: Vec<String>,
    /// Character device numbers with an existing `/dev` node
    char_nodes: BTreeMap<(u32, u32), String>,
    events: VecDeque<HotplugEvent>,
    fail_init: Option<String>,
    channel_lost: Option<String>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    ready: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Backend serving devices described in memory
///
/// Devices are described with [`MediaDeviceBuilder`] and plugged or
/// unplugged at any time through a [`MemoryBackendHandle`], which queues the
/// matching hotplug event. This drives the enumerator and camera manager
/// without kernel devices.
///
/// ```
/// use mediadev::backend::MemoryBackend;
/// use mediadev::media::MediaDeviceBuilder;
/// use mediadev::DeviceEnumerator;
///
/// let backend = MemoryBackend::new();
/// let handle = backend.handle();
/// handle.plug(MediaDeviceBuilder::new("/dev/media0", "uvcvideo").entity("sensor"));
///
/// let mut enumerator = DeviceEnumerator::new(Box::new(backend));
/// enumerator.init()?;
/// assert_eq!(enumerator.enumerate()?, 1);
/// # Ok::<(), mediadev::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

/// Cloneable control handle for a [`MemoryBackend`]
#[derive(Debug, Clone)]
pub struct MemoryBackendHandle {
    shared: Arc<Shared>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle used to plug and unplug devices after the backend has been
    /// moved into an enumerator
    pub fn handle(&self) -> MemoryBackendHandle {
        MemoryBackendHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl MemoryBackendHandle {
    /// Another backend over the same device table, for owners that create
    /// a fresh backend on every start
    pub fn backend(&self) -> MemoryBackend {
        MemoryBackend {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Make a device present and queue an add event for it.
    ///
    /// Plugging a node that is already present replaces its description and
    /// still queues the event, like a kernel that reports the same node twice.
    pub fn plug(&self, device: MediaDeviceBuilder) {
        let node = device.device_node().to_owned();
        self.insert(node, Some(device));
    }

    /// Make a node present that fails to open.
    pub fn plug_broken(&self, node: &str) {
        self.insert(node.to_owned(), None);
    }

    /// Remove a node and queue a remove event for it.
    pub fn unplug(&self, node: &str) {
        let mut state = self.shared.lock();
        state.devices.remove(node);
        state.order.retain(|n| n != node);
        state.events.push_back(HotplugEvent::remove(node));
        self.shared.ready.notify_all();
    }

    /// Queue an arbitrary event without changing the device table.
    pub fn push_event(&self, event: HotplugEvent) {
        let mut state = self.shared.lock();
        state.events.push_back(event);
        self.shared.ready.notify_all();
    }

    /// Create the `/dev` node for a character device number and queue the
    /// matching `video4linux` add event.
    pub fn add_char_node(&self, major: u32, minor: u32, node: &str) {
        let mut state = self.shared.lock();
        state.char_nodes.insert((major, minor), node.to_owned());
        state
            .events
            .push_back(HotplugEvent::add(node).with_subsystem(Subsystem::Video4Linux));
        self.shared.ready.notify_all();
    }

    /// Make the next `init()` fail with the given reason.
    pub fn fail_init(&self, reason: &str) {
        self.shared.lock().fail_init = Some(reason.to_owned());
    }

    /// Make every following `wait_events()` fail as if the channel died.
    pub fn lose_channel(&self, reason: &str) {
        let mut state = self.shared.lock();
        state.channel_lost = Some(reason.to_owned());
        self.shared.ready.notify_all();
    }

    /// Number of queued events not yet delivered
    pub fn pending_events(&self) -> usize {
        self.shared.lock().events.len()
    }

    fn insert(&self, node: String, device: Option<MediaDeviceBuilder>) {
        let mut state = self.shared.lock();
        if state.devices.insert(node.clone(), device).is_none() {
            state.order.push(node.clone());
        }
        state.events.push_back(HotplugEvent::add(&node));
        self.shared.ready.notify_all();
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn init(&mut self) -> Result<(), Error> {
        let mut state = self.shared.lock();
        if let Some(reason) = state.fail_init.take() {
            return Err(Error::BackendUnavailable(reason));
        }
        // Devices present before init are found by scan, not by events.
        state.events.clear();
        Ok(())
    }

    fn scan(&mut self) -> Result<Vec<String>, Error> {
        Ok(self.shared.lock().order.clone())
    }

    fn supports_hotplug(&self) -> bool {
        true
    }

    fn wait_events(&mut self, timeout: Duration) -> Result<Vec<HotplugEvent>, Error> {
        let state = self.shared.lock();
        let (mut state, _) = self
            .shared
            .ready
            .wait_timeout_while(state, timeout, |s| {
                s.events.is_empty() && s.channel_lost.is_none()
            })
            .unwrap_or_else(|e| e.into_inner());

        if let Some(reason) = &state.channel_lost {
            return Err(Error::NotificationChannelLost(reason.clone()));
        }
        Ok(state.events.drain(..).collect())
    }

    fn lookup_device_node(&self, major: u32, minor: u32) -> Option<String> {
        self.shared.lock().char_nodes.get(&(major, minor)).cloned()
    }

    fn create_device(&self, node: &str) -> Result<MediaDevice, Error> {
        let builder = self.shared.lock().devices.get(node).cloned();
        match builder {
            Some(Some(mut builder)) => {
                for entity in builder.entities_mut() {
                    if !entity.is_missing_device_node() {
                        continue;
                    }
                    if let Some(dev) = entity
                        .device_number()
                        .and_then(|(major, minor)| self.lookup_device_node(major, minor))
                    {
                        entity.set_device_node(dev);
                    }
                }
                builder.build()
            }
            Some(None) => Err(Error::open_failure(node, "device refused to open")),
            None => Err(Error::open_failure(node, "no such device")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HotplugAction;

    #[test]
    fn test_scan_in_plug_order() {
        let mut backend = MemoryBackend::new();
        let handle = backend.handle();
        handle.plug(MediaDeviceBuilder::new("/dev/media3", "vimc"));
        handle.plug(MediaDeviceBuilder::new("/dev/media1", "uvcvideo"));
        handle.plug_broken("/dev/media2");

        backend.init().unwrap();
        assert_eq!(
            backend.scan().unwrap(),
            vec!["/dev/media3", "/dev/media1", "/dev/media2"]
        );
        assert_eq!(handle.pending_events(), 0);
    }

    #[test]
    fn test_create_device() {
        let backend = MemoryBackend::new();
        let handle = backend.handle();
        handle.plug(MediaDeviceBuilder::new("/dev/media0", "uvcvideo").entity("sensor"));
        handle.plug_broken("/dev/media1");

        let device = backend.create_device("/dev/media0").unwrap();
        assert_eq!(device.driver(), "uvcvideo");
        assert!(matches!(
            backend.create_device("/dev/media1"),
            Err(Error::DeviceOpenFailure { .. })
        ));
        assert!(backend.create_device("/dev/media9").is_err());
    }

    #[test]
    fn test_char_nodes_resolved() {
        use crate::MediaEntity;

        let backend = MemoryBackend::new();
        let handle = backend.handle();
        handle.plug(
            MediaDeviceBuilder::new("/dev/media0", "uvcvideo")
                .with_entity(MediaEntity::new(1, "video").with_device_number(81, 0)),
        );

        let device = backend.create_device("/dev/media0").unwrap();
        assert_eq!(device.missing_device_nodes(), 1);

        handle.add_char_node(81, 0, "/dev/video0");
        let device = backend.create_device("/dev/media0").unwrap();
        assert_eq!(device.missing_device_nodes(), 0);
        assert_eq!(
            device.entity_by_name("video").unwrap().device_node(),
            Some("/dev/video0")
        );
    }

    #[test]
    fn test_events_drained() {
        let mut backend = MemoryBackend::new();
        let handle = backend.handle();
        backend.init().unwrap();

        handle.plug(MediaDeviceBuilder::new("/dev/media0", "uvcvideo"));
        handle.unplug("/dev/media0");

        let events = backend.wait_events(Duration::from_millis(10)).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, HotplugAction::Add);
        assert_eq!(events[1].action, HotplugAction::Remove);
        assert!(backend
            .wait_events(Duration::from_millis(1))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_failure_injection() {
        let mut backend = MemoryBackend::new();
        let handle = backend.handle();

        handle.fail_init("no netlink");
        assert!(matches!(backend.init(), Err(Error::BackendUnavailable(_))));
        assert!(backend.init().is_ok());

        handle.lose_channel("socket closed");
        assert!(matches!(
            backend.wait_events(Duration::from_millis(1)),
            Err(Error::NotificationChannelLost(_))
        ));
    }
}
