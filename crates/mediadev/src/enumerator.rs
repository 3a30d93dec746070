// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Media Device Enumerator
//!
//! This module provides the [`DeviceEnumerator`], the registry of every media
//! controller device currently present on the system, and the
//! [`DeviceListener`] interface through which the camera registry learns
//! about devices appearing and disappearing.

use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::backend::{Backend, BackendKind, HotplugAction, HotplugEvent, Subsystem};
use crate::device_match::DeviceMatch;
use crate::media::{DeviceState, MediaDevice};
use crate::Error;

/// Receiver of registry change notifications
///
/// Listeners are called on the thread driving the enumerator, strictly after
/// the registry has been updated. `device_added` receives the enumerator so
/// the listener can [`search`](DeviceEnumerator::search) synchronously; the
/// shared borrow prevents mutating the registry from inside a callback.
pub trait DeviceListener: Send + Sync {
    /// A device has been inserted into the registry
    fn device_added(&self, _enumerator: &DeviceEnumerator, _device: &Arc<MediaDevice>) {}

    /// A device has left the registry. Any claim on it is still held by the
    /// claimant, and the device is already `PendingRemoval`.
    fn device_removed(&self, _device: &Arc<MediaDevice>) {}
}

/// Subscription identifier returned by [`DeviceEnumerator::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hotplug {
    Inactive,
    Active,
    Lost,
}

/// Registry of live media devices
///
/// The enumerator discovers `/dev/media*` devices through a [`Backend`],
/// keeps one `Arc` handle to each in insertion order and answers
/// [`DeviceMatch`] queries from pipeline handlers. It is a plain value that
/// must be driven from a single thread; see
/// [`EventLoop`](crate::event_loop::EventLoop) for running it with hotplug.
///
/// # Example
///
/// ```no_run
/// use mediadev::{DeviceEnumerator, DeviceMatch};
///
/// let mut enumerator = DeviceEnumerator::create()?;
/// let count = enumerator.enumerate()?;
/// println!("Found {} media devices", count);
///
/// let mut dm = DeviceMatch::new("vimc");
/// dm.add("Sensor A");
/// dm.add("Raw Capture 0");
///
/// if let Some(device) = enumerator.search(&dm) {
///     let claim = device.claim().expect("search returns unclaimed devices");
///     println!("Bound {}", claim.device());
/// }
/// # Ok::<(), mediadev::Error>(())
/// ```
///
/// # Identity
///
/// Devices are keyed by device node path. Adding a device whose path is
/// already registered keeps the existing device and discards the new one.
pub struct DeviceEnumerator {
    backend: Box<dyn Backend>,
    devices: Vec<Arc<MediaDevice>>,
    deferred: Vec<String>,
    listeners: Vec<(ListenerId, Weak<dyn DeviceListener>)>,
    next_listener: u64,
    hotplug: Hotplug,
}

impl DeviceEnumerator {
    /// Create an enumerator over the given backend.
    ///
    /// The backend is not initialised; call [`init`](Self::init) before
    /// [`enumerate`](Self::enumerate).
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            devices: Vec::new(),
            deferred: Vec::new(),
            listeners: Vec::new(),
            next_listener: 0,
            hotplug: Hotplug::Inactive,
        }
    }

    /// Create and initialise an enumerator for the best available backend.
    ///
    /// Honours `MEDIADEV_BACKEND`; a forced backend that fails to initialise
    /// is an error. Otherwise udev is tried first and sysfs is used when
    /// libudev cannot be loaded or the monitor cannot be opened.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] if no backend can be initialised.
    pub fn create() -> Result<Self, Error> {
        if let Some(kind) = BackendKind::from_env() {
            log::debug!("Using {} backend from environment", kind);
            let mut enumerator = Self::new(kind.create());
            enumerator.init()?;
            return Ok(enumerator);
        }

        let mut enumerator = Self::new(BackendKind::Udev.create());
        match enumerator.init() {
            Ok(()) => Ok(enumerator),
            Err(err) => {
                log::info!("{}, falling back to sysfs", err);
                let mut enumerator = Self::new(BackendKind::Sysfs.create());
                enumerator.init()?;
                Ok(enumerator)
            }
        }
    }

    /// Open the backend's discovery and hotplug mechanism.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] on failure; the enumerator is
    /// then unusable and keeps no partial state.
    pub fn init(&mut self) -> Result<(), Error> {
        self.backend.init().map_err(|err| match err {
            Error::BackendUnavailable(_) => err,
            other => Error::BackendUnavailable(other.to_string()),
        })?;

        self.hotplug = if self.backend.supports_hotplug() {
            Hotplug::Active
        } else {
            Hotplug::Inactive
        };
        log::info!(
            "Device enumerator using {} backend (hotplug {})",
            self.backend.name(),
            if self.hotplug == Hotplug::Active { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    /// Name of the backend in use
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Scan for media devices present now and register them.
    ///
    /// Candidates that fail to open are logged and skipped. Returns the
    /// number of devices added to the registry.
    ///
    /// # Errors
    ///
    /// Returns an error only if the scan mechanism itself fails.
    pub fn enumerate(&mut self) -> Result<usize, Error> {
        let nodes = self.backend.scan()?;
        log::debug!("Scan found {} candidate nodes", nodes.len());

        let mut added = 0;
        for node in nodes {
            match self.create_device(&node) {
                Ok(device) => {
                    if device.missing_device_nodes() > 0 {
                        log::warn!(
                            "{}: {} entities without device node",
                            node,
                            device.missing_device_nodes()
                        );
                    }
                    if self.add_device(device) {
                        added += 1;
                    }
                }
                Err(err) => log::warn!("Skipping {}: {}", node, err),
            }
        }

        Ok(added)
    }

    /// Open a device node and build its device description.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceOpenFailure`] if the node is not a media
    /// controller device or its topology cannot be read.
    pub fn create_device(&self, node: &str) -> Result<MediaDevice, Error> {
        self.backend.create_device(node)
    }

    /// Insert a device into the registry and notify listeners.
    ///
    /// A device whose node path is already registered is discarded and the
    /// existing one kept; no listener is called in that case. Returns whether
    /// the device was inserted.
    pub fn add_device(&mut self, device: MediaDevice) -> bool {
        if self.device(device.device_node()).is_some() {
            log::debug!(
                "Media device {} already registered, ignoring",
                device.device_node()
            );
            return false;
        }

        let device = Arc::new(device);
        self.devices.push(Arc::clone(&device));
        log::info!("Added media device {}", device);

        for listener in self.live_listeners() {
            listener.device_added(self, &device);
        }
        true
    }

    /// Remove a device from the registry and notify listeners.
    ///
    /// An unclaimed device is destroyed once no other handle is left; a
    /// claimed one stays alive through its claim in `PendingRemoval`. Returns
    /// whether a device was registered under `node`.
    pub fn remove_device(&mut self, node: &str) -> bool {
        let Some(pos) = self.devices.iter().position(|d| d.device_node() == node) else {
            log::debug!("Remove of unknown media device {}", node);
            return false;
        };

        let device = self.devices.remove(pos);
        match device.mark_removed() {
            DeviceState::Claimed => {
                log::info!("Removed media device {} (still in use)", device)
            }
            _ => log::info!("Removed media device {}", device),
        }

        for listener in self.live_listeners() {
            listener.device_removed(&device);
        }
        true
    }

    /// Find the first unclaimed device satisfying a match.
    ///
    /// Devices are examined in insertion order, so the result is
    /// deterministic for a given registry. The device is not claimed; call
    /// [`MediaDevice::claim`] to bind it.
    pub fn search(&self, dm: &DeviceMatch) -> Option<Arc<MediaDevice>> {
        let found = self
            .devices
            .iter()
            .find(|device| device.state() == DeviceState::Unclaimed && dm.matches(device))
            .cloned();

        match &found {
            Some(device) => log::debug!("{} matched {}", dm, device.device_node()),
            None => log::trace!("No device matching {}", dm),
        }
        found
    }

    /// Registered devices in insertion order
    pub fn devices(&self) -> &[Arc<MediaDevice>] {
        &self.devices
    }

    /// Registered device by node path
    pub fn device(&self, node: &str) -> Option<&Arc<MediaDevice>> {
        self.devices.iter().find(|d| d.device_node() == node)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Drop every registered device without notifying listeners.
    ///
    /// Devices still held through a claim move to `PendingRemoval`, so they
    /// are never bound again once a new registry scans the same nodes.
    /// Returns the number of devices that were registered.
    pub fn clear(&mut self) -> usize {
        self.deferred.clear();
        let count = self.devices.len();
        for device in self.devices.drain(..) {
            if device.mark_removed() == DeviceState::Claimed {
                log::debug!("Media device {} left the registry in use", device);
            }
        }
        count
    }

    /// Nodes seen by hotplug whose entity device nodes are still missing
    pub fn deferred(&self) -> &[String] {
        &self.deferred
    }

    /// Whether hotplug notifications are currently delivered
    pub fn hotplug_active(&self) -> bool {
        self.hotplug == Hotplug::Active
    }

    /// Register a listener.
    ///
    /// The enumerator keeps only a weak reference; a listener that has been
    /// dropped is skipped and pruned.
    pub fn subscribe(&mut self, listener: Weak<dyn DeviceListener>) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Remove a listener. Returns false if the id is unknown.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    fn live_listeners(&mut self) -> Vec<Arc<dyn DeviceListener>> {
        self.listeners
            .retain(|(_, listener)| listener.strong_count() > 0);
        self.listeners
            .iter()
            .filter_map(|(_, listener)| listener.upgrade())
            .collect()
    }

    /// Apply one hotplug event to the registry.
    pub fn handle_event(&mut self, event: &HotplugEvent) {
        log::debug!("Hotplug event: {} ({:?})", event, event.subsystem);

        match (&event.subsystem, event.action) {
            (Subsystem::Media, HotplugAction::Add) => self.hotplug_add(&event.node),
            (Subsystem::Media, HotplugAction::Remove) => {
                self.deferred.retain(|node| node != &event.node);
                self.remove_device(&event.node);
            }
            _ => {}
        }

        if event.action == HotplugAction::Add && !self.deferred.is_empty() {
            self.retry_deferred();
        }
    }

    fn hotplug_add(&mut self, node: &str) {
        if self.device(node).is_some() {
            log::debug!("Media device {} already registered, ignoring", node);
            return;
        }

        match self.create_device(node) {
            Ok(device) if device.missing_device_nodes() > 0 => {
                log::debug!(
                    "Deferring {}: waiting for {} device nodes",
                    node,
                    device.missing_device_nodes()
                );
                if !self.deferred.iter().any(|n| n == node) {
                    self.deferred.push(node.to_owned());
                }
            }
            Ok(device) => {
                self.add_device(device);
            }
            Err(err) => log::warn!("Ignoring hotplugged {}: {}", node, err),
        }
    }

    fn retry_deferred(&mut self) {
        for node in std::mem::take(&mut self.deferred) {
            match self.create_device(&node) {
                Ok(device) if device.missing_device_nodes() > 0 => self.deferred.push(node),
                Ok(device) => {
                    log::debug!("Deferred media device {} is complete", node);
                    self.add_device(device);
                }
                Err(err) => log::warn!("Dropping deferred {}: {}", node, err),
            }
        }
    }

    /// Wait up to `timeout` for hotplug events and apply them.
    ///
    /// Returns the number of events processed. Without hotplug support this
    /// just sleeps for `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotificationChannelLost`] the first time the channel
    /// fails. Hotplug is then disabled; registered devices stay valid and
    /// later calls sleep without error.
    pub fn process_events(&mut self, timeout: Duration) -> Result<usize, Error> {
        if self.hotplug != Hotplug::Active {
            std::thread::sleep(timeout);
            return Ok(0);
        }

        let events = match self.backend.wait_events(timeout) {
            Ok(events) => events,
            Err(err) => {
                self.hotplug = Hotplug::Lost;
                return Err(match err {
                    Error::NotificationChannelLost(_) => err,
                    other => Error::NotificationChannelLost(other.to_string()),
                });
            }
        };

        for event in &events {
            self.handle_event(event);
        }
        Ok(events.len())
    }
}

impl Drop for DeviceEnumerator {
    fn drop(&mut self) {
        let count = self.clear();
        log::debug!("Device enumerator dropped with {} media devices", count);
    }
}

impl std::fmt::Debug for DeviceEnumerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceEnumerator")
            .field("backend", &self.backend.name())
            .field("devices", &self.devices.len())
            .field("deferred", &self.deferred)
            .field("listeners", &self.listeners.len())
            .field("hotplug", &self.hotplug)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, MemoryBackendHandle};
    use crate::media::MediaDeviceBuilder;
    use crate::MediaEntity;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
        search: Option<DeviceMatch>,
    }

    impl DeviceListener for Recorder {
        fn device_added(&self, enumerator: &DeviceEnumerator, device: &Arc<MediaDevice>) {
            let mut events = self.events.lock().unwrap();
            events.push(format!("added {}", device.device_node()));
            if let Some(dm) = &self.search {
                let found = enumerator.search(dm).map(|d| d.device_node().to_owned());
                events.push(format!("found {:?}", found));
            }
        }

        fn device_removed(&self, device: &Arc<MediaDevice>) {
            self.events
                .lock()
                .unwrap()
                .push(format!("removed {}", device.device_node()));
        }
    }

    fn enumerator() -> (DeviceEnumerator, MemoryBackendHandle) {
        let backend = MemoryBackend::new();
        let handle = backend.handle();
        let mut enumerator = DeviceEnumerator::new(Box::new(backend));
        enumerator.init().unwrap();
        (enumerator, handle)
    }

    fn uvc(node: &str) -> MediaDevice {
        MediaDeviceBuilder::new(node, "uvcvideo")
            .entity("sensor")
            .build()
            .unwrap()
    }

    #[test]
    fn test_duplicate_add_keeps_existing() {
        let (mut enumerator, _) = enumerator();
        assert!(enumerator.add_device(uvc("/dev/media0")));
        let first = Arc::clone(&enumerator.devices()[0]);

        assert!(!enumerator.add_device(uvc("/dev/media0")));
        assert_eq!(enumerator.len(), 1);
        assert!(Arc::ptr_eq(&first, &enumerator.devices()[0]));
    }

    #[test]
    fn test_search_skips_claimed() {
        let (mut enumerator, _) = enumerator();
        enumerator.add_device(uvc("/dev/media0"));
        enumerator.add_device(uvc("/dev/media1"));

        let dm = DeviceMatch::new("uvcvideo");
        let first = enumerator.search(&dm).unwrap();
        assert_eq!(first.device_node(), "/dev/media0");

        let _claim = first.claim().unwrap();
        let second = enumerator.search(&dm).unwrap();
        assert_eq!(second.device_node(), "/dev/media1");

        let _claim2 = second.claim().unwrap();
        assert!(enumerator.search(&dm).is_none());
    }

    #[test]
    fn test_remove_claimed_device() {
        let (mut enumerator, _) = enumerator();
        enumerator.add_device(uvc("/dev/media0"));

        let dm = DeviceMatch::new("uvcvideo");
        let claim = enumerator.search(&dm).unwrap().claim().unwrap();

        assert!(enumerator.remove_device("/dev/media0"));
        assert!(enumerator.is_empty());
        assert_eq!(claim.device().state(), DeviceState::PendingRemoval);
        assert!(!enumerator.remove_device("/dev/media0"));

        drop(claim);
        assert!(enumerator.search(&dm).is_none());
    }

    #[test]
    fn test_listener_order_and_search() {
        let (mut enumerator, _) = enumerator();
        let recorder = Arc::new(Recorder {
            search: Some(DeviceMatch::new("uvcvideo")),
            ..Default::default()
        });
        let weak: Weak<dyn DeviceListener> = Arc::downgrade(&recorder) as Weak<dyn DeviceListener>;
        enumerator.subscribe(weak);

        enumerator.add_device(uvc("/dev/media0"));
        enumerator.add_device(uvc("/dev/media0"));
        enumerator.remove_device("/dev/media0");

        let events = recorder.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                "added /dev/media0".to_string(),
                "found Some(\"/dev/media0\")".to_string(),
                "removed /dev/media0".to_string(),
            ]
        );
    }

    #[test]
    fn test_unsubscribe_and_dropped_listener() {
        let (mut enumerator, _) = enumerator();
        let recorder = Arc::new(Recorder::default());
        let id = enumerator.subscribe(Arc::downgrade(&recorder) as Weak<dyn DeviceListener>);

        assert!(enumerator.unsubscribe(id));
        assert!(!enumerator.unsubscribe(id));
        enumerator.add_device(uvc("/dev/media0"));
        assert!(recorder.events.lock().unwrap().is_empty());

        let dropped = Arc::new(Recorder::default());
        enumerator.subscribe(Arc::downgrade(&dropped) as Weak<dyn DeviceListener>);
        drop(dropped);
        enumerator.add_device(uvc("/dev/media1"));
        assert_eq!(enumerator.listeners.len(), 0);
    }

    #[test]
    fn test_enumerate_skips_broken() {
        let (mut enumerator, handle) = enumerator();
        handle.plug(MediaDeviceBuilder::new("/dev/media0", "uvcvideo"));
        handle.plug_broken("/dev/media1");
        handle.plug(MediaDeviceBuilder::new("/dev/media2", "vimc"));

        assert_eq!(enumerator.enumerate().unwrap(), 2);
        let nodes: Vec<_> = enumerator.devices().iter().map(|d| d.device_node()).collect();
        assert_eq!(nodes, vec!["/dev/media0", "/dev/media2"]);

        // A second scan finds nothing new.
        assert_eq!(enumerator.enumerate().unwrap(), 0);
    }

    #[test]
    fn test_clear_removes_claimed_devices() {
        let (mut enumerator, _) = enumerator();
        let recorder = Arc::new(Recorder::default());
        enumerator.subscribe(Arc::downgrade(&recorder) as Weak<dyn DeviceListener>);
        enumerator.add_device(uvc("/dev/media0"));
        enumerator.add_device(uvc("/dev/media1"));
        let claim = enumerator.devices()[0].claim().unwrap();
        let idle = Arc::clone(&enumerator.devices()[1]);

        assert_eq!(enumerator.clear(), 2);
        assert!(enumerator.is_empty());
        assert_eq!(claim.device().state(), DeviceState::PendingRemoval);
        assert_eq!(idle.state(), DeviceState::PendingRemoval);
        assert!(idle.claim().is_none());
        let events = recorder.events.lock().unwrap();
        assert!(events.iter().all(|e| !e.starts_with("removed")));
    }

    #[test]
    fn test_drop_removes_claimed_devices() {
        let (mut enumerator, _) = enumerator();
        enumerator.add_device(uvc("/dev/media0"));
        let claim = enumerator.devices()[0].claim().unwrap();

        drop(enumerator);
        assert_eq!(claim.device().state(), DeviceState::PendingRemoval);
        drop(claim);
    }

    #[test]
    fn test_hotplug_add_and_remove() {
        let (mut enumerator, handle) = enumerator();
        handle.plug(MediaDeviceBuilder::new("/dev/media0", "uvcvideo"));

        assert_eq!(enumerator.process_events(Duration::from_millis(10)).unwrap(), 1);
        assert_eq!(enumerator.len(), 1);

        handle.unplug("/dev/media0");
        enumerator.process_events(Duration::from_millis(10)).unwrap();
        assert!(enumerator.is_empty());
    }

    #[test]
    fn test_hotplug_defers_incomplete_device() {
        let (mut enumerator, handle) = enumerator();
        handle.plug(
            MediaDeviceBuilder::new("/dev/media0", "uvcvideo")
                .with_entity(MediaEntity::new(1, "video").with_device_number(81, 0)),
        );

        enumerator.process_events(Duration::from_millis(10)).unwrap();
        assert!(enumerator.is_empty());
        assert_eq!(enumerator.deferred(), ["/dev/media0".to_string()]);

        handle.add_char_node(81, 0, "/dev/video0");
        enumerator.process_events(Duration::from_millis(10)).unwrap();
        assert_eq!(enumerator.len(), 1);
        assert!(enumerator.deferred().is_empty());
    }

    #[test]
    fn test_deferred_dropped_on_remove() {
        let (mut enumerator, handle) = enumerator();
        handle.plug(
            MediaDeviceBuilder::new("/dev/media0", "uvcvideo")
                .with_entity(MediaEntity::new(1, "video").with_device_number(81, 0)),
        );
        enumerator.process_events(Duration::from_millis(10)).unwrap();
        assert_eq!(enumerator.deferred().len(), 1);

        handle.unplug("/dev/media0");
        enumerator.process_events(Duration::from_millis(10)).unwrap();
        assert!(enumerator.deferred().is_empty());
    }

    #[test]
    fn test_channel_lost_degrades() {
        let (mut enumerator, handle) = enumerator();
        enumerator.add_device(uvc("/dev/media0"));
        assert!(enumerator.hotplug_active());

        handle.lose_channel("netlink socket closed");
        assert!(matches!(
            enumerator.process_events(Duration::from_millis(1)),
            Err(Error::NotificationChannelLost(_))
        ));
        assert!(!enumerator.hotplug_active());
        assert_eq!(enumerator.process_events(Duration::from_millis(1)).unwrap(), 0);

        let dm = DeviceMatch::new("uvcvideo");
        assert!(enumerator.search(&dm).is_some());
    }

    #[test]
    fn test_init_failure() {
        let backend = MemoryBackend::new();
        backend.handle().fail_init("no netlink");
        let mut enumerator = DeviceEnumerator::new(Box::new(backend));
        assert!(matches!(enumerator.init(), Err(Error::BackendUnavailable(_))));
        assert!(!enumerator.hotplug_active());
    }
}
