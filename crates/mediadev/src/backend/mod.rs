// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Discovery and Hotplug Backends
//!
//! A [`Backend`] tells the [`DeviceEnumerator`](crate::DeviceEnumerator)
//! which device nodes exist, builds [`MediaDevice`] objects from them and
//! delivers hotplug events. The enumerator contract does not depend on the
//! transport behind it.
//!
//! | Backend | Discovery | Hotplug |
//! |---------|-----------|---------|
//! | [`UdevBackend`] | libudev enumeration of the `media` subsystem | udev netlink monitor |
//! | [`SysfsBackend`] | `/sys/bus/media/devices` scan | none |
//! | [`MemoryBackend`] | In-memory device table | Scripted plug/unplug |
//!
//! # Selection
//!
//! [`BackendKind::from_env`] reads `MEDIADEV_BACKEND` (`udev` or `sysfs`).
//! Without it, [`DeviceEnumerator::create`](crate::DeviceEnumerator::create)
//! tries udev first and falls back to sysfs.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::media::MediaDevice;
use crate::Error;

mod memory;
mod sysfs;
mod udev;

pub use memory::{MemoryBackend, MemoryBackendHandle};
pub use sysfs::SysfsBackend;
pub use udev::UdevBackend;

/// Environment variable forcing a backend
pub const BACKEND_ENV: &str = "MEDIADEV_BACKEND";

/// Hotplug action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HotplugAction {
    Add,
    Remove,
}

impl fmt::Display for HotplugAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HotplugAction::Add => write!(f, "add"),
            HotplugAction::Remove => write!(f, "remove"),
        }
    }
}

/// Kernel subsystem of a hotplugged node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subsystem {
    /// Media controller node (`/dev/media*`)
    Media,
    /// V4L2 video or subdevice node (`/dev/video*`, `/dev/v4l-subdev*`)
    Video4Linux,
    Other(String),
}

impl Subsystem {
    pub fn from_name(name: &str) -> Self {
        match name {
            "media" => Subsystem::Media,
            "video4linux" => Subsystem::Video4Linux,
            other => Subsystem::Other(other.to_owned()),
        }
    }
}

/// Hotplug notification for one device node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotplugEvent {
    pub action: HotplugAction,
    pub node: String,
    pub subsystem: Subsystem,
}

impl HotplugEvent {
    /// Media device node added
    pub fn add(node: &str) -> Self {
        Self {
            action: HotplugAction::Add,
            node: node.to_owned(),
            subsystem: Subsystem::Media,
        }
    }

    /// Media device node removed
    pub fn remove(node: &str) -> Self {
        Self {
            action: HotplugAction::Remove,
            node: node.to_owned(),
            subsystem: Subsystem::Media,
        }
    }

    pub fn with_subsystem(self, subsystem: Subsystem) -> Self {
        Self { subsystem, ..self }
    }
}

impl fmt::Display for HotplugEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.node)
    }
}

/// Source of device nodes and hotplug events
///
/// Backends are moved onto the event loop thread and only ever used from
/// there, so they need to be `Send` but not `Sync`.
pub trait Backend: Send {
    /// Short backend name used in log messages
    fn name(&self) -> &'static str;

    /// Open the discovery and notification mechanism.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] if the mechanism cannot be
    /// opened. Implementations must not keep partial state on failure.
    fn init(&mut self) -> Result<(), Error>;

    /// List the candidate media device nodes currently present.
    fn scan(&mut self) -> Result<Vec<String>, Error>;

    /// Whether [`wait_events`](Self::wait_events) can ever return events
    fn supports_hotplug(&self) -> bool {
        false
    }

    /// Wait up to `timeout` for hotplug events and return all pending ones.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotificationChannelLost`] when the channel can no
    /// longer deliver events.
    fn wait_events(&mut self, timeout: Duration) -> Result<Vec<HotplugEvent>, Error> {
        std::thread::sleep(timeout);
        Ok(Vec::new())
    }

    /// Resolve a character device number to its `/dev` path.
    fn lookup_device_node(&self, major: u32, minor: u32) -> Option<String> {
        sysfs::lookup_char_device(
            std::path::Path::new(sysfs::DEFAULT_SYS_ROOT),
            std::path::Path::new(sysfs::DEFAULT_DEV_ROOT),
            major,
            minor,
        )
    }

    /// Open a candidate node and build a fully populated device.
    ///
    /// Returns an error and no object if any step fails.
    fn create_device(&self, node: &str) -> Result<MediaDevice, Error> {
        MediaDevice::open(node, |major, minor| self.lookup_device_node(major, minor))
    }
}

/// Backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Udev,
    Sysfs,
}

impl BackendKind {
    /// Backend forced through `MEDIADEV_BACKEND`, if any.
    ///
    /// Unknown values are logged and ignored.
    pub fn from_env() -> Option<Self> {
        let value = std::env::var(BACKEND_ENV).ok()?;
        match value.parse() {
            Ok(kind) => Some(kind),
            Err(_) => {
                log::warn!("Ignoring unknown {}={}", BACKEND_ENV, value);
                None
            }
        }
    }

    /// Construct an uninitialised backend of this kind
    pub fn create(self) -> Box<dyn Backend> {
        match self {
            BackendKind::Udev => Box::new(UdevBackend::new()),
            BackendKind::Sysfs => Box::new(SysfsBackend::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Udev => "udev",
            BackendKind::Sysfs => "sysfs",
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "udev" => Ok(BackendKind::Udev),
            "sysfs" => Ok(BackendKind::Sysfs),
            other => Err(format!("unknown backend: {}", other)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("udev".parse::<BackendKind>(), Ok(BackendKind::Udev));
        assert_eq!("SYSFS".parse::<BackendKind>(), Ok(BackendKind::Sysfs));
        assert!("netlink".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_subsystem_from_name() {
        assert_eq!(Subsystem::from_name("media"), Subsystem::Media);
        assert_eq!(Subsystem::from_name("video4linux"), Subsystem::Video4Linux);
        assert_eq!(
            Subsystem::from_name("sound"),
            Subsystem::Other("sound".to_string())
        );
    }

    #[test]
    fn test_event_constructors() {
        let event = HotplugEvent::add("/dev/media0");
        assert_eq!(event.action, HotplugAction::Add);
        assert_eq!(event.subsystem, Subsystem::Media);
        assert_eq!(format!("{}", event), "add /dev/media0");

        let event = HotplugEvent::remove("/dev/video2").with_subsystem(Subsystem::Video4Linux);
        assert_eq!(event.action, HotplugAction::Remove);
        assert_eq!(event.subsystem, Subsystem::Video4Linux);
    }
}
