// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! MediaDev Library for Rust
//!
//! Discovery and lifecycle management for Linux media controller devices.
//! The library finds `/dev/media*` devices, reads their entity graphs, matches
//! them against the hardware requirements declared by pipeline handlers and
//! keeps logical [`Camera`](camera::Camera) objects in sync with hotplug
//! events.
//!
//! # Quick Start
//!
//! ## Searching for Hardware
//!
//! ```no_run
//! use mediadev::{DeviceEnumerator, DeviceMatch};
//!
//! let mut enumerator = DeviceEnumerator::create()?;
//! enumerator.enumerate()?;
//!
//! let dm = DeviceMatch::new("uvcvideo");
//! if let Some(device) = enumerator.search(&dm) {
//!     println!("Found {} at {}", device.model(), device.device_node());
//! }
//! # Ok::<(), mediadev::Error>(())
//! ```
//!
//! ## Tracking Cameras
//!
//! ```no_run
//! use mediadev::manager::CameraManager;
//!
//! let manager = CameraManager::new();
//! manager.start()?;
//! for camera in manager.cameras() {
//!     println!("{} ({})", camera.id(), camera.pipeline());
//! }
//! # Ok::<(), mediadev::Error>(())
//! ```
//!
//! # Threading
//!
//! The registry follows a single-writer discipline. [`DeviceEnumerator`] is a
//! plain value that must only be mutated and searched from one thread; the
//! [`CameraManager`](manager::CameraManager) runs it on a dedicated event loop
//! thread and marshals requests from other threads onto it.

use std::{error, fmt, io};

use mediadev_sys as ffi;

/// Error type for MediaDev library operations
#[derive(Debug)]
pub enum Error {
    /// The discovery or hotplug notification mechanism could not be opened.
    /// Fatal when returned from `init()`.
    BackendUnavailable(String),

    /// A candidate node could not be opened or did not expose a valid media
    /// controller graph
    DeviceOpenFailure {
        /// Device node that was being opened
        node: String,
        /// Why the node was rejected
        reason: String,
    },

    /// The hotplug notification channel stopped delivering events. Devices
    /// already in the registry remain valid.
    NotificationChannelLost(String),

    /// libudev could not be loaded at runtime
    LibraryNotLoaded(ffi::libloading::Error),

    /// A required libudev symbol is missing
    SymbolNotFound(&'static str),

    /// I/O error from underlying system calls
    Io(io::Error),

    /// The camera manager event loop is not running
    NotStarted,
}

impl Error {
    pub(crate) fn open_failure(node: &str, reason: impl Into<String>) -> Self {
        Error::DeviceOpenFailure {
            node: node.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::BackendUnavailable(msg) => write!(f, "Device discovery backend unavailable: {}", msg),
            Error::DeviceOpenFailure { node, reason } => {
                write!(f, "Failed to open media device {}: {}", node, reason)
            }
            Error::NotificationChannelLost(msg) => {
                write!(f, "Hotplug notification channel lost: {}", msg)
            }
            Error::LibraryNotLoaded(err) => write!(f, "libudev could not be loaded: {}", err),
            Error::SymbolNotFound(sym) => write!(f, "Symbol not found in libudev: {}", sym),
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::NotStarted => write!(f, "Camera manager is not started"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::LibraryNotLoaded(err) => Some(err),
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ffi::libloading::Error> for Error {
    fn from(err: ffi::libloading::Error) -> Self {
        Error::LibraryNotLoaded(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

/// The media module models media controller devices and their entity graphs.
pub mod media;

/// The device_match module describes the hardware a pipeline handler needs.
pub mod device_match;

/// The enumerator module owns the registry of discovered devices.
pub mod enumerator;

/// The backend module provides the discovery and hotplug sources.
pub mod backend;

/// The event_loop module drives an enumerator on a single thread.
pub mod event_loop;

/// The pipeline module declares pipeline handlers and their device matches.
pub mod pipeline;

/// The camera module provides the logical camera bound to a media device.
pub mod camera;

/// The manager module binds matched hardware to cameras and tracks hotplug.
pub mod manager;

pub use device_match::DeviceMatch;
pub use enumerator::{DeviceEnumerator, DeviceListener, ListenerId};
pub use media::{DeviceClaim, DeviceState, MediaDevice, MediaEntity, MediaLink, MediaPad};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::open_failure("/dev/media3", "not a media device");
        assert_eq!(
            format!("{}", err),
            "Failed to open media device /dev/media3: not a media device"
        );

        let err = Error::BackendUnavailable("libudev missing".into());
        assert_eq!(
            format!("{}", err),
            "Device discovery backend unavailable: libudev missing"
        );
    }

    #[test]
    fn test_error_source() {
        use std::error::Error as _;

        let err = Error::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(err.source().is_some());
        assert!(Error::NotStarted.source().is_none());
    }
}
