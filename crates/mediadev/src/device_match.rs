// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::fmt;

use crate::media::MediaDevice;

/// Hardware requirements of a pipeline handler
///
/// A `DeviceMatch` names a kernel driver and the entities a media device must
/// expose for a pipeline handler to drive it. Matching is set containment:
/// the device must use the same driver and contain every required entity by
/// exact name. Extra entities on the device are ignored, and the order of the
/// required names carries no meaning.
///
/// Required names are kept as given; adding the same name twice is allowed
/// and only costs a redundant lookup.
///
/// # Example
///
/// ```
/// use mediadev::DeviceMatch;
/// use mediadev::media::MediaDeviceBuilder;
///
/// let mut dm = DeviceMatch::new("vimc");
/// dm.add("Sensor A");
/// dm.add("Raw Capture 0");
///
/// let device = MediaDeviceBuilder::new("/dev/media0", "vimc")
///     .entity("Sensor A")
///     .entity("Debayer A")
///     .entity("Raw Capture 0")
///     .build()?;
/// assert!(dm.matches(&device));
/// # Ok::<(), mediadev::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMatch {
    driver: String,
    entities: Vec<String>,
}

impl DeviceMatch {
    /// Create a match for the given driver with no entity requirements.
    ///
    /// A match with an empty driver name never matches any device.
    pub fn new(driver: &str) -> Self {
        Self {
            driver: driver.to_owned(),
            entities: Vec::new(),
        }
    }

    /// Append a required entity name
    pub fn add(&mut self, entity: &str) {
        self.entities.push(entity.to_owned());
    }

    /// Builder-style variant of [`add`](Self::add)
    pub fn with_entity(mut self, entity: &str) -> Self {
        self.add(entity);
        self
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    /// Required entity names in the order they were added
    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    /// Check whether a device satisfies this match.
    ///
    /// Stops at the first required entity the device lacks.
    pub fn matches(&self, device: &MediaDevice) -> bool {
        if self.driver.is_empty() || self.driver != device.driver() {
            return false;
        }

        self.entities
            .iter()
            .all(|name| device.entity_by_name(name).is_some())
    }
}

impl fmt::Display for DeviceMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.driver)?;
        if !self.entities.is_empty() {
            write!(f, " [{}]", self.entities.join(", "))?;
        }
        Ok(())
    }
}
