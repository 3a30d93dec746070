// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Static discovery through sysfs

use std::fs;
use std::path::{Path, PathBuf};

use super::Backend;
use crate::Error;

pub(crate) const DEFAULT_SYS_ROOT: &str = "/sys";
pub(crate) const DEFAULT_DEV_ROOT: &str = "/dev";

/// Discovery backend scanning `/sys/bus/media/devices`
///
/// Used when libudev is not available. It finds every media device present
/// at scan time but cannot report hotplug events.
///
/// The sysfs and `/dev` roots are configurable so the backend can run
/// against a fake tree:
///
/// ```no_run
/// use mediadev::backend::SysfsBackend;
///
/// let backend = SysfsBackend::with_roots("/tmp/fake/sys", "/tmp/fake/dev");
/// ```
#[derive(Debug, Clone)]
pub struct SysfsBackend {
    sys_root: PathBuf,
    dev_root: PathBuf,
}

impl SysfsBackend {
    pub fn new() -> Self {
        Self::with_roots(DEFAULT_SYS_ROOT, DEFAULT_DEV_ROOT)
    }

    pub fn with_roots(sys_root: impl Into<PathBuf>, dev_root: impl Into<PathBuf>) -> Self {
        Self {
            sys_root: sys_root.into(),
            dev_root: dev_root.into(),
        }
    }

    fn media_bus(&self) -> PathBuf {
        self.sys_root.join("bus/media/devices")
    }
}

impl Default for SysfsBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for SysfsBackend {
    fn name(&self) -> &'static str {
        "sysfs"
    }

    fn init(&mut self) -> Result<(), Error> {
        let bus = self.media_bus();
        if !bus.is_dir() {
            return Err(Error::BackendUnavailable(format!(
                "{} not found",
                bus.display()
            )));
        }
        log::debug!("sysfs backend using {}", bus.display());
        Ok(())
    }

    fn scan(&mut self) -> Result<Vec<String>, Error> {
        let mut found = Vec::new();

        for entry in fs::read_dir(self.media_bus())? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(index) = name
                .strip_prefix("media")
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };

            match read_dev_number(&entry.path().join("dev")) {
                Some((major, minor)) => {
                    match lookup_char_device(&self.sys_root, &self.dev_root, major, minor) {
                        Some(node) => found.push((index, node)),
                        None => log::warn!("No device node for {} ({}:{})", name, major, minor),
                    }
                }
                None => log::warn!("Unable to read device number of {}", name),
            }
        }

        found.sort_by_key(|(index, _)| *index);
        Ok(found.into_iter().map(|(_, node)| node).collect())
    }

    fn lookup_device_node(&self, major: u32, minor: u32) -> Option<String> {
        lookup_char_device(&self.sys_root, &self.dev_root, major, minor)
    }
}

/// Parse a sysfs `dev` attribute ("MAJOR:MINOR")
fn read_dev_number(path: &Path) -> Option<(u32, u32)> {
    let content = fs::read_to_string(path).ok()?;
    let (major, minor) = content.trim().split_once(':')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

/// Resolve a character device number to a path under `dev_root`.
///
/// Reads `DEVNAME` from `<sys_root>/dev/char/MAJOR:MINOR/uevent`, which is
/// relative to `/dev` (e.g. "video0" or "v4l/by-path/...").
pub(crate) fn lookup_char_device(
    sys_root: &Path,
    dev_root: &Path,
    major: u32,
    minor: u32,
) -> Option<String> {
    let uevent = sys_root
        .join("dev/char")
        .join(format!("{}:{}", major, minor))
        .join("uevent");
    let content = fs::read_to_string(uevent).ok()?;

    let devname = content
        .lines()
        .find_map(|line| line.strip_prefix("DEVNAME="))?;

    Some(dev_root.join(devname.trim()).to_string_lossy().into_owned())
}
