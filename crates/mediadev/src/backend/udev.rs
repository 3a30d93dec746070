// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Discovery and hotplug through libudev

use std::ffi::CStr;
use std::os::raw::c_char;
use std::os::unix::io::RawFd;
use std::ptr;
use std::time::Duration;

use mediadev_sys as ffi;

use super::{Backend, HotplugAction, HotplugEvent, Subsystem};
use crate::Error;

/// Resolve a libudev symbol to a callable function pointer.
fn symbol<T: Copy>(sym: &Result<T, ffi::libloading::Error>, name: &'static str) -> Result<T, Error> {
    sym.as_ref().copied().map_err(|_| Error::SymbolNotFound(name))
}

macro_rules! udev_fn {
    ($lib:expr, $name:ident) => {
        symbol(&$lib.$name, stringify!($name))
    };
}

/// Copy a libudev string, treating NULL as absent.
///
/// # Safety
///
/// `ptr` must be NULL or point to a NUL-terminated string that outlives the
/// call.
unsafe fn owned_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

/// Discovery backend using libudev
///
/// libudev is loaded at runtime on [`init`](Backend::init); set
/// `MEDIADEV_UDEV_LIBRARY` to override the library path. Enumeration lists
/// the `media` subsystem and a netlink monitor delivers hotplug events for
/// `media` and `video4linux` nodes.
pub struct UdevBackend {
    lib: Option<&'static ffi::UdevLibrary>,
    udev: *mut ffi::udev,
    monitor: *mut ffi::udev_monitor,
    fd: RawFd,
}

// The raw handles are only ever used by the thread that owns the backend.
unsafe impl Send for UdevBackend {}

impl UdevBackend {
    pub fn new() -> Self {
        Self {
            lib: None,
            udev: ptr::null_mut(),
            monitor: ptr::null_mut(),
            fd: -1,
        }
    }

    fn library(&self) -> Result<&'static ffi::UdevLibrary, Error> {
        self.lib.ok_or(Error::NotStarted)
    }

    fn open(&mut self) -> Result<(), Error> {
        let lib = ffi::init()?;
        self.lib = Some(lib);

        let udev_new = udev_fn!(lib, udev_new)?;
        let monitor_new = udev_fn!(lib, udev_monitor_new_from_netlink)?;
        let add_match = udev_fn!(lib, udev_monitor_filter_add_match_subsystem_devtype)?;
        let enable = udev_fn!(lib, udev_monitor_enable_receiving)?;
        let get_fd = udev_fn!(lib, udev_monitor_get_fd)?;
        // Needed by wait_events and Drop, check them up front.
        udev_fn!(lib, udev_monitor_receive_device)?;
        udev_fn!(lib, udev_monitor_unref)?;
        udev_fn!(lib, udev_unref)?;

        self.udev = unsafe { udev_new() };
        if self.udev.is_null() {
            return Err(Error::BackendUnavailable("udev_new failed".into()));
        }

        self.monitor = unsafe { monitor_new(self.udev, c"udev".as_ptr()) };
        if self.monitor.is_null() {
            return Err(Error::BackendUnavailable(
                "failed to create udev netlink monitor".into(),
            ));
        }

        for subsystem in [c"media", c"video4linux"] {
            let ret = unsafe { add_match(self.monitor, subsystem.as_ptr(), ptr::null()) };
            if ret < 0 {
                return Err(Error::BackendUnavailable(format!(
                    "failed to filter udev monitor on {}",
                    subsystem.to_string_lossy()
                )));
            }
        }

        if unsafe { enable(self.monitor) } < 0 {
            return Err(Error::BackendUnavailable(
                "failed to enable udev monitor".into(),
            ));
        }

        self.fd = unsafe { get_fd(self.monitor) };
        if self.fd < 0 {
            return Err(Error::BackendUnavailable(
                "udev monitor has no file descriptor".into(),
            ));
        }

        Ok(())
    }

    fn release(&mut self) {
        let Some(lib) = self.lib else { return };

        if !self.monitor.is_null() {
            if let Ok(unref) = udev_fn!(lib, udev_monitor_unref) {
                unsafe { unref(self.monitor) };
            }
            self.monitor = ptr::null_mut();
        }
        if !self.udev.is_null() {
            if let Ok(unref) = udev_fn!(lib, udev_unref) {
                unsafe { unref(self.udev) };
            }
            self.udev = ptr::null_mut();
        }
        self.fd = -1;
    }

    fn receive(&mut self) -> Result<Vec<HotplugEvent>, Error> {
        let lib = self.library()?;
        let receive_device = udev_fn!(lib, udev_monitor_receive_device)?;
        let get_action = udev_fn!(lib, udev_device_get_action)?;
        let get_devnode = udev_fn!(lib, udev_device_get_devnode)?;
        let get_subsystem = udev_fn!(lib, udev_device_get_subsystem)?;
        let device_unref = udev_fn!(lib, udev_device_unref)?;

        let mut events = Vec::new();
        loop {
            let device = unsafe { receive_device(self.monitor) };
            if device.is_null() {
                break;
            }

            let (action, node, subsystem) = unsafe {
                (
                    owned_str(get_action(device)),
                    owned_str(get_devnode(device)),
                    owned_str(get_subsystem(device)),
                )
            };
            unsafe { device_unref(device) };

            let action = match action.as_deref() {
                Some("add") => HotplugAction::Add,
                Some("remove") => HotplugAction::Remove,
                _ => continue,
            };
            let Some(node) = node else { continue };

            events.push(HotplugEvent {
                action,
                node,
                subsystem: Subsystem::from_name(subsystem.as_deref().unwrap_or_default()),
            });
        }

        Ok(events)
    }

    fn lookup_devnum(&self, major: u32, minor: u32) -> Result<Option<String>, Error> {
        let lib = self.library()?;
        let from_devnum = udev_fn!(lib, udev_device_new_from_devnum)?;
        let get_devnode = udev_fn!(lib, udev_device_get_devnode)?;
        let device_unref = udev_fn!(lib, udev_device_unref)?;

        let device = unsafe { from_devnum(self.udev, b'c' as c_char, libc::makedev(major, minor)) };
        if device.is_null() {
            return Ok(None);
        }

        let node = unsafe { owned_str(get_devnode(device)) };
        unsafe { device_unref(device) };
        Ok(node)
    }
}

impl Default for UdevBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for UdevBackend {
    fn name(&self) -> &'static str {
        "udev"
    }

    fn init(&mut self) -> Result<(), Error> {
        if !self.monitor.is_null() {
            return Ok(());
        }

        self.open().map_err(|err| {
            self.release();
            match err {
                Error::BackendUnavailable(_) => err,
                other => Error::BackendUnavailable(other.to_string()),
            }
        })?;

        log::debug!("udev monitor listening on fd {}", self.fd);
        Ok(())
    }

    fn scan(&mut self) -> Result<Vec<String>, Error> {
        let lib = self.library()?;
        let enumerate_new = udev_fn!(lib, udev_enumerate_new)?;
        let add_match = udev_fn!(lib, udev_enumerate_add_match_subsystem)?;
        let scan_devices = udev_fn!(lib, udev_enumerate_scan_devices)?;
        let list_entry = udev_fn!(lib, udev_enumerate_get_list_entry)?;
        let enumerate_unref = udev_fn!(lib, udev_enumerate_unref)?;
        let next_entry = udev_fn!(lib, udev_list_entry_get_next)?;
        let entry_name = udev_fn!(lib, udev_list_entry_get_name)?;
        let from_syspath = udev_fn!(lib, udev_device_new_from_syspath)?;
        let get_devnode = udev_fn!(lib, udev_device_get_devnode)?;
        let device_unref = udev_fn!(lib, udev_device_unref)?;

        let enumerate = unsafe { enumerate_new(self.udev) };
        if enumerate.is_null() {
            return Err(Error::BackendUnavailable(
                "udev_enumerate_new failed".into(),
            ));
        }

        let ret = unsafe {
            let ret = add_match(enumerate, c"media".as_ptr());
            if ret < 0 {
                ret
            } else {
                scan_devices(enumerate)
            }
        };
        if ret < 0 {
            unsafe { enumerate_unref(enumerate) };
            return Err(Error::Io(std::io::Error::from_raw_os_error(-ret)));
        }

        let mut nodes = Vec::new();
        let mut entry = unsafe { list_entry(enumerate) };
        while !entry.is_null() {
            let syspath = unsafe { entry_name(entry) };
            let device = unsafe { from_syspath(self.udev, syspath) };
            if !device.is_null() {
                match unsafe { owned_str(get_devnode(device)) } {
                    Some(node) => nodes.push(node),
                    None => log::debug!(
                        "Skipping {} without device node",
                        unsafe { owned_str(syspath) }.unwrap_or_default()
                    ),
                }
                unsafe { device_unref(device) };
            }
            entry = unsafe { next_entry(entry) };
        }

        unsafe { enumerate_unref(enumerate) };
        Ok(nodes)
    }

    fn supports_hotplug(&self) -> bool {
        true
    }

    fn wait_events(&mut self, timeout: Duration) -> Result<Vec<HotplugEvent>, Error> {
        if self.fd < 0 {
            return Err(Error::NotificationChannelLost(
                "udev monitor is not open".into(),
            ));
        }

        let mut pfd = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

        let ret = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(Vec::new());
            }
            return Err(Error::NotificationChannelLost(err.to_string()));
        }
        if ret == 0 {
            return Ok(Vec::new());
        }

        if pfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
            return Err(Error::NotificationChannelLost(format!(
                "udev monitor fd reported revents {:#x}",
                pfd.revents
            )));
        }

        self.receive()
            .map_err(|err| Error::NotificationChannelLost(err.to_string()))
    }

    fn lookup_device_node(&self, major: u32, minor: u32) -> Option<String> {
        if !self.udev.is_null() {
            match self.lookup_devnum(major, minor) {
                Ok(Some(node)) => return Some(node),
                Ok(None) => {}
                Err(err) => log::debug!("udev lookup of {}:{} failed: {}", major, minor, err),
            }
        }

        super::sysfs::lookup_char_device(
            std::path::Path::new(super::sysfs::DEFAULT_SYS_ROOT),
            std::path::Path::new(super::sysfs::DEFAULT_DEV_ROOT),
            major,
            minor,
        )
    }
}

impl Drop for UdevBackend {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for UdevBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdevBackend")
            .field("loaded", &self.lib.is_some())
            .field("fd", &self.fd)
            .finish()
    }
}
