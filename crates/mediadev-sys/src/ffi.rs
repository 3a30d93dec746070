// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

// Mirrors of the structures in <linux/media.h> used for device discovery,
// and the subset of libudev needed for enumeration and hotplug monitoring.

use std::os::raw::{c_char, c_int};

// -----------------------------------------------------------------------------
// linux/media.h
// -----------------------------------------------------------------------------

pub const MEDIA_ENT_F_BASE: u32 = 0x00000000;
pub const MEDIA_ENT_F_OLD_BASE: u32 = 0x00010000;
pub const MEDIA_ENT_F_OLD_SUBDEV_BASE: u32 = 0x00020000;

pub const MEDIA_ENT_F_UNKNOWN: u32 = MEDIA_ENT_F_BASE;
pub const MEDIA_ENT_F_V4L2_SUBDEV_UNKNOWN: u32 = MEDIA_ENT_F_OLD_SUBDEV_BASE;
pub const MEDIA_ENT_F_IO_V4L: u32 = MEDIA_ENT_F_OLD_BASE + 1;
pub const MEDIA_ENT_F_IO_DTV: u32 = MEDIA_ENT_F_BASE + 0x01001;
pub const MEDIA_ENT_F_IO_VBI: u32 = MEDIA_ENT_F_BASE + 0x01002;
pub const MEDIA_ENT_F_IO_SWRADIO: u32 = MEDIA_ENT_F_BASE + 0x01003;
pub const MEDIA_ENT_F_CAM_SENSOR: u32 = MEDIA_ENT_F_OLD_SUBDEV_BASE + 1;
pub const MEDIA_ENT_F_FLASH: u32 = MEDIA_ENT_F_OLD_SUBDEV_BASE + 2;
pub const MEDIA_ENT_F_LENS: u32 = MEDIA_ENT_F_OLD_SUBDEV_BASE + 3;
pub const MEDIA_ENT_F_PROC_VIDEO_COMPOSER: u32 = MEDIA_ENT_F_BASE + 0x4001;
pub const MEDIA_ENT_F_PROC_VIDEO_PIXEL_FORMATTER: u32 = MEDIA_ENT_F_BASE + 0x4002;
pub const MEDIA_ENT_F_PROC_VIDEO_PIXEL_ENC_CONV: u32 = MEDIA_ENT_F_BASE + 0x4003;
pub const MEDIA_ENT_F_PROC_VIDEO_LUT: u32 = MEDIA_ENT_F_BASE + 0x4004;
pub const MEDIA_ENT_F_PROC_VIDEO_SCALER: u32 = MEDIA_ENT_F_BASE + 0x4005;
pub const MEDIA_ENT_F_PROC_VIDEO_STATISTICS: u32 = MEDIA_ENT_F_BASE + 0x4006;
pub const MEDIA_ENT_F_PROC_VIDEO_ENCODER: u32 = MEDIA_ENT_F_BASE + 0x4007;
pub const MEDIA_ENT_F_PROC_VIDEO_DECODER: u32 = MEDIA_ENT_F_BASE + 0x4008;
pub const MEDIA_ENT_F_PROC_VIDEO_ISP: u32 = MEDIA_ENT_F_BASE + 0x4009;
pub const MEDIA_ENT_F_VID_MUX: u32 = MEDIA_ENT_F_BASE + 0x5001;
pub const MEDIA_ENT_F_VID_IF_BRIDGE: u32 = MEDIA_ENT_F_BASE + 0x5002;

pub const MEDIA_ENT_FL_DEFAULT: u32 = 1 << 0;
pub const MEDIA_ENT_FL_CONNECTOR: u32 = 1 << 1;

pub const MEDIA_PAD_FL_SINK: u32 = 1 << 0;
pub const MEDIA_PAD_FL_SOURCE: u32 = 1 << 1;
pub const MEDIA_PAD_FL_MUST_CONNECT: u32 = 1 << 2;

pub const MEDIA_LNK_FL_ENABLED: u32 = 1 << 0;
pub const MEDIA_LNK_FL_IMMUTABLE: u32 = 1 << 1;
pub const MEDIA_LNK_FL_DYNAMIC: u32 = 1 << 2;
pub const MEDIA_LNK_FL_LINK_TYPE: u32 = 0xf << 28;
pub const MEDIA_LNK_FL_DATA_LINK: u32 = 0 << 28;
pub const MEDIA_LNK_FL_INTERFACE_LINK: u32 = 1 << 28;
pub const MEDIA_LNK_FL_ANCILLARY_LINK: u32 = 2 << 28;

pub const MEDIA_INTF_T_V4L_BASE: u32 = 0x00000200;
pub const MEDIA_INTF_T_V4L_VIDEO: u32 = MEDIA_INTF_T_V4L_BASE;
pub const MEDIA_INTF_T_V4L_VBI: u32 = MEDIA_INTF_T_V4L_BASE + 1;
pub const MEDIA_INTF_T_V4L_RADIO: u32 = MEDIA_INTF_T_V4L_BASE + 2;
pub const MEDIA_INTF_T_V4L_SUBDEV: u32 = MEDIA_INTF_T_V4L_BASE + 3;
pub const MEDIA_INTF_T_V4L_SWRADIO: u32 = MEDIA_INTF_T_V4L_BASE + 4;
pub const MEDIA_INTF_T_V4L_TOUCH: u32 = MEDIA_INTF_T_V4L_BASE + 5;

/// Pad `flags` and `index` are only filled by kernels reporting media API
/// version 4.19.0 or later.
pub const fn media_v2_pad_has_index(media_version: u32) -> bool {
    media_version >= ((4 << 16) | (19 << 8))
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct media_device_info {
    pub driver: [c_char; 16],
    pub model: [c_char; 32],
    pub serial: [c_char; 40],
    pub bus_info: [c_char; 32],
    pub media_version: u32,
    pub hw_revision: u32,
    pub driver_version: u32,
    pub reserved: [u32; 31],
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct media_v2_entity {
    pub id: u32,
    pub name: [c_char; 64],
    pub function: u32,
    pub flags: u32,
    pub reserved: [u32; 5],
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct media_v2_intf_devnode {
    pub major: u32,
    pub minor: u32,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub union media_v2_interface__bindgen_ty_1 {
    pub devnode: media_v2_intf_devnode,
    pub raw: [u32; 16],
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct media_v2_interface {
    pub id: u32,
    pub intf_type: u32,
    pub flags: u32,
    pub reserved: [u32; 9],
    pub __bindgen_anon_1: media_v2_interface__bindgen_ty_1,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct media_v2_pad {
    pub id: u32,
    pub entity_id: u32,
    pub flags: u32,
    pub index: u32,
    pub reserved: [u32; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct media_v2_link {
    pub id: u32,
    pub source_id: u32,
    pub sink_id: u32,
    pub flags: u32,
    pub reserved: [u32; 6],
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct media_v2_topology {
    pub topology_version: u64,
    pub num_entities: u32,
    pub reserved1: u32,
    pub ptr_entities: u64,
    pub num_interfaces: u32,
    pub reserved2: u32,
    pub ptr_interfaces: u64,
    pub num_pads: u32,
    pub reserved3: u32,
    pub ptr_pads: u64,
    pub num_links: u32,
    pub reserved4: u32,
    pub ptr_links: u64,
}

const IOC_NRBITS: u64 = 8;
const IOC_TYPEBITS: u64 = 8;
const IOC_SIZEBITS: u64 = 14;
const IOC_NRSHIFT: u64 = 0;
const IOC_TYPESHIFT: u64 = IOC_NRSHIFT + IOC_NRBITS;
const IOC_SIZESHIFT: u64 = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: u64 = IOC_SIZESHIFT + IOC_SIZEBITS;
const IOC_READ_WRITE: u64 = 3;

const fn iowr(ty: u8, nr: u8, size: usize) -> u64 {
    (IOC_READ_WRITE << IOC_DIRSHIFT)
        | ((size as u64) << IOC_SIZESHIFT)
        | ((ty as u64) << IOC_TYPESHIFT)
        | ((nr as u64) << IOC_NRSHIFT)
}

pub const MEDIA_IOC_DEVICE_INFO: u64 = iowr(b'|', 0x00, std::mem::size_of::<media_device_info>());
pub const MEDIA_IOC_G_TOPOLOGY: u64 = iowr(b'|', 0x04, std::mem::size_of::<media_v2_topology>());

// -----------------------------------------------------------------------------
// libudev
// -----------------------------------------------------------------------------

#[repr(C)]
pub struct udev {
    _unused: [u8; 0],
}

#[repr(C)]
pub struct udev_device {
    _unused: [u8; 0],
}

#[repr(C)]
pub struct udev_monitor {
    _unused: [u8; 0],
}

#[repr(C)]
pub struct udev_enumerate {
    _unused: [u8; 0],
}

#[repr(C)]
pub struct udev_list_entry {
    _unused: [u8; 0],
}

pub struct UdevLibrary {
    __library: ::libloading::Library,
    pub udev_new: Result<unsafe extern "C" fn() -> *mut udev, ::libloading::Error>,
    pub udev_unref: Result<unsafe extern "C" fn(udev: *mut udev) -> *mut udev, ::libloading::Error>,
    pub udev_monitor_new_from_netlink: Result<
        unsafe extern "C" fn(udev: *mut udev, name: *const c_char) -> *mut udev_monitor,
        ::libloading::Error,
    >,
    pub udev_monitor_filter_add_match_subsystem_devtype: Result<
        unsafe extern "C" fn(
            udev_monitor: *mut udev_monitor,
            subsystem: *const c_char,
            devtype: *const c_char,
        ) -> c_int,
        ::libloading::Error,
    >,
    pub udev_monitor_enable_receiving:
        Result<unsafe extern "C" fn(udev_monitor: *mut udev_monitor) -> c_int, ::libloading::Error>,
    pub udev_monitor_get_fd:
        Result<unsafe extern "C" fn(udev_monitor: *mut udev_monitor) -> c_int, ::libloading::Error>,
    pub udev_monitor_receive_device: Result<
        unsafe extern "C" fn(udev_monitor: *mut udev_monitor) -> *mut udev_device,
        ::libloading::Error,
    >,
    pub udev_monitor_unref: Result<
        unsafe extern "C" fn(udev_monitor: *mut udev_monitor) -> *mut udev_monitor,
        ::libloading::Error,
    >,
    pub udev_enumerate_new:
        Result<unsafe extern "C" fn(udev: *mut udev) -> *mut udev_enumerate, ::libloading::Error>,
    pub udev_enumerate_add_match_subsystem: Result<
        unsafe extern "C" fn(udev_enumerate: *mut udev_enumerate, subsystem: *const c_char) -> c_int,
        ::libloading::Error,
    >,
    pub udev_enumerate_scan_devices: Result<
        unsafe extern "C" fn(udev_enumerate: *mut udev_enumerate) -> c_int,
        ::libloading::Error,
    >,
    pub udev_enumerate_get_list_entry: Result<
        unsafe extern "C" fn(udev_enumerate: *mut udev_enumerate) -> *mut udev_list_entry,
        ::libloading::Error,
    >,
    pub udev_enumerate_unref: Result<
        unsafe extern "C" fn(udev_enumerate: *mut udev_enumerate) -> *mut udev_enumerate,
        ::libloading::Error,
    >,
    pub udev_list_entry_get_next: Result<
        unsafe extern "C" fn(list_entry: *mut udev_list_entry) -> *mut udev_list_entry,
        ::libloading::Error,
    >,
    pub udev_list_entry_get_name: Result<
        unsafe extern "C" fn(list_entry: *mut udev_list_entry) -> *const c_char,
        ::libloading::Error,
    >,
    pub udev_device_new_from_syspath: Result<
        unsafe extern "C" fn(udev: *mut udev, syspath: *const c_char) -> *mut udev_device,
        ::libloading::Error,
    >,
    pub udev_device_new_from_devnum: Result<
        unsafe extern "C" fn(udev: *mut udev, type_: c_char, devnum: libc::dev_t) -> *mut udev_device,
        ::libloading::Error,
    >,
    pub udev_device_get_devnode: Result<
        unsafe extern "C" fn(udev_device: *mut udev_device) -> *const c_char,
        ::libloading::Error,
    >,
    pub udev_device_get_action: Result<
        unsafe extern "C" fn(udev_device: *mut udev_device) -> *const c_char,
        ::libloading::Error,
    >,
    pub udev_device_get_subsystem: Result<
        unsafe extern "C" fn(udev_device: *mut udev_device) -> *const c_char,
        ::libloading::Error,
    >,
    pub udev_device_unref: Result<
        unsafe extern "C" fn(udev_device: *mut udev_device) -> *mut udev_device,
        ::libloading::Error,
    >,
}

impl UdevLibrary {
    pub unsafe fn new<P>(path: P) -> Result<Self, ::libloading::Error>
    where
        P: AsRef<::std::ffi::OsStr>,
    {
        let library = ::libloading::Library::new(path)?;
        Self::from_library(library)
    }

    pub unsafe fn from_library<L>(library: L) -> Result<Self, ::libloading::Error>
    where
        L: Into<::libloading::Library>,
    {
        let __library = library.into();
        let udev_new = __library.get(b"udev_new\0").map(|sym| *sym);
        let udev_unref = __library.get(b"udev_unref\0").map(|sym| *sym);
        let udev_monitor_new_from_netlink = __library
            .get(b"udev_monitor_new_from_netlink\0")
            .map(|sym| *sym);
        let udev_monitor_filter_add_match_subsystem_devtype = __library
            .get(b"udev_monitor_filter_add_match_subsystem_devtype\0")
            .map(|sym| *sym);
        let udev_monitor_enable_receiving = __library
            .get(b"udev_monitor_enable_receiving\0")
            .map(|sym| *sym);
        let udev_monitor_get_fd = __library.get(b"udev_monitor_get_fd\0").map(|sym| *sym);
        let udev_monitor_receive_device = __library
            .get(b"udev_monitor_receive_device\0")
            .map(|sym| *sym);
        let udev_monitor_unref = __library.get(b"udev_monitor_unref\0").map(|sym| *sym);
        let udev_enumerate_new = __library.get(b"udev_enumerate_new\0").map(|sym| *sym);
        let udev_enumerate_add_match_subsystem = __library
            .get(b"udev_enumerate_add_match_subsystem\0")
            .map(|sym| *sym);
        let udev_enumerate_scan_devices = __library
            .get(b"udev_enumerate_scan_devices\0")
            .map(|sym| *sym);
        let udev_enumerate_get_list_entry = __library
            .get(b"udev_enumerate_get_list_entry\0")
            .map(|sym| *sym);
        let udev_enumerate_unref = __library.get(b"udev_enumerate_unref\0").map(|sym| *sym);
        let udev_list_entry_get_next = __library
            .get(b"udev_list_entry_get_next\0")
            .map(|sym| *sym);
        let udev_list_entry_get_name = __library
            .get(b"udev_list_entry_get_name\0")
            .map(|sym| *sym);
        let udev_device_new_from_syspath = __library
            .get(b"udev_device_new_from_syspath\0")
            .map(|sym| *sym);
        let udev_device_new_from_devnum = __library
            .get(b"udev_device_new_from_devnum\0")
            .map(|sym| *sym);
        let udev_device_get_devnode = __library
            .get(b"udev_device_get_devnode\0")
            .map(|sym| *sym);
        let udev_device_get_action = __library.get(b"udev_device_get_action\0").map(|sym| *sym);
        let udev_device_get_subsystem = __library
            .get(b"udev_device_get_subsystem\0")
            .map(|sym| *sym);
        let udev_device_unref = __library.get(b"udev_device_unref\0").map(|sym| *sym);
        Ok(UdevLibrary {
            __library,
            udev_new,
            udev_unref,
            udev_monitor_new_from_netlink,
            udev_monitor_filter_add_match_subsystem_devtype,
            udev_monitor_enable_receiving,
            udev_monitor_get_fd,
            udev_monitor_receive_device,
            udev_monitor_unref,
            udev_enumerate_new,
            udev_enumerate_add_match_subsystem,
            udev_enumerate_scan_devices,
            udev_enumerate_get_list_entry,
            udev_enumerate_unref,
            udev_list_entry_get_next,
            udev_list_entry_get_name,
            udev_device_new_from_syspath,
            udev_device_new_from_devnum,
            udev_device_get_devnode,
            udev_device_get_action,
            udev_device_get_subsystem,
            udev_device_unref,
        })
    }
}
