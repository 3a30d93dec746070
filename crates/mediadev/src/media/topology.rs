// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Reading a media graph from a kernel device node
//!
//! Uses `MEDIA_IOC_DEVICE_INFO` to identify the device and
//! `MEDIA_IOC_G_TOPOLOGY` to fetch entities, interfaces, pads and links.
//! Interface links are consumed here to attach character device numbers to
//! the entities they expose.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::raw::c_char;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;

use mediadev_sys as ffi;

use super::device::{MediaDevice, MediaDeviceBuilder};
use super::entity::{MediaEntity, MediaPad};
use crate::Error;

/// The topology may change between the sizing and the fetching ioctl;
/// give up after this many attempts.
const TOPOLOGY_RETRIES: usize = 5;

impl MediaDevice {
    /// Open a media device node and read its graph.
    ///
    /// `resolve` maps the `(major, minor)` numbers of entity interfaces to
    /// `/dev` paths. Entities whose numbers cannot be resolved keep a device
    /// number without a node (see [`MediaDevice::missing_device_nodes`]).
    ///
    /// The file descriptor is only held for the duration of the call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceOpenFailure`] if the node cannot be opened, is
    /// not a media controller device, or reports an inconsistent graph.
    pub fn open<F>(node: &str, resolve: F) -> Result<MediaDevice, Error>
    where
        F: Fn(u32, u32) -> Option<String>,
    {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_CLOEXEC)
            .open(node)
            .map_err(|e| Error::open_failure(node, e.to_string()))?;

        let info = device_info(&file)
            .map_err(|e| Error::open_failure(node, format!("MEDIA_IOC_DEVICE_INFO: {}", e)))?;
        let topology = read_topology(&file)
            .map_err(|e| Error::open_failure(node, format!("MEDIA_IOC_G_TOPOLOGY: {}", e)))?;

        let mut builder = MediaDeviceBuilder::new(node, &c_string(&info.driver))
            .with_model(&c_string(&info.model))
            .with_serial(&c_string(&info.serial))
            .with_bus_info(&c_string(&info.bus_info))
            .with_hw_revision(info.hw_revision)
            .with_media_version(info.media_version)
            .with_driver_version(info.driver_version)
            .with_topology_version(topology.version);

        populate(&mut builder, &topology, info.media_version, &resolve);

        let device = builder.build()?;
        log::debug!(
            "Opened {} with {} entities and {} links",
            device,
            device.entities().len(),
            device.links().len()
        );
        Ok(device)
    }
}

struct Topology {
    version: u64,
    entities: Vec<ffi::media_v2_entity>,
    interfaces: Vec<ffi::media_v2_interface>,
    pads: Vec<ffi::media_v2_pad>,
    links: Vec<ffi::media_v2_link>,
}

fn ioctl<T>(file: &File, request: u64, arg: &mut T) -> io::Result<()> {
    // SAFETY: `arg` is a live, exclusively borrowed uAPI structure matching
    // the layout the request expects.
    let ret = unsafe { libc::ioctl(file.as_raw_fd(), request as _, arg as *mut T) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn device_info(file: &File) -> io::Result<ffi::media_device_info> {
    // SAFETY: media_device_info is plain old data; all-zero is a valid value.
    let mut info: ffi::media_device_info = unsafe { std::mem::zeroed() };
    ioctl(file, ffi::MEDIA_IOC_DEVICE_INFO, &mut info)?;
    Ok(info)
}

fn read_topology(file: &File) -> io::Result<Topology> {
    for _ in 0..TOPOLOGY_RETRIES {
        // SAFETY: media_v2_topology is plain old data; all-zero means "only
        // report the counts".
        let mut sizing: ffi::media_v2_topology = unsafe { std::mem::zeroed() };
        ioctl(file, ffi::MEDIA_IOC_G_TOPOLOGY, &mut sizing)?;

        // SAFETY: as above, the vectors hold plain old data.
        let mut entities = vec![unsafe { std::mem::zeroed::<ffi::media_v2_entity>() }; sizing.num_entities as usize];
        let mut interfaces =
            vec![unsafe { std::mem::zeroed::<ffi::media_v2_interface>() }; sizing.num_interfaces as usize];
        let mut pads = vec![unsafe { std::mem::zeroed::<ffi::media_v2_pad>() }; sizing.num_pads as usize];
        let mut links = vec![unsafe { std::mem::zeroed::<ffi::media_v2_link>() }; sizing.num_links as usize];

        let mut topology = sizing;
        topology.ptr_entities = entities.as_mut_ptr() as u64;
        topology.ptr_interfaces = interfaces.as_mut_ptr() as u64;
        topology.ptr_pads = pads.as_mut_ptr() as u64;
        topology.ptr_links = links.as_mut_ptr() as u64;

        // The kernel rejects the call with ENOSPC if the graph grew between
        // the two ioctls.
        match ioctl(file, ffi::MEDIA_IOC_G_TOPOLOGY, &mut topology) {
            Ok(()) => {}
            Err(e) if e.raw_os_error() == Some(libc::ENOSPC) => continue,
            Err(e) => return Err(e),
        }

        if topology.topology_version != sizing.topology_version {
            log::debug!(
                "Topology changed while reading ({} -> {}), retrying",
                sizing.topology_version,
                topology.topology_version
            );
            continue;
        }

        entities.truncate(topology.num_entities as usize);
        interfaces.truncate(topology.num_interfaces as usize);
        pads.truncate(topology.num_pads as usize);
        links.truncate(topology.num_links as usize);

        return Ok(Topology {
            version: topology.topology_version,
            entities,
            interfaces,
            pads,
            links,
        });
    }

    Err(io::Error::new(
        io::ErrorKind::Other,
        "topology kept changing while being read",
    ))
}

fn populate<F>(builder: &mut MediaDeviceBuilder, topology: &Topology, media_version: u32, resolve: &F)
where
    F: Fn(u32, u32) -> Option<String>,
{
    let has_pad_index = ffi::media_v2_pad_has_index(media_version);

    for raw in &topology.entities {
        let entity = MediaEntity::new(raw.id, &c_string(&raw.name))
            .with_function(raw.function)
            .with_flags(raw.flags);
        builder.push_entity(entity);
    }

    let mut pad_index = std::collections::HashMap::<u32, u32>::new();
    for raw in &topology.pads {
        // Older kernels don't report pad indices; number them in order.
        let index = if has_pad_index {
            raw.index
        } else {
            let next = pad_index.entry(raw.entity_id).or_insert(0);
            let index = *next;
            *next += 1;
            index
        };

        let flags = raw.flags;
        if let Some(entity) = builder
            .entities_mut()
            .iter_mut()
            .find(|entity| entity.id() == raw.entity_id)
        {
            entity.push_pad(MediaPad::new(raw.id, index, raw.entity_id, flags));
        } else {
            log::warn!("Pad {} references unknown entity {}", raw.id, raw.entity_id);
        }
    }

    for raw in &topology.links {
        match raw.flags & ffi::MEDIA_LNK_FL_LINK_TYPE {
            ffi::MEDIA_LNK_FL_DATA_LINK => {
                builder.push_link(raw.id, raw.source_id, raw.sink_id, raw.flags)
            }
            ffi::MEDIA_LNK_FL_INTERFACE_LINK => {
                let Some(interface) = topology.interfaces.iter().find(|i| i.id == raw.source_id)
                else {
                    log::warn!("Interface link {} references unknown interface", raw.id);
                    continue;
                };
                // SAFETY: every interface type the kernel reports today is a
                // device node interface, so the devnode variant is active.
                let devnode = unsafe { interface.__bindgen_anon_1.devnode };
                if let Some(entity) = builder
                    .entities_mut()
                    .iter_mut()
                    .find(|entity| entity.id() == raw.sink_id)
                {
                    entity.set_device_number(devnode.major, devnode.minor);
                    if let Some(path) = resolve(devnode.major, devnode.minor) {
                        entity.set_device_node(path);
                    }
                }
            }
            // Ancillary links (lens/flash to sensor) carry no pad data.
            _ => {}
        }
    }
}

fn c_string(raw: &[c_char]) -> String {
    let bytes: Vec<u8> = raw
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}
