// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Media controller device listing with optional entity graph output.

use crate::error::CliError;
use crate::utils::{format_version, open_enumerator};
use clap::Args as ClapArgs;
use mediadev::backend::BackendKind;
use mediadev::{MediaDevice, MediaEntity};
use serde::Serialize;

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Show the entities of each device
    #[arg(short, long)]
    entities: bool,

    /// Show the links between entities (implies --entities)
    #[arg(short, long)]
    links: bool,

    /// Show only devices bound to this driver
    #[arg(long, value_name = "DRIVER")]
    driver: Option<String>,
}

#[derive(Debug, Serialize)]
struct ListOutput {
    backend: String,
    devices: Vec<DeviceInfo>,
}

#[derive(Debug, Serialize)]
struct DeviceInfo {
    node: String,
    driver: String,
    model: String,
    bus_info: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    serial: String,
    driver_version: String,
    state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    entities: Option<Vec<EntityInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    links: Option<Vec<LinkInfo>>,
}

#[derive(Debug, Serialize)]
struct EntityInfo {
    id: u32,
    name: String,
    function: String,
    pads: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_node: Option<String>,
}

#[derive(Debug, Serialize)]
struct LinkInfo {
    source: String,
    sink: String,
    enabled: bool,
    immutable: bool,
}

pub fn execute(args: Args, backend: Option<BackendKind>, json: bool) -> Result<(), CliError> {
    log::debug!("Executing list command: {:?}", args);

    if matches!(args.driver.as_deref(), Some("")) {
        return Err(CliError::InvalidArgs("--driver must not be empty".into()));
    }

    let enumerator = open_enumerator(backend)?;
    let show_entities = args.entities || args.links;

    let devices = enumerator
        .devices()
        .iter()
        .filter(|d| args.driver.as_deref().map_or(true, |drv| d.driver() == drv))
        .map(|d| device_info(d, show_entities, args.links))
        .collect();

    let output = ListOutput {
        backend: enumerator.backend_name().to_string(),
        devices,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_text_output(&output);
    }

    Ok(())
}

fn device_info(device: &MediaDevice, entities: bool, links: bool) -> DeviceInfo {
    DeviceInfo {
        node: device.device_node().to_string(),
        driver: device.driver().to_string(),
        model: device.model().to_string(),
        bus_info: device.bus_info().to_string(),
        serial: device.serial().to_string(),
        driver_version: format_version(device.driver_version()),
        state: device.state().to_string(),
        entities: entities.then(|| device.entities().iter().map(entity_info).collect()),
        links: links.then(|| link_infos(device)),
    }
}

fn entity_info(entity: &MediaEntity) -> EntityInfo {
    EntityInfo {
        id: entity.id(),
        name: entity.name().to_string(),
        function: entity.function_name().to_string(),
        pads: entity.pads().len(),
        device_node: entity.device_node().map(str::to_string),
    }
}

/// Links rendered as "entity:pad" endpoints
fn link_infos(device: &MediaDevice) -> Vec<LinkInfo> {
    let endpoint = |entity_id: u32, pad_id: u32| -> String {
        match device.entity(entity_id) {
            Some(entity) => {
                let index = entity
                    .pads()
                    .iter()
                    .find(|p| p.id() == pad_id)
                    .map(|p| p.index())
                    .unwrap_or_default();
                format!("\"{}\":{}", entity.name(), index)
            }
            None => format!("#{}", entity_id),
        }
    };

    device
        .links()
        .iter()
        .map(|link| LinkInfo {
            source: endpoint(link.source_entity(), link.source_pad()),
            sink: endpoint(link.sink_entity(), link.sink_pad()),
            enabled: link.is_enabled(),
            immutable: link.is_immutable(),
        })
        .collect()
}

fn print_text_output(output: &ListOutput) {
    println!(
        "Media Devices ({} devices, {} backend)\n",
        output.devices.len(),
        output.backend
    );

    if output.devices.is_empty() {
        println!("  No media controller devices found.");
        return;
    }

    for device in &output.devices {
        let model = if device.model.is_empty() {
            "(no model)"
        } else {
            &device.model
        };
        println!("{}  {} [{}]", device.node, model, device.driver);
        println!("    bus:     {}", device.bus_info);
        if !device.serial.is_empty() {
            println!("    serial:  {}", device.serial);
        }
        println!("    version: {}", device.driver_version);
        println!("    state:   {}", device.state);

        if let Some(entities) = &device.entities {
            println!("    entities ({}):", entities.len());
            for entity in entities {
                let node = entity.device_node.as_deref().unwrap_or("-");
                println!(
                    "      {:>3}  {:<32} {:<20} pads={} {}",
                    entity.id, entity.name, entity.function, entity.pads, node
                );
            }
        }

        if let Some(links) = &device.links {
            println!("    links ({}):", links.len());
            for link in links {
                let mut flags = Vec::new();
                if link.enabled {
                    flags.push("ENABLED");
                }
                if link.immutable {
                    flags.push("IMMUTABLE");
                }
                println!("      {} -> {} [{}]", link.source, link.sink, flags.join(","));
            }
        }
        println!();
    }
}
