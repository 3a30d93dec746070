// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Look up the device a pipeline handler would bind for a match.

use crate::error::CliError;
use crate::utils::open_enumerator;
use clap::Args as ClapArgs;
use mediadev::backend::BackendKind;
use mediadev::DeviceMatch;
use serde::Serialize;

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Kernel driver name the device must report
    #[arg(short, long, value_name = "DRIVER")]
    driver: String,

    /// Entity name the device must contain (repeatable)
    #[arg(short, long = "entity", value_name = "NAME")]
    entities: Vec<String>,
}

#[derive(Debug, Serialize)]
struct MatchOutput {
    driver: String,
    entities: Vec<String>,
    node: String,
    model: String,
    bus_info: String,
}

pub fn execute(args: Args, backend: Option<BackendKind>, json: bool) -> Result<(), CliError> {
    log::debug!("Executing match command: {:?}", args);

    if args.driver.is_empty() {
        return Err(CliError::InvalidArgs("--driver must not be empty".into()));
    }

    let dm = args
        .entities
        .iter()
        .fold(DeviceMatch::new(&args.driver), |dm, name| dm.with_entity(name));

    let enumerator = open_enumerator(backend)?;
    let device = enumerator
        .search(&dm)
        .ok_or_else(|| CliError::NoMatch(dm.to_string()))?;

    let output = MatchOutput {
        driver: dm.driver().to_string(),
        entities: dm.entities().to_vec(),
        node: device.device_node().to_string(),
        model: device.model().to_string(),
        bus_info: device.bus_info().to_string(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", output.node);
        log::info!("{} matched {} ({})", dm, output.model, output.bus_info);
    }

    Ok(())
}
