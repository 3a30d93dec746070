// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

mod error;
mod list;
mod matching;
mod monitor;
mod utils;

use clap::{Parser, Subcommand};
use error::result_to_exit_code;
use mediadev::backend::BackendKind;
use std::process::ExitCode;

/// MediaDev CLI - Media controller device discovery and camera hotplug tool
#[derive(Parser)]
#[command(name = "mediadev")]
#[command(version)]
#[command(about = "MediaDev CLI - Media controller device discovery and camera hotplug tool")]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (use RUST_LOG=debug for more)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Discovery backend (udev or sysfs), overrides MEDIADEV_BACKEND
    #[arg(long, global = true, value_name = "BACKEND")]
    backend: Option<BackendKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List media controller devices and their entity graphs
    List(list::Args),

    /// Find the first unclaimed device matching a driver and entity set
    Match(matching::Args),

    /// Watch cameras being added and removed until interrupted
    Monitor(monitor::Args),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::List(args) => list::execute(args, cli.backend, cli.json),
        Commands::Match(args) => matching::execute(args, cli.backend, cli.json),
        Commands::Monitor(args) => monitor::execute(args, cli.backend, cli.json),
    };

    result_to_exit_code(result)
}

/// Initialize env_logger based on verbosity flags
fn init_logging(verbose: bool, quiet: bool) {
    let env = env_logger::Env::default();

    let env = if quiet {
        env.default_filter_or("error")
    } else if verbose {
        env.default_filter_or("debug")
    } else {
        env.default_filter_or("warn")
    };

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .init();

    log::debug!("Logging initialized");
}
