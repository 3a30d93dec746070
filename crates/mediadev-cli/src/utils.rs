// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use mediadev::backend::BackendKind;
use mediadev::DeviceEnumerator;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Install signal handlers for graceful shutdown on Ctrl+C or SIGTERM
///
/// Returns an Arc<AtomicBool> that will be set to true when a signal is
/// received. Check this flag periodically in your main loop to exit.
pub fn install_signal_handler() -> Result<Arc<AtomicBool>, CliError> {
    let term = Arc::new(AtomicBool::new(false));

    for signal in [SIGINT, SIGTERM] {
        flag::register(signal, Arc::clone(&term))
            .map_err(|e| CliError::General(format!("Failed to register signal handler: {}", e)))?;
    }

    log::debug!("Installed SIGINT/SIGTERM handlers");
    Ok(term)
}

/// Create an initialised enumerator and scan the devices present now
///
/// Uses `backend` when given, otherwise the library's automatic selection.
pub fn open_enumerator(backend: Option<BackendKind>) -> Result<DeviceEnumerator, CliError> {
    let mut enumerator = match backend {
        Some(kind) => {
            let mut enumerator = DeviceEnumerator::new(kind.create());
            enumerator.init()?;
            enumerator
        }
        None => DeviceEnumerator::create()?,
    };

    let count = enumerator.enumerate()?;
    log::debug!(
        "{} backend registered {} media devices",
        enumerator.backend_name(),
        count
    );
    Ok(enumerator)
}

/// Format a kernel version number as "major.minor.patch"
pub fn format_version(version: u32) -> String {
    format!(
        "{}.{}.{}",
        (version >> 16) & 0xff,
        (version >> 8) & 0xff,
        version & 0xff
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_version() {
        assert_eq!(format_version((6 << 16) | (8 << 8) | 12), "6.8.12");
        assert_eq!(format_version(0), "0.0.0");
    }
}
