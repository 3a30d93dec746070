// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(clippy::type_complexity)]
#![allow(clippy::missing_safety_doc)]
#![allow(clippy::too_many_arguments)]

include!("ffi.rs");

// Re-export libloading for error handling
pub use libloading;

use std::sync::{Mutex, OnceLock};

static LIBRARY: OnceLock<UdevLibrary> = OnceLock::new();
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Default soname used when `MEDIADEV_UDEV_LIBRARY` is not set.
pub const DEFAULT_UDEV_LIBRARY: &str = "libudev.so.1";

/// Load libudev on first use.
///
/// Subsequent calls return the already loaded library. Returns an error if
/// the library cannot be loaded, which callers treat as the udev backend
/// being unavailable.
///
/// The environment variable `MEDIADEV_UDEV_LIBRARY` can be used to specify
/// a custom path to the library. If not set, searches standard system paths.
pub fn init() -> Result<&'static UdevLibrary, libloading::Error> {
    if let Some(lib) = LIBRARY.get() {
        return Ok(lib);
    }

    let _guard = INIT_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    // Double-check after acquiring lock
    if let Some(lib) = LIBRARY.get() {
        return Ok(lib);
    }

    let lib_path = std::env::var("MEDIADEV_UDEV_LIBRARY")
        .ok()
        .unwrap_or_else(|| DEFAULT_UDEV_LIBRARY.to_string());

    let lib = unsafe { UdevLibrary::new(lib_path.as_str())? };

    Ok(LIBRARY.get_or_init(|| lib))
}

/// Try to get a reference to the loaded library without loading it
pub fn try_library() -> Option<&'static UdevLibrary> {
    LIBRARY.get()
}
