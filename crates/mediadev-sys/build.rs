// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

// libudev is loaded at runtime via libloading, so no rustc-link-lib
// directive is emitted and hosts without libudev development files still
// build the crate.

fn main() {
    // The uAPI mirrors are hand-maintained against linux/media.h
    println!("cargo:rerun-if-changed=src/ffi.rs");
}
