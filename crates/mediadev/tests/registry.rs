// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
//
// Device Registry Tests
//
// TESTING LAYERS:
//
// Layer 1 (Unit Tests - No hardware required):
//   - DeviceMatch containment semantics, including randomized checks
//   - Registry identity, duplicate handling and removal
//   - Listener notification balance
//   - Claim lifecycle across removal
//   - sysfs discovery against a fake tree
//
// Layer 3 (Hardware Integration - Requires /dev/media* devices):
//   - Real enumeration through the auto-selected backend
//   - Topology sanity of every discovered device
//
// RUN LAYER 1:
//   cargo test --test registry
//
// RUN LAYER 3 (on hardware):
//   cargo test --test registry -- --ignored --nocapture

use std::collections::HashSet;
use std::fs;
use std::sync::{Arc, Mutex, Weak};

use mediadev::backend::{MemoryBackend, SysfsBackend};
use mediadev::media::MediaDeviceBuilder;
use mediadev::pipeline::{PipelineHandler, SimplePipelineHandler};
use mediadev::{
    DeviceEnumerator, DeviceListener, DeviceMatch, DeviceState, MediaDevice,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

fn enumerator() -> DeviceEnumerator {
    let mut enumerator = DeviceEnumerator::new(Box::new(MemoryBackend::new()));
    enumerator.init().expect("memory backend init");
    enumerator
}

fn device(node: &str, driver: &str, entities: &[&str]) -> MediaDevice {
    entities
        .iter()
        .fold(MediaDeviceBuilder::new(node, driver), |b, name| b.entity(name))
        .build()
        .expect("valid device")
}

#[derive(Default)]
struct Counter {
    added: Mutex<Vec<String>>,
    removed: Mutex<Vec<String>>,
}

impl DeviceListener for Counter {
    fn device_added(&self, _enumerator: &DeviceEnumerator, device: &Arc<MediaDevice>) {
        self.added.lock().unwrap().push(device.device_node().to_owned());
    }

    fn device_removed(&self, device: &Arc<MediaDevice>) {
        self.removed.lock().unwrap().push(device.device_node().to_owned());
    }
}

fn subscribe(enumerator: &mut DeviceEnumerator) -> Arc<Counter> {
    let counter = Arc::new(Counter::default());
    let weak: Weak<dyn DeviceListener> = Arc::downgrade(&counter) as Weak<dyn DeviceListener>;
    enumerator.subscribe(weak);
    counter
}

// =============================================================================
// Layer 1: Unit Tests (No Hardware Required)
// =============================================================================

// -----------------------------------------------------------------------------
// Reference Scenarios
// -----------------------------------------------------------------------------

#[test]
fn test_add_search_remove_single_device() {
    let mut enumerator = enumerator();
    let counter = subscribe(&mut enumerator);
    let dm = DeviceMatch::new("uvcvideo");

    assert!(enumerator.search(&dm).is_none());

    enumerator.add_device(device("/dev/media0", "uvcvideo", &[]));
    assert_eq!(*counter.added.lock().unwrap(), vec!["/dev/media0"]);

    let found = enumerator.search(&dm).expect("device is discoverable");
    assert_eq!(found.device_node(), "/dev/media0");
    drop(found);

    enumerator.remove_device("/dev/media0");
    assert!(enumerator.search(&dm).is_none());
}

#[test]
fn test_entity_selection_beats_discovery_order() {
    let mut enumerator = enumerator();
    enumerator.add_device(device("/dev/media0", "uvcvideo", &["sensor"]));
    enumerator.add_device(device(
        "/dev/media1",
        "uvcvideo",
        &["sensor", "uvcvideo-source"],
    ));

    let mut dm = DeviceMatch::new("uvcvideo");
    dm.add("uvcvideo-source");

    let found = enumerator.search(&dm).expect("match on /dev/media1");
    assert_eq!(found.device_node(), "/dev/media1");
}

// -----------------------------------------------------------------------------
// Registry Properties
// -----------------------------------------------------------------------------

#[test]
fn test_duplicate_add_is_idempotent() {
    let mut enumerator = enumerator();
    let counter = subscribe(&mut enumerator);

    enumerator.add_device(device("/dev/media0", "uvcvideo", &["sensor"]));
    let original = Arc::clone(&enumerator.devices()[0]);

    let added = enumerator.add_device(device("/dev/media0", "vimc", &["Scaler"]));
    assert!(!added);
    assert_eq!(enumerator.len(), 1);
    assert!(Arc::ptr_eq(&original, &enumerator.devices()[0]));
    assert_eq!(enumerator.devices()[0].driver(), "uvcvideo");
    assert_eq!(counter.added.lock().unwrap().len(), 1);
}

#[test]
fn test_removed_device_never_found_while_held() {
    let mut enumerator = enumerator();
    enumerator.add_device(device("/dev/media0", "uvcvideo", &[]));
    enumerator.add_device(device("/dev/media1", "uvcvideo", &[]));

    let dm = DeviceMatch::new("uvcvideo");
    let claim = enumerator.search(&dm).unwrap().claim().unwrap();
    assert_eq!(claim.device().device_node(), "/dev/media0");

    enumerator.remove_device("/dev/media0");
    assert_eq!(claim.device().state(), DeviceState::PendingRemoval);

    for _ in 0..3 {
        let found = enumerator.search(&dm).unwrap();
        assert_eq!(found.device_node(), "/dev/media1");
    }

    // Releasing the claim does not resurrect the device.
    let held = Arc::clone(claim.device());
    drop(claim);
    assert_eq!(held.state(), DeviceState::PendingRemoval);
    assert!(enumerator.device("/dev/media0").is_none());
}

#[test]
fn test_search_is_deterministic() {
    let mut enumerator = enumerator();
    for i in 0..8 {
        enumerator.add_device(device(
            &format!("/dev/media{}", i),
            "vimc",
            &["Sensor A", "Scaler"],
        ));
    }

    let dm = DeviceMatch::new("vimc").with_entity("Scaler");
    let first = enumerator.search(&dm).unwrap();
    for _ in 0..16 {
        assert!(Arc::ptr_eq(&first, &enumerator.search(&dm).unwrap()));
    }
    assert_eq!(first.device_node(), "/dev/media0");
}

#[test]
fn test_add_remove_round_trip() {
    let mut enumerator = enumerator();
    enumerator.add_device(device("/dev/media0", "uvcvideo", &["sensor"]));
    let before: Vec<_> = enumerator.devices().to_vec();

    let counter = subscribe(&mut enumerator);
    enumerator.add_device(device("/dev/media5", "vimc", &["Sensor A"]));
    enumerator.remove_device("/dev/media5");

    assert_eq!(enumerator.len(), before.len());
    for (a, b) in before.iter().zip(enumerator.devices()) {
        assert!(Arc::ptr_eq(a, b));
    }
    assert_eq!(*counter.added.lock().unwrap(), vec!["/dev/media5"]);
    assert_eq!(*counter.removed.lock().unwrap(), vec!["/dev/media5"]);
}

#[test]
fn test_unclaimed_device_destroyed_on_remove() {
    let mut enumerator = enumerator();
    enumerator.add_device(device("/dev/media0", "uvcvideo", &[]));
    let weak = Arc::downgrade(&enumerator.devices()[0]);

    enumerator.remove_device("/dev/media0");
    assert!(weak.upgrade().is_none());
}

#[test]
fn test_claimed_device_outlives_registry() {
    let mut enumerator = enumerator();
    enumerator.add_device(device("/dev/media0", "uvcvideo", &[]));
    let claim = enumerator.devices()[0].claim().unwrap();
    let weak = Arc::downgrade(claim.device());

    drop(enumerator);
    assert!(weak.upgrade().is_some());
    drop(claim);
    assert!(weak.upgrade().is_none());
}

// -----------------------------------------------------------------------------
// Randomized Matching
// -----------------------------------------------------------------------------

const NAMES: &[&str] = &[
    "sensor",
    "uvcvideo-source",
    "Sensor A",
    "Sensor B",
    "Debayer A",
    "Scaler",
    "Raw Capture 0",
    "RGB/YUV Capture",
];

#[test]
fn test_matches_iff_driver_and_subset() {
    let mut rng = StdRng::seed_from_u64(0x6d65_6469_6164_6576);
    let drivers = ["uvcvideo", "vimc"];

    for _ in 0..500 {
        let device_driver = drivers[rng.random_range(0..drivers.len())];
        let match_driver = drivers[rng.random_range(0..drivers.len())];

        let mut names = NAMES.to_vec();
        names.shuffle(&mut rng);
        let device_names: Vec<&str> = names[..rng.random_range(0..=names.len())].to_vec();

        names.shuffle(&mut rng);
        let required: Vec<&str> = names[..rng.random_range(0..=3)].to_vec();

        let dev = device("/dev/media0", device_driver, &device_names);
        let dm = required
            .iter()
            .fold(DeviceMatch::new(match_driver), |dm, name| dm.with_entity(name));

        let present: HashSet<&str> = device_names.iter().copied().collect();
        let expected =
            device_driver == match_driver && required.iter().all(|name| present.contains(name));
        assert_eq!(
            dm.matches(&dev),
            expected,
            "match {} against {} {:?}",
            dm,
            device_driver,
            device_names
        );
    }
}

// -----------------------------------------------------------------------------
// sysfs Discovery
// -----------------------------------------------------------------------------

#[test]
fn test_sysfs_enumeration_skips_unopenable_nodes() {
    let sys = tempfile::tempdir().unwrap();
    let dev = tempfile::tempdir().unwrap();

    for index in 0..2 {
        let bus = sys.path().join(format!("bus/media/devices/media{}", index));
        fs::create_dir_all(&bus).unwrap();
        fs::write(bus.join("dev"), format!("237:{}\n", index)).unwrap();

        let char_dir = sys.path().join(format!("dev/char/237:{}", index));
        fs::create_dir_all(&char_dir).unwrap();
        fs::write(
            char_dir.join("uevent"),
            format!("MAJOR=237\nMINOR={}\nDEVNAME=media{}\n", index, index),
        )
        .unwrap();

        // Regular files are not media controller devices.
        fs::write(dev.path().join(format!("media{}", index)), b"").unwrap();
    }

    let mut enumerator =
        DeviceEnumerator::new(Box::new(SysfsBackend::with_roots(sys.path(), dev.path())));
    enumerator.init().unwrap();
    assert!(!enumerator.hotplug_active());

    assert_eq!(enumerator.enumerate().unwrap(), 0);
    assert!(enumerator.is_empty());
}

// =============================================================================
// Layer 3: Hardware Integration Tests (Requires /dev/media* Devices)
// =============================================================================

#[test]
#[ignore = "requires media controller devices (run with --ignored on hardware)"]
fn test_hardware_enumerate() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut enumerator = DeviceEnumerator::create().expect("a discovery backend");
    let count = enumerator.enumerate().expect("scan succeeds");
    println!("{} backend found {} media devices", enumerator.backend_name(), count);

    for device in enumerator.devices() {
        println!("{}", device);
        assert!(!device.driver().is_empty());
        assert!(device.device_node().starts_with("/dev/"));

        let ids: HashSet<u32> = device.entities().iter().map(|e| e.id()).collect();
        for link in device.links() {
            assert!(ids.contains(&link.source_entity()));
            assert!(ids.contains(&link.sink_entity()));
        }

        let dm = DeviceMatch::new(device.driver());
        assert!(enumerator.search(&dm).is_some());
    }
}

#[test]
#[ignore = "requires the vimc kernel module (modprobe vimc)"]
fn test_hardware_vimc_match() {
    let mut enumerator = DeviceEnumerator::create().expect("a discovery backend");
    enumerator.enumerate().expect("scan succeeds");

    let handler = SimplePipelineHandler::vimc();
    let device = enumerator
        .search(handler.device_match())
        .expect("vimc device present");
    assert_eq!(device.driver(), "vimc");
    assert!(device.entity_by_name("Sensor A").unwrap().is_sensor());
}
