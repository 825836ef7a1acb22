//! Property-Based Tests for the Identity Resolver
//!
//! Snapshots are generated from a small identifier space so that stubs,
//! pass-through drives and volume keys collide often.
//!
//! # Test Properties
//!
//! 1. **Idempotence**: resolving the same snapshot twice gives equal output
//! 2. **Partition**: every vendor drive lands in exactly one output set
//! 3. **Conservation**: every kernel stub becomes a volume or a pass-through drive
//! 4. **Health Monotonicity**: a volume is healthy iff all members are and it is not degraded

#![cfg(test)]

use std::collections::BTreeMap;

use proptest::prelude::*;

use super::{Resolution, Resolver};
use crate::domain::health::HealthReporter;
use crate::domain::ports::{LogDriveKey, VendorInventory, VendorLogDrive};
use crate::domain::storage::{KernelStub, PhyDrive, RaidFamily, RaidLevel, ScsiAddress};

// =============================================================================
// Property Strategies
// =============================================================================

/// One of the identifiers in the shared pool
fn id(slot: u8) -> String {
    format!("0x50000000000000{:02x}", slot)
}

fn family_strategy() -> impl Strategy<Value = RaidFamily> {
    prop_oneof![
        Just(RaidFamily::MegaRaid),
        Just(RaidFamily::SasIr),
        Just(RaidFamily::SmartArray),
    ]
}

/// (error count, status is good)
fn drive_strategy() -> impl Strategy<Value = (u32, bool)> {
    (0u32..9, prop::bool::weighted(0.8))
}

/// (key slot, volume status is good, members)
fn volume_strategy() -> impl Strategy<Value = (u8, bool, Vec<(u32, bool)>)> {
    (0u8..6, any::<bool>(), prop::collection::vec(drive_strategy(), 0..4))
}

/// (scsi target / key slot, identifier slot)
fn stub_strategy() -> impl Strategy<Value = (u8, Option<u8>)> {
    (0u8..6, prop::option::of(0u8..6))
}

#[derive(Debug, Clone)]
struct Snapshot {
    family: RaidFamily,
    stubs: Vec<KernelStub>,
    vendor: VendorInventory,
}

fn snapshot_strategy() -> impl Strategy<Value = Snapshot> {
    (
        family_strategy(),
        prop::collection::vec(stub_strategy(), 0..6),
        prop::collection::vec((0u8..6, drive_strategy()), 0..4),
        prop::collection::vec(volume_strategy(), 0..4),
        prop::collection::vec(drive_strategy(), 0..3),
    )
        .prop_map(|(family, stubs, passthrough, volumes, unconfigured)| {
            build_snapshot(family, stubs, passthrough, volumes, unconfigured)
        })
}

fn build_snapshot(
    family: RaidFamily,
    stubs: Vec<(u8, Option<u8>)>,
    passthrough: Vec<(u8, (u32, bool))>,
    volumes: Vec<(u8, bool, Vec<(u32, bool)>)>,
    unconfigured: Vec<(u32, bool)>,
) -> Snapshot {
    let mut serial = 0;
    let mut drive = |(errors, good): (u32, bool)| {
        serial += 1;
        let mut pd = PhyDrive::new(family);
        pd.serial = format!("S{}", serial);
        pd.slot = serial.to_string();
        pd.media_errors = errors;
        pd.status = match (family, good) {
            (RaidFamily::MegaRaid, true) => "Online, Spun Up",
            (RaidFamily::SasIr, true) => "Optimal (OPT)",
            (RaidFamily::SmartArray, true) => "OK",
            (_, false) => "Failed",
        }
        .to_string();
        pd
    };

    let passthrough = passthrough
        .into_iter()
        .map(|(slot, shape)| {
            let mut pd = drive(shape);
            match family {
                RaidFamily::MegaRaid => pd.ids.wwn = Some(id(slot)),
                _ => pd.ids.sas_address = Some(id(slot)),
            }
            pd
        })
        .collect();

    let log_drives = volumes
        .into_iter()
        .map(|(slot, good, members)| {
            let (key, status) = match family {
                RaidFamily::MegaRaid => (LogDriveKey::Target(slot as u16), if good { "Optimal" } else { "Degraded" }),
                RaidFamily::SasIr => (LogDriveKey::SasAddress(id(slot)), if good { "Okay (OKY)" } else { "Degraded (DGD)" }),
                RaidFamily::SmartArray => (
                    LogDriveKey::DevicePath(format!("/dev/sd{}", (b'a' + slot) as char)),
                    if good { "OK" } else { "Interim Recovery Mode" },
                ),
            };
            VendorLogDrive {
                key,
                label: format!("vol:{}", slot),
                level: RaidLevel::Raid1,
                size: 0,
                status: status.to_string(),
                stripe_size: 0,
                cache_policy: String::new(),
                members: members.into_iter().map(&mut drive).collect(),
            }
        })
        .collect();

    let unconfigured = unconfigured.into_iter().map(&mut drive).collect();

    let stubs = stubs
        .into_iter()
        .map(|(target, ident)| KernelStub {
            name: format!("sd{}", (b'a' + target) as char),
            scsi: ScsiAddress::new(0, 0, target as u16, 0),
            sas_address: ident.map(id),
            ..Default::default()
        })
        .collect();

    Snapshot {
        family,
        stubs,
        vendor: VendorInventory {
            log_drives,
            passthrough,
            unconfigured,
            ..Default::default()
        },
    }
}

fn serial_counts(out: &Resolution) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    let serials = out
        .log_drives
        .iter()
        .flat_map(|ld| ld.members.iter())
        .chain(out.passthrough_drives.iter().map(|pt| &pt.drive))
        .chain(out.unconfigured_drives.iter())
        .map(|pd| pd.serial.clone());
    for s in serials {
        *counts.entry(s).or_insert(0) += 1;
    }
    counts
}

// =============================================================================
// Resolution Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: resolution is a pure function of its inputs.
    #[test]
    fn prop_idempotent(snap in snapshot_strategy()) {
        let resolver = Resolver::default();
        let first = resolver.resolve(snap.family, &snap.stubs, &snap.vendor);
        let second = resolver.resolve(snap.family, &snap.stubs, &snap.vendor);
        prop_assert_eq!(first, second);
    }

    /// Property: each vendor drive appears exactly once across the three sets.
    #[test]
    fn prop_partition(snap in snapshot_strategy()) {
        let out = Resolver::default().resolve(snap.family, &snap.stubs, &snap.vendor);
        let counts = serial_counts(&out);

        prop_assert_eq!(counts.len(), snap.vendor.phy_drive_count());
        prop_assert!(counts.values().all(|n| *n == 1));
    }

    /// Property: no kernel stub is dropped.
    #[test]
    fn prop_conservation(snap in snapshot_strategy()) {
        let out = Resolver::default().resolve(snap.family, &snap.stubs, &snap.vendor);
        prop_assert_eq!(
            out.log_drives.len() + out.passthrough_drives.len(),
            snap.stubs.len()
        );

        let names: Vec<&str> = out
            .log_drives
            .iter()
            .map(|ld| ld.name())
            .chain(out.passthrough_drives.iter().map(|pt| pt.name()))
            .collect();
        for stub in &snap.stubs {
            prop_assert!(names.contains(&stub.name.as_str()));
        }
    }

    /// Property: an unhealthy member makes its volume unhealthy, and a volume
    /// with healthy members that is not degraded is healthy.
    #[test]
    fn prop_health_monotonic(snap in snapshot_strategy()) {
        let out = Resolver::default().resolve(snap.family, &snap.stubs, &snap.vendor);
        for ld in &out.log_drives {
            let members_ok = ld.members.iter().all(|m| m.is_healthy());
            if !members_ok {
                prop_assert!(!ld.is_healthy());
            }
            if members_ok && !ld.degraded() {
                prop_assert!(ld.is_healthy());
            }
        }
    }
}

// =============================================================================
// Scenario Checks
// =============================================================================

#[test]
fn test_three_drives_two_referenced() {
    let snap = build_snapshot(
        RaidFamily::SasIr,
        vec![(0, Some(1)), (1, Some(2))],
        vec![(1, (0, true))],
        vec![(2, true, vec![(0, true)])],
        vec![(0, true)],
    );
    let out = Resolver::default().resolve(snap.family, &snap.stubs, &snap.vendor);

    assert_eq!(out.passthrough_drives.len(), 1);
    assert_eq!(out.log_drives.len(), 1);
    assert_eq!(out.log_drives[0].members.len(), 1);
    assert_eq!(out.unconfigured_drives.len(), 1);
    assert_eq!(out.unconfigured_drives[0].serial, "S3");
}
