//! Identity Resolver
//!
//! Reconciles the kernel's view of one controller (block devices under its PCI
//! node) with the vendor tool's view (volumes, pass-through and unconfigured
//! drives) into the final classified drive sets.
//!
//! # Matching
//!
//! Kernel stubs are visited in discovery order. Each stub is tried as:
//!
//! 1. **Pass-through**: the stub's SAS address / WWN equals the identifier of
//!    an unclaimed vendor pass-through drive. MegaRAID exposes pass-through
//!    drives by WWN, the other families by SAS address.
//! 2. **Logical drive**: the family's volume key equals an unclaimed vendor
//!    logical drive's key (SCSI target for MegaRAID, volume SAS address for
//!    SAS-IR, `/dev/<name>` for Smart Array).
//!
//! A stub matching neither stays a bare [`LogDrive`]. Vendor drives nobody
//! claimed end up in the unconfigured set, so every vendor drive lands in
//! exactly one output set.
//!
//! The inputs are borrowed and never modified; the output is built from
//! clones, so concurrent resolutions of different controllers share nothing.

#[cfg(test)]
mod proptest;

use crate::domain::ports::{LogDriveKey, VendorInventory, VendorLogDrive};
use crate::domain::storage::{
    KernelStub, LogDrive, PassthroughDrive, PhyDrive, RaidFamily, RaidVolume, UnconfiguredDrive,
};
use crate::logging::Logger;

/// Classified drive sets for one controller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub log_drives: Vec<LogDrive>,
    pub passthrough_drives: Vec<PassthroughDrive>,
    pub unconfigured_drives: Vec<UnconfiguredDrive>,
}

/// Merges kernel topology with one vendor inventory
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    log: Logger,
}

impl Resolver {
    pub fn new(log: Logger) -> Self {
        Self { log }
    }

    pub fn resolve(
        &self,
        family: RaidFamily,
        stubs: &[KernelStub],
        vendor: &VendorInventory,
    ) -> Resolution {
        let mut pt_claimed = vec![false; vendor.passthrough.len()];
        let mut ld_claimed = vec![false; vendor.log_drives.len()];
        let mut out = Resolution::default();

        for stub in stubs {
            if let Some(i) = find_passthrough(family, stub, &vendor.passthrough, &pt_claimed) {
                pt_claimed[i] = true;
                self.log.debug(format_args!(
                    "{}: pass-through drive at {}",
                    stub.name,
                    vendor.passthrough[i].pos()
                ));
                out.passthrough_drives.push(PassthroughDrive {
                    kernel: stub.clone(),
                    drive: vendor.passthrough[i].clone(),
                });
                continue;
            }

            match volume_key(family, stub) {
                Some(key) => match find_volume(&key, &vendor.log_drives, &ld_claimed) {
                    Some(i) => {
                        ld_claimed[i] = true;
                        out.log_drives.push(merge_volume(family, stub, &vendor.log_drives[i]));
                    }
                    None => {
                        self.log.debug(format_args!("{}: no vendor volume for {:?}", stub.name, key));
                        out.log_drives.push(LogDrive::bare(stub.clone()));
                    }
                },
                None => {
                    self.log.debug(format_args!("{}: no identifier to match on", stub.name));
                    out.log_drives.push(LogDrive::bare(stub.clone()));
                }
            }
        }

        let leftover_pt = vendor
            .passthrough
            .iter()
            .zip(&pt_claimed)
            .filter(|(_, claimed)| !**claimed)
            .map(|(pd, _)| pd);
        let leftover_members = vendor
            .log_drives
            .iter()
            .zip(&ld_claimed)
            .filter(|(_, claimed)| !**claimed)
            .flat_map(|(ld, _)| ld.members.iter());
        out.unconfigured_drives = leftover_pt
            .chain(leftover_members)
            .chain(vendor.unconfigured.iter())
            .cloned()
            .collect();

        self.log.debug(format_args!(
            "resolved {} stubs: {} volumes, {} pass-through, {} unconfigured",
            stubs.len(),
            out.log_drives.len(),
            out.passthrough_drives.len(),
            out.unconfigured_drives.len()
        ));
        out
    }
}

/// Identifier a vendor pass-through drive is exposed by in this family
fn passthrough_id(family: RaidFamily, pd: &PhyDrive) -> Option<&str> {
    match family {
        RaidFamily::MegaRaid => pd.ids.wwn.as_deref(),
        RaidFamily::SasIr | RaidFamily::SmartArray => pd.ids.sas_address.as_deref(),
    }
}

fn find_passthrough(
    family: RaidFamily,
    stub: &KernelStub,
    drives: &[PhyDrive],
    claimed: &[bool],
) -> Option<usize> {
    let ids: Vec<&str> = [stub.sas_address.as_deref(), stub.wwn.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    if ids.is_empty() {
        return None;
    }
    drives
        .iter()
        .enumerate()
        .filter(|(i, _)| !claimed[*i])
        .find(|(_, pd)| passthrough_id(family, pd).map(|id| ids.contains(&id)).unwrap_or(false))
        .map(|(i, _)| i)
}

fn volume_key(family: RaidFamily, stub: &KernelStub) -> Option<LogDriveKey> {
    match family {
        RaidFamily::MegaRaid => Some(LogDriveKey::Target(stub.scsi.target)),
        RaidFamily::SasIr => stub.sas_address.clone().map(LogDriveKey::SasAddress),
        RaidFamily::SmartArray => Some(LogDriveKey::DevicePath(stub.device_path())),
    }
}

fn find_volume(key: &LogDriveKey, volumes: &[VendorLogDrive], claimed: &[bool]) -> Option<usize> {
    volumes
        .iter()
        .enumerate()
        .find(|(i, ld)| !claimed[*i] && ld.key == *key)
        .map(|(i, _)| i)
}

fn merge_volume(family: RaidFamily, stub: &KernelStub, ld: &VendorLogDrive) -> LogDrive {
    LogDrive {
        kernel: stub.clone(),
        raid: Some(RaidVolume {
            level: ld.level,
            status: ld.status.clone(),
            cache_policy: ld.cache_policy.clone(),
            stripe_size: ld.stripe_size,
            group_label: ld.label.clone(),
            degraded: !family.is_good_volume_status(&ld.status),
        }),
        members: ld.members.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::health::HealthReporter;
    use crate::domain::storage::RaidLevel;
    use crate::logging::testing::Capture;

    fn stub(name: &str, scsi: &str) -> KernelStub {
        KernelStub {
            name: name.into(),
            scsi: scsi.parse().unwrap(),
            blocks: 1_953_525_168,
            ..Default::default()
        }
    }

    fn member(family: RaidFamily, slot: &str, status: &str) -> PhyDrive {
        let mut pd = PhyDrive::new(family);
        pd.enclosure = "32".into();
        pd.slot = slot.into();
        pd.status = status.into();
        pd
    }

    fn volume(key: LogDriveKey, level: RaidLevel, status: &str, members: Vec<PhyDrive>) -> VendorLogDrive {
        VendorLogDrive {
            key,
            label: "grp:0".into(),
            level,
            size: 0,
            status: status.into(),
            stripe_size: 65536,
            cache_policy: "WriteBack".into(),
            members,
        }
    }

    #[test]
    fn test_volume_matched_by_target() {
        let mega = RaidFamily::MegaRaid;
        let vendor = VendorInventory {
            log_drives: vec![volume(
                LogDriveKey::Target(0),
                RaidLevel::Raid1,
                "Optimal",
                vec![member(mega, "0", "Online, Spun Up"), member(mega, "1", "Online, Spun Up")],
            )],
            ..Default::default()
        };

        let out = Resolver::default().resolve(mega, &[stub("sda", "2:0:0:0")], &vendor);

        assert_eq!(out.log_drives.len(), 1);
        let sda = &out.log_drives[0];
        assert_eq!(sda.name(), "sda");
        assert_eq!(sda.level_string(), "RAID 1");
        assert_eq!(sda.members.len(), 2);
        assert!(!sda.degraded());
        assert!(sda.is_healthy());
        assert!(out.passthrough_drives.is_empty());
        assert!(out.unconfigured_drives.is_empty());
    }

    #[test]
    fn test_passthrough_wins_over_volume() {
        let sas = RaidFamily::SasIr;
        let mut jbod = member(sas, "2", "JBOD");
        jbod.ids.sas_address = Some("0x5003048009282600".into());

        let mut sdb = stub("sdb", "0:0:2:0");
        sdb.sas_address = Some("0x5003048009282600".into());

        let vendor = VendorInventory {
            // a volume with the same key must not be consulted once step 1 matched
            log_drives: vec![volume(
                LogDriveKey::SasAddress("0x5003048009282600".into()),
                RaidLevel::Raid0,
                "Okay (OKY)",
                vec![member(sas, "0", "Optimal (OPT)")],
            )],
            passthrough: vec![jbod.clone()],
            ..Default::default()
        };

        let out = Resolver::default().resolve(sas, &[sdb], &vendor);

        assert!(out.log_drives.is_empty());
        assert_eq!(out.passthrough_drives.len(), 1);
        assert_eq!(out.passthrough_drives[0].name(), "sdb");
        assert_eq!(out.passthrough_drives[0].drive, jbod);
        assert!(!out.unconfigured_drives.contains(&jbod));
        // the unclaimed volume's member is still accounted for
        assert_eq!(out.unconfigured_drives.len(), 1);
    }

    #[test]
    fn test_megaraid_passthrough_by_wwn() {
        let mega = RaidFamily::MegaRaid;
        let mut jbod = member(mega, "5", "JBOD");
        jbod.ids.wwn = Some("0x5000c500a1b2c3d2".into());

        let mut sdc = stub("sdc", "0:2:5:0");
        sdc.sas_address = Some("0x5000c500a1b2c3d2".into());

        let vendor = VendorInventory {
            passthrough: vec![jbod],
            ..Default::default()
        };
        let out = Resolver::default().resolve(mega, &[sdc], &vendor);
        assert_eq!(out.passthrough_drives.len(), 1);
        assert!(out.log_drives.is_empty());
    }

    #[test]
    fn test_unreferenced_drive_is_unconfigured_once() {
        let mega = RaidFamily::MegaRaid;
        let spare = member(mega, "7", "Unconfigured(good), Spun Up");
        let vendor = VendorInventory {
            log_drives: vec![volume(
                LogDriveKey::Target(0),
                RaidLevel::Raid1,
                "Optimal",
                vec![member(mega, "0", "Online"), member(mega, "1", "Online")],
            )],
            unconfigured: vec![spare.clone()],
            ..Default::default()
        };

        let out = Resolver::default().resolve(mega, &[stub("sda", "0:2:0:0")], &vendor);
        assert_eq!(out.unconfigured_drives, vec![spare]);
    }

    #[test]
    fn test_error_count_over_threshold_fails_volume() {
        let mega = RaidFamily::MegaRaid;
        let mut worn = member(mega, "1", "Online, Spun Up");
        worn.media_errors = 6;
        let vendor = VendorInventory {
            log_drives: vec![volume(
                LogDriveKey::Target(0),
                RaidLevel::Raid1,
                "Optimal",
                vec![member(mega, "0", "Online, Spun Up"), worn],
            )],
            ..Default::default()
        };

        let out = Resolver::default().resolve(mega, &[stub("sda", "0:2:0:0")], &vendor);
        let sda = &out.log_drives[0];
        assert!(!sda.members[1].is_healthy());
        assert!(!sda.is_healthy());
        assert!(!sda.degraded());
    }

    #[test]
    fn test_unmatched_stub_stays_bare() {
        let capture = Capture::default();
        let resolver = Resolver::new(Logger::with_dispatch("resolver", capture.dispatch()));

        let orphan = stub("sdd", "0:0:9:0");
        let out = resolver.resolve(RaidFamily::SmartArray, &[orphan.clone()], &VendorInventory::default());

        assert_eq!(out.log_drives, vec![LogDrive::bare(orphan)]);
        assert!(capture.contents().contains("sdd: no vendor volume"));
    }

    #[test]
    fn test_smart_array_degraded_volume() {
        let hp = RaidFamily::SmartArray;
        let vendor = VendorInventory {
            log_drives: vec![volume(
                LogDriveKey::DevicePath("/dev/sda".into()),
                RaidLevel::Raid5,
                "Interim Recovery Mode",
                vec![member(hp, "1", "OK"), member(hp, "2", "Failed")],
            )],
            ..Default::default()
        };
        let out = Resolver::default().resolve(hp, &[stub("sda", "0:1:0:0")], &vendor);
        let sda = &out.log_drives[0];
        assert!(sda.degraded());
        assert_eq!(sda.status(), "Interim Recovery Mode");
        assert!(!sda.is_healthy());
    }

    #[test]
    fn test_smart_array_passthrough_by_sas_address() {
        let hp = RaidFamily::SmartArray;
        let mut exposed = member(hp, "5", "OK");
        exposed.ids.sas_address = Some("0x5000c500a1b2c3e5".into());
        let idle = member(hp, "6", "OK");

        let mut sdb = stub("sdb", "3:0:1:0");
        sdb.sas_address = Some("0x5000c500a1b2c3e5".into());

        let vendor = VendorInventory {
            log_drives: vec![volume(
                LogDriveKey::DevicePath("/dev/sda".into()),
                RaidLevel::Raid10,
                "OK",
                vec![member(hp, "1", "OK"), member(hp, "2", "OK")],
            )],
            passthrough: vec![exposed.clone()],
            unconfigured: vec![idle.clone()],
            ..Default::default()
        };

        let stubs = [stub("sda", "3:0:0:0"), sdb];
        let out = Resolver::default().resolve(hp, &stubs, &vendor);

        assert_eq!(out.log_drives.len(), 1);
        assert_eq!(out.log_drives[0].name(), "sda");
        assert_eq!(out.log_drives[0].members.len(), 2);
        assert!(!out.log_drives[0].degraded());

        assert_eq!(out.passthrough_drives.len(), 1);
        assert_eq!(out.passthrough_drives[0].name(), "sdb");
        assert_eq!(out.passthrough_drives[0].drive, exposed);
        assert_eq!(out.unconfigured_drives, vec![idle]);
    }

    #[test]
    fn test_duplicate_keys_first_claimed_first() {
        let mega = RaidFamily::MegaRaid;
        let first = volume(LogDriveKey::Target(0), RaidLevel::Raid1, "Optimal", vec![]);
        let mut second = volume(LogDriveKey::Target(0), RaidLevel::Raid5, "Optimal", vec![]);
        second.label = "grp:1".into();
        let vendor = VendorInventory {
            log_drives: vec![first, second],
            ..Default::default()
        };

        let stubs = [stub("sda", "0:2:0:0"), stub("sdb", "0:2:0:0")];
        let out = Resolver::default().resolve(mega, &stubs, &vendor);
        assert_eq!(out.log_drives[0].level_string(), "RAID 1");
        assert_eq!(out.log_drives[1].level_string(), "RAID 5");
    }
}
