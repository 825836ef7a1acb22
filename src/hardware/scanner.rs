//! Controller Dispatch
//!
//! Walks every PCI mass-storage controller, picks a path by kernel driver and
//! assembles the [`StorageReport`]. RAID controllers go through the vendor
//! adapter and the resolver; AHCI / virtio controllers map block devices 1:1
//! to drives.
//!
//! Failures stay scoped to one controller: a broken vendor tool costs that
//! controller its enrichment, a malformed topology drops that controller from
//! the report, and the rest of the scan carries on.

use std::fs;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;

use crate::config::InventoryConfig;
use crate::domain::ports::{AttributeProvider, VendorInventory};
use crate::domain::storage::{
    Battery, DirectController, DirectKind, Drive, KernelStub, PciDevice, RaidController,
    RaidFamily, StorageReport,
};
use crate::error::Result;
use crate::hardware::{PciScanner, SysfsAttributeProvider, TopologyScanner};
use crate::logging::Logger;
use crate::raidcli::{AdapterSet, ProcessRunner};
use crate::resolver::Resolver;

// =============================================================================
// Controller Classification
// =============================================================================

/// How a storage controller is inventoried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    Raid(RaidFamily),
    Direct(DirectKind),
    Unsupported,
}

#[derive(Debug, Clone, Copy)]
enum DriverPattern {
    Prefix(&'static str),
    Exact(&'static str),
}

impl DriverPattern {
    fn matches(&self, driver: &str) -> bool {
        match self {
            DriverPattern::Prefix(p) => driver.starts_with(p),
            DriverPattern::Exact(e) => driver == *e,
        }
    }
}

const DRIVER_TABLE: [(DriverPattern, ControllerKind); 8] = [
    (DriverPattern::Prefix("megaraid"), ControllerKind::Raid(RaidFamily::MegaRaid)),
    (DriverPattern::Prefix("mpt"), ControllerKind::Raid(RaidFamily::SasIr)),
    (DriverPattern::Prefix("hpvsa"), ControllerKind::Raid(RaidFamily::SmartArray)),
    (DriverPattern::Prefix("hpsa"), ControllerKind::Raid(RaidFamily::SmartArray)),
    (DriverPattern::Exact("ahci"), ControllerKind::Direct(DirectKind::Ahci)),
    (DriverPattern::Exact("ata_piix"), ControllerKind::Direct(DirectKind::Ahci)),
    (DriverPattern::Exact("isci"), ControllerKind::Direct(DirectKind::Ahci)),
    (DriverPattern::Exact("virtio-pci"), ControllerKind::Direct(DirectKind::Virtio)),
];

impl ControllerKind {
    pub fn classify(driver: &str) -> Self {
        DRIVER_TABLE
            .iter()
            .find(|(pattern, _)| pattern.matches(driver))
            .map(|(_, kind)| *kind)
            .unwrap_or(ControllerKind::Unsupported)
    }
}

enum Scanned {
    Raid(RaidController),
    Direct(DirectController),
}

// =============================================================================
// Inventory Scanner
// =============================================================================

/// Builds a [`StorageReport`] for the local host
pub struct InventoryScanner {
    config: InventoryConfig,
    pci: PciScanner,
    topology: TopologyScanner,
    adapters: AdapterSet,
    attributes: Arc<dyn AttributeProvider>,
    resolver: Resolver,
    log: Logger,
}

impl InventoryScanner {
    pub fn new(
        config: InventoryConfig,
        adapters: AdapterSet,
        attributes: Arc<dyn AttributeProvider>,
        log: Logger,
    ) -> Self {
        Self {
            pci: PciScanner::new(config.sysfs_root.clone(), log.child("pci")),
            topology: TopologyScanner::new(config.sysfs_root.clone(), log.child("topology")),
            resolver: Resolver::new(log.child("resolver")),
            config,
            adapters,
            attributes,
            log,
        }
    }

    /// Scanner spawning the real vendor binaries
    pub fn from_config(config: InventoryConfig, log: Logger) -> Self {
        let adapters = if config.raidcli_enabled {
            let runner = Arc::new(ProcessRunner::new(config.tool_timeout(), log.child("runner")));
            AdapterSet::from_config(&config, runner, &log)
        } else {
            AdapterSet::empty()
        };
        Self::new(config, adapters, Arc::new(SysfsAttributeProvider), log)
    }

    /// Scan every storage controller
    pub async fn scan(&self) -> Result<StorageReport> {
        let devices = self.pci.scan()?;
        self.log.info(format_args!("found {} storage controllers", devices.len()));

        let jobs = devices.into_iter().map(|dev| self.scan_controller(dev));
        let scanned = if self.config.parallel {
            join_all(jobs).await
        } else {
            let mut done = Vec::new();
            for job in jobs {
                done.push(job.await);
            }
            done
        };

        let mut report = StorageReport {
            hostname: hostname(),
            generated_at: Utc::now(),
            raid_controllers: Vec::new(),
            direct_controllers: Vec::new(),
        };
        for item in scanned.into_iter().flatten() {
            match item {
                Scanned::Raid(ctl) => report.raid_controllers.push(ctl),
                Scanned::Direct(ctl) => report.direct_controllers.push(ctl),
            }
        }
        Ok(report)
    }

    async fn scan_controller(&self, dev: PciDevice) -> Option<Scanned> {
        let address = dev.address;
        let result = match ControllerKind::classify(&dev.driver) {
            ControllerKind::Raid(family) => self.scan_raid(dev, family).await.map(Scanned::Raid),
            ControllerKind::Direct(kind) => self.scan_direct(dev, kind).map(Scanned::Direct),
            ControllerKind::Unsupported => {
                self.log.warn(format_args!(
                    "{}: unsupported storage driver '{}'",
                    address, dev.driver
                ));
                return None;
            }
        };
        match result {
            Ok(scanned) => Some(scanned),
            Err(e) => {
                self.log.warn(format_args!("{}: controller skipped: {}", address, e));
                None
            }
        }
    }

    /// Kernel topology, enriched and resolved when the vendor tool cooperates
    pub async fn scan_raid(&self, pci: PciDevice, family: RaidFamily) -> Result<RaidController> {
        let stubs = self.topology.scan(&pci.path)?;

        let Some(vendor) = self.vendor_inventory(&pci, family).await else {
            return Ok(RaidController::kernel_only(pci, family, stubs));
        };
        let resolved = self.resolver.resolve(family, &stubs, &vendor);

        let ctl = vendor.controller;
        Ok(RaidController {
            pci,
            family,
            product_name: ctl.product_name,
            firmware: ctl.firmware,
            bios: ctl.bios,
            serial: ctl.serial,
            adapter_id: ctl.adapter_id,
            battery: ctl.battery.map(Battery::from).unwrap_or_default(),
            vendor_enriched: true,
            log_drives: resolved.log_drives,
            passthrough_drives: resolved.passthrough_drives,
            unconfigured_drives: resolved.unconfigured_drives,
        })
    }

    async fn vendor_inventory(&self, pci: &PciDevice, family: RaidFamily) -> Option<VendorInventory> {
        if !self.config.raidcli_enabled {
            return None;
        }
        let adapter = self.adapters.for_family(family)?;
        if !adapter.available() {
            self.log.info(format_args!(
                "{}: {} is not installed, kernel-only data",
                pci.address,
                family.tool_name()
            ));
            return None;
        }
        match adapter.bind(&pci.address).await {
            Ok(inventory) => Some(inventory),
            Err(e) => {
                self.log.warn(format_args!(
                    "{}: {} enrichment skipped: {}",
                    pci.address,
                    family.tool_name(),
                    e
                ));
                None
            }
        }
    }

    /// One drive per block device
    pub fn scan_direct(&self, pci: PciDevice, kind: DirectKind) -> Result<DirectController> {
        let stubs = self.topology.scan_direct(&pci.path)?;
        let drives = stubs.into_iter().map(|stub| self.direct_drive(stub)).collect();
        Ok(DirectController { pci, kind, drives })
    }

    fn direct_drive(&self, stub: KernelStub) -> Drive {
        match self.attributes.attributes(&stub) {
            Ok(attrs) => Drive {
                kernel: stub,
                vendor: attrs.vendor,
                model: attrs.model,
                serial: attrs.serial,
                firmware: attrs.firmware,
                transport: attrs.transport,
                rotation: attrs.rotation,
                temperature: attrs.temperature,
                error_records: attrs.error_records,
            },
            Err(e) => {
                self.log.warn(format_args!("{}: attributes unavailable: {}", stub.name, e));
                Drive {
                    model: stub.model.clone(),
                    kernel: stub,
                    ..Default::default()
                }
            }
        }
    }
}

/// Host name from `/etc/hostname`
fn hostname() -> String {
    fs::read_to_string("/etc/hostname")
        .map(|h| h.trim().to_string())
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
