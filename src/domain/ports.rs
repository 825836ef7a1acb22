//! Domain Ports
//!
//! The inventory engine depends on three outside collaborators: something that
//! runs vendor binaries, one adapter per RAID family that turns their output
//! into records, and a provider of per-drive protocol attributes for directly
//! attached disks. Each is a trait here so tests can substitute canned data.
//!
//! ```text
//!   scanner ──► VendorAdapter ──► CommandRunner ──► megacli / sas3ircu / hpacucli
//!      │
//!      └──────► AttributeProvider ──► sysfs / protocol decoders
//! ```

use std::path::Path;

use async_trait::async_trait;

use crate::domain::storage::{KernelStub, PciAddress, PhyDrive, RaidFamily, RaidLevel, SmartRecord};
use crate::error::{Error, Result};

// =============================================================================
// Value Objects
// =============================================================================

/// A controller as a vendor tool's listing command names it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerIdentity {
    /// Index or slot the tool expects back in `decode`
    pub adapter_id: String,
    /// PCI location, when the listing reports one
    pub pci: Option<PciAddress>,
    pub product_name: String,
}

impl ControllerIdentity {
    pub fn matches(&self, pci: &PciAddress) -> bool {
        self.pci.map(|p| p.same_slot(pci)).unwrap_or(false)
    }
}

/// Controller-level fields decoded from a vendor tool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VendorController {
    pub adapter_id: String,
    pub pci: Option<PciAddress>,
    pub product_name: String,
    pub firmware: String,
    pub bios: String,
    pub serial: String,
    /// `None` when the tool does not report a backup unit
    pub battery: Option<bool>,
}

/// Key a vendor logical drive is matched to a kernel stub with
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogDriveKey {
    /// SCSI target id (MegaRAID)
    Target(u16),
    /// Canonical volume SAS address (SAS-IR)
    SasAddress(String),
    /// Kernel device path such as `/dev/sda` (Smart Array)
    DevicePath(String),
}

/// A logical drive as a vendor tool reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorLogDrive {
    pub key: LogDriveKey,
    pub label: String,
    pub level: RaidLevel,
    /// Size in bytes
    pub size: u64,
    pub status: String,
    pub stripe_size: u64,
    pub cache_policy: String,
    pub members: Vec<PhyDrive>,
}

/// Everything one `decode` call produced for a single controller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VendorInventory {
    pub controller: VendorController,
    pub log_drives: Vec<VendorLogDrive>,
    /// Drives exposed to the host individually
    pub passthrough: Vec<PhyDrive>,
    pub unconfigured: Vec<PhyDrive>,
}

impl VendorInventory {
    /// Number of physical drive records across all three sets
    pub fn phy_drive_count(&self) -> usize {
        self.log_drives.iter().map(|ld| ld.members.len()).sum::<usize>()
            + self.passthrough.len()
            + self.unconfigured.len()
    }
}

/// Physical attributes of a directly attached drive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriveAttributes {
    pub vendor: String,
    pub model: String,
    pub serial: String,
    pub firmware: String,
    pub transport: String,
    /// 0 = unknown, 1 = SSD, >1 = HDD RPM
    pub rotation: u32,
    pub temperature: Option<i16>,
    pub error_records: Vec<SmartRecord>,
}

// =============================================================================
// Command Runner Port
// =============================================================================

/// Runs an external program to completion and returns its stdout
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &Path, args: &[&str]) -> Result<String>;
}

// =============================================================================
// Vendor Adapter Port
// =============================================================================

/// One RAID family's vendor tool, parsed into shared record shapes
#[async_trait]
pub trait VendorAdapter: Send + Sync {
    fn family(&self) -> RaidFamily;

    /// Whether the vendor binary is installed
    fn available(&self) -> bool;

    /// Cheap listing used to bind PCI addresses to tool indices
    async fn list_controllers(&self) -> Result<Vec<ControllerIdentity>>;

    /// Full decode of one controller
    async fn decode(&self, controller: &ControllerIdentity) -> Result<VendorInventory>;

    /// Find the controller at `pci` and decode it
    async fn bind(&self, pci: &PciAddress) -> Result<VendorInventory> {
        let controllers = self.list_controllers().await?;
        let identity = controllers
            .iter()
            .find(|c| c.matches(pci))
            .ok_or_else(|| Error::ControllerNotFound {
                family: self.family().to_string(),
                pci: pci.to_string(),
            })?;

        let mut inventory = self.decode(identity).await?;
        if inventory.controller.pci.is_none() {
            inventory.controller.pci = Some(*pci);
        }
        if inventory.controller.product_name.is_empty() {
            inventory.controller.product_name = identity.product_name.clone();
        }
        Ok(inventory)
    }
}

// =============================================================================
// Attribute Provider Port
// =============================================================================

/// Protocol-level attributes for one directly attached drive
pub trait AttributeProvider: Send + Sync {
    fn attributes(&self, stub: &KernelStub) -> Result<DriveAttributes>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    struct TwoControllers;

    #[async_trait]
    impl VendorAdapter for TwoControllers {
        fn family(&self) -> RaidFamily {
            RaidFamily::SasIr
        }

        fn available(&self) -> bool {
            true
        }

        async fn list_controllers(&self) -> Result<Vec<ControllerIdentity>> {
            Ok(vec![
                ControllerIdentity {
                    adapter_id: "0".into(),
                    pci: Some(PciAddress::new(0, 0x61, 0, 0)),
                    product_name: "SAS3008".into(),
                },
                ControllerIdentity {
                    adapter_id: "1".into(),
                    pci: Some(PciAddress::new(0, 0x62, 0, 0)),
                    product_name: "SAS3008".into(),
                },
            ])
        }

        async fn decode(&self, controller: &ControllerIdentity) -> Result<VendorInventory> {
            Ok(VendorInventory {
                controller: VendorController {
                    adapter_id: controller.adapter_id.clone(),
                    ..Default::default()
                },
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_bind_picks_matching_slot() {
        let adapter = TwoControllers;
        let inv = adapter.bind(&PciAddress::new(0, 0x62, 0, 0)).await.unwrap();

        assert_eq!(inv.controller.adapter_id, "1");
        assert_eq!(inv.controller.pci, Some(PciAddress::new(0, 0x62, 0, 0)));
        assert_eq!(inv.controller.product_name, "SAS3008");
    }

    #[tokio::test]
    async fn test_bind_unknown_slot() {
        let adapter = TwoControllers;
        let result = adapter.bind(&PciAddress::new(0, 0x03, 0, 0)).await;
        assert_matches!(result, Err(Error::ControllerNotFound { .. }));
    }

    #[test]
    fn test_identity_without_pci_never_matches() {
        let id = ControllerIdentity::default();
        assert!(!id.matches(&PciAddress::default()));
    }
}
