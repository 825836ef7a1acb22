//! Smart Array adapter (hpssacli / ssacli / hpacucli)
//!
//! The controller listing only carries slot numbers, so binding a PCI address
//! means decoding each listed controller until one reports that address.
//! Logical drives are keyed by their kernel device path.

mod parse;

use async_trait::async_trait;

use crate::domain::ports::{ControllerIdentity, VendorAdapter, VendorController, VendorInventory};
use crate::domain::storage::{PciAddress, RaidFamily};
use crate::error::{Error, Result};
use crate::logging::Logger;
use crate::raidcli::{first_wins, ToolHandle};

/// hpssacli-backed adapter for `hpsa*` / `hpvsa*` controllers
#[derive(Debug, Clone)]
pub struct HpAcuCli {
    tool: ToolHandle,
    log: Logger,
}

impl HpAcuCli {
    pub fn new(tool: ToolHandle, log: Logger) -> Self {
        Self { tool, log }
    }
}

#[async_trait]
impl VendorAdapter for HpAcuCli {
    fn family(&self) -> RaidFamily {
        RaidFamily::SmartArray
    }

    fn available(&self) -> bool {
        self.tool.is_available()
    }

    async fn list_controllers(&self) -> Result<Vec<ControllerIdentity>> {
        let out = self.tool.run(&["controller", "all", "show"]).await?;
        Ok(parse::parse_ctl_list(&out))
    }

    async fn decode(&self, controller: &ControllerIdentity) -> Result<VendorInventory> {
        let slot = format!("slot={}", controller.adapter_id);
        let out = self
            .tool
            .run(&["controller", &slot, "show", "config", "detail"])
            .await?;

        let (ctl_lines, drive_lines) = parse::split_config_detail(&out, &self.log);
        if ctl_lines.is_empty() {
            return Err(Error::unparseable("hpacucli", "no controller block in config detail"));
        }
        let info = parse::parse_controller_lines(&ctl_lines);

        let (arrays, unassigned) = parse::split_arrays(&drive_lines);
        let volumes = arrays
            .iter()
            .flat_map(|array| parse::split_ld_chunks(array))
            .map(|chunk| parse::parse_ld_chunk(&chunk))
            .collect();
        let log_drives = first_wins(volumes, |ld| ld.key.clone(), &self.log);

        let mut passthrough = Vec::new();
        let mut unconfigured = Vec::new();
        for (pd, exposed) in parse::parse_pd_lines(&unassigned) {
            if exposed {
                passthrough.push(pd);
            } else {
                unconfigured.push(pd);
            }
        }

        self.log.debug(format_args!(
            "slot {}: {} volumes, {} pass-through, {} unassigned",
            controller.adapter_id,
            log_drives.len(),
            passthrough.len(),
            unconfigured.len()
        ));

        Ok(VendorInventory {
            controller: VendorController {
                adapter_id: controller.adapter_id.clone(),
                pci: info.pci.or(controller.pci),
                product_name: controller.product_name.clone(),
                firmware: info.firmware,
                bios: String::new(),
                serial: info.serial,
                battery: Some(info.battery),
            },
            log_drives,
            passthrough,
            unconfigured,
        })
    }

    async fn bind(&self, pci: &PciAddress) -> Result<VendorInventory> {
        for identity in self.list_controllers().await? {
            match self.decode(&identity).await {
                Ok(inventory) if inventory.controller.pci.map(|p| p.same_slot(pci)).unwrap_or(false) => {
                    return Ok(inventory);
                }
                Ok(_) => {}
                Err(e) => self.log.debug(format_args!("slot {} skipped: {}", identity.adapter_id, e)),
            }
        }
        Err(Error::ControllerNotFound {
            family: self.family().to_string(),
            pci: pci.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::ports::LogDriveKey;
    use crate::domain::storage::RaidLevel;
    use crate::raidcli::testing::CannedRunner;
    use assert_matches::assert_matches;

    const LIST: &str = "
Smart Array P440ar in Slot 0 (Embedded)   (sn: PDNLH0BRH8N0KK)
Smart Array P840 in Slot 2                (sn: PDNMF0ARH8Y0AB)
";

    const SLOT0: &str = "
Smart Array P440ar in Slot 0 (Embedded)
   Bus Interface: PCI
   Slot: 0
   Serial Number: PDNLH0BRH8N0KK
   Firmware Version: 6.60
   Battery/Capacitor Count: 1
   PCI Address (Domain:Bus:Device.Function): 0000:03:00.0
";

    const SLOT2: &str = "
Smart Array P840 in Slot 2
   Serial Number: PDNMF0ARH8Y0AB
   Firmware Version: 7.00
   Battery/Capacitor Count: 0
   PCI Address (Domain:Bus:Device.Function): 0000:84:00.0

   Array: A
      Interface Type: SAS
      Status: OK

      Logical Drive: 1
         Size: 600 GB
         Fault Tolerance: 1+0
         Strip Size: 256 KB
         Status: OK
         Unique Identifier: 600508B1001C5EA8A1B2C3D4E5F60718
         Disk Name: /dev/sdb

      physicaldrive 1I:1:1
         Port: 1I
         Box: 1
         Bay: 1
         Status: OK
         Interface Type: SAS
         Size: 600 GB
         Rotational Speed: 10000
         Model: HP      EG0600FBDSR

      physicaldrive 1I:1:2
         Port: 1I
         Box: 1
         Bay: 2
         Status: Failed
         Interface Type: SAS
         Size: 600 GB

   unassigned

      physicaldrive 2I:1:5
         Port: 2I
         Box: 1
         Bay: 5
         Status: OK
         Interface Type: SAS
         Size: 600 GB

   SEP (Vendor ID PMCSIERA, Model SRCv8x6G) 380
      Device Number: 380
";

    fn adapter(runner: CannedRunner) -> HpAcuCli {
        HpAcuCli::new(
            ToolHandle::new(RaidFamily::SmartArray, Some("/usr/sbin/hpssacli".into()), Arc::new(runner)),
            Logger::default(),
        )
    }

    fn runner() -> CannedRunner {
        CannedRunner::default()
            .with("controller all show", LIST)
            .with("controller slot=0 show config detail", SLOT0)
            .with("controller slot=2 show config detail", SLOT2)
    }

    #[tokio::test]
    async fn test_bind_decodes_until_pci_matches() {
        let inv = adapter(runner()).bind(&PciAddress::new(0, 0x84, 0, 0)).await.unwrap();

        assert_eq!(inv.controller.adapter_id, "2");
        assert_eq!(inv.controller.product_name, "Smart Array P840");
        assert_eq!(inv.controller.serial, "PDNMF0ARH8Y0AB");
        assert_eq!(inv.controller.battery, Some(false));

        assert_eq!(inv.log_drives.len(), 1);
        let ld = &inv.log_drives[0];
        assert_eq!(ld.key, LogDriveKey::DevicePath("/dev/sdb".into()));
        assert_eq!(ld.label, "vol:1");
        assert_eq!(ld.level, RaidLevel::Raid10);
        assert_eq!(ld.size, 600_000_000_000);
        assert_eq!(ld.members.len(), 2);
        assert_eq!(ld.members[0].rotation, 10000);
        assert_eq!(ld.members[0].model, "HP EG0600FBDSR");
        assert_eq!(ld.members[1].status, "Failed");

        assert!(inv.passthrough.is_empty());
        assert_eq!(inv.unconfigured.len(), 1);
        assert_eq!(inv.unconfigured[0].pos(), "2I:1:5");
    }

    #[tokio::test]
    async fn test_controller_without_drives() {
        let identity = ControllerIdentity {
            adapter_id: "0".into(),
            ..Default::default()
        };
        let inv = adapter(runner()).decode(&identity).await.unwrap();
        assert_eq!(inv.controller.pci, Some(PciAddress::new(0, 3, 0, 0)));
        assert_eq!(inv.controller.battery, Some(true));
        assert_eq!(inv.phy_drive_count(), 0);
    }

    #[tokio::test]
    async fn test_bind_unknown_address() {
        let result = adapter(runner()).bind(&PciAddress::new(0, 0x05, 0, 0)).await;
        assert_matches!(result, Err(Error::ControllerNotFound { .. }));
    }
}
