//! SAS-IR adapter (sas3ircu)
//!
//! `N DISPLAY` lists volumes with their members by `enclosure:slot`, plus every
//! physical device. Devices not claimed by a volume are exposed to the host,
//! so they are pass-through drives keyed by SAS address.

mod parse;

use async_trait::async_trait;

use crate::domain::ports::{ControllerIdentity, VendorAdapter, VendorController, VendorInventory};
use crate::domain::storage::RaidFamily;
use crate::error::Result;
use crate::logging::Logger;
use crate::raidcli::{first_wins, ToolHandle};

/// sas3ircu-backed adapter for `mpt*` controllers
#[derive(Debug, Clone)]
pub struct Sas3Ircu {
    tool: ToolHandle,
    log: Logger,
}

impl Sas3Ircu {
    pub fn new(tool: ToolHandle, log: Logger) -> Self {
        Self { tool, log }
    }
}

#[async_trait]
impl VendorAdapter for Sas3Ircu {
    fn family(&self) -> RaidFamily {
        RaidFamily::SasIr
    }

    fn available(&self) -> bool {
        self.tool.is_available()
    }

    async fn list_controllers(&self) -> Result<Vec<ControllerIdentity>> {
        let out = self.tool.run(&["LIST"]).await?;
        Ok(parse::parse_ctl_list(&out))
    }

    async fn decode(&self, controller: &ControllerIdentity) -> Result<VendorInventory> {
        let out = self.tool.run(&[controller.adapter_id.as_str(), "DISPLAY"]).await?;
        let sections = parse::split_sections(&out, &self.log);

        let (firmware, bios) = parse::parse_controller_lines(&sections.controller);
        let raw_volumes = first_wins(
            parse::parse_volume_lines(&sections.volumes, &self.log),
            |raw| raw.volume.key.clone(),
            &self.log,
        );
        let devices = first_wins(parse::parse_device_lines(&sections.devices)?, |pd| pd.pos(), &self.log);

        // claimed devices move out of the pool, each at most once
        let mut pool: Vec<Option<_>> = devices.into_iter().map(Some).collect();
        let mut log_drives = Vec::with_capacity(raw_volumes.len());
        for raw in raw_volumes {
            let mut volume = raw.volume;
            for id in &raw.member_ids {
                let slot = pool
                    .iter_mut()
                    .find(|d| matches!(d, Some(pd) if pd.pos() == *id));
                match slot.and_then(Option::take) {
                    Some(pd) => volume.members.push(pd),
                    None => self.log.debug(format_args!("{}: member {} not found", volume.label, id)),
                }
            }
            log_drives.push(volume);
        }
        let passthrough: Vec<_> = pool.into_iter().flatten().collect();

        self.log.debug(format_args!(
            "controller {}: {} volumes, {} pass-through",
            controller.adapter_id,
            log_drives.len(),
            passthrough.len()
        ));

        Ok(VendorInventory {
            controller: VendorController {
                adapter_id: controller.adapter_id.clone(),
                pci: controller.pci,
                product_name: controller.product_name.clone(),
                firmware,
                bios,
                serial: String::new(),
                battery: None,
            },
            log_drives,
            passthrough,
            unconfigured: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::ports::LogDriveKey;
    use crate::domain::storage::{PciAddress, RaidLevel};
    use crate::error::Error;
    use crate::raidcli::testing::CannedRunner;
    use assert_matches::assert_matches;

    const LIST: &str = "
 Index    Type          ID      ID    Pci Address          Ven ID  Dev ID
 -----  ------------  ------  ------  -----------------    ------  ------
   0     SAS3008       1000h   97h    00h:61h:00h:00h      1028h   1f45h
SAS3IRCU: Utility Completed Successfully.
";

    const DISPLAY: &str = "
Read configuration has been initiated for controller 0
------------------------------------------------------------------------
Controller information
------------------------------------------------------------------------
  Controller type                         : SAS3008
  BIOS version                            : 8.37.00.00
  Firmware version                        : 16.00.04.00
------------------------------------------------------------------------
IR Volume information
------------------------------------------------------------------------
IR volume 1
  Volume ID                               : 323
  Status of volume                        : Okay (OKY)
  Volume wwid                             : 0e8f6a0ad4d5d2e1
  RAID level                              : RAID1
  Size (in MB)                            : 857353
  Physical hard disks                     :
  PHY[0] Enclosure#/Slot#                 : 2:0
  PHY[1] Enclosure#/Slot#                 : 2:1
------------------------------------------------------------------------
Physical device information
------------------------------------------------------------------------
Initiator at ID #0

Device is a Hard disk
  Enclosure #                             : 2
  Slot #                                  : 0
  SAS Address                             : 4433221-1-0000-0000
  State                                   : Optimal (OPT)
  Size (in MB)/(in sectors)               : 858483/1758174767
  Model Number                            : ST1000NX0423
  Protocol                                : SATA
  Drive Type                              : SATA_HDD

Device is a Hard disk
  Enclosure #                             : 2
  Slot #                                  : 1
  SAS Address                             : 4433221-0-0000-0000
  State                                   : Optimal (OPT)
  Size (in MB)/(in sectors)               : 858483/1758174767
  Model Number                            : ST1000NX0423
  Protocol                                : SATA
  Drive Type                              : SATA_HDD

Device is a Hard disk
  Enclosure #                             : 2
  Slot #                                  : 2
  SAS Address                             : 5003048-0-0928-2600
  State                                   : Ready (RDY)
  Size (in MB)/(in sectors)               : 381554/781422768
  Model Number                            : INTEL SSDSC2BX40
  Protocol                                : SATA
  Drive Type                              : SATA_SSD

Device is a Enclosure services device
  Enclosure #                             : 2
  Slot #                                  : 36
  State                                   : Standby (SBY)
  Device Type                             : Enclosure services device
------------------------------------------------------------------------
Enclosure information
------------------------------------------------------------------------
  Enclosure#                              : 1
SAS3IRCU: Command DISPLAY Completed Successfully.
";

    fn adapter(runner: CannedRunner) -> Sas3Ircu {
        Sas3Ircu::new(
            ToolHandle::new(RaidFamily::SasIr, Some("/usr/sbin/sas3ircu".into()), Arc::new(runner)),
            Logger::default(),
        )
    }

    #[tokio::test]
    async fn test_bind_and_decode() {
        let runner = CannedRunner::default().with("LIST", LIST).with("0 DISPLAY", DISPLAY);
        let inv = adapter(runner).bind(&PciAddress::new(0, 0x61, 0, 0)).await.unwrap();

        assert_eq!(inv.controller.firmware, "16.00.04.00");
        assert_eq!(inv.controller.product_name, "SAS3008");

        assert_eq!(inv.log_drives.len(), 1);
        let ld = &inv.log_drives[0];
        assert_eq!(ld.key, LogDriveKey::SasAddress("0x0e8f6a0ad4d5d2e1".into()));
        assert_eq!(ld.level, RaidLevel::Raid1);
        assert_eq!(ld.status, "Okay (OKY)");
        let members: Vec<String> = ld.members.iter().map(|m| m.pos()).collect();
        assert_eq!(members, vec!["2:0", "2:1"]);

        assert_eq!(inv.passthrough.len(), 1);
        assert_eq!(
            inv.passthrough[0].ids.sas_address.as_deref(),
            Some("0x5003048009282600")
        );
        assert!(inv.unconfigured.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_controller() {
        let runner = CannedRunner::default().with("LIST", LIST);
        let result = adapter(runner).bind(&PciAddress::new(0, 0x03, 0, 0)).await;
        assert_matches!(result, Err(Error::ControllerNotFound { .. }));
    }

    #[tokio::test]
    async fn test_display_without_devices_is_unparseable() {
        let runner = CannedRunner::default().with("0 DISPLAY", "Controller information\n  BIOS version : 1\n");
        let identity = ControllerIdentity {
            adapter_id: "0".into(),
            ..Default::default()
        };
        assert_matches!(
            adapter(runner).decode(&identity).await,
            Err(Error::UnparseableOutput { .. })
        );
    }
}
