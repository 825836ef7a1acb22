//! MegaRAID adapter (MegaCli)
//!
//! Logical drives are keyed by SCSI target id, pass-through (JBOD) drives by
//! WWN. `-PDList` reports every drive on the adapter, so drives already listed
//! as a volume member are filtered out before classifying the rest.

mod parse;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::domain::ports::{ControllerIdentity, VendorAdapter, VendorController, VendorInventory};
use crate::domain::storage::{PhyDrive, RaidFamily};
use crate::error::Result;
use crate::logging::Logger;
use crate::raidcli::{first_wins, ToolHandle};

/// MegaCli-backed adapter for `megaraid*` controllers
#[derive(Debug, Clone)]
pub struct MegaCli {
    tool: ToolHandle,
    log: Logger,
}

impl MegaCli {
    pub fn new(tool: ToolHandle, log: Logger) -> Self {
        Self { tool, log }
    }

    fn split_unreferenced(
        &self,
        all: Vec<PhyDrive>,
        members: &[&PhyDrive],
    ) -> (Vec<PhyDrive>, Vec<PhyDrive>) {
        let wwns: HashSet<&str> = members.iter().filter_map(|pd| pd.ids.wwn.as_deref()).collect();
        // some SSDs report no WWN; fall back to the inquiry string
        let inquiries: HashSet<&str> = members
            .iter()
            .filter_map(|pd| pd.ids.inquiry.as_deref())
            .collect();

        let mut passthrough = Vec::new();
        let mut unconfigured = Vec::new();
        for pd in all {
            let in_volume = pd.ids.wwn.as_deref().map(|w| wwns.contains(w)).unwrap_or(false)
                || pd
                    .ids
                    .inquiry
                    .as_deref()
                    .map(|i| inquiries.contains(i))
                    .unwrap_or(false);
            if in_volume {
                continue;
            }
            if pd.status == "JBOD" {
                passthrough.push(pd);
            } else {
                unconfigured.push(pd);
            }
        }
        (passthrough, unconfigured)
    }
}

#[async_trait]
impl VendorAdapter for MegaCli {
    fn family(&self) -> RaidFamily {
        RaidFamily::MegaRaid
    }

    fn available(&self) -> bool {
        self.tool.is_available()
    }

    async fn list_controllers(&self) -> Result<Vec<ControllerIdentity>> {
        let out = self.tool.run(&["-AdpGetPciInfo", "-aAll", "-NoLog"]).await?;
        parse::parse_pci_info(&out, &self.log)
    }

    async fn decode(&self, controller: &ControllerIdentity) -> Result<VendorInventory> {
        let adapter = format!("-a{}", controller.adapter_id);

        let out = self.tool.run(&["-AdpAllInfo", &adapter, "-NoLog"]).await?;
        let info = parse::parse_adp_info(&out);

        let out = self.tool.run(&["-LDPDInfo", &adapter, "-NoLog"]).await?;
        let log_drives = first_wins(
            parse::parse_ld_list(&out, &self.log)?,
            |ld| ld.key.clone(),
            &self.log,
        );

        let out = self.tool.run(&["-PDList", &adapter, "-NoLog"]).await?;
        let lines: Vec<&str> = out.lines().collect();
        let all = parse::parse_pd_list(&lines, &self.log)?;

        let members: Vec<&PhyDrive> = log_drives.iter().flat_map(|ld| ld.members.iter()).collect();
        let (passthrough, unconfigured) = self.split_unreferenced(all, &members);

        self.log.debug(format_args!(
            "adapter {}: {} volumes, {} pass-through, {} unconfigured",
            controller.adapter_id,
            log_drives.len(),
            passthrough.len(),
            unconfigured.len()
        ));

        Ok(VendorInventory {
            controller: VendorController {
                adapter_id: controller.adapter_id.clone(),
                pci: controller.pci,
                product_name: info.product_name,
                firmware: info.firmware,
                bios: info.bios,
                serial: info.serial,
                battery: Some(info.battery),
            },
            log_drives,
            passthrough,
            unconfigured,
        })
    }
}
