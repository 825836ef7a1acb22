//! Kernel Topology Scanner
//!
//! Finds the block devices that live under one controller's PCI node.
//! `<sysfs>/class/block/<name>` links resolve to paths such as
//!
//! ```text
//! /sys/devices/pci0000:00/0000:00:01.0/0000:01:00.0/host0/target0:2:0/0:2:0:0/block/sda
//! /sys/devices/pci0000:60/0000:60:03.1/0000:61:00.0/host0/port-0:0/expander-0:0/port-0:0:0/end_device-0:0:0/target0:0:0/0:0:0:0/block/sdb
//! /sys/devices/pci0000:00/0000:00:05.0/virtio2/block/vda
//! ```
//!
//! The directory in front of `/block/` is the SCSI device (or the virtio
//! device); its name is the SCSI address.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::storage::{canonical_id, KernelStub, ScsiAddress};
use crate::error::{Error, Result};
use crate::hardware::{read_attr, read_link_name, read_num};
use crate::logging::Logger;

/// Block device found under a controller: its device directory and name
#[derive(Debug, Clone, PartialEq, Eq)]
struct BlockPath {
    device_dir: PathBuf,
    name: String,
}

/// Reads block device topology from sysfs
#[derive(Debug, Clone)]
pub struct TopologyScanner {
    sysfs_root: PathBuf,
    log: Logger,
}

impl TopologyScanner {
    pub fn new(sysfs_root: impl Into<PathBuf>, log: Logger) -> Self {
        Self {
            sysfs_root: sysfs_root.into(),
            log,
        }
    }

    /// SCSI block devices behind a RAID controller or HBA
    pub fn scan(&self, controller: &Path) -> Result<Vec<KernelStub>> {
        self.collect(controller, true)
    }

    /// Any block device under the controller, SCSI or not (AHCI, virtio)
    pub fn scan_direct(&self, controller: &Path) -> Result<Vec<KernelStub>> {
        self.collect(controller, false)
    }

    fn collect(&self, controller: &Path, scsi_only: bool) -> Result<Vec<KernelStub>> {
        if !controller.is_dir() {
            return Err(Error::malformed(controller, "controller path is not a directory"));
        }
        let controller = fs::canonicalize(controller)?;

        let mut stubs = Vec::new();
        for bp in self.block_paths(scsi_only)? {
            if !bp.device_dir.starts_with(&controller) {
                continue;
            }
            stubs.push(self.read_stub(bp, scsi_only)?);
        }

        stubs.sort_by(|a, b| block_order(&a.name, &b.name));
        self.log.debug(format_args!(
            "{}: {} block devices",
            controller.display(),
            stubs.len()
        ));
        Ok(stubs)
    }

    /// Every whole-disk block device in the system
    fn block_paths(&self, scsi_only: bool) -> Result<Vec<BlockPath>> {
        let class = self.sysfs_root.join("class/block");
        if !class.is_dir() {
            return Err(Error::malformed(class, "block class directory not found"));
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(&class)? {
            let entry = entry?;
            let link = entry.path();
            let resolved = match fs::canonicalize(&link) {
                Ok(p) => p,
                Err(e) => {
                    self.log.warn(format_args!("could not resolve {}: {}", link.display(), e));
                    continue;
                }
            };

            if resolved.join("partition").exists() {
                continue;
            }

            let text = resolved.to_string_lossy();
            if scsi_only && (!text.contains("/host") || !text.contains("/target")) {
                continue;
            }

            let Some((device_dir, name)) = text.rsplit_once("/block/") else {
                self.log.warn(format_args!("could not parse {}", text));
                continue;
            };
            paths.push(BlockPath {
                device_dir: PathBuf::from(device_dir),
                name: name.to_string(),
            });
        }
        Ok(paths)
    }

    fn read_stub(&self, bp: BlockPath, scsi_only: bool) -> Result<KernelStub> {
        let dev = &bp.device_dir;
        let blk = dev.join("block").join(&bp.name);

        let dir_name = dev
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let scsi = match dir_name.parse::<ScsiAddress>() {
            Ok(addr) => addr,
            Err(e) if scsi_only => return Err(Error::malformed(dev.clone(), e)),
            Err(_) => ScsiAddress::default(),
        };

        let sas_address = read_attr(dev, "sas_address").and_then(|s| canonical_id(&s));
        if let Some(sas) = &sas_address {
            self.log.debug(format_args!("{} has sas_address {}", bp.name, sas));
        }

        Ok(KernelStub {
            model: read_attr(dev, "model").unwrap_or_default(),
            driver: read_link_name(dev, "driver").unwrap_or_default(),
            blocks: read_num(&blk, "size").unwrap_or(0),
            logical_block_size: read_num(&blk, "queue/logical_block_size").unwrap_or(0) as u32,
            physical_block_size: read_num(&blk, "queue/physical_block_size").unwrap_or(0) as u32,
            scheduler: read_attr(&blk, "queue/scheduler")
                .map(|s| parse_scheduler(&s))
                .unwrap_or_default(),
            scsi,
            sas_address,
            wwn: read_attr(dev, "wwid").and_then(|w| parse_wwid(&w)),
            path: bp.device_dir,
            name: bp.name,
        })
    }
}

/// Selected scheduler from `"mq-deadline kyber [bfq] none"`
pub fn parse_scheduler(list: &str) -> String {
    let scheds: Vec<&str> = list.split_whitespace().collect();
    if let [only] = scheds.as_slice() {
        if !only.contains('[') && !only.contains(']') {
            return only.to_string();
        }
    }
    scheds
        .iter()
        .find(|s| s.starts_with('[') && s.ends_with(']'))
        .map(|s| s.trim_matches(|c| c == '[' || c == ']').to_string())
        .unwrap_or_default()
}

/// NAA identifiers only; `t10.` / `eui.` strings are not WWNs
fn parse_wwid(wwid: &str) -> Option<String> {
    wwid.trim().strip_prefix("naa.").and_then(canonical_id)
}

/// `sda` < `sdb` < `sdz` < `sdaa`
fn block_order(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
