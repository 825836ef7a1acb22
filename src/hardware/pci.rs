//! PCI Mass-Storage Enumeration
//!
//! Walks `<sysfs>/bus/pci/devices` and keeps class `0x01xxxx` devices.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::storage::{PciAddress, PciDevice};
use crate::error::{Error, Result};
use crate::hardware::{read_attr, read_link_name, read_num};
use crate::logging::Logger;

/// PCI base class for mass-storage controllers
const CLASS_MASS_STORAGE: u32 = 0x01;

const AER_UNCORRECTABLE: [&str; 2] = ["aer_dev_fatal", "aer_dev_nonfatal"];
const AER_CORRECTABLE: &str = "aer_dev_correctable";

/// Enumerates storage controllers on the PCI bus
#[derive(Debug, Clone)]
pub struct PciScanner {
    sysfs_root: PathBuf,
    log: Logger,
}

impl PciScanner {
    pub fn new(sysfs_root: impl Into<PathBuf>, log: Logger) -> Self {
        Self {
            sysfs_root: sysfs_root.into(),
            log,
        }
    }

    /// Mass-storage controllers ordered by PCI address
    pub fn scan(&self) -> Result<Vec<PciDevice>> {
        let bus = self.sysfs_root.join("bus/pci/devices");
        if !bus.is_dir() {
            return Err(Error::malformed(bus, "PCI device directory not found"));
        }

        let mut devices = Vec::new();
        for entry in fs::read_dir(&bus)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();

            let Ok(address) = name.parse::<PciAddress>() else {
                self.log.debug(format_args!("skipping {}: not a PCI address", name));
                continue;
            };
            let path = fs::canonicalize(entry.path()).unwrap_or_else(|_| entry.path());

            let class = read_num(&path, "class").unwrap_or(0) as u32;
            if class >> 16 != CLASS_MASS_STORAGE {
                continue;
            }

            let dev = PciDevice {
                address,
                vendor_id: read_num(&path, "vendor").unwrap_or(0) as u16,
                device_id: read_num(&path, "device").unwrap_or(0) as u16,
                class,
                driver: read_link_name(&path, "driver").unwrap_or_default(),
                // -1 when the platform has no NUMA information
                numa_node: read_attr(&path, "numa_node").and_then(|n| n.parse().ok()),
                uncorrectable_errors: AER_UNCORRECTABLE
                    .iter()
                    .flat_map(|f| aer_records(&path, f))
                    .collect(),
                correctable_errors: aer_records(&path, AER_CORRECTABLE),
                path,
            };
            self.log.debug(format_args!(
                "found {} class {:06x} driver '{}'",
                dev.address, dev.class, dev.driver
            ));
            devices.push(dev);
        }

        devices.sort_by_key(|d| d.address);
        Ok(devices)
    }
}

/// Non-zero counters of an AER statistics file as `"<NAME>: <count>"`
fn aer_records(dev: &Path, file: &str) -> Vec<String> {
    let Some(text) = read_attr(dev, file) else {
        return Vec::new();
    };
    parse_aer(&text)
}

fn parse_aer(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let (name, count) = line.trim().rsplit_once(char::is_whitespace)?;
            let count: u64 = count.parse().ok()?;
            if count == 0 || name.starts_with("TOTAL_") {
                return None;
            }
            Some(format!("{}: {}", name.trim(), count))
        })
        .collect()
}
