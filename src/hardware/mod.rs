//! Hardware Discovery Module
//!
//! Kernel-side view of storage hardware, read from sysfs.
//!
//! # Features
//!
//! - PCI mass-storage controller enumeration with AER error counters
//! - Block device topology under a controller's PCI node
//! - Protocol attributes of directly attached drives
//! - Controller dispatch: RAID families through vendor tools, AHCI/virtio 1:1
//!
//! # Example
//!
//! ```no_run
//! use hwinv::config::InventoryConfig;
//! use hwinv::hardware::InventoryScanner;
//! use hwinv::logging::Logger;
//!
//! # async fn example() -> hwinv::Result<()> {
//! let scanner = InventoryScanner::from_config(InventoryConfig::default(), Logger::current("scanner"));
//! let report = scanner.scan().await?;
//!
//! for ctl in &report.raid_controllers {
//!     println!("{} - {} volumes", ctl.summary(), ctl.log_drives.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod attributes;
pub mod pci;
pub mod scanner;
pub mod topology;

use std::fs;
use std::path::Path;

pub use attributes::SysfsAttributeProvider;
pub use pci::PciScanner;
pub use scanner::{ControllerKind, InventoryScanner};
pub use topology::TopologyScanner;

/// Read a sysfs attribute, trimmed; `None` when missing or empty
pub(crate) fn read_attr(base: &Path, attr: &str) -> Option<String> {
    let text = fs::read_to_string(base.join(attr)).ok()?;
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Parse a numeric attribute, `0x` hex or decimal
pub(crate) fn read_num(base: &Path, attr: &str) -> Option<u64> {
    let text = read_attr(base, attr)?;
    match text.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

/// Basename of a symlink target, e.g. the `driver` link
pub(crate) fn read_link_name(base: &Path, link: &str) -> Option<String> {
    let target = fs::read_link(base.join(link)).ok()?;
    target.file_name().map(|n| n.to_string_lossy().into_owned())
}
