//! Direct-Attached Drive Attributes
//!
//! Identity and rotation of AHCI / virtio drives as sysfs exposes them.
//! SMART telemetry comes from the protocol decoders behind
//! [`AttributeProvider`]; this provider fills only what sysfs knows.

use crate::domain::ports::{AttributeProvider, DriveAttributes};
use crate::domain::storage::KernelStub;
use crate::error::Result;
use crate::hardware::read_attr;

/// [`AttributeProvider`] backed by sysfs attributes only
#[derive(Debug, Clone, Copy, Default)]
pub struct SysfsAttributeProvider;

impl AttributeProvider for SysfsAttributeProvider {
    fn attributes(&self, stub: &KernelStub) -> Result<DriveAttributes> {
        let dev = &stub.path;
        let blk = dev.join("block").join(&stub.name);

        let vendor = read_attr(dev, "vendor").unwrap_or_default();
        let transport = if vendor == "ATA" {
            "SATA"
        } else if stub.name.starts_with("vd") {
            "virtio"
        } else {
            "SCSI"
        };
        // 0 = unknown, 1 = SSD; sysfs has no RPM
        let rotation = match read_attr(&blk, "queue/rotational").as_deref() {
            Some("0") => 1,
            _ => 0,
        };

        Ok(DriveAttributes {
            transport: transport.to_string(),
            vendor,
            model: read_attr(dev, "model").unwrap_or_default(),
            serial: read_attr(&blk, "serial")
                .or_else(|| read_attr(dev, "serial"))
                .unwrap_or_default(),
            firmware: read_attr(dev, "rev").unwrap_or_default(),
            rotation,
            temperature: None,
            error_records: Vec::new(),
        })
    }
}
