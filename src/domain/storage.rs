//! Storage Data Model
//!
//! Records produced by one inventory run. Everything here is plain data: built
//! once by the scanner and resolver, never mutated afterwards.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A physical drive with more error records than this is unhealthy
pub const ERROR_COUNT_THRESHOLD: u32 = 5;

// =============================================================================
// Identifiers
// =============================================================================

/// Canonical form of a WWN / SAS address: `0x` + lowercase hex digits
///
/// Accepts the spellings the different sources use (`0x5000c500...`,
/// `naa.5000C500...`, `4433221-1-0000-0000`). Returns `None` for empty or
/// non-hex input so that absent identifiers never compare equal.
pub fn canonical_id(raw: &str) -> Option<String> {
    let mut s = raw.trim().to_ascii_lowercase();
    for prefix in ["naa.", "0x"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.to_string();
        }
    }
    let digits: String = s.chars().filter(|c| *c != '-').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("0x{}", digits))
}

/// PCI location `domain:bus:device.function`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PciAddress {
    pub domain: u32,
    pub bus: u32,
    pub device: u32,
    pub function: u32,
}

impl PciAddress {
    pub fn new(domain: u32, bus: u32, device: u32, function: u32) -> Self {
        Self {
            domain,
            bus,
            device,
            function,
        }
    }

    /// Vendor tools rarely report the PCI domain, so binding ignores it
    pub fn same_slot(&self, other: &PciAddress) -> bool {
        self.bus == other.bus && self.device == other.device && self.function == other.function
    }
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{:x}",
            self.domain, self.bus, self.device, self.function
        )
    }
}

impl FromStr for PciAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid PCI address: {}", s);
        let (dom, rest) = s.trim().split_once(':').ok_or_else(invalid)?;
        let (bus, rest) = rest.split_once(':').ok_or_else(invalid)?;
        let (dev, fun) = rest.split_once('.').ok_or_else(invalid)?;
        let hex = |v: &str| u32::from_str_radix(v, 16).map_err(|_| invalid());
        Ok(Self::new(hex(dom)?, hex(bus)?, hex(dev)?, hex(fun)?))
    }
}

/// SCSI `host:channel:target:lun`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScsiAddress {
    pub host: u16,
    pub channel: u16,
    pub target: u16,
    pub lun: u16,
}

impl ScsiAddress {
    pub fn new(host: u16, channel: u16, target: u16, lun: u16) -> Self {
        Self {
            host,
            channel,
            target,
            lun,
        }
    }
}

impl fmt::Display for ScsiAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.host, self.channel, self.target, self.lun)
    }
}

impl FromStr for ScsiAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<u16> = s
            .trim()
            .split(':')
            .map(|f| f.parse::<u16>())
            .collect::<Result<_, _>>()
            .map_err(|_| format!("invalid SCSI address: {}", s))?;
        match fields.as_slice() {
            [h, c, t, l] => Ok(Self::new(*h, *c, *t, *l)),
            _ => Err(format!("invalid SCSI address: {}", s)),
        }
    }
}

// =============================================================================
// RAID Vocabulary
// =============================================================================

/// RAID controller family, chosen once per controller from its kernel driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RaidFamily {
    /// LSI/Broadcom MegaRAID, driven through MegaCli
    MegaRaid,
    /// LSI/Broadcom SAS HBAs with Integrated RAID, driven through sas3ircu
    SasIr,
    /// HPE Smart Array / Smart HBA, driven through hpssacli
    SmartArray,
}

impl RaidFamily {
    /// Name of the vendor tool used for this family
    pub fn tool_name(&self) -> &'static str {
        match self {
            RaidFamily::MegaRaid => "megacli",
            RaidFamily::SasIr => "sas3ircu",
            RaidFamily::SmartArray => "hpacucli",
        }
    }

    /// Whether a logical-volume status string means the volume is fine
    pub fn is_good_volume_status(&self, status: &str) -> bool {
        let status = status.trim();
        match self {
            RaidFamily::MegaRaid => status == "Optimal",
            RaidFamily::SasIr => status.ends_with("(OKY)"),
            RaidFamily::SmartArray => status == "OK",
        }
    }

    /// Whether a physical-drive status string means the drive is fine
    ///
    /// An empty status means the tool did not report one and is accepted.
    pub fn is_good_drive_status(&self, status: &str) -> bool {
        let status = status.trim();
        if status.is_empty() {
            return true;
        }
        match self {
            RaidFamily::MegaRaid => {
                status == "Optimal"
                    || ["Online", "JBOD", "Unconfigured(good)", "Hotspare"]
                        .iter()
                        .any(|p| status.starts_with(p))
            }
            RaidFamily::SasIr => ["(OKY)", "(OPT)", "(RDY)", "(HSP)"]
                .iter()
                .any(|s| status.ends_with(s)),
            RaidFamily::SmartArray => status == "OK",
        }
    }
}

impl fmt::Display for RaidFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaidFamily::MegaRaid => write!(f, "megaraid"),
            RaidFamily::SasIr => write!(f, "sas-ir"),
            RaidFamily::SmartArray => write!(f, "smart-array"),
        }
    }
}

/// Normalized RAID level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RaidLevel {
    #[serde(rename = "RAID 0")]
    Raid0,
    #[serde(rename = "RAID 1")]
    Raid1,
    #[serde(rename = "RAID 5")]
    Raid5,
    #[serde(rename = "RAID 6")]
    Raid6,
    #[serde(rename = "RAID 0+1")]
    Raid01,
    #[serde(rename = "RAID 1+0")]
    Raid10,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl fmt::Display for RaidLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RaidLevel::Raid0 => "RAID 0",
            RaidLevel::Raid1 => "RAID 1",
            RaidLevel::Raid5 => "RAID 5",
            RaidLevel::Raid6 => "RAID 6",
            RaidLevel::Raid01 => "RAID 0+1",
            RaidLevel::Raid10 => "RAID 1+0",
            RaidLevel::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Battery / capacitor backup unit presence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Battery {
    #[serde(rename = "present")]
    Present,
    #[serde(rename = "not present")]
    NotPresent,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl From<bool> for Battery {
    fn from(present: bool) -> Self {
        if present {
            Battery::Present
        } else {
            Battery::NotPresent
        }
    }
}

impl fmt::Display for Battery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Battery::Present => write!(f, "present"),
            Battery::NotPresent => write!(f, "not present"),
            Battery::Unknown => write!(f, "unknown"),
        }
    }
}

// =============================================================================
// Drives
// =============================================================================

/// One SMART / log-page error counter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartRecord {
    pub id: u8,
    pub name: String,
    pub current: u8,
    pub worst: u8,
    pub threshold: u8,
    pub raw: i64,
}

impl fmt::Display for SmartRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:03}.{} = current:{} worst:{} threshold:{} raw:{}",
            self.id, self.name, self.current, self.worst, self.threshold, self.raw
        )
    }
}

/// A block device as the kernel sees it under a storage controller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelStub {
    /// Kernel name, e.g. `sda`
    pub name: String,
    /// sysfs directory of the SCSI device
    pub path: PathBuf,
    pub driver: String,
    pub model: String,
    /// Size in 512-byte sectors, as sysfs reports it
    pub blocks: u64,
    pub logical_block_size: u32,
    pub physical_block_size: u32,
    pub scheduler: String,
    pub scsi: ScsiAddress,
    /// Canonical `sas_address` attribute, when the device has one
    pub sas_address: Option<String>,
    /// Canonical WWN from `wwid`, when it is an NAA identifier
    pub wwn: Option<String>,
}

impl KernelStub {
    pub fn size_bytes(&self) -> u64 {
        self.blocks * 512
    }

    /// `/dev/<name>`
    pub fn device_path(&self) -> String {
        format!("/dev/{}", self.name)
    }
}

/// Coordinates of a drive inside a MegaRAID disk group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArrayPosition {
    pub group: u16,
    pub span: u16,
    pub arm: u16,
}

/// Identity keys a vendor tool may expose for a physical drive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveIdentity {
    /// Canonical WWN
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wwn: Option<String>,
    /// Canonical SAS address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sas_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<ArrayPosition>,
    /// Raw SCSI inquiry string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inquiry: Option<String>,
    /// Vendor device id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<u16>,
}

/// A physical drive as reported by a vendor RAID tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhyDrive {
    pub family: RaidFamily,
    pub enclosure: String,
    pub slot: String,
    /// SAS / SATA
    pub protocol: String,
    pub model: String,
    pub serial: String,
    pub firmware: String,
    /// Raw size in bytes
    pub size: u64,
    /// 0 = unknown, 1 = SSD, >1 = HDD RPM
    pub rotation: u32,
    pub link_speed: String,
    pub status: String,
    pub temperature: Option<i16>,
    pub smart_alert: bool,
    pub media_errors: u32,
    pub error_records: Vec<SmartRecord>,
    pub ids: DriveIdentity,
}

impl PhyDrive {
    /// Empty record for the given family
    pub fn new(family: RaidFamily) -> Self {
        Self {
            family,
            enclosure: String::new(),
            slot: String::new(),
            protocol: String::new(),
            model: String::new(),
            serial: String::new(),
            firmware: String::new(),
            size: 0,
            rotation: 0,
            link_speed: String::new(),
            status: String::new(),
            temperature: None,
            smart_alert: false,
            media_errors: 0,
            error_records: Vec::new(),
            ids: DriveIdentity::default(),
        }
    }

    /// `enclosure:slot`
    pub fn pos(&self) -> String {
        format!("{}:{}", self.enclosure, self.slot)
    }

    pub fn is_ssd(&self) -> bool {
        self.rotation == 1
    }

    pub fn is_hdd(&self) -> bool {
        self.rotation > 1
    }

    /// Media errors plus SMART error records
    pub fn error_count(&self) -> u32 {
        self.media_errors
            .saturating_add(self.error_records.len() as u32)
    }

    /// e.g. `SAS HDD (10000rpm) (12.0Gb/s)`
    pub fn form_summary(&self) -> String {
        let mut sum = if self.is_ssd() {
            format!("{} SSD", self.protocol)
        } else if self.is_hdd() {
            format!("{} HDD ({}rpm)", self.protocol, self.rotation)
        } else {
            self.protocol.clone()
        };
        if !self.link_speed.is_empty() {
            sum = format!("{} ({})", sum, self.link_speed);
        }
        sum.trim().to_string()
    }
}

/// RAID configuration merged onto a kernel stub from the vendor tool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaidVolume {
    pub level: RaidLevel,
    pub status: String,
    pub cache_policy: String,
    /// Stripe size in bytes
    pub stripe_size: u64,
    /// Vendor-specific volume label, e.g. `grp:0`
    pub group_label: String,
    pub degraded: bool,
}

/// A logical (RAID) volume
///
/// `raid` is `None` when no vendor record matched the kernel stub; such a
/// volume is reported with empty RAID fields and no members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDrive {
    pub kernel: KernelStub,
    pub raid: Option<RaidVolume>,
    pub members: Vec<PhyDrive>,
}

impl LogDrive {
    /// Kernel stub with no vendor enrichment
    pub fn bare(kernel: KernelStub) -> Self {
        Self {
            kernel,
            raid: None,
            members: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.kernel.name
    }

    pub fn is_enriched(&self) -> bool {
        self.raid.is_some()
    }

    pub fn degraded(&self) -> bool {
        self.raid.as_ref().map(|r| r.degraded).unwrap_or(false)
    }

    pub fn level_string(&self) -> String {
        self.raid
            .as_ref()
            .map(|r| r.level.to_string())
            .unwrap_or_default()
    }

    pub fn status(&self) -> &str {
        self.raid.as_ref().map(|r| r.status.as_str()).unwrap_or("")
    }
}

/// A physical drive exposed to the kernel directly rather than through a volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassthroughDrive {
    pub kernel: KernelStub,
    pub drive: PhyDrive,
}

impl PassthroughDrive {
    pub fn name(&self) -> &str {
        &self.kernel.name
    }
}

/// A vendor-visible drive with no block device and no array membership
pub type UnconfiguredDrive = PhyDrive;

/// A directly attached drive (AHCI / virtio) with its protocol attributes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drive {
    pub kernel: KernelStub,
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
// Controllers
// =============================================================================

/// PCI identity of a mass-storage controller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PciDevice {
    pub address: PciAddress,
    /// sysfs directory of the device
    pub path: PathBuf,
    pub vendor_id: u16,
    pub device_id: u16,
    pub class: u32,
    pub driver: String,
    pub numa_node: Option<u32>,
    /// Uncorrectable PCIe error records
    pub uncorrectable_errors: Vec<String>,
    /// Correctable PCIe error records
    pub correctable_errors: Vec<String>,
}

impl PciDevice {
    pub fn long_name(&self) -> String {
        format!(
            "{:04x}:{:04x} at {}",
            self.vendor_id, self.device_id, self.address
        )
    }
}

/// A RAID controller with its resolved drive sets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaidController {
    pub pci: PciDevice,
    pub family: RaidFamily,
    pub product_name: String,
    pub firmware: String,
    pub bios: String,
    pub serial: String,
    pub adapter_id: String,
    pub battery: Battery,
    /// Whether the vendor tool contributed to this record
    pub vendor_enriched: bool,
    pub log_drives: Vec<LogDrive>,
    pub passthrough_drives: Vec<PassthroughDrive>,
    pub unconfigured_drives: Vec<UnconfiguredDrive>,
}

impl RaidController {
    /// Controller carrying kernel-only data
    pub fn kernel_only(pci: PciDevice, family: RaidFamily, stubs: Vec<KernelStub>) -> Self {
        Self {
            pci,
            family,
            product_name: String::new(),
            firmware: String::new(),
            bios: String::new(),
            serial: String::new(),
            adapter_id: String::new(),
            battery: Battery::Unknown,
            vendor_enriched: false,
            log_drives: stubs.into_iter().map(LogDrive::bare).collect(),
            passthrough_drives: Vec::new(),
            unconfigured_drives: Vec::new(),
        }
    }

    pub fn summary(&self) -> String {
        let mut sum = self.pci.long_name();
        if !self.product_name.is_empty() {
            sum = format!("{}, {}", sum, self.product_name);
        }
        if !self.pci.driver.is_empty() {
            sum = format!("{} ({})", sum, self.pci.driver);
        }
        if !self.serial.is_empty() {
            sum = format!("{} (SN:{})", sum, self.serial);
        }
        sum
    }
}

/// Directly attached controller kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectKind {
    Ahci,
    Virtio,
}

/// An AHCI or virtio controller; drives map 1:1 to block devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectController {
    pub pci: PciDevice,
    pub kind: DirectKind,
    pub drives: Vec<Drive>,
}

// =============================================================================
// Report
// =============================================================================

/// Everything one inventory run found
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageReport {
    pub hostname: String,
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub raid_controllers: Vec<RaidController>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub direct_controllers: Vec<DirectController>,
}
