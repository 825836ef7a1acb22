//! sas3ircu output parsers

use crate::domain::ports::{ControllerIdentity, LogDriveKey, VendorLogDrive};
use crate::domain::storage::{PciAddress, PhyDrive, RaidFamily, RaidLevel};
use crate::error::{Error, Result};
use crate::logging::Logger;
use crate::raidcli::{normalize_sas_address, split_key_val, unit_multiplier, Base};

const TOOL: &str = "sas3ircu";

const LEVELS: [(&str, RaidLevel); 6] = [
    ("RAID0", RaidLevel::Raid0),
    ("RAID1", RaidLevel::Raid1),
    ("RAID1E", RaidLevel::Raid1),
    ("RAID5", RaidLevel::Raid5),
    ("RAID6", RaidLevel::Raid6),
    ("RAID10", RaidLevel::Raid10),
];

pub(crate) fn raid_level(text: &str) -> RaidLevel {
    LEVELS
        .iter()
        .find(|(k, _)| *k == text)
        .map(|(_, lv)| *lv)
        .unwrap_or(RaidLevel::Unknown)
}

// =============================================================================
// LIST
// =============================================================================

/// `"00h:61h:00h:00h"`
pub(crate) fn parse_pci_addr(text: &str) -> Option<PciAddress> {
    let lower = text.to_ascii_lowercase();
    let fields: Vec<u32> = lower
        .split(':')
        .map(|f| u32::from_str_radix(f.trim_end_matches('h'), 16))
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    match fields.as_slice() {
        [dom, bus, dev, fun] => Some(PciAddress::new(*dom, *bus, *dev, *fun)),
        _ => None,
    }
}

pub(crate) fn parse_ctl_list(text: &str) -> Vec<ControllerIdentity> {
    text.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 7 {
                return None;
            }
            let index: u32 = fields[0].parse().ok()?;
            let pci = parse_pci_addr(fields[4])?;
            Some(ControllerIdentity {
                adapter_id: index.to_string(),
                pci: Some(pci),
                product_name: fields[1].to_string(),
            })
        })
        .collect()
}

// =============================================================================
// DISPLAY
// =============================================================================

#[derive(Debug, Default)]
pub(crate) struct Sections<'a> {
    pub controller: Vec<&'a str>,
    pub volumes: Vec<&'a str>,
    pub devices: Vec<&'a str>,
}

#[derive(Clone, Copy)]
enum Section {
    Controller,
    Volumes,
    Devices,
}

pub(crate) fn split_sections<'a>(text: &'a str, log: &Logger) -> Sections<'a> {
    let mut sections = Sections::default();
    let mut current: Option<Section> = None;

    for line in text.lines() {
        let l = line.trim();
        if l.is_empty() || l.chars().all(|c| c == '-') {
            continue;
        }

        match l {
            "Controller information" => {
                current = Some(Section::Controller);
                continue;
            }
            "IR Volume information" => {
                current = Some(Section::Volumes);
                continue;
            }
            "Physical device information" => {
                current = Some(Section::Devices);
                continue;
            }
            _ => {}
        }

        // any other section (enclosure, boot device) ends what we need
        if l.ends_with("information") && !l.contains(':') {
            break;
        }

        match current {
            Some(Section::Controller) => sections.controller.push(l),
            Some(Section::Volumes) => sections.volumes.push(l),
            Some(Section::Devices) => sections.devices.push(l),
            None => {}
        }
    }

    log.debug(format_args!(
        "got {} controller, {} volume, {} device lines",
        sections.controller.len(),
        sections.volumes.len(),
        sections.devices.len()
    ));
    sections
}

/// (firmware, bios)
pub(crate) fn parse_controller_lines(lines: &[&str]) -> (String, String) {
    let mut firmware = String::new();
    let mut bios = String::new();
    for line in lines {
        match split_key_val(line, ":") {
            Some(("Firmware version", val)) => firmware = val.to_string(),
            Some(("BIOS version", val)) => bios = val.to_string(),
            _ => {}
        }
    }
    (firmware, bios)
}

/// A volume plus the `enclosure:slot` ids of its members
#[derive(Debug)]
pub(crate) struct RawVolume {
    pub volume: VendorLogDrive,
    pub member_ids: Vec<String>,
}

fn size_in(key: &str, val: &str) -> u64 {
    let unit = key
        .trim_start_matches("Size (in ")
        .trim_end_matches(')')
        .trim();
    match val.parse::<f64>() {
        Ok(n) => (n * unit_multiplier(unit, Base::Binary)) as u64,
        Err(_) => 0,
    }
}

pub(crate) fn parse_volume_lines(lines: &[&str], log: &Logger) -> Vec<RawVolume> {
    if lines.is_empty() {
        log.debug(format_args!("no IR volumes, every disk is pass-through"));
        return Vec::new();
    }

    let mut volumes = Vec::new();
    let mut current: Option<RawVolume> = None;
    let mut wwid = String::new();

    let close = |raw: Option<RawVolume>, wwid: &str, out: &mut Vec<RawVolume>| {
        if let Some(mut raw) = raw {
            match normalize_sas_address(wwid) {
                Some(addr) => {
                    raw.volume.key = LogDriveKey::SasAddress(addr);
                    out.push(raw);
                }
                None => log.debug(format_args!("volume {} has no wwid, skipped", raw.volume.label)),
            }
        }
    };

    for line in lines {
        if line.starts_with("IR volume") {
            close(current.take(), &wwid, &mut volumes);
            wwid.clear();
            current = Some(RawVolume {
                volume: VendorLogDrive {
                    key: LogDriveKey::SasAddress(String::new()),
                    label: String::new(),
                    level: RaidLevel::Unknown,
                    size: 0,
                    status: String::new(),
                    stripe_size: 0,
                    cache_policy: String::new(),
                    members: Vec::new(),
                },
                member_ids: Vec::new(),
            });
            continue;
        }

        let Some(raw) = current.as_mut() else {
            continue;
        };
        let Some((key, val)) = split_key_val(line, ":") else {
            continue;
        };

        if key.starts_with("Size (in") {
            raw.volume.size = size_in(key, val);
            continue;
        }

        match key {
            "Volume ID" => {
                if let Ok(id) = val.parse::<u32>() {
                    raw.volume.label = format!("vol:{}", id);
                }
            }
            "Volume wwid" => wwid = val.to_string(),
            "Status of volume" => raw.volume.status = val.to_string(),
            "RAID level" => raw.volume.level = raid_level(val),
            _ if key.starts_with("PHY[") && key.ends_with("] Enclosure#/Slot#") => {
                raw.member_ids.push(val.to_string());
            }
            _ => {}
        }
    }
    close(current.take(), &wwid, &mut volumes);

    volumes
}

/// `"381554/781422768"` → bytes
pub(crate) fn parse_mb_size(text: &str) -> u64 {
    match text.split_once('/') {
        Some((mb, _)) => mb.trim().parse::<u64>().map(|n| n * 1024 * 1024).unwrap_or(0),
        None => 0,
    }
}

struct RawDevice {
    drive: PhyDrive,
    device_type: String,
}

impl RawDevice {
    /// Enclosures, missing and undetermined devices are not disks
    fn is_disk(&self) -> bool {
        if self.drive.size == 0 || self.drive.status == "Missing (MIS)" {
            return false;
        }
        let kind = self.device_type.to_ascii_lowercase();
        !(kind.contains("undetermined") || kind.contains("enclosure"))
    }
}

pub(crate) fn parse_device_lines(lines: &[&str]) -> Result<Vec<PhyDrive>> {
    if lines.is_empty() {
        return Err(Error::unparseable(TOOL, "no physical device information"));
    }

    let mut drives = Vec::new();
    let mut current: Option<RawDevice> = None;

    for line in lines {
        if line.starts_with("Device is a") {
            if let Some(done) = current.take().filter(RawDevice::is_disk) {
                drives.push(done.drive);
            }
            current = Some(RawDevice {
                drive: PhyDrive::new(RaidFamily::SasIr),
                device_type: String::new(),
            });
            continue;
        }

        let Some(raw) = current.as_mut() else {
            continue;
        };
        let Some((key, val)) = split_key_val(line, ":") else {
            continue;
        };
        let d = &mut raw.drive;

        match key {
            "Enclosure #" => d.enclosure = val.to_string(),
            "Slot #" => d.slot = val.to_string(),
            "Model Number" => d.model = val.to_string(),
            "Firmware Revision" => d.firmware = val.to_string(),
            "Serial No" => d.serial = val.to_string(),
            "SAS Address" => d.ids.sas_address = normalize_sas_address(val),
            "State" => d.status = val.to_string(),
            "Size (in MB)/(in sectors)" => d.size = parse_mb_size(val),
            "Protocol" => d.protocol = val.to_string(),
            "Drive Type" => {
                raw.device_type = val.to_string();
                if val.to_ascii_uppercase().contains("SSD") {
                    d.rotation = 1;
                }
            }
            // enclosure services devices say "Device Type" instead
            "Device Type" => raw.device_type = val.to_string(),
            _ => {}
        }
    }

    if let Some(done) = current.take().filter(RawDevice::is_disk) {
        drives.push(done.drive);
    }
    Ok(drives)
}
