//! hpssacli output parsers

use crate::domain::ports::{ControllerIdentity, LogDriveKey, VendorLogDrive};
use crate::domain::storage::{PciAddress, PhyDrive, RaidFamily, RaidLevel};
use crate::logging::Logger;
use crate::raidcli::{normalize_sas_address, parse_size, shape_spaced, split_key_val, Base};

const LEVELS: [(&str, RaidLevel); 6] = [
    ("0", RaidLevel::Raid0),
    ("1", RaidLevel::Raid1),
    ("5", RaidLevel::Raid5),
    ("6", RaidLevel::Raid6),
    ("1+0", RaidLevel::Raid10),
    ("0+1", RaidLevel::Raid01),
];

const CONTROLLER_MARKS: [&str; 3] = ["Smart Array ", "Smart HBA", "Dynamic Smart Array "];

pub(crate) fn raid_level(text: &str) -> RaidLevel {
    LEVELS
        .iter()
        .find(|(k, _)| *k == text)
        .map(|(_, lv)| *lv)
        .unwrap_or(RaidLevel::Unknown)
}

// =============================================================================
// controller all show
// =============================================================================

/// `"Smart Array P440ar in Slot 0 (Embedded)"` → slot `0`
pub(crate) fn parse_ctl_list(text: &str) -> Vec<ControllerIdentity> {
    text.lines()
        .filter_map(|line| {
            let (product, rest) = line.trim().split_once(" in Slot ")?;
            let slot = rest.split_whitespace().next()?;
            Some(ControllerIdentity {
                adapter_id: slot.to_string(),
                pci: None,
                product_name: product.to_string(),
            })
        })
        .collect()
}

// =============================================================================
// show config detail
// =============================================================================

/// (controller lines, array and drive lines)
pub(crate) fn split_config_detail<'a>(text: &'a str, log: &Logger) -> (Vec<&'a str>, Vec<&'a str>) {
    let mut controller = Vec::new();
    let mut drives = Vec::new();
    let mut in_drives: Option<bool> = None;

    for line in text.lines() {
        let l = line.trim();
        if l.is_empty() {
            continue;
        }

        // Smart HBA output repeats the controller banner before each drive,
        // so only the first one opens the controller block
        if in_drives.is_none() && CONTROLLER_MARKS.iter().any(|m| l.starts_with(m)) && l.contains("in Slot") {
            in_drives = Some(false);
        } else if l.starts_with("Array: ") || l == "unassigned" {
            in_drives = Some(true);
        } else if l.starts_with("SEP (Vendor ID") {
            break;
        }

        match in_drives {
            Some(false) => controller.push(l),
            Some(true) => drives.push(l),
            None => {}
        }
    }

    log.debug(format_args!(
        "got {} controller lines, {} array/drive lines",
        controller.len(),
        drives.len()
    ));
    (controller, drives)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ControllerInfo {
    pub serial: String,
    pub firmware: String,
    pub battery: bool,
    pub pci: Option<PciAddress>,
}

pub(crate) fn parse_controller_lines(lines: &[&str]) -> ControllerInfo {
    let mut info = ControllerInfo::default();
    for line in lines {
        let Some((key, val)) = split_key_val(line, ": ") else {
            continue;
        };
        match key {
            "Serial Number" if info.serial.is_empty() => info.serial = val.to_string(),
            "Firmware Version" if info.firmware.is_empty() => info.firmware = val.to_string(),
            "Battery/Capacitor Count" => {
                info.battery = info.battery || val.parse::<u32>().map(|n| n > 0).unwrap_or(false)
            }
            "PCI Address (Domain:Bus:Device.Function)" => info.pci = val.parse().ok(),
            _ => {}
        }
    }
    info
}

/// Array blocks and the `unassigned` block
pub(crate) fn split_arrays<'a>(lines: &[&'a str]) -> (Vec<Vec<&'a str>>, Vec<&'a str>) {
    let mut blocks: Vec<Vec<&'a str>> = Vec::new();
    for line in lines {
        if line.starts_with("Array: ") || *line == "unassigned" || blocks.is_empty() {
            blocks.push(Vec::new());
        }
        if let Some(block) = blocks.last_mut() {
            block.push(*line);
        }
    }

    let mut arrays = Vec::new();
    let mut unassigned = Vec::new();
    for block in blocks {
        if block.first() == Some(&"unassigned") {
            unassigned.extend(block);
        } else {
            arrays.push(block);
        }
    }
    (arrays, unassigned)
}

/// One chunk per `Logical Drive:` inside an array; array header lines are dropped
pub(crate) fn split_ld_chunks<'a>(array: &[&'a str]) -> Vec<Vec<&'a str>> {
    let mut chunks: Vec<Vec<&'a str>> = Vec::new();
    for line in array {
        if line.starts_with("Logical Drive: ") {
            chunks.push(Vec::new());
        }
        if let Some(chunk) = chunks.last_mut() {
            chunk.push(*line);
        }
    }
    chunks
}

fn is_pd_header(line: &str) -> bool {
    line.starts_with("physicaldrive") && line.split_whitespace().count() == 2
}

/// Volume and its member drives
pub(crate) fn parse_ld_chunk(chunk: &[&str]) -> VendorLogDrive {
    let split = chunk.iter().position(|l| is_pd_header(l)).unwrap_or(chunk.len());
    let (ld_lines, pd_lines) = chunk.split_at(split);

    let mut label = String::new();
    let mut disk_name = String::new();
    let mut ld = VendorLogDrive {
        key: LogDriveKey::DevicePath(String::new()),
        label: String::new(),
        level: RaidLevel::Unknown,
        size: 0,
        status: String::new(),
        stripe_size: 0,
        cache_policy: String::new(),
        members: Vec::new(),
    };

    for line in ld_lines {
        if let Some(id) = line.strip_prefix("Logical Drive: ") {
            label = format!("vol:{}", id.trim());
            continue;
        }
        let Some((key, val)) = split_key_val(line, ":") else {
            continue;
        };
        match key {
            "Size" => ld.size = parse_size(val, Base::Decimal),
            "Fault Tolerance" => ld.level = raid_level(val),
            "Strip Size" => ld.stripe_size = parse_size(val, Base::Binary),
            "Status" => ld.status = val.to_string(),
            "Disk Name" => disk_name = val.to_string(),
            _ => {}
        }
    }

    ld.label = label;
    ld.key = LogDriveKey::DevicePath(disk_name);
    ld.members = parse_pd_lines(pd_lines).into_iter().map(|(pd, _)| pd).collect();
    ld
}

/// Drives plus their "exposed to OS" flag
pub(crate) fn parse_pd_lines(lines: &[&str]) -> Vec<(PhyDrive, bool)> {
    let mut drives = Vec::new();
    let mut current: Option<(PhyDrive, bool)> = None;

    for line in lines {
        let is_header = line.starts_with("physicaldrive");
        if is_header || line.starts_with("Enclosure ") || line.starts_with("Expander ") {
            if let Some(done) = current.take() {
                drives.push(done);
            }
            if is_header {
                current = Some((pd_from_header(line), false));
            }
            continue;
        }

        let Some((pd, exposed)) = current.as_mut() else {
            continue;
        };
        let Some((key, val)) = split_key_val(line, ": ") else {
            continue;
        };

        match key {
            "Port" => pd.enclosure = format!("{}:{}", val, box_of(&pd.enclosure)),
            "Box" => pd.enclosure = format!("{}:{}", port_of(&pd.enclosure), val),
            "Bay" => pd.slot = val.to_string(),
            "Status" => pd.status = val.to_string(),
            "Interface Type" => {
                // SSDs report e.g. "Solid State SATA"
                if val.starts_with("Solid State") {
                    pd.rotation = 1;
                }
                pd.protocol = val.split_whitespace().last().unwrap_or(val).to_string();
            }
            "Size" => pd.size = parse_size(val, Base::Decimal),
            "Drive exposed to OS" => *exposed = val.eq_ignore_ascii_case("true"),
            "Rotational Speed" => {
                if let Ok(rpm) = val.parse::<u32>() {
                    pd.rotation = rpm;
                }
            }
            "Firmware Revision" => pd.firmware = val.to_string(),
            "Serial Number" => pd.serial = val.to_string(),
            "Model" => pd.model = shape_spaced(val),
            "Current Temperature (C)" => pd.temperature = val.parse().ok(),
            "PHY Transfer Rate" => {
                pd.link_speed = val.split(", ").next().unwrap_or("").to_string();
            }
            "WWID" | "SAS Address" => {
                if pd.ids.sas_address.is_none() {
                    pd.ids.sas_address = normalize_sas_address(val);
                }
            }
            _ => {}
        }
    }

    if let Some(done) = current.take() {
        drives.push(done);
    }
    drives
}

/// `"physicaldrive 1I:1:11"` → enclosure `1I:1`, slot `11`
fn pd_from_header(line: &str) -> PhyDrive {
    let mut pd = PhyDrive::new(RaidFamily::SmartArray);
    if let Some(id) = line.split_whitespace().nth(1) {
        if let Some((enclosure, bay)) = id.rsplit_once(':') {
            pd.enclosure = enclosure.to_string();
            pd.slot = bay.to_string();
        }
    }
    pd
}

fn port_of(enclosure: &str) -> &str {
    enclosure.split_once(':').map(|(p, _)| p).unwrap_or("")
}

fn box_of(enclosure: &str) -> &str {
    enclosure.split_once(':').map(|(_, b)| b).unwrap_or("")
}
