//! MegaCli output parsers

use crate::domain::ports::{ControllerIdentity, LogDriveKey, VendorLogDrive};
use crate::domain::storage::{ArrayPosition, PciAddress, PhyDrive, RaidFamily, RaidLevel};
use crate::error::{Error, Result};
use crate::logging::Logger;
use crate::raidcli::{normalize_wwn, parse_cache_policy, parse_size, shape_spaced, split_key_val, Base};

const TOOL: &str = "megacli";

const LEVELS: [(&str, RaidLevel); 5] = [
    ("Primary-0, Secondary-0, RAID Level Qualifier-0", RaidLevel::Raid0),
    ("Primary-1, Secondary-0, RAID Level Qualifier-0", RaidLevel::Raid1),
    ("Primary-5, Secondary-0, RAID Level Qualifier-3", RaidLevel::Raid5),
    ("Primary-6, Secondary-0, RAID Level Qualifier-3", RaidLevel::Raid6),
    ("Primary-1, Secondary-3, RAID Level Qualifier-0", RaidLevel::Raid10),
];

pub(crate) fn raid_level(text: &str) -> RaidLevel {
    LEVELS
        .iter()
        .find(|(k, _)| *k == text)
        .map(|(_, lv)| *lv)
        .unwrap_or(RaidLevel::Unknown)
}

// =============================================================================
// -AdpGetPciInfo
// =============================================================================

pub(crate) fn parse_pci_info(text: &str, log: &Logger) -> Result<Vec<ControllerIdentity>> {
    if text.trim().is_empty() {
        return Err(Error::unparseable(TOOL, "empty PCI info"));
    }

    let mut controllers = Vec::new();
    let mut current: Option<(String, PciAddress)> = None;

    for line in text.lines() {
        let l = line.trim();
        if l.starts_with("PCI information for Controller") {
            if let Some((id, pci)) = current.take() {
                controllers.push(identity(id, pci));
            }
            match l.split_whitespace().last().map(|n| n.parse::<u32>()) {
                Some(Ok(n)) => current = Some((n.to_string(), PciAddress::default())),
                _ => log.debug(format_args!("bad controller header: {}", l)),
            }
            continue;
        }

        let Some((_, pci)) = current.as_mut() else {
            continue;
        };
        let Some((key, val)) = split_key_val(l, ":") else {
            continue;
        };
        let Ok(n) = u32::from_str_radix(val, 16) else {
            continue;
        };
        match key {
            "Bus Number" => pci.bus = n,
            "Device Number" => pci.device = n,
            "Function Number" => pci.function = n,
            _ => {}
        }
    }

    if let Some((id, pci)) = current.take() {
        controllers.push(identity(id, pci));
    }
    Ok(controllers)
}

fn identity(adapter_id: String, pci: PciAddress) -> ControllerIdentity {
    ControllerIdentity {
        adapter_id,
        pci: Some(pci),
        product_name: String::new(),
    }
}

// =============================================================================
// -AdpAllInfo
// =============================================================================

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct AdapterInfo {
    pub product_name: String,
    pub serial: String,
    pub bios: String,
    pub firmware: String,
    pub battery: bool,
}

pub(crate) fn parse_adp_info(text: &str) -> AdapterInfo {
    let mut info = AdapterInfo::default();
    for line in text.lines() {
        let Some((key, val)) = split_key_val(line, ":") else {
            continue;
        };
        match key {
            "Product Name" => info.product_name = val.to_string(),
            "Serial No" => info.serial = val.to_string(),
            "BIOS Version" => info.bios = val.to_string(),
            "FW Version" => info.firmware = val.to_string(),
            "BBU" => info.battery = val.eq_ignore_ascii_case("present"),
            "Current Time" => break,
            _ => {}
        }
    }
    info
}

// =============================================================================
// -LDPDInfo
// =============================================================================

/// `"1 (Target Id: 0)"` → (group, target)
pub(crate) fn parse_log_id(text: &str) -> Option<(u16, u16)> {
    if !text.contains("(Target Id:") {
        return None;
    }
    let cleaned = text.replace("(Target Id:", "").replace(')', "");
    let fields: Vec<&str> = cleaned.split_whitespace().collect();
    match fields.as_slice() {
        [grp, tgt] => Some((grp.parse().ok()?, tgt.parse().ok()?)),
        _ => None,
    }
}

struct PendingVolume {
    group: u16,
    target: u16,
    level: RaidLevel,
    size: u64,
    status: String,
    stripe_size: u64,
    cache_policy: String,
    pd_lines: Vec<String>,
    in_pd_lines: bool,
}

impl PendingVolume {
    fn new(group: u16, target: u16) -> Self {
        Self {
            group,
            target,
            level: RaidLevel::Unknown,
            size: 0,
            status: String::new(),
            stripe_size: 0,
            cache_policy: String::new(),
            pd_lines: Vec::new(),
            in_pd_lines: false,
        }
    }

    fn finish(self, log: &Logger) -> Result<VendorLogDrive> {
        let lines: Vec<&str> = self.pd_lines.iter().map(String::as_str).collect();
        let members = parse_pd_list(&lines, log)?;
        log.debug(format_args!(
            "ld grp:{}, tgt:{}, lv:{}, {} members",
            self.group,
            self.target,
            self.level,
            members.len()
        ));
        Ok(VendorLogDrive {
            key: LogDriveKey::Target(self.target),
            label: format!("grp:{}", self.group),
            level: self.level,
            size: self.size,
            status: self.status,
            stripe_size: self.stripe_size,
            cache_policy: self.cache_policy,
            members,
        })
    }
}

pub(crate) fn parse_ld_list(text: &str, log: &Logger) -> Result<Vec<VendorLogDrive>> {
    let mut drives = Vec::new();
    let mut pending: Option<PendingVolume> = None;

    for line in text.lines() {
        let Some((key, val)) = split_key_val(line, ":") else {
            continue;
        };

        if key == "Virtual Drive" {
            if let Some(done) = pending.take() {
                drives.push(done.finish(log)?);
            }
            match parse_log_id(val) {
                Some((grp, tgt)) => pending = Some(PendingVolume::new(grp, tgt)),
                None => log.debug(format_args!("bad virtual drive id: {}", val)),
            }
            continue;
        }

        let Some(ld) = pending.as_mut() else {
            continue;
        };

        if ld.in_pd_lines {
            ld.pd_lines.push(line.to_string());
            continue;
        }

        match key {
            "RAID Level" => ld.level = raid_level(val),
            "Size" => ld.size = parse_size(val, Base::Binary),
            "State" => ld.status = val.to_string(),
            "Strip Size" => ld.stripe_size = parse_size(val, Base::Binary),
            // a spanned RAID 1 is reported with the RAID 1 qualifier
            "Span Depth" if ld.level == RaidLevel::Raid1 => {
                if val.parse::<u32>().map(|d| d > 1).unwrap_or(false) {
                    ld.level = RaidLevel::Raid01;
                }
            }
            "Current Cache Policy" => ld.cache_policy = parse_cache_policy(val),
            "Number of Spans" => ld.in_pd_lines = true,
            _ => {}
        }
    }

    if let Some(done) = pending.take() {
        drives.push(done.finish(log)?);
    }

    log.debug(format_args!("found {} logical drives", drives.len()));
    Ok(drives)
}

// =============================================================================
// -PDList
// =============================================================================

/// `"DiskGroup: 0, Span: 0, Arm: 1"`
pub(crate) fn parse_drive_pos(text: &str) -> Option<ArrayPosition> {
    let mut stripped = text.to_string();
    for key in ["DiskGroup:", "Span:", "Arm:"] {
        if !text.contains(key) {
            return None;
        }
        stripped = stripped.replace(key, "");
    }
    let fields: Vec<u16> = stripped
        .split(',')
        .map(|f| f.trim().parse::<u16>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    match fields.as_slice() {
        [group, span, arm] => Some(ArrayPosition {
            group: *group,
            span: *span,
            arm: *arm,
        }),
        _ => None,
    }
}

/// `"30C (86.00 F)"` → 30
pub(crate) fn parse_temp(text: &str) -> Option<i16> {
    let lower = text.to_ascii_lowercase();
    let (deg, _) = lower.split_once('c')?;
    deg.trim().parse::<f64>().ok().map(|t| t as i16)
}

pub(crate) fn parse_pd_list(lines: &[&str], log: &Logger) -> Result<Vec<PhyDrive>> {
    let mut drives = Vec::new();
    let mut pd: Option<PhyDrive> = None;

    for line in lines {
        let Some((key, val)) = split_key_val(line, ":") else {
            continue;
        };

        if key == "Enclosure Device ID" {
            if let Some(done) = pd.take() {
                drives.push(done);
            }
            let mut fresh = PhyDrive::new(RaidFamily::MegaRaid);
            fresh.enclosure = val.to_string();
            pd = Some(fresh);
            continue;
        }

        let Some(d) = pd.as_mut() else {
            continue;
        };

        match key {
            // older firmware spells it "postion"
            "Drive's position" | "Drive's postion" => {
                let pos = parse_drive_pos(val).ok_or_else(|| {
                    Error::unparseable(TOOL, format!("bad drive position: {}", val))
                })?;
                d.ids.position = Some(pos);
            }
            "WWN" => d.ids.wwn = normalize_wwn(val),
            "Slot Number" => d.slot = val.to_string(),
            "PD Type" => d.protocol = val.to_string(),
            "Raw Size" => d.size = parse_size(val, Base::Binary),
            "Firmware state" => d.status = val.to_string(),
            "Device Firmware Level" => d.firmware = val.to_string(),
            "Inquiry Data" => {
                d.model = shape_spaced(val);
                d.ids.inquiry = Some(val.to_string());
            }
            "Device Speed" => d.link_speed = val.to_string(),
            "Link Speed" if d.link_speed.is_empty() => d.link_speed = val.to_string(),
            "Media Type" => {
                if val.to_ascii_lowercase().contains("solid state") {
                    d.rotation = 1;
                }
            }
            "Drive Temperature" => d.temperature = parse_temp(val),
            "Drive has flagged a S.M.A.R.T alert" => d.smart_alert = val.eq_ignore_ascii_case("yes"),
            "Media Error Count" => d.media_errors = val.parse().unwrap_or(0),
            "Device Id" => d.ids.device_id = val.parse().ok(),
            _ => {}
        }
    }

    if let Some(done) = pd.take() {
        drives.push(done);
    }

    log.debug(format_args!("found {} physical drives", drives.len()));
    Ok(drives)
}
