//! Report Rendering
//!
//! Turns a [`StorageReport`] into what the CLI prints:
//!
//! - `lsraid`: one row per vendor-visible physical drive
//! - `lsdiag`: one row per health-checked entity, with multi-line diagnostics
//! - `report`: an indented text tree, or pretty JSON

use std::fmt::{self, Write as _};

use crate::domain::health::{HealthReporter, HealthStatus, Verdict};
use crate::domain::storage::{PhyDrive, RaidController, StorageReport};
use crate::error::Result;

pub const HEALTHY: &str = "healthy";
pub const UNHEALTHY: &str = "UNHEALTHY";

const LSRAID_HEADERS: [&str; 8] = ["blk", "conf", "adp", "pos", "stat", "size", "form", "model"];
const LSDIAG_HEADERS: [&str; 3] = ["category", "stat", "detail"];

// =============================================================================
// Sizes
// =============================================================================

const DECIMAL: f64 = 1000.0;
const DECIMAL_UNITS: [&str; 6] = ["GB", "TB", "PB", "EB", "ZB", "YB"];

/// Decimal size fitted upwards from GB, e.g. `600.0GB`, `1.2TB`
///
/// Sizes under one GB print as `0B`.
pub fn size_string(bytes: u64) -> String {
    if bytes == 0 {
        return "0B".to_string();
    }
    let mut res = (bytes as f64 / DECIMAL.powi(3)).floor();
    if res < 1.0 {
        return "0B".to_string();
    }

    let mut unit = 0;
    while res > DECIMAL && unit + 1 < DECIMAL_UNITS.len() {
        res /= DECIMAL;
        unit += 1;
        if res <= DECIMAL {
            break;
        }
        res = res.floor();
    }
    format!("{:.1}{}", res, DECIMAL_UNITS[unit])
}

// =============================================================================
// Table
// =============================================================================

/// Fixed-column text table with `+---+` borders
#[derive(Debug, Clone)]
pub struct Table {
    headers: Vec<String>,
    widths: Vec<usize>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            widths: headers.iter().map(|h| h.chars().count()).collect(),
            rows: Vec::new(),
        }
    }

    /// Rows with the wrong number of cells are dropped
    pub fn push<S: Into<String>>(&mut self, row: impl IntoIterator<Item = S>) {
        let row: Vec<String> = row.into_iter().map(Into::into).collect();
        if row.len() != self.headers.len() {
            return;
        }
        for (width, cell) in self.widths.iter_mut().zip(&row) {
            *width = (*width).max(cell.chars().count());
        }
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn write_border(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('+')?;
        for w in &self.widths {
            write!(f, "-{}-+", "-".repeat(*w))?;
        }
        f.write_char('\n')
    }

    fn write_row(&self, f: &mut fmt::Formatter<'_>, cells: &[String]) -> fmt::Result {
        f.write_char('|')?;
        for (cell, w) in cells.iter().zip(&self.widths) {
            write!(f, " {:<width$} |", cell, width = *w)?;
        }
        f.write_char('\n')
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_border(f)?;
        self.write_row(f, &self.headers)?;
        self.write_border(f)?;
        for row in &self.rows {
            self.write_row(f, row)?;
        }
        self.write_border(f)
    }
}

// =============================================================================
// Health Rows
// =============================================================================

/// One `lsdiag` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthRow {
    pub category: &'static str,
    pub status: HealthStatus,
    pub detail: String,
    /// Follow-up diagnostic of the row above; printed without category and status
    pub continued: bool,
}

impl HealthRow {
    fn new(category: &'static str, status: HealthStatus, detail: String) -> Self {
        Self {
            category,
            status,
            detail,
            continued: false,
        }
    }

    /// `healthy` / `UNHEALTHY`
    pub fn stat(&self) -> &'static str {
        match self.status {
            HealthStatus::Healthy => HEALTHY,
            HealthStatus::Unhealthy => UNHEALTHY,
        }
    }
}

/// Healthy entities get one row with `summary`; unhealthy ones one row per diagnostic
fn push_verdict(rows: &mut Vec<HealthRow>, category: &'static str, verdict: Verdict, summary: String) {
    if verdict.is_healthy() || verdict.diagnostics.is_empty() {
        rows.push(HealthRow::new(category, verdict.status, summary));
        return;
    }
    for (i, diag) in verdict.diagnostics.into_iter().enumerate() {
        let mut row = HealthRow::new(category, verdict.status, diag);
        row.continued = i > 0;
        rows.push(row);
    }
}

/// One row with `detail`, followed by the diagnostics of an unhealthy verdict
fn push_with_causes(rows: &mut Vec<HealthRow>, category: &'static str, verdict: Verdict, detail: String) {
    rows.push(HealthRow::new(category, verdict.status, detail));
    if verdict.is_healthy() {
        return;
    }
    for diag in verdict.diagnostics {
        let mut row = HealthRow::new(category, verdict.status, diag);
        row.continued = true;
        rows.push(row);
    }
}

impl StorageReport {
    /// Flattened health view: controllers, their volumes, pass-through and
    /// unconfigured drives, then directly attached drives
    pub fn health_rows(&self) -> Vec<HealthRow> {
        let mut rows = Vec::new();

        for ctl in &self.raid_controllers {
            push_verdict(&mut rows, "RAID Card", ctl.verdict(), ctl.pci.long_name());

            for ld in &ctl.log_drives {
                let detail = if ld.is_enriched() {
                    format!("{}: {}, {}", ld.name(), ld.level_string(), ld.status())
                } else {
                    format!("{}: no RAID data", ld.name())
                };
                push_with_causes(&mut rows, "RAID Volume", ld.verdict(), detail);
            }

            for pt in &ctl.passthrough_drives {
                let detail = format!("{}: {}, {}", pt.name(), pt.drive.model, pt.drive.status);
                push_with_causes(&mut rows, "Pass-Through Drive", pt.verdict(), detail);
            }

            for pd in &ctl.unconfigured_drives {
                let detail = format!("{}: {}, {}", pd.pos(), pd.model, pd.status);
                push_with_causes(&mut rows, "Unconfigured Drive", pd.verdict(), detail);
            }
        }

        for ctl in &self.direct_controllers {
            for drv in &ctl.drives {
                let summary = format!("{} {}", drv.model, size_string(drv.kernel.size_bytes()));
                push_verdict(&mut rows, "SATA Drive", drv.verdict(), summary);
            }
        }

        rows
    }

    /// `false` as soon as any row is unhealthy
    pub fn is_healthy(&self) -> bool {
        self.health_rows().iter().all(|r| r.status.is_healthy())
    }
}

// =============================================================================
// Renderers
// =============================================================================

/// `lsraid` table
pub fn lsraid_table(report: &StorageReport) -> Table {
    let mut tbl = Table::new(&LSRAID_HEADERS);

    for ctl in &report.raid_controllers {
        let adp = ctl.adapter_id.as_str();
        let drive_row = |blk: &str, conf: &str, pd: &PhyDrive| {
            [
                blk.to_string(),
                conf.to_string(),
                adp.to_string(),
                pd.pos(),
                pd.status.clone(),
                size_string(pd.size),
                pd.form_summary(),
                pd.model.clone(),
            ]
        };

        for ld in &ctl.log_drives {
            for pd in &ld.members {
                tbl.push(drive_row(ld.name(), &ld.level_string(), pd));
            }
        }
        for pd in &ctl.unconfigured_drives {
            tbl.push(drive_row("", "unconf", pd));
        }
        for pt in &ctl.passthrough_drives {
            tbl.push(drive_row(pt.name(), "Pass-Through", &pt.drive));
        }
    }

    tbl
}

/// `lsdiag` table
pub fn lsdiag_table(report: &StorageReport) -> Table {
    let mut tbl = Table::new(&LSDIAG_HEADERS);
    for row in report.health_rows() {
        if row.continued {
            tbl.push(["", "", row.detail.as_str()]);
        } else {
            tbl.push([row.category, row.stat(), row.detail.as_str()]);
        }
    }
    tbl
}

/// Pretty-printed JSON document
pub fn to_json(report: &StorageReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Indented text tree of everything the run found
pub fn text_tree(report: &StorageReport) -> std::result::Result<String, fmt::Error> {
    let mut out = String::new();
    write_tree(&mut out, report)?;
    Ok(out)
}

fn write_tree(out: &mut String, report: &StorageReport) -> fmt::Result {
    writeln!(out, "{} ({})", report.hostname, report.generated_at.to_rfc3339())?;

    for ctl in &report.raid_controllers {
        write_raid_controller(out, ctl)?;
    }

    for ctl in &report.direct_controllers {
        writeln!(out, "  {} ({}) [{:?}]", ctl.pci.long_name(), ctl.pci.driver, ctl.kind)?;
        for drv in &ctl.drives {
            writeln!(
                out,
                "    {} {} {} {} SN:{} FW:{}",
                drv.kernel.name,
                drv.transport,
                drv.model,
                size_string(drv.kernel.size_bytes()),
                drv.serial,
                drv.firmware
            )?;
        }
    }
    Ok(())
}

fn write_raid_controller(out: &mut String, ctl: &RaidController) -> fmt::Result {
    writeln!(out, "  {} [{}]", ctl.summary(), ctl.family)?;
    if ctl.vendor_enriched {
        writeln!(
            out,
            "    firmware: {}, bios: {}, battery: {}",
            ctl.firmware, ctl.bios, ctl.battery
        )?;
    } else {
        writeln!(out, "    (no vendor data)")?;
    }
    for rec in &ctl.pci.uncorrectable_errors {
        writeln!(out, "    [ue] {}", rec)?;
    }
    for rec in &ctl.pci.correctable_errors {
        writeln!(out, "    [ce] {}", rec)?;
    }

    for ld in &ctl.log_drives {
        write!(out, "    {} {}", ld.name(), size_string(ld.kernel.size_bytes()))?;
        match &ld.raid {
            Some(raid) => writeln!(out, " {} {} {}", raid.level, raid.status, raid.cache_policy)?,
            None => writeln!(out)?,
        }
        for pd in &ld.members {
            write_phy_drive(out, "      ", pd)?;
        }
    }
    for pt in &ctl.passthrough_drives {
        write!(out, "    {} pass-through ", pt.name())?;
        write_phy_drive(out, "", &pt.drive)?;
    }
    for pd in &ctl.unconfigured_drives {
        write!(out, "    unconf ")?;
        write_phy_drive(out, "", pd)?;
    }
    Ok(())
}

fn write_phy_drive(out: &mut String, indent: &str, pd: &PhyDrive) -> fmt::Result {
    writeln!(
        out,
        "{}[{}] {} {} {} {} SN:{}",
        indent,
        pd.pos(),
        pd.status,
        size_string(pd.size),
        pd.form_summary(),
        pd.model,
        pd.serial
    )
}
