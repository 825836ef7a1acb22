//! Vendor RAID Tool Adapters
//!
//! Shared plumbing for the per-family adapters: running a vendor binary under
//! a timeout, finding it on disk, and the small text helpers every parser of
//! `key : value` style output needs.
//!
//! | Family | Drivers | Tool |
//! |--------|---------|------|
//! | MegaRAID | `megaraid*` | `MegaCli64` |
//! | SAS-IR | `mpt*` | `sas3ircu` |
//! | Smart Array | `hpsa*`, `hpvsa*` | `hpssacli` |

pub mod hpacucli;
pub mod megacli;
pub mod sas3ircu;

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::InventoryConfig;
use crate::domain::ports::{CommandRunner, VendorAdapter};
use crate::domain::storage::{canonical_id, RaidFamily};
use crate::error::{Error, Result};
use crate::logging::Logger;

pub use hpacucli::HpAcuCli;
pub use megacli::MegaCli;
pub use sas3ircu::Sas3Ircu;

// =============================================================================
// Process Runner
// =============================================================================

/// Runs vendor binaries as child processes, killed when the timeout elapses
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
    log: Logger,
}

impl ProcessRunner {
    pub fn new(timeout: Duration, log: Logger) -> Self {
        Self { timeout, log }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &Path, args: &[&str]) -> Result<String> {
        let command = format!("{} {}", program.display(), args.join(" "));
        self.log.debug(format_args!("running {}", command));

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::CommandTimeout {
                    command,
                    timeout: self.timeout,
                })
            }
        };

        if !output.status.success() {
            return Err(Error::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// =============================================================================
// Tool Handle
// =============================================================================

/// First existing path among the well-known install locations
pub fn locate_tool(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|p| p.is_file()).cloned()
}

/// A located (or missing) vendor binary plus the runner used to invoke it
#[derive(Clone)]
pub struct ToolHandle {
    family: RaidFamily,
    binary: Option<PathBuf>,
    runner: Arc<dyn CommandRunner>,
}

impl ToolHandle {
    pub fn new(family: RaidFamily, binary: Option<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            family,
            binary,
            runner,
        }
    }

    pub fn is_available(&self) -> bool {
        self.binary.is_some()
    }

    pub fn binary(&self) -> Option<&Path> {
        self.binary.as_deref()
    }

    pub async fn run(&self, args: &[&str]) -> Result<String> {
        let binary = self.binary.as_deref().ok_or_else(|| Error::ToolUnavailable {
            tool: self.family.tool_name().to_string(),
        })?;
        let out = self.runner.run(binary, args).await?;
        if out.trim().is_empty() {
            return Err(Error::unparseable(self.family.tool_name(), "empty output"));
        }
        Ok(out)
    }
}

impl std::fmt::Debug for ToolHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolHandle")
            .field("family", &self.family)
            .field("binary", &self.binary)
            .finish()
    }
}

// =============================================================================
// Adapter Set
// =============================================================================

/// One adapter per RAID family
#[derive(Clone)]
pub struct AdapterSet {
    adapters: Vec<Arc<dyn VendorAdapter>>,
}

impl AdapterSet {
    pub fn new(adapters: Vec<Arc<dyn VendorAdapter>>) -> Self {
        Self { adapters }
    }

    /// Locate every family's binary from the configured paths
    pub fn from_config(config: &InventoryConfig, runner: Arc<dyn CommandRunner>, log: &Logger) -> Self {
        let paths = &config.tool_paths;
        Self::new(vec![
            Arc::new(MegaCli::new(
                ToolHandle::new(RaidFamily::MegaRaid, locate_tool(&paths.megacli), runner.clone()),
                log.child("megacli"),
            )),
            Arc::new(Sas3Ircu::new(
                ToolHandle::new(RaidFamily::SasIr, locate_tool(&paths.sas3ircu), runner.clone()),
                log.child("sas3ircu"),
            )),
            Arc::new(HpAcuCli::new(
                ToolHandle::new(RaidFamily::SmartArray, locate_tool(&paths.hpacucli), runner),
                log.child("hpacucli"),
            )),
        ])
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn for_family(&self, family: RaidFamily) -> Option<Arc<dyn VendorAdapter>> {
        self.adapters.iter().find(|a| a.family() == family).cloned()
    }
}

// =============================================================================
// Text Helpers
// =============================================================================

/// Number base used by a tool when it prints sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Base {
    Decimal,
    Binary,
}

impl Base {
    fn value(&self) -> f64 {
        match self {
            Base::Decimal => 1000.0,
            Base::Binary => 1024.0,
        }
    }
}

/// Split `key <delim> value` at the first delimiter, trimming both halves
pub fn split_key_val<'a>(line: &'a str, delim: &str) -> Option<(&'a str, &'a str)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (key, val) = line.split_once(delim)?;
    Some((key.trim(), val.trim()))
}

/// Multiplier for the first unit found in `text`, 0 when there is none
pub fn unit_multiplier(text: &str, base: Base) -> f64 {
    const UNITS: [&str; 6] = ["KB", "MB", "GB", "TB", "PB", "EB"];
    UNITS
        .iter()
        .position(|u| text.contains(u))
        .map(|i| base.value().powi(i as i32 + 1))
        .unwrap_or(0.0)
}

/// `"222.585 GB"` → bytes
pub fn parse_size(text: &str, base: Base) -> u64 {
    let Some(first) = text.split_whitespace().next() else {
        return 0;
    };
    match first.parse::<f64>() {
        Ok(n) => (n * unit_multiplier(text, base)) as u64,
        Err(_) => 0,
    }
}

/// Collapse runs of whitespace into single spaces
pub fn shape_spaced(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First comma-separated token when it names a write policy
pub fn parse_cache_policy(text: &str) -> String {
    let first = text.split(',').next().unwrap_or("").trim();
    if first.to_ascii_lowercase().contains("write") {
        first.to_string()
    } else {
        "unknown".to_string()
    }
}

/// SAS address in the kernel's spelling: `0x` + lowercase hex, no dashes
pub fn normalize_sas_address(text: &str) -> Option<String> {
    canonical_id(text)
}

/// WWN in the kernel's spelling
pub fn normalize_wwn(text: &str) -> Option<String> {
    canonical_id(text)
}

/// Keep the first value seen for each key; report the rest
pub(crate) fn first_wins<K, V, F>(items: Vec<V>, key: F, log: &Logger) -> Vec<V>
where
    K: PartialEq + std::fmt::Debug,
    F: Fn(&V) -> K,
{
    let mut kept: Vec<V> = Vec::with_capacity(items.len());
    for item in items {
        let k = key(&item);
        if kept.iter().any(|seen| key(seen) == k) {
            log.debug(format_args!("duplicate key {:?} dropped, keeping the first", k));
            continue;
        }
        kept.push(item);
    }
    kept
}
