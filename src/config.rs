//! Inventory Configuration
//!
//! Every knob has a default that matches a stock Linux install, so an empty
//! YAML file (or no file at all) is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default timeout applied to every vendor tool invocation
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Tool Paths
// =============================================================================

/// Well-known install locations for each vendor tool, searched in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub megacli: Vec<PathBuf>,
    pub sas3ircu: Vec<PathBuf>,
    pub hpacucli: Vec<PathBuf>,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            megacli: vec![
                PathBuf::from("/opt/MegaRAID/MegaCli/MegaCli64"),
                PathBuf::from("/opt/MegaRAID/MegaCli/MegaCli"),
                PathBuf::from("/usr/sbin/megacli"),
            ],
            sas3ircu: vec![
                PathBuf::from("/usr/sbin/sas3ircu"),
                PathBuf::from("/usr/local/sbin/sas3ircu"),
            ],
            hpacucli: vec![
                PathBuf::from("/usr/sbin/hpssacli"),
                PathBuf::from("/usr/sbin/ssacli"),
                PathBuf::from("/usr/sbin/hpacucli"),
            ],
        }
    }
}

// =============================================================================
// Inventory Configuration
// =============================================================================

/// Configuration for a storage inventory run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Root of the sysfs tree (overridable for testing)
    pub sysfs_root: PathBuf,
    /// Vendor tool timeout in seconds
    pub tool_timeout_secs: u64,
    /// Invoke vendor RAID tools at all
    pub raidcli_enabled: bool,
    /// Resolve controllers concurrently instead of in discovery order
    pub parallel: bool,
    /// Vendor tool search paths
    pub tool_paths: ToolPaths,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            sysfs_root: PathBuf::from("/sys"),
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
            raidcli_enabled: true,
            parallel: false,
            tool_paths: ToolPaths::default(),
        }
    }
}

impl InventoryConfig {
    /// Parse a YAML document; missing keys take their defaults
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// Reject values that would make every run fail
    pub fn validate(&self) -> Result<()> {
        if self.tool_timeout_secs == 0 {
            return Err(Error::Config("tool_timeout_secs must be > 0".into()));
        }
        if self.sysfs_root.as_os_str().is_empty() {
            return Err(Error::Config("sysfs_root must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_defaults() {
        let config = InventoryConfig::default();
        assert_eq!(config.sysfs_root, PathBuf::from("/sys"));
        assert_eq!(config.tool_timeout(), Duration::from_secs(30));
        assert!(config.raidcli_enabled);
        assert!(!config.parallel);
        assert_eq!(
            config.tool_paths.megacli[0],
            PathBuf::from("/opt/MegaRAID/MegaCli/MegaCli64")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "tool_timeout_secs: 5\ntool_paths:\n  sas3ircu: [/opt/lsi/sas3ircu]\n";
        let config = InventoryConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.tool_timeout_secs, 5);
        assert_eq!(config.tool_paths.sas3ircu, vec![PathBuf::from("/opt/lsi/sas3ircu")]);
        assert_eq!(config.tool_paths.hpacucli, ToolPaths::default().hpacucli);
        assert_eq!(config.sysfs_root, PathBuf::from("/sys"));
    }

    #[test]
    fn test_empty_yaml() {
        assert_eq!(
            InventoryConfig::from_yaml_str("  \n").unwrap(),
            InventoryConfig::default()
        );
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = InventoryConfig::from_yaml_str("tool_timeout_secs: 0");
        assert_matches!(result, Err(Error::Config(_)));
    }

    #[test]
    fn test_bad_yaml() {
        let result = InventoryConfig::from_yaml_str("tool_timeout_secs: [1, 2]");
        assert_matches!(result, Err(Error::Yaml(_)));
    }
}
