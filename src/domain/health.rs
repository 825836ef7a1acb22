//! Health Aggregation
//!
//! Every resolved entity gets a two-state verdict, computed once from its
//! record. Drive verdicts roll up into volume verdicts; controller verdicts
//! depend only on PCIe uncorrectable error records.

use serde::{Deserialize, Serialize};

use crate::domain::storage::{
    Drive, LogDrive, PassthroughDrive, PhyDrive, RaidController, ERROR_COUNT_THRESHOLD,
};

/// Health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        *self == HealthStatus::Healthy
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "Healthy"),
            HealthStatus::Unhealthy => write!(f, "Unhealthy"),
        }
    }
}

/// Status plus one diagnostic line per contributing cause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: HealthStatus,
    pub diagnostics: Vec<String>,
}

impl Verdict {
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            diagnostics: Vec::new(),
        }
    }

    /// Unhealthy iff there is at least one cause
    pub fn from_causes(diagnostics: Vec<String>) -> Self {
        let status = if diagnostics.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };
        Self {
            status,
            diagnostics,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status.is_healthy()
    }
}

/// Anything that can report its own health
pub trait HealthReporter {
    fn verdict(&self) -> Verdict;

    fn is_healthy(&self) -> bool {
        self.verdict().is_healthy()
    }

    fn diagnostics(&self) -> Vec<String> {
        self.verdict().diagnostics
    }
}

impl HealthReporter for PhyDrive {
    fn verdict(&self) -> Verdict {
        let mut causes = Vec::new();
        let count = self.error_count();
        if count > ERROR_COUNT_THRESHOLD {
            causes.push(format!(
                "[{}] {}: {} errors exceed threshold {}",
                self.pos(),
                self.model,
                count,
                ERROR_COUNT_THRESHOLD
            ));
        }
        if !self.family.is_good_drive_status(&self.status) {
            causes.push(format!(
                "[{}] {}: status {}",
                self.pos(),
                self.model,
                self.status.trim()
            ));
        }
        Verdict::from_causes(causes)
    }
}

impl HealthReporter for LogDrive {
    fn verdict(&self) -> Verdict {
        let mut causes = Vec::new();
        if let Some(raid) = self.raid.as_ref().filter(|r| r.degraded) {
            causes.push(format!(
                "{}: {} volume degraded ({})",
                self.name(),
                raid.level,
                raid.status
            ));
        }
        for member in &self.members {
            for diag in member.diagnostics() {
                causes.push(format!("{}: {}", self.name(), diag));
            }
        }
        Verdict::from_causes(causes)
    }
}

impl HealthReporter for PassthroughDrive {
    fn verdict(&self) -> Verdict {
        let causes = self
            .drive
            .diagnostics()
            .into_iter()
            .map(|d| format!("{}: {}", self.name(), d))
            .collect();
        Verdict::from_causes(causes)
    }
}

impl HealthReporter for RaidController {
    fn verdict(&self) -> Verdict {
        let causes = self
            .pci
            .uncorrectable_errors
            .iter()
            .map(|rec| format!("[ue] {}", rec))
            .collect();
        Verdict::from_causes(causes)
    }
}

impl HealthReporter for Drive {
    fn verdict(&self) -> Verdict {
        let causes = self
            .error_records
            .iter()
            .map(|rec| format!("{}: {}", self.kernel.name, rec))
            .collect();
        Verdict::from_causes(causes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::storage::{
        KernelStub, PciDevice, RaidFamily, RaidLevel, RaidVolume, SmartRecord,
    };

    fn member(slot: &str, status: &str, media_errors: u32) -> PhyDrive {
        let mut pd = PhyDrive::new(RaidFamily::MegaRaid);
        pd.enclosure = "32".into();
        pd.slot = slot.into();
        pd.model = "ST600MM0088".into();
        pd.status = status.into();
        pd.media_errors = media_errors;
        pd
    }

    fn volume(degraded: bool, members: Vec<PhyDrive>) -> LogDrive {
        LogDrive {
            kernel: KernelStub {
                name: "sda".into(),
                ..Default::default()
            },
            raid: Some(RaidVolume {
                level: RaidLevel::Raid1,
                status: if degraded { "Degraded" } else { "Optimal" }.into(),
                degraded,
                ..Default::default()
            }),
            members,
        }
    }

    #[test]
    fn test_threshold_is_exclusive() {
        assert!(member("0", "Online, Spun Up", 5).is_healthy());

        let pd = member("0", "Online, Spun Up", 6);
        let verdict = pd.verdict();
        assert_eq!(verdict.status, HealthStatus::Unhealthy);
        assert_eq!(verdict.diagnostics.len(), 1);
        assert!(verdict.diagnostics[0].contains("6 errors exceed threshold 5"));
    }

    #[test]
    fn test_bad_status_and_errors_are_separate_causes() {
        let pd = member("3", "Failed", 9);
        let diags = pd.diagnostics();
        assert_eq!(diags.len(), 2);
        assert!(diags[0].starts_with("[32:3]"));
        assert!(diags[1].contains("status Failed"));
    }

    #[test]
    fn test_smart_records_count_towards_threshold() {
        let mut pd = member("1", "Online", 3);
        pd.error_records = vec![SmartRecord::default(); 3];
        assert_eq!(pd.error_count(), 6);
        assert!(!pd.is_healthy());
    }

    #[test]
    fn test_volume_rolls_up_members() {
        let healthy = volume(false, vec![member("0", "Online", 0), member("1", "Online", 0)]);
        assert!(healthy.is_healthy());
        assert!(healthy.diagnostics().is_empty());

        let sick = volume(false, vec![member("0", "Online", 0), member("1", "Online", 6)]);
        let diags = sick.diagnostics();
        assert_eq!(diags.len(), 1);
        assert!(diags[0].starts_with("sda: [32:1]"));
    }

    #[test]
    fn test_degraded_volume() {
        let ld = volume(true, vec![member("0", "Online", 0)]);
        let diags = ld.diagnostics();
        assert_eq!(diags, vec!["sda: RAID 1 volume degraded (Degraded)".to_string()]);
    }

    #[test]
    fn test_bare_stub_is_healthy() {
        assert!(LogDrive::bare(KernelStub::default()).is_healthy());
    }

    #[test]
    fn test_controller_only_counts_uncorrectable() {
        let mut ctrl = RaidController::kernel_only(PciDevice::default(), RaidFamily::SasIr, vec![]);
        ctrl.pci.correctable_errors = vec!["BadTLP: 3".into()];
        assert!(ctrl.is_healthy());

        ctrl.pci.uncorrectable_errors = vec!["SurpriseDown: 1".into()];
        assert_eq!(ctrl.diagnostics(), vec!["[ue] SurpriseDown: 1".to_string()]);

        // a sick volume does not downgrade the controller
        ctrl.pci.uncorrectable_errors.clear();
        ctrl.log_drives.push(volume(true, vec![]));
        assert!(ctrl.is_healthy());
    }

    #[test]
    fn test_passthrough_prefixes_kernel_name() {
        let mut pd = member("7", "Unconfigured(bad)", 0);
        pd.ids.wwn = Some("0x5000c500a1b2c3d4".into());
        let pt = PassthroughDrive {
            kernel: KernelStub {
                name: "sdc".into(),
                ..Default::default()
            },
            drive: pd,
        };
        let diags = pt.diagnostics();
        assert_eq!(diags.len(), 1);
        assert!(diags[0].starts_with("sdc: [32:7]"));
    }
}
