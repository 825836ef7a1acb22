//! Domain Layer
//!
//! - **Storage** (`storage.rs`) - controllers, volumes and drives produced by one run
//! - **Health** (`health.rs`) - per-entity verdicts and their roll-up
//! - **Ports** (`ports.rs`) - trait abstractions for vendor tools and drive attributes

pub mod health;
pub mod ports;
pub mod storage;

pub use health::{HealthReporter, HealthStatus, Verdict};
pub use ports::{
    AttributeProvider, CommandRunner, ControllerIdentity, DriveAttributes, LogDriveKey,
    VendorAdapter, VendorController, VendorInventory, VendorLogDrive,
};
pub use storage::{
    canonical_id, ArrayPosition, Battery, DirectController, DirectKind, Drive, DriveIdentity,
    KernelStub, LogDrive, PassthroughDrive, PciAddress, PciDevice, PhyDrive, RaidController,
    RaidFamily, RaidLevel, RaidVolume, ScsiAddress, SmartRecord, StorageReport,
    UnconfiguredDrive, ERROR_COUNT_THRESHOLD,
};
