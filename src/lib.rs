//! hwinv - Storage Inventory and Health Engine
//!
//! Builds one resolved view of a server's storage from two sources that each
//! see only half of it: the kernel (`/sys` topology of controllers and block
//! devices) and the vendor RAID tools (MegaCli, sas3ircu, hpssacli).
//!
//! # Architecture
//!
//! ```text
//! PCI scan → Topology (kernel stubs) ─┐
//!                                      ├→ Resolver → StorageReport → Health / Reports
//! Vendor adapter (tool output) ───────┘
//! ```
//!
//! # Modules
//!
//! - [`config`] - Inventory configuration (YAML)
//! - [`domain`] - Storage records, health verdicts and ports
//! - [`error`] - Error types
//! - [`hardware`] - sysfs discovery and per-controller dispatch
//! - [`logging`] - Injected, component-tagged logger
//! - [`raidcli`] - Vendor tool plumbing and one adapter per RAID family
//! - [`report`] - `lsraid` / `lsdiag` tables, text tree and JSON
//! - [`resolver`] - Joins kernel stubs with vendor records

pub mod config;
pub mod domain;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod raidcli;
pub mod report;
pub mod resolver;

pub use config::InventoryConfig;
pub use domain::{HealthReporter, StorageReport};
pub use error::{Error, Result};
pub use hardware::InventoryScanner;
pub use resolver::Resolver;
