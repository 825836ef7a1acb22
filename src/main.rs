//! hwinv CLI
//!
//! ```text
//! hwinv report [--json]   full inventory as a text tree or JSON
//! hwinv lsraid            physical drives behind RAID controllers
//! hwinv lsdiag            health check; exit code 1 when anything is unhealthy
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hwinv::config::InventoryConfig;
use hwinv::hardware::InventoryScanner;
use hwinv::logging::Logger;
use hwinv::report;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Storage inventory and health diagnostics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// YAML configuration file
    #[arg(long, global = true, env = "HWINV_CONFIG")]
    config: Option<PathBuf>,

    /// Root of the sysfs tree
    #[arg(long, global = true, env = "HWINV_SYSFS_ROOT")]
    sysfs_root: Option<PathBuf>,

    /// Do not invoke vendor RAID tools
    #[arg(long, global = true, env = "HWINV_NO_RAIDCLI")]
    no_raidcli: bool,

    /// Vendor tool timeout in seconds
    #[arg(long, global = true, env = "HWINV_TOOL_TIMEOUT")]
    tool_timeout: Option<u64>,

    /// Resolve controllers concurrently
    #[arg(long, global = true, env = "HWINV_PARALLEL")]
    parallel: bool,

    /// Log level
    #[arg(long, global = true, env = "LOG_LEVEL", value_enum, ignore_case = true, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,

    /// Output logs as JSON
    #[arg(long, global = true, env = "LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Print the full inventory
    Report {
        /// Emit JSON instead of a text tree
        #[arg(long)]
        json: bool,
    },
    /// List physical drives behind RAID controllers
    Lsraid,
    /// Check storage health
    Lsdiag,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

const EXIT_UNHEALTHY: u8 = 1;

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_logging(&args);

    let config = build_config(&args)?;
    debug!(?config, "effective configuration");

    let scanner = InventoryScanner::from_config(config, Logger::current("scanner"));
    let inventory = scanner.scan().await.context("storage scan failed")?;

    match args.command {
        Command::Report { json: true } => {
            println!("{}", report::to_json(&inventory).context("JSON encoding failed")?);
        }
        Command::Report { json: false } => {
            print!("{}", report::text_tree(&inventory).context("text rendering failed")?);
        }
        Command::Lsraid => {
            let tbl = report::lsraid_table(&inventory);
            if !tbl.is_empty() {
                print!("{}", tbl);
            }
        }
        Command::Lsdiag => {
            print!("{}", report::lsdiag_table(&inventory));
            if !inventory.is_healthy() {
                return Ok(ExitCode::from(EXIT_UNHEALTHY));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Configuration file (if any) with command-line overrides applied
fn build_config(args: &Args) -> anyhow::Result<InventoryConfig> {
    let mut config = match &args.config {
        Some(path) => InventoryConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => InventoryConfig::default(),
    };

    if let Some(root) = &args.sysfs_root {
        config.sysfs_root = root.clone();
    }
    if let Some(secs) = args.tool_timeout {
        config.tool_timeout_secs = secs;
    }
    if args.no_raidcli {
        config.raidcli_enabled = false;
    }
    if args.parallel {
        config.parallel = true;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(args: &Args) {
    let level = Level::from(args.log_level);
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // stdout carries the report
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_file_defaults() {
        let args = Args::parse_from([
            "hwinv",
            "lsdiag",
            "--sysfs-root",
            "/tmp/sys",
            "--tool-timeout",
            "5",
            "--no-raidcli",
        ]);
        assert_eq!(args.command, Command::Lsdiag);

        let config = build_config(&args).unwrap();
        assert_eq!(config.sysfs_root, PathBuf::from("/tmp/sys"));
        assert_eq!(config.tool_timeout_secs, 5);
        assert!(!config.raidcli_enabled);
        assert!(!config.parallel);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let args = Args::parse_from(["hwinv", "report", "--tool-timeout", "0"]);
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn test_report_json_flag() {
        let args = Args::parse_from(["hwinv", "report", "--json"]);
        assert_eq!(args.command, Command::Report { json: true });
    }

    #[test]
    fn test_log_level_is_validated() {
        let args = Args::parse_from(["hwinv", "lsdiag", "--log-level", "DEBUG"]);
        assert_eq!(Level::from(args.log_level), Level::DEBUG);

        let err = Args::try_parse_from(["hwinv", "lsdiag", "--log-level", "loud"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }
}
