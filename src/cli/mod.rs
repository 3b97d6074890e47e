//! CLI argument parsing for locktable.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Locktable: inspect and drive a file-based cross-process lock table.
///
/// The table is a flat file of fixed-size records shared by every process
/// that coordinates through it:
/// - Each record names a lock identifier and whether it is held
/// - Holders may carry a lease after which the record is reclaimed
/// - Every change happens under a whole-file advisory lock
#[derive(Parser, Debug)]
#[command(name = "locktable")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Lock table file (overrides `table_path` from the config).
    #[arg(long, global = true)]
    pub table: Option<PathBuf>,

    /// Config file (default: `.locktable.yaml` if present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for locktable.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the records in the lock table.
    ///
    /// Shows held and expired slots with their remaining lease.
    List(ListArgs),

    /// Acquire a lock, hold it for a while, then release it.
    Hold(HoldArgs),

    /// Release a lock on behalf of its holder.
    ///
    /// Requires --force flag to prevent accidental releases.
    Release(ReleaseArgs),

    /// Truncate the table if every slot is free.
    Compact,

    /// Stream lock events as NDJSON.
    ///
    /// Prints one line per created, deleted or expired lock until interrupted.
    Monitor(MonitorArgs),

    /// Print a freshly generated lock identifier.
    NewId(NewIdArgs),
}

/// Arguments for the `list` command.
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,

    /// Include free slots.
    #[arg(long)]
    pub all: bool,
}

/// Arguments for the `hold` command.
#[derive(Parser, Debug)]
pub struct HoldArgs {
    /// Identifier to lock (36 characters, e.g. from `locktable new-id`).
    pub id: String,

    /// How long to hold the lock once acquired.
    #[arg(long, default_value_t = 5)]
    pub seconds: u64,

    /// Lease in milliseconds after which the claim expires if never released.
    #[arg(long)]
    pub lease_ms: Option<u64>,

    /// Give up if the lock is not acquired within this many milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

/// Arguments for the `release` command.
#[derive(Parser, Debug)]
pub struct ReleaseArgs {
    /// Identifier whose record should be freed.
    pub id: String,

    /// Force the release (required for safety).
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `monitor` command.
#[derive(Parser, Debug)]
pub struct MonitorArgs {
    /// Reconciliation interval in milliseconds (default: config `poll_interval_ms`).
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Report the current table once and exit.
    #[arg(long)]
    pub once: bool,
}

/// Arguments for the `new-id` command.
#[derive(Parser, Debug)]
pub struct NewIdArgs {
    /// Text the identifier should start with (at most 36 bytes).
    #[arg(long)]
    pub prefix: Option<String>,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
