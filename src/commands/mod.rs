//! Command implementations for locktable.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Every command works on the table named by the resolved
//! config.

mod hold;
mod list;
mod monitor;

use crate::cli::{Command, NewIdArgs, ReleaseArgs};
use locktable::config::Config;
use locktable::error::{LockTableError, Result};
use locktable::id::LockId;
use locktable::locks;
use locktable::sync::Synchronizer;
use locktable::table::FileTable;

/// Dispatch a command to its implementation.
pub fn dispatch(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::List(args) => list::cmd_list(config, args),
        Command::Hold(args) => hold::cmd_hold(config, args),
        Command::Release(args) => cmd_release(config, args),
        Command::Compact => cmd_compact(config),
        Command::Monitor(args) => monitor::cmd_monitor(config, args),
        Command::NewId(args) => cmd_new_id(args),
    }
}

/// Open the table file named by the config.
pub(crate) fn open_table(config: &Config) -> Result<FileTable> {
    Ok(FileTable::open(&config.table_path)?.with_sync_writes(config.sync_writes))
}

pub(crate) fn parse_id(raw: &str) -> Result<LockId> {
    raw.parse().map_err(|e: LockTableError| {
        LockTableError::UserError(format!(
            "{}\n\nIdentifiers are exactly 36 characters; generate one with `locktable new-id`.",
            e
        ))
    })
}

fn cmd_release(config: &Config, args: ReleaseArgs) -> Result<()> {
    // Require --force flag
    if !args.force {
        return Err(LockTableError::UserError(format!(
            "refusing to release lock without --force flag.\n\n\
             Releasing a lock on behalf of a live holder breaks mutual exclusion.\n\
             Only release locks whose holder has crashed.\n\n\
             To release the lock, run:\n  locktable release {} --force",
            args.id
        )));
    }

    let id = parse_id(&args.id)?;
    let sync = Synchronizer::open(config)?;
    if sync.unregister(&id)? {
        tracing::info!(id = %id, "lock force-released");
        println!("Released lock '{}'.", id);
    } else {
        println!("Lock '{}' is not held.", id);
    }
    Ok(())
}

fn cmd_compact(config: &Config) -> Result<()> {
    let mut table = open_table(config)?;
    match locks::compact_table(&mut table)? {
        Some(0) => println!("Lock table is already empty."),
        Some(dropped) => println!("Compacted lock table: dropped {} free slot(s).", dropped),
        None => println!("Lock table still has held locks; nothing to compact."),
    }
    Ok(())
}

fn cmd_new_id(args: NewIdArgs) -> Result<()> {
    let id = match args.prefix {
        Some(prefix) => LockId::with_prefix(prefix)?,
        None => LockId::random(),
    };
    println!("{}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{ListArgs, MonitorArgs};
    use locktable::table::RECORD_LEN;
    use tempfile::TempDir;

    fn temp_config() -> (TempDir, Config) {
        let temp = TempDir::new().unwrap();
        let config = Config {
            table_path: temp.path().join("locks").to_string_lossy().into_owned(),
            ..Config::default()
        };
        (temp, config)
    }

    #[test]
    fn parse_id_rejects_short_identifiers() {
        let err = parse_id("too-short").unwrap_err();
        assert!(matches!(err, LockTableError::UserError(_)));
        assert!(err.to_string().contains("new-id"));

        let id = LockId::random();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn release_requires_force() {
        let (_temp, config) = temp_config();
        let result = cmd_release(
            &config,
            ReleaseArgs {
                id: LockId::random().to_string(),
                force: false,
            },
        );
        assert!(matches!(result, Err(LockTableError::UserError(_))));
    }

    #[test]
    fn release_frees_a_held_lock() {
        let (_temp, config) = temp_config();
        let sync = Synchronizer::open(&config).unwrap();
        let id = LockId::random();
        sync.register(&id, None).unwrap();

        cmd_release(
            &config,
            ReleaseArgs {
                id: id.to_string(),
                force: true,
            },
        )
        .unwrap();

        assert!(sync.register(&id, None).unwrap());
    }

    #[test]
    fn compact_truncates_free_table() {
        let (_temp, config) = temp_config();
        let sync = Synchronizer::open(&config).unwrap();
        let id = LockId::random();
        sync.register(&id, None).unwrap();
        sync.unregister(&id).unwrap();
        assert_eq!(
            std::fs::metadata(&config.table_path).unwrap().len(),
            RECORD_LEN as u64
        );

        cmd_compact(&config).unwrap();
        assert_eq!(std::fs::metadata(&config.table_path).unwrap().len(), 0);
    }

    #[test]
    fn new_id_rejects_long_prefix() {
        let result = cmd_new_id(NewIdArgs {
            prefix: Some("p".repeat(40)),
        });
        assert!(matches!(result, Err(LockTableError::InvalidIdentifier(_))));
    }

    #[test]
    fn list_and_monitor_once_run_on_empty_table() {
        let (_temp, config) = temp_config();
        list::cmd_list(
            &config,
            ListArgs {
                json: true,
                all: true,
            },
        )
        .unwrap();
        monitor::cmd_monitor(
            &config,
            MonitorArgs {
                interval_ms: Some(5),
                once: true,
            },
        )
        .unwrap();
    }

    #[test]
    fn list_prints_held_locks_as_text() {
        let (_temp, config) = temp_config();
        let sync = Synchronizer::open(&config).unwrap();
        sync.register(&LockId::random(), None).unwrap();

        list::cmd_list(
            &config,
            ListArgs {
                json: false,
                all: false,
            },
        )
        .unwrap();
        sync.stop();
    }

    #[test]
    fn hold_with_timeout_fails_while_held_elsewhere() {
        let (_temp, config) = temp_config();
        let sync = Synchronizer::open(&config).unwrap();
        let id = LockId::random();
        sync.register(&id, None).unwrap();

        let result = hold::cmd_hold(
            &config,
            crate::cli::HoldArgs {
                id: id.to_string(),
                seconds: 0,
                lease_ms: None,
                timeout_ms: Some(50),
            },
        );
        assert!(matches!(result, Err(LockTableError::LockTimeout(_))));
    }
}
