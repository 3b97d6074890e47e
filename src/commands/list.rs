//! Implementation of the `locktable list` command.

use super::open_table;
use crate::cli::ListArgs;
use locktable::config::Config;
use locktable::error::{LockTableError, Result};
use locktable::locks::{self, SlotState};

pub fn cmd_list(config: &Config, args: ListArgs) -> Result<()> {
    let mut table = open_table(config)?;
    let slots: Vec<_> = locks::list_locks(&mut table)?
        .into_iter()
        .filter(|info| args.all || info.state != SlotState::Free)
        .collect();

    if args.json {
        let json = serde_json::to_string_pretty(&slots).map_err(|e| {
            LockTableError::UserError(format!("failed to serialize lock list: {}", e))
        })?;
        println!("{}", json);
        return Ok(());
    }

    if slots.is_empty() {
        println!("No held locks.");
        return Ok(());
    }

    println!("Locks in {} ({}):", table.path().display(), slots.len());
    println!();
    println!("{:>4}  {:36}  STATE", "SLOT", "ID");
    for info in &slots {
        println!("{}", info);
    }

    // Summary
    let expired = slots
        .iter()
        .filter(|info| info.state == SlotState::Expired)
        .count();
    if expired > 0 {
        println!();
        println!(
            "Note: {} lease(s) have run out; the next synchronizer pass frees them.",
            expired
        );
    }

    Ok(())
}
