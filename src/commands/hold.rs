//! Implementation of the `locktable hold` command.

use super::parse_id;
use crate::cli::HoldArgs;
use locktable::config::Config;
use locktable::error::Result;
use locktable::locks::DistributedLock;
use locktable::sync::Synchronizer;
use std::thread;
use std::time::Duration;

pub fn cmd_hold(config: &Config, args: HoldArgs) -> Result<()> {
    let id = parse_id(&args.id)?;
    let sync = Synchronizer::open(config)?;

    let mut lock = DistributedLock::with_id(&sync, id);
    if let Some(lease_ms) = args.lease_ms {
        lock = lock.with_lease(Duration::from_millis(lease_ms));
    }

    let guard = match args.timeout_ms {
        Some(ms) => lock.guard_for(Duration::from_millis(ms))?,
        None => {
            println!("Waiting for lock '{}'...", id);
            lock.guard()?
        }
    };
    println!("Acquired lock '{}'; holding for {}s.", id, args.seconds);

    thread::sleep(Duration::from_secs(args.seconds));

    guard.release()?;
    println!("Released lock '{}'.", id);
    sync.stop();
    Ok(())
}
