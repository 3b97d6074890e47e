//! Implementation of the `locktable monitor` command.
//!
//! Subscribes to a synchronizer over the table and prints every event as one
//! NDJSON line on stdout. The first pass reports every lock already held as
//! `created`.

use super::open_table;
use crate::cli::MonitorArgs;
use locktable::config::Config;
use locktable::error::Result;
use locktable::events::{LockEvent, LockListener};
use locktable::id::LockId;
use locktable::sync::Synchronizer;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

pub fn cmd_monitor(config: &Config, args: MonitorArgs) -> Result<()> {
    let mut options = config.sync_options();
    if let Some(ms) = args.interval_ms {
        options.poll_interval = Duration::from_millis(ms.max(1));
    }
    // The monitor never holds anything itself, so keep the loop alive.
    options.stop_when_idle = false;

    let sync = Synchronizer::new(open_table(config)?, options);
    let printer: Arc<dyn LockListener> = Arc::new(print_event);
    sync.subscribe(Arc::clone(&printer))?;

    // Nobody ever holds this identifier; watching it just paces the loop.
    let probe = LockId::random();

    if args.once {
        sync.watch(&probe)?;
        // Joining the worker flushes the events of the pass we waited for.
        sync.stop();
        return Ok(());
    }

    loop {
        sync.watch(&probe)?;
    }
}

fn print_event(event: &LockEvent) {
    let line = match event.to_ndjson_line() {
        Ok(line) => line,
        Err(e) => {
            tracing::warn!(error = %e, "dropping unserializable event");
            return;
        }
    };

    let mut stdout = io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{}", line).and_then(|_| stdout.flush()) {
        tracing::warn!(error = %e, "failed to write event");
    }
}
