//! Lock lifecycle events.
//!
//! The synchronizer emits a [`LockEvent`] whenever it observes a lock
//! appearing in the table, disappearing from it, or being reclaimed after its
//! lease ran out. Events are delivered to [`LockListener`]s after the
//! synchronizer's state lock has been released, so listeners may call back
//! into the synchronizer.
//!
//! Events serialize to single-line JSON (NDJSON), which is what
//! `locktable monitor` prints:
//!
//! ```text
//! {"ts":"2026-01-01T00:00:00Z","action":"created","id":"...","slot":0,"actor":"me@host:4242"}
//! ```

use crate::error::{LockTableError, Result};
use crate::id::LockId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// What happened to a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// A held record appeared (registered here or observed in the table).
    Created,
    /// A held record was released.
    Deleted,
    /// A held record's lease ran out and the synchronizer freed it.
    Expired,
}

impl EventAction {
    /// Whether waiters blocked on this lock should wake up.
    pub fn releases(&self) -> bool {
        matches!(self, EventAction::Deleted | EventAction::Expired)
    }
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventAction::Created => write!(f, "created"),
            EventAction::Deleted => write!(f, "deleted"),
            EventAction::Expired => write!(f, "expired"),
        }
    }
}

/// A lock lifecycle event.
#[derive(Debug, Clone, Serialize)]
pub struct LockEvent {
    /// When the synchronizer observed the change.
    pub ts: DateTime<Utc>,

    pub action: EventAction,

    pub id: LockId,

    /// Table slot the record lives in, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<usize>,

    /// Process that observed the event (e.g., `user@HOST:PID`).
    pub actor: String,
}

impl LockEvent {
    pub fn new(action: EventAction, id: LockId) -> Self {
        Self {
            ts: Utc::now(),
            action,
            id,
            slot: None,
            actor: ACTOR.clone(),
        }
    }

    pub fn with_slot(mut self, slot: usize) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            LockTableError::UserError(format!("failed to serialize event to JSON: {}", e))
        })
    }
}

/// Receives lock events from a synchronizer.
pub trait LockListener: Send + Sync {
    fn on_event(&self, event: &LockEvent);
}

impl<F> LockListener for F
where
    F: Fn(&LockEvent) + Send + Sync,
{
    fn on_event(&self, event: &LockEvent) {
        self(event)
    }
}

static ACTOR: LazyLock<String> = LazyLock::new(get_actor_string);

/// Get the actor string for event metadata.
fn get_actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}:{}", user, host, std::process::id())
}
