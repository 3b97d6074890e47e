//! Lock table inspection types.

use crate::id::LockId;
use crate::table::LockRecord;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// State of one table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Free,
    Held,
    /// Held, but the lease ran out and no synchronizer has reclaimed it yet.
    Expired,
}

impl SlotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotState::Free => "free",
            SlotState::Held => "held",
            SlotState::Expired => "expired",
        }
    }
}

/// Information about one slot of the lock table.
#[derive(Debug, Clone, Serialize)]
pub struct LockInfo {
    pub slot: usize,

    pub id: LockId,

    pub state: SlotState,

    /// Lease deadline, if the record carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease: Option<DateTime<Utc>>,
}

impl LockInfo {
    pub fn from_record(slot: usize, record: &LockRecord, now: DateTime<Utc>) -> Self {
        let state = if record.is_free() {
            SlotState::Free
        } else if record.is_expired(now) {
            SlotState::Expired
        } else {
            SlotState::Held
        };
        Self {
            slot,
            id: record.id,
            state,
            lease: record.lease_deadline(),
        }
    }

    /// Time left on the lease, if any.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.lease.map(|deadline| deadline.signed_duration_since(now))
    }

    /// Format the remaining lease as a human-readable string.
    pub fn remaining_string(&self, now: DateTime<Utc>) -> Option<String> {
        let remaining = self.remaining(now)?;
        if remaining <= Duration::zero() {
            return Some("expired".to_string());
        }

        let seconds = remaining.num_seconds();
        let minutes = remaining.num_minutes();
        let hours = remaining.num_hours();
        let days = remaining.num_days();

        Some(if days > 0 {
            format!("{}d {}h", days, hours % 24)
        } else if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds % 60)
        } else {
            format!("{}ms", remaining.num_milliseconds())
        })
    }
}

impl std::fmt::Display for LockInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:>4}  {}  {}", self.slot, self.id, self.state.as_str())?;
        if self.state == SlotState::Held
            && let Some(left) = self.remaining_string(Utc::now())
        {
            write!(f, " (lease: {} left)", left)?;
        }
        Ok(())
    }
}
