//! Staleness policy
//!
//! Decides what an instance must do before serving its buffer, given the
//! on-disk entry's modification time and the instance's last sync.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Verdict of the staleness policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheState {
    /// In-memory buffer matches the entry
    Fresh,
    /// Another instance refreshed the entry; read it back
    NeedsReread,
    /// Entry is missing or expired; run the command
    NeedsUpdate,
}

impl CacheState {
    /// Evaluate the policy.
    ///
    /// `entry_mtime` is `None` when no complete entry exists on disk.
    pub fn evaluate(
        entry_mtime: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        timeout: Duration,
        last_sync: DateTime<Utc>,
    ) -> Self {
        let Some(mtime) = entry_mtime else {
            return Self::NeedsUpdate;
        };

        // An unrepresentable expiry never comes
        let expires = TimeDelta::from_std(timeout)
            .ok()
            .and_then(|timeout| mtime.checked_add_signed(timeout));

        if expires.is_some_and(|expires| expires < now) {
            return Self::NeedsUpdate;
        }
        if last_sync < mtime {
            return Self::NeedsReread;
        }
        Self::Fresh
    }
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fresh => write!(f, "fresh"),
            Self::NeedsReread => write!(f, "needs-reread"),
            Self::NeedsUpdate => write!(f, "needs-update"),
        }
    }
}
