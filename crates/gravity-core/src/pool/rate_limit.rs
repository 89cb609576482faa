//! In-memory tracking of rate-limited accounts.

use std::time::{Duration, SystemTime};

use dashmap::DashMap;

/// One rate-limit record. Invariant: `reset_at >= limited_at`.
#[derive(Debug, Clone)]
pub struct RateLimitEntry {
    pub limited_at: SystemTime,
    pub reset_at: SystemTime,
    pub fail_count: u32,
    pub last_error: Option<String>,
}

/// Tracks which accounts are temporarily unusable. An absent entry, or one
/// whose reset time has passed, means the account is not rate-limited.
#[derive(Default)]
pub struct RateLimitTracker {
    entries: DashMap<i64, RateLimitEntry>,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    /// Mark an account rate-limited until `reset_secs` from now,
    /// incrementing its consecutive failure count.
    pub fn mark_rate_limited(&self, account_id: i64, reset_secs: u64, last_error: Option<String>) {
        let now = SystemTime::now();
        let reset_at = now + Duration::from_secs(reset_secs);
        self.entries
            .entry(account_id)
            .and_modify(|entry| {
                entry.limited_at = now;
                entry.reset_at = reset_at;
                entry.fail_count += 1;
                entry.last_error.clone_from(&last_error);
            })
            .or_insert(RateLimitEntry {
                limited_at: now,
                reset_at,
                fail_count: 1,
                last_error,
            });
    }

    /// True iff an entry exists and its reset time is still in the future.
    pub fn is_rate_limited(&self, account_id: i64) -> bool {
        self.entries
            .get(&account_id)
            .map(|entry| entry.reset_at > SystemTime::now())
            .unwrap_or(false)
    }

    /// Remaining wait in whole seconds (rounded up), 0 when not limited.
    pub fn remaining_wait(&self, account_id: i64) -> u64 {
        let Some(entry) = self.entries.get(&account_id) else {
            return 0;
        };
        match entry.reset_at.duration_since(SystemTime::now()) {
            Ok(remaining) => secs_ceil(remaining),
            Err(_) => 0,
        }
    }

    pub fn get(&self, account_id: i64) -> Option<RateLimitEntry> {
        self.entries.get(&account_id).map(|entry| entry.clone())
    }

    pub fn clear(&self, account_id: i64) -> bool {
        self.entries.remove(&account_id).is_some()
    }

    /// Remove every entry whose reset time has passed; returns the count.
    pub fn sweep_expired(&self) -> usize {
        let now = SystemTime::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.reset_at > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn secs_ceil(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
