//! Session fingerprinting and session → account bindings.
//!
//! The fingerprint hashes only the first user message so that every turn of
//! the same conversation lands on the same account.

use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use sha2::{Digest, Sha256};

use gravity_types::protocol::ChatMessage;

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Derive a stable session id from the first user message text.
/// Empty input yields an empty id (stickiness disabled).
pub fn session_id_for(first_user_message: &str) -> String {
    if first_user_message.is_empty() {
        return String::new();
    }
    let mut hasher = Sha256::new();
    hasher.update(first_user_message.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Text of the first user message in an inbound request, used as the
/// session anchor. Array content joins its text blocks.
pub fn first_user_text(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .find(|m| m.role == "user")
        .and_then(|m| m.content.as_ref())
        .map(|content| content.text())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy)]
struct SessionBinding {
    account_id: i64,
    bound_at: SystemTime,
}

/// TTL-bounded map of session id → account id.
pub struct SessionBinder {
    bindings: DashMap<String, SessionBinding>,
    ttl: Duration,
}

impl SessionBinder {
    pub fn new(ttl: Duration) -> Self {
        Self { bindings: DashMap::new(), ttl }
    }

    /// The bound account, if a binding exists and is within TTL.
    /// TTL is validated inline; no sweeper is required for correctness.
    pub fn get(&self, session_id: &str) -> Option<i64> {
        if session_id.is_empty() {
            return None;
        }
        let binding = self.bindings.get(session_id)?;
        let age = SystemTime::now()
            .duration_since(binding.bound_at)
            .unwrap_or(Duration::ZERO);
        if age > self.ttl {
            return None;
        }
        Some(binding.account_id)
    }

    pub fn bind(&self, session_id: &str, account_id: i64) {
        if session_id.is_empty() {
            return;
        }
        self.bindings.insert(
            session_id.to_string(),
            SessionBinding { account_id, bound_at: SystemTime::now() },
        );
    }

    pub fn unbind(&self, session_id: &str) {
        self.bindings.remove(session_id);
    }

    /// Delete all bindings older than the TTL; returns the count removed.
    pub fn sweep_expired(&self) -> usize {
        let now = SystemTime::now();
        let before = self.bindings.len();
        self.bindings.retain(|_, binding| {
            now.duration_since(binding.bound_at).unwrap_or(Duration::ZERO) <= self.ttl
        });
        before - self.bindings.len()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl Default for SessionBinder {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}
