//! Account selection: tier/quota-ordered, rate-limit-masked, and
//! session-sticky, with a starvation fallback so selection never fails
//! while any active account exists.

use std::sync::Arc;

use gravity_types::models::{Account, AccountStatus};

use crate::error::{AppError, AppResult};
use crate::store::Store;

use super::rate_limit::RateLimitTracker;
use super::session::SessionBinder;

pub struct AccountSelector {
    store: Arc<Store>,
    tracker: Arc<RateLimitTracker>,
    sessions: Arc<SessionBinder>,
    /// Serializes the decision window so two racing requests cannot both
    /// observe the same "first healthy" account and duplicate a binding.
    lock: tokio::sync::Mutex<()>,
}

impl AccountSelector {
    pub fn new(
        store: Arc<Store>,
        tracker: Arc<RateLimitTracker>,
        sessions: Arc<SessionBinder>,
    ) -> Self {
        Self { store, tracker, sessions, lock: tokio::sync::Mutex::new(()) }
    }

    pub fn tracker(&self) -> &RateLimitTracker {
        &self.tracker
    }

    pub fn sessions(&self) -> &SessionBinder {
        &self.sessions
    }

    /// Pick the account for one request. An empty `session_id` disables
    /// stickiness. Order of preference:
    /// 1. the session's bound account, when still active and not limited;
    /// 2. the first non-limited account in store order;
    /// 3. when every account is limited, the one with the shortest wait.
    pub async fn select_next(&self, session_id: &str) -> AppResult<Account> {
        let _guard = self.lock.lock().await;

        let accounts = self.store.get_active_accounts()?;
        if accounts.is_empty() {
            return Err(AppError::NoAccountsAvailable);
        }

        if !session_id.is_empty() {
            if let Some(bound_id) = self.sessions.get(session_id) {
                if let Some(account) = accounts.iter().find(|a| a.id == bound_id) {
                    if !self.tracker.is_rate_limited(account.id) {
                        self.touch(account.id);
                        return Ok(account.clone());
                    }
                }
                self.sessions.unbind(session_id);
            }
        }

        if let Some(account) = accounts.iter().find(|a| !self.tracker.is_rate_limited(a.id)) {
            self.sessions.bind(session_id, account.id);
            self.touch(account.id);
            return Ok(account.clone());
        }

        // Every account is rate-limited: take the one closest to reset so
        // selection never fails while an active account exists.
        let account = accounts
            .iter()
            .min_by_key(|a| self.tracker.remaining_wait(a.id))
            .ok_or(AppError::NoAccountsAvailable)?;
        self.sessions.bind(session_id, account.id);
        self.touch(account.id);
        Ok(account.clone())
    }

    fn touch(&self, account_id: i64) {
        if let Err(e) = self.store.update_last_used(account_id) {
            tracing::warn!("failed to update last_used for account {}: {}", account_id, e);
        }
    }

    /// Classify an upstream failure for `account_id`:
    /// 429 → rate-limited 60 s; 500/503 → rate-limited 10 s;
    /// 401 → status expired; 403 → status banned; anything else is ignored.
    pub fn mark_error(&self, account_id: i64, status_code: u16) {
        match status_code {
            429 => self.tracker.mark_rate_limited(
                account_id,
                60,
                Some(format!("HTTP {}", status_code)),
            ),
            500 | 503 => self.tracker.mark_rate_limited(
                account_id,
                10,
                Some(format!("HTTP {}", status_code)),
            ),
            401 => self.set_status(account_id, AccountStatus::Expired),
            403 => self.set_status(account_id, AccountStatus::Banned),
            _ => {}
        }
    }

    pub fn mark_success(&self, account_id: i64) {
        self.tracker.clear(account_id);
    }

    fn set_status(&self, account_id: i64, status: AccountStatus) {
        if let Err(e) = self.store.update_status(account_id, status) {
            tracing::warn!(
                "failed to set account {} status to {}: {}",
                account_id,
                status.as_str(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use gravity_types::models::{AccountInput, AccountType};

    use super::*;

    fn pool() -> (Arc<Store>, AccountSelector) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let selector = AccountSelector::new(
            store.clone(),
            Arc::new(RateLimitTracker::new()),
            Arc::new(SessionBinder::default()),
        );
        (store, selector)
    }

    fn seed_active(store: &Store, name: &str, tier: AccountType) -> Account {
        let account = store
            .create(&AccountInput {
                name: name.to_string(),
                email: format!("{name}@example.com"),
                refresh_token: "rt".to_string(),
                account_type: Some(tier),
            })
            .unwrap();
        store.update_status(account.id, AccountStatus::Active).unwrap();
        store.get(account.id).unwrap()
    }

    #[tokio::test]
    async fn test_empty_pool_fails() {
        let (_, selector) = pool();
        assert!(matches!(
            selector.select_next("").await,
            Err(AppError::NoAccountsAvailable)
        ));
    }

    #[tokio::test]
    async fn test_prefers_higher_tier_and_sets_last_used() {
        let (store, selector) = pool();
        seed_active(&store, "free", AccountType::Free);
        let pro = seed_active(&store, "pro", AccountType::Pro);

        let picked = selector.select_next("").await.unwrap();
        assert_eq!(picked.id, pro.id);
        assert!(store.get(pro.id).unwrap().last_used_at.is_some());
    }

    #[tokio::test]
    async fn test_skips_rate_limited_accounts() {
        let (store, selector) = pool();
        let pro = seed_active(&store, "pro", AccountType::Pro);
        let free = seed_active(&store, "free", AccountType::Free);

        selector.tracker().mark_rate_limited(pro.id, 60, None);
        let picked = selector.select_next("").await.unwrap();
        assert_eq!(picked.id, free.id);
    }

    #[tokio::test]
    async fn test_starvation_fallback_returns_soonest_reset() {
        let (store, selector) = pool();
        let a = seed_active(&store, "a", AccountType::Pro);
        let b = seed_active(&store, "b", AccountType::Pro);

        selector.tracker().mark_rate_limited(a.id, 120, None);
        selector.tracker().mark_rate_limited(b.id, 5, None);

        let picked = selector.select_next("").await.unwrap();
        assert_eq!(picked.id, b.id);
    }

    #[tokio::test]
    async fn test_single_rate_limited_account_still_returned() {
        let (store, selector) = pool();
        let only = seed_active(&store, "only", AccountType::Free);
        selector.tracker().mark_rate_limited(only.id, 60, None);

        let picked = selector.select_next("").await.unwrap();
        assert_eq!(picked.id, only.id);
    }

    #[tokio::test]
    async fn test_session_stickiness_survives_better_accounts() {
        let (store, selector) = pool();
        let free = seed_active(&store, "free", AccountType::Free);

        let first = selector.select_next("sess-1").await.unwrap();
        assert_eq!(first.id, free.id);

        // A better account appears; the bound session stays put.
        let ultra = seed_active(&store, "ultra", AccountType::Ultra);
        let second = selector.select_next("sess-1").await.unwrap();
        assert_eq!(second.id, free.id);

        // A fresh session gets the better account.
        let third = selector.select_next("sess-2").await.unwrap();
        assert_eq!(third.id, ultra.id);
    }

    #[tokio::test]
    async fn test_rate_limited_binding_is_dropped_and_rebound() {
        let (store, selector) = pool();
        let a = seed_active(&store, "a", AccountType::Pro);
        let b = seed_active(&store, "b", AccountType::Free);

        let first = selector.select_next("sess").await.unwrap();
        assert_eq!(first.id, a.id);

        selector.tracker().mark_rate_limited(a.id, 60, None);
        let second = selector.select_next("sess").await.unwrap();
        assert_eq!(second.id, b.id);
        assert_eq!(selector.sessions().get("sess"), Some(b.id));
    }

    #[tokio::test]
    async fn test_mark_error_classification() {
        let (store, selector) = pool();
        let a = seed_active(&store, "a", AccountType::Pro);

        selector.mark_error(a.id, 429);
        assert!(selector.tracker().is_rate_limited(a.id));
        let wait = selector.tracker().remaining_wait(a.id);
        assert!(wait > 50 && wait <= 60);

        selector.mark_success(a.id);
        assert!(!selector.tracker().is_rate_limited(a.id));

        selector.mark_error(a.id, 503);
        assert!(selector.tracker().remaining_wait(a.id) <= 10);
        selector.mark_success(a.id);

        selector.mark_error(a.id, 418);
        assert!(!selector.tracker().is_rate_limited(a.id));
        assert_eq!(store.get(a.id).unwrap().status, AccountStatus::Active);

        selector.mark_error(a.id, 401);
        assert_eq!(store.get(a.id).unwrap().status, AccountStatus::Expired);

        selector.mark_error(a.id, 403);
        assert_eq!(store.get(a.id).unwrap().status, AccountStatus::Banned);
    }

    #[tokio::test]
    async fn test_never_returns_inactive_account() {
        let (store, selector) = pool();
        let a = seed_active(&store, "a", AccountType::Pro);
        store.update_status(a.id, AccountStatus::Banned).unwrap();

        assert!(matches!(
            selector.select_next("").await,
            Err(AppError::NoAccountsAvailable)
        ));
    }
}
