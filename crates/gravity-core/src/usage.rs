//! Usage accounting: request-log writes that never surface failures to the
//! client, plus passthroughs to the store's aggregate queries.

use std::sync::Arc;

use gravity_types::models::{AccountStats, HourlyStat, ModelStats, RequestLogEntry, UsageStats};

use crate::error::AppResult;
use crate::store::Store;

pub struct UsageRecorder {
    store: Arc<Store>,
}

impl UsageRecorder {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Append a request-log row. Failures are logged and swallowed; usage
    /// accounting must never break a client request.
    pub fn log(
        &self,
        account_id: i64,
        model: &str,
        tokens_in: i64,
        tokens_out: i64,
        latency_ms: i64,
        status_code: i64,
    ) {
        if let Err(e) =
            self.store
                .log_request(account_id, model, tokens_in, tokens_out, latency_ms, status_code)
        {
            tracing::warn!("failed to record request log: {}", e);
        }
    }

    pub fn overall(&self) -> AppResult<UsageStats> {
        self.store.overall_stats()
    }

    pub fn models(&self) -> AppResult<Vec<ModelStats>> {
        self.store.model_stats()
    }

    pub fn accounts(&self) -> AppResult<Vec<AccountStats>> {
        self.store.account_stats()
    }

    pub fn hourly(&self) -> AppResult<Vec<HourlyStat>> {
        self.store.hourly_stats()
    }

    pub fn recent(&self, limit: usize) -> AppResult<Vec<RequestLogEntry>> {
        self.store.recent_logs(limit)
    }
}
