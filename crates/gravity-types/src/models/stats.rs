//! Usage accounting models derived from the request log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UsageStats {
    pub total_requests: i64,
    pub total_tokens_in: i64,
    pub total_tokens_out: i64,
    pub avg_latency_ms: f64,
    /// Percentage of rows with `status_code = 200`; zero when no rows.
    pub success_rate: f64,
    pub requests_today: i64,
    pub requests_this_week: i64,
    pub requests_this_month: i64,
}

/// Per-model breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStats {
    pub model: String,
    pub requests: i64,
    pub tokens_in: i64,
    pub tokens_out: i64,
    pub avg_latency_ms: f64,
}

/// Per-account breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountStats {
    pub account_id: i64,
    pub account_name: String,
    pub requests: i64,
    pub tokens_in: i64,
    pub tokens_out: i64,
    pub success_rate: f64,
}

/// One bucket of the hourly histogram for the last 24 hours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyStat {
    pub hour: String,
    pub requests: i64,
}

/// A recent request-log row joined with the account name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLogEntry {
    pub id: i64,
    pub account_id: i64,
    pub account_name: String,
    pub model: String,
    pub tokens_in: i64,
    pub tokens_out: i64,
    pub latency_ms: i64,
    pub status_code: i64,
    pub created_at: DateTime<Utc>,
}
