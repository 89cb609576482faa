//! Aggregate queries over the request log.

use chrono::{Duration, Utc};
use rusqlite::params;

use gravity_types::models::{AccountStats, HourlyStat, ModelStats, RequestLogEntry, UsageStats};

use crate::error::AppResult;

use super::Store;

impl Store {
    /// Overall usage statistics: totals, success rate, and rolling
    /// 24h/7d/30d request counts.
    pub fn overall_stats(&self) -> AppResult<UsageStats> {
        let conn = self.conn.lock();
        let mut stats = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(tokens_in), 0), COALESCE(SUM(tokens_out), 0),
                    COALESCE(AVG(latency_ms), 0.0)
             FROM request_logs",
            [],
            |row| {
                Ok(UsageStats {
                    total_requests: row.get(0)?,
                    total_tokens_in: row.get(1)?,
                    total_tokens_out: row.get(2)?,
                    avg_latency_ms: row.get(3)?,
                    ..UsageStats::default()
                })
            },
        )?;

        if stats.total_requests > 0 {
            let success: i64 = conn.query_row(
                "SELECT COUNT(*) FROM request_logs WHERE status_code = 200",
                [],
                |row| row.get(0),
            )?;
            stats.success_rate = success as f64 / stats.total_requests as f64 * 100.0;
        }

        let now = Utc::now();
        for (threshold, slot) in [
            (now - Duration::hours(24), &mut stats.requests_today),
            (now - Duration::days(7), &mut stats.requests_this_week),
            (now - Duration::days(30), &mut stats.requests_this_month),
        ] {
            *slot = conn.query_row(
                "SELECT COUNT(*) FROM request_logs WHERE created_at >= ?1",
                params![threshold],
                |row| row.get(0),
            )?;
        }

        Ok(stats)
    }

    pub fn model_stats(&self) -> AppResult<Vec<ModelStats>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT model, COUNT(*), COALESCE(SUM(tokens_in), 0),
                    COALESCE(SUM(tokens_out), 0), COALESCE(AVG(latency_ms), 0.0)
             FROM request_logs
             GROUP BY model
             ORDER BY COUNT(*) DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ModelStats {
                model: row.get(0)?,
                requests: row.get(1)?,
                tokens_in: row.get(2)?,
                tokens_out: row.get(3)?,
                avg_latency_ms: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn account_stats(&self) -> AppResult<Vec<AccountStats>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT r.account_id, a.name, COUNT(*), COALESCE(SUM(r.tokens_in), 0),
                    COALESCE(SUM(r.tokens_out), 0),
                    CAST(SUM(CASE WHEN r.status_code = 200 THEN 1 ELSE 0 END) AS REAL) / COUNT(*) * 100
             FROM request_logs r
             JOIN accounts a ON r.account_id = a.id
             GROUP BY r.account_id
             ORDER BY COUNT(*) DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(AccountStats {
                account_id: row.get(0)?,
                account_name: row.get(1)?,
                requests: row.get(2)?,
                tokens_in: row.get(3)?,
                tokens_out: row.get(4)?,
                success_rate: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Request counts bucketed per hour over the last 24 hours.
    pub fn hourly_stats(&self) -> AppResult<Vec<HourlyStat>> {
        let threshold = Utc::now() - Duration::hours(24);
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT strftime('%Y-%m-%d %H:00', created_at) AS hour, COUNT(*)
             FROM request_logs
             WHERE created_at >= ?1
             GROUP BY hour
             ORDER BY hour",
        )?;
        let rows = stmt.query_map(params![threshold], |row| {
            Ok(HourlyStat { hour: row.get(0)?, requests: row.get(1)? })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// The `limit` most recent log rows joined with the account name.
    pub fn recent_logs(&self, limit: usize) -> AppResult<Vec<RequestLogEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT r.id, r.account_id, a.name, r.model, r.tokens_in, r.tokens_out,
                    r.latency_ms, r.status_code, r.created_at
             FROM request_logs r
             JOIN accounts a ON r.account_id = a.id
             ORDER BY r.created_at DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit], |row| {
            Ok(RequestLogEntry {
                id: row.get(0)?,
                account_id: row.get(1)?,
                account_name: row.get(2)?,
                model: row.get(3)?,
                tokens_in: row.get(4)?,
                tokens_out: row.get(5)?,
                latency_ms: row.get(6)?,
                status_code: row.get(7)?,
                created_at: row.get(8)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

#[cfg(test)]
mod tests {
    use gravity_types::models::AccountInput;

    use super::*;

    fn store_with_account() -> (Store, i64) {
        let store = Store::open_in_memory().unwrap();
        let account = store
            .create(&AccountInput {
                name: "stats".to_string(),
                email: "stats@example.com".to_string(),
                refresh_token: "rt".to_string(),
                account_type: None,
            })
            .unwrap();
        (store, account.id)
    }

    #[test]
    fn test_overall_stats_empty() {
        let (store, _) = store_with_account();
        let stats = store.overall_stats().unwrap();
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.success_rate, 0.0);
    }

    #[test]
    fn test_overall_stats_success_rate() {
        let (store, id) = store_with_account();
        store.log_request(id, "gemini-3-flash", 10, 20, 100, 200).unwrap();
        store.log_request(id, "gemini-3-flash", 10, 20, 100, 200).unwrap();
        store.log_request(id, "gemini-3-flash", 0, 0, 50, 429).unwrap();

        let stats = store.overall_stats().unwrap();
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.total_tokens_in, 20);
        assert_eq!(stats.total_tokens_out, 40);
        assert!((stats.success_rate - 200.0 / 3.0).abs() < 0.01);
        assert_eq!(stats.requests_today, 3);
    }

    #[test]
    fn test_model_and_account_breakdowns() {
        let (store, id) = store_with_account();
        store.log_request(id, "gemini-3-pro-high", 5, 5, 10, 200).unwrap();
        store.log_request(id, "gemini-2.0-flash", 1, 1, 5, 200).unwrap();
        store.log_request(id, "gemini-2.0-flash", 1, 1, 5, 500).unwrap();

        let models = store.model_stats().unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].model, "gemini-2.0-flash");
        assert_eq!(models[0].requests, 2);

        let accounts = store.account_stats().unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].account_name, "stats");
        assert!((accounts[0].success_rate - 200.0 / 3.0).abs() < 0.01);
    }

    #[test]
    fn test_recent_logs_join_and_limit() {
        let (store, id) = store_with_account();
        for i in 0..5 {
            store.log_request(id, "m", i, i, 1, 200).unwrap();
        }
        let logs = store.recent_logs(3).unwrap();
        assert_eq!(logs.len(), 3);
        assert!(logs.iter().all(|l| l.account_name == "stats"));

        let hourly = store.hourly_stats().unwrap();
        assert_eq!(hourly.len(), 1);
        assert_eq!(hourly[0].requests, 5);
    }
}
