//! SQLite-backed persistence for accounts and request logs.
//!
//! The store exclusively owns both tables. Writes are durable before the
//! call returns; the connection is serialized behind a mutex.

mod stats;

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};

use gravity_types::models::{Account, AccountExport, AccountInput, AccountStatus, AccountType};

use crate::error::{AppError, AppResult};

const ACCOUNT_COLUMNS: &str = "id, name, email, refresh_token, access_token, token_expiry, \
     status, account_type, created_at, updated_at, last_used_at, \
     quota_used, quota_limit, quota_reset_at";

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (and migrate) the database at `path`, creating parent
    /// directories as needed.
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::migrate(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::migrate(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn migrate(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT,
                refresh_token TEXT NOT NULL,
                access_token TEXT,
                token_expiry TEXT,
                status TEXT NOT NULL DEFAULT 'unknown',
                account_type TEXT NOT NULL DEFAULT 'free',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                last_used_at TEXT,
                quota_used INTEGER NOT NULL DEFAULT 0,
                quota_limit INTEGER NOT NULL DEFAULT 0,
                quota_reset_at TEXT
            );

            CREATE TABLE IF NOT EXISTS request_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER,
                model TEXT,
                tokens_in INTEGER,
                tokens_out INTEGER,
                latency_ms INTEGER,
                status_code INTEGER,
                created_at TEXT NOT NULL,
                FOREIGN KEY (account_id) REFERENCES accounts(id)
            );

            CREATE INDEX IF NOT EXISTS idx_accounts_status ON accounts(status);
            CREATE INDEX IF NOT EXISTS idx_request_logs_account ON request_logs(account_id);
            CREATE INDEX IF NOT EXISTS idx_request_logs_created ON request_logs(created_at);",
        )
    }

    fn map_account(row: &Row<'_>) -> rusqlite::Result<Account> {
        let status: String = row.get(6)?;
        let account_type: String = row.get(7)?;
        Ok(Account {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            refresh_token: row.get(3)?,
            access_token: row.get(4)?,
            token_expiry: row.get(5)?,
            status: AccountStatus::parse(&status),
            account_type: AccountType::parse(&account_type),
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
            last_used_at: row.get(10)?,
            quota_used: row.get(11)?,
            quota_limit: row.get(12)?,
            quota_reset_at: row.get(13)?,
        })
    }

    /// All accounts, ordered by id.
    pub fn list(&self) -> AppResult<Vec<Account>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY id"))?;
        let rows = stmt.query_map([], Self::map_account)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get(&self, id: i64) -> AppResult<Account> {
        let conn = self.conn.lock();
        let result = conn.query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
            [id],
            Self::map_account,
        );
        match result {
            Ok(account) => Ok(account),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(AppError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    pub fn create(&self, input: &AccountInput) -> AppResult<Account> {
        let now = Utc::now();
        let account_type = input.account_type.unwrap_or(AccountType::Free);
        let id = {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO accounts (name, email, refresh_token, account_type, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    input.name,
                    input.email,
                    input.refresh_token,
                    account_type.as_str(),
                    AccountStatus::Unknown.as_str(),
                    now,
                ],
            )?;
            conn.last_insert_rowid()
        };
        self.get(id)
    }

    pub fn update(&self, id: i64, input: &AccountInput) -> AppResult<Account> {
        let account_type = input.account_type.unwrap_or(AccountType::Free);
        {
            let conn = self.conn.lock();
            let changed = conn.execute(
                "UPDATE accounts SET name = ?1, email = ?2, refresh_token = ?3, account_type = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![
                    input.name,
                    input.email,
                    input.refresh_token,
                    account_type.as_str(),
                    Utc::now(),
                    id,
                ],
            )?;
            if changed == 0 {
                return Err(AppError::NotFound);
            }
        }
        self.get(id)
    }

    pub fn delete(&self, id: i64) -> AppResult<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM accounts WHERE id = ?1", [id])?;
        Ok(())
    }

    pub fn update_status(&self, id: i64, status: AccountStatus) -> AppResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE accounts SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), Utc::now(), id],
        )?;
        Ok(())
    }

    pub fn update_token(
        &self,
        id: i64,
        access_token: &str,
        expiry: DateTime<Utc>,
    ) -> AppResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE accounts SET access_token = ?1, token_expiry = ?2, updated_at = ?3 WHERE id = ?4",
            params![access_token, expiry, Utc::now(), id],
        )?;
        Ok(())
    }

    pub fn update_last_used(&self, id: i64) -> AppResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE accounts SET last_used_at = ?1 WHERE id = ?2",
            params![Utc::now(), id],
        )?;
        Ok(())
    }

    pub fn update_quota(
        &self,
        id: i64,
        used: i64,
        limit: i64,
        reset_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE accounts SET quota_used = ?1, quota_limit = ?2, quota_reset_at = ?3, updated_at = ?4
             WHERE id = ?5",
            params![used, limit, reset_at, Utc::now(), id],
        )?;
        Ok(())
    }

    pub fn update_account_type(&self, id: i64, account_type: AccountType) -> AppResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE accounts SET account_type = ?1, updated_at = ?2 WHERE id = ?3",
            params![account_type.as_str(), Utc::now(), id],
        )?;
        Ok(())
    }

    /// Accounts with `status = active`, in selection order:
    /// tier rank, remaining quota descending, least recently used first
    /// (never-used accounts lead).
    pub fn get_active_accounts(&self) -> AppResult<Vec<Account>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts
             WHERE status = ?1
             ORDER BY
                 CASE account_type
                     WHEN 'ultra' THEN 1
                     WHEN 'pro' THEN 2
                     WHEN 'free' THEN 3
                     ELSE 4
                 END ASC,
                 (quota_limit - quota_used) DESC,
                 last_used_at ASC NULLS FIRST"
        ))?;
        let rows = stmt.query_map([AccountStatus::Active.as_str()], Self::map_account)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn count_active(&self) -> AppResult<i64> {
        let conn = self.conn.lock();
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM accounts WHERE status = ?1",
            [AccountStatus::Active.as_str()],
            |row| row.get(0),
        )?)
    }

    /// Append one request-log row.
    pub fn log_request(
        &self,
        account_id: i64,
        model: &str,
        tokens_in: i64,
        tokens_out: i64,
        latency_ms: i64,
        status_code: i64,
    ) -> AppResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO request_logs (account_id, model, tokens_in, tokens_out, latency_ms, status_code, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![account_id, model, tokens_in, tokens_out, latency_ms, status_code, Utc::now()],
        )?;
        Ok(())
    }

    /// Bulk import of exported accounts; returns the number created.
    pub fn import(&self, data: &[u8]) -> AppResult<usize> {
        let exports: Vec<AccountExport> = serde_json::from_slice(data)?;
        let mut count = 0;
        for (i, export) in exports.iter().enumerate() {
            let name = if export.name.is_empty() {
                format!("Account {}", i + 1)
            } else {
                export.name.clone()
            };
            let input = AccountInput {
                name,
                email: export.email.clone(),
                refresh_token: export.refresh_token.clone(),
                account_type: Some(export.account_type),
            };
            if self.create(&input).is_ok() {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn export(&self) -> AppResult<Vec<AccountExport>> {
        Ok(self.list()?.iter().map(AccountExport::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(store: &Store, name: &str) -> Account {
        store
            .create(&AccountInput {
                name: name.to_string(),
                email: format!("{name}@example.com"),
                refresh_token: "rt".to_string(),
                account_type: None,
            })
            .unwrap()
    }

    #[test]
    fn test_create_and_get_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let created = seed(&store, "alpha");
        assert_eq!(created.status, AccountStatus::Unknown);
        assert_eq!(created.account_type, AccountType::Free);
        assert!(created.last_used_at.is_none());

        let fetched = store.get(created.id).unwrap();
        assert_eq!(fetched.email, "alpha@example.com");
        assert_eq!(fetched.refresh_token, "rt");
        assert!(matches!(store.get(9999), Err(AppError::NotFound)));
    }

    #[test]
    fn test_update_token_and_status() {
        let store = Store::open_in_memory().unwrap();
        let account = seed(&store, "alpha");
        let expiry = Utc::now() + chrono::Duration::hours(1);

        store.update_token(account.id, "at-123", expiry).unwrap();
        store.update_status(account.id, AccountStatus::Active).unwrap();

        let fetched = store.get(account.id).unwrap();
        assert_eq!(fetched.access_token.as_deref(), Some("at-123"));
        assert_eq!(fetched.status, AccountStatus::Active);
        let stored_expiry = fetched.token_expiry.unwrap();
        assert!((stored_expiry - expiry).num_seconds().abs() < 1);
    }

    #[test]
    fn test_active_ordering_tier_then_quota_then_lru() {
        let store = Store::open_in_memory().unwrap();
        let free = seed(&store, "free");
        let pro_low = seed(&store, "pro-low");
        let pro_high = seed(&store, "pro-high");
        let ultra = seed(&store, "ultra");

        for a in [&free, &pro_low, &pro_high, &ultra] {
            store.update_status(a.id, AccountStatus::Active).unwrap();
        }
        store.update_account_type(ultra.id, AccountType::Ultra).unwrap();
        store.update_account_type(pro_low.id, AccountType::Pro).unwrap();
        store.update_account_type(pro_high.id, AccountType::Pro).unwrap();
        store.update_quota(pro_low.id, 80, 100, None).unwrap();
        store.update_quota(pro_high.id, 10, 100, None).unwrap();

        let active = store.get_active_accounts().unwrap();
        let ids: Vec<i64> = active.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![ultra.id, pro_high.id, pro_low.id, free.id]);

        // Touching the ultra account pushes it behind a never-used peer of
        // the same tier and quota.
        let ultra2 = seed(&store, "ultra2");
        store.update_status(ultra2.id, AccountStatus::Active).unwrap();
        store.update_account_type(ultra2.id, AccountType::Ultra).unwrap();
        store.update_last_used(ultra.id).unwrap();

        let active = store.get_active_accounts().unwrap();
        assert_eq!(active[0].id, ultra2.id);
        assert_eq!(active[1].id, ultra.id);
    }

    #[test]
    fn test_inactive_accounts_are_excluded() {
        let store = Store::open_in_memory().unwrap();
        let a = seed(&store, "a");
        let b = seed(&store, "b");
        store.update_status(a.id, AccountStatus::Active).unwrap();
        store.update_status(b.id, AccountStatus::Banned).unwrap();

        let active = store.get_active_accounts().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, a.id);
        assert_eq!(store.count_active().unwrap(), 1);
    }

    #[test]
    fn test_import_export() {
        let store = Store::open_in_memory().unwrap();
        let data = r#"[
            {"name":"one","email":"one@example.com","refresh_token":"r1","account_type":"pro"},
            {"name":"","email":"two@example.com","refresh_token":"r2","account_type":"free"}
        ]"#;
        let imported = store.import(data.as_bytes()).unwrap();
        assert_eq!(imported, 2);

        let exported = store.export().unwrap();
        assert_eq!(exported.len(), 2);
        assert_eq!(exported[0].account_type, AccountType::Pro);
        assert_eq!(exported[1].name, "Account 2");
    }
}
