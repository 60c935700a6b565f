use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

use crate::types::{BalanceRecord, UsageTotals, UserId};

/// Error surfaced by a balance store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Creating a brand-new record failed.
    #[error("record creation failed: {0}")]
    Create(String),

    /// Any other backend failure: reads, updates, commits.
    #[error("{0}")]
    Backend(String),
}

/// A single-shot mutation applied to a balance record inside the store's
/// atomic section.
pub type RecordMutation = Box<dyn FnOnce(&mut BalanceRecord) + Send>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// Read a record without creating it.
    async fn load(&self, user_id: UserId) -> Result<Option<BalanceRecord>, StoreError>;

    /// Atomic get-or-create plus read-modify-write.
    ///
    /// Inserts `default` if the user has no record yet, applies the
    /// mutation, persists the result if it changed, and returns the
    /// final record. Implementations must not interleave two `modify`
    /// calls for the same user.
    async fn modify(
        &self,
        default: BalanceRecord,
        apply: RecordMutation,
    ) -> Result<BalanceRecord, StoreError>;

    /// Accumulate lifetime usage for a user.
    async fn record_usage(
        &self,
        user_id: UserId,
        tokens: u64,
        cost: f64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Lifetime usage for a user; zeros if never recorded.
    async fn usage_totals(&self, user_id: UserId) -> Result<UsageTotals, StoreError>;

    /// Every balance record, for admin inspection.
    async fn list(&self) -> Result<Vec<BalanceRecord>, StoreError>;
}

/// A simple in-memory store for testing and short-lived processes.
pub struct MemoryBalanceStore {
    records: Mutex<HashMap<UserId, BalanceRecord>>,
    totals:  Mutex<HashMap<UserId, UsageTotals>>,
}

impl MemoryBalanceStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            totals:  Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryBalanceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BalanceStore for MemoryBalanceStore {
    async fn load(&self, user_id: UserId) -> Result<Option<BalanceRecord>, StoreError> {
        let records = self.records.lock().unwrap();
        Ok(records.get(&user_id).cloned())
    }

    async fn modify(
        &self,
        default: BalanceRecord,
        apply: RecordMutation,
    ) -> Result<BalanceRecord, StoreError> {
        let mut records = self.records.lock().unwrap();
        let record = records.entry(default.user_id).or_insert(default);
        apply(record);
        Ok(record.clone())
    }

    async fn record_usage(
        &self,
        user_id: UserId,
        tokens: u64,
        cost: f64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut totals = self.totals.lock().unwrap();
        let entry = totals.entry(user_id).or_default();
        entry.total_tokens += tokens;
        entry.total_cost += cost;
        entry.last_updated = Some(at);
        Ok(())
    }

    async fn usage_totals(&self, user_id: UserId) -> Result<UsageTotals, StoreError> {
        let totals = self.totals.lock().unwrap();
        Ok(totals.get(&user_id).copied().unwrap_or_default())
    }

    async fn list(&self) -> Result<Vec<BalanceRecord>, StoreError> {
        let records = self.records.lock().unwrap();
        let mut all: Vec<BalanceRecord> = records.values().cloned().collect();
        all.sort_by_key(|record| record.user_id);
        Ok(all)
    }
}

/// A balance store backed by a SQLite database.
///
/// Every `modify` runs as one IMMEDIATE transaction, so get-or-create,
/// the weekly reset, and the operation's own mutation commit together
/// or not at all.
pub struct SqliteBalanceStore {
    path: std::path::PathBuf,
}

impl SqliteBalanceStore {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let conn = rusqlite::Connection::open(&path)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS balances (
                user_id    INTEGER PRIMARY KEY,
                balance    REAL NOT NULL,
                last_reset TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS usage_totals (
                user_id      INTEGER PRIMARY KEY,
                total_tokens INTEGER NOT NULL,
                total_cost   REAL NOT NULL,
                last_updated TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { path })
    }

    fn get_conn(&self) -> Result<rusqlite::Connection, StoreError> {
        let conn = rusqlite::Connection::open(&self.path)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(conn)
    }

    fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| StoreError::Backend(format!("bad timestamp {raw:?}: {e}")))
    }
}

#[async_trait]
impl BalanceStore for SqliteBalanceStore {
    async fn load(&self, user_id: UserId) -> Result<Option<BalanceRecord>, StoreError> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                "SELECT user_id, balance, last_reset FROM balances WHERE user_id = ?1",
                rusqlite::params![user_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        match row {
            Some((user_id, balance, last_reset)) => Ok(Some(BalanceRecord {
                user_id,
                balance,
                last_reset: Self::parse_timestamp(&last_reset)?,
            })),
            None => Ok(None),
        }
    }

    async fn modify(
        &self,
        default: BalanceRecord,
        apply: RecordMutation,
    ) -> Result<BalanceRecord, StoreError> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let existing = tx
            .query_row(
                "SELECT balance, last_reset FROM balances WHERE user_id = ?1",
                rusqlite::params![default.user_id],
                |row| Ok((row.get::<_, f64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut record = match existing {
            Some((balance, last_reset)) => BalanceRecord {
                user_id: default.user_id,
                balance,
                last_reset: Self::parse_timestamp(&last_reset)?,
            },
            None => {
                tx.execute(
                    "INSERT INTO balances (user_id, balance, last_reset) VALUES (?1, ?2, ?3)",
                    rusqlite::params![
                        default.user_id,
                        default.balance,
                        default.last_reset.to_rfc3339()
                    ],
                )
                .map_err(|e| StoreError::Create(e.to_string()))?;
                default
            }
        };

        let before = record.clone();
        apply(&mut record);
        if record != before {
            tx.execute(
                "UPDATE balances SET balance = ?2, last_reset = ?3 WHERE user_id = ?1",
                rusqlite::params![record.user_id, record.balance, record.last_reset.to_rfc3339()],
            )
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        tx.commit().map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(record)
    }

    async fn record_usage(
        &self,
        user_id: UserId,
        tokens: u64,
        cost: f64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO usage_totals (user_id, total_tokens, total_cost, last_updated)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                 total_tokens = total_tokens + excluded.total_tokens,
                 total_cost   = total_cost + excluded.total_cost,
                 last_updated = excluded.last_updated",
            rusqlite::params![user_id, tokens as i64, cost, at.to_rfc3339()],
        )
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn usage_totals(&self, user_id: UserId) -> Result<UsageTotals, StoreError> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                "SELECT total_tokens, total_cost, last_updated FROM usage_totals WHERE user_id = ?1",
                rusqlite::params![user_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        match row {
            Some((total_tokens, total_cost, last_updated)) => Ok(UsageTotals {
                total_tokens: total_tokens as u64,
                total_cost,
                last_updated: Some(Self::parse_timestamp(&last_updated)?),
            }),
            None => Ok(UsageTotals::default()),
        }
    }

    async fn list(&self) -> Result<Vec<BalanceRecord>, StoreError> {
        let conn = self.get_conn()?;
        let mut stmt = conn
            .prepare("SELECT user_id, balance, last_reset FROM balances ORDER BY user_id")
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            let (user_id, balance, last_reset) =
                row.map_err(|e| StoreError::Backend(e.to_string()))?;
            records.push(BalanceRecord {
                user_id,
                balance,
                last_reset: Self::parse_timestamp(&last_reset)?,
            });
        }
        Ok(records)
    }
}
