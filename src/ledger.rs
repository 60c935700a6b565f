use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::LedgerError;
use crate::schedule::WeeklySchedule;
use crate::store::BalanceStore;
use crate::types::{BalanceCheck, BalanceRecord, LedgerConfig, TokenUsage, UserId, UserStats};

/// Gates and accounts for the monetary cost of completion calls per user,
/// against a balance that replenishes on a weekly cadence.
///
/// One instance per process, constructed at startup with its backing
/// store injected, and shared by every request handler. The ledger is the
/// sole mutator of balance records.
///
/// Every public operation has an `*_at` sibling taking the evaluation
/// instant explicitly; the plain form uses `Utc::now()`.
pub struct QuotaLedger {
    store:    Arc<dyn BalanceStore>,
    config:   LedgerConfig,
    schedule: WeeklySchedule,
}

impl QuotaLedger {
    pub fn new(store: Arc<dyn BalanceStore>, config: LedgerConfig) -> Self {
        let schedule = WeeklySchedule::new(config.reset_day);
        Self { store, config, schedule }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn schedule(&self) -> WeeklySchedule {
        self.schedule
    }

    /// Current balance after applying any pending weekly reset. Creates
    /// the record on first access, initialized to the full allotment.
    pub async fn get_balance(&self, user_id: UserId) -> Result<f64, LedgerError> {
        self.get_balance_at(user_id, Utc::now()).await
    }

    pub async fn get_balance_at(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<f64, LedgerError> {
        let record = self.touch(user_id, now, |_| {}).await?;
        Ok(record.balance)
    }

    /// Whether `balance >= cost` holds after any pending reset, plus the
    /// balance for display. Never deducts. A plain lookup is `cost = 0.0`.
    pub async fn check_balance(
        &self,
        user_id: UserId,
        cost: f64,
    ) -> Result<BalanceCheck, LedgerError> {
        self.check_balance_at(user_id, cost, Utc::now()).await
    }

    pub async fn check_balance_at(
        &self,
        user_id: UserId,
        cost: f64,
        now: DateTime<Utc>,
    ) -> Result<BalanceCheck, LedgerError> {
        let record = self.touch(user_id, now, |_| {}).await?;
        Ok(BalanceCheck {
            sufficient: record.balance >= cost,
            balance:    record.balance,
        })
    }

    /// Subtract `cost` from the balance, saturating at zero, and return
    /// the new balance. A negative `cost` is treated as zero; deduction
    /// never grants credit.
    pub async fn deduct_balance(&self, user_id: UserId, cost: f64) -> Result<f64, LedgerError> {
        self.deduct_balance_at(user_id, cost, Utc::now()).await
    }

    pub async fn deduct_balance_at(
        &self,
        user_id: UserId,
        cost: f64,
        now: DateTime<Utc>,
    ) -> Result<f64, LedgerError> {
        let cost = cost.max(0.0);
        let record = self
            .touch(user_id, now, move |record| {
                record.balance = (record.balance - cost).max(0.0);
            })
            .await?;
        tracing::info!(user_id, cost, balance = record.balance, "balance deducted");
        Ok(record.balance)
    }

    /// Next scheduled reset strictly after the current instant. Pure
    /// function of the clock; touches no user record.
    pub fn next_reset_time(&self) -> DateTime<Utc> {
        self.next_reset_after(Utc::now())
    }

    pub fn next_reset_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.schedule.next_reset_after(now)
    }

    /// Accumulate lifetime usage for the stats endpoint. Called by the
    /// spending path after a successful deduction.
    pub async fn note_usage(
        &self,
        user_id: UserId,
        usage: TokenUsage,
        cost: f64,
    ) -> Result<(), LedgerError> {
        self.note_usage_at(user_id, usage, cost, Utc::now()).await
    }

    pub async fn note_usage_at(
        &self,
        user_id: UserId,
        usage: TokenUsage,
        cost: f64,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.store
            .record_usage(user_id, u64::from(usage.total()), cost, now)
            .await?;
        Ok(())
    }

    /// Balance, lifetime totals, and the next reset, for one user.
    pub async fn user_stats(&self, user_id: UserId) -> Result<UserStats, LedgerError> {
        self.user_stats_at(user_id, Utc::now()).await
    }

    pub async fn user_stats_at(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<UserStats, LedgerError> {
        let balance = self.get_balance_at(user_id, now).await?;
        let totals = self.store.usage_totals(user_id).await?;
        let next_reset = self.schedule.next_reset_after(now);
        Ok(UserStats {
            balance,
            total_tokens: totals.total_tokens,
            total_cost: totals.total_cost,
            next_reset,
            days_until_reset: (next_reset - now).num_days(),
        })
    }

    /// Every balance record as stored, for admin inspection. Pending
    /// resets are not applied; records replenish when their owner is
    /// next active.
    pub async fn all_balances(&self) -> Result<Vec<BalanceRecord>, LedgerError> {
        Ok(self.store.list().await?)
    }

    /// Shared first step of every operation: get-or-create the record,
    /// then apply any due reset plus the operation's own mutation in one
    /// atomic store round-trip.
    async fn touch(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        op: impl FnOnce(&mut BalanceRecord) + Send + 'static,
    ) -> Result<BalanceRecord, LedgerError> {
        let schedule = self.schedule;
        let allotment = self.config.replenish_amount;
        let default = BalanceRecord::fresh(user_id, allotment, now);
        let record = self
            .store
            .modify(
                default,
                Box::new(move |record| {
                    if schedule.reset_due(record.last_reset, now) {
                        tracing::info!(
                            user_id = record.user_id,
                            old_balance = record.balance,
                            new_balance = allotment,
                            "weekly balance reset"
                        );
                        record.balance = allotment;
                        record.last_reset = now;
                    }
                    op(record);
                }),
            )
            .await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MockBalanceStore, StoreError};
    use chrono::TimeZone;

    fn ledger_with(store: MockBalanceStore) -> QuotaLedger {
        QuotaLedger::new(Arc::new(store), LedgerConfig::default())
    }

    #[tokio::test]
    async fn deduction_surfaces_persistence_failure() {
        let mut store = MockBalanceStore::new();
        store
            .expect_modify()
            .returning(|_, _| Err(StoreError::Backend("disk full".to_string())));
        let ledger = ledger_with(store);

        let err = ledger.deduct_balance(1, 1.0).await.unwrap_err();
        assert!(matches!(err, LedgerError::Persistence(_)));
    }

    #[tokio::test]
    async fn creation_failure_maps_to_record_creation() {
        let mut store = MockBalanceStore::new();
        store
            .expect_modify()
            .returning(|_, _| Err(StoreError::Create("store unavailable".to_string())));
        let ledger = ledger_with(store);

        let err = ledger.get_balance(1).await.unwrap_err();
        assert!(matches!(err, LedgerError::RecordCreation(_)));
    }

    #[tokio::test]
    async fn reset_applies_before_the_deduction() {
        let mut store = MockBalanceStore::new();
        store.expect_modify().returning(|default, apply| {
            // stale record drained two ISO weeks earlier
            let mut record = BalanceRecord {
                balance: 0.0,
                last_reset: Utc.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap(),
                ..default
            };
            apply(&mut record);
            Ok(record)
        });
        let ledger = ledger_with(store);

        let sunday = Utc.with_ymd_and_hms(2025, 6, 22, 9, 0, 0).unwrap();
        let balance = ledger.deduct_balance_at(1, 2.0, sunday).await.unwrap();
        assert!((balance - 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn stats_failure_propagates() {
        let mut store = MockBalanceStore::new();
        store.expect_modify().returning(|default, apply| {
            let mut record = default;
            apply(&mut record);
            Ok(record)
        });
        store
            .expect_usage_totals()
            .returning(|_| Err(StoreError::Backend("locked".to_string())));
        let ledger = ledger_with(store);

        let err = ledger.user_stats(1).await.unwrap_err();
        assert!(matches!(err, LedgerError::Persistence(_)));
    }
}
