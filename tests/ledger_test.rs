use std::sync::Arc;

use chrono::{Datelike, TimeZone, Timelike, Utc, Weekday};
use tutorledger::ledger::QuotaLedger;
use tutorledger::store::MemoryBalanceStore;
use tutorledger::types::{LedgerConfig, TokenUsage};

fn ledger() -> QuotaLedger {
    QuotaLedger::new(Arc::new(MemoryBalanceStore::new()), LedgerConfig::default())
}

#[tokio::test]
async fn lazy_creation_is_idempotent() {
    let ledger = ledger();
    assert_eq!(ledger.get_balance(1).await.unwrap(), 5.0);
    assert_eq!(ledger.get_balance(1).await.unwrap(), 5.0);
}

#[tokio::test]
async fn balance_never_goes_negative() {
    let ledger = ledger();
    for cost in [1.5, 2.0, 0.25, 3.0, 0.0, 7.5] {
        let balance = ledger.deduct_balance(42, cost).await.unwrap();
        assert!(balance >= 0.0, "balance went negative after deducting {cost}");
    }
    assert_eq!(ledger.get_balance(42).await.unwrap(), 0.0);
}

#[tokio::test]
async fn deduction_saturates_at_zero() {
    let ledger = ledger();
    let balance = ledger.deduct_balance(7, 8.0).await.unwrap();
    assert_eq!(balance, 0.0);
}

#[tokio::test]
async fn negative_cost_is_treated_as_zero() {
    let ledger = ledger();
    let balance = ledger.deduct_balance(7, -3.0).await.unwrap();
    assert_eq!(balance, 5.0);
}

#[tokio::test]
async fn spend_scenario_saturates_then_refuses() {
    // 5.0 credits: spend 2.0, spend 4.0 (saturates), then a 1.0 check fails
    let ledger = ledger();
    assert!((ledger.deduct_balance(9, 2.0).await.unwrap() - 3.0).abs() < 1e-9);
    assert_eq!(ledger.deduct_balance(9, 4.0).await.unwrap(), 0.0);

    let check = ledger.check_balance(9, 1.0).await.unwrap();
    assert!(!check.sufficient);
    assert_eq!(check.balance, 0.0);
}

#[tokio::test]
async fn check_balance_does_not_mutate() {
    let ledger = ledger();
    ledger.check_balance(3, 4.5).await.unwrap();
    ledger.check_balance(3, 100.0).await.unwrap();
    assert_eq!(ledger.get_balance(3).await.unwrap(), 5.0);
}

// 2025-06-09 is a Monday; 06-10 Tue, 06-11 Wed, and 06-15 Sun share an
// ISO week, 06-22 is the Sunday of the following week.

#[tokio::test]
async fn reset_gating_follows_the_weekly_schedule() {
    let ledger = ledger();
    let tuesday = Utc.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap();
    assert_eq!(ledger.deduct_balance_at(1, 5.0, tuesday).await.unwrap(), 0.0);

    // Wednesday of the same week: no reset yet.
    let wednesday = Utc.with_ymd_and_hms(2025, 6, 11, 9, 0, 0).unwrap();
    assert_eq!(ledger.get_balance_at(1, wednesday).await.unwrap(), 0.0);

    // Sunday of the same ISO week: weeks compare equal, still stale.
    let same_week_sunday = Utc.with_ymd_and_hms(2025, 6, 15, 9, 0, 0).unwrap();
    assert_eq!(ledger.get_balance_at(1, same_week_sunday).await.unwrap(), 0.0);

    // Monday of the following week: week changed but not the reset day.
    let monday = Utc.with_ymd_and_hms(2025, 6, 16, 9, 0, 0).unwrap();
    assert_eq!(ledger.get_balance_at(1, monday).await.unwrap(), 0.0);

    // Sunday of the following ISO week: replenished.
    let next_sunday = Utc.with_ymd_and_hms(2025, 6, 22, 9, 0, 0).unwrap();
    assert_eq!(ledger.get_balance_at(1, next_sunday).await.unwrap(), 5.0);
}

#[tokio::test]
async fn reset_crosses_the_year_boundary() {
    let ledger = ledger();
    let december_tuesday = Utc.with_ymd_and_hms(2025, 12, 23, 12, 0, 0).unwrap();
    ledger.deduct_balance_at(3, 5.0, december_tuesday).await.unwrap();

    let january_sunday = Utc.with_ymd_and_hms(2026, 1, 4, 8, 0, 0).unwrap();
    assert_eq!(ledger.get_balance_at(3, january_sunday).await.unwrap(), 5.0);
}

#[tokio::test]
async fn reset_advances_last_reset() {
    let ledger = ledger();
    let tuesday = Utc.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap();
    ledger.deduct_balance_at(4, 1.0, tuesday).await.unwrap();

    let next_sunday = Utc.with_ymd_and_hms(2025, 6, 22, 9, 0, 0).unwrap();
    ledger.get_balance_at(4, next_sunday).await.unwrap();

    let records = ledger.all_balances().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].last_reset, next_sunday);
}

#[tokio::test]
async fn next_reset_is_a_strictly_future_sunday_midnight() {
    let ledger = ledger();
    let instants = [
        Utc.with_ymd_and_hms(2025, 6, 10, 9, 30, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap(), // exactly on the boundary
        Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap(),
    ];
    for now in instants {
        let next = ledger.next_reset_after(now);
        assert!(next > now, "next reset {next} not after {now}");
        assert_eq!(next.weekday(), Weekday::Sun);
        assert_eq!((next.hour(), next.minute(), next.second()), (0, 0, 0));
    }
}

#[tokio::test]
async fn configured_replenish_amount_is_honored() {
    let config = LedgerConfig {
        replenish_amount: 10.0,
        ..LedgerConfig::default()
    };
    let ledger = QuotaLedger::new(Arc::new(MemoryBalanceStore::new()), config);
    assert_eq!(ledger.get_balance(1).await.unwrap(), 10.0);
}

#[tokio::test]
async fn user_stats_report_balance_and_totals() {
    let ledger = ledger();
    ledger.deduct_balance(5, 1.5).await.unwrap();
    ledger
        .note_usage(5, TokenUsage::with_cached(1000, 500, 200), 1.5)
        .await
        .unwrap();

    let stats = ledger.user_stats(5).await.unwrap();
    assert!((stats.balance - 3.5).abs() < 1e-9);
    assert_eq!(stats.total_tokens, 1500);
    assert!((stats.total_cost - 1.5).abs() < 1e-9);
    assert!((0..=7).contains(&stats.days_until_reset));
}
