//! # Weekly Report Demo
//!
//! Admin-style inspection: every balance record plus lifetime usage
//! totals from a SQLite ledger database.
//!
//! # Usage
//! ```bash
//! cargo run --example weekly_report
//! ```

use std::sync::Arc;

use tutorledger::ledger::QuotaLedger;
use tutorledger::store::{BalanceStore, SqliteBalanceStore};
use tutorledger::types::LedgerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let store = Arc::new(SqliteBalanceStore::new("tutor.db")?);
    let ledger = QuotaLedger::new(store.clone(), LedgerConfig::default());

    println!(
        "{:<8} {:>10} {:>14} {:>12}  {}",
        "user", "balance", "total tokens", "total cost", "last reset"
    );
    println!("{}", "─".repeat(72));
    for record in ledger.all_balances().await? {
        let totals = store.usage_totals(record.user_id).await?;
        println!(
            "{:<8} {:>10.4} {:>14} {:>12.6}  {}",
            record.user_id, record.balance, totals.total_tokens, totals.total_cost, record.last_reset
        );
    }
    println!("\nnext reset: {}", ledger.next_reset_time());

    Ok(())
}
