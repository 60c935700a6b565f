pub mod types;
pub mod error;
pub mod schedule;
pub mod pricing;
pub mod store;
pub mod ledger;
pub mod client;
pub mod chat;
pub mod builder;

// Convenience re-exports at crate root
pub use builder::ChatServiceBuilder;
pub use chat::{ChatReply, ChatService, Instruction};
pub use client::{CompletionClient, CompletionRequest, CompletionResponse};
pub use error::LedgerError;
pub use ledger::QuotaLedger;
pub use pricing::{ModelPricing, PriceTable};
pub use schedule::WeeklySchedule;
pub use store::{BalanceStore, MemoryBalanceStore, SqliteBalanceStore, StoreError};
pub use types::{
    BalanceCheck, BalanceRecord, ChatMessage, LedgerConfig, Role, TokenUsage, UsageTotals, UserId,
    UserStats,
};
