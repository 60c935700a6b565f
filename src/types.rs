use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Identifies a user account. Matches the integer primary key of the
/// external user table; this crate never creates or deletes users.
pub type UserId = i64;

/// One balance row per user, created lazily on first access.
///
/// Invariants maintained by the ledger: `balance >= 0` at all times, and
/// `last_reset` never moves backwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub user_id:    UserId,
    pub balance:    f64,
    pub last_reset: DateTime<Utc>,
}

impl BalanceRecord {
    /// A freshly granted record: full allotment, reset clock starting now.
    pub fn fresh(user_id: UserId, allotment: f64, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            balance: allotment,
            last_reset: now,
        }
    }
}

/// Result of an affordability check: whether `balance >= cost`, plus the
/// balance itself for caller display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalanceCheck {
    pub sufficient: bool,
    pub balance:    f64,
}

/// Token counts reported by a single completion call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens:     u32,
    pub completion_tokens: u32,
    /// Prompt tokens served from the provider-side cache at a reduced price.
    pub cached_tokens:     u32,
}

impl TokenUsage {
    pub fn new(prompt: u32, completion: u32) -> Self {
        Self {
            prompt_tokens:     prompt,
            completion_tokens: completion,
            cached_tokens:     0,
        }
    }

    pub fn with_cached(prompt: u32, completion: u32, cached: u32) -> Self {
        Self {
            prompt_tokens:     prompt,
            completion_tokens: completion,
            cached_tokens:     cached,
        }
    }

    /// Prompt plus completion tokens. Cached tokens are a subset of the
    /// prompt count, not an addition to it.
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }

    /// Accumulate usage from another call
    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.cached_tokens += other.cached_tokens;
    }
}

/// Lifetime usage accumulated for one user, updated at deduction time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub total_tokens: u64,
    pub total_cost:   f64,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Snapshot served to the usage-statistics endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStats {
    pub balance:          f64,
    pub total_tokens:     u64,
    pub total_cost:       f64,
    pub next_reset:       DateTime<Utc>,
    pub days_until_reset: i64,
}

/// Role tag on a conversation message, serialized the way the completion
/// wire format expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Role::System    => write!(f, "system"),
            Role::User      => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single role-tagged message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role:    Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Configuration for the ledger's replenishment behavior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Credits granted on record creation and on each weekly reset.
    pub replenish_amount: f64,

    /// Weekday on which stale balances become eligible to replenish,
    /// at 00:00 UTC.
    pub reset_day: Weekday,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            replenish_amount: 5.0,
            reset_day:        Weekday::Sun,
        }
    }
}
