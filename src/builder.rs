use std::sync::Arc;

use crate::chat::ChatService;
use crate::client::CompletionClient;
use crate::error::LedgerError;
use crate::ledger::QuotaLedger;
use crate::pricing::PriceTable;
use crate::store::{BalanceStore, MemoryBalanceStore, SqliteBalanceStore};
use crate::types::LedgerConfig;

/// Wires a `ChatService` together. A completion client is required;
/// everything else defaults (in-memory store, stock config, deployed
/// price table).
pub struct ChatServiceBuilder {
    store:      Option<Arc<dyn BalanceStore>>,
    client:     Option<Arc<dyn CompletionClient>>,
    config:     LedgerConfig,
    prices:     PriceTable,
    chat_model: Option<String>,
    tool_model: Option<String>,
}

impl ChatServiceBuilder {
    pub fn new() -> Self {
        Self {
            store:      None,
            client:     None,
            config:     LedgerConfig::default(),
            prices:     PriceTable::default(),
            chat_model: None,
            tool_model: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn BalanceStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Back the ledger with a SQLite database at `path`.
    pub fn sqlite(self, path: impl Into<std::path::PathBuf>) -> Result<Self, LedgerError> {
        let store = SqliteBalanceStore::new(path)?;
        Ok(self.store(Arc::new(store)))
    }

    pub fn client(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    /// Credits granted on record creation and on each weekly reset.
    pub fn replenish_amount(mut self, amount: f64) -> Self {
        self.config.replenish_amount = amount;
        self
    }

    pub fn prices(mut self, prices: PriceTable) -> Self {
        self.prices = prices;
        self
    }

    pub fn chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = Some(model.into());
        self
    }

    pub fn tool_model(mut self, model: impl Into<String>) -> Self {
        self.tool_model = Some(model.into());
        self
    }

    pub fn build(self) -> Result<ChatService, LedgerError> {
        let client = self
            .client
            .ok_or_else(|| LedgerError::Build("completion client is required".to_string()))?;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryBalanceStore::new()));
        let ledger = Arc::new(QuotaLedger::new(store, self.config));

        let mut service = ChatService::new(ledger, client, self.prices);
        if let Some(model) = self.chat_model {
            service = service.with_chat_model(model);
        }
        if let Some(model) = self.tool_model {
            service = service.with_tool_model(model);
        }
        Ok(service)
    }
}

impl Default for ChatServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
