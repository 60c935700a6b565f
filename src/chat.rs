use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::client::{CompletionClient, CompletionRequest};
use crate::error::LedgerError;
use crate::ledger::QuotaLedger;
use crate::pricing::{PriceTable, CHAT_MODEL, TOOL_MODEL};
use crate::types::{ChatMessage, TokenUsage, UserId, UserStats};

/// Tutoring modes selectable per message. Each maps to the system prompt
/// prepended to the conversation. Prompts are in Traditional Chinese,
/// matching the deployment's audience.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instruction {
    #[default]
    SimpleExplain,
    QuickSolve,
    VariantQuestion,
    ConceptExplanation,
    PatternRecognition,
    MindMap,
}

impl Instruction {
    /// Look up a mode by its form value, falling back to simple-explain.
    pub fn from_name(name: &str) -> Self {
        match name {
            "quick_solve"         => Instruction::QuickSolve,
            "variant_question"    => Instruction::VariantQuestion,
            "concept_explanation" => Instruction::ConceptExplanation,
            "pattern_recognition" => Instruction::PatternRecognition,
            "mind_map"            => Instruction::MindMap,
            _                     => Instruction::SimpleExplain,
        }
    }

    /// System prompt for this mode.
    pub fn system_prompt(self) -> &'static str {
        match self {
            Instruction::SimpleExplain => {
                "請用繁體中文解釋解題步驟，並以高中生能理解的方式回答。"
            }
            Instruction::QuickSolve => {
                "請用繁體中文提供一個能在2分鐘內用紙筆和視覺估算解決數學問題的快捷方法。\
                 原則是：計算越少、數字越簡單、公式越少且越簡單越好。\
                 如果代入數字或使用視覺猜測更簡單，請採用這種方法。"
            }
            Instruction::VariantQuestion => {
                "請用繁體中文設計一個變體題目，讓我可以練習使用相同的解題方法。"
            }
            Instruction::ConceptExplanation => {
                "如果你是題目出題者，你希望在這個問題中測試哪些特定的數學概念？請用繁體中文回答。"
            }
            Instruction::PatternRecognition => {
                "在未來的題目中，應該具備哪些特徵才能應用這種特定的解題方法？請用繁體中文回答。"
            }
            Instruction::MindMap => {
                "請用繁體中文創建文章本身的思維導圖。"
            }
        }
    }
}

/// System prompt for the question-classification tool call-site.
const MATH_CLASSIFICATION_PROMPT: &str = "GMAT的數學核心觀念有：\n\
    Value, Order, Factors, Algebra, Equalities, Inequalities, Rates, Ratios, \
    Percents, Statistics, Sets, Counting, Probability, Estimation, and Series。\n\n\
    用戶將會給你一或多道數學題目，請分析每一道題目在設計時希望測驗上面哪一個核心觀念\
    （請不要給出未列出的分類）。每道題目請做兩次獨立判斷並檢查是否一致，\
    不一致時請做第三次最終判斷。最後將每個核心觀念出現的題目數量統計成表格。";

/// Outcome of one paid completion turn.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub turn_id: Uuid,
    pub content: String,
    pub usage:   TokenUsage,
    pub cost:    f64,
    /// Balance remaining after the deduction.
    pub balance: f64,
    /// Provider-side id of the response, when one was returned.
    pub response_id: Option<String>,
}

/// Orchestrates the spending protocol around every completion call:
/// check the balance, invoke the API, and deduct only after a successful
/// response with usage data. A failed or malformed completion charges
/// nothing and advances no conversation state.
pub struct ChatService {
    ledger:     Arc<QuotaLedger>,
    client:     Arc<dyn CompletionClient>,
    prices:     PriceTable,
    chat_model: String,
    tool_model: String,
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("prices", &self.prices)
            .field("chat_model", &self.chat_model)
            .field("tool_model", &self.tool_model)
            .finish_non_exhaustive()
    }
}

impl ChatService {
    pub fn new(
        ledger: Arc<QuotaLedger>,
        client: Arc<dyn CompletionClient>,
        prices: PriceTable,
    ) -> Self {
        Self {
            ledger,
            client,
            prices,
            chat_model: CHAT_MODEL.to_string(),
            tool_model: TOOL_MODEL.to_string(),
        }
    }

    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    pub fn with_tool_model(mut self, model: impl Into<String>) -> Self {
        self.tool_model = model.into();
        self
    }

    pub fn ledger(&self) -> &QuotaLedger {
        &self.ledger
    }

    /// Send one tutoring turn: the mode's system prompt followed by the
    /// conversation history (the newest user message last).
    pub async fn send(
        &self,
        user_id: UserId,
        instruction: Instruction,
        history: &[ChatMessage],
    ) -> Result<ChatReply, LedgerError> {
        self.send_at(user_id, instruction, history, Utc::now()).await
    }

    pub async fn send_at(
        &self,
        user_id: UserId,
        instruction: Instruction,
        history: &[ChatMessage],
        now: DateTime<Utc>,
    ) -> Result<ChatReply, LedgerError> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(instruction.system_prompt()));
        messages.extend_from_slice(history);

        let request = CompletionRequest::new(&self.chat_model, messages);
        self.spend_on(user_id, request, now).await
    }

    /// Classify GMAT quant questions by core concept, on the tool model.
    pub async fn classify_questions(
        &self,
        user_id: UserId,
        questions: &str,
    ) -> Result<ChatReply, LedgerError> {
        self.classify_questions_at(user_id, questions, Utc::now()).await
    }

    pub async fn classify_questions_at(
        &self,
        user_id: UserId,
        questions: &str,
        now: DateTime<Utc>,
    ) -> Result<ChatReply, LedgerError> {
        let messages = vec![
            ChatMessage::system(MATH_CLASSIFICATION_PROMPT),
            ChatMessage::user(questions),
        ];
        let request = CompletionRequest::new(&self.tool_model, messages)
            .with_temperature(0.2)
            .with_max_tokens(2048);
        self.spend_on(user_id, request, now).await
    }

    /// Per-user stats for the usage endpoint.
    pub async fn user_stats(&self, user_id: UserId) -> Result<UserStats, LedgerError> {
        self.ledger.user_stats(user_id).await
    }

    /// The check-then-act-then-deduct contract shared by every call-site.
    async fn spend_on(
        &self,
        user_id: UserId,
        request: CompletionRequest,
        now: DateTime<Utc>,
    ) -> Result<ChatReply, LedgerError> {
        let check = self.ledger.check_balance_at(user_id, 0.0, now).await?;
        if check.balance <= 0.0 {
            return Err(LedgerError::InsufficientBalance {
                balance:    check.balance,
                next_reset: self.ledger.next_reset_after(now),
            });
        }

        // Resolve pricing up front so an unlisted model fails before the
        // paid call, not after.
        let model = request.model.clone();
        let pricing = self
            .prices
            .pricing_for(&model)
            .ok_or_else(|| LedgerError::UnknownModel(model.clone()))?;

        let response = self
            .client
            .complete(request)
            .await
            .map_err(LedgerError::Completion)?;

        let cost = pricing.cost(response.usage);
        let balance = self.ledger.deduct_balance_at(user_id, cost, now).await?;
        // Totals are advisory; a stats write failure must not fail the turn.
        if let Err(e) = self.ledger.note_usage_at(user_id, response.usage, cost, now).await {
            tracing::warn!(user_id, error = %e, "failed to record usage totals");
        }

        let turn_id = Uuid::new_v4();
        tracing::info!(user_id, %turn_id, %model, cost, balance, "completion charged");
        if balance <= 0.0 {
            tracing::warn!(user_id, "balance exhausted");
        }

        Ok(ChatReply {
            turn_id,
            content: response.content,
            usage: response.usage,
            cost,
            balance,
            response_id: response.response_id,
        })
    }
}
