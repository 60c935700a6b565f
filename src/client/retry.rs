use std::sync::Arc;

use async_trait::async_trait;

use crate::client::{CompletionClient, CompletionRequest, CompletionResponse};

/// A wrapper around any `CompletionClient` that retries transient
/// failures with exponential back-off.
///
/// Retrying lives strictly outside the ledger: deduction happens only
/// once, after the final successful response, so retries can never
/// double-charge.
pub struct RetryingCompletionClient {
    inner:       Arc<dyn CompletionClient>,
    max_retries: u32,
}

impl RetryingCompletionClient {
    pub fn new(inner: Arc<dyn CompletionClient>, max_retries: u32) -> Self {
        Self { inner, max_retries }
    }

    fn is_auth_error(err: &str) -> bool {
        let lower = err.to_lowercase();
        lower.contains("401")
            || lower.contains("403")
            || lower.contains("authentication")
            || lower.contains("unauthorized")
            || lower.contains("forbidden")
            || lower.contains("invalid api key")
    }

    fn is_rate_limit_error(err: &str) -> bool {
        let lower = err.to_lowercase();
        lower.contains("429")
            || lower.contains("rate limit")
            || lower.contains("too many requests")
            || lower.contains("insufficient_quota")
            || lower.contains("limit exceeded")
    }
}

#[async_trait]
impl CompletionClient for RetryingCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, String> {
        let mut last_err = String::new();
        let mut rate_limited = false;

        for attempt in 0..=self.max_retries {
            match self.inner.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) if Self::is_auth_error(&e) => {
                    tracing::error!(error = %e, "completion auth error, not retrying");
                    return Err(e);
                }
                Err(e) => {
                    last_err = e.clone();
                    if Self::is_rate_limit_error(&e) {
                        rate_limited = true;
                    }

                    if attempt < self.max_retries {
                        // For rate limits, use a longer initial wait
                        let base_wait = if Self::is_rate_limit_error(&e) { 5 } else { 1 };
                        let wait_secs = std::cmp::min(base_wait << attempt, 60);

                        tracing::warn!(
                            attempt = attempt + 1,
                            max     = self.max_retries,
                            wait_s  = wait_secs,
                            error   = %e,
                            "completion transient error, retrying"
                        );
                        tokio::time::sleep(std::time::Duration::from_secs(wait_secs)).await;
                    }
                }
            }
        }

        let prefix = if rate_limited {
            "Completion rate limit exceeded"
        } else {
            "Completion failed"
        };

        Err(format!(
            "{} after {} retries, last error: {}",
            prefix, self.max_retries, last_err
        ))
    }
}
