use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::{CompletionClient, CompletionRequest, CompletionResponse};

/// Scripted client for tests: returns programmed outcomes in order and
/// records every request.
pub struct MockCompletionClient {
    responses: Mutex<Vec<Result<CompletionResponse, String>>>,
    call_log:  Mutex<Vec<CompletionRequest>>,
}

impl MockCompletionClient {
    pub fn new(responses: Vec<Result<CompletionResponse, String>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            call_log:  Mutex::new(Vec::new()),
        }
    }

    /// Returns the number of times complete() was invoked
    pub fn call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }

    /// Returns the request passed to the Nth call (0-indexed)
    pub fn request_for_call(&self, n: usize) -> Option<CompletionRequest> {
        self.call_log.lock().unwrap().get(n).cloned()
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, String> {
        self.call_log.lock().unwrap().push(request);

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err("MockCompletionClient: no more programmed responses".to_string());
        }
        responses.remove(0)
    }
}
