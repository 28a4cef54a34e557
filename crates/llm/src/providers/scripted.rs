//! Deterministic in-process backend.
//!
//! Replies come from a queue or a closure over the request, every request is
//! recorded, and failures can be injected. Used to exercise the pipeline
//! without a live model.

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use concierge_core::{AppError, AppResult};
use std::collections::VecDeque;
use std::sync::Mutex;

type Responder = Box<dyn Fn(&LlmRequest) -> AppResult<String> + Send + Sync>;

/// Scripted LLM client.
pub struct ScriptedClient {
    responder: Responder,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedClient {
    /// Reply with whatever `responder` returns for each request.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&LlmRequest) -> AppResult<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `replies` in order; further requests fail.
    pub fn from_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queue: Mutex<VecDeque<String>> =
            Mutex::new(replies.into_iter().map(Into::into).collect());
        Self::new(move |_| {
            queue
                .lock()
                .map_err(|_| AppError::Llm("script queue poisoned".to_string()))?
                .pop_front()
                .ok_or_else(|| AppError::Llm("script exhausted".to_string()))
        })
    }

    /// Fail every request with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(move |_| Err(AppError::Llm(message.clone())))
    }

    /// Number of requests received so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Copies of every request received so far.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Prompt text of every request received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|request| request.prompt)
            .collect()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let content = (self.responder)(request)?;
        Ok(LlmResponse::text(content, request.model.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_in_order_then_exhausts() {
        let client = ScriptedClient::from_replies(["first", "second"]);
        let request = LlmRequest::new("q", "m");

        assert_eq!(client.complete(&request).await.unwrap().content, "first");
        assert_eq!(client.complete(&request).await.unwrap().content, "second");
        assert!(client.complete(&request).await.is_err());
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn test_closure_sees_request() {
        let client = ScriptedClient::new(|req| Ok(format!("echo: {}", req.prompt)));
        let response = client.complete(&LlmRequest::new("hi", "m")).await.unwrap();
        assert_eq!(response.content, "echo: hi");
        assert_eq!(client.prompts(), vec!["hi".to_string()]);
    }

    #[tokio::test]
    async fn test_failing_client() {
        let client = ScriptedClient::failing("backend down");
        let err = client.complete(&LlmRequest::new("q", "m")).await.unwrap_err();
        assert!(err.to_string().contains("backend down"));
        assert_eq!(client.calls(), 1);
    }
}
