//! Prompt rendering plus completion, shared by every stage.

use concierge_core::AppResult;
use concierge_llm::{LlmClient, LlmRequest};
use concierge_prompt::PromptLibrary;
use std::collections::HashMap;
use std::sync::Arc;

/// A generation backend bound to a prompt library and a model.
///
/// Cloning is cheap; the client and library are shared handles constructed
/// once per process.
#[derive(Clone)]
pub struct PromptedBackend {
    client: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
    model: String,
}

impl PromptedBackend {
    pub fn new(client: Arc<dyn LlmClient>, prompts: Arc<PromptLibrary>, model: impl Into<String>) -> Self {
        Self {
            client,
            prompts,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Render `prompt_id` with `variables` and return the raw completion text.
    pub async fn complete(&self, prompt_id: &str, variables: HashMap<String, String>) -> AppResult<String> {
        let built = self.prompts.render(prompt_id, variables)?;

        let mut request = LlmRequest::new(built.user, self.model.clone());
        if let Some(system) = built.system {
            request = request.with_system(system);
        }
        if let Some(temperature) = built.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = built.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        tracing::trace!(
            "Sending '{}' to {} ({})",
            prompt_id,
            self.client.provider_name(),
            self.model
        );

        let response = self.client.complete(&request).await?;
        Ok(response.content)
    }
}

/// Build a variable map from string pairs.
pub(crate) fn vars<const N: usize>(pairs: [(&str, String); N]) -> HashMap<String, String> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
