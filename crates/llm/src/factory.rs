//! LLM provider factory.
//!
//! Resolves a provider name from configuration into a shared client handle.
//! The handle is constructed once per process and shared read-only by every
//! pipeline stage.

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OpenAiClient};
use crate::types::ProviderType;
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "openai", "groq")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - Optional API key (required by hosted providers)
/// * `timeout_secs` - Optional HTTP timeout (Ollama only)
///
/// # Errors
/// Returns an error if the provider is unknown, a required key is missing,
/// or the HTTP client cannot be built.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    timeout_secs: Option<u64>,
) -> Result<Arc<dyn LlmClient>, String> {
    let provider_type =
        ProviderType::parse(provider).ok_or_else(|| format!("Unknown provider: {}", provider))?;
    let base_url = endpoint.unwrap_or(provider_type.default_endpoint());

    match provider_type {
        ProviderType::Ollama => match timeout_secs {
            Some(secs) => OllamaClient::with_timeout(base_url, Duration::from_secs(secs))
                .map(|client| Arc::new(client) as Arc<dyn LlmClient>)
                .map_err(|e| e.to_string()),
            None => Ok(Arc::new(OllamaClient::with_base_url(base_url))),
        },
        ProviderType::OpenAI | ProviderType::Groq => {
            let key = api_key.ok_or_else(|| {
                format!("{} provider requires API key", provider_type.as_str())
            })?;
            Ok(Arc::new(OpenAiClient::new(
                provider_type.as_str(),
                base_url,
                key,
            )))
        }
    }
}
