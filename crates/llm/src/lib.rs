//! Generation backend crate for Concierge.
//!
//! Provides a provider-agnostic abstraction over text-completion backends.
//! The pipeline treats every backend as a black box that turns a prompt into
//! text; nothing here interprets the returned content.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **OpenAI-compatible**: OpenAI, Groq and other `/chat/completions` endpoints
//! - **Scripted**: deterministic in-process client for tests
//!
//! # Example
//! ```no_run
//! use concierge_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Hello, world!", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiClient, ScriptedClient};
pub use types::ProviderType;
