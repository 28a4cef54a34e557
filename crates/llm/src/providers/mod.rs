//! Generation backend implementations.

pub mod ollama;
pub mod openai;
pub mod scripted;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use scripted::ScriptedClient;
