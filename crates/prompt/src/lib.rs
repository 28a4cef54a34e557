//! Prompt system for Concierge.
//!
//! Every request sent to a generation backend is rendered from a named
//! prompt definition:
//! - YAML-based prompt definitions
//! - A built-in library covering each pipeline stage
//! - Per-workspace overrides in `.concierge/prompts/<id>.yml`
//! - Handlebars template rendering

pub mod builder;
pub mod defaults;
pub mod library;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use library::PromptLibrary;
pub use loader::{list_prompts, load_prompt};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptBehavior, PromptDefinition, PromptOutputSpec};
