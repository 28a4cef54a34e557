//! Conversational query pipeline.
//!
//! A turn flows through the [`Router`], the evidence sources (the tabular one
//! through the query synthesizer), the [`Reflector`] and finally the
//! [`ConversationContext`]. The [`Orchestrator`] drives that sequence and is
//! the only public entry point a front end needs.
//!
//! # Example
//! ```no_run
//! use concierge_agent::Orchestrator;
//! use concierge_core::AppConfig;
//! use concierge_knowledge::CorpusSource;
//! use concierge_llm::ScriptedClient;
//! use concierge_prompt::PromptLibrary;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! let client = Arc::new(ScriptedClient::from_replies(["general"]));
//! let prompts = Arc::new(PromptLibrary::builtin()?);
//! let documents = Arc::new(CorpusSource::from_texts(Vec::<(String, String)>::new(), 1000, 2, 0.1));
//!
//! let mut orchestrator = Orchestrator::from_config(&config, client, prompts, documents, None);
//! println!("{}", orchestrator.process_query("Hello").await);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod context;
pub mod orchestrator;
pub mod parse;
pub mod query;
pub mod reflection;
pub mod router;
pub mod schema;

#[cfg(test)]
mod tests;

pub use backend::PromptedBackend;
pub use context::{ConversationContext, Exchange};
pub use orchestrator::{
    EvidenceBundle, Orchestrator, TurnOutcome, TurnReport, TurnState, EMPTY_QUESTION,
    GENERIC_FAILURE,
};
pub use query::{JoinPlan, JoinPlanner, JoinStep, QuerySynthesizer, TabularPipeline};
pub use reflection::{
    AnswerInputs, CandidateEvaluator, CandidateGenerator, LlmEvaluator, LlmGenerator,
    ReflectionOutcome, ReflectionSettings, Reflector, Verdict, APOLOGY, GREETING,
};
pub use router::{RouteDecision, Router};
pub use schema::SchemaCatalog;
