//! Route classification.

use crate::backend::{vars, PromptedBackend};
use crate::parse::normalize_label;
use concierge_prompt::defaults::ROUTER_CLASSIFY;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which evidence sources a question needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteDecision {
    Document,
    Tabular,
    Both,
    General,
}

impl RouteDecision {
    /// Used whenever the backend fails or answers outside the label set.
    /// Consulting both sources keeps recall when the classifier is unsure.
    pub const DEFAULT: RouteDecision = RouteDecision::Both;

    /// Match a normalized label, accepting the older policy/database names.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "document" | "documents" | "policy" | "policies" => Some(Self::Document),
            "tabular" | "database" | "db" => Some(Self::Tabular),
            "both" => Some(Self::Both),
            "general" | "none" => Some(Self::General),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Tabular => "tabular",
            Self::Both => "both",
            Self::General => "general",
        }
    }

    pub fn uses_documents(&self) -> bool {
        matches!(self, Self::Document | Self::Both)
    }

    pub fn uses_tabular(&self) -> bool {
        matches!(self, Self::Tabular | Self::Both)
    }
}

impl fmt::Display for RouteDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Words that make up pure small talk ("hi there", "good morning", "thanks!").
const SMALL_TALK_WORDS: &[&str] = &[
    "hello", "hi", "hey", "hiya", "there", "good", "morning", "afternoon", "evening",
    "thanks", "thank", "you", "cheers", "bye", "goodbye",
];

/// True when every word of `question` is small talk.
///
/// Such a turn needs no evidence, so the orchestrator can skip the
/// classification call entirely.
pub fn is_small_talk(question: &str) -> bool {
    let lower = question.to_lowercase();
    let mut words = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .peekable();

    words.peek().is_some() && words.all(|w| SMALL_TALK_WORDS.contains(&w))
}

/// Classifies questions with one backend call.
pub struct Router {
    backend: PromptedBackend,
}

impl Router {
    pub fn new(backend: PromptedBackend) -> Self {
        Self { backend }
    }

    /// Classify `question` given the rendered conversation `context`.
    ///
    /// Never fails: backend errors and unknown labels map to
    /// [`RouteDecision::DEFAULT`].
    pub async fn classify(&self, question: &str, context: &str) -> RouteDecision {
        let variables = vars([
            ("question", question.to_string()),
            ("context", context.to_string()),
        ]);

        let response = match self.backend.complete(ROUTER_CLASSIFY, variables).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    "Classification failed, using default route '{}': {}",
                    RouteDecision::DEFAULT,
                    e
                );
                return RouteDecision::DEFAULT;
            }
        };

        let label = normalize_label(&response);
        match RouteDecision::from_label(&label) {
            Some(route) => {
                tracing::info!("Routed question to '{}'", route);
                route
            }
            None => {
                tracing::warn!(
                    "Unrecognized route label {:?}, using default '{}'",
                    label,
                    RouteDecision::DEFAULT
                );
                RouteDecision::DEFAULT
            }
        }
    }
}
