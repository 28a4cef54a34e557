//! Per-turn driver: route, fetch, synthesize, remember.
//!
//! `process_query` is the only entry point and it never fails. Component
//! failures degrade inside the turn; anything that still escapes (a panic or
//! the optional deadline) becomes [`GENERIC_FAILURE`], and the state always
//! returns to [`TurnState::Idle`].

use crate::backend::PromptedBackend;
use crate::context::ConversationContext;
use crate::query::{JoinPlanner, QuerySynthesizer, TabularPipeline};
use crate::reflection::{
    AnswerInputs, LlmEvaluator, LlmGenerator, ReflectionOutcome, ReflectionSettings, Reflector,
};
use crate::router::{self, RouteDecision, Router};
use crate::schema::SchemaCatalog;
use concierge_core::config::{AppConfig, PipelineConfig};
use concierge_knowledge::{DocumentSource, TabularResult, TabularSource};
use concierge_llm::LlmClient;
use concierge_prompt::PromptLibrary;
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

/// Returned when a turn fails outright.
pub const GENERIC_FAILURE: &str =
    "I'm not sure how to answer that. Could you rephrase your question?";

/// Returned for blank input; no backend is consulted.
pub const EMPTY_QUESTION: &str = "Please type a question and I'll do my best to help.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnState {
    Idle,
    Routing,
    Fetching,
    Synthesizing,
}

/// Evidence gathered for one turn.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvidenceBundle {
    pub documents: String,
    pub tabular: Vec<TabularResult>,
    /// Sources that were selected but failed.
    pub failures: Vec<String>,
    /// Sources that were selected, answered, and matched nothing.
    pub misses: Vec<String>,
}

impl EvidenceBundle {
    /// Rendered rows of every successful tabular result.
    pub fn tabular_text(&self) -> String {
        self.tabular
            .iter()
            .map(TabularResult::render)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn tabular_errors(&self) -> Vec<String> {
        self.tabular
            .iter()
            .filter_map(|r| r.error.as_ref().map(|e| format!("{}: {}", r.collection, e)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnOutcome {
    /// Still running; only observable on a report that was never finished.
    Pending,
    Answered,
    /// Blank question.
    Rejected,
    TimedOut,
    Failed { reason: String },
}

/// What happened during the last turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnReport {
    pub session_id: String,
    pub turn: u64,
    pub route: Option<RouteDecision>,
    pub document_evidence: bool,
    pub tabular_evidence: bool,
    pub tabular_errors: Vec<String>,
    pub iterations: u32,
    pub accepted: bool,
    pub fallback_used: bool,
    pub greeting: bool,
    pub outcome: TurnOutcome,
}

impl TurnReport {
    fn new(session_id: Uuid, turn: u64) -> Self {
        Self {
            session_id: session_id.to_string(),
            turn,
            route: None,
            document_evidence: false,
            tabular_evidence: false,
            tabular_errors: Vec::new(),
            iterations: 0,
            accepted: false,
            fallback_used: false,
            greeting: false,
            outcome: TurnOutcome::Pending,
        }
    }

    fn record_reflection(&mut self, outcome: &ReflectionOutcome) {
        self.iterations = outcome.iterations;
        self.accepted = outcome.accepted;
        self.fallback_used = outcome.fallback_used;
        self.greeting = outcome.greeting;
    }
}

/// One conversation session.
pub struct Orchestrator {
    session_id: Uuid,
    turn: u64,
    state: TurnState,
    context: ConversationContext,
    router: Router,
    documents: Arc<dyn DocumentSource>,
    tabular: Option<TabularPipeline>,
    reflector: Reflector,
    turn_timeout: Option<Duration>,
    last_report: Option<TurnReport>,
}

impl Orchestrator {
    pub fn new(
        router: Router,
        documents: Arc<dyn DocumentSource>,
        tabular: Option<TabularPipeline>,
        reflector: Reflector,
        pipeline: &PipelineConfig,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            turn: 0,
            state: TurnState::Idle,
            context: ConversationContext::new(pipeline.context_budget_chars),
            router,
            documents,
            tabular,
            reflector,
            turn_timeout: pipeline.turn_timeout_secs.map(Duration::from_secs),
            last_report: None,
        }
    }

    /// Wire every stage from configuration.
    ///
    /// Each stage gets its own model from `pipeline.models`, falling back to
    /// the active model. Without a tabular source, tabular routes report the
    /// source as unavailable.
    pub fn from_config(
        config: &AppConfig,
        client: Arc<dyn LlmClient>,
        prompts: Arc<PromptLibrary>,
        documents: Arc<dyn DocumentSource>,
        tabular: Option<Arc<dyn TabularSource>>,
    ) -> Self {
        let models = &config.pipeline.models;
        let backend = |stage: Option<&String>| {
            PromptedBackend::new(client.clone(), prompts.clone(), config.stage_model(stage))
        };

        let router = Router::new(backend(models.router.as_ref()));

        let tabular = tabular.map(|source| {
            TabularPipeline::new(
                Arc::new(SchemaCatalog::new(source, config.sources.sample_rows)),
                QuerySynthesizer::new(backend(models.query.as_ref())),
                JoinPlanner::new(backend(models.query.as_ref())),
                config.sources.relationships.clone(),
                config.sources.default_collection().map(str::to_string),
            )
        });

        let reflector = Reflector::new(
            Arc::new(LlmGenerator::new(backend(models.answer.as_ref()))),
            Arc::new(LlmEvaluator::new(backend(models.evaluator.as_ref()))),
            ReflectionSettings::from(&config.pipeline),
        );

        Self::new(router, documents, tabular, reflector, &config.pipeline)
    }

    /// Override the per-turn deadline.
    pub fn with_turn_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.turn_timeout = timeout;
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    pub fn last_report(&self) -> Option<&TurnReport> {
        self.last_report.as_ref()
    }

    /// Start a new session: empty context, fresh id.
    pub fn reset(&mut self) {
        self.context.clear();
        self.session_id = Uuid::new_v4();
        self.turn = 0;
        self.state = TurnState::Idle;
        self.last_report = None;
        tracing::info!("Started new session {}", self.session_id);
    }

    /// Answer one question. Never fails.
    pub async fn process_query(&mut self, question: &str) -> String {
        self.turn += 1;
        let span = tracing::info_span!("turn", session = %self.session_id, turn = self.turn);
        self.process_turn(question).instrument(span).await
    }

    async fn process_turn(&mut self, question: &str) -> String {
        let question = question.trim();
        let mut report = TurnReport::new(self.session_id, self.turn);

        if question.is_empty() {
            tracing::debug!("Rejected blank question");
            report.outcome = TurnOutcome::Rejected;
            self.last_report = Some(report);
            return EMPTY_QUESTION.to_string();
        }

        let deadline = self.turn_timeout;
        let turn = AssertUnwindSafe(self.run_turn(question, &mut report)).catch_unwind();
        let result = match deadline {
            Some(limit) => tokio::time::timeout(limit, turn).await.ok(),
            None => Some(turn.await),
        };

        self.state = TurnState::Idle;

        let answer = match result {
            Some(Ok(answer)) => {
                self.context.push(question, &answer);
                report.outcome = TurnOutcome::Answered;
                answer
            }
            Some(Err(payload)) => {
                let reason = panic_message(payload.as_ref());
                tracing::error!("Turn panicked: {}", reason);
                report.outcome = TurnOutcome::Failed { reason };
                GENERIC_FAILURE.to_string()
            }
            None => {
                tracing::warn!("Turn exceeded deadline of {:?}", deadline);
                report.outcome = TurnOutcome::TimedOut;
                GENERIC_FAILURE.to_string()
            }
        };

        tracing::info!("Turn finished: {:?}", report.outcome);
        self.last_report = Some(report);
        answer
    }

    async fn run_turn(&mut self, question: &str, report: &mut TurnReport) -> String {
        let context = self.context.render();

        self.state = TurnState::Routing;
        let fresh = context.chars().count() < self.reflector.settings().greeting_context_threshold;
        let route = if fresh && router::is_small_talk(question) {
            tracing::debug!("Small talk with no context, skipping classification");
            RouteDecision::General
        } else {
            self.router.classify(question, &context).await
        };
        report.route = Some(route);

        self.state = TurnState::Fetching;
        let evidence = self.gather(route, question).await;
        let tabular = evidence.tabular_text();
        report.document_evidence = !evidence.documents.is_empty();
        report.tabular_evidence = !tabular.is_empty();
        report.tabular_errors = evidence.tabular_errors();

        self.state = TurnState::Synthesizing;
        let inputs = AnswerInputs {
            question: question.to_string(),
            context,
            documents: evidence.documents,
            tabular,
            failures: evidence.failures,
            misses: evidence.misses,
        };
        let outcome = self.reflector.synthesize_answer(&inputs).await;
        report.record_reflection(&outcome);

        outcome.answer
    }

    /// Consult exactly the sources `route` selects.
    async fn gather(&self, route: RouteDecision, question: &str) -> EvidenceBundle {
        let mut bundle = EvidenceBundle::default();

        if route.uses_documents() {
            bundle.documents = self.documents.lookup(question).await.trim().to_string();
            tracing::debug!(
                "Document source '{}' returned {} chars",
                self.documents.name(),
                bundle.documents.len()
            );
            if bundle.documents.is_empty() {
                bundle
                    .misses
                    .push("No policy passage matched the question".to_string());
            }
        }

        if route.uses_tabular() {
            match &self.tabular {
                Some(pipeline) => {
                    bundle.tabular = pipeline.fetch(question).await;
                    for result in &bundle.tabular {
                        if let Some(error) = &result.error {
                            bundle.failures.push(format!(
                                "{} data is unavailable ({})",
                                result.collection, error
                            ));
                        } else if result.is_miss() {
                            bundle
                                .misses
                                .push(format!("{}: no matching rows", result.collection));
                        }
                    }
                }
                None => {
                    tracing::warn!("Tabular route selected but no tabular source is configured");
                    bundle
                        .failures
                        .push("Product and account data is not configured".to_string());
                }
            }
        }

        bundle
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
