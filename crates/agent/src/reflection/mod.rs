//! Answer synthesis: a bounded generate, evaluate, retry loop.
//!
//! The generator and evaluator are traits so the loop can be driven by stubs
//! in tests. The shipped implementations render the `answer.*` prompts.

pub mod dedupe;

use crate::backend::{vars, PromptedBackend};
use async_trait::async_trait;
use concierge_core::{config::PipelineConfig, AppResult};
use concierge_prompt::defaults::{ANSWER_COMPOSE, ANSWER_EVALUATE, ANSWER_FALLBACK};
use serde::Serialize;
use std::sync::Arc;

/// Returned without any backend call when there is nothing to answer from.
pub const GREETING: &str =
    "Hello! I can help with product information and company policies. What would you like to know?";

/// Returned when even the fallback generation is unavailable.
pub const APOLOGY: &str =
    "I'm sorry, I can't put an answer together right now. Please try again in a moment.";

/// Phrases asking to be persuaded; they switch on the one-line pitch.
pub const PERSUASIVE_PHRASES: &[&str] = &[
    "why should i buy",
    "convince",
    "worth it",
    "sell me",
    "explain with info you have",
];

/// Everything the answer is composed from.
#[derive(Debug, Clone, Default)]
pub struct AnswerInputs {
    pub question: String,
    /// Rendered conversation so far.
    pub context: String,
    pub documents: String,
    pub tabular: String,
    /// Sources that were consulted but failed, one note each.
    pub failures: Vec<String>,
    /// Sources that were consulted and found nothing, one note each.
    pub misses: Vec<String>,
}

impl AnswerInputs {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }

    pub fn is_persuasive(&self) -> bool {
        let lower = self.question.to_lowercase();
        PERSUASIVE_PHRASES.iter().any(|p| lower.contains(p))
    }

    /// One-line pitch only when there are catalogue fields to pitch from.
    pub fn wants_pitch(&self) -> bool {
        self.is_persuasive() && !self.tabular.trim().is_empty()
    }
}

/// Coarse quality verdict on a candidate answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Accept,
    Reject,
}

impl Verdict {
    /// Read a YES/NO reply. The first word decides; otherwise any `YES` accepts.
    pub fn parse(response: &str) -> Self {
        let upper = response.to_uppercase();
        let mut words = upper
            .split(|c: char| !c.is_ascii_alphabetic())
            .filter(|w| !w.is_empty());

        match words.next() {
            Some("YES") => Verdict::Accept,
            Some("NO") => Verdict::Reject,
            Some(_) if words.any(|w| w == "YES") => Verdict::Accept,
            _ => Verdict::Reject,
        }
    }
}

/// Produces candidate answers.
#[async_trait]
pub trait CandidateGenerator: Send + Sync {
    /// Compose a candidate; `previous` is the last rejected one, if any.
    async fn generate(&self, inputs: &AnswerInputs, previous: Option<&str>) -> AppResult<String>;

    /// Minimal "answer helpfully or say what you can help with" generation.
    async fn fallback(&self, question: &str) -> AppResult<String>;
}

/// Judges candidate answers.
#[async_trait]
pub trait CandidateEvaluator: Send + Sync {
    async fn evaluate(&self, question: &str, candidate: &str) -> AppResult<Verdict>;
}

/// Generator backed by the `answer.compose` and `answer.fallback` prompts.
pub struct LlmGenerator {
    backend: PromptedBackend,
}

impl LlmGenerator {
    pub fn new(backend: PromptedBackend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl CandidateGenerator for LlmGenerator {
    async fn generate(&self, inputs: &AnswerInputs, previous: Option<&str>) -> AppResult<String> {
        let variables = vars([
            ("question", inputs.question.clone()),
            ("context", inputs.context.clone()),
            ("documents", inputs.documents.clone()),
            ("tabular", inputs.tabular.clone()),
            ("failures", inputs.failures.join("\n")),
            ("misses", inputs.misses.join("\n")),
            (
                "pitch",
                if inputs.wants_pitch() { "yes" } else { "" }.to_string(),
            ),
            ("previous", previous.unwrap_or_default().to_string()),
        ]);
        self.backend.complete(ANSWER_COMPOSE, variables).await
    }

    async fn fallback(&self, question: &str) -> AppResult<String> {
        self.backend
            .complete(ANSWER_FALLBACK, vars([("question", question.to_string())]))
            .await
    }
}

/// Evaluator backed by the `answer.evaluate` prompt.
pub struct LlmEvaluator {
    backend: PromptedBackend,
}

impl LlmEvaluator {
    pub fn new(backend: PromptedBackend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl CandidateEvaluator for LlmEvaluator {
    async fn evaluate(&self, question: &str, candidate: &str) -> AppResult<Verdict> {
        let response = self
            .backend
            .complete(
                ANSWER_EVALUATE,
                vars([
                    ("question", question.to_string()),
                    ("candidate", candidate.to_string()),
                ]),
            )
            .await?;
        Ok(Verdict::parse(&response))
    }
}

/// Loop limits and post-processing thresholds.
#[derive(Debug, Clone)]
pub struct ReflectionSettings {
    pub max_iterations: u32,
    pub greeting_context_threshold: usize,
    pub dedupe_threshold: f32,
    pub min_sentence_chars: usize,
    pub min_answer_chars: usize,
}

impl From<&PipelineConfig> for ReflectionSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_iterations: config.max_reflection_iterations.max(1),
            greeting_context_threshold: config.greeting_context_threshold,
            dedupe_threshold: config.dedupe_threshold,
            min_sentence_chars: config.min_sentence_chars,
            min_answer_chars: config.min_answer_chars,
        }
    }
}

impl Default for ReflectionSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

/// What the loop produced and how.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReflectionOutcome {
    pub answer: String,
    /// Candidates generated.
    pub iterations: u32,
    /// Whether the evaluator accepted a candidate before the budget ran out.
    pub accepted: bool,
    pub fallback_used: bool,
    pub greeting: bool,
}

pub struct Reflector {
    generator: Arc<dyn CandidateGenerator>,
    evaluator: Arc<dyn CandidateEvaluator>,
    settings: ReflectionSettings,
}

impl Reflector {
    pub fn new(
        generator: Arc<dyn CandidateGenerator>,
        evaluator: Arc<dyn CandidateEvaluator>,
        settings: ReflectionSettings,
    ) -> Self {
        Self {
            generator,
            evaluator,
            settings,
        }
    }

    pub fn settings(&self) -> &ReflectionSettings {
        &self.settings
    }

    /// True when no source was consulted and there is too little context to
    /// continue from. A lookup that failed or found nothing is still answered.
    pub fn is_greeting(&self, inputs: &AnswerInputs) -> bool {
        inputs.documents.trim().is_empty()
            && inputs.tabular.trim().is_empty()
            && inputs.failures.is_empty()
            && inputs.misses.is_empty()
            && inputs.context.chars().count() < self.settings.greeting_context_threshold
    }

    /// Produce the final answer. Never fails and never returns an empty string.
    pub async fn synthesize_answer(&self, inputs: &AnswerInputs) -> ReflectionOutcome {
        if self.is_greeting(inputs) {
            tracing::info!("No evidence or context, answering with greeting");
            return ReflectionOutcome {
                answer: GREETING.to_string(),
                iterations: 0,
                accepted: true,
                fallback_used: false,
                greeting: true,
            };
        }

        let mut last: Option<String> = None;
        let mut iterations = 0;
        let mut accepted = false;

        while iterations < self.settings.max_iterations {
            let candidate = match self.generator.generate(inputs, last.as_deref()).await {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    tracing::warn!("Candidate generation failed: {}", e);
                    break;
                }
            };
            iterations += 1;

            let verdict = match self.evaluator.evaluate(&inputs.question, &candidate).await {
                Ok(verdict) => verdict,
                Err(e) => {
                    tracing::warn!("Evaluation failed, keeping candidate: {}", e);
                    Verdict::Accept
                }
            };
            tracing::debug!("Reflection iteration {}: {:?}", iterations, verdict);

            last = Some(candidate);
            if verdict == Verdict::Accept {
                accepted = true;
                break;
            }
        }

        let answer = last
            .map(|candidate| {
                dedupe::dedupe_sentences(
                    &candidate,
                    self.settings.dedupe_threshold,
                    self.settings.min_sentence_chars,
                )
            })
            .unwrap_or_default();

        if answer.chars().count() >= self.settings.min_answer_chars {
            return ReflectionOutcome {
                answer,
                iterations,
                accepted,
                fallback_used: false,
                greeting: false,
            };
        }

        tracing::info!("Answer too short after {} iterations, using fallback", iterations);
        let answer = match self.generator.fallback(&inputs.question).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                tracing::warn!("Fallback generation returned nothing");
                APOLOGY.to_string()
            }
            Err(e) => {
                tracing::warn!("Fallback generation failed: {}", e);
                APOLOGY.to_string()
            }
        };

        ReflectionOutcome {
            answer,
            iterations,
            accepted,
            fallback_used: true,
            greeting: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_core::AppError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays queued results and records what it was asked.
    struct StubGenerator {
        candidates: Mutex<VecDeque<AppResult<String>>>,
        fallback: Mutex<Option<AppResult<String>>>,
        previous_seen: Mutex<Vec<Option<String>>>,
    }

    impl StubGenerator {
        fn new(candidates: Vec<AppResult<String>>, fallback: Option<AppResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                candidates: Mutex::new(candidates.into()),
                fallback: Mutex::new(fallback),
                previous_seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CandidateGenerator for StubGenerator {
        async fn generate(&self, _inputs: &AnswerInputs, previous: Option<&str>) -> AppResult<String> {
            self.previous_seen
                .lock()
                .unwrap()
                .push(previous.map(str::to_string));
            self.candidates
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AppError::Llm("no more candidates".to_string())))
        }

        async fn fallback(&self, _question: &str) -> AppResult<String> {
            self.fallback
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(AppError::Llm("fallback down".to_string())))
        }
    }

    struct StubEvaluator {
        verdicts: Mutex<VecDeque<AppResult<Verdict>>>,
        calls: Mutex<usize>,
    }

    impl StubEvaluator {
        fn new(verdicts: Vec<AppResult<Verdict>>) -> Arc<Self> {
            Arc::new(Self {
                verdicts: Mutex::new(verdicts.into()),
                calls: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl CandidateEvaluator for StubEvaluator {
        async fn evaluate(&self, _question: &str, _candidate: &str) -> AppResult<Verdict> {
            *self.calls.lock().unwrap() += 1;
            self.verdicts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(Verdict::Reject))
        }
    }

    fn inputs_with_documents() -> AnswerInputs {
        AnswerInputs {
            documents: "Returns are accepted within 30 days.".to_string(),
            ..AnswerInputs::new("What is your return policy?")
        }
    }

    fn ok(text: &str) -> AppResult<String> {
        Ok(text.to_string())
    }

    #[test]
    fn test_verdict_parse() {
        assert_eq!(Verdict::parse("YES"), Verdict::Accept);
        assert_eq!(Verdict::parse("yes."), Verdict::Accept);
        assert_eq!(Verdict::parse("No, it is too long"), Verdict::Reject);
        assert_eq!(Verdict::parse("Answer: YES"), Verdict::Accept);
        assert_eq!(Verdict::parse("maybe"), Verdict::Reject);
        assert_eq!(Verdict::parse(""), Verdict::Reject);
    }

    #[test]
    fn test_pitch_needs_tabular_evidence() {
        let mut inputs = AnswerInputs::new("Why should I buy these headphones?");
        assert!(inputs.is_persuasive());
        assert!(!inputs.wants_pitch());
        inputs.tabular = "products: price: 199.99".to_string();
        assert!(inputs.wants_pitch());
    }

    #[tokio::test]
    async fn test_greeting_skips_generation() {
        let generator = StubGenerator::new(vec![], None);
        let evaluator = StubEvaluator::new(vec![]);
        let reflector = Reflector::new(generator.clone(), evaluator.clone(), ReflectionSettings::default());

        let outcome = reflector.synthesize_answer(&AnswerInputs::new("Hello")).await;
        assert_eq!(outcome.answer, GREETING);
        assert!(outcome.greeting);
        assert!(generator.previous_seen.lock().unwrap().is_empty());
        assert_eq!(*evaluator.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failures_suppress_greeting() {
        let generator = StubGenerator::new(
            vec![ok("Our product catalogue is unavailable at the moment, sorry.")],
            None,
        );
        let reflector = Reflector::new(
            generator,
            StubEvaluator::new(vec![Ok(Verdict::Accept)]),
            ReflectionSettings::default(),
        );

        let mut inputs = AnswerInputs::new("Is product 42 in stock?");
        inputs.failures.push("products: connection refused".to_string());
        let outcome = reflector.synthesize_answer(&inputs).await;
        assert!(!outcome.greeting);
        assert!(outcome.answer.contains("unavailable"));
    }

    #[tokio::test]
    async fn test_empty_lookup_suppresses_greeting() {
        let generator = StubGenerator::new(
            vec![ok("We don't carry a product with id 999, sorry.")],
            None,
        );
        let reflector = Reflector::new(
            generator,
            StubEvaluator::new(vec![Ok(Verdict::Accept)]),
            ReflectionSettings::default(),
        );

        let mut inputs = AnswerInputs::new("Is product 999 in stock?");
        inputs.misses.push("products: no matching rows".to_string());
        assert!(!reflector.is_greeting(&inputs));

        let outcome = reflector.synthesize_answer(&inputs).await;
        assert!(!outcome.greeting);
        assert_eq!(outcome.answer, "We don't carry a product with id 999, sorry.");
    }

    #[tokio::test]
    async fn test_accepts_first_good_candidate() {
        let generator = StubGenerator::new(
            vec![ok("Unused items can be returned within 30 days for a full refund.")],
            None,
        );
        let evaluator = StubEvaluator::new(vec![Ok(Verdict::Accept)]);
        let reflector = Reflector::new(generator, evaluator.clone(), ReflectionSettings::default());

        let outcome = reflector.synthesize_answer(&inputs_with_documents()).await;
        assert_eq!(outcome.iterations, 1);
        assert!(outcome.accepted);
        assert!(!outcome.fallback_used);
        assert_eq!(*evaluator.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_keeps_last_candidate() {
        let generator = StubGenerator::new(
            vec![
                ok("Based on the data, returns are fine within 30 days."),
                ok("Returns are accepted within thirty days, no questions asked."),
                ok("You can return unused items within 30 days of delivery."),
            ],
            None,
        );
        let evaluator = StubEvaluator::new(vec![
            Ok(Verdict::Reject),
            Ok(Verdict::Reject),
            Ok(Verdict::Reject),
        ]);
        let reflector = Reflector::new(generator.clone(), evaluator, ReflectionSettings::default());

        let outcome = reflector.synthesize_answer(&inputs_with_documents()).await;
        assert_eq!(outcome.iterations, 3);
        assert!(!outcome.accepted);
        assert_eq!(
            outcome.answer,
            "You can return unused items within 30 days of delivery."
        );

        // each retry sees the rejected candidate
        let seen = generator.previous_seen.lock().unwrap().clone();
        assert_eq!(seen[0], None);
        assert_eq!(
            seen[1].as_deref(),
            Some("Based on the data, returns are fine within 30 days.")
        );
    }

    #[tokio::test]
    async fn test_evaluator_error_accepts_candidate() {
        let generator = StubGenerator::new(
            vec![ok("Unused items can be returned within 30 days.")],
            None,
        );
        let evaluator = StubEvaluator::new(vec![Err(AppError::Llm("timeout".to_string()))]);
        let reflector = Reflector::new(generator, evaluator, ReflectionSettings::default());

        let outcome = reflector.synthesize_answer(&inputs_with_documents()).await;
        assert!(outcome.accepted);
        assert_eq!(outcome.answer, "Unused items can be returned within 30 days.");
    }

    #[tokio::test]
    async fn test_short_answer_uses_fallback_verbatim() {
        let generator = StubGenerator::new(
            vec![ok("Ok.")],
            Some(ok("I can help with returns, shipping and product questions.")),
        );
        let evaluator = StubEvaluator::new(vec![Ok(Verdict::Accept)]);
        let reflector = Reflector::new(generator, evaluator, ReflectionSettings::default());

        let outcome = reflector.synthesize_answer(&inputs_with_documents()).await;
        assert!(outcome.fallback_used);
        assert_eq!(
            outcome.answer,
            "I can help with returns, shipping and product questions."
        );
    }

    #[tokio::test]
    async fn test_generation_down_returns_apology() {
        let generator = StubGenerator::new(
            vec![Err(AppError::Llm("connection refused".to_string()))],
            None,
        );
        let evaluator = StubEvaluator::new(vec![]);
        let reflector = Reflector::new(generator, evaluator.clone(), ReflectionSettings::default());

        let outcome = reflector.synthesize_answer(&inputs_with_documents()).await;
        assert_eq!(outcome.answer, APOLOGY);
        assert_eq!(outcome.iterations, 0);
        assert!(outcome.fallback_used);
        assert_eq!(*evaluator.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_fallback_returns_apology() {
        let generator = StubGenerator::new(vec![ok("")], Some(ok("   ")));
        let reflector = Reflector::new(
            generator,
            StubEvaluator::new(vec![Ok(Verdict::Accept)]),
            ReflectionSettings::default(),
        );

        let outcome = reflector.synthesize_answer(&inputs_with_documents()).await;
        assert_eq!(outcome.answer, APOLOGY);
    }

    #[tokio::test]
    async fn test_answer_is_deduplicated() {
        let generator = StubGenerator::new(
            vec![ok(
                "Returns are accepted within 30 days of delivery. \
                 Returns are accepted within 30 days of the delivery.",
            )],
            None,
        );
        let reflector = Reflector::new(
            generator,
            StubEvaluator::new(vec![Ok(Verdict::Accept)]),
            ReflectionSettings::default(),
        );

        let outcome = reflector.synthesize_answer(&inputs_with_documents()).await;
        assert_eq!(outcome.answer, "Returns are accepted within 30 days of delivery.");
    }
}
