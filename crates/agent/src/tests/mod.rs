//! Whole-turn scenarios against scripted backends and an in-memory store.


use crate::orchestrator::Orchestrator;
use concierge_core::AppConfig;
use concierge_knowledge::{CorpusSource, DocumentSource, SqliteSource, TabularSource};
use concierge_llm::{LlmRequest, ScriptedClient};
use concierge_prompt::PromptLibrary;
use rusqlite::Connection;
use std::sync::Arc;

/// Pipeline stage a request was rendered for, recognised by prompt text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Route,
    Select,
    JoinPlan,
    Compose,
    Evaluate,
    Fallback,
}

pub(crate) fn stage_of(request: &LlmRequest) -> Stage {
    let prompt = &request.prompt;
    if prompt.contains("Reply with exactly one of these labels") {
        Stage::Route
    } else if prompt.contains("Produce query parameters") {
        Stage::Select
    } else if prompt.contains("Choose the primary table") {
        Stage::JoinPlan
    } else if prompt.contains("Answer YES or NO.") {
        Stage::Evaluate
    } else if prompt.contains("The customer said:") {
        Stage::Fallback
    } else {
        Stage::Compose
    }
}

/// Fixed reply per stage.
#[derive(Clone)]
pub(crate) struct Script {
    pub route: &'static str,
    pub select: &'static str,
    pub join_plan: &'static str,
    pub answer: &'static str,
    pub verdict: &'static str,
    pub fallback: &'static str,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            route: "general",
            select: r#"{"select": "*"}"#,
            join_plan: r#"{"primary": "products", "joins": []}"#,
            answer: "Happy to help with that.",
            verdict: "YES",
            fallback: "I can help with products and store policies.",
        }
    }
}

pub(crate) fn scripted(script: Script) -> Arc<ScriptedClient> {
    Arc::new(ScriptedClient::new(move |request| {
        let reply = match stage_of(request) {
            Stage::Route => script.route,
            Stage::Select => script.select,
            Stage::JoinPlan => script.join_plan,
            Stage::Compose => script.answer,
            Stage::Evaluate => script.verdict,
            Stage::Fallback => script.fallback,
        };
        Ok(reply.to_string())
    }))
}

/// Prompts sent for `stage`, in order.
pub(crate) fn prompts_for(client: &ScriptedClient, stage: Stage) -> Vec<String> {
    client
        .requests()
        .into_iter()
        .filter(|request| stage_of(request) == stage)
        .map(|request| request.prompt)
        .collect()
}

pub(crate) fn policy_documents() -> Arc<dyn DocumentSource> {
    Arc::new(CorpusSource::from_texts(
        [
            (
                "returns.md",
                "Our return policy allows returns of unused items within 30 days of delivery.",
            ),
            (
                "shipping.md",
                "Standard shipping takes three to five business days within the country.",
            ),
        ],
        1000,
        2,
        0.1,
    ))
}

pub(crate) fn store() -> Arc<dyn TabularSource> {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        r#"
        CREATE TABLE products (
            product_id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            category TEXT,
            price REAL,
            stock INTEGER
        );
        INSERT INTO products VALUES
            (7, 'USB-C Cable', 'accessories', 9.5, 0),
            (13, 'Bluetooth Speaker', 'audio', 59.0, 12),
            (42, 'Noise Cancelling Headphones', 'audio', 199.99, 5);

        CREATE TABLE users (
            user_id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT
        );
        INSERT INTO users VALUES
            (1, 'Ada', 'ada@example.com'),
            (2, 'Grace', 'grace@example.com');

        CREATE TABLE transactions (
            transaction_id INTEGER PRIMARY KEY,
            user_id INTEGER,
            product_id INTEGER,
            quantity INTEGER
        );
        INSERT INTO transactions VALUES
            (100, 1, 42, 1),
            (101, 1, 7, 2),
            (102, 2, 13, 1);
        "#,
    )
    .unwrap();

    let collections = AppConfig::default().sources.collections;
    Arc::new(SqliteSource::from_connection(conn, &collections).unwrap())
}

pub(crate) fn orchestrator(
    config: &AppConfig,
    client: Arc<ScriptedClient>,
    documents: Arc<dyn DocumentSource>,
    tabular: Option<Arc<dyn TabularSource>>,
) -> Orchestrator {
    Orchestrator::from_config(
        config,
        client,
        Arc::new(PromptLibrary::builtin().unwrap()),
        documents,
        tabular,
    )
}
