//! Wiring shared by every command: backend client, prompts and evidence sources.

use anyhow::{anyhow, Context};
use concierge_agent::Orchestrator;
use concierge_core::config::{AppConfig, ProviderConfig};
use concierge_knowledge::{CorpusSource, DocumentSource, SqliteSource, TabularSource};
use concierge_llm::{create_client, LlmClient};
use concierge_prompt::PromptLibrary;
use std::sync::Arc;

/// Backend client for the active provider.
pub fn build_client(config: &AppConfig) -> anyhow::Result<Arc<dyn LlmClient>> {
    config.validate()?;

    let timeout = match config.get_provider_config(&config.provider) {
        Some(ProviderConfig::Ollama { timeout, .. }) => *timeout,
        _ => None,
    };
    let api_key = config.resolve_api_key(&config.provider);

    create_client(&config.provider, config.endpoint(), api_key.as_deref(), timeout)
        .map_err(|e| anyhow!(e))
        .with_context(|| format!("Failed to create '{}' client", config.provider))
}

/// Policy corpus from `sources.documentsDir`. A missing directory yields an
/// empty corpus.
pub fn open_documents(config: &AppConfig) -> anyhow::Result<Arc<dyn DocumentSource>> {
    let sources = &config.sources;
    let dir = config.resolve_path(&sources.documents_dir);
    let corpus = CorpusSource::load(&dir, sources.chunk_size, sources.top_k, sources.min_relevance)
        .with_context(|| format!("Failed to load documents from {:?}", dir))?;

    tracing::info!("Loaded {} passages from {:?}", corpus.passages().len(), dir);
    Ok(Arc::new(corpus))
}

/// Tabular store from `sources.databasePath`, or `None` when it cannot be
/// opened. Tabular routes then report the store as unavailable.
pub fn open_tabular(config: &AppConfig) -> Option<Arc<dyn TabularSource>> {
    let path = config.resolve_path(&config.sources.database_path);
    match SqliteSource::open(&path, &config.sources.collections) {
        Ok(source) => Some(Arc::new(source)),
        Err(e) => {
            tracing::warn!("Tabular source unavailable: {}", e);
            None
        }
    }
}

/// Everything a conversation needs, built once per process.
pub fn build_orchestrator(config: &AppConfig) -> anyhow::Result<Orchestrator> {
    let client = build_client(config)?;
    let prompts = PromptLibrary::load(&config.workspace).context("Failed to load prompts")?;
    let documents = open_documents(config)?;
    let tabular = open_tabular(config);

    Ok(Orchestrator::from_config(
        config,
        client,
        Arc::new(prompts),
        documents,
        tabular,
    ))
}
