//! Configuration management for Concierge.
//!
//! Configuration is layered, later sources winning:
//! - Built-in defaults
//! - Config file (`.concierge/config.yaml`, or `CONCIERGE_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric: relative paths in the `sources`
//! section resolve against the workspace root.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Name of the per-workspace state directory.
pub const STATE_DIR: &str = ".concierge";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .concierge/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Active LLM provider (e.g., "ollama", "openai")
    pub provider: String,

    /// Default model identifier
    pub model: String,

    /// API key for the LLM provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Turn pipeline tuning
    pub pipeline: PipelineConfig,

    /// Evidence source locations
    pub sources: SourcesConfig,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    /// Any OpenAI-compatible chat completions endpoint (OpenAI, Groq, ...)
    OpenAI {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Model configured for this provider.
    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::OpenAI { model, .. } | ProviderConfig::Ollama { model, .. } => model,
        }
    }

    /// Endpoint override, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ProviderConfig::OpenAI { endpoint, .. } => endpoint.as_deref(),
            ProviderConfig::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }
}

/// Tuning for a single conversational turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// Upper bound on generate/evaluate rounds in the reflection loop
    pub max_reflection_iterations: u32,

    /// Character budget for the rolling conversation context
    pub context_budget_chars: usize,

    /// Context shorter than this counts as "no context" for the greeting shortcut
    pub greeting_context_threshold: usize,

    /// Sentences more similar than this to an earlier sentence are dropped
    pub dedupe_threshold: f32,

    /// Sentences shorter than this always survive de-duplication
    pub min_sentence_chars: usize,

    /// Answers shorter than this trigger the fallback generation
    pub min_answer_chars: usize,

    /// Optional deadline wrapping a whole turn
    pub turn_timeout_secs: Option<u64>,

    /// Per-stage model overrides
    pub models: StageModels,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_reflection_iterations: 3,
            context_budget_chars: 800,
            greeting_context_threshold: 50,
            dedupe_threshold: 0.7,
            min_sentence_chars: 20,
            min_answer_chars: 12,
            turn_timeout_secs: None,
            models: StageModels::default(),
        }
    }
}

/// Optional model per pipeline stage. Unset stages use the active model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StageModels {
    pub router: Option<String>,
    pub query: Option<String>,
    pub answer: Option<String>,
    pub evaluator: Option<String>,
}

/// Evidence source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourcesConfig {
    /// Directory holding the document corpus (.txt / .md)
    pub documents_dir: PathBuf,

    /// SQLite database backing the tabular source
    pub database_path: PathBuf,

    /// Collections exposed to query synthesis
    pub collections: Vec<String>,

    /// Collection used when a question names none
    pub default_collection: Option<String>,

    /// Example rows included in a schema description
    pub sample_rows: usize,

    /// Passages returned per document lookup
    pub top_k: usize,

    /// Target characters per document chunk
    pub chunk_size: usize,

    /// Passages scoring below this are ignored
    pub min_relevance: f32,

    /// Known join hints between collections
    pub relationships: Vec<Relationship>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from(STATE_DIR).join("documents"),
            database_path: PathBuf::from(STATE_DIR).join("data.sqlite"),
            collections: vec![
                "products".to_string(),
                "users".to_string(),
                "transactions".to_string(),
            ],
            default_collection: None,
            sample_rows: 5,
            top_k: 2,
            chunk_size: 1000,
            min_relevance: 0.1,
            relationships: vec![
                Relationship::new("transactions", "user_id", "users", "user_id"),
                Relationship::new("transactions", "product_id", "products", "product_id"),
            ],
        }
    }
}

impl SourcesConfig {
    /// Collection used when a question does not name one.
    pub fn default_collection(&self) -> Option<&str> {
        self.default_collection
            .as_deref()
            .or_else(|| self.collections.first().map(String::as_str))
    }
}

/// A known link between two collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub from_collection: String,
    pub from_field: String,
    pub to_collection: String,
    pub to_field: String,
}

impl Relationship {
    pub fn new(
        from_collection: impl Into<String>,
        from_field: impl Into<String>,
        to_collection: impl Into<String>,
        to_field: impl Into<String>,
    ) -> Self {
        Self {
            from_collection: from_collection.into(),
            from_field: from_field.into(),
            to_collection: to_collection.into(),
            to_field: to_field.into(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    pipeline: Option<PipelineConfig>,
    sources: Option<SourcesConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            llm: None,
            pipeline: PipelineConfig::default(),
            sources: SourcesConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the config file, environment variables and defaults.
    ///
    /// Environment variables:
    /// - `CONCIERGE_WORKSPACE`: Override workspace path
    /// - `CONCIERGE_CONFIG`: Path to config file
    /// - `CONCIERGE_PROVIDER`: LLM provider
    /// - `CONCIERGE_MODEL`: Model identifier
    /// - `CONCIERGE_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("CONCIERGE_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("CONCIERGE_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.state_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("CONCIERGE_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("CONCIERGE_MODEL") {
            config.model = model;
        }

        config.api_key = std::env::var("CONCIERGE_API_KEY").ok();
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();
            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }
            result.llm = Some(llm);
        }

        if let Some(pipeline) = config_file.pipeline {
            result.pipeline = pipeline;
        }

        if let Some(sources) = config_file.sources {
            result.sources = sources;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .concierge directory.
    pub fn state_dir(&self) -> PathBuf {
        self.workspace.join(STATE_DIR)
    }

    /// Resolve a possibly relative path against the workspace.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    /// Get the configuration block for a provider.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Endpoint configured for the active provider, if any.
    pub fn endpoint(&self) -> Option<&str> {
        self.get_provider_config(&self.provider)
            .and_then(ProviderConfig::endpoint)
    }

    /// Resolve API key, preferring `CONCIERGE_API_KEY` over the provider's key variable.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        match self.get_provider_config(provider) {
            Some(ProviderConfig::OpenAI { api_key_env, .. }) => std::env::var(api_key_env).ok(),
            _ => None,
        }
    }

    /// Model for a pipeline stage, falling back to the active model.
    pub fn stage_model(&self, stage: Option<&String>) -> String {
        stage.cloned().unwrap_or_else(|| self.model.clone())
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let known_providers = ["openai", "groq", "ollama"];

        if !known_providers.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                known_providers.join(", ")
            )));
        }

        if let Some(ProviderConfig::OpenAI { api_key_env, .. }) =
            self.get_provider_config(&self.provider)
        {
            if self.api_key.is_none() && std::env::var(api_key_env).is_err() {
                return Err(AppError::Config(format!(
                    "API key not found in environment variable: {}",
                    api_key_env
                )));
            }
        }

        if self.pipeline.max_reflection_iterations == 0 {
            return Err(AppError::Config(
                "pipeline.maxReflectionIterations must be at least 1".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.pipeline.dedupe_threshold) {
            return Err(AppError::Config(format!(
                "pipeline.dedupeThreshold must be within 0..1, got {}",
                self.pipeline.dedupe_threshold
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.pipeline.max_reflection_iterations, 3);
        assert_eq!(config.pipeline.context_budget_chars, 800);
        assert_eq!(config.sources.default_collection(), Some("products"));
        assert_eq!(config.sources.relationships.len(), 2);
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            None,
            Some("openai".to_string()),
            Some("gpt-4o-mini".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.provider, "openai");
        assert_eq!(overridden.model, "gpt-4o-mini");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml_sections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            r#"
llm:
  activeProvider: groq
  providers:
    groq:
      apiKeyEnv: GROQ_API_KEY
      model: llama-3.1-8b-instant
      endpoint: https://api.groq.com/openai/v1
pipeline:
  maxReflectionIterations: 2
  models:
    query: llama-3.3-70b-versatile
sources:
  collections: [products]
  topK: 4
logging:
  level: info
  color: false
"#,
        )
        .unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.provider, "groq");
        assert_eq!(merged.model, "llama-3.1-8b-instant");
        assert_eq!(merged.endpoint(), Some("https://api.groq.com/openai/v1"));
        assert_eq!(merged.pipeline.max_reflection_iterations, 2);
        // Unspecified pipeline fields keep their defaults
        assert_eq!(merged.pipeline.context_budget_chars, 800);
        assert_eq!(
            merged.stage_model(merged.pipeline.models.query.as_ref()),
            "llama-3.3-70b-versatile"
        );
        assert_eq!(
            merged.stage_model(merged.pipeline.models.router.as_ref()),
            "llama-3.1-8b-instant"
        );
        assert_eq!(merged.sources.collections, vec!["products".to_string()]);
        assert_eq!(merged.sources.top_k, 4);
        assert_eq!(merged.log_level, Some("info".to_string()));
        assert!(merged.no_color);
    }

    #[test]
    fn test_merge_yaml_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "pipeline: [not, a, map]").unwrap();
        assert!(matches!(
            AppConfig::default().merge_yaml(&path),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_resolve_path() {
        let mut config = AppConfig::default();
        config.workspace = PathBuf::from("/srv/shop");
        assert_eq!(
            config.resolve_path(Path::new(".concierge/data.sqlite")),
            PathBuf::from("/srv/shop/.concierge/data.sqlite")
        );
        assert_eq!(
            config.resolve_path(Path::new("/tmp/data.sqlite")),
            PathBuf::from("/tmp/data.sqlite")
        );
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ollama() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_iterations() {
        let mut config = AppConfig::default();
        config.pipeline.max_reflection_iterations = 0;
        assert!(config.validate().is_err());
    }
}
