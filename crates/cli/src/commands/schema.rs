//! Schema command handler.

use crate::runtime;
use clap::Args;
use concierge_agent::SchemaCatalog;
use concierge_core::{config::AppConfig, AppError};

/// Show collection schemas as the query prompts see them
#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Collection to describe (default: all configured collections)
    pub collection: Option<String>,

    /// Example rows per collection
    #[arg(long)]
    pub sample_rows: Option<usize>,
}

impl SchemaCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing schema command");

        let source = runtime::open_tabular(config).ok_or_else(|| {
            AppError::Adapter(format!(
                "No tabular database at {:?}",
                config.resolve_path(&config.sources.database_path)
            ))
        })?;
        let catalog = SchemaCatalog::new(
            source,
            self.sample_rows.unwrap_or(config.sources.sample_rows),
        );

        let schemas = match &self.collection {
            Some(collection) => vec![catalog.describe(collection).await?],
            None => catalog.describe_all().await,
        };

        let rendered: Vec<String> = schemas.iter().map(|schema| schema.render()).collect();
        println!("{}", rendered.join("\n\n"));

        Ok(())
    }
}
