//! Ask command handler.
//!
//! Runs a single turn and prints the answer, or the answer plus the turn
//! report as JSON.

use crate::runtime;
use anyhow::Context;
use clap::Args;
use concierge_core::{config::AppConfig, AppError};
use std::path::PathBuf;

/// Ask one question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "question")]
    pub file: Option<PathBuf>,

    /// Output the answer and turn report as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let question = self.question()?;
        let mut orchestrator = runtime::build_orchestrator(config)?;

        let answer = orchestrator.process_query(&question).await;

        if self.json {
            let output = serde_json::json!({
                "answer": answer,
                "provider": config.provider,
                "model": config.model,
                "report": orchestrator.last_report(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", answer);
        }

        Ok(())
    }

    fn question(&self) -> anyhow::Result<String> {
        if let Some(question) = &self.question {
            return Ok(question.clone());
        }
        match &self.file {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read question from {:?}", path)),
            None => Err(AppError::Turn("No question provided".to_string()).into()),
        }
    }
}
