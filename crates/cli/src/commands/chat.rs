//! Chat command handler.
//!
//! Interactive loop over one session. `exit` or `quit` leave, `/reset`
//! starts a new session and `/report` prints the last turn report.

use crate::runtime;
use clap::Args;
use concierge_core::config::AppConfig;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Start an interactive conversation
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Prompt shown before each question
    #[arg(long, default_value = "> ")]
    pub prompt: String,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing chat command");

        let mut orchestrator = runtime::build_orchestrator(config)?;
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        println!("Ask about products or store policies. Type 'exit' to leave.");

        loop {
            print!("{}", self.prompt);
            std::io::stdout().flush().ok();

            let Some(line) = lines.next_line().await? else {
                break;
            };

            match line.trim() {
                "exit" | "quit" => break,
                "/reset" => {
                    orchestrator.reset();
                    println!("Started a new conversation.");
                }
                "/report" => match orchestrator.last_report() {
                    Some(report) => println!("{}", serde_json::to_string_pretty(report)?),
                    None => println!("No turns yet."),
                },
                question => {
                    let answer = orchestrator.process_query(question).await;
                    println!("{}", answer);
                }
            }
        }

        tracing::info!(
            "Chat session {} ended after {} exchanges",
            orchestrator.session_id(),
            orchestrator.context().len()
        );
        Ok(())
    }
}
