//! Output formatting for scan outcomes.
//!
//! Two formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: structured output for programmatic consumption

use colored::*;
use serde::{Deserialize, Serialize};

use crate::client::{ScanOutcome, TaskStatus};

/// JSON report structure.
#[derive(Serialize, Deserialize)]
pub struct JsonReport {
    pub version: String,
    pub server_url: String,
    pub project_key: String,
    pub task_id: String,
    pub status: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl JsonReport {
    pub fn new(server_url: &str, project_key: &str, outcome: &ScanOutcome) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            server_url: server_url.to_string(),
            project_key: project_key.to_string(),
            task_id: outcome.task_id.clone(),
            status: outcome.status.to_string(),
            passed: outcome.passed(),
            error_message: outcome.error_message.clone(),
        }
    }
}

/// Write the outcome as JSON to stdout.
pub fn write_json(
    server_url: &str,
    project_key: &str,
    outcome: &ScanOutcome,
) -> anyhow::Result<()> {
    let report = JsonReport::new(server_url, project_key, outcome);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Write the outcome in colored human-readable form to stdout.
pub fn write_pretty(server_url: &str, project_key: &str, outcome: &ScanOutcome) {
    println!();
    println!("{}", "Scan submitted".bold());
    println!("  server:  {}", server_url);
    println!("  project: {}", project_key);
    println!("  task:    {}", outcome.task_id);
    println!();

    let status = match outcome.status {
        TaskStatus::Success => outcome.status.to_string().green().bold(),
        TaskStatus::Failed | TaskStatus::Canceled => outcome.status.to_string().red().bold(),
        _ => outcome.status.to_string().yellow().bold(),
    };
    println!("  status:  {}", status);

    if let Some(message) = &outcome.error_message {
        println!("  detail:  {}", message.red());
    }
    println!();
}
