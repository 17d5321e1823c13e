//! HTTP client for submitting scans to a SonarQube-compatible server.
//!
//! Endpoints used:
//! - GET  {server}/api/server/version  - reachability probe
//! - POST {server}/api/ce/submit       - submit scan properties, returns a task id
//! - GET  {server}/api/ce/task?id={id} - poll compute engine task state
//!
//! The token authenticates as HTTP basic auth with an empty password,
//! the convention SonarQube uses for user tokens.

use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::ScanConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur while talking to the scan server.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("request timed out")]
    Timeout,
    #[error("authentication rejected by server (check {})", crate::config::TOKEN_ENV_VAR)]
    AuthRejected,
    #[error("server unavailable: {0}")]
    Unavailable(String),
    #[error("malformed server response: {0}")]
    Malformed(String),
    #[error("task {0} did not reach a terminal state within the poll timeout")]
    PollTimeout(String),
}

/// State of a compute engine task as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Success,
    Failed,
    Canceled,
}

impl TaskStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(TaskStatus::Pending),
            "IN_PROGRESS" => Some(TaskStatus::InProgress),
            "SUCCESS" => Some(TaskStatus::Success),
            "FAILED" => Some(TaskStatus::Failed),
            "CANCELED" => Some(TaskStatus::Canceled),
            _ => None,
        }
    }

    /// Whether the task will make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Failed | TaskStatus::Canceled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Canceled => "CANCELED",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Final result of a submitted scan.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub task_id: String,
    pub status: TaskStatus,
    /// Failure detail reported by the server, if any.
    pub error_message: Option<String>,
}

impl ScanOutcome {
    pub fn passed(&self) -> bool {
        self.status == TaskStatus::Success
    }
}

#[derive(Deserialize)]
struct SubmitResponse {
    #[serde(rename = "taskId")]
    task_id: String,
}

#[derive(Deserialize)]
struct TaskResponse {
    task: TaskBody,
}

#[derive(Deserialize)]
struct TaskBody {
    status: String,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

/// Client bound to one server and one token.
pub struct ScanClient {
    http: Client,
    base_url: String,
    token: String,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl ScanClient {
    /// Create a client for the given configuration and resolved token.
    pub fn new(config: &ScanConfig, server_url: String, token: String) -> Self {
        let http = Client::builder()
            .user_agent(concat!("sonar-invoke/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to create HTTP client");

        Self {
            http,
            base_url: server_url.trim_end_matches('/').to_string(),
            token,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            poll_timeout: Duration::from_secs(config.poll_timeout_secs),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn map_send_error(e: reqwest::Error) -> ClientError {
        if e.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Network(e)
        }
    }

    /// Probe the server and return its version string.
    pub async fn server_version(&self) -> Result<String, ClientError> {
        let response = self
            .http
            .get(self.endpoint("api/server/version"))
            .basic_auth(&self.token, None::<&str>)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        match response.status().as_u16() {
            200 => Ok(response.text().await.map_err(ClientError::Network)?),
            401 | 403 => Err(ClientError::AuthRejected),
            status => Err(ClientError::Unavailable(format!("HTTP {}", status))),
        }
    }

    /// Submit the scan properties and return the compute engine task id.
    pub async fn submit(
        &self,
        properties: &BTreeMap<String, String>,
    ) -> Result<String, ClientError> {
        let response = self
            .http
            .post(self.endpoint("api/ce/submit"))
            .basic_auth(&self.token, None::<&str>)
            .form(properties)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        match response.status().as_u16() {
            200 => {
                let body: SubmitResponse = response
                    .json()
                    .await
                    .map_err(|e| ClientError::Malformed(e.to_string()))?;
                Ok(body.task_id)
            }
            401 | 403 => Err(ClientError::AuthRejected),
            status => Err(ClientError::Unavailable(format!("HTTP {}", status))),
        }
    }

    /// Fetch the current state of a compute engine task.
    pub async fn task_status(
        &self,
        task_id: &str,
    ) -> Result<(TaskStatus, Option<String>), ClientError> {
        let response = self
            .http
            .get(self.endpoint("api/ce/task"))
            .query(&[("id", task_id)])
            .basic_auth(&self.token, None::<&str>)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        match response.status().as_u16() {
            200 => {
                let body: TaskResponse = response
                    .json()
                    .await
                    .map_err(|e| ClientError::Malformed(e.to_string()))?;
                let status = TaskStatus::parse(&body.task.status).ok_or_else(|| {
                    ClientError::Malformed(format!("unknown task status {:?}", body.task.status))
                })?;
                Ok((status, body.task.error_message))
            }
            401 | 403 => Err(ClientError::AuthRejected),
            status => Err(ClientError::Unavailable(format!("HTTP {}", status))),
        }
    }

    /// Poll the task until it reaches a terminal state or the configured
    /// poll timeout elapses.
    pub async fn wait_for_task(&self, task_id: &str) -> Result<ScanOutcome, ClientError> {
        let deadline = poll_deadline(self.poll_timeout);

        loop {
            let (status, error_message) = self.task_status(task_id).await?;
            if status.is_terminal() {
                return Ok(ScanOutcome {
                    task_id: task_id.to_string(),
                    status,
                    error_message,
                });
            }
            if deadline.map_or(false, |d| Instant::now() >= d) {
                return Err(ClientError::PollTimeout(task_id.to_string()));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Deadline for the poll loop. A timeout too large to represent as an
/// `Instant` means no deadline rather than an overflow panic.
fn poll_deadline(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_parse() {
        assert_eq!(TaskStatus::parse("SUCCESS"), Some(TaskStatus::Success));
        assert_eq!(TaskStatus::parse("FAILED"), Some(TaskStatus::Failed));
        assert_eq!(TaskStatus::parse("CANCELED"), Some(TaskStatus::Canceled));
        assert_eq!(TaskStatus::parse("PENDING"), Some(TaskStatus::Pending));
        assert_eq!(TaskStatus::parse("IN_PROGRESS"), Some(TaskStatus::InProgress));
        assert_eq!(TaskStatus::parse("RUNNING"), None);
    }

    #[test]
    fn test_task_status_terminal() {
        assert!(TaskStatus::Success.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Canceled.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let client = ScanClient::new(
            &ScanConfig::default(),
            "http://localhost:9000/".to_string(),
            "t".to_string(),
        );
        assert_eq!(
            client.endpoint("api/ce/submit"),
            "http://localhost:9000/api/ce/submit"
        );
    }

    #[test]
    fn test_task_response_deserializes() {
        let json = r#"{"task":{"id":"AYx1","status":"FAILED","errorMessage":"analysis error"}}"#;
        let body: TaskResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.task.status, "FAILED");
        assert_eq!(body.task.error_message.as_deref(), Some("analysis error"));
    }

    #[test]
    fn test_poll_deadline_survives_huge_timeout() {
        // A bounded timeout yields a deadline
        assert!(poll_deadline(Duration::from_secs(300)).is_some());
        // An unrepresentable one disables the deadline instead of panicking
        assert_eq!(poll_deadline(Duration::from_secs(u64::MAX)), None);
    }

    #[test]
    fn test_auth_error_names_the_token_variable() {
        let message = ClientError::AuthRejected.to_string();
        assert!(message.contains(crate::config::TOKEN_ENV_VAR));
    }

    #[test]
    fn test_outcome_passed() {
        let outcome = ScanOutcome {
            task_id: "t1".to_string(),
            status: TaskStatus::Success,
            error_message: None,
        };
        assert!(outcome.passed());

        let outcome = ScanOutcome {
            status: TaskStatus::Failed,
            ..outcome
        };
        assert!(!outcome.passed());
    }
}
