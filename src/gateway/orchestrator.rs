use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Terminal-or-not state of a workflow run as reported by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    Queued,
    Running,
    Success,
    Failed,
    /// Any state this service does not act on.
    Other(String),
}

impl RunState {
    fn from_wire(state: &str) -> Self {
        match state {
            "queued" => RunState::Queued,
            "running" => RunState::Running,
            "success" => RunState::Success,
            "failed" => RunState::Failed,
            other => RunState::Other(other.to_string()),
        }
    }
}

/// Workflow orchestrator seam: trigger a named DAG and poll its latest run.
#[async_trait::async_trait]
pub trait Orchestrator: Send + Sync {
    /// Trigger a run of the named workflow with the given configuration.
    async fn trigger_run(&self, dag_id: &str, conf: Value) -> Result<()>;
    /// State of the workflow's latest run.
    async fn latest_run_state(&self, dag_id: &str) -> Result<RunState>;
}

/// Airflow REST client. Basic auth, fixed request timeout; a timeout is a
/// generic upstream failure to the caller.
#[derive(Debug, Clone)]
pub struct AirflowOrchestrator {
    http: reqwest::Client,
    endpoint: String,
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct DagRunResponse {
    state: String,
}

impl AirflowOrchestrator {
    pub fn new(endpoint: &str, username: &str, password: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build orchestrator HTTP client")?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl Orchestrator for AirflowOrchestrator {
    async fn trigger_run(&self, dag_id: &str, conf: Value) -> Result<()> {
        let url = format!("{}/api/v1/dags/{}/dagRuns", self.endpoint, dag_id);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&serde_json::json!({ "conf": conf }))
            .send()
            .await
            .with_context(|| format!("Failed to trigger DAG {dag_id}"))?;

        response
            .error_for_status()
            .with_context(|| format!("Orchestrator rejected trigger for DAG {dag_id}"))?;
        Ok(())
    }

    async fn latest_run_state(&self, dag_id: &str) -> Result<RunState> {
        let url = format!("{}/api/v1/dags/{}/dagRuns/latest", self.endpoint, dag_id);
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .with_context(|| format!("Failed to query latest run of DAG {dag_id}"))?
            .error_for_status()
            .with_context(|| format!("Orchestrator rejected run query for DAG {dag_id}"))?;

        let run: DagRunResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to decode run state for DAG {dag_id}"))?;
        Ok(RunState::from_wire(&run.state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_from_wire() {
        assert_eq!(RunState::from_wire("success"), RunState::Success);
        assert_eq!(RunState::from_wire("failed"), RunState::Failed);
        assert_eq!(RunState::from_wire("running"), RunState::Running);
        assert_eq!(
            RunState::from_wire("up_for_retry"),
            RunState::Other("up_for_retry".to_string())
        );
    }
}
