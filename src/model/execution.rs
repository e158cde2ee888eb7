use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::model::{generate_id, now, Id};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Queued,  // Record created, orchestrator not yet confirmed
    Running, // Workflow triggered and in flight
    Success, // Orchestrator reported success
    Failed,  // Trigger raised, orchestrator reported failure, or cancelled
}

impl ExecutionStatus {
    /// True while the remote workflow may still be executing.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, ExecutionStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Success | ExecutionStatus::Failed)
    }

    /// Cancel is permitted from queued or running only.
    pub fn can_cancel(&self) -> bool {
        matches!(self, ExecutionStatus::Queued | ExecutionStatus::Running)
    }

    /// Allowed transitions. Queued -> Failed covers both a failed trigger
    /// and a cancel before the run ever started.
    pub fn can_transition_to(&self, target: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        matches!(
            (self, target),
            (Queued, Running) | (Queued, Failed) | (Running, Success) | (Running, Failed)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: Id,
    pub deployment_id: Id,
    /// Denormalized from the parent deployment at creation for direct lookup.
    pub model_id: Id,
    pub parameters: HashMap<String, Value>,
    pub owner_id: Id,
    pub status: ExecutionStatus,
    pub start_time: Option<DateTime<Utc>>,
    /// Set iff status is success or failed.
    pub end_time: Option<DateTime<Utc>>,
    pub result_path: Option<String>,
    /// Append-only log-line sequence.
    pub logs: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewExecution {
    pub deployment_id: Id,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    pub owner_id: Id,
}

impl NewExecution {
    /// Convert to a full Execution with server-generated fields.
    /// The model reference comes from the parent deployment.
    pub fn into_execution(self, model_id: Id) -> Execution {
        Execution {
            id: generate_id(),
            deployment_id: self.deployment_id,
            model_id,
            parameters: self.parameters,
            owner_id: self.owner_id,
            status: ExecutionStatus::Queued,
            start_time: None,
            end_time: None,
            result_path: None,
            logs: Vec::new(),
            created_at: now(),
        }
    }
}

impl Execution {
    /// Local cancel: mark failed, stamp end_time, append a log line.
    /// The remote workflow is not stopped.
    pub fn cancel(&mut self) -> Result<(), String> {
        if !self.status.can_cancel() {
            return Err(format!(
                "execution cannot be cancelled in status {:?}",
                self.status
            ));
        }
        self.status = ExecutionStatus::Failed;
        self.end_time = Some(now());
        self.logs.push("Execution cancelled by user".to_string());
        Ok(())
    }

    /// Workflow configuration payload passed to the orchestrator on trigger.
    pub fn run_conf(&self) -> Value {
        serde_json::json!({
            "model_id": self.model_id,
            "deployment_id": self.deployment_id,
            "execution_id": self.id,
            "parameters": self.parameters,
        })
    }
}
