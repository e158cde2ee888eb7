use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::model::{generate_id, now, Id};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Pending,   // Record created, orchestrator not yet triggered
    Running,   // Workflow triggered and in flight
    Completed, // Orchestrator reported success
    Failed,    // Trigger raised or orchestrator reported failure
}

impl DeploymentStatus {
    /// True while the remote workflow may still be executing.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, DeploymentStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentStatus::Completed | DeploymentStatus::Failed)
    }

    /// Allowed transitions. Terminal states accept nothing.
    pub fn can_transition_to(&self, target: DeploymentStatus) -> bool {
        use DeploymentStatus::*;
        matches!(
            (self, target),
            (Pending, Running) | (Pending, Failed) | (Running, Completed) | (Running, Failed)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: Id,
    pub model_id: Id,
    pub name: String,
    pub description: Option<String>,
    pub parameters: HashMap<String, Value>,
    pub schedule: Option<String>, // cron expression
    pub owner_id: Id,
    pub status: DeploymentStatus,
    /// Orchestrator run identifier. Set at creation, never changes.
    pub dag_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDeployment {
    pub model_id: Id,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    pub schedule: Option<String>,
    pub owner_id: Id,
}

impl NewDeployment {
    /// Convert to a full Deployment with server-generated fields.
    ///
    /// The dag_id is derived from the model reference and the creation
    /// timestamp, unique per deployment.
    pub fn into_deployment(self) -> Deployment {
        let ts = now();
        let dag_id = format!("model_{}_{}", self.model_id, ts.format("%Y%m%d%H%M%S"));
        Deployment {
            id: generate_id(),
            model_id: self.model_id,
            name: self.name,
            description: self.description,
            parameters: self.parameters,
            schedule: self.schedule,
            owner_id: self.owner_id,
            status: DeploymentStatus::Pending,
            dag_id,
            created_at: ts,
            updated_at: ts,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploymentUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub parameters: Option<HashMap<String, Value>>,
    pub schedule: Option<String>,
    pub status: Option<DeploymentStatus>,
}

impl Deployment {
    /// Apply a partial update and stamp updated_at.
    ///
    /// A status change not in the transition table is rejected; the dedicated
    /// start/status operations are the only paths with side effects.
    pub fn apply_update(&mut self, update: DeploymentUpdate) -> Result<(), String> {
        if let Some(status) = update.status {
            if status != self.status && !self.status.can_transition_to(status) {
                return Err(format!(
                    "invalid status transition: {:?} -> {:?}",
                    self.status, status
                ));
            }
            self.status = status;
        }
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(parameters) = update.parameters {
            self.parameters = parameters;
        }
        if let Some(schedule) = update.schedule {
            self.schedule = Some(schedule);
        }
        self.updated_at = now();
        Ok(())
    }

    /// Workflow configuration payload passed to the orchestrator on trigger.
    pub fn run_conf(&self) -> Value {
        serde_json::json!({
            "model_id": self.model_id,
            "deployment_id": self.id,
            "parameters": self.parameters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Deployment {
        NewDeployment {
            model_id: "m-1".to_string(),
            name: "nightly".to_string(),
            description: None,
            parameters: HashMap::new(),
            schedule: Some("0 2 * * *".to_string()),
            owner_id: "u-1".to_string(),
        }
        .into_deployment()
    }

    #[test]
    fn test_dag_id_derived_from_model_and_timestamp() {
        let deployment = sample();
        assert!(deployment.dag_id.starts_with("model_m-1_"));
        assert_eq!(deployment.status, DeploymentStatus::Pending);
    }

    #[test]
    fn test_transition_table() {
        use DeploymentStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Failed));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Completed));
    }

    #[test]
    fn test_update_rejects_illegal_status() {
        let mut deployment = sample();
        let err = deployment
            .apply_update(DeploymentUpdate {
                status: Some(DeploymentStatus::Completed),
                ..DeploymentUpdate::default()
            })
            .unwrap_err();
        assert!(err.contains("invalid status transition"));
        // Failed update leaves the record's status untouched.
        assert_eq!(deployment.status, DeploymentStatus::Pending);
    }

    #[test]
    fn test_update_allows_same_status_and_fields() {
        let mut deployment = sample();
        deployment
            .apply_update(DeploymentUpdate {
                name: Some("weekly".to_string()),
                status: Some(DeploymentStatus::Pending),
                ..DeploymentUpdate::default()
            })
            .unwrap();
        assert_eq!(deployment.name, "weekly");
    }
}
