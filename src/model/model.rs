use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::model::{generate_id, now, Id};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Classification,
    Regression,
    Clustering,
    Forecasting,
    Recommendation,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFramework {
    #[serde(rename = "scikit-learn")]
    ScikitLearn,
    Tensorflow,
    Pytorch,
    Xgboost,
    R,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    Draft,    // Just registered, artifact may still be missing
    Ready,    // Validated and usable
    Deployed, // At least one active deployment
    Archived, // Kept for history only
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub model_type: ModelType,
    pub framework: ModelFramework,
    pub version: String,
    pub tags: Vec<String>,
    pub parameters: HashMap<String, Value>,
    pub metadata: HashMap<String, Value>,
    pub owner_id: Id,
    pub department: String,
    pub region: String,
    pub brand: Option<String>,
    pub status: ModelStatus,
    pub file_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input model for registering a new model
#[derive(Debug, Clone, Deserialize)]
pub struct NewModel {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub model_type: ModelType,
    pub framework: ModelFramework,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub owner_id: Id,
    pub department: String,
    pub region: String,
    pub brand: Option<String>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl NewModel {
    /// Convert to a full Model with server-generated fields
    pub fn into_model(self) -> Model {
        let ts = now();
        Model {
            id: generate_id(),
            name: self.name,
            description: self.description,
            model_type: self.model_type,
            framework: self.framework,
            version: self.version,
            tags: self.tags,
            parameters: self.parameters,
            metadata: self.metadata,
            owner_id: self.owner_id,
            department: self.department,
            region: self.region,
            brand: self.brand,
            status: ModelStatus::Draft,
            file_path: None,
            created_at: ts,
            updated_at: ts,
        }
    }
}

/// Partial update: only provided fields are applied
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub tags: Option<Vec<String>>,
    pub parameters: Option<HashMap<String, Value>>,
    pub metadata: Option<HashMap<String, Value>>,
    pub status: Option<ModelStatus>,
}

impl Model {
    /// Apply a partial update and stamp updated_at.
    ///
    /// Model status is owner-mutated with no enforced transition graph,
    /// so any status value is accepted here.
    pub fn apply_update(&mut self, update: ModelUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(version) = update.version {
            self.version = version;
        }
        if let Some(tags) = update.tags {
            self.tags = tags;
        }
        if let Some(parameters) = update.parameters {
            self.parameters = parameters;
        }
        if let Some(metadata) = update.metadata {
            self.metadata = metadata;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        self.updated_at = now();
    }
}
