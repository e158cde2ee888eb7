use anyhow::Result;
use serde::Deserialize;

use crate::model::{
    Deployment, DeploymentStatus, Execution, ExecutionStatus, Id, Model, ModelStatus, User,
};

/// Skip/limit pagination shared by every list operation.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_limit(),
        }
    }
}

/// Field-equality filters for model listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelFilter {
    pub department: Option<String>,
    pub region: Option<String>,
    pub status: Option<ModelStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploymentFilter {
    pub model_id: Option<Id>,
    pub status: Option<DeploymentStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionFilter {
    pub deployment_id: Option<Id>,
    pub model_id: Option<Id>,
    pub status: Option<ExecutionStatus>,
}

#[async_trait::async_trait]
pub trait ModelStore: Send + Sync {
    async fn get_model(&self, id: &Id) -> Result<Option<Model>>;
    async fn list_models(&self, filter: ModelFilter, page: Page) -> Result<Vec<Model>>;
    async fn insert_model(&self, model: Model) -> Result<()>;
    async fn update_model(&self, model: Model) -> Result<()>;
    async fn delete_model(&self, id: &Id) -> Result<bool>;
}

#[async_trait::async_trait]
pub trait DeploymentStore: Send + Sync {
    async fn get_deployment(&self, id: &Id) -> Result<Option<Deployment>>;
    async fn list_deployments(&self, filter: DeploymentFilter, page: Page)
        -> Result<Vec<Deployment>>;
    async fn insert_deployment(&self, deployment: Deployment) -> Result<()>;
    async fn update_deployment(&self, deployment: Deployment) -> Result<()>;
    async fn delete_deployment(&self, id: &Id) -> Result<bool>;
}

#[async_trait::async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn get_execution(&self, id: &Id) -> Result<Option<Execution>>;
    /// Newest first by creation time.
    async fn list_executions(&self, filter: ExecutionFilter, page: Page) -> Result<Vec<Execution>>;
    async fn insert_execution(&self, execution: Execution) -> Result<()>;
    async fn update_execution(&self, execution: Execution) -> Result<()>;
    /// True when at least one execution references the deployment.
    async fn deployment_has_executions(&self, deployment_id: &Id) -> Result<bool>;
}

#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, id: &Id) -> Result<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn list_users(&self, page: Page) -> Result<Vec<User>>;
    async fn insert_user(&self, user: User) -> Result<()>;
    async fn update_user(&self, user: User) -> Result<()>;
    async fn delete_user(&self, id: &Id) -> Result<bool>;
}

pub trait Store: ModelStore + DeploymentStore + ExecutionStore + UserStore + Send + Sync {}
