use anyhow::Result;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::model::{Deployment, Execution, Id, Model, User};
use crate::store::traits::{
    DeploymentFilter, DeploymentStore, ExecutionFilter, ExecutionStore, ModelFilter, ModelStore,
    Page, Store, UserStore,
};

/// In-memory record store for tests. Thread-safe via `RwLock`; not suitable
/// for production.
#[derive(Debug, Default)]
pub struct MemoryStore {
    models: RwLock<HashMap<Id, Model>>,
    deployments: RwLock<HashMap<Id, Deployment>>,
    executions: RwLock<HashMap<Id, Execution>>,
    users: RwLock<HashMap<Id, User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T>(mut items: Vec<T>, page: Page) -> Vec<T> {
    if page.skip >= items.len() {
        return Vec::new();
    }
    items.drain(..page.skip);
    items.truncate(page.limit);
    items
}

#[async_trait::async_trait]
impl ModelStore for MemoryStore {
    async fn get_model(&self, id: &Id) -> Result<Option<Model>> {
        Ok(self.models.read().get(id).cloned())
    }

    async fn list_models(&self, filter: ModelFilter, page: Page) -> Result<Vec<Model>> {
        let mut models: Vec<Model> = self
            .models
            .read()
            .values()
            .filter(|m| {
                filter.department.as_ref().map_or(true, |d| &m.department == d)
                    && filter.region.as_ref().map_or(true, |r| &m.region == r)
                    && filter.status.map_or(true, |s| m.status == s)
            })
            .cloned()
            .collect();
        models.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(paginate(models, page))
    }

    async fn insert_model(&self, model: Model) -> Result<()> {
        self.models.write().insert(model.id.clone(), model);
        Ok(())
    }

    async fn update_model(&self, model: Model) -> Result<()> {
        self.models.write().insert(model.id.clone(), model);
        Ok(())
    }

    async fn delete_model(&self, id: &Id) -> Result<bool> {
        Ok(self.models.write().remove(id).is_some())
    }
}

#[async_trait::async_trait]
impl DeploymentStore for MemoryStore {
    async fn get_deployment(&self, id: &Id) -> Result<Option<Deployment>> {
        Ok(self.deployments.read().get(id).cloned())
    }

    async fn list_deployments(
        &self,
        filter: DeploymentFilter,
        page: Page,
    ) -> Result<Vec<Deployment>> {
        let mut deployments: Vec<Deployment> = self
            .deployments
            .read()
            .values()
            .filter(|d| {
                filter.model_id.as_ref().map_or(true, |m| &d.model_id == m)
                    && filter.status.map_or(true, |s| d.status == s)
            })
            .cloned()
            .collect();
        deployments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(paginate(deployments, page))
    }

    async fn insert_deployment(&self, deployment: Deployment) -> Result<()> {
        self.deployments
            .write()
            .insert(deployment.id.clone(), deployment);
        Ok(())
    }

    async fn update_deployment(&self, deployment: Deployment) -> Result<()> {
        self.deployments
            .write()
            .insert(deployment.id.clone(), deployment);
        Ok(())
    }

    async fn delete_deployment(&self, id: &Id) -> Result<bool> {
        Ok(self.deployments.write().remove(id).is_some())
    }
}

#[async_trait::async_trait]
impl ExecutionStore for MemoryStore {
    async fn get_execution(&self, id: &Id) -> Result<Option<Execution>> {
        Ok(self.executions.read().get(id).cloned())
    }

    async fn list_executions(
        &self,
        filter: ExecutionFilter,
        page: Page,
    ) -> Result<Vec<Execution>> {
        let mut executions: Vec<Execution> = self
            .executions
            .read()
            .values()
            .filter(|e| {
                filter
                    .deployment_id
                    .as_ref()
                    .map_or(true, |d| &e.deployment_id == d)
                    && filter.model_id.as_ref().map_or(true, |m| &e.model_id == m)
                    && filter.status.map_or(true, |s| e.status == s)
            })
            .cloned()
            .collect();
        executions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(executions, page))
    }

    async fn insert_execution(&self, execution: Execution) -> Result<()> {
        self.executions
            .write()
            .insert(execution.id.clone(), execution);
        Ok(())
    }

    async fn update_execution(&self, execution: Execution) -> Result<()> {
        self.executions
            .write()
            .insert(execution.id.clone(), execution);
        Ok(())
    }

    async fn deployment_has_executions(&self, deployment_id: &Id) -> Result<bool> {
        Ok(self
            .executions
            .read()
            .values()
            .any(|e| &e.deployment_id == deployment_id))
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryStore {
    async fn get_user(&self, id: &Id) -> Result<Option<User>> {
        Ok(self.users.read().get(id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list_users(&self, page: Page) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.users.read().values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(paginate(users, page))
    }

    async fn insert_user(&self, user: User) -> Result<()> {
        self.users.write().insert(user.id.clone(), user);
        Ok(())
    }

    async fn update_user(&self, user: User) -> Result<()> {
        self.users.write().insert(user.id.clone(), user);
        Ok(())
    }

    async fn delete_user(&self, id: &Id) -> Result<bool> {
        Ok(self.users.write().remove(id).is_some())
    }
}

impl Store for MemoryStore {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewModel, NewUser, UserRole};

    fn make_model(department: &str) -> Model {
        serde_json::from_str::<NewModel>(&format!(
            r#"{{"name":"m","type":"custom","framework":"custom",
                 "owner_id":"u","department":"{department}","region":"emea"}}"#
        ))
        .unwrap()
        .into_model()
    }

    #[tokio::test]
    async fn test_model_filter_and_pagination() {
        let store = MemoryStore::new();
        for _ in 0..3 {
            store.insert_model(make_model("marketing")).await.unwrap();
        }
        store.insert_model(make_model("finance")).await.unwrap();

        let marketing = store
            .list_models(
                ModelFilter {
                    department: Some("marketing".to_string()),
                    ..ModelFilter::default()
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(marketing.len(), 3);

        let paged = store
            .list_models(ModelFilter::default(), Page { skip: 2, limit: 1 })
            .await
            .unwrap();
        assert_eq!(paged.len(), 1);

        let past_end = store
            .list_models(ModelFilter::default(), Page { skip: 10, limit: 5 })
            .await
            .unwrap();
        assert!(past_end.is_empty());
    }

    #[tokio::test]
    async fn test_user_lookup_by_username() {
        let store = MemoryStore::new();
        let user = NewUser {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            full_name: None,
            department: None,
            region: None,
            password: "pw".to_string(),
            role: UserRole::Viewer,
        }
        .into_user("hash".to_string());
        store.insert_user(user.clone()).await.unwrap();

        let found = store.get_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(store.get_user_by_username("bob").await.unwrap().is_none());
    }
}
