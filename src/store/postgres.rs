use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

use crate::model::{Deployment, Execution, Id, Model, User};
use crate::store::traits::{
    DeploymentFilter, DeploymentStore, ExecutionFilter, ExecutionStore, ModelFilter, ModelStore,
    Page, Store, UserStore,
};

/// Document-style record store on PostgreSQL: one table per record kind,
/// each row a JSONB document keyed by the record id.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Create the record tables if they do not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        for table in ["models", "deployments", "executions", "users"] {
            sqlx::query(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                     id TEXT PRIMARY KEY,
                     doc JSONB NOT NULL
                 )"
            ))
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to create table {table}"))?;
        }
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_doc<T: DeserializeOwned>(&self, table: &str, id: &Id) -> Result<Option<T>> {
        let row = sqlx::query(&format!("SELECT doc FROM {table} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch from {table}"))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let doc: serde_json::Value = row.get("doc");
        let record = serde_json::from_value(doc)
            .with_context(|| format!("Failed to decode {table} document"))?;
        Ok(Some(record))
    }

    async fn upsert_doc<T: Serialize>(&self, table: &str, id: &Id, record: &T) -> Result<()> {
        let doc = serde_json::to_value(record)
            .with_context(|| format!("Failed to encode {table} document"))?;
        sqlx::query(&format!(
            "INSERT INTO {table} (id, doc) VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE SET doc = EXCLUDED.doc"
        ))
        .bind(id)
        .bind(doc)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to upsert into {table}"))?;
        Ok(())
    }

    async fn delete_doc(&self, table: &str, id: &Id) -> Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete from {table}"))?;
        Ok(result.rows_affected() > 0)
    }

    /// List documents matching field-equality conditions on top-level keys,
    /// with skip/limit pagination.
    async fn list_docs<T: DeserializeOwned>(
        &self,
        table: &str,
        conditions: &[(&str, String)],
        page: Page,
        order: &str,
    ) -> Result<Vec<T>> {
        let mut sql = format!("SELECT doc FROM {table}");
        for (i, (field, _)) in conditions.iter().enumerate() {
            let clause = if i == 0 { " WHERE" } else { " AND" };
            sql.push_str(&format!("{clause} doc->>'{field}' = ${}", i + 1));
        }
        sql.push_str(&format!(
            " ORDER BY doc->>'created_at' {order} OFFSET ${} LIMIT ${}",
            conditions.len() + 1,
            conditions.len() + 2
        ));

        let mut query = sqlx::query(&sql);
        for (_, value) in conditions {
            query = query.bind(value.clone());
        }
        query = query.bind(page.skip as i64).bind(page.limit as i64);

        let rows = query
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to list from {table}"))?;

        rows.into_iter()
            .map(|row| {
                let doc: serde_json::Value = row.get("doc");
                serde_json::from_value(doc)
                    .with_context(|| format!("Failed to decode {table} document"))
            })
            .collect()
    }
}

/// Wire representation of a status enum, used for JSONB field comparisons.
fn enum_str<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}

#[async_trait::async_trait]
impl ModelStore for PostgresStore {
    async fn get_model(&self, id: &Id) -> Result<Option<Model>> {
        self.fetch_doc("models", id).await
    }

    async fn list_models(&self, filter: ModelFilter, page: Page) -> Result<Vec<Model>> {
        let mut conditions = Vec::new();
        if let Some(department) = filter.department {
            conditions.push(("department", department));
        }
        if let Some(region) = filter.region {
            conditions.push(("region", region));
        }
        if let Some(status) = filter.status {
            conditions.push(("status", enum_str(&status)));
        }
        self.list_docs("models", &conditions, page, "ASC").await
    }

    async fn insert_model(&self, model: Model) -> Result<()> {
        self.upsert_doc("models", &model.id, &model).await
    }

    async fn update_model(&self, model: Model) -> Result<()> {
        self.upsert_doc("models", &model.id, &model).await
    }

    async fn delete_model(&self, id: &Id) -> Result<bool> {
        self.delete_doc("models", id).await
    }
}

#[async_trait::async_trait]
impl DeploymentStore for PostgresStore {
    async fn get_deployment(&self, id: &Id) -> Result<Option<Deployment>> {
        self.fetch_doc("deployments", id).await
    }

    async fn list_deployments(
        &self,
        filter: DeploymentFilter,
        page: Page,
    ) -> Result<Vec<Deployment>> {
        let mut conditions = Vec::new();
        if let Some(model_id) = filter.model_id {
            conditions.push(("model_id", model_id));
        }
        if let Some(status) = filter.status {
            conditions.push(("status", enum_str(&status)));
        }
        self.list_docs("deployments", &conditions, page, "ASC").await
    }

    async fn insert_deployment(&self, deployment: Deployment) -> Result<()> {
        self.upsert_doc("deployments", &deployment.id, &deployment)
            .await
    }

    async fn update_deployment(&self, deployment: Deployment) -> Result<()> {
        self.upsert_doc("deployments", &deployment.id, &deployment)
            .await
    }

    async fn delete_deployment(&self, id: &Id) -> Result<bool> {
        self.delete_doc("deployments", id).await
    }
}

#[async_trait::async_trait]
impl ExecutionStore for PostgresStore {
    async fn get_execution(&self, id: &Id) -> Result<Option<Execution>> {
        self.fetch_doc("executions", id).await
    }

    async fn list_executions(
        &self,
        filter: ExecutionFilter,
        page: Page,
    ) -> Result<Vec<Execution>> {
        let mut conditions = Vec::new();
        if let Some(deployment_id) = filter.deployment_id {
            conditions.push(("deployment_id", deployment_id));
        }
        if let Some(model_id) = filter.model_id {
            conditions.push(("model_id", model_id));
        }
        if let Some(status) = filter.status {
            conditions.push(("status", enum_str(&status)));
        }
        // Newest first.
        self.list_docs("executions", &conditions, page, "DESC").await
    }

    async fn insert_execution(&self, execution: Execution) -> Result<()> {
        self.upsert_doc("executions", &execution.id, &execution)
            .await
    }

    async fn update_execution(&self, execution: Execution) -> Result<()> {
        self.upsert_doc("executions", &execution.id, &execution)
            .await
    }

    async fn deployment_has_executions(&self, deployment_id: &Id) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM executions WHERE doc->>'deployment_id' = $1) AS present",
        )
        .bind(deployment_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check executions for deployment")?;
        Ok(row.get("present"))
    }
}

#[async_trait::async_trait]
impl UserStore for PostgresStore {
    async fn get_user(&self, id: &Id) -> Result<Option<User>> {
        self.fetch_doc("users", id).await
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT doc FROM users WHERE doc->>'username' = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by username")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let doc: serde_json::Value = row.get("doc");
        let user = serde_json::from_value(doc).context("Failed to decode user document")?;
        Ok(Some(user))
    }

    async fn list_users(&self, page: Page) -> Result<Vec<User>> {
        self.list_docs("users", &[], page, "ASC").await
    }

    async fn insert_user(&self, user: User) -> Result<()> {
        self.upsert_doc("users", &user.id, &user).await
    }

    async fn update_user(&self, user: User) -> Result<()> {
        self.upsert_doc("users", &user.id, &user).await
    }

    async fn delete_user(&self, id: &Id) -> Result<bool> {
        self.delete_doc("users", id).await
    }
}

impl Store for PostgresStore {}
