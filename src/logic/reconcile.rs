use crate::gateway::{Orchestrator, RunState};
use crate::model::{now, Deployment, DeploymentStatus, Execution, ExecutionStatus};
use crate::store::traits::{DeploymentStore, ExecutionStore};

/// What a best-effort refresh actually did. The caller-facing record is the
/// same whether the refresh was skipped or went stale; the outcome exists so
/// the distinction is observable (logged) rather than silently erased.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RefreshOutcome {
    /// Record not in flight, or the run has not reached a recognized
    /// terminal state. No orchestrator-driven transition.
    Skipped,
    /// A terminal state was observed and persisted.
    Refreshed,
    /// The orchestrator or the store was unreachable; status may be out of
    /// date. Never surfaced to the caller as an error.
    Stale,
}

/// Sync a deployment's status with the orchestrator's view of its run.
///
/// No-op unless the deployment is in flight. On an observed terminal state
/// the transition is persisted first and applied to the returned copy only
/// after the write succeeds, so a store failure cannot hand the caller a
/// status that was never recorded. Two concurrent readers may both observe
/// "running" and both write the same terminal status; the double write is
/// benign (same status, fresh timestamp).
pub async fn reconcile_deployment<S: DeploymentStore>(
    store: &S,
    orchestrator: &dyn Orchestrator,
    deployment: Deployment,
) -> (Deployment, RefreshOutcome) {
    if !deployment.status.is_in_flight() {
        return (deployment, RefreshOutcome::Skipped);
    }

    let target = match orchestrator.latest_run_state(&deployment.dag_id).await {
        Ok(RunState::Success) => DeploymentStatus::Completed,
        Ok(RunState::Failed) => DeploymentStatus::Failed,
        Ok(_) => return (deployment, RefreshOutcome::Skipped),
        Err(e) => {
            log::warn!(
                "status refresh for deployment {} left stale: {e:#}",
                deployment.id
            );
            return (deployment, RefreshOutcome::Stale);
        }
    };

    let mut updated = deployment.clone();
    updated.status = target;
    updated.updated_at = now();

    match store.update_deployment(updated.clone()).await {
        Ok(()) => (updated, RefreshOutcome::Refreshed),
        Err(e) => {
            log::warn!(
                "failed to persist terminal status for deployment {}: {e:#}",
                deployment.id
            );
            (deployment, RefreshOutcome::Stale)
        }
    }
}

/// Sync an execution's status with the orchestrator's view of its parent
/// deployment's run. `dag_id` is the run identifier on the parent
/// Deployment; `None` (orphaned or pre-migration record) leaves the
/// execution untouched.
pub async fn reconcile_execution<S: ExecutionStore>(
    store: &S,
    orchestrator: &dyn Orchestrator,
    execution: Execution,
    dag_id: Option<&str>,
) -> (Execution, RefreshOutcome) {
    if !execution.status.is_in_flight() {
        return (execution, RefreshOutcome::Skipped);
    }
    let Some(dag_id) = dag_id else {
        return (execution, RefreshOutcome::Skipped);
    };

    let target = match orchestrator.latest_run_state(dag_id).await {
        Ok(RunState::Success) => ExecutionStatus::Success,
        Ok(RunState::Failed) => ExecutionStatus::Failed,
        Ok(_) => return (execution, RefreshOutcome::Skipped),
        Err(e) => {
            log::warn!(
                "status refresh for execution {} left stale: {e:#}",
                execution.id
            );
            return (execution, RefreshOutcome::Stale);
        }
    };

    let mut updated = execution.clone();
    updated.status = target;
    updated.end_time = Some(now());

    match store.update_execution(updated.clone()).await {
        Ok(()) => (updated, RefreshOutcome::Refreshed),
        Err(e) => {
            log::warn!(
                "failed to persist terminal status for execution {}: {e:#}",
                execution.id
            );
            (execution, RefreshOutcome::Stale)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::model::{NewDeployment, NewExecution};
    use crate::store::MemoryStore;
    use crate::store::traits::DeploymentStore;

    /// Programmable orchestrator double that counts poll calls.
    struct FakeOrchestrator {
        state: Mutex<Option<RunState>>, // None => poll errors
        polls: AtomicUsize,
    }

    impl FakeOrchestrator {
        fn reporting(state: RunState) -> Self {
            Self {
                state: Mutex::new(Some(state)),
                polls: AtomicUsize::new(0),
            }
        }

        fn unreachable() -> Self {
            Self {
                state: Mutex::new(None),
                polls: AtomicUsize::new(0),
            }
        }

        fn poll_count(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Orchestrator for FakeOrchestrator {
        async fn trigger_run(&self, _dag_id: &str, _conf: Value) -> Result<()> {
            Ok(())
        }

        async fn latest_run_state(&self, _dag_id: &str) -> Result<RunState> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.state
                .lock()
                .clone()
                .ok_or_else(|| anyhow!("orchestrator unreachable"))
        }
    }

    fn make_deployment(status: DeploymentStatus) -> Deployment {
        let mut deployment = NewDeployment {
            model_id: "m-1".to_string(),
            name: "d".to_string(),
            description: None,
            parameters: HashMap::new(),
            schedule: None,
            owner_id: "u-1".to_string(),
        }
        .into_deployment();
        deployment.status = status;
        deployment
    }

    fn make_execution(status: ExecutionStatus) -> Execution {
        let mut execution = NewExecution {
            deployment_id: "d-1".to_string(),
            parameters: HashMap::new(),
            owner_id: "u-1".to_string(),
        }
        .into_execution("m-1".to_string());
        execution.status = status;
        if status.is_terminal() {
            execution.end_time = Some(now());
        }
        execution
    }

    #[tokio::test]
    async fn test_not_in_flight_never_polls() {
        let store = MemoryStore::new();
        for status in [
            DeploymentStatus::Pending,
            DeploymentStatus::Completed,
            DeploymentStatus::Failed,
        ] {
            let orchestrator = FakeOrchestrator::reporting(RunState::Success);
            let deployment = make_deployment(status);
            let (result, outcome) =
                reconcile_deployment(&store, &orchestrator, deployment.clone()).await;
            assert_eq!(result, deployment);
            assert_eq!(outcome, RefreshOutcome::Skipped);
            assert_eq!(orchestrator.poll_count(), 0);
        }
    }

    #[tokio::test]
    async fn test_running_deployment_completes_on_success() {
        let store = MemoryStore::new();
        let orchestrator = FakeOrchestrator::reporting(RunState::Success);
        let deployment = make_deployment(DeploymentStatus::Running);
        store.insert_deployment(deployment.clone()).await.unwrap();

        let (result, outcome) = reconcile_deployment(&store, &orchestrator, deployment).await;
        assert_eq!(result.status, DeploymentStatus::Completed);
        assert_eq!(outcome, RefreshOutcome::Refreshed);

        let persisted = store.get_deployment(&result.id).await.unwrap().unwrap();
        assert_eq!(persisted.status, DeploymentStatus::Completed);
    }

    #[tokio::test]
    async fn test_refresh_idempotent_after_first_write() {
        let store = MemoryStore::new();
        let orchestrator = FakeOrchestrator::reporting(RunState::Success);
        let deployment = make_deployment(DeploymentStatus::Running);
        store.insert_deployment(deployment.clone()).await.unwrap();

        let (first, _) = reconcile_deployment(&store, &orchestrator, deployment).await;
        assert_eq!(orchestrator.poll_count(), 1);

        // Even with the orchestrator now claiming failure, a terminal record
        // never reverts and the orchestrator is not consulted again.
        *orchestrator.state.lock() = Some(RunState::Failed);
        let (second, outcome) = reconcile_deployment(&store, &orchestrator, first.clone()).await;
        assert_eq!(second.status, DeploymentStatus::Completed);
        assert_eq!(outcome, RefreshOutcome::Skipped);
        assert_eq!(orchestrator.poll_count(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_orchestrator_leaves_record_stale() {
        let store = MemoryStore::new();
        let orchestrator = FakeOrchestrator::unreachable();
        let deployment = make_deployment(DeploymentStatus::Running);
        store.insert_deployment(deployment.clone()).await.unwrap();

        let (result, outcome) =
            reconcile_deployment(&store, &orchestrator, deployment.clone()).await;
        assert_eq!(result, deployment);
        assert_eq!(outcome, RefreshOutcome::Stale);

        let persisted = store.get_deployment(&deployment.id).await.unwrap().unwrap();
        assert_eq!(persisted.status, DeploymentStatus::Running);
    }

    #[tokio::test]
    async fn test_non_terminal_run_state_is_skipped() {
        let store = MemoryStore::new();
        let orchestrator = FakeOrchestrator::reporting(RunState::Running);
        let deployment = make_deployment(DeploymentStatus::Running);

        let (result, outcome) =
            reconcile_deployment(&store, &orchestrator, deployment.clone()).await;
        assert_eq!(result.status, DeploymentStatus::Running);
        assert_eq!(outcome, RefreshOutcome::Skipped);
        assert_eq!(orchestrator.poll_count(), 1);
    }

    #[tokio::test]
    async fn test_running_execution_fails_with_end_time() {
        let store = MemoryStore::new();
        let orchestrator = FakeOrchestrator::reporting(RunState::Failed);
        let execution = make_execution(ExecutionStatus::Running);
        store.insert_execution(execution.clone()).await.unwrap();

        let (result, outcome) =
            reconcile_execution(&store, &orchestrator, execution, Some("dag-1")).await;
        assert_eq!(result.status, ExecutionStatus::Failed);
        assert!(result.end_time.is_some());
        assert_eq!(outcome, RefreshOutcome::Refreshed);
    }

    #[tokio::test]
    async fn test_execution_without_dag_id_is_skipped() {
        let store = MemoryStore::new();
        let orchestrator = FakeOrchestrator::reporting(RunState::Success);
        let execution = make_execution(ExecutionStatus::Running);

        let (result, outcome) =
            reconcile_execution(&store, &orchestrator, execution.clone(), None).await;
        assert_eq!(result, execution);
        assert_eq!(outcome, RefreshOutcome::Skipped);
        assert_eq!(orchestrator.poll_count(), 0);
    }

    #[tokio::test]
    async fn test_terminal_execution_never_polls() {
        let store = MemoryStore::new();
        for status in [ExecutionStatus::Success, ExecutionStatus::Failed] {
            let orchestrator = FakeOrchestrator::reporting(RunState::Failed);
            let execution = make_execution(status);
            let (result, outcome) =
                reconcile_execution(&store, &orchestrator, execution.clone(), Some("dag-1")).await;
            assert_eq!(result, execution);
            assert_eq!(outcome, RefreshOutcome::Skipped);
            assert_eq!(orchestrator.poll_count(), 0);
        }
    }

    #[tokio::test]
    async fn test_concurrent_readers_double_write_is_benign() {
        // Both copies observe "running" and both persist the same terminal
        // status; the record must land on Success either way.
        let store = MemoryStore::new();
        let orchestrator = FakeOrchestrator::reporting(RunState::Success);
        let execution = make_execution(ExecutionStatus::Running);
        store.insert_execution(execution.clone()).await.unwrap();

        let (a, _) =
            reconcile_execution(&store, &orchestrator, execution.clone(), Some("dag-1")).await;
        let (b, _) = reconcile_execution(&store, &orchestrator, execution, Some("dag-1")).await;

        assert_eq!(a.status, ExecutionStatus::Success);
        assert_eq!(b.status, ExecutionStatus::Success);
        let persisted = store.get_execution(&a.id).await.unwrap().unwrap();
        assert_eq!(persisted.status, ExecutionStatus::Success);
        assert!(persisted.end_time.is_some());
    }
}
