//! Test helper utilities that play the agent side
//!
//! The master only reads status and history nodes; in production they are
//! written by agents. These helpers write the same nodes so tests can observe
//! how the master aggregates them.

use std::collections::BTreeMap;
use std::sync::Arc;

use fleet_core::models::{HostInfo, JobId, RuntimeInfo, TaskStatus};
use fleet_core::paths;
use fleet_core::traits::{CoordinationStore, CreateMode, StoreError, StoreResult};
use fleet_core::Descriptor;
use fleet_infrastructure::InMemoryCoordinationStore;

/// Writes agent-side status nodes for one agent
///
/// The simulator owns its own store session so that the ephemeral `up`
/// node disappears when the simulated agent disconnects.
pub struct AgentSimulator {
    name: String,
    session: InMemoryCoordinationStore,
}

impl AgentSimulator {
    pub fn new(name: &str, store: &InMemoryCoordinationStore) -> Self {
        Self {
            name: name.to_string(),
            session: store.session(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create the ephemeral liveness node
    pub async fn connect(&self) -> StoreResult<()> {
        let path = paths::status_agent_up(&self.name);
        self.session.ensure_path(&path, true).await?;
        self.session
            .create_with_mode(&path, Vec::new(), CreateMode::Ephemeral)
            .await
    }

    /// Close the session; the liveness node goes away with it
    pub async fn disconnect(&self) -> StoreResult<()> {
        self.session.close().await
    }

    pub async fn report_host_info(&self, info: &HostInfo) -> StoreResult<()> {
        self.put(&paths::status_agent_host_info(&self.name), info).await
    }

    pub async fn report_runtime_info(&self, info: &RuntimeInfo) -> StoreResult<()> {
        self.put(&paths::status_agent_runtime_info(&self.name), info)
            .await
    }

    pub async fn report_environment(&self, env: &BTreeMap<String, String>) -> StoreResult<()> {
        self.put(&paths::status_agent_environment(&self.name), env)
            .await
    }

    pub async fn report_task_status(&self, status: &TaskStatus) -> StoreResult<()> {
        self.put(&paths::status_agent_job(&self.name, &status.job.id), status)
            .await
    }

    /// Append a history event for the job at the given millisecond timestamp
    pub async fn record_event(
        &self,
        job_id: &JobId,
        timestamp: i64,
        status: &TaskStatus,
    ) -> StoreResult<()> {
        let path = paths::history_job_agent_event(job_id, &self.name, timestamp);
        self.put(&path, status).await
    }

    async fn put<T: Descriptor>(&self, path: &str, value: &T) -> StoreResult<()> {
        let bytes = value
            .to_json_bytes()
            .map_err(|e| StoreError::Other(e.to_string()))?;
        self.session.ensure_path(path, true).await?;
        if self.session.stat(path).await?.is_some() {
            self.session.set_data(path, bytes).await
        } else {
            self.session
                .create_with_mode(path, bytes, CreateMode::Persistent)
                .await
        }
    }
}

/// Shared store plus a handle typed for the master
pub fn shared_store() -> (Arc<InMemoryCoordinationStore>, Arc<dyn CoordinationStore>) {
    let store = Arc::new(InMemoryCoordinationStore::new());
    let handle: Arc<dyn CoordinationStore> = store.clone();
    (store, handle)
}
