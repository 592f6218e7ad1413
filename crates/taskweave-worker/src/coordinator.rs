//! Worker-side view of the task registry: identity, liveness, status
//! reporting and polling for assigned work.

use crate::metrics::ResourceProbe;
use crate::registry::TaskRegistry;
use std::sync::Arc;
use taskweave_core::{Error, RegisterWorkerRequest, Result, StatusUpdate, Task, TaskStatus, WorkerStatus};
use tracing::{debug, info, warn};

/// `<prefix>-<hostname>-<8 hex>`
pub fn worker_name(prefix: &str) -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", prefix, host, &suffix[..8])
}

pub struct Coordinator {
    registry: Arc<dyn TaskRegistry>,
    probe: Arc<dyn ResourceProbe>,
    name: String,
    capabilities: Vec<String>,
    worker_id: Option<String>,
    status: WorkerStatus,
    current_task_id: Option<String>,
}

impl Coordinator {
    pub fn new(
        registry: Arc<dyn TaskRegistry>,
        probe: Arc<dyn ResourceProbe>,
        name: impl Into<String>,
        capabilities: Vec<String>,
    ) -> Self {
        Self {
            registry,
            probe,
            name: name.into(),
            capabilities,
            worker_id: None,
            status: WorkerStatus::Unregistered,
            current_task_id: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn worker_id(&self) -> Option<&str> {
        self.worker_id.as_deref()
    }

    pub fn is_registered(&self) -> bool {
        self.worker_id.is_some()
    }

    pub fn status(&self) -> WorkerStatus {
        self.status
    }

    pub fn current_task_id(&self) -> Option<&str> {
        self.current_task_id.as_deref()
    }

    fn registered_id(&self) -> Result<&str> {
        self.worker_id
            .as_deref()
            .ok_or_else(|| Error::RegistryUnavailable("worker is not registered".into()))
    }

    pub async fn register(&mut self) -> Result<String> {
        let request = RegisterWorkerRequest {
            name: self.name.clone(),
            capabilities: self.capabilities.clone(),
            metrics: self.probe.sample(),
        };
        let id = self.registry.register(&request).await?;
        info!("Registered worker {} as {}", self.name, id);
        self.worker_id = Some(id.clone());
        self.status = WorkerStatus::Available;
        Ok(id)
    }

    /// Best-effort liveness ping. Failures are logged, not returned.
    pub async fn heartbeat(&self) -> bool {
        let Some(id) = self.worker_id.as_deref() else {
            return false;
        };
        match self.registry.heartbeat(id).await {
            Ok(()) => {
                debug!("Heartbeat sent for {}", id);
                true
            }
            Err(e) => {
                warn!("Heartbeat failed for {}: {}", id, e);
                false
            }
        }
    }

    /// Send a status update and mirror it locally.
    pub async fn update_status(&mut self, update: StatusUpdate) -> Result<()> {
        let id = self.registered_id()?.to_string();
        self.status = update.status;
        self.current_task_id = match update.status {
            WorkerStatus::Busy => update.current_task_id.clone(),
            _ => None,
        };
        self.registry.update_status(&id, &update).await
    }

    pub async fn report_available(&mut self) -> Result<()> {
        let update = StatusUpdate::idle(self.probe.sample());
        self.update_status(update).await
    }

    pub async fn report_running(&mut self, task_id: &str) -> Result<()> {
        let update = StatusUpdate::running(task_id, self.probe.sample());
        self.update_status(update).await
    }

    pub async fn report_completed(&mut self, task_id: &str, output: String) -> Result<()> {
        let update = StatusUpdate::completed(task_id, output, self.probe.sample());
        self.update_status(update).await
    }

    pub async fn report_failed(&mut self, task_id: &str, error: String) -> Result<()> {
        let update = StatusUpdate::failed(task_id, error, self.probe.sample());
        self.update_status(update).await
    }

    /// First scheduled task assigned to this worker, if any.
    pub async fn poll_assigned(&self) -> Result<Option<Task>> {
        let id = self.registered_id()?;
        let tasks = self.registry.list_tasks(TaskStatus::Scheduled).await?;
        Ok(tasks.into_iter().find(|t| t.is_assigned_to(id)))
    }
}
