//! Task registry client: the coordinator's system of record for workers
//! and tasks.

use reqwest::Response;
use serde::de::DeserializeOwned;
use taskweave_core::{
    Error, RegisterWorkerRequest, RegisterWorkerResponse, Result, StatusUpdate, Task, TaskStatus,
};

#[async_trait::async_trait]
pub trait TaskRegistry: Send + Sync {
    /// Register this worker, returning its assigned id.
    async fn register(&self, request: &RegisterWorkerRequest) -> Result<String>;
    async fn heartbeat(&self, worker_id: &str) -> Result<()>;
    async fn update_status(&self, worker_id: &str, update: &StatusUpdate) -> Result<()>;
    async fn list_tasks(&self, status: TaskStatus) -> Result<Vec<Task>>;
}

/// HTTP implementation against the `/api/v1` registry routes.
pub struct HttpTaskRegistry {
    client: reqwest::Client,
    base_url: String,
    tasks_path: String,
}

impl HttpTaskRegistry {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tasks_path: "/api/v1/tasks".to_string(),
        }
    }

    pub fn with_tasks_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.tasks_path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn unavailable(&self, e: reqwest::Error) -> Error {
        Error::RegistryUnavailable(format!("{}: {}", self.base_url, e))
    }

    async fn check(resp: Response, what: &str) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let text = resp.text().await.unwrap_or_default();
        Err(Error::RegistryUnavailable(format!(
            "{} returned {}: {}",
            what, status, text
        )))
    }

    async fn json<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T> {
        resp.json()
            .await
            .map_err(|e| Error::RegistryUnavailable(format!("malformed {} response: {}", what, e)))
    }
}

#[async_trait::async_trait]
impl TaskRegistry for HttpTaskRegistry {
    async fn register(&self, request: &RegisterWorkerRequest) -> Result<String> {
        let resp = self
            .client
            .post(self.url("/api/v1/workers"))
            .json(request)
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;
        let resp = Self::check(resp, "register").await?;
        let registered: RegisterWorkerResponse = Self::json(resp, "register").await?;
        Ok(registered.id)
    }

    async fn heartbeat(&self, worker_id: &str) -> Result<()> {
        let resp = self
            .client
            .put(self.url(&format!("/api/v1/workers/{}/heartbeat", worker_id)))
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;
        Self::check(resp, "heartbeat").await?;
        Ok(())
    }

    async fn update_status(&self, worker_id: &str, update: &StatusUpdate) -> Result<()> {
        let resp = self
            .client
            .put(self.url(&format!("/api/v1/workers/{}/status", worker_id)))
            .json(update)
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;
        Self::check(resp, "status update").await?;
        Ok(())
    }

    async fn list_tasks(&self, status: TaskStatus) -> Result<Vec<Task>> {
        let resp = self
            .client
            .get(self.url(&self.tasks_path))
            .query(&[("status", status.as_str())])
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;
        let resp = Self::check(resp, "task list").await?;
        Self::json(resp, "task list").await
    }
}
