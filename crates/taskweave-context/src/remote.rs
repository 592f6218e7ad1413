//! HTTP client for a context store served by `taskweave-gateway`.

use crate::service::ContextService;
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use taskweave_core::{
    AddNodeRequest, AddNodeResponse, ContextNode, ContextResponse, CreateContextRequest,
    CreateContextResponse, DeletedResponse, Error, ErrorBody, ErrorKind, ListContextsResponse,
    PromptRequest, PromptResponse, RenderResponse, Result,
};

pub struct RemoteContextStore {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteContextStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/v1/contexts/{segments..}`. Each segment is percent-encoded,
    /// so ids may contain `/`, `?` or `#`.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| Error::StoreUnavailable(format!("invalid url {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::StoreUnavailable(format!("invalid url {}", self.base_url)))?
            .pop_if_empty()
            .extend(["v1", "contexts"])
            .extend(segments);
        Ok(url)
    }

    fn unreachable(&self, e: reqwest::Error) -> Error {
        Error::StoreUnavailable(format!("{}: {}", self.base_url, e))
    }

    async fn decode<T: DeserializeOwned>(&self, resp: Response) -> Result<T> {
        let status = resp.status();
        if status.is_success() {
            return resp
                .json()
                .await
                .map_err(|e| Error::StoreUnavailable(format!("malformed response: {}", e)));
        }

        let text = resp.text().await.unwrap_or_default();
        if let Ok(body) = serde_json::from_str::<ErrorBody>(&text) {
            return Err(Error::from_kind(body.error.kind, body.error.message));
        }
        let kind = match status {
            StatusCode::NOT_FOUND => ErrorKind::NotFound,
            StatusCode::CONFLICT => ErrorKind::Conflict,
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ErrorKind::InvalidInput,
            StatusCode::BAD_GATEWAY => ErrorKind::ProviderFailure,
            _ => ErrorKind::StoreUnavailable,
        };
        Err(Error::from_kind(kind, format!("{}: {}", status, text)))
    }
}

#[async_trait::async_trait]
impl ContextService for RemoteContextStore {
    async fn create_context(&self, request: CreateContextRequest) -> Result<CreateContextResponse> {
        let resp = self
            .client
            .post(self.url(&[])?)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        self.decode(resp).await
    }

    async fn get_context(&self, context_id: &str) -> Result<ContextResponse> {
        let resp = self
            .client
            .get(self.url(&[context_id])?)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        self.decode(resp).await
    }

    async fn list_contexts(&self) -> Result<Vec<String>> {
        let resp = self
            .client
            .get(self.url(&[])?)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        let list: ListContextsResponse = self.decode(resp).await?;
        Ok(list.contexts)
    }

    async fn add_prompt(&self, context_id: &str, request: PromptRequest) -> Result<PromptResponse> {
        let resp = self
            .client
            .post(self.url(&[context_id, "prompt"])?)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        self.decode(resp).await
    }

    async fn add_node(&self, context_id: &str, node: ContextNode) -> Result<ContextNode> {
        let resp = self
            .client
            .post(self.url(&[context_id, "nodes"])?)
            .json(&AddNodeRequest { node })
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        let added: AddNodeResponse = self.decode(resp).await?;
        Ok(added.node)
    }

    async fn delete_node(&self, context_id: &str, node_id: &str) -> Result<bool> {
        let resp = self
            .client
            .delete(self.url(&[context_id, "nodes", node_id])?)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        let deleted: DeletedResponse = self.decode(resp).await?;
        Ok(deleted.deleted)
    }

    async fn delete_context(&self, context_id: &str) -> Result<bool> {
        let resp = self
            .client
            .delete(self.url(&[context_id])?)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        let deleted: DeletedResponse = self.decode(resp).await?;
        Ok(deleted.deleted)
    }

    async fn render_prompt(&self, context_id: &str) -> Result<String> {
        let resp = self
            .client
            .get(self.url(&[context_id, "render"])?)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        let rendered: RenderResponse = self.decode(resp).await?;
        Ok(rendered.prompt)
    }
}
