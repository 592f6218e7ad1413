//! Uniform access to a context store, in-process or over HTTP

use crate::store::ContextStore;
use taskweave_core::{
    ContextNode, ContextResponse, CreateContextRequest, CreateContextResponse, PromptRequest,
    PromptResponse, Result,
};

#[async_trait::async_trait]
pub trait ContextService: Send + Sync {
    async fn create_context(&self, request: CreateContextRequest) -> Result<CreateContextResponse>;
    async fn get_context(&self, context_id: &str) -> Result<ContextResponse>;
    async fn list_contexts(&self) -> Result<Vec<String>>;
    async fn add_prompt(&self, context_id: &str, request: PromptRequest) -> Result<PromptResponse>;
    async fn add_node(&self, context_id: &str, node: ContextNode) -> Result<ContextNode>;
    async fn delete_node(&self, context_id: &str, node_id: &str) -> Result<bool>;
    async fn delete_context(&self, context_id: &str) -> Result<bool>;
    async fn render_prompt(&self, context_id: &str) -> Result<String>;
}

#[async_trait::async_trait]
impl ContextService for ContextStore {
    async fn create_context(&self, request: CreateContextRequest) -> Result<CreateContextResponse> {
        let context = ContextStore::create_context(self, &request.model_id, request.nodes, request.metadata);
        Ok(CreateContextResponse {
            context_id: context.id.to_string(),
            model: self.model_info(&context.model_id),
            nodes: if request.return_context {
                context.node_list()
            } else {
                Vec::new()
            },
            metadata: context.metadata,
        })
    }

    async fn get_context(&self, context_id: &str) -> Result<ContextResponse> {
        let context = ContextStore::get_context(self, context_id).await?;
        Ok(ContextResponse {
            context_id: context.id.to_string(),
            model: self.model_info(&context.model_id),
            nodes: context.node_list(),
            metadata: context.metadata,
            created_at: context.created_at,
            updated_at: context.updated_at,
        })
    }

    async fn list_contexts(&self) -> Result<Vec<String>> {
        Ok(ContextStore::list_contexts(self))
    }

    async fn add_prompt(&self, context_id: &str, request: PromptRequest) -> Result<PromptResponse> {
        ContextStore::add_prompt(self, context_id, request).await
    }

    async fn add_node(&self, context_id: &str, node: ContextNode) -> Result<ContextNode> {
        ContextStore::add_node(self, context_id, node).await
    }

    async fn delete_node(&self, context_id: &str, node_id: &str) -> Result<bool> {
        ContextStore::delete_node(self, context_id, node_id).await
    }

    async fn delete_context(&self, context_id: &str) -> Result<bool> {
        ContextStore::delete_context(self, context_id)
    }

    async fn render_prompt(&self, context_id: &str) -> Result<String> {
        ContextStore::render_prompt(self, context_id).await
    }
}
