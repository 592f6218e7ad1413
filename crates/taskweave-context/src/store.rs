//! In-process context store
//!
//! Each context lives in its own slot with an atomic mutation flag. A
//! mutating call that finds the flag set fails with `Conflict` instead of
//! queueing. Reads never take the flag and always see a consistent snapshot.

use crate::prompt::build_prompt;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use taskweave_core::{
    Context, ContextNode, Error, Metadata, ModelInfo, PromptRequest, PromptResponse, Result,
};
use taskweave_llm::{finalize_completion, GenerationOptions, InferenceProvider};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const DEFAULT_MODEL: &str = "default";

struct ContextSlot {
    locked: AtomicBool,
    context: RwLock<Context>,
}

impl ContextSlot {
    fn new(context: Context) -> Self {
        Self {
            locked: AtomicBool::new(false),
            context: RwLock::new(context),
        }
    }

    fn try_lock(&self) -> Option<MutationGuard<'_>> {
        self.locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| MutationGuard { flag: &self.locked })
    }
}

/// Held for the duration of one mutation. Dropping it clears the flag on
/// every exit path, errors and panics included.
struct MutationGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct ContextStore {
    contexts: DashMap<String, Arc<ContextSlot>>,
    provider: Arc<dyn InferenceProvider>,
    default_model: String,
}

impl ContextStore {
    pub fn new(provider: Arc<dyn InferenceProvider>) -> Self {
        Self {
            contexts: DashMap::new(),
            provider,
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model_info(&self, model_id: &str) -> ModelInfo {
        ModelInfo::describe(model_id, self.provider.name())
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    fn slot(&self, context_id: &str) -> Result<Arc<ContextSlot>> {
        self.contexts
            .get(context_id)
            .map(|s| s.clone())
            .ok_or_else(|| Error::context_not_found(context_id))
    }

    /// Take the mutation flag on a context that is still registered.
    fn lock<'a>(&self, context_id: &str, slot: &'a Arc<ContextSlot>) -> Result<MutationGuard<'a>> {
        let guard = slot
            .try_lock()
            .ok_or_else(|| Error::context_busy(context_id))?;
        // A delete may have finished between lookup and lock.
        let live = self
            .contexts
            .get(context_id)
            .map(|s| Arc::ptr_eq(s.value(), slot))
            .unwrap_or(false);
        if !live {
            return Err(Error::context_not_found(context_id));
        }
        Ok(guard)
    }

    /// Register a new context. Initial nodes are stored as given.
    pub fn create_context(&self, model_id: &str, nodes: Vec<ContextNode>, metadata: Metadata) -> Context {
        let model_id = if model_id.is_empty() {
            self.default_model.as_str()
        } else {
            model_id
        };
        let context = Context::new(model_id, nodes, metadata);
        let id = context.id.as_str().to_string();
        info!("Context {} created: model={} nodes={}", id, context.model_id, context.node_count());
        self.contexts
            .insert(id, Arc::new(ContextSlot::new(context.clone())));
        context
    }

    pub async fn get_context(&self, context_id: &str) -> Result<Context> {
        let slot = self.slot(context_id)?;
        let context = slot.context.read().await;
        Ok(context.clone())
    }

    pub fn list_contexts(&self) -> Vec<String> {
        self.contexts.iter().map(|e| e.key().clone()).collect()
    }

    /// Render the context's current linear prompt without mutating it.
    pub async fn render_prompt(&self, context_id: &str) -> Result<String> {
        let slot = self.slot(context_id)?;
        let context = slot.context.read().await;
        Ok(build_prompt(&context.nodes))
    }

    /// Append a prompt node, generate against the whole context, and attach
    /// the completion as the prompt's child.
    ///
    /// If generation fails the prompt node is removed again.
    pub async fn add_prompt(&self, context_id: &str, request: PromptRequest) -> Result<PromptResponse> {
        let slot = self.slot(context_id)?;
        let _guard = self.lock(context_id, &slot)?;

        let PromptRequest {
            prompt,
            prompt_id,
            parent_id,
            metadata,
        } = request;
        let prompt_id = prompt_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let options = GenerationOptions::default()
            .merged_with(metadata.get("generation_params").unwrap_or(&Value::Null));

        let (model_id, prompt_text) = {
            let mut context = slot.context.write().await;
            if context.nodes.contains_key(&prompt_id) {
                return Err(Error::invalid_input(format!("node {} already exists", prompt_id)));
            }
            if let Some(parent) = &parent_id {
                if !context.nodes.contains_key(parent) {
                    return Err(Error::node_not_found(parent.clone()));
                }
            }

            let mut node = ContextNode::new(prompt_id.clone(), prompt).with_metadata(metadata);
            node.parent = parent_id.clone();
            node.children = children_naming(&context, &prompt_id);
            context.nodes.insert(prompt_id.clone(), node);
            if let Some(parent) = parent_id.as_deref().and_then(|p| context.nodes.get_mut(p)) {
                parent.children.push(prompt_id.clone());
            }
            (context.model_id.clone(), build_prompt(&context.nodes))
        };

        debug!(
            "Context {}: generating for prompt {} ({} chars)",
            context_id,
            prompt_id,
            prompt_text.len()
        );

        let raw = match self.provider.generate(&model_id, &prompt_text, &options).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Context {}: generation failed for prompt {}: {}", context_id, prompt_id, e);
                let mut context = slot.context.write().await;
                unlink_and_remove(&mut context, &prompt_id);
                return Err(e.into());
            }
        };

        let completion = finalize_completion(&prompt_text, &raw, &options.stop_sequences);
        let completion_id = uuid::Uuid::new_v4().to_string();
        let generation_time = Utc::now().to_rfc3339();

        let mut node_meta = Metadata::new();
        node_meta.insert("model_id".into(), Value::String(model_id.clone()));
        node_meta.insert("generation_time".into(), Value::String(generation_time.clone()));

        {
            let mut context = slot.context.write().await;
            let node = ContextNode::new(completion_id.clone(), completion.clone())
                .with_parent(prompt_id.clone())
                .with_metadata(node_meta);
            context.nodes.insert(completion_id.clone(), node);
            if let Some(prompt_node) = context.nodes.get_mut(&prompt_id) {
                prompt_node.children.push(completion_id.clone());
            }
            context.touch();
        }

        let mut response_meta = Metadata::new();
        response_meta.insert("model_id".into(), Value::String(model_id));
        response_meta.insert("generation_time".into(), Value::String(generation_time));
        response_meta.insert("completion_chars".into(), Value::from(completion.chars().count()));

        info!(
            "Context {}: prompt {} -> completion {}",
            context_id, prompt_id, completion_id
        );

        Ok(PromptResponse {
            context_id: context_id.to_string(),
            prompt_id,
            completion_id,
            completion,
            metadata: response_meta,
        })
    }

    /// Insert a caller-supplied node, linking it under its parent.
    ///
    /// Entries in `node.children` are kept only when they name an existing
    /// node whose parent is this node. Nodes left behind by an earlier
    /// delete of the same id are linked back as children.
    pub async fn add_node(&self, context_id: &str, mut node: ContextNode) -> Result<ContextNode> {
        let slot = self.slot(context_id)?;
        let _guard = self.lock(context_id, &slot)?;
        let mut context = slot.context.write().await;

        if node.id.is_empty() {
            return Err(Error::invalid_input("node id must not be empty"));
        }
        if context.nodes.contains_key(&node.id) {
            return Err(Error::invalid_input(format!("node {} already exists", node.id)));
        }
        if let Some(parent) = &node.parent {
            if parent == &node.id {
                return Err(Error::invalid_input("node cannot be its own parent"));
            }
            if !context.nodes.contains_key(parent) {
                return Err(Error::node_not_found(parent.clone()));
            }
        }

        let mut seen = std::collections::HashSet::new();
        node.children.retain(|child| {
            seen.insert(child.clone())
                && context
                    .nodes
                    .get(child)
                    .map(|c| c.parent.as_deref() == Some(node.id.as_str()))
                    .unwrap_or(false)
        });
        for child in children_naming(&context, &node.id) {
            if seen.insert(child.clone()) {
                node.children.push(child);
            }
        }

        if let Some(parent) = node.parent.as_deref().and_then(|p| context.nodes.get_mut(p)) {
            if !parent.children.contains(&node.id) {
                parent.children.push(node.id.clone());
            }
        }
        context.nodes.insert(node.id.clone(), node.clone());
        context.touch();
        debug!("Context {}: added node {}", context_id, node.id);
        Ok(node)
    }

    /// Remove a node. Its children stay in place, still naming it as parent.
    pub async fn delete_node(&self, context_id: &str, node_id: &str) -> Result<bool> {
        let slot = self.slot(context_id)?;
        let _guard = self.lock(context_id, &slot)?;
        let mut context = slot.context.write().await;

        if !context.nodes.contains_key(node_id) {
            return Ok(false);
        }
        unlink_and_remove(&mut context, node_id);
        context.touch();
        debug!("Context {}: deleted node {}", context_id, node_id);
        Ok(true)
    }

    /// Remove a whole context. Fails with `Conflict` while a mutation is in
    /// progress; returns `false` if the context does not exist.
    pub fn delete_context(&self, context_id: &str) -> Result<bool> {
        let slot = match self.contexts.get(context_id) {
            Some(s) => s.clone(),
            None => return Ok(false),
        };
        let _guard = slot
            .try_lock()
            .ok_or_else(|| Error::context_busy(context_id))?;
        let removed = self
            .contexts
            .remove_if(context_id, |_, s| Arc::ptr_eq(s, &slot))
            .is_some();
        if removed {
            info!("Context {} deleted", context_id);
        }
        Ok(removed)
    }
}

fn unlink_and_remove(context: &mut Context, node_id: &str) {
    let parent = context
        .nodes
        .get(node_id)
        .and_then(|n| n.parent.clone());
    if let Some(parent) = parent.and_then(|p| context.nodes.get_mut(&p)) {
        parent.children.retain(|c| c != node_id);
    }
    context.nodes.shift_remove(node_id);
}

/// Ids of existing nodes whose `parent` is `node_id`, in insertion order.
fn children_naming(context: &Context, node_id: &str) -> Vec<String> {
    context
        .nodes
        .values()
        .filter(|n| n.parent.as_deref() == Some(node_id))
        .map(|n| n.id.clone())
        .collect()
}
