//! Tests for taskweave-context: ContextStore invariants, guard behaviour, add_prompt

use serde_json::json;
use std::sync::{Arc, Mutex};
use taskweave_context::*;
use taskweave_core::*;
use taskweave_llm::{GenerationOptions, InferenceProvider, ProviderError, ProviderResult};
use tokio::sync::Notify;

// ===========================================================================
// Mock providers
// ===========================================================================

/// Echoes the prompt followed by a fixed suffix, recording every call.
struct EchoProvider {
    suffix: String,
    calls: Mutex<Vec<(String, String, GenerationOptions)>>,
}

impl EchoProvider {
    fn new(suffix: &str) -> Self {
        Self {
            suffix: suffix.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|c| c.1.clone()).collect()
    }
}

#[async_trait::async_trait]
impl InferenceProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, model: &str, prompt: &str, options: &GenerationOptions) -> ProviderResult<String> {
        self.calls
            .lock()
            .unwrap()
            .push((model.to_string(), prompt.to_string(), options.clone()));
        Ok(format!("{}{}", prompt, self.suffix))
    }
}

struct FailingProvider;

#[async_trait::async_trait]
impl InferenceProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _: &str, _: &str, _: &GenerationOptions) -> ProviderResult<String> {
        Err(ProviderError::RequestFailed("model crashed".into()))
    }
}

/// Blocks inside `generate` until released, so a test can hold the guard.
struct GatedProvider {
    entered: Notify,
    release: Notify,
}

#[async_trait::async_trait]
impl InferenceProvider for GatedProvider {
    fn name(&self) -> &str {
        "gated"
    }

    async fn generate(&self, _: &str, _: &str, _: &GenerationOptions) -> ProviderResult<String> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok("done".into())
    }
}

fn store_with(provider: Arc<dyn InferenceProvider>) -> ContextStore {
    ContextStore::new(provider).with_default_model("tiny")
}

fn echo_store() -> (ContextStore, Arc<EchoProvider>) {
    let provider = Arc::new(EchoProvider::new(" completion"));
    (store_with(provider.clone()), provider)
}

fn assert_links_consistent(ctx: &Context) {
    for node in ctx.nodes.values() {
        if let Some(parent) = &node.parent {
            if let Some(p) = ctx.nodes.get(parent) {
                assert!(
                    p.children.contains(&node.id),
                    "{} missing from children of {}",
                    node.id,
                    parent
                );
            }
        }
        for child in &node.children {
            let c = ctx.nodes.get(child).expect("child listed but absent");
            assert_eq!(c.parent.as_deref(), Some(node.id.as_str()));
        }
    }
}

// ===========================================================================
// Create / get / list / delete
// ===========================================================================

#[tokio::test]
async fn create_get_list() {
    let (store, _) = echo_store();
    let ctx = store.create_context("", vec![ContextNode::new("r", "hello")], Metadata::new());
    assert_eq!(ctx.model_id, "tiny");
    assert_eq!(store.list_contexts(), vec![ctx.id.to_string()]);

    let fetched = store.get_context(ctx.id.as_str()).await.unwrap();
    assert_eq!(fetched.node_count(), 1);
    assert_eq!(fetched.node("r").unwrap().content, "hello");
}

#[tokio::test]
async fn get_unknown_context_is_not_found() {
    let (store, _) = echo_store();
    let err = store.get_context("nope").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn delete_context_then_absent() {
    let (store, _) = echo_store();
    let ctx = store.create_context("m", vec![], Metadata::new());
    assert!(store.delete_context(ctx.id.as_str()).unwrap());
    assert!(!store.delete_context(ctx.id.as_str()).unwrap());
    assert!(store.is_empty());
}

// ===========================================================================
// add_node / delete_node
// ===========================================================================

#[tokio::test]
async fn add_node_links_parent() {
    let (store, _) = echo_store();
    let ctx = store.create_context("m", vec![ContextNode::new("r", "root")], Metadata::new());
    let id = ctx.id.as_str();

    store
        .add_node(id, ContextNode::new("a", "child").with_parent("r"))
        .await
        .unwrap();
    let ctx = store.get_context(id).await.unwrap();
    assert_eq!(ctx.node("r").unwrap().children, vec!["a".to_string()]);
    assert!(ctx.updated_at >= ctx.created_at);
    assert_links_consistent(&ctx);
}

#[tokio::test]
async fn add_node_rejects_missing_parent_and_duplicates() {
    let (store, _) = echo_store();
    let ctx = store.create_context("m", vec![ContextNode::new("r", "root")], Metadata::new());
    let id = ctx.id.as_str();

    let err = store
        .add_node(id, ContextNode::new("a", "x").with_parent("ghost"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = store.add_node(id, ContextNode::new("r", "again")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = store
        .add_node(id, ContextNode::new("self", "x").with_parent("self"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    assert_eq!(store.get_context(id).await.unwrap().node_count(), 1);
}

#[tokio::test]
async fn add_node_drops_inconsistent_children() {
    let (store, _) = echo_store();
    let ctx = store.create_context("m", vec![ContextNode::new("r", "root")], Metadata::new());
    let id = ctx.id.as_str();

    let mut node = ContextNode::new("a", "x").with_parent("r");
    node.children = vec!["r".into(), "missing".into()];
    let stored = store.add_node(id, node).await.unwrap();
    assert!(stored.children.is_empty());
    assert_links_consistent(&store.get_context(id).await.unwrap());
}

#[tokio::test]
async fn delete_node_unknown_returns_false_without_mutation() {
    let (store, _) = echo_store();
    let ctx = store.create_context("m", vec![ContextNode::new("r", "root")], Metadata::new());
    let id = ctx.id.as_str();
    let before = store.get_context(id).await.unwrap();

    assert!(!store.delete_node(id, "ghost").await.unwrap());

    let after = store.get_context(id).await.unwrap();
    assert_eq!(before.nodes, after.nodes);
    assert_eq!(before.updated_at, after.updated_at);
}

#[tokio::test]
async fn delete_node_keeps_orphans() {
    let (store, _) = echo_store();
    let ctx = store.create_context("m", vec![ContextNode::new("r", "root")], Metadata::new());
    let id = ctx.id.as_str();
    store.add_node(id, ContextNode::new("a", "A").with_parent("r")).await.unwrap();
    store.add_node(id, ContextNode::new("b", "B").with_parent("a")).await.unwrap();

    assert!(store.delete_node(id, "a").await.unwrap());

    let ctx = store.get_context(id).await.unwrap();
    assert!(ctx.node("a").is_none());
    assert!(ctx.node("r").unwrap().children.is_empty());
    assert_eq!(ctx.node("b").unwrap().parent.as_deref(), Some("a"));
    assert_links_consistent(&ctx);
    // orphan is not reachable from a root
    assert_eq!(store.render_prompt(id).await.unwrap(), "root");
}

#[tokio::test]
async fn readding_deleted_node_relinks_orphans() {
    let (store, _) = echo_store();
    let ctx = store.create_context("m", vec![ContextNode::new("r", "root")], Metadata::new());
    let id = ctx.id.as_str();
    store.add_node(id, ContextNode::new("a", "A").with_parent("r")).await.unwrap();
    store.add_node(id, ContextNode::new("b", "B").with_parent("a")).await.unwrap();
    store.delete_node(id, "a").await.unwrap();

    let readded = store
        .add_node(id, ContextNode::new("a", "A2").with_parent("r"))
        .await
        .unwrap();
    assert_eq!(readded.children, vec!["b".to_string()]);

    let ctx = store.get_context(id).await.unwrap();
    assert_eq!(ctx.node("a").unwrap().children, vec!["b".to_string()]);
    assert_links_consistent(&ctx);
    assert_eq!(store.render_prompt(id).await.unwrap(), "root\nA2\nB");
}

#[tokio::test]
async fn prompt_reusing_deleted_id_relinks_orphans() {
    let (store, _) = echo_store();
    let ctx = store.create_context("m", vec![ContextNode::new("p", "old")], Metadata::new());
    let id = ctx.id.as_str();
    store.add_node(id, ContextNode::new("c", "kept").with_parent("p")).await.unwrap();
    store.delete_node(id, "p").await.unwrap();

    let resp = store
        .add_prompt(
            id,
            PromptRequest {
                prompt: "new".into(),
                prompt_id: Some("p".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let ctx = store.get_context(id).await.unwrap();
    assert_eq!(
        ctx.node("p").unwrap().children,
        vec!["c".to_string(), resp.completion_id.clone()]
    );
    assert_links_consistent(&ctx);
}

#[tokio::test]
async fn links_stay_consistent_over_mixed_sequence() {
    let (store, _) = echo_store();
    let ctx = store.create_context("m", vec![ContextNode::new("r", "root")], Metadata::new());
    let id = ctx.id.as_str();

    for i in 0..6 {
        let parent = if i % 2 == 0 { "r".to_string() } else { format!("n{}", i - 1) };
        store
            .add_node(id, ContextNode::new(format!("n{}", i), "x").with_parent(parent))
            .await
            .unwrap();
    }
    store.delete_node(id, "n2").await.unwrap();
    store.delete_node(id, "n1").await.unwrap();
    store.add_node(id, ContextNode::new("n7", "x").with_parent("n4")).await.unwrap();
    store.delete_node(id, "r").await.unwrap();

    assert_links_consistent(&store.get_context(id).await.unwrap());
}

#[tokio::test]
async fn node_ids_are_scoped_per_context() {
    let (store, _) = echo_store();
    let a = store.create_context("m", vec![ContextNode::new("r", "a")], Metadata::new());
    let b = store.create_context("m", vec![ContextNode::new("r", "b")], Metadata::new());
    store.delete_node(a.id.as_str(), "r").await.unwrap();
    assert!(store.get_context(b.id.as_str()).await.unwrap().node("r").is_some());
}

// ===========================================================================
// add_prompt
// ===========================================================================

#[tokio::test]
async fn add_prompt_builds_tree_and_prompt() {
    let (store, provider) = echo_store();
    let ctx = store.create_context("m", vec![ContextNode::new("r", "hello")], Metadata::new());
    let id = ctx.id.as_str();
    assert_eq!(store.render_prompt(id).await.unwrap(), "hello");

    let resp = store
        .add_prompt(
            id,
            PromptRequest {
                prompt: "world".into(),
                parent_id: Some("r".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(provider.prompts(), vec!["hello\nworld".to_string()]);
    // echoed prompt is stripped
    assert_eq!(resp.completion, " completion");
    assert_eq!(resp.metadata["model_id"], "m");
    assert!(resp.metadata.contains_key("generation_time"));

    let ctx = store.get_context(id).await.unwrap();
    assert_eq!(ctx.node_count(), 3);
    let prompt = ctx.node(&resp.prompt_id).unwrap();
    assert_eq!(prompt.parent.as_deref(), Some("r"));
    assert_eq!(prompt.children, vec![resp.completion_id.clone()]);
    let completion = ctx.node(&resp.completion_id).unwrap();
    assert_eq!(completion.parent.as_deref(), Some(resp.prompt_id.as_str()));
    assert_eq!(completion.metadata["model_id"], "m");
    assert!(ctx.updated_at >= ctx.created_at);
    assert_links_consistent(&ctx);
}

#[tokio::test]
async fn add_prompt_uses_supplied_id_and_generation_params() {
    let (store, provider) = echo_store();
    let ctx = store.create_context("m", vec![], Metadata::new());
    let id = ctx.id.as_str();

    let mut metadata = Metadata::new();
    metadata.insert(
        "generation_params".into(),
        json!({"max_tokens": 8, "temperature": 0.2}),
    );
    let resp = store
        .add_prompt(
            id,
            PromptRequest {
                prompt: "q".into(),
                prompt_id: Some("p1".into()),
                metadata,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(resp.prompt_id, "p1");

    let calls = provider.calls.lock().unwrap();
    assert_eq!(calls[0].0, "m");
    assert_eq!(calls[0].2.max_tokens, 8);
    assert!((calls[0].2.temperature - 0.2).abs() < 1e-6);
}

#[tokio::test]
async fn add_prompt_truncates_at_stop_sequence() {
    let provider = Arc::new(EchoProvider::new(" answer###junk"));
    let store = store_with(provider);
    let ctx = store.create_context("m", vec![], Metadata::new());

    let mut metadata = Metadata::new();
    metadata.insert("generation_params".into(), json!({"stop_sequences": ["###"]}));
    let resp = store
        .add_prompt(
            ctx.id.as_str(),
            PromptRequest {
                prompt: "q".into(),
                metadata,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(resp.completion, " answer");
}

#[tokio::test]
async fn add_prompt_missing_parent_is_not_found() {
    let (store, provider) = echo_store();
    let ctx = store.create_context("m", vec![], Metadata::new());
    let err = store
        .add_prompt(
            ctx.id.as_str(),
            PromptRequest {
                prompt: "q".into(),
                parent_id: Some("ghost".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(provider.prompts().is_empty());
    assert_eq!(store.get_context(ctx.id.as_str()).await.unwrap().node_count(), 0);
}

#[tokio::test]
async fn add_prompt_provider_failure_rolls_back() {
    let store = store_with(Arc::new(FailingProvider));
    let ctx = store.create_context("m", vec![ContextNode::new("r", "hello")], Metadata::new());
    let id = ctx.id.as_str();

    let err = store
        .add_prompt(
            id,
            PromptRequest {
                prompt: "world".into(),
                parent_id: Some("r".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProviderFailure);

    let ctx = store.get_context(id).await.unwrap();
    assert_eq!(ctx.node_count(), 1);
    assert!(ctx.node("r").unwrap().children.is_empty());

    // guard released after failure
    store.add_node(id, ContextNode::new("a", "x")).await.unwrap();
}

// ===========================================================================
// Guard
// ===========================================================================

#[tokio::test]
async fn held_guard_rejects_mutations_with_conflict() {
    let provider = Arc::new(GatedProvider {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let store = Arc::new(store_with(provider.clone()));
    let ctx = store.create_context("m", vec![ContextNode::new("r", "hello")], Metadata::new());
    let id = ctx.id.to_string();

    let first = {
        let store = store.clone();
        let id = id.clone();
        tokio::spawn(async move {
            store
                .add_prompt(
                    &id,
                    PromptRequest {
                        prompt: "first".into(),
                        ..Default::default()
                    },
                )
                .await
        })
    };
    provider.entered.notified().await;

    let nodes_during = store.get_context(&id).await.unwrap().node_count();

    let err = store
        .add_prompt(
            &id,
            PromptRequest {
                prompt: "second".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(store.get_context(&id).await.unwrap().node_count(), nodes_during);

    let err = store.delete_context(&id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(store.list_contexts(), vec![id.clone()]);

    let err = store.add_node(&id, ContextNode::new("x", "x")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    let err = store.delete_node(&id, "r").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    provider.release.notify_one();
    let resp = first.await.unwrap().unwrap();
    assert_eq!(resp.completion, "done");

    let ctx = store.get_context(&id).await.unwrap();
    assert_eq!(ctx.node_count(), 3);
    assert!(store.delete_context(&id).unwrap());
}

#[tokio::test]
async fn other_contexts_unaffected_by_held_guard() {
    let provider = Arc::new(GatedProvider {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let store = Arc::new(store_with(provider.clone()));
    let busy = store.create_context("m", vec![], Metadata::new());
    let free = store.create_context("m", vec![], Metadata::new());

    let task = {
        let store = store.clone();
        let id = busy.id.to_string();
        tokio::spawn(async move {
            store
                .add_prompt(
                    &id,
                    PromptRequest {
                        prompt: "p".into(),
                        ..Default::default()
                    },
                )
                .await
        })
    };
    provider.entered.notified().await;

    store
        .add_node(free.id.as_str(), ContextNode::new("a", "x"))
        .await
        .unwrap();

    provider.release.notify_one();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn concurrent_add_prompt_never_interleaves() {
    let (store, _) = echo_store();
    let store = Arc::new(store);
    let ctx = store.create_context("m", vec![ContextNode::new("r", "hello")], Metadata::new());
    let id = ctx.id.to_string();

    let calls = (0..8).map(|i| {
        let store = store.clone();
        let id = id.clone();
        async move {
            store
                .add_prompt(
                    &id,
                    PromptRequest {
                        prompt: format!("p{}", i),
                        parent_id: Some("r".into()),
                        ..Default::default()
                    },
                )
                .await
        }
    });
    let results = futures::future::join_all(calls).await;

    let ok = results.iter().filter(|r| r.is_ok()).count();
    assert!(ok >= 1);
    for r in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(r.kind(), ErrorKind::Conflict);
    }

    let ctx = store.get_context(&id).await.unwrap();
    assert_eq!(ctx.node_count(), 1 + 2 * ok);
    assert_eq!(ctx.node("r").unwrap().children.len(), ok);
    assert_links_consistent(&ctx);
}

#[tokio::test]
async fn mutation_after_delete_is_not_found() {
    let (store, _) = echo_store();
    let ctx = store.create_context("m", vec![], Metadata::new());
    let id = ctx.id.as_str();
    store.delete_context(id).unwrap();
    let err = store.add_node(id, ContextNode::new("a", "x")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ===========================================================================
// ContextService (local)
// ===========================================================================

#[tokio::test]
async fn service_create_respects_return_context() {
    let (store, _) = echo_store();
    let service: &dyn ContextService = &store;

    let resp = service
        .create_context(CreateContextRequest {
            model_id: "m".into(),
            nodes: vec![ContextNode::new("r", "x")],
            return_context: false,
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(resp.nodes.is_empty());
    assert_eq!(resp.model.id, "m");
    assert_eq!(resp.model.provider, "echo");

    let full = service.get_context(&resp.context_id).await.unwrap();
    assert_eq!(full.nodes.len(), 1);
}
