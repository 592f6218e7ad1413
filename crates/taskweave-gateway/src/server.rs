//! Context service routes, error mapping, and server startup

use axum::{
    async_trait,
    extract::{FromRequest, Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use taskweave_context::{ContextService, ContextStore};
use taskweave_core::{
    AddNodeRequest, AddNodeResponse, CreateContextRequest, DeletedResponse, Error, ErrorBody,
    ErrorDetail, ErrorKind, ListContextsResponse, PromptRequest, RenderResponse,
};
use taskweave_llm::HttpInferenceProvider;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Bind mode for the gateway
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    #[default]
    Loopback,
    Lan,
}

impl BindMode {
    pub fn to_addr(&self) -> &str {
        match self {
            BindMode::Loopback => "127.0.0.1",
            BindMode::Lan => "0.0.0.0",
        }
    }
}

pub struct GatewayConfig {
    pub port: u16,
    pub bind: BindMode,
    pub provider_url: String,
    pub provider_timeout_secs: Option<u64>,
    pub default_model: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 8001,
            bind: BindMode::default(),
            provider_url: taskweave_llm::http::DEFAULT_INFERENCE_URL.to_string(),
            provider_timeout_secs: None,
            default_model: taskweave_context::store::DEFAULT_MODEL.to_string(),
        }
    }
}

pub struct GatewayState {
    pub service: Arc<dyn ContextService>,
    pub provider: String,
    pub started_at: std::time::Instant,
}

impl GatewayState {
    pub fn new(service: Arc<dyn ContextService>, provider: impl Into<String>) -> Self {
        Self {
            service,
            provider: provider.into(),
            started_at: std::time::Instant::now(),
        }
    }
}

/// Error response: `{"error": {"kind": ..., "message": ...}}` with a status
/// matching the kind.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = match kind {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::ProviderFailure => StatusCode::BAD_GATEWAY,
            ErrorKind::RegistryUnavailable | ErrorKind::StoreUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!("Request failed: {}", self.0);
        }
        let body = ErrorBody {
            error: ErrorDetail {
                kind,
                message: self.0.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// `Json` extractor whose rejections use the same error body as handlers.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError(Error::invalid_input(rejection.body_text()))),
        }
    }
}

pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/contexts", post(create_context).get(list_contexts))
        .route("/v1/contexts/:id", get(get_context).delete(delete_context))
        .route("/v1/contexts/:id/prompt", post(add_prompt))
        .route("/v1/contexts/:id/nodes", post(add_node))
        .route("/v1/contexts/:id/nodes/:node_id", delete(delete_node))
        .route("/v1/contexts/:id/render", get(render_prompt))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_gateway(config: GatewayConfig) -> anyhow::Result<()> {
    let mut provider = HttpInferenceProvider::new(&config.provider_url);
    if let Some(secs) = config.provider_timeout_secs {
        provider = provider.with_timeout(secs);
    }
    let store = ContextStore::new(Arc::new(provider)).with_default_model(&config.default_model);
    let state = Arc::new(GatewayState::new(Arc::new(store), config.provider_url.clone()));
    let app = router(state);

    let bind_addr: SocketAddr = format!("{}:{}", config.bind.to_addr(), config.port).parse()?;

    info!("Taskweave Gateway v{} starting", env!("CARGO_PKG_VERSION"));
    info!("  Listening on: {}", bind_addr);
    info!("  Provider:     {}", config.provider_url);
    info!("  Model:        {}", config.default_model);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let active = state.service.list_contexts().await.map(|c| c.len()).unwrap_or(0);
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "active_contexts": active,
        "provider": state.provider,
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

async fn create_context(
    State(state): State<Arc<GatewayState>>,
    JsonBody(request): JsonBody<CreateContextRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state.service.create_context(request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_contexts(State(state): State<Arc<GatewayState>>) -> ApiResult<ListContextsResponse> {
    let contexts = state.service.list_contexts().await?;
    Ok(Json(ListContextsResponse { contexts }))
}

async fn get_context(
    Path(id): Path<String>,
    State(state): State<Arc<GatewayState>>,
) -> ApiResult<taskweave_core::ContextResponse> {
    Ok(Json(state.service.get_context(&id).await?))
}

async fn delete_context(
    Path(id): Path<String>,
    State(state): State<Arc<GatewayState>>,
) -> ApiResult<DeletedResponse> {
    let deleted = state.service.delete_context(&id).await?;
    Ok(Json(DeletedResponse {
        context_id: id,
        deleted,
    }))
}

async fn add_prompt(
    Path(id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    JsonBody(request): JsonBody<PromptRequest>,
) -> ApiResult<taskweave_core::PromptResponse> {
    Ok(Json(state.service.add_prompt(&id, request).await?))
}

async fn add_node(
    Path(id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    JsonBody(request): JsonBody<AddNodeRequest>,
) -> ApiResult<AddNodeResponse> {
    let node = state.service.add_node(&id, request.node).await?;
    Ok(Json(AddNodeResponse {
        context_id: id,
        node,
    }))
}

async fn delete_node(
    Path((id, node_id)): Path<(String, String)>,
    State(state): State<Arc<GatewayState>>,
) -> ApiResult<DeletedResponse> {
    let deleted = state.service.delete_node(&id, &node_id).await?;
    Ok(Json(DeletedResponse {
        context_id: id,
        deleted,
    }))
}

async fn render_prompt(
    Path(id): Path<String>,
    State(state): State<Arc<GatewayState>>,
) -> ApiResult<RenderResponse> {
    let prompt = state.service.render_prompt(&id).await?;
    Ok(Json(RenderResponse {
        context_id: id,
        prompt,
    }))
}
