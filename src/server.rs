//! HTTP API for metadata fetching and live search progress.
//!
//! ## Endpoints
//!
//! - `GET /api/metadata/providers`: list registered providers
//! - `POST /api/metadata/fetch`: fetch one reconciled record for a query
//! - `GET /api/metadata/search/stream`: run a search and stream its
//!   lifecycle events as Server-Sent Events

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use folio_metadata::stream::search_event_stream;
use folio_metadata::{FetchService, MetadataQuery, MetadataRecord};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{FolioError, Result};

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// One entry of `GET /api/metadata/providers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescription {
    pub id: String,
    pub name: String,
    pub description: String,
    pub base_url: String,
    pub enabled: bool,
}

/// Response of `POST /api/metadata/fetch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResponse {
    /// The reconciled record, or `null` when nothing was found.
    pub record: Option<MetadataRecord>,
}

/// Query string of `GET /api/metadata/search/stream`.
///
/// `authors` and `providers` are comma-separated lists.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StreamParams {
    pub title: Option<String>,
    pub authors: Option<String>,
    pub isbn: Option<String>,
    pub locale: Option<String>,
    pub max_results: Option<usize>,
    pub providers: Option<String>,
}

impl StreamParams {
    /// Convert to a structured query.
    pub fn to_query(&self) -> MetadataQuery {
        let mut query = MetadataQuery {
            title: self.title.clone(),
            authors: self.authors.as_deref().map(split_list).unwrap_or_default(),
            isbn: self.isbn.clone(),
            ..Default::default()
        };
        if let Some(locale) = self.locale.as_deref().filter(|l| !l.trim().is_empty()) {
            query.locale = locale.trim().to_owned();
        }
        if let Some(max_results) = self.max_results {
            query.max_results_per_provider = max_results;
        }
        if let Some(providers) = self.providers.as_deref() {
            query.provider_ids = Some(split_list(providers));
        }
        query
    }
}

/// OpenAI-style error envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// The error details.
    pub error: ErrorBody,
}

/// Error details within an [`ErrorResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable error message.
    pub message: String,
    /// Error type (e.g. `"server_error"`, `"invalid_request_error"`).
    #[serde(rename = "type")]
    pub error_type: String,
}

impl ErrorResponse {
    fn new(message: impl Into<String>, error_type: &str) -> Self {
        Self {
            error: ErrorBody {
                message: message.into(),
                error_type: error_type.to_owned(),
            },
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// Shared state for axum handlers.
#[derive(Clone)]
struct AppState {
    service: Arc<FetchService>,
}

/// Build the API router over `service`.
pub fn router(service: Arc<FetchService>) -> Router {
    Router::new()
        .route("/api/metadata/providers", get(handle_providers))
        .route("/api/metadata/fetch", post(handle_fetch))
        .route("/api/metadata/search/stream", get(handle_search_stream))
        .with_state(AppState { service })
}

// ---------------------------------------------------------------------------
// MetadataServer
// ---------------------------------------------------------------------------

/// HTTP server exposing a [`FetchService`].
pub struct MetadataServer {
    /// The address the server is listening on.
    addr: SocketAddr,
    /// Handle to the background server task.
    handle: JoinHandle<()>,
}

impl MetadataServer {
    /// Start the server.
    ///
    /// Binds to `{config.host}:{config.port}` (use port `0` for auto-assign)
    /// and begins serving in a background tokio task.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot bind.
    pub async fn start(service: Arc<FetchService>, config: &ServerConfig) -> Result<Self> {
        let app = router(service);

        let bind_addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| FolioError::Server(format!("bind to {bind_addr} failed: {e}")))?;

        let addr = listener
            .local_addr()
            .map_err(|e| FolioError::Server(format!("failed to get local addr: {e}")))?;

        info!("metadata server listening on http://{addr}/api/metadata");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("metadata server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    /// Returns the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Abort the server task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }

    /// Wait for the server task to finish.
    ///
    /// Resolves only if the server stops on its own or is shut down.
    pub async fn wait(&mut self) {
        if let Err(e) = (&mut self.handle).await
            && !e.is_cancelled()
        {
            tracing::error!("metadata server task failed: {e}");
        }
    }
}

impl Drop for MetadataServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn handle_providers(State(state): State<AppState>) -> Json<Vec<ProviderDescription>> {
    let providers = state
        .service
        .orchestrator()
        .registry()
        .all()
        .iter()
        .map(|provider| {
            let info = provider.source_info();
            ProviderDescription {
                id: info.id,
                name: info.name,
                description: info.description,
                base_url: info.base_url,
                enabled: provider.is_enabled(),
            }
        })
        .collect();
    Json(providers)
}

async fn handle_fetch(
    State(state): State<AppState>,
    Json(query): Json<MetadataQuery>,
) -> std::result::Result<Json<FetchResponse>, ApiError> {
    match state.service.fetch(&query).await {
        Ok(record) => Ok(Json(FetchResponse { record })),
        Err(e) => {
            tracing::error!(error = %e, "metadata fetch failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(format!("fetch failed: {e}"), "server_error")),
            ))
        }
    }
}

async fn handle_search_stream(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> std::result::Result<Response, ApiError> {
    let query = params.to_query();
    if !query.has_search_terms() {
        return Err(bad_request("at least one of title, authors or isbn is required"));
    }
    if query.max_results_per_provider == 0 {
        return Err(bad_request("max_results must be greater than 0"));
    }

    let request = state.service.search_request(&query);
    let frames = search_event_stream(Arc::clone(state.service.orchestrator()), request)
        .map(Ok::<_, Infallible>);

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(frames),
    )
        .into_response())
}

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(message, "invalid_request_error")),
    )
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}
