use crate::chat::{ChatDispatcher, ChatEvent};
use crate::config::HttpServerConfig;
use crate::error::{ChatragError, Result};
use crate::service::RagService;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Check if a port is available by attempting to bind to it
async fn check_port_available(port: u16) -> bool {
    tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .is_ok()
}

/// HTTP front end for the service and the chat dispatcher
pub struct HttpServer {
    state: AppState,
    allowed_origins: Vec<String>,
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    service: Arc<RagService>,
    dispatcher: Arc<ChatDispatcher>,
    /// `None` in authless mode
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    channel_id: Option<String>,
    #[serde(default)]
    k: Option<usize>,
}

#[derive(Deserialize)]
struct NoteRequest {
    text: String,
    #[serde(default)]
    channel_id: Option<String>,
    #[serde(default)]
    label: Option<String>,
}

impl HttpServer {
    /// Create a server, reading the API key from `http_server.api_key_env`
    /// unless authless mode is enabled.
    pub fn new(
        service: Arc<RagService>,
        dispatcher: Arc<ChatDispatcher>,
        config: &HttpServerConfig,
    ) -> Result<Self> {
        let api_key = if config.authless {
            log::warn!("HTTP server running in authless mode");
            None
        } else {
            Some(std::env::var(&config.api_key_env).map_err(|_| {
                ChatragError::Config(format!(
                    "Environment variable {} not set. Set it in your .env file or as an environment variable, or enable authless mode.",
                    config.api_key_env
                ))
            })?)
        };

        Ok(Self::with_api_key(
            service,
            dispatcher,
            api_key,
            config.allowed_origins.clone(),
        ))
    }

    pub fn with_api_key(
        service: Arc<RagService>,
        dispatcher: Arc<ChatDispatcher>,
        api_key: Option<String>,
        allowed_origins: Vec<String>,
    ) -> Self {
        Self {
            state: AppState {
                service,
                dispatcher,
                api_key,
            },
            allowed_origins,
        }
    }

    /// Run the HTTP server
    pub async fn run(&self, port: u16) -> Result<()> {
        let addr = format!("127.0.0.1:{}", port);

        if !check_port_available(port).await {
            return Err(ChatragError::Config(format!(
                "Port {} is already in use. Stop the other process or set http_server.port in config.toml",
                port
            )));
        }

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            ChatragError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to bind to {}: {}", addr, e),
            ))
        })?;
        log::info!("Listening on http://{}", addr);

        axum::serve(listener, self.router())
            .await
            .map_err(|e| ChatragError::Io(std::io::Error::other(format!("HTTP server error: {}", e))))?;

        Ok(())
    }

    /// Create the axum router
    pub fn router(&self) -> Router {
        // No configured origins means local use: allow any
        let cors = if self.allowed_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<axum::http::HeaderValue> = self
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .route("/health", get(handle_health))
            .route("/stats", get(handle_stats))
            .route("/events", post(handle_event))
            .route("/query", post(handle_query))
            .route("/notes", post(handle_note))
            .route("/reset", post(handle_reset))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors),
            )
            .with_state(self.state.clone())
    }
}

async fn handle_health() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "chatrag",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
        .into_response()
}

async fn handle_stats(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(response) = validate_auth(&headers, state.api_key.as_deref()) {
        return response;
    }
    (StatusCode::OK, Json(state.service.stats().await)).into_response()
}

async fn handle_event(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(response) = validate_auth(&headers, state.api_key.as_deref()) {
        return response;
    }
    let event: ChatEvent = match parse_json(&body) {
        Ok(event) => event,
        Err(response) => return response,
    };

    let replies = state.dispatcher.handle(&event).await;
    (StatusCode::OK, Json(serde_json::json!({ "replies": replies }))).into_response()
}

async fn handle_query(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(response) = validate_auth(&headers, state.api_key.as_deref()) {
        return response;
    }
    let request: QueryRequest = match parse_json(&body) {
        Ok(r) => r,
        Err(response) => return response,
    };
    if request.query.trim().is_empty() {
        return error_response(&ChatragError::InvalidInput("query cannot be empty".to_string()));
    }

    match state
        .service
        .answer(request.query.trim(), request.channel_id.as_deref(), request.k)
        .await
    {
        Ok(answer) => (StatusCode::OK, Json(answer)).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn handle_note(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(response) = validate_auth(&headers, state.api_key.as_deref()) {
        return response;
    }
    let request: NoteRequest = match parse_json(&body) {
        Ok(r) => r,
        Err(response) => return response,
    };

    let label = request.label.as_deref().unwrap_or("note");
    match state
        .service
        .index_text(&request.text, request.channel_id.as_deref(), label)
        .await
    {
        Ok(ids) => (
            StatusCode::OK,
            Json(serde_json::json!({ "chunks": ids.len(), "chunk_ids": ids })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn handle_reset(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(response) = validate_auth(&headers, state.api_key.as_deref()) {
        return response;
    }
    let removed = state.service.delete_all().await;
    (StatusCode::OK, Json(serde_json::json!({ "removed": removed }))).into_response()
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> std::result::Result<T, Response> {
    serde_json::from_slice(body).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": format!("Invalid JSON: {}", e)})),
        )
            .into_response()
    })
}

fn error_response(error: &ChatragError) -> Response {
    let status = match error.root() {
        ChatragError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ChatragError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ChatragError::Embedding(_) | ChatragError::Completion(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        log::error!("{}", error);
    }
    (
        status,
        Json(serde_json::json!({ "error": error.to_string() })),
    )
        .into_response()
}

/// Validate Authorization header
fn validate_auth(headers: &HeaderMap, expected_key: Option<&str>) -> std::result::Result<(), Response> {
    let Some(expected_key) = expected_key else {
        return Ok(());
    };

    let auth_header = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "error": "Missing Authorization header",
                    "message": "Use 'Authorization: Bearer <api-key>' header"
                })),
            )
                .into_response()
        })?;

    match auth_header.strip_prefix("Bearer ") {
        Some(provided) if provided == expected_key => Ok(()),
        Some(_) => Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Invalid API key" })),
        )
            .into_response()),
        None => Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "Invalid Authorization header format",
                "message": "Use 'Authorization: Bearer <api-key>' header"
            })),
        )
            .into_response()),
    }
}
