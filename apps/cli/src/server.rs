use std::sync::Arc;

use anyhow::Result;
use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use scenesearch_core::{ProcessRequest, ScenesearchError, Services};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

type AppState = Arc<Services>;

#[derive(Deserialize)]
struct SearchRequest {
    text: String,
}

/// Engine error as an HTTP response with an `{"error"}` body.
#[derive(Debug)]
pub struct ApiError(ScenesearchError);

impl From<ScenesearchError> for ApiError {
    fn from(e: ScenesearchError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            ScenesearchError::NoScenesInRange => StatusCode::UNPROCESSABLE_ENTITY,
            ScenesearchError::UpstreamStatus { .. }
            | ScenesearchError::InvalidResponse { .. }
            | ScenesearchError::ApiError(_)
            | ScenesearchError::MalformedSource(_)
            | ScenesearchError::Assembly(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::info!(error = %self.0, "request rejected");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Parse a JSON body, reporting any problem as a client error.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError(ScenesearchError::invalid_request(e.to_string())))
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn search_videos(
    State(services): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: SearchRequest = parse_body(&body)?;
    let results = services.search.search(&request.text).await?;
    Ok(Json(json!({ "results": results })))
}

async fn process_video(
    State(services): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: ProcessRequest = parse_body(&body)?;
    let video = services.process.process(&request).await?;
    Ok(Json(video))
}

pub fn routes(services: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/search_videos", post(search_videos))
        .route("/process_video", post(process_video))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    request_id = %Uuid::new_v4(),
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .with_state(services)
}

pub async fn serve(services: Services, bind: &str) -> Result<()> {
    let app = routes(Arc::new(services));
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}
