use crate::error::StoreError;
use crate::pipeline::{IngestService, Trigger};
use crate::queries;
use crate::types::EventFilter;
use axum::{
    extract::{Path, Query},
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Extension, Router,
};
use hyper::Server;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<IngestService>,
}

impl AppState {
    pub fn new(service: Arc<IngestService>) -> Self {
        Self { service }
    }
}

/// Query string of `GET /api/events`.
#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<String>,
    pub search: Option<String>,
    /// `featured` restricts the listing to featured events.
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl From<EventsQuery> for EventFilter {
    fn from(query: EventsQuery) -> Self {
        let defaults = EventFilter::default();
        EventFilter {
            category: query.category,
            search: query.search,
            featured: query.kind.as_deref() == Some("featured"),
            page: query.page.unwrap_or(defaults.page),
            limit: query.limit.unwrap_or(defaults.limit),
        }
    }
}

enum ApiError {
    NotFound,
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "message": "Event not found" })),
            )
                .into_response(),
            ApiError::Store(e) => {
                error!(error = %e, "event store query failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "message": "Server error" })),
                )
                    .into_response()
            }
        }
    }
}

async fn health(Extension(state): Extension<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "sydney-events-scraper",
        "version": env!("CARGO_PKG_VERSION"),
        "ingesting": state.service.is_running(),
    }))
}

async fn list_events(
    Extension(state): Extension<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = EventFilter::from(query);
    let page = queries::list_events(state.service.storage().as_ref(), &filter).await?;
    Ok(Json(page))
}

async fn get_event(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = Uuid::parse_str(&id).map_err(|_| ApiError::NotFound)?;
    let event = queries::get_event(state.service.storage().as_ref(), id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(event))
}

async fn categories(Extension(state): Extension<AppState>) -> Result<impl IntoResponse, ApiError> {
    let categories = queries::categories(state.service.storage().as_ref()).await?;
    Ok(Json(categories))
}

/// Manual ingestion trigger. Always answers 200; the outcome is in the body.
async fn trigger_ingest(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let summary = state.service.run(Trigger::Manual).await;
    Json(json!({
        "success": summary.is_success(),
        "message": summary.message(),
        "count": summary.count(),
    }))
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/events", get(list_events))
        .route("/api/events/categories/all", get(categories))
        .route("/api/events/:id", get(get_event))
        .route(
            "/api/scrape/eventbrite",
            get(trigger_ingest).post(trigger_ingest),
        )
        .layer(Extension(state))
        .layer(ServiceBuilder::new().layer(cors))
}

pub async fn start_server(state: AppState, port: u16) -> hyper::Result<()> {
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("HTTP server listening on http://{}", addr);
    info!("Events API: http://{}/api/events", addr);

    Server::bind(&addr).serve(app.into_make_service()).await
}
