use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, header},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::catalog::{get_template, sheets, templates};
use crate::config::Config;
use crate::error::{LabelError, Result};
use crate::export::ExportFormat;
use crate::icons::{IconResolver, IconSource};
use crate::model::{
    LabelBatchRequest, LabelSingleRequest, Storage, StorageCreate, StorageLabel,
    StorageLabelCreate, StorageLabelUpdate, Validate, ValidationErrors,
};
use crate::service::{LabelService, RenderOutput, warnings_header};
use crate::store::LabelStore;

pub const WARNINGS_HEADER: HeaderName = HeaderName::from_static("x-warnings");

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LabelService>,
    pub store: Arc<LabelStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, store: LabelStore, icons: Arc<dyn IconSource>) -> Self {
        let service = LabelService::new(config.render.clone(), config.theme.clone(), icons);
        Self {
            service: Arc::new(service),
            store: Arc::new(store),
            config: Arc::new(config),
        }
    }

    /// State backed by the configured database file and icon directory.
    pub fn from_config(config: Config) -> Result<Self> {
        let store = LabelStore::open(&config.database.path)?;
        let resolver = IconResolver::new(&config.render.icons_dir);
        if !resolver.base_dir().is_dir() {
            tracing::warn!(dir = %resolver.base_dir().display(), "icon directory does not exist");
        }
        Ok(Self::new(config, store, Arc::new(resolver)))
    }
}

pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/types", get(list_types))
        .route("/sheets", get(list_sheets))
        .route("/labels/batch", post(render_batch))
        .route("/labels/single", post(render_single))
        .route("/storages", post(create_storage).get(list_storages))
        .route("/storages/:id", get(get_storage).delete(delete_storage))
        .route(
            "/storages/:id/labels",
            post(add_storage_label).get(list_storage_labels),
        )
        .route("/storages/:id/labels/:label_id", patch(update_storage_label))
        .route("/storages/:id/labels/:label_id/printed", post(mark_printed))
        .route("/storages/:id/print-missing", post(print_missing))
        .layer(TraceLayer::new_for_http());

    let router = if state.config.server.permissive_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };
    router.with_state(state)
}

pub async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(database = %config.database.path.display(), "opening label store");
    let state = AppState::from_config(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("labelsmith listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
pub struct FormatQuery {
    pub fmt: Option<String>,
}

impl FormatQuery {
    fn format(&self) -> Result<ExportFormat> {
        self.fmt.as_deref().unwrap_or("pdf").parse()
    }
}

#[derive(Debug, Deserialize)]
pub struct PrintedQuery {
    #[serde(default = "default_qty")]
    pub qty: i64,
}

fn default_qty() -> i64 {
    1
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_types() -> Json<serde_json::Value> {
    Json(json!({ "types": templates() }))
}

async fn list_sheets() -> Json<serde_json::Value> {
    Json(json!({ "sheets": sheets() }))
}

async fn render_batch(
    State(state): State<AppState>,
    Query(query): Query<FormatQuery>,
    Json(req): Json<LabelBatchRequest>,
) -> Result<Response> {
    let format = query.format()?;
    let service = state.service.clone();
    let output = run_blocking(move || service.render_batch(&req, format)).await?;
    Ok(file_response(output, state.service.config().warnings_header_limit))
}

async fn render_single(
    State(state): State<AppState>,
    Query(query): Query<FormatQuery>,
    Json(req): Json<LabelSingleRequest>,
) -> Result<Response> {
    let format = query.format()?;
    let service = state.service.clone();
    let output = run_blocking(move || service.render_single(&req, format)).await?;
    Ok(file_response(output, state.service.config().warnings_header_limit))
}

async fn create_storage(
    State(state): State<AppState>,
    Json(data): Json<StorageCreate>,
) -> Result<Json<Storage>> {
    data.validate()?;
    let store = state.store.clone();
    Ok(Json(run_blocking(move || store.create_storage(&data)).await?))
}

async fn list_storages(State(state): State<AppState>) -> Result<Json<Vec<Storage>>> {
    let store = state.store.clone();
    Ok(Json(run_blocking(move || store.list_storages()).await?))
}

async fn get_storage(
    State(state): State<AppState>,
    Path(storage_id): Path<i64>,
) -> Result<Json<Storage>> {
    let store = state.store.clone();
    Ok(Json(run_blocking(move || store.get_storage(storage_id)).await?))
}

async fn delete_storage(
    State(state): State<AppState>,
    Path(storage_id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    let store = state.store.clone();
    run_blocking(move || store.delete_storage(storage_id)).await?;
    Ok(Json(json!({ "deleted": storage_id })))
}

async fn add_storage_label(
    State(state): State<AppState>,
    Path(storage_id): Path<i64>,
    Json(data): Json<StorageLabelCreate>,
) -> Result<Json<StorageLabel>> {
    if get_template(&data.template_type).is_none() {
        return Err(LabelError::UnknownTemplate(data.template_type));
    }
    data.validate()?;
    let store = state.store.clone();
    Ok(Json(run_blocking(move || store.add_label(storage_id, &data)).await?))
}

async fn list_storage_labels(
    State(state): State<AppState>,
    Path(storage_id): Path<i64>,
) -> Result<Json<Vec<StorageLabel>>> {
    let store = state.store.clone();
    Ok(Json(run_blocking(move || store.list_labels(storage_id)).await?))
}

async fn update_storage_label(
    State(state): State<AppState>,
    Path((storage_id, label_id)): Path<(i64, i64)>,
    Json(patch): Json<StorageLabelUpdate>,
) -> Result<Json<StorageLabel>> {
    patch.validate()?;
    let store = state.store.clone();
    Ok(Json(
        run_blocking(move || store.update_label(storage_id, label_id, &patch)).await?,
    ))
}

async fn mark_printed(
    State(state): State<AppState>,
    Path((storage_id, label_id)): Path<(i64, i64)>,
    Query(query): Query<PrintedQuery>,
) -> Result<Json<StorageLabel>> {
    if query.qty < 0 {
        let mut errors = ValidationErrors::default();
        errors.add("qty", "must be >= 0");
        return Err(errors.into());
    }
    let store = state.store.clone();
    Ok(Json(
        run_blocking(move || store.mark_printed(storage_id, label_id, query.qty)).await?,
    ))
}

async fn print_missing(
    State(state): State<AppState>,
    Path(storage_id): Path<i64>,
    Query(query): Query<FormatQuery>,
) -> Result<Response> {
    let format = query.format()?;
    let store = state.store.clone();
    let service = state.service.clone();
    let output = run_blocking(move || {
        let labels = store.missing_labels(storage_id)?;
        service.render_missing(storage_id, &labels, format)
    })
    .await?;
    let limit = state.service.config().warnings_header_limit;
    match output {
        Some(output) => Ok(file_response(output, limit)),
        None => Ok(Json(json!({ "message": "No missing labels", "warnings": [] })).into_response()),
    }
}

/// Runs store access and rendering off the async workers.
async fn run_blocking<T, F>(job: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| LabelError::Internal(format!("blocking task failed: {e}")))?
}

fn file_response(output: RenderOutput, warnings_limit: usize) -> Response {
    let RenderOutput {
        export, warnings, ..
    } = output;
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(export.media_type));
    let disposition = format!("inline; filename=\"{}\"", export.filename);
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Some(joined) = warnings_header(&warnings, warnings_limit) {
        if let Ok(value) = HeaderValue::from_str(&joined) {
            headers.insert(WARNINGS_HEADER, value);
        }
    }
    (headers, export.bytes).into_response()
}
