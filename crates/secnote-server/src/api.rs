//! Notes HTTP API
//!
//! Endpoints:
//!   GET  /config           published limits (JSON)
//!   POST /notes            store a wire blob, returns the note id
//!   GET  /notes/{note_id}  fetch a blob, consuming one view

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use secnote_core::config::Limits;
use secnote_core::types::{
    format_status_header, parse_limit_header, X_EXPIRES_AFTER, X_REMAINING_VIEWS,
};
use secnote_core::NoteSettings;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, info, warn};

use crate::metrics::{healthz_handler, metrics_handler, Metrics};
use crate::store::{NoteContent, NoteId, NoteStore};

/// Shared state behind every handler
pub struct AppState {
    pub limits: Limits,
    pub store: TokioMutex<NoteStore>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(limits: Limits, max_memory_usage: usize) -> Self {
        Self {
            limits,
            store: TokioMutex::new(NoteStore::new(max_memory_usage)),
            metrics: Metrics::new(),
        }
    }
}

type ApiError = (StatusCode, String);

fn bad_request(e: impl ToString) -> ApiError {
    (StatusCode::BAD_REQUEST, e.to_string())
}

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = usize::try_from(state.limits.max_note_size).unwrap_or(usize::MAX);
    Router::new()
        .route("/config", get(config_handler))
        .route("/notes", post(add_note_handler))
        .route("/notes/{note_id}", get(read_note_handler))
        .route("/healthz", get(healthz_handler))
        .route("/metrics", get(metrics_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn config_handler(State(state): State<Arc<AppState>>) -> Json<Limits> {
    Json(state.limits)
}

fn header_limit(headers: &HeaderMap, name: &'static str) -> Result<u32, ApiError> {
    let value = headers
        .get(name)
        .map(|v| v.to_str())
        .transpose()
        .map_err(|e| bad_request(format!("{name}: {e}")))?;
    parse_limit_header(value).map_err(|e| bad_request(format!("{name}: {e}")))
}

async fn add_note_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let requested = match (
        header_limit(&headers, X_EXPIRES_AFTER),
        header_limit(&headers, X_REMAINING_VIEWS),
    ) {
        (Ok(expires_after), Ok(remaining_views)) => NoteSettings {
            remaining_views,
            expires_after,
        },
        (Err(e), _) | (_, Err(e)) => {
            state.metrics.notes_rejected.inc();
            return Err(e);
        }
    };

    // the body limit layer enforces max_note_size while buffering
    let data = match body {
        Ok(data) => data,
        Err(rejection) => {
            state.metrics.notes_rejected.inc();
            let status = rejection.status();
            if status == StatusCode::PAYLOAD_TOO_LARGE {
                debug!(max_note_size = state.limits.max_note_size, "note too large");
                return Err((
                    status,
                    format!(
                        "note exceeds max_note_size of {} bytes",
                        state.limits.max_note_size
                    ),
                ));
            }
            return Err((status, rejection.body_text()));
        }
    };

    let settings = state.limits.clamp_settings(requested);
    if settings != requested {
        debug!(?requested, ?settings, "note settings clamped");
    }

    let size = data.len();
    let mut store = state.store.lock().await;
    let id = match store.add_note(NoteContent { data, settings }, Instant::now()) {
        Ok(id) => id,
        Err(e) => {
            warn!(size, "note rejected: {e}");
            state.metrics.notes_rejected.inc();
            return Err(bad_request(e));
        }
    };
    state
        .metrics
        .observe_store(store.memory_usage(), store.len());
    drop(store);

    state.metrics.notes_created.inc();
    info!(
        size,
        remaining_views = settings.remaining_views,
        expires_after = settings.expires_after,
        "note stored"
    );
    Ok(id.to_string())
}

async fn read_note_handler(
    State(state): State<Arc<AppState>>,
    Path(note_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = note_id.parse::<NoteId>().map_err(bad_request)?;

    let mut store = state.store.lock().await;
    let read = store.read_note(&id, Instant::now());
    state
        .metrics
        .observe_store(store.memory_usage(), store.len());
    drop(store);

    let Some(read) = read else {
        state.metrics.notes_not_found.inc();
        return Err((StatusCode::NOT_FOUND, "note not found".to_string()));
    };

    state.metrics.notes_read.inc();
    if read.status.is_last_view() {
        state.metrics.notes_burned.inc();
    }

    Ok((
        [
            ("content-type", "application/octet-stream".to_string()),
            (X_EXPIRES_AFTER, format_status_header(read.status.expires_after)),
            (X_REMAINING_VIEWS, format_status_header(read.status.remaining_views)),
        ],
        read.data,
    ))
}
