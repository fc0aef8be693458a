//! Prometheus /metrics + health check HTTP endpoints
//!
//! Endpoints:
//!   GET /metrics   Prometheus text format
//!   GET /healthz   Liveness probe (always 200 if process is running)

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus_client::{
    encoding::text::encode,
    metrics::{counter::Counter, gauge::Gauge},
    registry::Registry,
};
use std::sync::Arc;

use crate::api::AppState;

/// Note store counters, registered under the `secnote` prefix.
pub struct Metrics {
    registry: Registry,
    pub notes_created: Counter,
    pub notes_read: Counter,
    pub notes_burned: Counter,
    pub notes_not_found: Counter,
    pub notes_rejected: Counter,
    pub store_memory_bytes: Gauge,
    pub store_notes: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("secnote");
        let notes_created = Counter::default();
        let notes_read = Counter::default();
        let notes_burned = Counter::default();
        let notes_not_found = Counter::default();
        let notes_rejected = Counter::default();
        let store_memory_bytes = Gauge::default();
        let store_notes = Gauge::default();

        registry.register("notes_created", "Notes stored", notes_created.clone());
        registry.register("notes_read", "Successful note reads", notes_read.clone());
        registry.register(
            "notes_burned",
            "Notes removed after their last allowed view",
            notes_burned.clone(),
        );
        registry.register(
            "notes_not_found",
            "Reads of unknown, expired or burned notes",
            notes_not_found.clone(),
        );
        registry.register(
            "notes_rejected",
            "Submissions refused for bad settings or size",
            notes_rejected.clone(),
        );
        registry.register(
            "store_memory_bytes",
            "Bytes charged against the note store capacity",
            store_memory_bytes.clone(),
        );
        registry.register("store_notes", "Notes currently held", store_notes.clone());

        Self {
            registry,
            notes_created,
            notes_read,
            notes_burned,
            notes_not_found,
            notes_rejected,
            store_memory_bytes,
            store_notes,
        }
    }

    /// Refresh the store gauges after a mutation.
    pub fn observe_store(&self, memory_usage: usize, notes: usize) {
        self.store_memory_bytes
            .set(i64::try_from(memory_usage).unwrap_or(i64::MAX));
        self.store_notes.set(i64::try_from(notes).unwrap_or(i64::MAX));
    }

    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut body = String::new();
        encode(&mut body, &self.registry)?;
        Ok(body)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            tracing::error!("metrics encode failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                e.to_string(),
            )
        }
    }
}

/// Liveness probe: returns 200 if the process is running.
pub async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_counters() {
        let metrics = Metrics::new();
        metrics.notes_created.inc();
        metrics.notes_created.inc();
        metrics.observe_store(4096, 2);

        let body = metrics.encode().unwrap();
        assert!(body.contains("secnote_notes_created_total 2"), "{body}");
        assert!(body.contains("secnote_store_memory_bytes 4096"), "{body}");
        assert!(body.contains("secnote_store_notes 2"), "{body}");
        assert!(body.ends_with("# EOF\n"));
    }
}
