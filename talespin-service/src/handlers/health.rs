use crate::services::metrics;
use crate::startup::AppState;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// Health check. Also sweeps expired sessions and pings the text provider.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.orchestrator.store();
    let removed = store.sweep_expired(chrono::Utc::now());
    let active = store.len();
    metrics::set_sessions_active(active);

    let generator = state.orchestrator.generator();
    let reachable = generator.check_reachable().await;
    Json(json!({
        "status": "healthy",
        "service": "talespin",
        "version": env!("CARGO_PKG_VERSION"),
        "services": {
            "generation": generator.is_configured(),
            "generation_reachable": reachable,
            "sessions": true,
            "fallback": true
        },
        "model": generator.model(),
        "active_sessions": active,
        "expired_sessions_removed": removed,
        "session_ttl_secs": store.ttl().num_seconds(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::get_metrics(),
    )
}
