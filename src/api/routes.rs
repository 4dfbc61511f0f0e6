//! API route definitions.
//!
//! Read-only dashboard contract; any presentation layer consumes these
//! endpoints. Every response uses the `{data, meta}` envelope.

use super::state::AppState;
use axum::extract::State;
use axum::{routing::get, Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/dashboard", get(dashboard))
        .route("/incidents", get(list_active_incidents))
        .route("/incidents/history", get(list_incident_history))
        .route("/metrics", get(metrics))
        .route("/rules", get(list_rules))
}

fn envelope(data: Value) -> Json<Value> {
    Json(json!({
        "data": data,
        "meta": {
            "timestamp": Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

async fn health() -> Json<Value> {
    envelope(json!({ "status": "ok" }))
}

async fn dashboard(State(state): State<AppState>) -> Json<Value> {
    let now = Utc::now();
    let active = state.store.list_active();
    let history = state.store.history();

    let active_incidents: Vec<Value> = active
        .iter()
        .map(|i| {
            let score = state
                .monitor
                .catalog()
                .get(&i.detection_source)
                .map(|r| r.business_impact_score);
            json!({
                "id": i.id,
                "title": i.title,
                "severity": i.severity,
                "status": i.status,
                "age_minutes": i.age_minutes(now),
                "affected_services": i.affected_services,
                "business_impact_score": score,
            })
        })
        .collect();

    let day_ago = now - chrono::Duration::hours(24);
    let recent_incidents_24h = active
        .iter()
        .chain(history.iter())
        .filter(|i| i.detected_at >= day_ago)
        .count();

    envelope(json!({
        "active_incidents": active_incidents,
        "active_incidents_count": active.len(),
        "recent_incidents_24h": recent_incidents_24h,
        "metrics": state.store.metrics(),
        "circuit_breakers_active": state.store.circuit_breaker_count(),
        "rate_limiters_active": state.store.rate_limit_count(),
        "auto_recovery_enabled": state.monitor.auto_recovery_enabled(),
        "detection_rules_enabled": state.monitor.catalog().enabled_count(),
    }))
}

async fn list_active_incidents(State(state): State<AppState>) -> Json<Value> {
    let active = state.store.list_active();
    let total = active.len();
    envelope(json!({ "incidents": active, "total": total }))
}

async fn list_incident_history(State(state): State<AppState>) -> Json<Value> {
    let history = state.store.history();
    let total = history.len();
    envelope(json!({ "incidents": history, "total": total }))
}

async fn metrics(State(state): State<AppState>) -> Json<Value> {
    envelope(json!(state.store.metrics()))
}

async fn list_rules(State(state): State<AppState>) -> Json<Value> {
    let rules: Vec<_> = state.monitor.catalog().iter().collect();
    envelope(json!({
        "rules": rules,
        "enabled": state.monitor.catalog().enabled_count(),
    }))
}
