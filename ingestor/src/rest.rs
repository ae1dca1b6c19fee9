use crate::db::TimeSeriesStore;
use crate::errors::Result;
use crate::validate::parse_reading;
use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::debug;

#[derive(Clone)]
struct AppState {
    store: Arc<dyn TimeSeriesStore>,
}

pub fn create_router(store: Arc<dyn TimeSeriesStore>) -> Router {
    let state = AppState { store };

    Router::new()
        .route("/telemetry", post(log_telemetry))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Takes the raw body so that malformed JSON maps to our own 400 instead of
/// the extractor's rejection.
async fn log_telemetry(State(state): State<AppState>, body: Bytes) -> Result<&'static str> {
    let reading = parse_reading(&body)?;
    let hive_id = reading.hive_id.clone();

    state.store.write_points(&[reading.into_point()]).await?;

    debug!("Logged reading for hive {}", hive_id);
    Ok("Data logged")
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
