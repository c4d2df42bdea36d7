use axum::Json;
use serde_json::{Value, json};

// Liveness probe; does not touch the store or the catalog
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "time": chrono::Utc::now().timestamp(),
    }))
}
