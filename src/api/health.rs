use axum::response::Json;
use serde_json::{Value, json};

/// Liveness check for load balancers. Touches neither the session nor Spotify.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
