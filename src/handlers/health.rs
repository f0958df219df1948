use axum::Json;
use serde_json::{json, Value};

// The listener is only bound after the artifacts load, so answering at all
// means the model is ready.
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
