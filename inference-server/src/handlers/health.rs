use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::AppState;

/// Reports liveness and the current queue depth. Deliberately does not
/// probe the media store, vector store, or broker on each call; those
/// dependencies are evaluated lazily by the worker loop, not here.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let queue_size = state
        .runtime
        .queue
        .snapshot()
        .await
        .map(|snapshot| snapshot.ready + snapshot.leased + snapshot.deferred)
        .unwrap_or(-1);

    Json(json!({
        "status": "ok",
        "queue_size": queue_size,
    }))
}
