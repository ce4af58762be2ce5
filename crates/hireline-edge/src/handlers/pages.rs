//! Fallback for page requests the edge does not render itself.

use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// Answer a page request that passed the guard but has no renderer mounted.
pub async fn not_rendered(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": {
                "code": "not_found",
                "message": format!("no page renderer mounted for {}", uri.path()),
            }
        })),
    )
}
