use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use tracing::error;

use crate::AppState;
use crate::feed::check_feed_token;
use crate::guard::Denial;

/// 50 MB upload limit for media blobs
const MAX_BLOB_SIZE: usize = 50 * 1024 * 1024;

/// Blob keys are bare file names; anything that could walk the directory
/// tree is rejected.
fn safe_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(['/', '\\']) && key != "." && key != ".."
}

/// GET /media/{key} — open; serves a stored blob as raw bytes.
pub async fn get_media(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, Denial> {
    if !safe_key(&key) {
        return Err((StatusCode::BAD_REQUEST, ""));
    }

    let path = state.media_dir.join(&key);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| (StatusCode::NOT_FOUND, ""))?;

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    ))
}

/// PUT /feed/media/{key} — feed-token-gated blob upload from the ingestion
/// pipeline.
pub async fn put_media(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<impl IntoResponse, Denial> {
    check_feed_token(&state, &headers)?;

    if !safe_key(&key) {
        return Err((StatusCode::BAD_REQUEST, ""));
    }
    if bytes.len() > MAX_BLOB_SIZE {
        return Err((StatusCode::PAYLOAD_TOO_LARGE, ""));
    }

    tokio::fs::create_dir_all(&state.media_dir).await.map_err(|e| {
        error!("Failed to create media directory: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "")
    })?;

    let path = state.media_dir.join(&key);
    tokio::fs::write(&path, &bytes).await.map_err(|e| {
        error!("Failed to write blob {}: {}", path.display(), e);
        (StatusCode::INTERNAL_SERVER_ERROR, "")
    })?;

    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_keys_are_rejected() {
        assert!(safe_key("kitten.jpg"));
        assert!(safe_key("2024-01-01_評価.png"));

        assert!(!safe_key(""));
        assert!(!safe_key("."));
        assert!(!safe_key(".."));
        assert!(!safe_key("../etc/passwd"));
        assert!(!safe_key("nested/kitten.jpg"));
        assert!(!safe_key("windows\\style"));
    }
}
