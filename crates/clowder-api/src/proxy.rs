use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use tracing::warn;

use clowder_types::api::ProxyRequest;

use crate::AppState;
use crate::guard::Denial;

/// POST /api/proxy — open; relays a remote media URL's bytes so clients
/// never talk to origin hosts directly.
pub async fn proxy(
    State(state): State<AppState>,
    Json(req): Json<ProxyRequest>,
) -> Result<impl IntoResponse, Denial> {
    let response = state.http.get(&req.url).send().await.map_err(|e| {
        warn!("proxy fetch for {} failed: {}", req.url, e);
        (StatusCode::BAD_GATEWAY, "")
    })?;

    if !response.status().is_success() {
        return Err((StatusCode::BAD_GATEWAY, ""));
    }

    let bytes = response.bytes().await.map_err(|e| {
        warn!("proxy body read for {} failed: {}", req.url, e);
        (StatusCode::BAD_GATEWAY, "")
    })?;

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        bytes.to_vec(),
    ))
}
