use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use clowder_db::models::PostRow;
use clowder_types::api::FeedPostRequest;

use crate::AppState;
use crate::guard::{Denial, run_db};

pub const FEED_TOKEN_HEADER: &str = "x-feed-token";

/// Ingestion surface gate: a shared secret in the `x-feed-token` header,
/// checked against configuration. An unconfigured secret disables the
/// surface outright.
pub(crate) fn check_feed_token(state: &AppState, headers: &HeaderMap) -> Result<(), Denial> {
    let Some(expected) = state.feed_token.as_deref() else {
        return Err((StatusCode::SERVICE_UNAVAILABLE, "feed token not defined"));
    };
    let presented = headers.get(FEED_TOKEN_HEADER).and_then(|v| v.to_str().ok());
    if presented != Some(expected) {
        return Err((StatusCode::UNAUTHORIZED, ""));
    }
    Ok(())
}

/// POST /feed/post — inserts one post from the ingestion pipeline. Posts are
/// keyed by content-derived ids, so replays land as no-ops.
pub async fn ingest_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<FeedPostRequest>,
) -> Result<impl IntoResponse, Denial> {
    check_feed_token(&state, &headers)?;

    let post = PostRow {
        id: req.id,
        time: req.time,
        source: req.source,
        caption: req.caption,
        media: req.media.join("\n"),
    };

    let st = state.clone();
    run_db(move || st.db.insert_post(&post)).await?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppStateInner;
    use clowder_db::Database;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn state_with_feed_token(feed_token: Option<&str>) -> AppState {
        Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            feed_token: feed_token.map(String::from),
            media_dir: PathBuf::from("./media"),
            http: reqwest::Client::new(),
        })
    }

    #[test]
    fn unconfigured_feed_token_disables_the_surface() {
        let state = state_with_feed_token(None);

        let mut headers = HeaderMap::new();
        headers.insert(FEED_TOKEN_HEADER, "anything".parse().unwrap());

        let (status, body) = check_feed_token(&state, &headers).unwrap_err();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, "feed token not defined");
    }

    #[test]
    fn wrong_or_missing_header_is_unauthorized() {
        let state = state_with_feed_token(Some("secret"));

        let (status, _) = check_feed_token(&state, &HeaderMap::new()).unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let mut headers = HeaderMap::new();
        headers.insert(FEED_TOKEN_HEADER, "wrong".parse().unwrap());
        let (status, _) = check_feed_token(&state, &headers).unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn matching_header_passes() {
        let state = state_with_feed_token(Some("secret"));

        let mut headers = HeaderMap::new();
        headers.insert(FEED_TOKEN_HEADER, "secret".parse().unwrap());
        assert!(check_feed_token(&state, &headers).is_ok());
    }
}
