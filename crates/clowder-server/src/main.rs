use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use clowder_api::{AppState, AppStateInner, auth, feed, media, posts, proxy, tags};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clowder=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("CLOWDER_DB_PATH").unwrap_or_else(|_| "clowder.db".into());
    let media_dir = std::env::var("CLOWDER_MEDIA_DIR").unwrap_or_else(|_| "./media".into());
    let feed_token = std::env::var("CLOWDER_FEED_TOKEN").ok();
    let host = std::env::var("CLOWDER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("CLOWDER_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    if feed_token.is_none() {
        warn!("CLOWDER_FEED_TOKEN unset; ingestion endpoints are disabled");
    }

    // Init database and seed the admin account on first boot
    let db = clowder_db::Database::open(&PathBuf::from(&db_path))?;
    auth::ensure_admin(&db)?;

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        feed_token,
        media_dir: PathBuf::from(media_dir),
        http: reqwest::Client::new(),
    });

    // The whole API speaks JSON over POST; the guard inside each protected
    // handler decides clearance, so there is no auth middleware layer.
    let api_routes = Router::new()
        .route("/api/user/vibecheck", post(auth::vibecheck))
        .route("/api/user/register", post(auth::register))
        .route("/api/user/signin", post(auth::signin))
        .route("/api/user/signoff", post(auth::signoff))
        .route("/api/user/change", post(auth::change))
        .route("/api/tags", post(tags::list_tags))
        .route("/api/posts", post(posts::list_posts))
        .route("/api/post/attach", post(posts::attach))
        .route("/api/post/untag", post(posts::untag))
        .route("/api/proxy", post(proxy::proxy));

    let feed_routes = Router::new()
        .route("/feed/post", post(feed::ingest_post))
        .route("/feed/media/{key}", put(media::put_media));

    let app = Router::new()
        .merge(api_routes)
        .merge(feed_routes)
        .route("/media/{key}", get(media::get_media))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Clowder server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
