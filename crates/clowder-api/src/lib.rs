pub mod auth;
pub mod extract;
pub mod feed;
pub mod guard;
pub mod media;
pub mod posts;
pub mod proxy;
pub mod tags;

use std::path::PathBuf;
use std::sync::Arc;

use clowder_db::Database;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    /// Shared secret for the ingestion surface; unset disables it.
    pub feed_token: Option<String>,
    pub media_dir: PathBuf,
    pub http: reqwest::Client,
}
