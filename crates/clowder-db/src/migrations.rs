use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            login       TEXT NOT NULL,
            password    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tokens (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user        INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            value       TEXT NOT NULL UNIQUE,
            info        TEXT NOT NULL,
            expiry      TEXT NOT NULL DEFAULT 'none'
        );

        CREATE INDEX IF NOT EXISTS idx_tokens_user
            ON tokens(user);

        CREATE TABLE IF NOT EXISTS tags (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS posts (
            id          TEXT PRIMARY KEY,
            time        INTEGER NOT NULL,
            source      TEXT NOT NULL,
            caption     TEXT NOT NULL,
            media       TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_posts_time
            ON posts(time DESC);

        CREATE TABLE IF NOT EXISTS pairs (
            tag         INTEGER NOT NULL REFERENCES tags(id),
            post        TEXT NOT NULL REFERENCES posts(id),
            UNIQUE(tag, post)
        );

        CREATE INDEX IF NOT EXISTS idx_pairs_post
            ON pairs(post);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
