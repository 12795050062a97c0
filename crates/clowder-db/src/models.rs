/// Database row types — these map directly to SQLite rows.
/// Distinct from clowder-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: i64,
    pub login: String,
    pub password: String,
}

pub struct TokenRow {
    pub id: i64,
    pub user: i64,
    pub value: String,
    pub info: String,
    pub expiry: String,
}

pub struct TagCountRow {
    pub id: i64,
    pub name: String,
    pub count: i64,
}

pub struct PostRow {
    pub id: String,
    pub time: i64,
    pub source: String,
    pub caption: String,
    pub media: String,
}

/// One (post, tag) association joined with the tag's name, as produced by
/// the per-page batch fetch.
pub struct PostTagRow {
    pub post: String,
    pub tag_id: i64,
    pub tag_name: String,
}
