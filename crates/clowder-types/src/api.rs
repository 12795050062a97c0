use serde::{Deserialize, Serialize};

// -- Authorization --

/// Three-valued verdict computed from a presented session token. Canonical
/// definition lives here in clowder-types so the guard, handlers, and any
/// client code agree on the wire words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Clearance {
    Ok,
    Expired,
    Nope,
}

impl Clearance {
    pub fn as_str(self) -> &'static str {
        match self {
            Clearance::Ok => "ok",
            Clearance::Expired => "expired",
            Clearance::Nope => "nope",
        }
    }
}

/// Uniform envelope for clearance-gated operations: `result` is populated
/// only when `clearance` is `ok`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Protected<T> {
    pub clearance: Clearance,
    pub result: Option<T>,
}

impl<T> Protected<T> {
    pub fn ok(result: T) -> Self {
        Self {
            clearance: Clearance::Ok,
            result: Some(result),
        }
    }

    pub fn denied(clearance: Clearance) -> Self {
        Self {
            clearance,
            result: None,
        }
    }
}

// -- Accounts & sessions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigninRequest {
    pub login: String,
    pub password: String,
    /// Client descriptor shown in the session list (e.g. a user agent).
    pub info: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub id: i64,
    pub info: String,
}

/// Sign-in result body. The fresh token rides in a Set-Cookie header, never
/// in the JSON echoed to the client.
#[derive(Debug, Serialize, Deserialize)]
pub struct SigninResponse {
    pub sessions: Vec<SessionEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignoffRequest {
    pub session: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub new_password: String,
}

// -- Tags --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagCount {
    pub id: i64,
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttachRequest {
    /// Post id to tag.
    pub post: String,
    /// Free-form tag name; normalized (trim + lowercase) server-side.
    pub tag: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UntagRequest {
    pub post: String,
    /// Tag id, as listed by /api/tags.
    pub tag: i64,
}

// -- Posts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostsRequest {
    /// Zero-based page index.
    pub page: i64,
    /// Optional tag id narrowing the feed.
    #[serde(default)]
    pub search: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRef {
    pub tag_id: i64,
    pub tag_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostEntry {
    pub id: String,
    pub caption: String,
    pub media: String,
    pub source: String,
    /// Every tag attached to the post, regardless of any search filter.
    pub tags: Vec<TagRef>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostsPage {
    /// Total matching posts before pagination; pages = ceil(count / perPage).
    pub count: i64,
    pub posts: Vec<PostEntry>,
    pub per_page: i64,
}

// -- Feed ingestion --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedPostRequest {
    /// Externally supplied (content-derived) post id.
    pub id: String,
    /// Ordering key, seconds since epoch.
    pub time: i64,
    pub source: String,
    pub caption: String,
    /// Media references, stored newline-joined.
    pub media: Vec<String>,
}

// -- Proxy --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyRequest {
    pub url: String,
}
