use std::collections::HashMap;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use clowder_db::Database;
use clowder_types::api::{AttachRequest, PostEntry, PostsPage, PostsRequest, TagRef, UntagRequest};

use crate::AppState;
use crate::extract::SessionToken;
use crate::guard::{self, Denial, run_db};

pub const PER_PAGE: i64 = 20;

/// One page of the feed: the page-independent count, the page's posts newest
/// first, each annotated with all of its tags. The optional tag filter
/// narrows which posts appear, never which tags they carry.
pub fn assemble_page(db: &Database, page: i64, search: Option<i64>) -> anyhow::Result<PostsPage> {
    let count = db.count_posts(search)?;
    let rows = db.posts_page(page, PER_PAGE, search)?;

    let ids: Vec<String> = rows.iter().map(|p| p.id.clone()).collect();
    let mut tag_map: HashMap<String, Vec<TagRef>> = HashMap::new();
    for a in db.tags_for_posts(&ids)? {
        tag_map.entry(a.post).or_default().push(TagRef {
            tag_id: a.tag_id,
            tag_name: a.tag_name,
        });
    }

    let posts = rows
        .into_iter()
        .map(|row| PostEntry {
            tags: tag_map.remove(&row.id).unwrap_or_default(),
            id: row.id,
            caption: row.caption,
            media: row.media,
            source: row.source,
        })
        .collect();

    Ok(PostsPage {
        count,
        posts,
        per_page: PER_PAGE,
    })
}

/// POST /api/posts — open.
pub async fn list_posts(
    State(state): State<AppState>,
    Json(req): Json<PostsRequest>,
) -> Result<Json<PostsPage>, Denial> {
    let st = state.clone();
    let page = run_db(move || assemble_page(&st.db, req.page, req.search)).await?;
    Ok(Json(page))
}

/// POST /api/post/attach — protected. Idempotent: re-attaching an existing
/// (tag, post) pair changes nothing.
pub async fn attach(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
    Json(req): Json<AttachRequest>,
) -> Result<impl IntoResponse, Denial> {
    guard::require_ok(&state, token).await?;

    let st = state.clone();
    run_db(move || st.db.attach_tag(&req.post, &req.tag).map(drop)).await?;
    Ok(StatusCode::OK)
}

/// POST /api/post/untag — protected mirror of attach; absent pairs are a
/// silent no-op.
pub async fn untag(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
    Json(req): Json<UntagRequest>,
) -> Result<impl IntoResponse, Denial> {
    guard::require_ok(&state, token).await?;

    let st = state.clone();
    run_db(move || st.db.detach_tag(&req.post, req.tag)).await?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clowder_db::models::PostRow;

    fn seed_posts(db: &Database, n: i64) {
        for i in 0..n {
            db.insert_post(&PostRow {
                id: format!("post-{i:02}"),
                time: 1_700_000_000 + i,
                source: format!("https://example.net/{i}"),
                caption: format!("caption {i}"),
                media: String::new(),
            })
            .unwrap();
        }
    }

    #[test]
    fn empty_feed_still_reports_the_page_size() {
        let db = Database::open_in_memory().unwrap();
        let page = assemble_page(&db, 0, None).unwrap();

        assert_eq!(page.count, 0);
        assert!(page.posts.is_empty());
        assert_eq!(page.per_page, 20);
    }

    #[test]
    fn last_partial_page_of_forty_five() {
        let db = Database::open_in_memory().unwrap();
        seed_posts(&db, 45);

        let page = assemble_page(&db, 2, None).unwrap();
        assert_eq!(page.count, 45);
        assert_eq!(page.posts.len(), 5);
        assert_eq!(page.posts[0].id, "post-04");

        let beyond = assemble_page(&db, 3, None).unwrap();
        assert_eq!(beyond.count, 45);
        assert!(beyond.posts.is_empty());
    }

    #[test]
    fn filtered_posts_keep_all_their_tags() {
        let db = Database::open_in_memory().unwrap();
        seed_posts(&db, 45);

        let wanted = db.attach_tag("post-03", "wanted").unwrap();
        db.attach_tag("post-17", "wanted").unwrap();
        db.attach_tag("post-30", "wanted").unwrap();
        db.attach_tag("post-17", "extra").unwrap();

        let page = assemble_page(&db, 0, Some(wanted)).unwrap();
        assert_eq!(page.count, 3);
        let ids: Vec<&str> = page.posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["post-30", "post-17", "post-03"]);

        let tagged_17 = page.posts.iter().find(|p| p.id == "post-17").unwrap();
        let names: Vec<&str> = tagged_17.tags.iter().map(|t| t.tag_name.as_str()).collect();
        assert_eq!(names, ["wanted", "extra"], "filter does not hide sibling tags");
    }

    #[test]
    fn untagged_posts_carry_an_empty_tag_list() {
        let db = Database::open_in_memory().unwrap();
        seed_posts(&db, 2);
        db.attach_tag("post-01", "cats").unwrap();

        let page = assemble_page(&db, 0, None).unwrap();
        let bare = page.posts.iter().find(|p| p.id == "post-00").unwrap();
        assert!(bare.tags.is_empty());
    }
}
