use axum::{Json, extract::State};

use clowder_types::api::TagCount;

use crate::AppState;
use crate::guard::{Denial, run_db};

/// POST /api/tags — open. Every tag with its usage count, most-used first;
/// orphaned tags show up with count 0.
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<TagCount>>, Denial> {
    let st = state.clone();
    let rows = run_db(move || st.db.tags_with_counts()).await?;

    Ok(Json(
        rows.into_iter()
            .map(|t| TagCount {
                id: t.id,
                name: t.name,
                count: t.count,
            })
            .collect(),
    ))
}
