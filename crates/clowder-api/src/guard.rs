use axum::http::StatusCode;
use tracing::error;

use clowder_db::Database;
use clowder_types::api::{Clearance, SessionEntry};

use crate::AppState;

/// Verdict on a presented session token. Unlike the wire-level [`Clearance`],
/// an `Ok` verdict carries the owning user id for downstream use.
pub enum Verdict {
    Ok { user: i64 },
    Expired,
    Nope,
}

impl Verdict {
    pub fn clearance(&self) -> Clearance {
        match self {
            Verdict::Ok { .. } => Clearance::Ok,
            Verdict::Expired => Clearance::Expired,
            Verdict::Nope => Clearance::Nope,
        }
    }
}

/// Resolves a presented token against the session store. A missing or unknown
/// token is `Nope`; a known token whose expiry marker is anything other than
/// the literal `"none"` is `Expired`.
pub fn authorize(db: &Database, token: Option<&str>) -> anyhow::Result<Verdict> {
    let Some(token) = token else {
        return Ok(Verdict::Nope);
    };
    if token.is_empty() {
        return Ok(Verdict::Nope);
    }
    let Some(row) = db.token_by_value(token)? else {
        return Ok(Verdict::Nope);
    };
    if row.expiry != "none" {
        return Ok(Verdict::Expired);
    }
    Ok(Verdict::Ok { user: row.user })
}

/// The user's sessions with the current one sorted to the end: non-current
/// sessions keep storage order, the session matching `current` comes last.
pub fn sessions_for(
    db: &Database,
    user: i64,
    current: Option<&str>,
) -> anyhow::Result<Vec<SessionEntry>> {
    let rows = db.tokens_for_user(user)?;
    let (others, current_row): (Vec<_>, Vec<_>) = rows
        .into_iter()
        .partition(|t| Some(t.value.as_str()) != current);

    Ok(others
        .into_iter()
        .chain(current_row)
        .map(|t| SessionEntry {
            id: t.id,
            info: t.info,
        })
        .collect())
}

/// Error half of every handler: a status plus a short body word
/// (a clearance or domain-error name, or empty for internal failures).
pub type Denial = (StatusCode, &'static str);

const INTERNAL: Denial = (StatusCode::INTERNAL_SERVER_ERROR, "");

/// Runs blocking DB work off the async runtime, folding join and storage
/// failures into a 500.
pub async fn run_db<T, F>(f: F) -> Result<T, Denial>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            INTERNAL
        })?
        .map_err(|e| {
            error!("database error: {}", e);
            INTERNAL
        })
}

/// Gate for protected handlers: yields the authorized user id, or a 401
/// whose body is the non-ok clearance word.
pub async fn require_ok(state: &AppState, token: Option<String>) -> Result<i64, Denial> {
    let st = state.clone();
    let verdict = run_db(move || authorize(&st.db, token.as_deref())).await?;
    match verdict {
        Verdict::Ok { user } => Ok(user),
        other => Err((StatusCode::UNAUTHORIZED, other.clearance().as_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tokens_are_nope() {
        let db = Database::open_in_memory().unwrap();

        assert!(matches!(authorize(&db, None).unwrap(), Verdict::Nope));
        assert!(matches!(authorize(&db, Some("")).unwrap(), Verdict::Nope));
        assert!(matches!(
            authorize(&db, Some("no-such-token")).unwrap(),
            Verdict::Nope
        ));
    }

    #[test]
    fn expiry_marker_other_than_none_is_expired() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("admin", "hash").unwrap();
        db.insert_token(user, "stale", "phone").unwrap();
        db.with_conn(|conn| {
            conn.execute("UPDATE tokens SET expiry = '2026-01-01' WHERE value = 'stale'", [])?;
            Ok(())
        })
        .unwrap();

        assert!(matches!(
            authorize(&db, Some("stale")).unwrap(),
            Verdict::Expired
        ));
    }

    #[test]
    fn live_tokens_carry_their_user() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("admin", "hash").unwrap();
        db.insert_token(user, "live", "phone").unwrap();

        match authorize(&db, Some("live")).unwrap() {
            Verdict::Ok { user: got } => assert_eq!(got, user),
            _ => panic!("expected ok verdict"),
        }
    }

    #[test]
    fn current_session_sorts_last() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("admin", "hash").unwrap();
        db.insert_token(user, "tok-a", "phone").unwrap();
        db.insert_token(user, "tok-b", "laptop").unwrap();
        db.insert_token(user, "tok-c", "tablet").unwrap();

        let sessions = sessions_for(&db, user, Some("tok-b")).unwrap();
        let infos: Vec<&str> = sessions.iter().map(|s| s.info.as_str()).collect();
        assert_eq!(infos, ["phone", "tablet", "laptop"]);
    }
}
