use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use tracing::info;
use uuid::Uuid;

use clowder_db::Database;
use clowder_types::api::{
    ChangePasswordRequest, Clearance, Protected, RegisterRequest, SessionEntry, SigninRequest,
    SigninResponse, SignoffRequest,
};

use crate::AppState;
use crate::extract::{AUTH_COOKIE, SessionToken};
use crate::guard::{self, Denial, Verdict, run_db};

/// Sign-in domain failures; the wire word doubles as the 401 body.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SigninError {
    #[error("nouser")]
    NoUser,
    #[error("password")]
    WrongPassword,
}

impl SigninError {
    fn as_str(&self) -> &'static str {
        match self {
            SigninError::NoUser => "nouser",
            SigninError::WrongPassword => "password",
        }
    }
}

fn hash_password(raw: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(raw.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

fn password_matches(raw: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|parsed| {
            Argon2::default()
                .verify_password(raw.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

// -- Core operations (sync, tested directly; handlers wrap them in
// -- spawn_blocking) --

/// Inserts a new account. No uniqueness check on the login: duplicates are
/// possible and resolve to the oldest row at sign-in.
pub fn register_user(db: &Database, login: &str, password: &str) -> anyhow::Result<i64> {
    let hash = hash_password(password)?;
    db.create_user(login, &hash)
}

/// Verifies credentials and opens a fresh session. The returned session list
/// already places the new session last.
pub fn sign_in(
    db: &Database,
    login: &str,
    password: &str,
    info: &str,
) -> anyhow::Result<Result<(String, Vec<SessionEntry>), SigninError>> {
    let Some(user) = db.user_by_login(login)? else {
        return Ok(Err(SigninError::NoUser));
    };
    if !password_matches(password, &user.password) {
        return Ok(Err(SigninError::WrongPassword));
    }

    let token = Uuid::new_v4().to_string();
    db.insert_token(user.id, &token, info)?;
    let sessions = guard::sessions_for(db, user.id, Some(&token))?;

    Ok(Ok((token, sessions)))
}

/// Rehashes the password for the token's owner, then revokes every session
/// that user holds — the authorizing one included, so the caller must sign
/// in again. `false` when the token resolves to no session.
pub fn change_password(db: &Database, token: &str, new_password: &str) -> anyhow::Result<bool> {
    let Some(session) = db.token_by_value(token)? else {
        return Ok(false);
    };

    let hash = hash_password(new_password)?;
    db.set_password(session.user, &hash)?;
    db.delete_tokens_for_user(session.user)?;
    Ok(true)
}

/// Seeds the single administrative account (empty password) on first boot.
pub fn ensure_admin(db: &Database) -> anyhow::Result<()> {
    if db.count_users()? == 0 {
        register_user(db, "admin", "")?;
        info!("Seeded admin account with empty password; change it");
    }
    Ok(())
}

// -- Handlers --

/// POST /api/user/vibecheck — reports the caller's clearance; with an ok
/// clearance the result is their session list.
pub async fn vibecheck(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> Result<Json<Protected<Vec<SessionEntry>>>, Denial> {
    let st = state.clone();
    let out = run_db(move || {
        match guard::authorize(&st.db, token.as_deref())? {
            Verdict::Ok { user } => {
                let sessions = guard::sessions_for(&st.db, user, token.as_deref())?;
                Ok(Protected::ok(sessions))
            }
            other => Ok(Protected::denied(other.clearance())),
        }
    })
    .await?;
    Ok(Json(out))
}

/// POST /api/user/register — protected: only an authenticated caller may
/// create further accounts.
pub async fn register(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, Denial> {
    guard::require_ok(&state, token).await?;

    let st = state.clone();
    run_db(move || register_user(&st.db, &req.login, &req.password).map(drop)).await?;
    Ok(StatusCode::OK)
}

/// POST /api/user/signin — open. On success the fresh token travels only in
/// the Set-Cookie header; the JSON body carries the session list.
pub async fn signin(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SigninRequest>,
) -> Result<impl IntoResponse, Denial> {
    let st = state.clone();
    let outcome = run_db(move || sign_in(&st.db, &req.login, &req.password, &req.info)).await?;

    match outcome {
        Ok((token, sessions)) => {
            let cookie = Cookie::build((AUTH_COOKIE, token))
                .http_only(true)
                .secure(true)
                .same_site(SameSite::Strict)
                .path("/api/")
                .build();
            let body = Protected::ok(SigninResponse { sessions });
            Ok((jar.add(cookie), Json(body)))
        }
        Err(e) => Err((StatusCode::UNAUTHORIZED, e.as_str())),
    }
}

/// POST /api/user/signoff — protected; deleting an unknown session id is a
/// silent no-op.
pub async fn signoff(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
    Json(req): Json<SignoffRequest>,
) -> Result<impl IntoResponse, Denial> {
    guard::require_ok(&state, token).await?;

    let st = state.clone();
    run_db(move || st.db.delete_token(req.session)).await?;
    Ok(StatusCode::OK)
}

/// POST /api/user/change — protected; the authorizing session is revoked
/// along with all the others, so the response is the caller's cue to
/// re-authenticate.
pub async fn change(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, Denial> {
    let Some(token) = token else {
        return Err((StatusCode::UNAUTHORIZED, Clearance::Nope.as_str()));
    };
    guard::require_ok(&state, Some(token.clone())).await?;

    let st = state.clone();
    let changed = run_db(move || change_password(&st.db, &token, &req.new_password)).await?;
    if changed {
        Ok(StatusCode::OK)
    } else {
        Err((StatusCode::UNAUTHORIZED, Clearance::Nope.as_str()))
    }
}
