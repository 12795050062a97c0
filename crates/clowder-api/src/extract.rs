use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;

/// Cookie carrying the opaque session token. Scoped to `/api/` by the
/// sign-in handler.
pub const AUTH_COOKIE: &str = "auth_token";

/// Optional session token pulled from the request's cookie jar. Absence is
/// not a rejection; the guard turns it into a `nope` clearance.
#[derive(Debug, Clone)]
pub struct SessionToken(pub Option<String>);

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_request_parts(parts, state).await?;
        Ok(Self(jar.get(AUTH_COOKIE).map(|c| c.value().to_string())))
    }
}
