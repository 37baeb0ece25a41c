//! Session cookie extractors.
//!
//! Handlers take [`CurrentActor`] to require any signed-in staff member and
//! [`AdminActor`] to require an admin.

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use cookie::time::Duration;
use deployment::Deployment;
use services::services::session::{Actor, SESSION_COOKIE};

use crate::{DeploymentImpl, error::ApiError};

pub struct CurrentActor(pub Actor);

pub struct AdminActor(pub Actor);

/// Value of the session cookie, if the request carries one.
pub fn session_token(jar: &CookieJar) -> Option<&str> {
    jar.get(SESSION_COOKIE).map(Cookie::value)
}

/// Cookie carrying a freshly issued session token.
pub fn session_cookie(token: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::seconds(max_age_secs))
        .build()
}

/// Cookie that replaces the session cookie and expires immediately.
pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    session_cookie(String::new(), 0, secure)
}

impl FromRequestParts<DeploymentImpl> for CurrentActor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        deployment: &DeploymentImpl,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        session_token(&jar)
            .and_then(|token| deployment.sessions().verify(token))
            .map(CurrentActor)
            .ok_or(ApiError::Unauthorized)
    }
}

impl FromRequestParts<DeploymentImpl> for AdminActor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        deployment: &DeploymentImpl,
    ) -> Result<Self, Self::Rejection> {
        let CurrentActor(actor) = CurrentActor::from_request_parts(parts, deployment).await?;
        if !actor.is_admin() {
            tracing::debug!(actor = %actor.name, "Admin route refused");
            return Err(ApiError::Forbidden);
        }
        Ok(AdminActor(actor))
    }
}
