//! Sign-in with a role passcode. The session lives in a signed cookie.

use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Json as ResponseJson},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use deployment::Deployment;
use services::services::session::{Actor, LoginRequest, authenticate};
use tracing::{info, warn};
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::Json,
    middleware::session::{CurrentActor, clear_session_cookie, session_cookie},
};

pub async fn login(
    State(deployment): State<DeploymentImpl>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = match authenticate(deployment.config(), &payload) {
        Ok(actor) => actor,
        Err(e) => {
            warn!(role = %payload.role, error = %e, "Login rejected");
            return Err(e.into());
        }
    };
    let sessions = deployment.sessions();
    let token = sessions.issue(&actor)?;
    let cookie = session_cookie(
        token,
        sessions.ttl().num_seconds(),
        deployment.config().secure_cookies,
    );
    info!(actor = %actor.name, role = %actor.role, "Signed in");

    Ok((
        jar.add(cookie),
        ResponseJson(ApiResponse::<Actor>::success(actor)),
    ))
}

/// Tokens are stateless, so signing out only drops the cookie.
pub async fn logout(State(deployment): State<DeploymentImpl>, jar: CookieJar) -> impl IntoResponse {
    (
        jar.add(clear_session_cookie(deployment.config().secure_cookies)),
        ResponseJson(ApiResponse::<()>::success(())),
    )
}

pub async fn me(CurrentActor(actor): CurrentActor) -> ResponseJson<ApiResponse<Actor>> {
    ResponseJson(ApiResponse::success(actor))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/auth",
        Router::new()
            .route("/login", post(login))
            .route("/logout", post(logout))
            .route("/me", get(me)),
    )
}
