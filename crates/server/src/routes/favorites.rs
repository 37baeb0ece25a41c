//! Per-person favorites. Rows are keyed by the signed-in name, so each
//! person only ever sees and removes their own.

use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{delete, get},
};
use db::models::{
    ValidationError,
    favorite::{CreateFavorite, Favorite, FavoriteKind},
};
use deployment::Deployment;
use serde::Deserialize;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{Json, Path, Query},
    middleware::session::CurrentActor,
};

#[derive(Debug, Deserialize)]
pub struct FavoriteQuery {
    pub kind: Option<FavoriteKind>,
}

pub async fn get_favorites(
    State(deployment): State<DeploymentImpl>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<FavoriteQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Favorite>>>, ApiError> {
    let favorites = Favorite::find_for_actor(&deployment.db().pool, &actor.name, query.kind).await?;
    Ok(ResponseJson(ApiResponse::success(favorites)))
}

pub async fn create_favorite(
    State(deployment): State<DeploymentImpl>,
    CurrentActor(actor): CurrentActor,
    Json(payload): Json<CreateFavorite>,
) -> Result<ResponseJson<ApiResponse<Favorite>>, ApiError> {
    let pool = &deployment.db().pool;
    if !Favorite::target_exists(pool, &payload).await? {
        return Err(ValidationError::new(format!(
            "{} {} does not exist",
            payload.kind, payload.target_id
        ))
        .into());
    }
    let favorite = Favorite::create(pool, &actor.name, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(favorite)))
}

pub async fn delete_favorite(
    State(deployment): State<DeploymentImpl>,
    CurrentActor(actor): CurrentActor,
    Path(favorite_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    match Favorite::delete(&deployment.db().pool, favorite_id, &actor.name).await? {
        0 => Err(ApiError::NotFound("Favorite")),
        _ => Ok(ResponseJson(ApiResponse::success(()))),
    }
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/favorites", get(get_favorites).post(create_favorite))
        .route("/favorites/{favorite_id}", delete(delete_favorite))
}
