use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::models::tag::{CreateTag, Tag, UpdateTag};
use deployment::Deployment;
use tracing::info;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{Json, Path},
    middleware::session::AdminActor,
};

pub async fn get_tags(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<Tag>>>, ApiError> {
    let tags = Tag::find_all(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(tags)))
}

pub async fn create_tag(
    State(deployment): State<DeploymentImpl>,
    AdminActor(actor): AdminActor,
    Json(payload): Json<CreateTag>,
) -> Result<ResponseJson<ApiResponse<Tag>>, ApiError> {
    payload.validate()?;
    let tag = Tag::create(&deployment.db().pool, &payload, Uuid::new_v4()).await?;
    info!(tag_id = %tag.id, actor = %actor.name, "Tag created");
    Ok(ResponseJson(ApiResponse::success(tag)))
}

pub async fn update_tag(
    State(deployment): State<DeploymentImpl>,
    _admin: AdminActor,
    Path(tag_id): Path<Uuid>,
    Json(payload): Json<UpdateTag>,
) -> Result<ResponseJson<ApiResponse<Tag>>, ApiError> {
    payload.validate()?;
    let tag = Tag::update(&deployment.db().pool, tag_id, &payload)
        .await?
        .ok_or(ApiError::NotFound("Tag"))?;
    Ok(ResponseJson(ApiResponse::success(tag)))
}

pub async fn delete_tag(
    State(deployment): State<DeploymentImpl>,
    _admin: AdminActor,
    Path(tag_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    match Tag::delete(&deployment.db().pool, tag_id).await? {
        0 => Err(ApiError::NotFound("Tag")),
        _ => Ok(ResponseJson(ApiResponse::success(()))),
    }
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/tags", get(get_tags).post(create_tag))
        .route("/tags/{tag_id}", put(update_tag).delete(delete_tag))
}
