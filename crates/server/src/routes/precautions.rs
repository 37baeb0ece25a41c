use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    precaution::{CreatePrecaution, Precaution, PrecautionWithTags, UpdatePrecaution},
    shift::ContentFilter,
};
use deployment::Deployment;
use tracing::info;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{Json, Path, Query},
    middleware::session::{AdminActor, CurrentActor},
};

pub async fn get_precautions(
    State(deployment): State<DeploymentImpl>,
    _actor: CurrentActor,
    Query(filter): Query<ContentFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<PrecautionWithTags>>>, ApiError> {
    let pool = &deployment.db().pool;
    let precautions = Precaution::find_filtered(pool, &filter).await?;
    let precautions = PrecautionWithTags::load_many(pool, precautions).await?;
    Ok(ResponseJson(ApiResponse::success(precautions)))
}

pub async fn get_precaution(
    State(deployment): State<DeploymentImpl>,
    _actor: CurrentActor,
    Path(precaution_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<PrecautionWithTags>>, ApiError> {
    let pool = &deployment.db().pool;
    let precaution = Precaution::find_by_id(pool, precaution_id)
        .await?
        .ok_or(ApiError::NotFound("Precaution"))?;
    let precaution = PrecautionWithTags::load(pool, precaution).await?;
    Ok(ResponseJson(ApiResponse::success(precaution)))
}

pub async fn create_precaution(
    State(deployment): State<DeploymentImpl>,
    AdminActor(actor): AdminActor,
    Json(payload): Json<CreatePrecaution>,
) -> Result<ResponseJson<ApiResponse<PrecautionWithTags>>, ApiError> {
    payload.validate()?;
    let precaution = PrecautionWithTags::create(&deployment.db().pool, &payload).await?;
    info!(
        precaution_id = %precaution.precaution.id,
        actor = %actor.name,
        "Precaution created"
    );
    Ok(ResponseJson(ApiResponse::success(precaution)))
}

pub async fn update_precaution(
    State(deployment): State<DeploymentImpl>,
    _admin: AdminActor,
    Path(precaution_id): Path<Uuid>,
    Json(payload): Json<UpdatePrecaution>,
) -> Result<ResponseJson<ApiResponse<PrecautionWithTags>>, ApiError> {
    payload.validate()?;
    let precaution = PrecautionWithTags::update(&deployment.db().pool, precaution_id, &payload)
        .await?
        .ok_or(ApiError::NotFound("Precaution"))?;
    Ok(ResponseJson(ApiResponse::success(precaution)))
}

pub async fn delete_precaution(
    State(deployment): State<DeploymentImpl>,
    _admin: AdminActor,
    Path(precaution_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    match Precaution::delete(&deployment.db().pool, precaution_id).await? {
        0 => Err(ApiError::NotFound("Precaution")),
        _ => Ok(ResponseJson(ApiResponse::success(()))),
    }
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/precautions",
        Router::new()
            .route("/", get(get_precautions).post(create_precaution))
            .route(
                "/{precaution_id}",
                get(get_precaution)
                    .put(update_precaution)
                    .delete(delete_precaution),
            ),
    )
}
