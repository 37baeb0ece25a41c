use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    manual::{CreateManual, Manual, ManualDetail, UpdateManual},
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

pub async fn get_manuals(
    State(deployment): State<DeploymentImpl>,
    _actor: CurrentActor,
    Query(filter): Query<ContentFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<ManualDetail>>>, ApiError> {
    let pool = &deployment.db().pool;
    let manuals = Manual::find_filtered(pool, &filter).await?;
    let manuals = ManualDetail::load_many(pool, manuals).await?;
    Ok(ResponseJson(ApiResponse::success(manuals)))
}

pub async fn get_manual(
    State(deployment): State<DeploymentImpl>,
    _actor: CurrentActor,
    Path(manual_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ManualDetail>>, ApiError> {
    let manual = ManualDetail::find_by_id(&deployment.db().pool, manual_id)
        .await?
        .ok_or(ApiError::NotFound("Manual"))?;
    Ok(ResponseJson(ApiResponse::success(manual)))
}

pub async fn create_manual(
    State(deployment): State<DeploymentImpl>,
    AdminActor(actor): AdminActor,
    Json(payload): Json<CreateManual>,
) -> Result<ResponseJson<ApiResponse<ManualDetail>>, ApiError> {
    payload.validate()?;
    let manual = ManualDetail::create(&deployment.db().pool, &payload).await?;
    info!(manual_id = %manual.manual.id, actor = %actor.name, "Manual created");
    Ok(ResponseJson(ApiResponse::success(manual)))
}

pub async fn update_manual(
    State(deployment): State<DeploymentImpl>,
    _admin: AdminActor,
    Path(manual_id): Path<Uuid>,
    Json(payload): Json<UpdateManual>,
) -> Result<ResponseJson<ApiResponse<ManualDetail>>, ApiError> {
    payload.validate()?;
    let manual = ManualDetail::update(&deployment.db().pool, manual_id, &payload)
        .await?
        .ok_or(ApiError::NotFound("Manual"))?;
    Ok(ResponseJson(ApiResponse::success(manual)))
}

pub async fn delete_manual(
    State(deployment): State<DeploymentImpl>,
    AdminActor(actor): AdminActor,
    Path(manual_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    match Manual::delete(&deployment.db().pool, manual_id).await? {
        0 => Err(ApiError::NotFound("Manual")),
        _ => {
            info!(manual_id = %manual_id, actor = %actor.name, "Manual deleted");
            Ok(ResponseJson(ApiResponse::success(())))
        }
    }
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/manuals",
        Router::new()
            .route("/", get(get_manuals).post(create_manual))
            .route(
                "/{manual_id}",
                get(get_manual).put(update_manual).delete(delete_manual),
            ),
    )
}
