//! Checklist templates (admin) and their daily runs (staff).

use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::models::{
    checklist_item::{ChecklistItemWithConnections, CreateChecklistItem, UpdateChecklistItem},
    checklist_template::{
        ChecklistTemplate, ChecklistTemplateWithItems, CreateChecklistTemplate, TemplateFilter,
        UpdateChecklistTemplate,
    },
};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::{
    checklist_editor::ChecklistEditor,
    checklist_progress::ChecklistInstanceView,
    checklist_run::{ChecklistRunService, ProgressFilter, SaveProgress},
};
use tracing::info;
use ts_rs::TS;
use utils::{date, response::ApiResponse};
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{Json, Path, Query},
    middleware::session::{AdminActor, CurrentActor},
};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ReorderChecklistItems {
    pub item_ids: Vec<Uuid>,
}

fn run_service(deployment: &DeploymentImpl) -> ChecklistRunService {
    ChecklistRunService::new(deployment.db().clone(), deployment.mail().clone())
}

pub async fn get_templates(
    State(deployment): State<DeploymentImpl>,
    _actor: CurrentActor,
    Query(filter): Query<TemplateFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<ChecklistTemplate>>>, ApiError> {
    let templates = ChecklistTemplate::find_filtered(&deployment.db().pool, &filter).await?;
    Ok(ResponseJson(ApiResponse::success(templates)))
}

pub async fn get_template(
    State(deployment): State<DeploymentImpl>,
    _actor: CurrentActor,
    Path(template_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ChecklistTemplateWithItems>>, ApiError> {
    let template = ChecklistTemplateWithItems::find_by_id(&deployment.db().pool, template_id)
        .await?
        .ok_or(ApiError::NotFound("Checklist template"))?;
    Ok(ResponseJson(ApiResponse::success(template)))
}

pub async fn create_template(
    State(deployment): State<DeploymentImpl>,
    AdminActor(actor): AdminActor,
    Json(payload): Json<CreateChecklistTemplate>,
) -> Result<ResponseJson<ApiResponse<ChecklistTemplate>>, ApiError> {
    payload.validate()?;
    let template =
        ChecklistTemplate::create(&deployment.db().pool, &payload, Uuid::new_v4()).await?;
    info!(template_id = %template.id, actor = %actor.name, "Checklist template created");
    Ok(ResponseJson(ApiResponse::success(template)))
}

pub async fn update_template(
    State(deployment): State<DeploymentImpl>,
    _admin: AdminActor,
    Path(template_id): Path<Uuid>,
    Json(payload): Json<UpdateChecklistTemplate>,
) -> Result<ResponseJson<ApiResponse<ChecklistTemplate>>, ApiError> {
    payload.validate()?;
    let template = ChecklistTemplate::update(&deployment.db().pool, template_id, &payload)
        .await?
        .ok_or(ApiError::NotFound("Checklist template"))?;
    Ok(ResponseJson(ApiResponse::success(template)))
}

pub async fn delete_template(
    State(deployment): State<DeploymentImpl>,
    AdminActor(actor): AdminActor,
    Path(template_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    match ChecklistTemplate::delete(&deployment.db().pool, template_id).await? {
        0 => Err(ApiError::NotFound("Checklist template")),
        _ => {
            info!(template_id = %template_id, actor = %actor.name, "Checklist template deleted");
            Ok(ResponseJson(ApiResponse::success(())))
        }
    }
}

pub async fn create_item(
    State(deployment): State<DeploymentImpl>,
    _admin: AdminActor,
    Path(template_id): Path<Uuid>,
    Json(payload): Json<CreateChecklistItem>,
) -> Result<ResponseJson<ApiResponse<ChecklistItemWithConnections>>, ApiError> {
    let item = ChecklistEditor::add_item(&deployment.db().pool, template_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(item)))
}

pub async fn reorder_items(
    State(deployment): State<DeploymentImpl>,
    _admin: AdminActor,
    Path(template_id): Path<Uuid>,
    Json(payload): Json<ReorderChecklistItems>,
) -> Result<ResponseJson<ApiResponse<Vec<ChecklistItemWithConnections>>>, ApiError> {
    let items =
        ChecklistEditor::reorder_items(&deployment.db().pool, template_id, &payload.item_ids)
            .await?;
    Ok(ResponseJson(ApiResponse::success(items)))
}

pub async fn update_item(
    State(deployment): State<DeploymentImpl>,
    _admin: AdminActor,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateChecklistItem>,
) -> Result<ResponseJson<ApiResponse<ChecklistItemWithConnections>>, ApiError> {
    let item = ChecklistEditor::update_item(&deployment.db().pool, item_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(item)))
}

pub async fn delete_item(
    State(deployment): State<DeploymentImpl>,
    _admin: AdminActor,
    Path(item_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    ChecklistEditor::delete_item(&deployment.db().pool, item_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// Progress of every matching checklist for one business day. Defaults to
/// today in the restaurant's offset.
pub async fn get_progress(
    State(deployment): State<DeploymentImpl>,
    _actor: CurrentActor,
    Query(filter): Query<ProgressFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<ChecklistInstanceView>>>, ApiError> {
    let target_date = match filter.date.as_deref() {
        Some(raw) => date::parse_date(raw)?,
        None => date::today(deployment.config().utc_offset_hours),
    };
    let views = run_service(&deployment)
        .progress_for_date(
            target_date,
            filter.workplace,
            filter.time_slot,
            filter.category,
        )
        .await?;
    Ok(ResponseJson(ApiResponse::success(views)))
}

pub async fn get_instance(
    State(deployment): State<DeploymentImpl>,
    _actor: CurrentActor,
    Path(instance_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ChecklistInstanceView>>, ApiError> {
    let view = run_service(&deployment).instance_view(instance_id).await?;
    Ok(ResponseJson(ApiResponse::success(view)))
}

pub async fn save_progress(
    State(deployment): State<DeploymentImpl>,
    CurrentActor(actor): CurrentActor,
    Path(instance_id): Path<Uuid>,
    Json(payload): Json<SaveProgress>,
) -> Result<ResponseJson<ApiResponse<ChecklistInstanceView>>, ApiError> {
    let view = run_service(&deployment)
        .save_progress(instance_id, &actor, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(view)))
}

pub async fn submit_instance(
    State(deployment): State<DeploymentImpl>,
    CurrentActor(actor): CurrentActor,
    Path(instance_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ChecklistInstanceView>>, ApiError> {
    let view = run_service(&deployment).submit(instance_id, &actor).await?;
    Ok(ResponseJson(ApiResponse::success(view)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let template_router = Router::new()
        .route(
            "/",
            get(get_template).put(update_template).delete(delete_template),
        )
        .route("/items", post(create_item))
        .route("/items/order", put(reorder_items));

    let instance_router = Router::new()
        .route("/", get(get_instance))
        .route("/progress", put(save_progress))
        .route("/submit", post(submit_instance));

    Router::new().nest(
        "/checklists",
        Router::new()
            .route("/templates", get(get_templates).post(create_template))
            .nest("/templates/{template_id}", template_router)
            .route("/items/{item_id}", put(update_item).delete(delete_item))
            .route("/progress", get(get_progress))
            .nest("/instances/{instance_id}", instance_router),
    )
}
