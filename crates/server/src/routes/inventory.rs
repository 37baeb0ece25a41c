use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    inventory_check::{CreateInventoryCheck, InventoryCheck},
    inventory_item::{
        CreateInventoryItem, InventoryFilter, InventoryItem, InventoryItemWithTags,
        UpdateInventoryItem,
    },
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::inventory::InventoryService;
use tracing::info;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{Json, Path, Query},
    middleware::session::{AdminActor, CurrentActor},
};

const DEFAULT_HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

pub async fn get_inventory(
    State(deployment): State<DeploymentImpl>,
    _actor: CurrentActor,
    Query(filter): Query<InventoryFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<InventoryItemWithTags>>>, ApiError> {
    let pool = &deployment.db().pool;
    let items = InventoryItem::find_filtered(pool, &filter).await?;
    let items = InventoryItemWithTags::load_many(pool, items).await?;
    Ok(ResponseJson(ApiResponse::success(items)))
}

pub async fn get_inventory_item(
    State(deployment): State<DeploymentImpl>,
    _actor: CurrentActor,
    Path(item_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<InventoryItemWithTags>>, ApiError> {
    let pool = &deployment.db().pool;
    let item = InventoryItem::find_by_id(pool, item_id)
        .await?
        .ok_or(ApiError::NotFound("Inventory item"))?;
    let item = InventoryItemWithTags::load(pool, item).await?;
    Ok(ResponseJson(ApiResponse::success(item)))
}

pub async fn create_inventory_item(
    State(deployment): State<DeploymentImpl>,
    _admin: AdminActor,
    Json(payload): Json<CreateInventoryItem>,
) -> Result<ResponseJson<ApiResponse<InventoryItemWithTags>>, ApiError> {
    let item = InventoryService::create(&deployment.db().pool, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(item)))
}

pub async fn update_inventory_item(
    State(deployment): State<DeploymentImpl>,
    _admin: AdminActor,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateInventoryItem>,
) -> Result<ResponseJson<ApiResponse<InventoryItemWithTags>>, ApiError> {
    let item = InventoryService::update(&deployment.db().pool, item_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(item)))
}

pub async fn delete_inventory_item(
    State(deployment): State<DeploymentImpl>,
    AdminActor(actor): AdminActor,
    Path(item_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    match InventoryItem::delete(&deployment.db().pool, item_id).await? {
        0 => Err(ApiError::NotFound("Inventory item")),
        _ => {
            info!(item_id = %item_id, actor = %actor.name, "Inventory item deleted");
            Ok(ResponseJson(ApiResponse::success(())))
        }
    }
}

pub async fn get_inventory_checks(
    State(deployment): State<DeploymentImpl>,
    _actor: CurrentActor,
    Path(item_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<InventoryCheck>>>, ApiError> {
    let pool = &deployment.db().pool;
    if InventoryItem::find_by_id(pool, item_id).await?.is_none() {
        return Err(ApiError::NotFound("Inventory item"));
    }
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 500);
    let checks = InventoryCheck::find_by_item(pool, item_id, limit).await?;
    Ok(ResponseJson(ApiResponse::success(checks)))
}

pub async fn create_inventory_check(
    State(deployment): State<DeploymentImpl>,
    CurrentActor(actor): CurrentActor,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<CreateInventoryCheck>,
) -> Result<ResponseJson<ApiResponse<InventoryCheck>>, ApiError> {
    let check =
        InventoryService::record_check(&deployment.db().pool, item_id, &actor, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(check)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let item_router = Router::new()
        .route(
            "/",
            get(get_inventory_item)
                .put(update_inventory_item)
                .delete(delete_inventory_item),
        )
        .route(
            "/checks",
            get(get_inventory_checks).post(create_inventory_check),
        );

    Router::new().nest(
        "/inventory",
        Router::new()
            .route("/", get(get_inventory).post(create_inventory_item))
            .nest("/{item_id}", item_router),
    )
}
