use axum::{extract::State, response::Json as ResponseJson};
use deployment::Deployment;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

pub async fn health_check(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<String>>, ApiError> {
    deployment.ping().await?;
    Ok(ResponseJson(ApiResponse::success("OK".to_string())))
}
