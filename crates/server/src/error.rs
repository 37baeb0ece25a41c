use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::models::ValidationError;
use services::services::{
    checklist_editor::ChecklistEditError, checklist_run::ChecklistRunError,
    inventory::InventoryError, session::SessionError,
};
use thiserror::Error;
use utils::{date::DateParseError, response::ApiResponse};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    ChecklistRun(#[from] ChecklistRunError),
    #[error(transparent)]
    ChecklistEdit(#[from] ChecklistEditError),
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Date(#[from] DateParseError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    JsonBody(#[from] JsonRejection),
    #[error(transparent)]
    QueryString(#[from] QueryRejection),
    #[error(transparent)]
    PathParams(#[from] PathRejection),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Sign in required")]
    Unauthorized,
    #[error("Admin access required")]
    Forbidden,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::ChecklistRun(err) => match err {
                ChecklistRunError::Database(e) => database_status(e),
                ChecklistRunError::InstanceNotFound | ChecklistRunError::TemplateNotFound => {
                    StatusCode::NOT_FOUND
                }
                ChecklistRunError::AlreadySubmitted => StatusCode::CONFLICT,
                ChecklistRunError::InvalidReference(_) => StatusCode::BAD_REQUEST,
            },
            ApiError::ChecklistEdit(err) => match err {
                ChecklistEditError::Database(e) => database_status(e),
                ChecklistEditError::Validation(_) | ChecklistEditError::MissingTarget { .. } => {
                    StatusCode::BAD_REQUEST
                }
                ChecklistEditError::TemplateNotFound | ChecklistEditError::ItemNotFound => {
                    StatusCode::NOT_FOUND
                }
            },
            ApiError::Inventory(err) => match err {
                InventoryError::Database(e) => database_status(e),
                InventoryError::Validation(_) => StatusCode::BAD_REQUEST,
                InventoryError::DuplicateName(_) => StatusCode::CONFLICT,
                InventoryError::NotFound => StatusCode::NOT_FOUND,
            },
            ApiError::Session(err) => match err {
                SessionError::MissingName => StatusCode::BAD_REQUEST,
                SessionError::InvalidPasscode => StatusCode::UNAUTHORIZED,
                SessionError::InvalidKey
                | SessionError::TtlOutOfRange
                | SessionError::Encode(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Validation(_) | ApiError::Date(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(e) => database_status(e),
            // Well-formed JSON of the wrong shape is still a bad request.
            ApiError::JsonBody(JsonRejection::JsonDataError(_)) => StatusCode::BAD_REQUEST,
            ApiError::JsonBody(rejection) => rejection.status(),
            ApiError::QueryString(_) => StatusCode::BAD_REQUEST,
            ApiError::PathParams(rejection) => rejection.status(),
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
        }
    }
}

fn database_status(error: &sqlx::Error) -> StatusCode {
    match error {
        sqlx::Error::RowNotFound => StatusCode::NOT_FOUND,
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StatusCode::CONFLICT,
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn database_message(status: StatusCode) -> &'static str {
    match status {
        StatusCode::NOT_FOUND => "Record not found",
        StatusCode::CONFLICT => "Record already exists",
        StatusCode::BAD_REQUEST => "A referenced record does not exist",
        _ => "Internal server error",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let is_database = matches!(
            self,
            ApiError::Database(_)
                | ApiError::ChecklistRun(ChecklistRunError::Database(_))
                | ApiError::ChecklistEdit(ChecklistEditError::Database(_))
                | ApiError::Inventory(InventoryError::Database(_))
        );

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else if is_database {
            tracing::debug!(error = %self, "Database constraint rejected request");
            database_message(status).to_string()
        } else {
            self.to_string()
        };

        (status, Json(ApiResponse::<()>::error(&message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_domain_errors_to_status_codes() {
        assert_eq!(
            ApiError::from(ChecklistRunError::AlreadySubmitted).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(InventoryError::DuplicateName("Rice".to_string())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(ChecklistEditError::ItemNotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(ValidationError::new("bad")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(SessionError::InvalidPasscode).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::from(sqlx::Error::PoolTimedOut).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unique_violations_use_a_neutral_message() {
        assert_eq!(
            database_message(StatusCode::CONFLICT),
            "Record already exists"
        );
    }

    #[test]
    fn pool_errors_are_internal() {
        let response = ApiError::from(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
