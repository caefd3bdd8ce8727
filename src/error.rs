//! Error types: storage failures, assessment domain errors, and the HTTP-facing `ApiError`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Persistence layer failures. Fatal for the current request; safe to retry.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend could not be reached. The in-memory store never returns it.
    #[allow(dead_code)]
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("commit failed: {0}")]
    Commit(String),
}

/// Errors returned by the assessment engine.
#[derive(Debug, Error)]
pub enum AssessmentError {
    /// Outcome submitted after the test reached its terminal state.
    #[error("assessment for language '{language}' is already finished")]
    AlreadyFinished { language: String },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Boundary error mapped to an HTTP status and a `{"error": {code, message}}` body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing user identity")]
    Unauthenticated,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Assessment(#[from] AssessmentError),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Assessment(AssessmentError::AlreadyFinished { .. }) => {
                (StatusCode::CONFLICT, "ALREADY_FINISHED")
            }
            ApiError::Assessment(AssessmentError::Storage(_)) | ApiError::Storage(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_FAILURE")
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_finished_maps_to_conflict() {
        let err = ApiError::from(AssessmentError::AlreadyFinished { language: "en".into() });
        assert_eq!(err.to_string(), "assessment for language 'en' is already finished");
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn storage_failures_are_server_errors() {
        let err = ApiError::from(AssessmentError::from(StoreError::Commit("disk full".into())));
        assert!(err.to_string().contains("disk full"));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = ApiError::from(StoreError::Unavailable("down".into()));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn missing_identity_is_unauthorized() {
        assert_eq!(ApiError::Unauthenticated.into_response().status(), StatusCode::UNAUTHORIZED);
    }
}
