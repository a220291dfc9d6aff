//! HTTP error response handling for the API
//!
//! Domain errors become HTTP responses with the status from [`ToHttpStatus`]
//! and an [`ApiError`] JSON body.

use crate::error::{ApiError, Error, ToHttpStatus};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let api_error: ApiError = self.into();
        (status_code, Json(api_error)).into_response()
    }
}

/// A bare `ApiError` has lost its status; it is answered as 500
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LinkIssue, StageError};

    async fn body_of(response: Response) -> ApiError {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_into_response() {
        let response = Error::NotFound("session 42".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let api_error = body_of(response).await;
        assert_eq!(api_error.error.code, "not_found");
        assert_eq!(api_error.error.message, "session 42 not found");
    }

    #[tokio::test]
    async fn test_invalid_request_carries_issues() {
        let error = Error::InvalidRequest {
            message: "invalid links".into(),
            issues: vec![LinkIssue::new("abc", "invalid link id")],
        };
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let api_error = body_of(response).await;
        assert_eq!(api_error.error.code, "invalid_request");
        let details = api_error.error.details.unwrap();
        assert_eq!(details[0]["id"], "abc");
        assert_eq!(details[0]["message"], "invalid link id");
    }

    #[tokio::test]
    async fn test_stage_errors_into_response() {
        let response = Error::Stage(StageError::StageRunning).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_of(response).await.error.code, "stage_running");

        let response = Error::Stage(StageError::ProcessNotRun).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_of(response).await.error.code, "process_not_run");
    }

    #[tokio::test]
    async fn test_bare_api_error_is_internal() {
        let response = ApiError::validation("bad").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
