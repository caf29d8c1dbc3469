use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::errors::StudyError;

/// Error returned by every HTTP handler.
#[derive(Debug)]
pub struct ApiError(pub StudyError);

impl From<StudyError> for ApiError {
    fn from(err: StudyError) -> Self {
        Self(err)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        log::error!("blocking task failed: {err}");
        Self(StudyError::Unknown)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            StudyError::UserNotFound | StudyError::StudyPlanNotFound | StudyError::SessionNotFound => {
                StatusCode::NOT_FOUND
            }
            StudyError::EmailTaken | StudyError::InvalidInput(_) | StudyError::InactiveUser => {
                StatusCode::BAD_REQUEST
            }
            StudyError::InvalidCredentials | StudyError::Unauthenticated => StatusCode::UNAUTHORIZED,
            StudyError::DbUnavailable | StudyError::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.0.to_string(),
            "code": self.0.code(),
            "explain": self.0.explain(),
        }));
        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert("www-authenticate", axum::http::HeaderValue::from_static("Bearer"));
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(ApiError(StudyError::SessionNotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError(StudyError::EmailTaken).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError(StudyError::Unauthenticated).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError(StudyError::DbUnavailable).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unauthorized_carries_challenge() {
        let response = ApiError(StudyError::InvalidCredentials).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()["www-authenticate"], "Bearer");
    }
}
