use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::store::StoreError;
use crate::survey::error::SurveyError;

const REDACTED_MESSAGE: &str = "服务器内部错误";

/// Success envelope: `{ "success": true, "data": ... }`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub code: String,
    pub message: String,
    pub trace_id: Option<String>,
}

/// Error returned by handlers. Operational errors are caused by the caller
/// and keep their message; anything else is logged in full and rendered with
/// a generic message.
#[derive(Debug, Clone)]
pub struct AppError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub is_operational: bool,
}

impl AppError {
    fn new(status: StatusCode, code: &str, message: &str, is_operational: bool) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.to_string(),
            is_operational,
        }
    }

    pub fn bad_request(code: &str, message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message, true)
    }

    pub fn not_found(message: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message, true)
    }

    pub fn conflict(code: &str, message: &str) -> Self {
        Self::new(StatusCode::CONFLICT, code, message, true)
    }

    pub fn internal(message: &str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message, false)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = if self.is_operational {
            tracing::warn!(status = %self.status, code = %self.code, error = %self.message, "API error");
            self.message
        } else {
            tracing::error!(status = %self.status, code = %self.code, error = %self.message, "Internal API error");
            REDACTED_MESSAGE.to_string()
        };

        let body = ErrorBody {
            success: false,
            code: self.code,
            message,
            trace_id: None,
        };
        (self.status, Json(body)).into_response()
    }
}

// Validation 错误是调用方输入问题，可安全暴露；其余存储错误一律按 500 脱敏。
impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        match &value {
            StoreError::Validation(msg) => AppError::bad_request("VALIDATION_ERROR", msg),
            _ => AppError::internal(&value.to_string()),
        }
    }
}

// 调用方错误原样暴露；词库数据或引擎缺陷按 500 处理并脱敏。
impl From<SurveyError> for AppError {
    fn from(value: SurveyError) -> Self {
        let message = value.to_string();
        match &value {
            SurveyError::InvalidAnswer { .. } => AppError::bad_request("INVALID_ANSWER", &message),
            SurveyError::SessionNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "SESSION_NOT_FOUND", &message, true)
            }
            SurveyError::SessionAlreadyComplete { .. } => {
                AppError::conflict("SESSION_ALREADY_COMPLETE", &message)
            }
            SurveyError::NoWordAtRank { .. }
            | SurveyError::InsufficientDistractors { .. }
            | SurveyError::NoOutstandingChallenge { .. }
            | SurveyError::Config(_) => AppError::internal(&message),
        }
    }
}

pub fn ok<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::OK, Json(ApiResponse { success: true, data }))
}

pub fn created<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::CREATED, Json(ApiResponse { success: true, data }))
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;
    use crate::survey::types::Phase;

    async fn body_json(err: AppError) -> serde_json::Value {
        let body = to_bytes(err.into_response().into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn internal_error_is_redacted() {
        let json = body_json(AppError::internal("sled crash")).await;
        assert_eq!(json["code"], "INTERNAL_ERROR");
        assert_eq!(json["message"], REDACTED_MESSAGE);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn operational_error_keeps_message() {
        let json = body_json(AppError::bad_request("INVALID_HINT", "hint must be A1..C2")).await;
        assert_eq!(json["code"], "INVALID_HINT");
        assert_eq!(json["message"], "hint must be A1..C2");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn store_validation_is_bad_request() {
        let err: AppError = StoreError::Validation("empty id".to_string()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.is_operational);
    }

    #[tokio::test]
    async fn survey_errors_map_to_codes() {
        let invalid: AppError = SurveyError::InvalidAnswer {
            reason: "no option selected".to_string(),
            phase: Phase::Coarse,
            question_count: 0,
        }
        .into();
        assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
        assert_eq!(invalid.code, "INVALID_ANSWER");

        let missing: AppError = SurveyError::SessionNotFound("x".to_string()).into();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
        assert_eq!(missing.code, "SESSION_NOT_FOUND");

        let done: AppError = SurveyError::SessionAlreadyComplete { id: "x".to_string() }.into();
        assert_eq!(done.status, StatusCode::CONFLICT);

        let defect: AppError = SurveyError::NoWordAtRank { rank: 5 }.into();
        assert!(!defect.is_operational);
        let json = body_json(defect).await;
        assert!(!json["message"].as_str().unwrap().contains("rank 5"));
    }
}
