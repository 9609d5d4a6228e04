use std::future::Future;

use axum::{
    http::{header::HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::collab::SessionError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

tokio::task_local! {
    static REQUEST_ID: String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ValidationFailed,
    NotFound,
    VersionConflict,
    HistoryGone,
    PayloadTooLarge,
    InternalError,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::NotFound => "NOT_FOUND",
            Self::VersionConflict => "VERSION_CONFLICT",
            Self::HistoryGone => "HISTORY_GONE",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    pub const fn status(self) -> StatusCode {
        match self {
            Self::ValidationFailed => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::VersionConflict => StatusCode::CONFLICT,
            Self::HistoryGone => StatusCode::GONE,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether resubmitting (after a refetch, for conflicts) can succeed.
    pub const fn retryable(self) -> bool {
        matches!(self, Self::VersionConflict | Self::InternalError)
    }

    pub const fn default_message(self) -> &'static str {
        match self {
            Self::ValidationFailed => "request validation failed",
            Self::NotFound => "requested resource not found",
            Self::VersionConflict => "version not current",
            Self::HistoryGone => "history no longer available",
            Self::PayloadTooLarge => "payload exceeds maximum allowed size",
            Self::InternalError => "internal server error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelayError {
    code: ErrorCode,
    message: String,
    details: Value,
    request_id: Option<String>,
}

impl RelayError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), details: json!({}), request_id: None }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

impl From<SessionError> for RelayError {
    fn from(error: SessionError) -> Self {
        let message = error.to_string();
        match error {
            SessionError::InvalidVersion { requested, current }
            | SessionError::InvalidCommentVersion { requested, current } => {
                Self::new(ErrorCode::ValidationFailed, message)
                    .with_details(json!({ "requested": requested, "current": current }))
            }
            SessionError::InvalidComment { id, .. } => {
                Self::new(ErrorCode::ValidationFailed, message)
                    .with_details(json!({ "comment_id": id }))
            }
            SessionError::VersionConflict { current, .. } => {
                Self::from_code(ErrorCode::VersionConflict)
                    .with_details(json!({ "current": current }))
            }
            SessionError::HistoryGone => Self::from_code(ErrorCode::HistoryGone),
            SessionError::StepFailed { index, .. } => Self::new(ErrorCode::InternalError, message)
                .with_details(json!({ "step_index": index })),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let request_id = self.request_id.or_else(current_request_id);

        let mut response = (
            self.code.status(),
            Json(json!({
                "error": {
                    "code": self.code.as_str(),
                    "message": self.message,
                    "retryable": self.code.retryable(),
                    "request_id": request_id.clone(),
                    "details": self.details,
                }
            })),
        )
            .into_response();

        if let Some(request_id) = request_id {
            attach_request_id_header(&mut response, &request_id);
        }

        response
    }
}

pub async fn with_request_id_scope<F>(request_id: String, future: F) -> F::Output
where
    F: Future,
{
    REQUEST_ID.scope(request_id, future).await
}

pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(Clone::clone).ok()
}

pub fn request_id_from_headers_or_generate(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

pub fn attach_request_id_header(response: &mut Response, request_id: &str) {
    if let Ok(header) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, header);
    }
}

#[cfg(test)]
mod tests {
    use axum::{body::to_bytes, http::StatusCode, response::IntoResponse};
    use quire_common::step::StepError;
    use serde_json::Value;

    use super::{with_request_id_scope, ErrorCode, RelayError};
    use crate::collab::SessionError;

    async fn body_json(error: RelayError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("error response body should be readable");
        let parsed = serde_json::from_slice(&body).expect("error response body should be valid json");
        (status, parsed)
    }

    #[tokio::test]
    async fn relay_error_uses_scoped_request_id() {
        let (status, parsed) = with_request_id_scope("req-scoped-123".to_owned(), async {
            body_json(RelayError::from_code(ErrorCode::InternalError)).await
        })
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(parsed["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(parsed["error"]["retryable"], true);
        assert_eq!(parsed["error"]["request_id"], "req-scoped-123");
        assert_eq!(parsed["error"]["details"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn session_errors_follow_the_http_taxonomy() {
        let cases = [
            (SessionError::InvalidVersion { requested: 9, current: 2 }, StatusCode::BAD_REQUEST),
            (SessionError::InvalidComment { id: 1, from: 3, to: 3 }, StatusCode::BAD_REQUEST),
            (SessionError::VersionConflict { base: 1, current: 2 }, StatusCode::CONFLICT),
            (SessionError::HistoryGone, StatusCode::GONE),
            (
                SessionError::StepFailed {
                    index: 0,
                    source: StepError::OutOfRange { from: 5, to: 5, len: 0 },
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            let (status, _) = body_json(error.into()).await;
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn conflict_reports_current_version() {
        let (_, parsed) =
            body_json(SessionError::VersionConflict { base: 0, current: 4 }.into()).await;
        assert_eq!(parsed["error"]["code"], "VERSION_CONFLICT");
        assert_eq!(parsed["error"]["message"], "version not current");
        assert_eq!(parsed["error"]["details"]["current"], 4);
    }

    #[tokio::test]
    async fn explicit_request_id_overrides_scope() {
        let (_, parsed) = with_request_id_scope("req-scoped-123".to_owned(), async {
            body_json(RelayError::from_code(ErrorCode::NotFound).with_request_id("req-explicit-456"))
                .await
        })
        .await;

        assert_eq!(parsed["error"]["request_id"], "req-explicit-456");
    }
}
