// Input validation helpers.
//
// - `ValidatedJson<T>` extractor: content-type check + serde + size enforcement.
// - Non-negative integer parsing for query parameters.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::{ErrorCode, RelayError};

/// Maximum REST request body in bytes (1 MiB).
pub const MAX_REST_BODY_BYTES: usize = 1024 * 1024;

// ── ValidatedJson extractor ────────────────────────────────────────

/// A JSON body extractor that returns structured `RelayError` on failure.
///
/// Use this instead of `axum::Json<T>` in handlers to get consistent
/// VALIDATION_FAILED error responses instead of plain-text Axum rejections.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ValidatedJson(value)),
            Err(rejection) => Err(json_rejection_error(&rejection).into_response()),
        }
    }
}

fn json_rejection_error(rejection: &JsonRejection) -> RelayError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return RelayError::new(
            ErrorCode::PayloadTooLarge,
            format!("request body exceeds limit of {MAX_REST_BODY_BYTES} bytes"),
        );
    }
    let (message, details) = classify_json_rejection(rejection);
    RelayError::new(ErrorCode::ValidationFailed, message).with_details(details)
}

/// Classify a JSON rejection into a human-readable message and details object.
fn classify_json_rejection(rejection: &JsonRejection) -> (String, serde_json::Value) {
    match rejection {
        JsonRejection::JsonDataError(e) => {
            (format!("invalid JSON payload: {e}"), json!({ "kind": "data_error" }))
        }
        JsonRejection::JsonSyntaxError(e) => {
            (format!("malformed JSON: {e}"), json!({ "kind": "syntax_error" }))
        }
        JsonRejection::MissingJsonContentType(_) => (
            "expected Content-Type: application/json".to_string(),
            json!({ "kind": "missing_content_type" }),
        ),
        JsonRejection::BytesRejection(e) => {
            (format!("request body error: {e}"), json!({ "kind": "body_error" }))
        }
        other => (format!("request body error: {other}"), json!({ "kind": "unknown" })),
    }
}

// ── Query parameters ───────────────────────────────────────────────

/// Parse a required query value as a non-negative integer.
pub fn non_negative_integer(name: &str, raw: Option<&str>) -> Result<u64, RelayError> {
    let Some(raw) = raw else {
        return Err(RelayError::new(
            ErrorCode::ValidationFailed,
            format!("missing query parameter `{name}`"),
        )
        .with_details(json!({ "parameter": name })));
    };
    raw.trim().parse::<u64>().map_err(|_| {
        RelayError::new(ErrorCode::ValidationFailed, format!("not a non-negative integer: {raw}"))
            .with_details(json!({ "parameter": name }))
    })
}
