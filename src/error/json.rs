use crate::error::app_error::AppError;
use crate::gateway::transport::ApiRequest;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::warn;

const BODY_PREVIEW_LIMIT: usize = 500;

/// Decodes a backend response body, logging structured information about
/// the failure (position, category and a truncated body preview) when the
/// payload does not match the expected shape.
///
/// Bodies of authentication endpoints are never previewed since they carry
/// credentials.
pub(crate) fn decode_json<T: DeserializeOwned>(request: &ApiRequest, body: &[u8]) -> Result<T, AppError> {
    match serde_json::from_slice::<T>(body) {
        Ok(value) => Ok(value),
        Err(e) => {
            let body_preview = if request.is_sensitive() {
                "<redacted>".to_string()
            } else {
                preview(body)
            };

            warn!(
                method = %request.method,
                path = %request.path,
                error_message = %e,
                error_line = e.line(),
                error_column = e.column(),
                error_category = ?e.classify(),
                response_body = %body_preview,
                "Failed to parse JSON response body"
            );

            Err(AppError::decode(format!("unexpected payload from {} {}", request.method, request.path), e))
        }
    }
}

/// Pulls the human-readable `message` field out of an error payload.
pub(crate) fn extract_message(body: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct MessageOnly {
        message: Option<String>,
    }

    serde_json::from_slice::<MessageOnly>(body)
        .ok()
        .and_then(|payload| payload.message)
        .filter(|message| !message.trim().is_empty())
}

fn preview(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.chars().count() > BODY_PREVIEW_LIMIT {
        format!("{}...", text.chars().take(BODY_PREVIEW_LIMIT).collect::<String>())
    } else {
        text.to_string()
    }
}
