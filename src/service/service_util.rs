use crate::error::app_error::AppError;
use crate::error::json::{decode_json, extract_message};
use crate::gateway::transport::{ApiRequest, ApiResponse};
use crate::models::envelope::ApiEnvelope;
use serde::de::DeserializeOwned;

/// Turns a backend response into its envelope. Transport-level failures map
/// through [`AppError::from_status`]; a 2xx with `success: false` is a
/// [`AppError::LogicalFailure`].
pub(crate) fn parse_envelope<T: DeserializeOwned>(request: &ApiRequest, response: &ApiResponse) -> Result<ApiEnvelope<T>, AppError> {
    if !response.is_success() {
        return Err(AppError::from_status(response.status, extract_message(&response.body)));
    }

    let envelope: ApiEnvelope<T> = decode_json(request, &response.body)?;
    if !envelope.success {
        return Err(AppError::LogicalFailure(
            envelope.message.unwrap_or_else(|| format!("{} {} failed", request.method, request.path)),
        ));
    }

    Ok(envelope)
}

pub(crate) fn require_data<T>(envelope: ApiEnvelope<T>, request: &ApiRequest) -> Result<T, AppError> {
    envelope
        .data
        .ok_or_else(|| AppError::LogicalFailure(format!("{} {} returned no data", request.method, request.path)))
}

/// Message for a mutation, falling back to a generic confirmation.
pub(crate) fn message_or<T>(envelope: &ApiEnvelope<T>, fallback: &str) -> String {
    envelope
        .message
        .clone()
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}
