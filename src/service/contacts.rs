use crate::error::app_error::AppError;
use crate::error::json::decode_json;
use crate::gateway::RequestGateway;
use crate::gateway::transport::ApiRequest;
use crate::models::contact::{Contact, ContactId, ContactPage, ContactRequest};
use crate::models::health::{HealthResponse, HealthStatus, UNREACHABLE_MESSAGE};
use crate::models::pagination::{ListQuery, PaginationDescriptor};
use crate::service::service_util::{message_or, parse_envelope, require_data};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use validator::Validate;

pub const CONTACTS_PATH: &str = "/contacts";
pub const HEALTH_PATH: &str = "/health";

/// Contact endpoints. Every call goes through the gateway, so an expired
/// access token is refreshed transparently here as well.
#[derive(Clone)]
pub struct ContactService {
    gateway: Arc<RequestGateway>,
}

impl ContactService {
    pub fn new(gateway: Arc<RequestGateway>) -> Self {
        Self { gateway }
    }

    /// Fetches one page. Backends that ignore pagination get a synthesized
    /// single-page descriptor.
    pub async fn list(&self, query: &ListQuery) -> Result<ContactPage, AppError> {
        let request = ApiRequest::get(CONTACTS_PATH).with_query(query.to_params());
        let response = self.gateway.send(&request).await?;
        let envelope = parse_envelope::<Vec<Contact>>(&request, &response)?;

        let raw_pagination = envelope.pagination;
        let contacts = envelope.data.unwrap_or_default();
        if raw_pagination.is_none() {
            debug!(count = contacts.len(), "contact list returned without pagination metadata");
        }
        let pagination = PaginationDescriptor::normalize(raw_pagination, contacts.len());

        Ok(ContactPage {
            contacts,
            pagination,
            query: query.clone(),
        })
    }

    pub async fn get(&self, id: impl Into<ContactId>) -> Result<Contact, AppError> {
        let request = ApiRequest::get(contact_path(&id.into()));
        let response = self.gateway.send(&request).await?;
        let envelope = parse_envelope::<Contact>(&request, &response)?;
        require_data(envelope, &request)
    }

    /// Creates a contact and returns the backend's confirmation message.
    pub async fn create(&self, payload: &ContactRequest) -> Result<String, AppError> {
        payload.validate()?;

        let request = ApiRequest::post(CONTACTS_PATH).with_json(payload)?;
        let response = self.gateway.send(&request).await?;
        let envelope = parse_envelope::<Value>(&request, &response)?;
        Ok(message_or(&envelope, "Contact created successfully"))
    }

    pub async fn update(&self, id: impl Into<ContactId>, payload: &ContactRequest) -> Result<String, AppError> {
        payload.validate()?;

        let request = ApiRequest::put(contact_path(&id.into())).with_json(payload)?;
        let response = self.gateway.send(&request).await?;
        let envelope = parse_envelope::<Value>(&request, &response)?;
        Ok(message_or(&envelope, "Contact updated successfully"))
    }

    pub async fn delete(&self, id: impl Into<ContactId>) -> Result<String, AppError> {
        let request = ApiRequest::delete(contact_path(&id.into()));
        let response = self.gateway.send(&request).await?;
        let envelope = parse_envelope::<Value>(&request, &response)?;
        Ok(message_or(&envelope, "Contact deleted successfully"))
    }

    /// Unauthenticated reachability probe. Never fails; an unreachable or
    /// unhealthy backend is reported in the returned status.
    pub async fn health(&self) -> HealthStatus {
        let request = ApiRequest::get(HEALTH_PATH);
        let unhealthy = HealthStatus {
            healthy: false,
            message: UNREACHABLE_MESSAGE.to_string(),
        };

        let response = match self.gateway.send_anonymous(&request).await {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                warn!(status = response.status, "health check returned an error status");
                return unhealthy;
            }
            Err(err) => {
                warn!(error = %err, "health check failed");
                return unhealthy;
            }
        };

        match decode_json::<HealthResponse>(&request, &response.body) {
            Ok(HealthResponse { success: true, message }) => HealthStatus {
                healthy: true,
                message: message.unwrap_or_else(|| "Backend API is healthy".to_string()),
            },
            Ok(HealthResponse { message, .. }) => HealthStatus {
                healthy: false,
                message: message.unwrap_or_else(|| UNREACHABLE_MESSAGE.to_string()),
            },
            Err(_) => unhealthy,
        }
    }
}

fn contact_path(id: &ContactId) -> String {
    format!("{}/{}", CONTACTS_PATH, urlencoding::encode(&id.to_string()))
}
