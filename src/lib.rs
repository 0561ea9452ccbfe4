mod config;
mod error;
mod gateway;
mod models;
mod service;
mod storage;

#[cfg(test)]
pub mod test_utils;

pub use config::{ApiConfig, Config, ListConfig, LoggingConfig, StorageConfig};
pub use error::app_error::AppError;
pub use gateway::transport::{ApiRequest, ApiResponse, HttpTransport, Method, ReqwestTransport};
pub use gateway::{Attempt, RequestGateway, RequestId};
pub use models::contact::{Contact, ContactId, ContactPage, ContactRequest};
pub use models::health::HealthStatus;
pub use models::pagination::{DEFAULT_SORT_FIELD, ListQuery, PageSize, PaginationDescriptor, SortOrder};
pub use models::session::{Session, SessionEvent};
pub use models::user::UserIdentity;
pub use service::auth::{AuthSessionManager, AuthStatus};
pub use service::contacts::ContactService;
pub use service::list_query::ListQueryController;
pub use storage::session_store::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, SessionStore};
pub use storage::token_storage::{FileTokenStorage, MemoryTokenStorage, TokenStorage};

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

const SESSION_EVENT_CAPACITY: usize = 16;

pub fn init_tracing(logging: &LoggingConfig) {
    // RUST_LOG overrides the configured level, e.g.
    //   RUST_LOG=debug                          - everything at debug
    //   RUST_LOG=info,crm_client::gateway=debug - request dispatch details only
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_line_number(true);

    if logging.json_format {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

pub(crate) fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return config::DEFAULT_API_BASE_PATH.to_string();
    }

    let mut normalized = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    };

    while normalized.ends_with('/') && normalized.len() > 1 {
        normalized.pop();
    }

    if normalized == "/" { String::new() } else { normalized }
}

/// The wired-up client: one session store shared by the gateway, the session
/// manager and the contact endpoints.
pub struct CrmClient {
    session: Arc<SessionStore>,
    gateway: Arc<RequestGateway>,
    auth: AuthSessionManager,
    contacts: ContactService,
    default_query: ListQuery,
}

impl CrmClient {
    /// Builds a client talking to the configured backend over HTTP, with
    /// tokens persisted to the configured session file.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let transport = ReqwestTransport::new(&config.api)?;
        let storage = FileTokenStorage::new(&config.storage.path);
        Self::from_parts(Arc::new(transport), Box::new(storage), &config.list)
    }

    pub fn from_parts(transport: Arc<dyn HttpTransport>, storage: Box<dyn TokenStorage>, list_config: &ListConfig) -> Result<Self, AppError> {
        let page_size = PageSize::try_from(list_config.default_page_size)?;
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);

        let session = Arc::new(SessionStore::new(storage));
        let gateway = Arc::new(RequestGateway::new(transport, session.clone(), events));
        let auth = AuthSessionManager::new(gateway.clone(), session.clone());
        let contacts = ContactService::new(gateway.clone());

        Ok(Self {
            session,
            gateway,
            auth,
            contacts,
            default_query: ListQuery::new(page_size),
        })
    }

    pub fn auth(&self) -> &AuthSessionManager {
        &self.auth
    }

    pub fn contacts(&self) -> &ContactService {
        &self.contacts
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn gateway(&self) -> &RequestGateway {
        &self.gateway
    }

    /// A fresh list controller starting from the configured defaults.
    pub fn list_controller(&self) -> ListQueryController {
        ListQueryController::with_query(self.contacts.clone(), self.default_query.clone())
    }

    pub fn default_query(&self) -> &ListQuery {
        &self.default_query
    }
}
