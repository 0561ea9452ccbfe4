pub mod transport;

use crate::error::app_error::AppError;
use crate::error::json::{decode_json, extract_message};
use crate::models::session::SessionEvent;
use crate::models::user::{RefreshRequest, RefreshResponse};
use crate::storage::session_store::SessionStore;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};
use transport::{ApiRequest, ApiResponse, HttpTransport};
use uuid::Uuid;

pub const REFRESH_PATH: &str = "/auth/refresh";
const AUTHORIZATION_HEADER: &str = "Authorization";
const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Request ID attached to every outbound call so client and backend logs line up.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new() -> Self {
        RequestId(Uuid::new_v4().to_string())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

/// Position of a call in the refresh-and-retry protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt(u8);

impl Attempt {
    pub const FIRST: Attempt = Attempt(0);

    fn is_retry(self) -> bool {
        self.0 > 0
    }

    fn next(self) -> Self {
        Attempt(self.0 + 1)
    }
}

/// Sends backend calls with the stored bearer token and recovers from an
/// expired access token by refreshing it once.
///
/// Concurrent refreshes are coalesced: callers that were rejected with a token
/// that has since been replaced retry with the replacement instead of
/// refreshing again.
pub struct RequestGateway {
    transport: Arc<dyn HttpTransport>,
    session: Arc<SessionStore>,
    events: broadcast::Sender<SessionEvent>,
    refresh_lock: Mutex<()>,
}

impl RequestGateway {
    pub fn new(transport: Arc<dyn HttpTransport>, session: Arc<SessionStore>, events: broadcast::Sender<SessionEvent>) -> Self {
        Self {
            transport,
            session,
            events,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn notify(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Sends a call that must not carry credentials or trigger a refresh
    /// (sign-in, health probes).
    pub async fn send_anonymous(&self, request: &ApiRequest) -> Result<ApiResponse, AppError> {
        self.dispatch(request, None, Attempt::FIRST).await
    }

    /// Sends an authenticated call. A 401 triggers at most one refresh and
    /// one retry; a second 401 is returned as [`AppError::Authentication`].
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, AppError> {
        let mut attempt = Attempt::FIRST;

        loop {
            let token = self.session.access_token()?;
            let response = self.dispatch(request, token.as_deref(), attempt).await?;

            if !response.is_unauthorized() {
                return Ok(response);
            }

            if attempt.is_retry() {
                warn!(method = %request.method, path = %request.path, "request still unauthorized after refreshing the session");
                return Err(unauthorized(&response));
            }

            self.refresh_access_token(token.as_deref(), &response).await?;
            attempt = attempt.next();
        }
    }

    async fn refresh_access_token(&self, rejected_token: Option<&str>, denied: &ApiResponse) -> Result<(), AppError> {
        let _guard = self.refresh_lock.lock().await;

        let Some(session) = self.session.get()? else {
            return Err(match rejected_token {
                // Another request already gave up on this session.
                Some(_) => AppError::SessionTerminated,
                None => unauthorized(denied),
            });
        };

        if rejected_token != Some(session.access_token.as_str()) {
            debug!("access token was replaced while this request was in flight");
            return Ok(());
        }

        info!("access token rejected, refreshing session");
        let request = ApiRequest::post(REFRESH_PATH).with_json(&RefreshRequest {
            refresh_token: &session.refresh_token,
        })?;

        let access_token = match self.dispatch(&request, None, Attempt::FIRST).await {
            Ok(response) if response.is_success() => match decode_json::<RefreshResponse>(&request, &response.body) {
                Ok(RefreshResponse {
                    access_token: Some(token),
                }) if !token.trim().is_empty() => token,
                Ok(_) => return Err(self.terminate("refresh response did not include an access token")),
                Err(err) => return Err(self.terminate(&err.to_string())),
            },
            Ok(response) => {
                let reason = format!("refresh rejected with status {}", response.status);
                return Err(self.terminate(&reason));
            }
            Err(err) => return Err(self.terminate(&err.to_string())),
        };

        self.session.set_access_token(&access_token)?;
        info!("session refreshed");
        Ok(())
    }

    /// Drops the stored session and tells subscribers the user must sign in again.
    fn terminate(&self, reason: &str) -> AppError {
        warn!(reason = %reason, "session terminated");
        if let Err(err) = self.session.clear() {
            warn!(error = %err, "failed to clear stored session");
        }
        self.notify(SessionEvent::Terminated);
        AppError::SessionTerminated
    }

    async fn dispatch(&self, request: &ApiRequest, token: Option<&str>, attempt: Attempt) -> Result<ApiResponse, AppError> {
        let request_id = RequestId::new();
        let mut outbound = request.clone().with_header(REQUEST_ID_HEADER, request_id.0.clone());
        if let Some(token) = token {
            outbound = outbound.with_header(AUTHORIZATION_HEADER, format!("Bearer {}", token));
        }

        debug!(
            request_id = %request_id.0,
            method = %request.method,
            path = %request.path,
            attempt = attempt.0,
            authenticated = token.is_some(),
            "dispatching request"
        );

        let start = Instant::now();
        match self.transport.execute(&outbound).await {
            Ok(response) => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                if response.is_success() {
                    info!(
                        request_id = %request_id.0,
                        method = %request.method,
                        path = %request.path,
                        status = response.status,
                        elapsed_ms,
                        "request completed"
                    );
                } else {
                    warn!(
                        request_id = %request_id.0,
                        method = %request.method,
                        path = %request.path,
                        status = response.status,
                        elapsed_ms,
                        "request completed with error"
                    );
                }
                Ok(response)
            }
            Err(err) => {
                warn!(
                    request_id = %request_id.0,
                    method = %request.method,
                    path = %request.path,
                    error = %err,
                    "request failed"
                );
                Err(err)
            }
        }
    }
}

fn unauthorized(response: &ApiResponse) -> AppError {
    AppError::Authentication(extract_message(&response.body).unwrap_or_else(|| "Unauthorized".to_string()))
}
