use crate::error::app_error::AppError;
use crate::error::json::{decode_json, extract_message};
use crate::gateway::RequestGateway;
use crate::gateway::transport::ApiRequest;
use crate::models::session::{Session, SessionEvent};
use crate::models::user::{LoginRequest, LoginResponse, UserIdentity};
use crate::service::service_util::{parse_envelope, require_data};
use crate::storage::session_store::SessionStore;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::{info, warn};

pub const LOGIN_PATH: &str = "/auth/login";
pub const ME_PATH: &str = "/auth/me";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Uninitialized,
    Initializing,
    Authenticated,
    Anonymous,
}

#[derive(Debug, Clone)]
enum AuthState {
    Uninitialized,
    Initializing,
    Authenticated(UserIdentity),
    Anonymous,
}

impl AuthState {
    fn status(&self) -> AuthStatus {
        match self {
            AuthState::Uninitialized => AuthStatus::Uninitialized,
            AuthState::Initializing => AuthStatus::Initializing,
            AuthState::Authenticated(_) => AuthStatus::Authenticated,
            AuthState::Anonymous => AuthStatus::Anonymous,
        }
    }
}

/// Owns the sign-in state machine and the current user's identity.
///
/// A session the gateway had to drop (refresh failed) is noticed on the next
/// read, which moves the manager to [`AuthStatus::Anonymous`].
pub struct AuthSessionManager {
    gateway: Arc<RequestGateway>,
    session: Arc<SessionStore>,
    state: RwLock<AuthState>,
}

impl AuthSessionManager {
    pub fn new(gateway: Arc<RequestGateway>, session: Arc<SessionStore>) -> Self {
        Self {
            gateway,
            session,
            state: RwLock::new(AuthState::Uninitialized),
        }
    }

    /// Validates any stored session against the backend. Runs once; later
    /// calls return the current status.
    pub async fn bootstrap(&self) -> AuthStatus {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if !matches!(*state, AuthState::Uninitialized) {
                return state.status();
            }
            *state = AuthState::Initializing;
        }

        if !self.session.is_authenticated() {
            self.set_state(AuthState::Anonymous);
            return AuthStatus::Anonymous;
        }

        match self.fetch_identity().await {
            Ok(user) => {
                info!(user_id = user.id, username = %user.username, "stored session restored");
                self.set_state(AuthState::Authenticated(user));
                AuthStatus::Authenticated
            }
            Err(err) => {
                warn!(error = %err, "stored session is no longer valid");
                if let Err(err) = self.session.clear() {
                    warn!(error = %err, "failed to clear stored session");
                }
                self.set_state(AuthState::Anonymous);
                AuthStatus::Anonymous
            }
        }
    }

    /// Signs in and loads the user's identity. On failure the previously
    /// stored session (if any) is put back, unless the gateway already
    /// terminated the session; subscribers have then been told to sign in
    /// again and the store stays empty to match.
    pub async fn login(&self, username: &str, password: &str) -> Result<UserIdentity, AppError> {
        let request = ApiRequest::post(LOGIN_PATH).with_json(&LoginRequest { username, password })?;
        let response = self.gateway.send_anonymous(&request).await?;

        if matches!(response.status, 400 | 401 | 403) {
            let message = extract_message(&response.body).unwrap_or_else(|| "Login failed".to_string());
            warn!(username = %username, status = response.status, "login rejected");
            return Err(AppError::InvalidCredentials(message));
        }
        if !response.is_success() {
            return Err(AppError::from_status(response.status, extract_message(&response.body)));
        }

        let login: LoginResponse = decode_json(&request, &response.body)?;
        let message = login.message.clone().unwrap_or_else(|| "Login failed".to_string());
        let (access_token, refresh_token) = match (login.success, login.access_token, login.refresh_token) {
            (true, Some(access_token), Some(refresh_token)) if !access_token.is_empty() && !refresh_token.is_empty() => {
                (access_token, refresh_token)
            }
            _ => return Err(AppError::InvalidCredentials(message)),
        };

        let previous = self.session.get()?;
        self.session.set(&Session::new(access_token, refresh_token))?;

        match self.fetch_identity().await {
            Ok(user) => {
                info!(user_id = user.id, username = %user.username, "signed in");
                self.set_state(AuthState::Authenticated(user.clone()));
                self.gateway.notify(SessionEvent::SignedIn);
                Ok(user)
            }
            Err(AppError::SessionTerminated) => {
                warn!("session terminated during identity lookup after login");
                Err(AppError::SessionTerminated)
            }
            Err(err) => {
                warn!(error = %err, "identity lookup failed after login");
                let restored = match &previous {
                    Some(previous) => self.session.set(previous),
                    None => self.session.clear(),
                };
                if let Err(restore_err) = restored {
                    warn!(error = %restore_err, "failed to restore previous session");
                }
                Err(err)
            }
        }
    }

    /// Forgets the session locally. Never fails and never calls the backend.
    pub fn logout(&self) {
        if let Err(err) = self.session.clear() {
            warn!(error = %err, "failed to clear stored session");
        }
        self.set_state(AuthState::Anonymous);
        self.gateway.notify(SessionEvent::SignedOut);
        info!("signed out");
    }

    pub fn status(&self) -> AuthStatus {
        self.reconcile().status()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == AuthStatus::Authenticated
    }

    pub fn current_user(&self) -> Option<UserIdentity> {
        match self.reconcile() {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.gateway.subscribe()
    }

    async fn fetch_identity(&self) -> Result<UserIdentity, AppError> {
        let request = ApiRequest::get(ME_PATH);
        let response = self.gateway.send(&request).await?;
        let envelope = parse_envelope::<UserIdentity>(&request, &response)?;
        require_data(envelope, &request)
    }

    /// Current state, downgraded to anonymous if the stored session vanished
    /// underneath an authenticated state.
    fn reconcile(&self) -> AuthState {
        let current = self.state.read().unwrap_or_else(PoisonError::into_inner).clone();
        if matches!(current, AuthState::Authenticated(_)) && !self.session.is_authenticated() {
            info!("stored session was terminated, switching to anonymous");
            self.set_state(AuthState::Anonymous);
            return AuthState::Anonymous;
        }
        current
    }

    fn set_state(&self, next: AuthState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
    }
}
