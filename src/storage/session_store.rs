use crate::error::app_error::AppError;
use crate::models::session::Session;
use crate::storage::token_storage::TokenStorage;
use tracing::{debug, warn};

pub const ACCESS_TOKEN_KEY: &str = "crm_access_token";
pub const REFRESH_TOKEN_KEY: &str = "crm_refresh_token";

/// Owns the persisted credentials. Token contents are never inspected here;
/// only the backend decides whether a token is still valid.
pub struct SessionStore {
    storage: Box<dyn TokenStorage>,
}

impl SessionStore {
    pub fn new(storage: Box<dyn TokenStorage>) -> Self {
        Self { storage }
    }

    /// Returns the stored session. A half-written session (one token without
    /// the other) is discarded and reported as absent.
    pub fn get(&self) -> Result<Option<Session>, AppError> {
        let mut tokens = self.storage.load_many(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY])?.into_iter();
        let access_token = tokens.next().flatten();
        let refresh_token = tokens.next().flatten();

        match (access_token, refresh_token) {
            (Some(access_token), Some(refresh_token)) => Ok(Some(Session {
                access_token,
                refresh_token,
            })),
            (None, None) => Ok(None),
            _ => {
                warn!("discarding incomplete stored session");
                self.clear()?;
                Ok(None)
            }
        }
    }

    pub fn set(&self, session: &Session) -> Result<(), AppError> {
        self.storage
            .store(&[(ACCESS_TOKEN_KEY, &session.access_token), (REFRESH_TOKEN_KEY, &session.refresh_token)])?;
        debug!("session stored");
        Ok(())
    }

    /// Replaces the access token after a refresh; the refresh token is kept.
    pub fn set_access_token(&self, access_token: &str) -> Result<(), AppError> {
        if self.get()?.is_none() {
            return Err(AppError::SessionTerminated);
        }

        self.storage.store(&[(ACCESS_TOKEN_KEY, access_token)])
    }

    pub fn clear(&self) -> Result<(), AppError> {
        self.storage.remove(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY])?;
        debug!("session cleared");
        Ok(())
    }

    pub fn access_token(&self) -> Result<Option<String>, AppError> {
        Ok(self.get()?.map(|session| session.access_token))
    }

    /// True iff an access token is stored. Storage failures read as signed out.
    pub fn is_authenticated(&self) -> bool {
        match self.get() {
            Ok(session) => session.is_some(),
            Err(err) => {
                warn!(error = %err, "could not read stored session");
                false
            }
        }
    }
}
