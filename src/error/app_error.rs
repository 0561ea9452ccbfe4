use thiserror::Error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Session expired, please sign in again")]
    SessionTerminated,
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Request failed: {0}")]
    LogicalFailure(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },
    #[error("Malformed response: {message}")]
    Decode {
        message: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Session storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Session storage error: {0}")]
    StorageFormat(String),
    #[error("Configuration error: {message}")]
    ConfigurationError {
        message: String,
        #[source]
        source: figment::Error,
    },
}

impl AppError {
    pub fn network(message: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    pub fn decode(message: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            message: message.into(),
            source,
        }
    }

    pub fn storage(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Storage {
            message: message.into(),
            source,
        }
    }

    /// Maps a non-2xx backend status onto the error taxonomy, keeping the
    /// backend's own message when it sent one.
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        match status {
            400 | 409 | 422 => AppError::Validation(message.unwrap_or_else(|| "The request was rejected".to_string())),
            401 | 403 => AppError::Authentication(message.unwrap_or_else(|| "Unauthorized".to_string())),
            404 => AppError::NotFound(message.unwrap_or_else(|| "Resource not found".to_string())),
            _ => AppError::Backend {
                status,
                message: message.unwrap_or_else(|| "Unexpected backend response".to_string()),
            },
        }
    }

    /// True when the host should send the user back to the sign-in screen.
    pub fn requires_sign_in(&self) -> bool {
        matches!(self, AppError::SessionTerminated | AppError::Authentication(_))
    }
}

impl From<ValidationErrors> for AppError {
    fn from(e: ValidationErrors) -> Self {
        let mut messages: Vec<String> = e
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| match &error.message {
                    Some(message) => message.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .collect();
        messages.sort();
        AppError::Validation(messages.join(", "))
    }
}

impl From<figment::Error> for AppError {
    fn from(e: figment::Error) -> Self {
        AppError::ConfigurationError {
            message: "Failed to read configuration".to_string(),
            source: e,
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        let message = if e.is_timeout() {
            "The backend did not respond in time"
        } else if e.is_connect() {
            "Could not connect to the backend"
        } else {
            "Network request failed"
        };
        AppError::network(message, e)
    }
}
