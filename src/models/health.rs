use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Backend reachability as reported by `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub healthy: bool,
    pub message: String,
}

pub const UNREACHABLE_MESSAGE: &str = "Backend API is not accessible. Make sure the API server is running.";
