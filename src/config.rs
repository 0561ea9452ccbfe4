use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:9001";
pub const DEFAULT_API_BASE_PATH: &str = "/api";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub list: ListConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub base_path: String,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// File holding the persisted access and refresh tokens.
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ListConfig {
    pub default_page_size: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            base_path: DEFAULT_API_BASE_PATH.to_string(),
            timeout_seconds: 30,
            user_agent: format!("crm-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".crm/session.toml"),
        }
    }
}

impl Default for ListConfig {
    fn default() -> Self {
        Self { default_page_size: 25 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources in priority order:
    /// 1. Built-in defaults
    /// 2. Crm.toml (optional)
    /// 3. Environment variables prefixed with CRM_, nested with `__`
    ///    (e.g. CRM_API__BASE_URL, CRM_LOGGING__LEVEL)
    /// 4. API_BASE_URL, the variable older deployments used for the backend host
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("Crm.toml").nested())
            .merge(Env::prefixed("CRM_").split("__"))
            .merge(Env::raw().only(&["API_BASE_URL"]).map(|_| "api.base_url".into()))
    }
}
