use crate::models::pagination::RawPagination;
use serde::de::{self, Deserializer};
use serde::Deserialize;

fn default_success() -> bool {
    true
}

/// `{success, message, data, pagination}` wrapper used by every backend endpoint.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default = "default_success")]
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
    pub pagination: Option<RawPagination>,
}

/// Accepts numeric ids sent either as JSON numbers or as numeric strings.
pub(crate) fn flexible_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => text.trim().parse().map_err(|_| de::Error::custom(format!("invalid id '{}'", text))),
    }
}
