pub mod auth;
pub mod contacts;
pub mod list_query;
pub(crate) mod service_util;
