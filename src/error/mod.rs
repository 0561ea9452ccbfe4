pub mod app_error;
pub(crate) mod json;
