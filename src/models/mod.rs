pub mod contact;
pub mod envelope;
pub mod health;
pub mod pagination;
pub mod session;
pub mod user;
