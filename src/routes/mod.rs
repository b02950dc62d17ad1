pub mod auth;
pub mod billing;
pub mod extract;
