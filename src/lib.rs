//! tokengate: JWT issuance/verification with scopes, CSRF double-submit,
//! revocation and signed cookie sessions, served over axum.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;
