pub mod account;
pub mod auth;
pub mod me;
pub mod session;
pub mod users;
