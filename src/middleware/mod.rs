/*
 * Responsibility
 * - Public interface of the middleware layer (re-exports)
 * - http: transport concerns, session: signed sessions, auth: route guards + implicit refresh
 */
pub mod auth;
pub mod http;
pub mod session;
