/*
 * Responsibility
 * - v1 surface: routes() plus the dto / extractor / handler modules behind it
 */
pub mod dto;
pub mod extractors;
pub mod handlers;
mod routes;

pub use routes::routes;
