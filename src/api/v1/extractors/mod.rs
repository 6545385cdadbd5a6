pub mod auth_ctx;
pub mod session;

pub use auth_ctx::{AuthCtx, AuthCtxExtractor, OptionalAuthCtx};
pub use session::SessionExtractor;
