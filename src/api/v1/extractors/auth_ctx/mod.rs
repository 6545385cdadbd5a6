/*!
 * Authentication context extractor
 *
 * Responsibility:
 * - Hand the verified token (AuthCtx) to handlers
 * - axum-specific code lives in core, the type itself in types
 *
 * Public API:
 * - AuthCtx
 * - AuthCtxExtractor
 * - OptionalAuthCtx
 */

mod core;
mod types;

pub use self::core::{AuthCtxExtractor, OptionalAuthCtx};
pub use self::types::AuthCtx;
