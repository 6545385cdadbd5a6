pub mod cache_store;
pub mod error;
pub mod handle;
pub mod serializer;
pub mod service;
pub mod settings;
pub mod store;

pub use cache_store::CacheSessionStore;
pub use error::{SessionError, SignatureError};
pub use handle::Session;
pub use serializer::SignatureSerializer;
pub use service::{ResolvedSession, SessionOrigin, SessionService};
pub use settings::SessionConfig;
pub use store::{InMemorySessionStore, SessionRecord, SessionStore};
