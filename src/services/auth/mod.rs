pub mod codec;
pub mod cookies;
pub mod error;
pub mod keys;
pub mod location;
pub mod payload;
pub mod revocation;
pub mod scopes;
pub mod service;
pub mod settings;
pub mod subject;

pub use cookies::{SameSite, SetCookie};
pub use error::AuthError;
pub use location::RequestView;
pub use payload::{RequestToken, TokenLocation, TokenPayload, TokenType, VerifyOptions};
pub use revocation::{BlocklistCheck, CacheBlocklist, RevocationGate, TokenRevoker};
pub use service::{AccessPolicy, AuthService, Expiry, TokenOptions};
pub use settings::AuthConfig;
pub use subject::SubjectLookup;
