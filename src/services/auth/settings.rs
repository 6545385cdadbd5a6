/*
 * Responsibility
 * - Typed settings consumed by the token engine (algorithm, keys, lifetimes,
 *   locations, per-location names, CSRF knobs, cookie attributes)
 * - Explicit defaults via `Default`; invariants checked by `validate()`
 * - Environment loading lives in `crate::config`, not here
 */
use axum::http::Method;
use chrono::Duration;
use jsonwebtoken::Algorithm;

use crate::services::auth::cookies::SameSite;
use crate::services::auth::error::AuthError;
use crate::services::auth::keys::KeyFamily;
use crate::services::auth::payload::{OneOrMany, TokenLocation, TokenType};

#[derive(Debug, Clone)]
pub struct AuthConfig {
    // Signing
    pub algorithm: Algorithm,
    pub decode_algorithms: Vec<Algorithm>,
    pub secret_key: Option<String>,
    pub private_key: Option<String>,
    pub public_key: Option<String>,

    // Claims
    pub encode_issuer: Option<String>,
    pub encode_audience: Option<OneOrMany>,
    pub decode_issuer: Option<String>,
    pub decode_audience: Option<Vec<String>>,
    pub decode_leeway_seconds: u64,
    pub identity_claim: String,
    /// `None` means non-expiring.
    pub access_token_expires: Option<Duration>,
    pub refresh_token_expires: Option<Duration>,

    // Locations, tried in order
    pub token_location: Vec<TokenLocation>,
    pub header_name: String,
    /// Scheme prefix stripped from the header value. Empty means raw value.
    pub header_type: String,
    pub query_string_name: String,
    pub json_key: String,
    pub refresh_json_key: String,

    // Cookies
    pub access_cookie_name: String,
    pub refresh_cookie_name: String,
    pub access_cookie_path: String,
    pub refresh_cookie_path: String,
    pub cookie_domain: Option<String>,
    pub cookie_secure: bool,
    pub cookie_samesite: SameSite,
    /// `None` issues browser-session cookies.
    pub cookie_max_age: Option<i64>,

    // CSRF
    pub cookie_csrf_protect: bool,
    pub csrf_in_cookies: bool,
    pub access_csrf_cookie_name: String,
    pub refresh_csrf_cookie_name: String,
    pub access_csrf_cookie_path: String,
    pub refresh_csrf_cookie_path: String,
    pub access_csrf_header_name: String,
    pub refresh_csrf_header_name: String,
    pub csrf_check_form: bool,
    pub access_csrf_field_name: String,
    pub refresh_csrf_field_name: String,
    pub csrf_methods: Vec<Method>,

    // Implicit refresh of cookie-borne access tokens
    pub implicit_refresh: bool,
    pub implicit_refresh_delta: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::HS256,
            decode_algorithms: vec![Algorithm::HS256],
            secret_key: None,
            private_key: None,
            public_key: None,

            encode_issuer: None,
            encode_audience: None,
            decode_issuer: None,
            decode_audience: None,
            decode_leeway_seconds: 0,
            identity_claim: "sub".to_string(),
            access_token_expires: Some(Duration::minutes(15)),
            refresh_token_expires: Some(Duration::days(20)),

            token_location: vec![TokenLocation::Headers],
            header_name: "Authorization".to_string(),
            header_type: "Bearer".to_string(),
            query_string_name: "token".to_string(),
            json_key: "access_token".to_string(),
            refresh_json_key: "refresh_token".to_string(),

            access_cookie_name: "access_token_cookie".to_string(),
            refresh_cookie_name: "refresh_token_cookie".to_string(),
            access_cookie_path: "/".to_string(),
            refresh_cookie_path: "/".to_string(),
            cookie_domain: None,
            cookie_secure: true,
            cookie_samesite: SameSite::Lax,
            cookie_max_age: None,

            cookie_csrf_protect: true,
            csrf_in_cookies: true,
            access_csrf_cookie_name: "csrf_access_token".to_string(),
            refresh_csrf_cookie_name: "csrf_refresh_token".to_string(),
            access_csrf_cookie_path: "/".to_string(),
            refresh_csrf_cookie_path: "/".to_string(),
            access_csrf_header_name: "X-CSRF-TOKEN".to_string(),
            refresh_csrf_header_name: "X-CSRF-TOKEN".to_string(),
            csrf_check_form: false,
            access_csrf_field_name: "csrf_token".to_string(),
            refresh_csrf_field_name: "csrf_token".to_string(),
            csrf_methods: vec![Method::POST, Method::PUT, Method::PATCH, Method::DELETE],

            implicit_refresh: false,
            implicit_refresh_delta: Duration::minutes(10),
        }
    }
}

impl AuthConfig {
    /// HMAC config with the given shared secret; everything else default.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret_key: Some(secret.into()),
            ..Self::default()
        }
    }

    /// Structural checks. Key material is checked when keys are parsed.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.decode_algorithms.is_empty() {
            return Err(AuthError::BadConfiguration(
                "decode_algorithms must not be empty".to_string(),
            ));
        }

        let family = KeyFamily::of(self.algorithm);
        if let Some(alg) = self
            .decode_algorithms
            .iter()
            .find(|a| KeyFamily::of(**a) != family)
        {
            return Err(AuthError::BadConfiguration(format!(
                "decode algorithm {alg:?} does not match the {family:?} key family of {:?}",
                self.algorithm
            )));
        }

        if self.token_location.is_empty() {
            return Err(AuthError::BadConfiguration(
                "token_location must list at least one location".to_string(),
            ));
        }

        if self.identity_claim.trim().is_empty() {
            return Err(AuthError::BadConfiguration(
                "identity_claim must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn cookie_name(&self, token_type: TokenType) -> &str {
        match token_type {
            TokenType::Access => &self.access_cookie_name,
            TokenType::Refresh => &self.refresh_cookie_name,
        }
    }

    pub fn cookie_path(&self, token_type: TokenType) -> &str {
        match token_type {
            TokenType::Access => &self.access_cookie_path,
            TokenType::Refresh => &self.refresh_cookie_path,
        }
    }

    pub fn csrf_cookie_name(&self, token_type: TokenType) -> &str {
        match token_type {
            TokenType::Access => &self.access_csrf_cookie_name,
            TokenType::Refresh => &self.refresh_csrf_cookie_name,
        }
    }

    pub fn csrf_cookie_path(&self, token_type: TokenType) -> &str {
        match token_type {
            TokenType::Access => &self.access_csrf_cookie_path,
            TokenType::Refresh => &self.refresh_csrf_cookie_path,
        }
    }

    pub fn csrf_header_name(&self, token_type: TokenType) -> &str {
        match token_type {
            TokenType::Access => &self.access_csrf_header_name,
            TokenType::Refresh => &self.refresh_csrf_header_name,
        }
    }

    pub fn csrf_field_name(&self, token_type: TokenType) -> &str {
        match token_type {
            TokenType::Access => &self.access_csrf_field_name,
            TokenType::Refresh => &self.refresh_csrf_field_name,
        }
    }

    pub fn json_key_for(&self, token_type: TokenType) -> &str {
        match token_type {
            TokenType::Access => &self.json_key,
            TokenType::Refresh => &self.refresh_json_key,
        }
    }

    pub fn expires_for(&self, token_type: TokenType) -> Option<Duration> {
        match token_type {
            TokenType::Access => self.access_token_expires,
            TokenType::Refresh => self.refresh_token_expires,
        }
    }

    pub fn is_csrf_method(&self, method: &Method) -> bool {
        self.csrf_methods.contains(method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(AuthConfig::with_secret("s").validate().is_ok());
    }

    #[test]
    fn rejects_empty_algorithm_list() {
        let mut config = AuthConfig::with_secret("s");
        config.decode_algorithms.clear();
        assert!(matches!(config.validate(), Err(AuthError::BadConfiguration(_))));
    }

    #[test]
    fn rejects_mixed_key_families() {
        let mut config = AuthConfig::with_secret("s");
        config.decode_algorithms = vec![Algorithm::HS256, Algorithm::RS256];
        assert!(matches!(config.validate(), Err(AuthError::BadConfiguration(_))));
    }

    #[test]
    fn rejects_empty_locations() {
        let mut config = AuthConfig::with_secret("s");
        config.token_location.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn per_type_names() {
        let config = AuthConfig::default();
        assert_eq!(config.cookie_name(TokenType::Refresh), "refresh_token_cookie");
        assert_eq!(config.json_key_for(TokenType::Access), "access_token");
        assert_eq!(config.expires_for(TokenType::Access), Some(Duration::minutes(15)));
        assert!(config.is_csrf_method(&Method::POST));
        assert!(!config.is_csrf_method(&Method::GET));
    }
}
