//! Structured claims (`TokenPayload`) and the untrusted wire token
//! (`RequestToken`) together with its verification protocol.
//!
//! Verification order is fixed: decode -> type -> freshness -> CSRF. The
//! revocation gate runs after all of these (see `AuthService::verify_token`).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use subtle::ConstantTimeEq;

use crate::services::auth::codec::{self, DecodeOptions};
use crate::services::auth::error::AuthError;
use crate::services::auth::scopes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    #[default]
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a token was (or may be) found on the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenLocation {
    Headers,
    Cookies,
    Json,
    Query,
}

impl TokenLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenLocation::Headers => "headers",
            TokenLocation::Cookies => "cookies",
            TokenLocation::Json => "json",
            TokenLocation::Query => "query",
        }
    }
}

impl fmt::Display for TokenLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "headers" => Ok(TokenLocation::Headers),
            "cookies" => Ok(TokenLocation::Cookies),
            "json" => Ok(TokenLocation::Json),
            "query" => Ok(TokenLocation::Query),
            other => Err(format!("unknown token location '{other}'")),
        }
    }
}

/// A claim that is either a single string or a list of strings (`iss`, `aud`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_value(&self) -> Value {
        match self {
            OneOrMany::One(s) => Value::from(s.clone()),
            OneOrMany::Many(v) => Value::from(v.clone()),
        }
    }

    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s.clone()],
            OneOrMany::Many(v) => v.clone(),
        }
    }
}

/// A decoded claim set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<f64>,
    #[serde(rename = "type", default)]
    pub token_type: TokenType,
    #[serde(default)]
    pub fresh: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csrf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    /// Application claims.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenPayload {
    /// Parse (and, with `verify`, validate) a raw token.
    pub fn decode(
        token: &str,
        key: &DecodingKey,
        options: &DecodeOptions,
        verify: bool,
    ) -> Result<Self, AuthError> {
        let claims = codec::decode(token, key, options, verify)?;
        Self::from_claims(claims)
    }

    pub fn from_claims(claims: Map<String, Value>) -> Result<Self, AuthError> {
        serde_json::from_value(Value::Object(claims))
            .map_err(|e| AuthError::JwtDecode(format!("invalid claims: {e}")))
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.iat.and_then(to_datetime)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(to_datetime)
    }

    /// Time left before expiry. `None` for non-expiring tokens.
    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.expires_at().map(|exp| exp - now)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.time_until_expiry(now)
            .is_some_and(|left| left <= chrono::Duration::zero())
    }

    /// `false` when the token carries no `scopes` claim.
    pub fn has_scopes<S: AsRef<str>>(&self, required: &[S], all_required: bool) -> bool {
        match &self.scopes {
            None => false,
            Some(granted) => {
                scopes::has_required_scopes(required, Some(granted.as_slice()), all_required)
            }
        }
    }

    pub fn require_scopes<S: AsRef<str>>(
        &self,
        required: &[S],
        all_required: bool,
    ) -> Result<(), AuthError> {
        if self.has_scopes(required, all_required) {
            return Ok(());
        }
        Err(AuthError::InsufficientScope {
            required: required.iter().map(|s| s.as_ref().to_string()).collect(),
            provided: self.scopes.clone().unwrap_or_default(),
        })
    }

    /// Application claims, i.e. everything the codec does not own.
    pub fn extra_data(&self) -> &Map<String, Value> {
        &self.extra
    }
}

fn to_datetime(ts: f64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_micros((ts * 1_000_000.0).round() as i64)
}

/// Independently toggleable verification steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyOptions {
    pub verify_jwt: bool,
    pub verify_type: bool,
    pub verify_csrf: bool,
    pub verify_fresh: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            verify_jwt: true,
            verify_type: true,
            verify_csrf: true,
            verify_fresh: false,
        }
    }
}

/// A token as found on the wire, before any trust is established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    pub token: String,
    pub location: TokenLocation,
    /// The type the caller expects this token to be.
    pub token_type: TokenType,
    /// CSRF value found next to the token (cookie location only).
    pub csrf: Option<String>,
}

impl RequestToken {
    pub fn new(token: impl Into<String>, location: TokenLocation, token_type: TokenType) -> Self {
        Self {
            token: token.into(),
            location,
            token_type,
            csrf: None,
        }
    }

    pub fn with_csrf(mut self, csrf: impl Into<String>) -> Self {
        self.csrf = Some(csrf.into());
        self
    }

    /// Promote the wire token into a trusted payload. Consumes the token;
    /// the first failing check aborts.
    pub fn verify(
        self,
        key: &DecodingKey,
        decode: &DecodeOptions,
        options: VerifyOptions,
    ) -> Result<TokenPayload, AuthError> {
        let payload = TokenPayload::decode(&self.token, key, decode, options.verify_jwt)?;

        if options.verify_type && payload.token_type != self.token_type {
            return Err(AuthError::type_mismatch(self.token_type));
        }

        if options.verify_fresh && !payload.fresh {
            return Err(AuthError::FreshTokenRequired);
        }

        if options.verify_csrf && self.location == TokenLocation::Cookies {
            let presented = self
                .csrf
                .as_deref()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| AuthError::Csrf("missing CSRF token".to_string()))?;
            let embedded = payload
                .csrf
                .as_deref()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| AuthError::Csrf("cookies token missing CSRF claim".to_string()))?;

            if !bool::from(presented.as_bytes().ct_eq(embedded.as_bytes())) {
                return Err(AuthError::Csrf("CSRF double submit tokens do not match".to_string()));
            }
        }

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::codec::{ClaimSet, CsrfClaim, EncodeOptions, TimeClaim, encode};
    use jsonwebtoken::{Algorithm, EncodingKey};

    const SECRET: &[u8] = b"payload-test-secret";

    fn sign(claims: &ClaimSet) -> String {
        encode(
            claims,
            &EncodingKey::from_secret(SECRET),
            &EncodeOptions::new(Algorithm::HS256),
        )
        .unwrap()
    }

    fn verify(rt: RequestToken, options: VerifyOptions) -> Result<TokenPayload, AuthError> {
        rt.verify(
            &DecodingKey::from_secret(SECRET),
            &DecodeOptions::new(vec![Algorithm::HS256]),
            options,
        )
    }

    fn access(fresh: bool, csrf: Option<&str>) -> ClaimSet {
        let mut c = ClaimSet::new("u1", TokenType::Access);
        c.fresh = fresh;
        c.csrf = csrf.map(|v| CsrfClaim::Value(v.into())).unwrap_or_default();
        c
    }

    #[test]
    fn decode_produces_structured_payload() {
        let mut claims = access(true, Some("c1"));
        claims.scopes = Some(vec!["users:read".into()]);
        claims.exp = Some(TimeClaim::Timestamp(4_000_000_000.0));
        let token = sign(&claims);

        let payload = TokenPayload::decode(
            &token,
            &DecodingKey::from_secret(SECRET),
            &DecodeOptions::new(vec![Algorithm::HS256]),
            true,
        )
        .unwrap();

        assert_eq!(payload.sub, "u1");
        assert_eq!(payload.token_type, TokenType::Access);
        assert!(payload.fresh);
        assert_eq!(payload.csrf.as_deref(), Some("c1"));
        assert_eq!(payload.scopes, Some(vec!["users:read".to_string()]));
        assert_eq!(payload.exp, Some(4_000_000_000.0));
        assert!(payload.jti.is_some());
    }

    #[test]
    fn schema_violation_is_a_decode_error() {
        let mut claims = Map::new();
        claims.insert("sub".into(), Value::from("u1"));
        claims.insert("exp".into(), Value::from("tomorrow"));
        assert!(matches!(
            TokenPayload::from_claims(claims),
            Err(AuthError::JwtDecode(_))
        ));

        let mut no_sub = Map::new();
        no_sub.insert("type".into(), Value::from("access"));
        assert!(TokenPayload::from_claims(no_sub).is_err());
    }

    #[test]
    fn extra_claims_are_kept_apart_from_reserved_ones() {
        let mut claims = Map::new();
        claims.insert("sub".into(), Value::from("u1"));
        claims.insert("tenant".into(), Value::from("acme"));
        let payload = TokenPayload::from_claims(claims).unwrap();
        assert_eq!(payload.extra_data().get("tenant"), Some(&Value::from("acme")));
        assert!(!payload.extra_data().contains_key("sub"));
    }

    #[test]
    fn type_mismatch_raises_specific_errors() {
        let refresh = sign(&ClaimSet::new("u1", TokenType::Refresh));
        let rt = RequestToken::new(refresh, TokenLocation::Headers, TokenType::Access);
        assert!(matches!(
            verify(rt, VerifyOptions::default()),
            Err(AuthError::AccessTokenRequired)
        ));

        let access_token = sign(&access(false, None));
        let rt = RequestToken::new(access_token.clone(), TokenLocation::Headers, TokenType::Refresh);
        assert!(matches!(
            verify(rt, VerifyOptions::default()),
            Err(AuthError::RefreshTokenRequired)
        ));

        let rt = RequestToken::new(access_token, TokenLocation::Headers, TokenType::Refresh);
        let opts = VerifyOptions {
            verify_type: false,
            ..VerifyOptions::default()
        };
        assert!(verify(rt, opts).is_ok());
    }

    #[test]
    fn freshness_is_enforced_when_requested() {
        let opts = VerifyOptions {
            verify_fresh: true,
            ..VerifyOptions::default()
        };
        let fresh = RequestToken::new(sign(&access(true, None)), TokenLocation::Headers, TokenType::Access);
        assert!(verify(fresh, opts).is_ok());

        let stale = RequestToken::new(sign(&access(false, None)), TokenLocation::Headers, TokenType::Access);
        assert!(matches!(verify(stale, opts), Err(AuthError::FreshTokenRequired)));
    }

    #[test]
    fn csrf_only_checked_for_cookie_location() {
        let token = sign(&access(false, Some("c1")));
        let header = RequestToken::new(token.clone(), TokenLocation::Headers, TokenType::Access);
        assert!(verify(header, VerifyOptions::default()).is_ok());

        let cookie = RequestToken::new(token.clone(), TokenLocation::Cookies, TokenType::Access);
        assert!(matches!(
            verify(cookie, VerifyOptions::default()),
            Err(AuthError::Csrf(msg)) if msg == "missing CSRF token"
        ));

        let good = RequestToken::new(token.clone(), TokenLocation::Cookies, TokenType::Access).with_csrf("c1");
        assert!(verify(good, VerifyOptions::default()).is_ok());

        let bad = RequestToken::new(token, TokenLocation::Cookies, TokenType::Access).with_csrf("c2");
        assert!(matches!(verify(bad, VerifyOptions::default()), Err(AuthError::Csrf(_))));
    }

    #[test]
    fn cookie_token_without_csrf_claim_fails() {
        let token = sign(&access(false, None));
        let rt = RequestToken::new(token, TokenLocation::Cookies, TokenType::Access).with_csrf("c1");
        assert!(matches!(
            verify(rt, VerifyOptions::default()),
            Err(AuthError::Csrf(msg)) if msg == "cookies token missing CSRF claim"
        ));
    }

    #[test]
    fn type_is_checked_before_csrf() {
        let refresh = sign(&ClaimSet::new("u1", TokenType::Refresh));
        let rt = RequestToken::new(refresh, TokenLocation::Cookies, TokenType::Access);
        assert!(matches!(
            verify(rt, VerifyOptions::default()),
            Err(AuthError::AccessTokenRequired)
        ));
    }

    #[test]
    fn has_scopes_is_false_without_scope_claim() {
        let mut claims = Map::new();
        claims.insert("sub".into(), Value::from("u1"));
        let payload = TokenPayload::from_claims(claims).unwrap();
        assert!(!payload.has_scopes(&["users:read"], true));

        let mut with = payload.clone();
        with.scopes = Some(vec!["users:*".into()]);
        assert!(with.has_scopes(&["users:read", "users:write"], true));
        assert!(matches!(
            with.require_scopes(&["admin"], true),
            Err(AuthError::InsufficientScope { required, provided })
                if required == vec!["admin".to_string()] && provided == vec!["users:*".to_string()]
        ));
    }

    #[test]
    fn expiry_helpers() {
        let mut claims = Map::new();
        claims.insert("sub".into(), Value::from("u1"));
        claims.insert("exp".into(), Value::from(1_000.5));
        let payload = TokenPayload::from_claims(claims).unwrap();

        let before = DateTime::<Utc>::from_timestamp(900, 0).unwrap();
        let after = DateTime::<Utc>::from_timestamp(1_001, 0).unwrap();
        assert!(!payload.is_expired(before));
        assert!(payload.is_expired(after));
        assert_eq!(
            payload.time_until_expiry(before),
            Some(chrono::Duration::milliseconds(100_500))
        );
    }

    #[test]
    fn location_parses_from_config_strings() {
        assert_eq!("Cookies".parse::<TokenLocation>(), Ok(TokenLocation::Cookies));
        assert!("body".parse::<TokenLocation>().is_err());
    }
}
