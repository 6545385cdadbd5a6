//! Token codec: claim construction, signing and decoding.
//!
//! Time claims (`iat`, `exp`, `nbf`) are written as numeric seconds since the
//! epoch. Fractional seconds survive the round trip; jsonwebtoken rounds them
//! when it validates `exp`/`nbf`.

use std::collections::HashSet;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use tracing::error;
use uuid::Uuid;

use crate::services::auth::error::AuthError;
use crate::services::auth::payload::{OneOrMany, TokenType};

/// Claim names the codec owns. Custom data may not use them.
pub const RESERVED_CLAIMS: [&str; 10] = [
    "fresh", "csrf", "iat", "exp", "iss", "aud", "type", "jti", "nbf", "sub",
];

const CSRF_ENTROPY_BYTES: usize = 32;

/// A time claim in any of its accepted input shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeClaim {
    /// Seconds since the epoch, used as-is.
    Timestamp(f64),
    /// Wall-clock instant.
    At(DateTime<Utc>),
    /// Offset from "now" at encode time.
    In(Duration),
}

impl TimeClaim {
    /// Seconds since the epoch. Offsets that leave chrono's range are an error.
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<f64, AuthError> {
        match self {
            TimeClaim::Timestamp(ts) => Ok(*ts),
            TimeClaim::At(at) => Ok(epoch_seconds(*at)),
            TimeClaim::In(delta) => now
                .checked_add_signed(*delta)
                .map(epoch_seconds)
                .ok_or_else(|| {
                    AuthError::Encode(format!("time offset of {delta} is out of range"))
                }),
        }
    }
}

impl From<f64> for TimeClaim {
    fn from(ts: f64) -> Self {
        TimeClaim::Timestamp(ts)
    }
}

impl From<i64> for TimeClaim {
    fn from(ts: i64) -> Self {
        TimeClaim::Timestamp(ts as f64)
    }
}

impl From<DateTime<Utc>> for TimeClaim {
    fn from(at: DateTime<Utc>) -> Self {
        TimeClaim::At(at)
    }
}

impl From<Duration> for TimeClaim {
    fn from(delta: Duration) -> Self {
        TimeClaim::In(delta)
    }
}

/// What to put in the `csrf` claim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CsrfClaim {
    /// Omit the claim.
    #[default]
    Disabled,
    /// Generate a random opaque value.
    Generate,
    /// Use this value verbatim (an empty value omits the claim).
    Value(String),
}

impl From<bool> for CsrfClaim {
    fn from(enabled: bool) -> Self {
        if enabled {
            CsrfClaim::Generate
        } else {
            CsrfClaim::Disabled
        }
    }
}

/// Input of [`encode`].
#[derive(Debug, Clone)]
pub struct ClaimSet {
    pub sub: String,
    pub token_type: TokenType,
    pub fresh: bool,
    pub csrf: CsrfClaim,
    pub jti: Option<String>,
    pub iat: Option<TimeClaim>,
    pub exp: Option<TimeClaim>,
    pub nbf: Option<TimeClaim>,
    pub issuer: Option<String>,
    pub audience: Option<OneOrMany>,
    pub scopes: Option<Vec<String>>,
    extra: Map<String, Value>,
}

impl ClaimSet {
    pub fn new(sub: impl Into<String>, token_type: TokenType) -> Self {
        Self {
            sub: sub.into(),
            token_type,
            fresh: false,
            csrf: CsrfClaim::Disabled,
            jti: None,
            iat: None,
            exp: None,
            nbf: None,
            issuer: None,
            audience: None,
            scopes: None,
            extra: Map::new(),
        }
    }

    /// Merge application claims. Any reserved name is an error.
    pub fn with_data(mut self, data: Map<String, Value>) -> Result<Self, AuthError> {
        if let Some(name) = data.keys().find(|k| RESERVED_CLAIMS.contains(&k.as_str())) {
            return Err(AuthError::ReservedClaim(name.clone()));
        }
        self.extra.extend(data);
        Ok(self)
    }

    /// Merge application claims, silently dropping reserved names.
    pub fn with_data_filtered(mut self, data: Map<String, Value>) -> Self {
        self.extra.extend(
            data.into_iter()
                .filter(|(k, _)| !RESERVED_CLAIMS.contains(&k.as_str())),
        );
        self
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

/// Signing parameters.
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub algorithm: Algorithm,
    pub headers: Option<Header>,
    /// Claim the subject is written under.
    pub identity_claim: String,
}

impl EncodeOptions {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            headers: None,
            identity_claim: "sub".to_string(),
        }
    }
}

/// Verification parameters.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    pub algorithms: Vec<Algorithm>,
    pub audience: Option<Vec<String>>,
    pub issuer: Option<String>,
    pub leeway: u64,
    pub identity_claim: String,
}

impl DecodeOptions {
    pub fn new(algorithms: Vec<Algorithm>) -> Self {
        Self {
            algorithms,
            audience: None,
            issuer: None,
            leeway: 0,
            identity_claim: "sub".to_string(),
        }
    }
}

/// Build the claim map without signing it.
pub fn build_claims(
    claims: &ClaimSet,
    identity_claim: &str,
    now: DateTime<Utc>,
) -> Result<Map<String, Value>, AuthError> {
    let mut out = claims.extra.clone();

    // reserved claims are inserted last so they win over custom data
    out.insert(identity_claim.to_string(), Value::from(claims.sub.clone()));

    let iat = claims.iat.unwrap_or(TimeClaim::At(now)).resolve(now)?;
    out.insert("iat".into(), Value::from(iat));
    if let Some(exp) = claims.exp {
        out.insert("exp".into(), Value::from(exp.resolve(now)?));
    }
    if let Some(nbf) = claims.nbf {
        out.insert("nbf".into(), Value::from(nbf.resolve(now)?));
    }
    if let Some(iss) = &claims.issuer {
        out.insert("iss".into(), Value::from(iss.clone()));
    }
    if let Some(aud) = &claims.audience {
        out.insert("aud".into(), aud.to_value());
    }

    out.insert("type".into(), Value::from(claims.token_type.as_str()));
    let jti = claims
        .jti
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    out.insert("jti".into(), Value::from(jti));

    if claims.token_type == TokenType::Access {
        out.insert("fresh".into(), Value::from(claims.fresh));
    }

    match &claims.csrf {
        CsrfClaim::Disabled => {}
        CsrfClaim::Generate => {
            out.insert("csrf".into(), Value::from(generate_csrf_value()?));
        }
        CsrfClaim::Value(v) if v.is_empty() => {}
        CsrfClaim::Value(v) => {
            out.insert("csrf".into(), Value::from(v.clone()));
        }
    }

    if let Some(scopes) = &claims.scopes {
        out.insert("scopes".into(), Value::from(scopes.clone()));
    }

    Ok(out)
}

/// Sign a claim set into a compact JWT.
pub fn encode(
    claims: &ClaimSet,
    key: &EncodingKey,
    options: &EncodeOptions,
) -> Result<String, AuthError> {
    let map = build_claims(claims, &options.identity_claim, Utc::now())?;

    let mut header = options.headers.clone().unwrap_or_default();
    header.alg = options.algorithm;
    if header.typ.is_none() {
        header.typ = Some("JWT".to_string());
    }

    jsonwebtoken::encode(&header, &map, key).map_err(|e| {
        error!(error = %e, "failed to sign JWT");
        AuthError::Encode(e.to_string())
    })
}

/// Decode a compact JWT into its raw claim map.
///
/// With `verify == false` the token is only parsed; signature, time claims,
/// audience and issuer are not checked.
pub fn decode(
    token: &str,
    key: &DecodingKey,
    options: &DecodeOptions,
    verify: bool,
) -> Result<Map<String, Value>, AuthError> {
    let mut claims = if verify {
        let validation = build_validation(options)?;
        jsonwebtoken::decode::<Map<String, Value>>(token, key, &validation)?.claims
    } else {
        jsonwebtoken::dangerous::insecure_decode::<Map<String, Value>>(token)?.claims
    };

    if options.identity_claim != "sub" {
        if let Some(sub) = claims.remove(&options.identity_claim) {
            claims.insert("sub".into(), sub);
        }
    }

    Ok(claims)
}

fn build_validation(options: &DecodeOptions) -> Result<Validation, AuthError> {
    let first = options.algorithms.first().copied().ok_or_else(|| {
        AuthError::BadConfiguration("no algorithms allowed for decoding".to_string())
    })?;

    let mut validation = Validation::new(first);
    validation.algorithms = options.algorithms.clone();
    validation.leeway = options.leeway;
    validation.validate_nbf = true;

    // `exp` is optional (non-expiring tokens); iss/aud become mandatory only
    // when they are configured.
    let mut required: HashSet<String> = HashSet::new();

    match &options.audience {
        Some(aud) => {
            validation.set_audience(aud);
            required.insert("aud".to_string());
        }
        None => validation.validate_aud = false,
    }

    if let Some(iss) = &options.issuer {
        validation.set_issuer(&[iss]);
        required.insert("iss".to_string());
    }

    validation.required_spec_claims = required;
    Ok(validation)
}

/// Random opaque CSRF value (32 bytes, URL-safe base64).
pub fn generate_csrf_value() -> Result<String, AuthError> {
    let mut bytes = [0u8; CSRF_ENTROPY_BYTES];
    getrandom::fill(&mut bytes).map_err(|e| {
        error!(error = %e, "failed to gather entropy for CSRF value");
        AuthError::Encode("entropy source unavailable".to_string())
    })?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

pub(crate) fn epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}
