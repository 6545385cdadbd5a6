/*
 * Responsibility
 * - Facade over the token engine, built once from `AuthConfig`
 *   - issuance (access / refresh), decoding, extraction, verification
 *   - revocation gate as the final verification step
 *   - Set-Cookie directives for token and CSRF cookies
 * - Cheap to clone (everything behind Arc)
 */
use std::sync::Arc;

use axum::http::Method;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::Header;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::services::auth::codec::{
    self, ClaimSet, CsrfClaim, DecodeOptions, EncodeOptions, TimeClaim,
};
use crate::services::auth::cookies::SetCookie;
use crate::services::auth::error::AuthError;
use crate::services::auth::keys::KeyMaterial;
use crate::services::auth::location::{self, RequestView};
use crate::services::auth::payload::{
    RequestToken, TokenLocation, TokenPayload, TokenType, VerifyOptions,
};
use crate::services::auth::revocation::RevocationGate;
use crate::services::auth::settings::AuthConfig;
use crate::services::auth::subject::SubjectLookup;

/// Lifetime of a token being issued.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Expiry {
    /// `access_token_expires` / `refresh_token_expires` from config.
    #[default]
    Configured,
    Never,
    In(Duration),
    At(DateTime<Utc>),
}

/// Per-token issuance options.
#[derive(Debug, Clone, Default)]
pub struct TokenOptions {
    /// Ignored for refresh tokens.
    pub fresh: bool,
    pub scopes: Option<Vec<String>>,
    /// Application claims. Reserved names are rejected.
    pub data: Option<Map<String, Value>>,
    pub expiry: Expiry,
    pub headers: Option<Header>,
    pub jti: Option<String>,
}

impl TokenOptions {
    pub fn fresh(mut self, fresh: bool) -> Self {
        self.fresh = fresh;
        self
    }

    pub fn scopes<S: Into<String>>(mut self, scopes: impl IntoIterator<Item = S>) -> Self {
        self.scopes = Some(scopes.into_iter().map(Into::into).collect());
        self
    }

    pub fn data(mut self, data: Map<String, Value>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn expiry(mut self, expiry: Expiry) -> Self {
        self.expiry = expiry;
        self
    }
}

/// What a route demands of the incoming token.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    pub token_type: TokenType,
    pub fresh: bool,
    /// A missing token yields `None` instead of an error.
    pub optional: bool,
    /// Overrides `AuthConfig::token_location`.
    pub locations: Option<Vec<TokenLocation>>,
    /// Forces CSRF verification on or off.
    pub verify_csrf: Option<bool>,
}

impl AccessPolicy {
    pub fn access() -> Self {
        Self::default()
    }

    pub fn fresh() -> Self {
        Self {
            fresh: true,
            ..Self::default()
        }
    }

    pub fn refresh() -> Self {
        Self {
            token_type: TokenType::Refresh,
            ..Self::default()
        }
    }

    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Self::default()
        }
    }

    pub fn locations(mut self, locations: Vec<TokenLocation>) -> Self {
        self.locations = Some(locations);
        self
    }

    pub fn verify_csrf(mut self, on: bool) -> Self {
        self.verify_csrf = Some(on);
        self
    }
}

#[derive(Clone)]
pub struct AuthService {
    config: Arc<AuthConfig>,
    keys: Arc<KeyMaterial>,
    encode_options: Arc<EncodeOptions>,
    decode_options: Arc<DecodeOptions>,
    gate: RevocationGate,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("algorithm", &self.config.algorithm)
            .field("token_location", &self.config.token_location)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    /// Validate the configuration and parse key material.
    pub fn new(config: AuthConfig, gate: RevocationGate) -> Result<Self, AuthError> {
        config.validate()?;
        let keys = KeyMaterial::from_config(&config)?;

        let encode_options = EncodeOptions {
            algorithm: config.algorithm,
            headers: None,
            identity_claim: config.identity_claim.clone(),
        };
        let decode_options = DecodeOptions {
            algorithms: config.decode_algorithms.clone(),
            audience: config.decode_audience.clone(),
            issuer: config.decode_issuer.clone(),
            leeway: config.decode_leeway_seconds,
            identity_claim: config.identity_claim.clone(),
        };

        debug!(
            algorithm = ?config.algorithm,
            locations = ?config.token_location,
            revocation = gate.is_configured(),
            "auth service ready"
        );

        Ok(Self {
            config: Arc::new(config),
            keys: Arc::new(keys),
            encode_options: Arc::new(encode_options),
            decode_options: Arc::new(decode_options),
            gate,
        })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn gate(&self) -> &RevocationGate {
        &self.gate
    }

    pub fn create_access_token(
        &self,
        sub: impl Into<String>,
        options: TokenOptions,
    ) -> Result<String, AuthError> {
        self.create_token(sub.into(), TokenType::Access, options)
    }

    pub fn create_refresh_token(
        &self,
        sub: impl Into<String>,
        options: TokenOptions,
    ) -> Result<String, AuthError> {
        self.create_token(sub.into(), TokenType::Refresh, options)
    }

    fn create_token(
        &self,
        sub: String,
        token_type: TokenType,
        options: TokenOptions,
    ) -> Result<String, AuthError> {
        let mut claims = ClaimSet::new(sub, token_type);
        if let Some(data) = options.data {
            claims = claims.with_data(data)?;
        }

        claims.fresh = options.fresh;
        claims.csrf = CsrfClaim::from(self.config.cookie_csrf_protect);
        claims.jti = options.jti;
        claims.scopes = options.scopes;
        claims.issuer = self.config.encode_issuer.clone();
        claims.audience = self.config.encode_audience.clone();
        claims.exp = match options.expiry {
            Expiry::Configured => self.config.expires_for(token_type).map(TimeClaim::In),
            Expiry::Never => None,
            Expiry::In(delta) => Some(TimeClaim::In(delta)),
            Expiry::At(at) => Some(TimeClaim::At(at)),
        };

        let token = match options.headers {
            Some(headers) => {
                let encode_options = EncodeOptions {
                    headers: Some(headers),
                    ..(*self.encode_options).clone()
                };
                codec::encode(&claims, self.keys.encoding(), &encode_options)?
            }
            None => codec::encode(&claims, self.keys.encoding(), &self.encode_options)?,
        };

        debug!(token_type = %token_type, fresh = claims.fresh, "token issued");
        Ok(token)
    }

    /// Decode a raw token. `verify == false` skips signature and claim checks.
    pub fn decode_token(&self, token: &str, verify: bool) -> Result<TokenPayload, AuthError> {
        TokenPayload::decode(token, self.keys.decoding(), &self.decode_options, verify)
    }

    pub fn get_token_from_request(
        &self,
        request: &RequestView<'_>,
        token_type: TokenType,
        locations: Option<&[TokenLocation]>,
    ) -> Result<RequestToken, AuthError> {
        location::get_token_from_request(request, &self.config, token_type, locations)
    }

    /// Decode, type, freshness and CSRF checks, then the revocation gate.
    pub async fn verify_token(
        &self,
        token: RequestToken,
        options: VerifyOptions,
    ) -> Result<TokenPayload, AuthError> {
        let location = token.location;
        let token_type = token.token_type;

        let payload = token
            .verify(self.keys.decoding(), &self.decode_options, options)
            .inspect_err(|e| {
                warn!(error = %e, location = %location, token_type = %token_type, "token verification failed");
            })?;

        self.gate.ensure_not_revoked(&payload).await.inspect_err(|e| {
            warn!(error = %e, location = %location, "token rejected by revocation gate");
        })?;

        Ok(payload)
    }

    /// Is CSRF verification due for a request with this method?
    pub fn csrf_applies(&self, method: &Method) -> bool {
        self.config.cookie_csrf_protect && self.config.is_csrf_method(method)
    }

    /// Extract and verify a token under `policy`.
    ///
    /// Returns `Ok(None)` only for optional policies when no token (or its
    /// CSRF companion) is present. Invalid tokens are errors under every policy.
    pub async fn authenticate(
        &self,
        request: &RequestView<'_>,
        policy: &AccessPolicy,
    ) -> Result<Option<TokenPayload>, AuthError> {
        Ok(self
            .authenticate_located(request, policy)
            .await?
            .map(|(payload, _)| payload))
    }

    /// Same as `authenticate`, also reporting where the token was found.
    pub async fn authenticate_located(
        &self,
        request: &RequestView<'_>,
        policy: &AccessPolicy,
    ) -> Result<Option<(TokenPayload, TokenLocation)>, AuthError> {
        let found = match self.get_token_from_request(
            request,
            policy.token_type,
            policy.locations.as_deref(),
        ) {
            Ok(found) => found,
            Err(e) if policy.optional && e.is_missing_token() => {
                debug!(reason = %e, "no token on optional route");
                return Ok(None);
            }
            Err(e) => {
                debug!(error = %e, token_type = %policy.token_type, "token not found");
                return Err(e);
            }
        };

        let location = found.location;
        let options = VerifyOptions {
            verify_jwt: true,
            verify_type: true,
            verify_csrf: policy
                .verify_csrf
                .unwrap_or_else(|| self.csrf_applies(request.method)),
            verify_fresh: policy.fresh,
        };

        let payload = self.verify_token(found, options).await?;
        Ok(Some((payload, location)))
    }

    pub fn require_scopes<S: AsRef<str>>(
        &self,
        payload: &TokenPayload,
        required: &[S],
        all_required: bool,
    ) -> Result<(), AuthError> {
        payload.require_scopes(required, all_required).inspect_err(|e| {
            warn!(error = %e, sub = %payload.sub, "scope check failed");
        })
    }

    pub async fn current_subject<L>(&self, payload: &TokenPayload, lookup: &L) -> Option<L::Subject>
    where
        L: SubjectLookup + ?Sized,
    {
        lookup.find_by_uid(&payload.sub).await
    }

    /// Should a cookie-borne access token be re-issued before it expires?
    pub fn needs_implicit_refresh(&self, payload: &TokenPayload, now: DateTime<Utc>) -> bool {
        payload.token_type == TokenType::Access
            && payload
                .time_until_expiry(now)
                .is_some_and(|left| left < self.config.implicit_refresh_delta)
    }

    /// A non-fresh access token carrying the same subject, scopes and data.
    pub fn reissue_access_token(&self, payload: &TokenPayload) -> Result<String, AuthError> {
        let data: Map<String, Value> = payload
            .extra
            .iter()
            .filter(|(k, _)| !codec::RESERVED_CLAIMS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let options = TokenOptions {
            scopes: payload.scopes.clone(),
            data: (!data.is_empty()).then_some(data),
            ..TokenOptions::default()
        };
        self.create_access_token(payload.sub.clone(), options)
    }

    pub fn set_access_cookies(
        &self,
        token: &str,
        max_age: Option<i64>,
    ) -> Result<Vec<SetCookie>, AuthError> {
        self.token_cookies(token, TokenType::Access, max_age)
    }

    pub fn set_refresh_cookies(
        &self,
        token: &str,
        max_age: Option<i64>,
    ) -> Result<Vec<SetCookie>, AuthError> {
        self.token_cookies(token, TokenType::Refresh, max_age)
    }

    fn token_cookies(
        &self,
        token: &str,
        token_type: TokenType,
        max_age: Option<i64>,
    ) -> Result<Vec<SetCookie>, AuthError> {
        let config = &self.config;
        let max_age = max_age.or(config.cookie_max_age);

        let mut cookies = vec![
            SetCookie::new(config.cookie_name(token_type), token)
                .path(config.cookie_path(token_type))
                .domain(config.cookie_domain.clone())
                .max_age(max_age)
                .http_only(true)
                .secure(config.cookie_secure)
                .same_site(config.cookie_samesite),
        ];

        if config.cookie_csrf_protect && config.csrf_in_cookies {
            // The token was just minted by us; no need to verify the signature again.
            let claims = self.decode_token(token, false)?;
            if let Some(csrf) = claims.csrf.filter(|c| !c.is_empty()) {
                cookies.push(
                    SetCookie::new(config.csrf_cookie_name(token_type), csrf)
                        .path(config.csrf_cookie_path(token_type))
                        .domain(config.cookie_domain.clone())
                        .max_age(max_age)
                        .http_only(false)
                        .secure(config.cookie_secure)
                        .same_site(config.cookie_samesite),
                );
            }
        }

        Ok(cookies)
    }

    pub fn unset_access_cookies(&self) -> Vec<SetCookie> {
        self.removal_cookies(TokenType::Access)
    }

    pub fn unset_refresh_cookies(&self) -> Vec<SetCookie> {
        self.removal_cookies(TokenType::Refresh)
    }

    pub fn unset_cookies(&self) -> Vec<SetCookie> {
        let mut cookies = self.unset_access_cookies();
        cookies.extend(self.unset_refresh_cookies());
        cookies
    }

    fn removal_cookies(&self, token_type: TokenType) -> Vec<SetCookie> {
        let config = &self.config;
        let mut cookies = vec![SetCookie::removal(
            config.cookie_name(token_type),
            Some(config.cookie_path(token_type).to_string()),
            config.cookie_domain.clone(),
        )];
        if config.cookie_csrf_protect && config.csrf_in_cookies {
            cookies.push(SetCookie::removal(
                config.csrf_cookie_name(token_type),
                Some(config.csrf_cookie_path(token_type).to_string()),
                config.cookie_domain.clone(),
            ));
        }
        cookies
    }
}
