//! Token-location extraction.
//!
//! Tries each configured location in order; the first hit wins and later
//! locations are never looked at (so a tampered cookie behind a valid header
//! token is never CSRF-checked). When every location misses, the per-location
//! reasons are aggregated into one `MissingToken`.

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method, Uri};
use serde_json::Value;
use tracing::debug;

use crate::services::auth::cookies::cookie_value;
use crate::services::auth::error::AuthError;
use crate::services::auth::payload::{RequestToken, TokenLocation, TokenType};
use crate::services::auth::settings::AuthConfig;

const JSON_CONTENT_TYPE: &str = "application/json";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Read-only view of an inbound request.
///
/// The body is optional: callers only buffer it when a body-based location
/// (json, or the CSRF form fallback) can actually be used.
#[derive(Debug, Clone, Copy)]
pub struct RequestView<'a> {
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub headers: &'a HeaderMap,
    pub body: Option<&'a [u8]>,
}

impl<'a> RequestView<'a> {
    pub fn new(method: &'a Method, uri: &'a Uri, headers: &'a HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
            body: None,
        }
    }

    pub fn with_body(mut self, body: &'a [u8]) -> Self {
        self.body = Some(body);
        self
    }

    fn header(&self, name: &str) -> Option<&'a str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn content_type_is(&self, expected: &str) -> bool {
        self.header(CONTENT_TYPE.as_str())
            .and_then(|ct| ct.split(';').next())
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(expected))
    }

    fn query_param(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    fn form_field(&self, name: &str) -> Option<String> {
        if !self.content_type_is(FORM_CONTENT_TYPE) {
            return None;
        }
        url::form_urlencoded::parse(self.body?)
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }
}

/// Does extracting from `locations` need the request body?
pub fn needs_body(config: &AuthConfig, locations: &[TokenLocation]) -> bool {
    locations.iter().any(|l| match l {
        TokenLocation::Json => true,
        TokenLocation::Cookies => config.cookie_csrf_protect && config.csrf_check_form,
        _ => false,
    })
}

/// Find a candidate token in the request.
///
/// `locations` overrides `config.token_location` when given.
pub fn get_token_from_request(
    request: &RequestView<'_>,
    config: &AuthConfig,
    token_type: TokenType,
    locations: Option<&[TokenLocation]>,
) -> Result<RequestToken, AuthError> {
    let locations = locations.unwrap_or(&config.token_location);
    let mut errors: Vec<AuthError> = Vec::with_capacity(locations.len());

    for location in locations {
        let attempt = match location {
            TokenLocation::Headers => from_headers(request, config, token_type),
            TokenLocation::Cookies => from_cookies(request, config, token_type),
            TokenLocation::Query => from_query(request, config, token_type),
            TokenLocation::Json => from_json(request, config, token_type),
        };

        match attempt {
            Ok(token) => {
                debug!(location = %location, token_type = %token_type, "token found");
                return Ok(token);
            }
            Err(e) => errors.push(e),
        }
    }

    Err(aggregate(errors))
}

fn aggregate(mut errors: Vec<AuthError>) -> AuthError {
    if errors.len() == 1 {
        if let Some(only) = errors.pop() {
            return only;
        }
    }

    if !errors.is_empty()
        && errors
            .iter()
            .all(|e| matches!(e, AuthError::MissingCsrfToken(_)))
    {
        let reasons: Vec<String> = errors
            .iter()
            .filter_map(|e| match e {
                AuthError::MissingCsrfToken(r) => Some(r.clone()),
                _ => None,
            })
            .collect();
        return AuthError::MissingCsrfToken(reasons.join("; "));
    }

    if errors.is_empty() {
        return AuthError::missing("no token locations configured");
    }

    AuthError::MissingToken(errors.iter().flat_map(AuthError::reasons).collect())
}

fn from_headers(
    request: &RequestView<'_>,
    config: &AuthConfig,
    token_type: TokenType,
) -> Result<RequestToken, AuthError> {
    let raw = request
        .header(&config.header_name)
        .ok_or_else(|| AuthError::missing(format!("missing '{}' header", config.header_name)))?;

    let token = if config.header_type.is_empty() {
        raw.trim()
    } else {
        let (scheme, rest) = raw.trim().split_once(' ').ok_or_else(|| {
            AuthError::missing(format!(
                "'{}' header must be '{} <token>'",
                config.header_name, config.header_type
            ))
        })?;
        if !scheme.eq_ignore_ascii_case(&config.header_type) {
            return Err(AuthError::missing(format!(
                "'{}' header must use the '{}' scheme",
                config.header_name, config.header_type
            )));
        }
        rest.trim()
    };

    if token.is_empty() {
        return Err(AuthError::missing(format!(
            "'{}' header carries no token",
            config.header_name
        )));
    }

    Ok(RequestToken::new(token, TokenLocation::Headers, token_type))
}

fn from_cookies(
    request: &RequestView<'_>,
    config: &AuthConfig,
    token_type: TokenType,
) -> Result<RequestToken, AuthError> {
    let cookie_name = config.cookie_name(token_type);
    let token = cookie_value(request.headers, cookie_name)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AuthError::missing(format!("missing cookie '{cookie_name}'")))?;

    let mut found = RequestToken::new(token, TokenLocation::Cookies, token_type);

    if config.cookie_csrf_protect && config.is_csrf_method(request.method) {
        let header_name = config.csrf_header_name(token_type);
        let from_header = request
            .header(header_name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let csrf = match from_header {
            Some(v) => Some(v),
            None if config.csrf_check_form => request
                .form_field(config.csrf_field_name(token_type))
                .filter(|v| !v.is_empty()),
            None => None,
        };

        let csrf = csrf.ok_or_else(|| {
            AuthError::MissingCsrfToken(format!("missing CSRF header '{header_name}'"))
        })?;
        found = found.with_csrf(csrf);
    }

    Ok(found)
}

fn from_query(
    request: &RequestView<'_>,
    config: &AuthConfig,
    token_type: TokenType,
) -> Result<RequestToken, AuthError> {
    let name = &config.query_string_name;
    let token = request
        .query_param(name)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AuthError::missing(format!("missing query parameter '{name}'")))?;

    Ok(RequestToken::new(token, TokenLocation::Query, token_type))
}

fn from_json(
    request: &RequestView<'_>,
    config: &AuthConfig,
    token_type: TokenType,
) -> Result<RequestToken, AuthError> {
    if !request.content_type_is(JSON_CONTENT_TYPE) {
        return Err(AuthError::missing(format!(
            "invalid content-type, must be '{JSON_CONTENT_TYPE}'"
        )));
    }

    let body = request
        .body
        .ok_or_else(|| AuthError::missing("request body is not available"))?;
    let json: Value = serde_json::from_slice(body)
        .map_err(|e| AuthError::missing(format!("invalid JSON body: {e}")))?;

    let key = config.json_key_for(token_type);
    match json.get(key) {
        Some(Value::String(token)) if !token.is_empty() => {
            Ok(RequestToken::new(token.clone(), TokenLocation::Json, token_type))
        }
        Some(Value::String(_)) | None => {
            Err(AuthError::missing(format!("missing '{key}' in JSON body")))
        }
        Some(_) => Err(AuthError::missing(format!("'{key}' in JSON body must be a string"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    struct Req {
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Option<Vec<u8>>,
    }

    impl Req {
        fn new(method: Method, uri: &str) -> Self {
            Self {
                method,
                uri: uri.parse().unwrap(),
                headers: HeaderMap::new(),
                body: None,
            }
        }

        fn header(mut self, name: &'static str, value: &str) -> Self {
            self.headers.append(name, HeaderValue::from_str(value).unwrap());
            self
        }

        fn body(mut self, body: &str) -> Self {
            self.body = Some(body.as_bytes().to_vec());
            self
        }

        fn view(&self) -> RequestView<'_> {
            let view = RequestView::new(&self.method, &self.uri, &self.headers);
            match &self.body {
                Some(b) => view.with_body(b),
                None => view,
            }
        }
    }

    fn config(locations: Vec<TokenLocation>) -> AuthConfig {
        AuthConfig {
            token_location: locations,
            ..AuthConfig::with_secret("s")
        }
    }

    #[test]
    fn header_strips_scheme() {
        let req = Req::new(Method::GET, "/").header("authorization", "Bearer abc.def.ghi");
        let token = get_token_from_request(
            &req.view(),
            &config(vec![TokenLocation::Headers]),
            TokenType::Access,
            None,
        )
        .unwrap();
        assert_eq!(token.token, "abc.def.ghi");
        assert_eq!(token.location, TokenLocation::Headers);
        assert_eq!(token.csrf, None);
    }

    #[test]
    fn header_without_scheme_uses_raw_value() {
        let mut cfg = config(vec![TokenLocation::Headers]);
        cfg.header_name = "X-Api-Token".into();
        cfg.header_type = String::new();
        let req = Req::new(Method::GET, "/").header("x-api-token", "raw-token");
        let token = get_token_from_request(&req.view(), &cfg, TokenType::Access, None).unwrap();
        assert_eq!(token.token, "raw-token");
    }

    #[test]
    fn header_missing_or_wrong_scheme() {
        let cfg = config(vec![TokenLocation::Headers]);
        let req = Req::new(Method::GET, "/");
        let err = get_token_from_request(&req.view(), &cfg, TokenType::Access, None).unwrap_err();
        assert!(matches!(err, AuthError::MissingToken(_)));

        let req = Req::new(Method::GET, "/").header("authorization", "Basic dXNlcg==");
        let err = get_token_from_request(&req.view(), &cfg, TokenType::Access, None).unwrap_err();
        assert!(err.to_string().contains("Bearer"));
    }

    #[test]
    fn cookie_picks_name_by_type() {
        let cfg = config(vec![TokenLocation::Cookies]);
        let req = Req::new(Method::GET, "/")
            .header("cookie", "access_token_cookie=acc; refresh_token_cookie=ref");

        let access = get_token_from_request(&req.view(), &cfg, TokenType::Access, None).unwrap();
        assert_eq!(access.token, "acc");
        assert_eq!(access.token_type, TokenType::Access);

        let refresh = get_token_from_request(&req.view(), &cfg, TokenType::Refresh, None).unwrap();
        assert_eq!(refresh.token, "ref");
        assert_eq!(refresh.token_type, TokenType::Refresh);
        assert_eq!(refresh.location, TokenLocation::Cookies);
    }

    #[test]
    fn cookie_csrf_only_read_for_csrf_methods() {
        let cfg = config(vec![TokenLocation::Cookies]);

        let get = Req::new(Method::GET, "/").header("cookie", "access_token_cookie=acc");
        let token = get_token_from_request(&get.view(), &cfg, TokenType::Access, None).unwrap();
        assert_eq!(token.csrf, None);

        let post = Req::new(Method::POST, "/").header("cookie", "access_token_cookie=acc");
        let err = get_token_from_request(&post.view(), &cfg, TokenType::Access, None).unwrap_err();
        assert!(matches!(err, AuthError::MissingCsrfToken(_)));
        assert!(err.is_missing_token());

        let post = Req::new(Method::POST, "/")
            .header("cookie", "access_token_cookie=acc")
            .header("x-csrf-token", "c1");
        let token = get_token_from_request(&post.view(), &cfg, TokenType::Access, None).unwrap();
        assert_eq!(token.csrf.as_deref(), Some("c1"));
    }

    #[test]
    fn cookie_csrf_falls_back_to_form_field() {
        let mut cfg = config(vec![TokenLocation::Cookies]);
        cfg.csrf_check_form = true;
        let req = Req::new(Method::POST, "/")
            .header("cookie", "access_token_cookie=acc")
            .header("content-type", FORM_CONTENT_TYPE)
            .body("name=x&csrf_token=form-csrf");
        let token = get_token_from_request(&req.view(), &cfg, TokenType::Access, None).unwrap();
        assert_eq!(token.csrf.as_deref(), Some("form-csrf"));
    }

    #[test]
    fn cookie_csrf_disabled_skips_lookup() {
        let mut cfg = config(vec![TokenLocation::Cookies]);
        cfg.cookie_csrf_protect = false;
        let req = Req::new(Method::POST, "/").header("cookie", "access_token_cookie=acc");
        let token = get_token_from_request(&req.view(), &cfg, TokenType::Access, None).unwrap();
        assert_eq!(token.csrf, None);
    }

    #[test]
    fn query_parameter() {
        let cfg = config(vec![TokenLocation::Query]);
        let req = Req::new(Method::GET, "/ws?foo=1&token=q.t.k");
        let token = get_token_from_request(&req.view(), &cfg, TokenType::Access, None).unwrap();
        assert_eq!(token.token, "q.t.k");
        assert_eq!(token.location, TokenLocation::Query);

        let req = Req::new(Method::GET, "/ws?foo=1");
        assert!(get_token_from_request(&req.view(), &cfg, TokenType::Access, None).is_err());
    }

    #[test]
    fn json_body_rules() {
        let cfg = config(vec![TokenLocation::Json]);

        let ok = Req::new(Method::POST, "/")
            .header("content-type", "application/json; charset=utf-8")
            .body(r#"{"refresh_token": "r.t.k"}"#);
        let token = get_token_from_request(&ok.view(), &cfg, TokenType::Refresh, None).unwrap();
        assert_eq!(token.token, "r.t.k");
        assert_eq!(token.location, TokenLocation::Json);

        let wrong_ct = Req::new(Method::POST, "/")
            .header("content-type", "text/plain")
            .body(r#"{"access_token": "a"}"#);
        assert!(get_token_from_request(&wrong_ct.view(), &cfg, TokenType::Access, None).is_err());

        let not_string = Req::new(Method::POST, "/")
            .header("content-type", JSON_CONTENT_TYPE)
            .body(r#"{"access_token": 42}"#);
        let err = get_token_from_request(&not_string.view(), &cfg, TokenType::Access, None)
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingToken(_)));

        let broken = Req::new(Method::POST, "/")
            .header("content-type", JSON_CONTENT_TYPE)
            .body("{not json");
        let err =
            get_token_from_request(&broken.view(), &cfg, TokenType::Access, None).unwrap_err();
        assert!(matches!(err, AuthError::MissingToken(_)));
    }

    #[test]
    fn first_location_wins_without_touching_later_ones() {
        let cfg = config(vec![TokenLocation::Headers, TokenLocation::Cookies]);
        // POST with a cookie but no CSRF header: the cookie would fail, but
        // the header hit short-circuits before it is examined.
        let req = Req::new(Method::POST, "/")
            .header("authorization", "Bearer header.token.value")
            .header("cookie", "access_token_cookie=tampered");
        let token = get_token_from_request(&req.view(), &cfg, TokenType::Access, None).unwrap();
        assert_eq!(token.location, TokenLocation::Headers);
        assert_eq!(token.token, "header.token.value");
    }

    #[test]
    fn override_locations_replace_config() {
        let cfg = config(vec![TokenLocation::Headers]);
        let req = Req::new(Method::GET, "/?token=from-query")
            .header("authorization", "Bearer from-header");
        let token = get_token_from_request(
            &req.view(),
            &cfg,
            TokenType::Access,
            Some(&[TokenLocation::Query]),
        )
        .unwrap();
        assert_eq!(token.token, "from-query");
    }

    #[test]
    fn aggregate_lists_every_location() {
        let cfg = config(vec![
            TokenLocation::Headers,
            TokenLocation::Cookies,
            TokenLocation::Query,
        ]);
        let req = Req::new(Method::GET, "/");
        match get_token_from_request(&req.view(), &cfg, TokenType::Access, None) {
            Err(AuthError::MissingToken(reasons)) => {
                assert_eq!(reasons.len(), 3);
                assert!(reasons[0].contains("Authorization"));
                assert!(reasons[1].contains("access_token_cookie"));
                assert!(reasons[2].contains("token"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn needs_body_only_for_body_locations() {
        let cfg = config(vec![TokenLocation::Headers]);
        assert!(!needs_body(&cfg, &[TokenLocation::Headers, TokenLocation::Cookies]));
        assert!(needs_body(&cfg, &[TokenLocation::Json]));

        let mut form = cfg.clone();
        form.csrf_check_form = true;
        assert!(needs_body(&form, &[TokenLocation::Cookies]));
    }
}
