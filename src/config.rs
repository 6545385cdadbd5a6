/*
 * Responsibility
 * - Load settings from environment variables (.env via dotenvy)
 * - Build the typed AuthConfig / SessionConfig / HttpSettings the app is assembled from
 * - Validation (startup fails on missing / unparsable values)
 */
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use axum::http::Method;
use chrono::Duration;
use jsonwebtoken::Algorithm;
use thiserror::Error;

use crate::services::auth::payload::OneOrMany;
use crate::services::auth::{AuthConfig, SameSite, TokenLocation};
use crate::services::session::SessionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Transport-level limits applied by `middleware::http`.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub body_limit_bytes: usize,
    pub timeout: StdDuration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            body_limit_bytes: 1024 * 1024,
            timeout: StdDuration::from_secs(30),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    /// Valkey/Redis URL. Without it, revocations and sessions live in process memory.
    pub redis_url: Option<String>,
    pub http: HttpSettings,
    pub auth: AuthConfig,
    pub session: SessionConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key -> value source (the process environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);

        let port: u16 = env.parse_or("PORT", 3000)?;
        let addr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(env.get("APP_ENV"));
        let redis_url = env.get("REDIS_URL");

        let http = HttpSettings {
            body_limit_bytes: env.parse_or("HTTP_BODY_LIMIT_BYTES", 1024 * 1024)?,
            timeout: StdDuration::from_secs(env.parse_or("HTTP_TIMEOUT_SECONDS", 30)?),
        };

        let auth = auth_config(&env, app_env)?;
        let session = session_config(&env, app_env)?;

        Ok(Self {
            addr,
            app_env,
            redis_url,
            http,
            auth,
            session,
        })
    }
}

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn parse<T: FromStr>(&self, key: &'static str) -> Result<Option<T>, ConfigError> {
        self.get(key)
            .map(|v| v.parse::<T>().map_err(|_| ConfigError::Invalid(key)))
            .transpose()
    }

    fn parse_or<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        Ok(self.parse(key)?.unwrap_or(default))
    }

    fn flag(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key).map(|v| v.to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) => match v.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::Invalid(key)),
            },
        }
    }

    fn list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
    }

    fn parsed_list<T: FromStr>(&self, key: &'static str) -> Result<Option<Vec<T>>, ConfigError> {
        self.list(key)
            .map(|items| {
                items
                    .iter()
                    .map(|s| s.parse::<T>().map_err(|_| ConfigError::Invalid(key)))
                    .collect()
            })
            .transpose()
    }

    /// PEMs are often stored on one line with literal `\n`.
    fn pem(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.replace("\\n", "\n"))
    }

    /// Seconds; `0` means "never expires".
    fn lifetime(
        &self,
        key: &'static str,
        default: Option<Duration>,
    ) -> Result<Option<Duration>, ConfigError> {
        match self.parse::<i64>(key)? {
            None => Ok(default),
            Some(0) => Ok(None),
            Some(s) if s > 0 => Ok(Some(Duration::seconds(s))),
            Some(_) => Err(ConfigError::Invalid(key)),
        }
    }
}

fn auth_config<F>(env: &Env<'_, F>, app_env: AppEnv) -> Result<AuthConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = AuthConfig::default();

    let algorithm: Algorithm = env.parse_or("JWT_ALGORITHM", defaults.algorithm)?;
    let decode_algorithms = env
        .parsed_list::<Algorithm>("JWT_DECODE_ALGORITHMS")?
        .unwrap_or_else(|| vec![algorithm]);

    let csrf_methods = match env.list("JWT_CSRF_METHODS") {
        None => defaults.csrf_methods.clone(),
        Some(methods) => methods
            .iter()
            .map(|m| Method::from_bytes(m.to_ascii_uppercase().as_bytes()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ConfigError::Invalid("JWT_CSRF_METHODS"))?,
    };

    let encode_audience = env.list("JWT_ENCODE_AUDIENCE").map(|mut aud| {
        if aud.len() == 1 {
            OneOrMany::One(aud.remove(0))
        } else {
            OneOrMany::Many(aud)
        }
    });

    let config = AuthConfig {
        algorithm,
        decode_algorithms,
        secret_key: env.get("JWT_SECRET_KEY"),
        private_key: env.pem("JWT_PRIVATE_KEY"),
        public_key: env.pem("JWT_PUBLIC_KEY"),

        encode_issuer: env.get("JWT_ENCODE_ISSUER"),
        encode_audience,
        decode_issuer: env.get("JWT_DECODE_ISSUER"),
        decode_audience: env.list("JWT_DECODE_AUDIENCE"),
        decode_leeway_seconds: env.parse_or("JWT_DECODE_LEEWAY", defaults.decode_leeway_seconds)?,
        identity_claim: env
            .get("JWT_IDENTITY_CLAIM")
            .unwrap_or(defaults.identity_claim),
        access_token_expires: env
            .lifetime("JWT_ACCESS_TOKEN_EXPIRES", defaults.access_token_expires)?,
        refresh_token_expires: env
            .lifetime("JWT_REFRESH_TOKEN_EXPIRES", defaults.refresh_token_expires)?,

        token_location: env
            .parsed_list::<TokenLocation>("JWT_TOKEN_LOCATION")?
            .unwrap_or(defaults.token_location),
        header_name: env.get("JWT_HEADER_NAME").unwrap_or(defaults.header_name),
        // an explicitly empty header type is meaningful (raw header value)
        header_type: (env.0)("JWT_HEADER_TYPE")
            .map(|v| v.trim().to_string())
            .unwrap_or(defaults.header_type),
        query_string_name: env
            .get("JWT_QUERY_STRING_NAME")
            .unwrap_or(defaults.query_string_name),
        json_key: env.get("JWT_JSON_KEY").unwrap_or(defaults.json_key),
        refresh_json_key: env
            .get("JWT_REFRESH_JSON_KEY")
            .unwrap_or(defaults.refresh_json_key),

        access_cookie_name: env
            .get("JWT_ACCESS_COOKIE_NAME")
            .unwrap_or(defaults.access_cookie_name),
        refresh_cookie_name: env
            .get("JWT_REFRESH_COOKIE_NAME")
            .unwrap_or(defaults.refresh_cookie_name),
        access_cookie_path: env
            .get("JWT_ACCESS_COOKIE_PATH")
            .unwrap_or(defaults.access_cookie_path),
        refresh_cookie_path: env
            .get("JWT_REFRESH_COOKIE_PATH")
            .unwrap_or(defaults.refresh_cookie_path),
        cookie_domain: env.get("JWT_COOKIE_DOMAIN"),
        cookie_secure: env.flag("JWT_COOKIE_SECURE", app_env.is_production())?,
        cookie_samesite: env.parse_or::<SameSite>("JWT_COOKIE_SAMESITE", defaults.cookie_samesite)?,
        cookie_max_age: env.parse("JWT_COOKIE_MAX_AGE")?,

        cookie_csrf_protect: env.flag("JWT_COOKIE_CSRF_PROTECT", defaults.cookie_csrf_protect)?,
        csrf_in_cookies: env.flag("JWT_CSRF_IN_COOKIES", defaults.csrf_in_cookies)?,
        access_csrf_cookie_name: env
            .get("JWT_ACCESS_CSRF_COOKIE_NAME")
            .unwrap_or(defaults.access_csrf_cookie_name),
        refresh_csrf_cookie_name: env
            .get("JWT_REFRESH_CSRF_COOKIE_NAME")
            .unwrap_or(defaults.refresh_csrf_cookie_name),
        access_csrf_cookie_path: env
            .get("JWT_ACCESS_CSRF_COOKIE_PATH")
            .unwrap_or(defaults.access_csrf_cookie_path),
        refresh_csrf_cookie_path: env
            .get("JWT_REFRESH_CSRF_COOKIE_PATH")
            .unwrap_or(defaults.refresh_csrf_cookie_path),
        access_csrf_header_name: env
            .get("JWT_ACCESS_CSRF_HEADER_NAME")
            .unwrap_or(defaults.access_csrf_header_name),
        refresh_csrf_header_name: env
            .get("JWT_REFRESH_CSRF_HEADER_NAME")
            .unwrap_or(defaults.refresh_csrf_header_name),
        csrf_check_form: env.flag("JWT_CSRF_CHECK_FORM", defaults.csrf_check_form)?,
        access_csrf_field_name: env
            .get("JWT_ACCESS_CSRF_FIELD_NAME")
            .unwrap_or(defaults.access_csrf_field_name),
        refresh_csrf_field_name: env
            .get("JWT_REFRESH_CSRF_FIELD_NAME")
            .unwrap_or(defaults.refresh_csrf_field_name),
        csrf_methods,

        implicit_refresh: env.flag("JWT_IMPLICIT_REFRESH", defaults.implicit_refresh)?,
        implicit_refresh_delta: env
            .parse::<i64>("JWT_IMPLICIT_REFRESH_DELTA")?
            .map(Duration::seconds)
            .unwrap_or(defaults.implicit_refresh_delta),
    };

    Ok(config)
}

fn session_config<F>(env: &Env<'_, F>, app_env: AppEnv) -> Result<SessionConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = SessionConfig::new(env.required("SESSION_SECRET_KEY")?);

    if let Some(name) = env.get("SESSION_COOKIE_NAME") {
        config.cookie_name = name;
    }
    config.max_age = env.parse_or("SESSION_MAX_AGE", config.max_age)?;
    config.https_only = env.flag("SESSION_HTTPS_ONLY", app_env.is_production())?;
    config.same_site = env.parse_or("SESSION_SAMESITE", config.same_site)?;
    config.domain = env.get("SESSION_COOKIE_DOMAIN");

    // "<header>:<value>", value "*" means any value
    if let Some(raw) = env.get("SESSION_SKIP_HEADER") {
        let (name, value) = raw
            .split_once(':')
            .map(|(n, v)| (n.trim(), v.trim()))
            .filter(|(n, v)| !n.is_empty() && !v.is_empty())
            .ok_or(ConfigError::Invalid("SESSION_SKIP_HEADER"))?;
        config = config.skip_header(name, value);
    }

    Ok(config)
}
