use crate::services::auth::SameSite;

/// Signed session cookie settings.
#[derive(Clone)]
pub struct SessionConfig {
    pub secret_key: String,
    pub cookie_name: String,
    /// Seconds. `0` disables signature expiry and issues a browser-session cookie.
    pub max_age: i64,
    pub https_only: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub path: String,
    pub domain: Option<String>,
    /// Requests carrying this header bypass sessions entirely. A value of `"*"`
    /// matches any value.
    pub skip_header: Option<(String, String)>,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("cookie_name", &self.cookie_name)
            .field("max_age", &self.max_age)
            .field("https_only", &self.https_only)
            .field("skip_header", &self.skip_header)
            .finish_non_exhaustive()
    }
}

impl SessionConfig {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            cookie_name: "session".to_string(),
            max_age: 14 * 24 * 60 * 60,
            https_only: false,
            http_only: true,
            same_site: SameSite::Lax,
            path: "/".to_string(),
            domain: None,
            skip_header: None,
        }
    }

    pub fn skip_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.skip_header = Some((name.into(), value.into()));
        self
    }
}
