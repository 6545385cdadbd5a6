/*
 * Responsibility
 * - Token issuance / refresh / logout request and response DTOs
 */
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub sub: String,
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
    /// Also deliver the tokens as cookies.
    #[serde(default)]
    pub cookies: bool,
}

impl TokenRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.sub.trim().is_empty() {
            return Err("sub is required");
        }
        if let Some(scopes) = &self.scopes
            && scopes.iter().any(|s| s.trim().is_empty())
        {
            return Err("scopes cannot contain empty entries");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always "bearer"
    pub token_type: &'static str,
    /// Seconds until the access token expires; absent for non-expiring tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub revoked: bool,
}
