//! Timed, tamper-evident serialization of the session cookie value.
//!
//! Wire format: `b64(json) "." b64(timestamp) "." b64(hmac)` where the MAC
//! covers the first two segments and every segment is URL-safe base64
//! without padding. The timestamp is big-endian seconds since the epoch.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::services::session::error::{SessionError, SignatureError};

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_SALT: &str = "tokengate.session";

#[derive(Clone)]
pub struct SignatureSerializer {
    mac: HmacSha256,
    max_age: i64,
}

impl std::fmt::Debug for SignatureSerializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureSerializer")
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

impl SignatureSerializer {
    /// `max_age <= 0` never expires.
    pub fn new(secret: &str, max_age: i64) -> Result<Self, SessionError> {
        Self::with_salt(secret, DEFAULT_SALT, max_age)
    }

    pub fn with_salt(secret: &str, salt: &str, max_age: i64) -> Result<Self, SessionError> {
        if secret.is_empty() {
            return Err(SessionError::Configuration(
                "session secret key must not be empty".to_string(),
            ));
        }

        let mut derive = Sha256::new();
        derive.update(salt.as_bytes());
        derive.update(b"signer");
        derive.update(secret.as_bytes());
        let key = derive.finalize();

        let mac = HmacSha256::new_from_slice(&key)
            .map_err(|e| SessionError::Configuration(e.to_string()))?;

        Ok(Self { mac, max_age })
    }

    pub fn encode(&self, data: &Map<String, Value>) -> Result<String, SessionError> {
        self.encode_at(data, Utc::now().timestamp())
    }

    pub fn encode_at(&self, data: &Map<String, Value>, now: i64) -> Result<String, SessionError> {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(data)?);
        let timestamp = URL_SAFE_NO_PAD.encode(now.to_be_bytes());
        let signed = format!("{payload}.{timestamp}");

        let mut mac = self.mac.clone();
        mac.update(signed.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signed}.{signature}"))
    }

    pub fn decode(&self, token: Option<&str>) -> Result<Map<String, Value>, SignatureError> {
        self.decode_at(token, Utc::now().timestamp())
    }

    pub fn decode_at(
        &self,
        token: Option<&str>,
        now: i64,
    ) -> Result<Map<String, Value>, SignatureError> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(SignatureError::NoToken)?;

        let (signed, signature) = token.rsplit_once('.').ok_or(SignatureError::BadSignature)?;
        let (payload, timestamp) = signed.split_once('.').ok_or(SignatureError::BadSignature)?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SignatureError::BadSignature)?;
        let mut mac = self.mac.clone();
        mac.update(signed.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| SignatureError::BadSignature)?;

        let issued_at: [u8; 8] = URL_SAFE_NO_PAD
            .decode(timestamp)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or(SignatureError::BadSignature)?;
        let issued_at = i64::from_be_bytes(issued_at);

        if self.max_age > 0 && now.saturating_sub(issued_at) > self.max_age {
            return Err(SignatureError::Expired);
        }

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| SignatureError::BadSignature)?;
        serde_json::from_slice(&payload).map_err(|_| SignatureError::BadSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("session".into(), Value::from("abc123"));
        m
    }

    #[test]
    fn decodes_what_it_encodes() {
        let s = SignatureSerializer::new("secret", 60).unwrap();
        let token = s.encode(&data()).unwrap();
        assert_eq!(token.split('.').count(), 3);
        assert_eq!(s.decode(Some(&token)).unwrap(), data());
    }

    #[test]
    fn missing_token() {
        let s = SignatureSerializer::new("secret", 60).unwrap();
        assert_eq!(s.decode(None), Err(SignatureError::NoToken));
        assert_eq!(s.decode(Some("")), Err(SignatureError::NoToken));
    }

    #[test]
    fn tampering_is_detected() {
        let s = SignatureSerializer::new("secret", 60).unwrap();
        let token = s.encode(&data()).unwrap();

        let mut bytes = token.into_bytes();
        bytes[2] = if bytes[2] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();
        assert_eq!(s.decode(Some(&tampered)), Err(SignatureError::BadSignature));

        assert_eq!(s.decode(Some("no-dots")), Err(SignatureError::BadSignature));
    }

    #[test]
    fn other_secret_is_a_bad_signature() {
        let a = SignatureSerializer::new("secret-a", 60).unwrap();
        let b = SignatureSerializer::new("secret-b", 60).unwrap();
        let token = a.encode(&data()).unwrap();
        assert_eq!(b.decode(Some(&token)), Err(SignatureError::BadSignature));
    }

    #[test]
    fn expiry_follows_max_age() {
        let s = SignatureSerializer::new("secret", 60).unwrap();
        let token = s.encode_at(&data(), 1_000).unwrap();
        assert!(s.decode_at(Some(&token), 1_060).is_ok());
        assert_eq!(s.decode_at(Some(&token), 1_061), Err(SignatureError::Expired));

        let forever = SignatureSerializer::new("secret", 0).unwrap();
        let token = forever.encode_at(&data(), 1_000).unwrap();
        assert!(forever.decode_at(Some(&token), 1_000_000_000).is_ok());
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(
            SignatureSerializer::new("", 60),
            Err(SessionError::Configuration(_))
        ));
    }
}
