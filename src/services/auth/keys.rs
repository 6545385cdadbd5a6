use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use tracing::warn;

use crate::services::auth::error::AuthError;
use crate::services::auth::settings::AuthConfig;

/// Key family an algorithm belongs to. Every decode algorithm must share the
/// signing algorithm's family because one key pair serves both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Hmac,
    Rsa,
    Ec,
    Ed,
}

impl KeyFamily {
    pub fn of(algorithm: Algorithm) -> Self {
        use Algorithm::*;
        match algorithm {
            HS256 | HS384 | HS512 => KeyFamily::Hmac,
            RS256 | RS384 | RS512 | PS256 | PS384 | PS512 => KeyFamily::Rsa,
            ES256 | ES384 => KeyFamily::Ec,
            EdDSA => KeyFamily::Ed,
        }
    }
}

/// Parsed signing + verification keys.
///
/// - Key material is intentionally not printable via Debug.
#[derive(Clone)]
pub struct KeyMaterial {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial").finish_non_exhaustive()
    }
}

impl KeyMaterial {
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let family = KeyFamily::of(config.algorithm);

        let (encoding, decoding) = match family {
            KeyFamily::Hmac => {
                let secret = config
                    .secret_key
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        AuthError::BadConfiguration(format!(
                            "secret_key is required for {:?}",
                            config.algorithm
                        ))
                    })?;
                return Ok(Self {
                    encoding: EncodingKey::from_secret(secret.as_bytes()),
                    decoding: DecodingKey::from_secret(secret.as_bytes()),
                });
            }
            KeyFamily::Rsa => {
                let (private_pem, public_pem) = pems(config)?;
                (
                    EncodingKey::from_rsa_pem(private_pem),
                    DecodingKey::from_rsa_pem(public_pem),
                )
            }
            KeyFamily::Ec => {
                let (private_pem, public_pem) = pems(config)?;
                (
                    EncodingKey::from_ec_pem(private_pem),
                    DecodingKey::from_ec_pem(public_pem),
                )
            }
            KeyFamily::Ed => {
                let (private_pem, public_pem) = pems(config)?;
                (
                    EncodingKey::from_ed_pem(private_pem),
                    DecodingKey::from_ed_pem(public_pem),
                )
            }
        };

        let encoding = encoding.map_err(|e| {
            warn!(error = %e, family = ?family, "failed to parse JWT private key PEM");
            AuthError::BadConfiguration(format!("invalid private key: {e}"))
        })?;
        let decoding = decoding.map_err(|e| {
            warn!(error = %e, family = ?family, "failed to parse JWT public key PEM");
            AuthError::BadConfiguration(format!("invalid public key: {e}"))
        })?;

        Ok(Self { encoding, decoding })
    }

    pub fn encoding(&self) -> &EncodingKey {
        &self.encoding
    }

    pub fn decoding(&self) -> &DecodingKey {
        &self.decoding
    }
}

fn pems(config: &AuthConfig) -> Result<(&[u8], &[u8]), AuthError> {
    let private_pem = config.private_key.as_deref().ok_or_else(|| {
        AuthError::BadConfiguration(format!(
            "private_key is required for {:?}",
            config.algorithm
        ))
    })?;
    let public_pem = config.public_key.as_deref().ok_or_else(|| {
        AuthError::BadConfiguration(format!(
            "public_key is required for {:?}",
            config.algorithm
        ))
    })?;
    Ok((private_pem.as_bytes(), public_pem.as_bytes()))
}
