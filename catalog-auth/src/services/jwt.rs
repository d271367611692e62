use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::fs;

use crate::config::{JwtConfig, SigningAlgorithm};
use crate::models::{TokenClaims, TokenKind};
use crate::services::AuthError;

/// Signs and verifies tokens. Holds only the key material, which is
/// read-only after startup, so clones are shared freely across requests.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    issuer: String,
}

#[derive(Deserialize)]
struct UnverifiedExpiry {
    exp: i64,
}

impl JwtService {
    /// Build from configuration: an HMAC secret for HS256, or PEM key files for RS256.
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        match config.algorithm {
            SigningAlgorithm::Hs256 => {
                let secret = config
                    .secret
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("JWT_SECRET is required for HS256"))?;
                tracing::info!("JWT service initialized with HS256 secret");
                Ok(Self::from_secret(
                    secret.expose_secret().as_bytes(),
                    &config.issuer,
                ))
            }
            SigningAlgorithm::Rs256 => {
                let private_key_path = config
                    .private_key_path
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("JWT_PRIVATE_KEY_PATH is required for RS256"))?;
                let public_key_path = config
                    .public_key_path
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("JWT_PUBLIC_KEY_PATH is required for RS256"))?;

                let private_key_pem = fs::read_to_string(private_key_path).map_err(|e| {
                    anyhow::anyhow!(
                        "Failed to read private key from {}: {}",
                        private_key_path,
                        e
                    )
                })?;
                let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
                    .map_err(|e| anyhow::anyhow!("Failed to parse private key: {}", e))?;

                let public_key_pem = fs::read_to_string(public_key_path).map_err(|e| {
                    anyhow::anyhow!(
                        "Failed to read public key from {}: {}",
                        public_key_path,
                        e
                    )
                })?;
                let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
                    .map_err(|e| anyhow::anyhow!("Failed to parse public key: {}", e))?;

                tracing::info!("JWT service initialized with RS256 keys");

                Ok(Self {
                    encoding_key,
                    decoding_key,
                    algorithm: Algorithm::RS256,
                    issuer: config.issuer.clone(),
                })
            }
        }
    }

    pub fn from_secret(secret: &[u8], issuer: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
            issuer: issuer.to_string(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn encode(&self, claims: &TokenClaims) -> Result<String, AuthError> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Failed to encode token: {}", e)))
    }

    /// Full verification: expiry, signature, issuer and token kind.
    ///
    /// Expiry is decided first from the unverified payload, so an expired
    /// token reports `Expired` whatever state its signature is in.
    pub fn decode(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, AuthError> {
        let exp = peek_expiry(token)?;
        if exp < chrono::Utc::now().timestamp() {
            return Err(AuthError::Expired);
        }
        self.verify(token, kind, true)
    }

    /// Verification that tolerates expiry. Used by logout, where an expired
    /// but authentic refresh token still identifies a family worth revoking.
    pub fn decode_ignoring_expiry(
        &self,
        token: &str,
        kind: TokenKind,
    ) -> Result<TokenClaims, AuthError> {
        self.verify(token, kind, false)
    }

    fn verify(&self, token: &str, kind: TokenKind, check_exp: bool) -> Result<TokenClaims, AuthError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.validate_exp = check_exp;
        validation.validate_aud = false;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "sub", "iss"]);

        let claims = decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map_err(classify)?
            .claims;

        if claims.typ != kind {
            return Err(AuthError::Malformed);
        }

        Ok(claims)
    }
}

fn peek_expiry(token: &str) -> Result<i64, AuthError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<UnverifiedExpiry>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims.exp)
        .map_err(|_| AuthError::Malformed)
}

fn classify(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthError::InvalidSignature,
        _ => AuthError::Malformed,
    }
}
