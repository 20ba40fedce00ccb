use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use thiserror::Error;

use crate::config::JwtConfig;
use crate::models::{Grant, SigningAlgorithm};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    Access,
    Refresh,
}

/// Claims for access tokens (short-lived)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user name)
    pub sub: String,
    /// Project the subject authenticated against
    pub project: String,
    pub grants: Vec<Grant>,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub typ: TokenUse,
}

/// Claims for refresh tokens (long-lived)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub project: String,
    /// Refresh session id
    pub sid: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub typ: TokenUse,
}

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("signing algorithm {0:?} is not configured")]
    AlgorithmUnavailable(SigningAlgorithm),

    #[error("failed to encode token: {0}")]
    Encode(#[source] jsonwebtoken::errors::Error),
}

#[derive(Clone)]
struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Signs and verifies tokens. HS256 is always available; RS256 only when a
/// key pair is configured.
#[derive(Clone)]
pub struct JwtService {
    hmac: KeyPair,
    rsa: Option<KeyPair>,
    issuer: String,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        let hmac = KeyPair {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
        };

        let rsa = match (&config.private_key_path, &config.public_key_path) {
            (Some(private_path), Some(public_path)) => {
                let private_key_pem = fs::read_to_string(private_path).map_err(|e| {
                    anyhow::anyhow!("Failed to read private key from {}: {}", private_path, e)
                })?;
                let public_key_pem = fs::read_to_string(public_path).map_err(|e| {
                    anyhow::anyhow!("Failed to read public key from {}: {}", public_path, e)
                })?;

                let encoding = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
                    .map_err(|e| anyhow::anyhow!("Failed to parse private key: {}", e))?;
                let decoding = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
                    .map_err(|e| anyhow::anyhow!("Failed to parse public key: {}", e))?;

                tracing::info!("RS256 signing keys loaded");
                Some(KeyPair { encoding, decoding })
            }
            (None, None) => None,
            _ => {
                return Err(anyhow::anyhow!(
                    "JWT_PRIVATE_KEY_PATH and JWT_PUBLIC_KEY_PATH must be set together"
                ))
            }
        };

        Ok(Self {
            hmac,
            rsa,
            issuer: config.issuer.clone(),
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn sign<C: Serialize>(
        &self,
        claims: &C,
        algorithm: SigningAlgorithm,
    ) -> Result<String, TokenError> {
        let (header, key) = match algorithm {
            SigningAlgorithm::HS256 => (Header::new(Algorithm::HS256), &self.hmac.encoding),
            SigningAlgorithm::RS256 => {
                let keys = self
                    .rsa
                    .as_ref()
                    .ok_or(TokenError::AlgorithmUnavailable(algorithm))?;
                (Header::new(Algorithm::RS256), &keys.encoding)
            }
        };
        encode(&header, claims, key).map_err(TokenError::Encode)
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let claims: AccessClaims = self.verify(token)?;
        if claims.typ != TokenUse::Access {
            return Err(TokenError::Invalid("not an access token".to_string()));
        }
        Ok(claims)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let claims: RefreshClaims = self.verify(token)?;
        if claims.typ != TokenUse::Refresh {
            return Err(TokenError::Invalid("not a refresh token".to_string()));
        }
        Ok(claims)
    }

    fn verify<C: DeserializeOwned>(&self, token: &str) -> Result<C, TokenError> {
        let header = decode_header(token).map_err(|e| TokenError::Invalid(e.to_string()))?;

        // The key is chosen by algorithm so an HS256 header can never be
        // checked against the RSA public key.
        let key = match header.alg {
            Algorithm::HS256 => &self.hmac.decoding,
            Algorithm::RS256 => match &self.rsa {
                Some(keys) => &keys.decoding,
                None => return Err(TokenError::AlgorithmUnavailable(SigningAlgorithm::RS256)),
            },
            other => {
                return Err(TokenError::Invalid(format!(
                    "unsupported algorithm {:?}",
                    other
                )))
            }
        };

        let mut validation = Validation::new(header.alg);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        decode::<C>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}
