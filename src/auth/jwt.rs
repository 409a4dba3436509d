use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind as JwtErrorKind, Algorithm, DecodingKey, EncodingKey,
    Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, Result};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // account identity (email)
    pub exp: i64,
    pub iat: i64,
}

/// Issues and verifies stateless session credentials. Verification never
/// touches storage; validity depends only on the signature and `exp`.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_duration: Duration,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self::with_duration(secret, Duration::days(7))
    }

    pub fn with_duration(secret: &str, session_duration: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            session_duration,
        }
    }

    pub fn issue(&self, identity: &str) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.to_string(),
            exp: (now + self.session_duration).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to sign credential: {}", e)))
    }

    /// Returns the identity bound into the credential.
    pub fn verify(&self, token: &str) -> Result<String> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                JwtErrorKind::ExpiredSignature => AppError::Expired,
                _ => AppError::InvalidCredential(e.to_string()),
            }
        })?;

        if token_data.claims.sub.is_empty() {
            return Err(AppError::InvalidCredential("empty subject".to_string()));
        }

        Ok(token_data.claims.sub)
    }
}
