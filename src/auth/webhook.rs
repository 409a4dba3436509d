use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::errors::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Checks payment-provider callbacks: hex HMAC-SHA256 of the raw body.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
}

impl WebhookVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.to_string(),
        }
    }

    pub fn sign(&self, body: &[u8]) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid webhook secret: {}", e)))?;
        mac.update(body);
        Ok(format!("{:x}", mac.finalize().into_bytes()))
    }

    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<()> {
        // An unset secret would make every signature computable by anyone.
        if self.secret.is_empty() {
            tracing::error!("Webhook secret is not configured; rejecting callback");
            return Err(AppError::InvalidSignature);
        }

        let supplied = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(AppError::InvalidSignature)?;

        let expected = self.sign(body)?;
        let matches: bool = expected
            .as_bytes()
            .ct_eq(supplied.to_ascii_lowercase().as_bytes())
            .into();

        if matches {
            Ok(())
        } else {
            Err(AppError::InvalidSignature)
        }
    }
}
