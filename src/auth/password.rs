use bcrypt::{hash, verify, DEFAULT_COST};
use crate::errors::{AppError, Result};

// bcrypt only reads the first 72 bytes of its input.
const MAX_PASSWORD_BYTES: usize = 72;

pub struct PasswordService;

impl PasswordService {
    pub fn hash_password(password: &str) -> Result<String> {
        Self::hash_with_cost(password, DEFAULT_COST)
    }

    pub fn hash_with_cost(password: &str, cost: u32) -> Result<String> {
        hash(password, cost)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))
    }

    pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
        verify(password, hash)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to verify password: {}", e)))
    }

    pub fn validate_password(password: &str) -> Result<()> {
        if password.is_empty() {
            return Err(AppError::Validation("Password is required".to_string()));
        }

        if password.len() > MAX_PASSWORD_BYTES {
            return Err(AppError::Validation(format!(
                "Password must be at most {} bytes long",
                MAX_PASSWORD_BYTES
            )));
        }

        Ok(())
    }
}
