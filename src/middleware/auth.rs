use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::{
    errors::AppError,
    handlers::AppState,
};

/// Identity proven by a `Bearer` session credential. Resolving it only checks
/// the credential's signature and expiry.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub identity: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| AppError::InvalidCredential("Authentication required".to_string()))?;

        let identity = state.jwt.verify(token)?;
        Ok(AuthenticatedUser { identity })
    }
}

fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token.trim())
    } else {
        None
    }
}
