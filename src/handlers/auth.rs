use axum::{extract::State, http::StatusCode};

use crate::{
    auth::PasswordService,
    errors::{AppError, Result},
    handlers::{AppState, ValidJson},
    models::{CredentialsRequest, Envelope, LoginResponse, RegisterResponse},
};

#[utoipa::path(
    post,
    path = "/register",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 409, description = "Identity already registered"),
        (status = 400, description = "Missing email or password")
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<CredentialsRequest>,
) -> Result<(StatusCode, Envelope<RegisterResponse>)> {
    if request.email.trim().is_empty() {
        return Err(AppError::Validation("Email is required".to_string()));
    }
    PasswordService::validate_password(&request.password)?;

    // Cheap early exit; `create_account` is the authoritative check.
    if state.store.find_account(&request.email).await?.is_some() {
        return Err(AppError::DuplicateIdentity(request.email));
    }

    let cost = state.config.bcrypt_cost;
    let password = request.password;
    let password_hash =
        tokio::task::spawn_blocking(move || PasswordService::hash_with_cost(&password, cost))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Hashing task failed: {}", e)))??;

    let account = state
        .store
        .create_account(&request.email, &password_hash)
        .await?;

    tracing::info!(identity = %account.identity, "Registered account");

    Ok((
        StatusCode::CREATED,
        Envelope::ok(RegisterResponse {
            email: account.identity,
            premium: account.premium,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Session credential issued", body = LoginResponse),
        (status = 404, description = "No such account"),
        (status = 401, description = "Wrong password")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<CredentialsRequest>,
) -> Result<Envelope<LoginResponse>> {
    let account = state
        .store
        .find_account(&request.email)
        .await?
        .ok_or_else(|| AppError::NotFound(request.email.clone()))?;

    let password = request.password;
    let hash = account.credential_hash.clone();
    let matches =
        tokio::task::spawn_blocking(move || PasswordService::verify_password(&password, &hash))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Hashing task failed: {}", e)))??;

    if !matches {
        tracing::debug!(identity = %account.identity, "Login with wrong password");
        return Err(AppError::WrongSecret);
    }

    let token = state.jwt.issue(&account.identity)?;

    Ok(Envelope::ok(LoginResponse {
        token,
        premium: account.premium,
    }))
}
