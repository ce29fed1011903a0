//! Account sign-up and login

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use papertrail_common::{
    auth::{hash_password, verify_password, Role},
    errors::{AppError, Result},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CredentialsRequest {
    #[validate(length(min = 3, max = 150))]
    pub username: String,

    #[validate(length(min = 8, max = 256))]
    pub password: String,
}

#[derive(Serialize)]
pub struct SignupResponse {
    pub id: i32,
    pub username: String,
    pub role: Role,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub role: Role,
}

/// Create an account for the role in the path
pub async fn signup(
    State(state): State<AppState>,
    Path(role): Path<String>,
    Json(request): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<SignupResponse>)> {
    let role = Role::parse(&role)?;
    request.validate()?;

    let password_hash = hash_password(&request.password)?;
    let account = state
        .repo
        .create_account(request.username.trim().to_string(), role.as_str(), password_hash)
        .await?;

    tracing::info!(account_id = account.id, role = %role, "Account created");

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            id: account.id,
            username: account.username,
            role,
        }),
    ))
}

/// Exchange credentials for a bearer token
pub async fn login(
    State(state): State<AppState>,
    Path(role): Path<String>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<TokenResponse>> {
    let role = Role::parse(&role)?;

    let account = state
        .repo
        .find_account(role.as_str(), request.username.trim())
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(&request.password, &account.password_hash) {
        tracing::warn!(role = %role, "Failed login attempt");
        return Err(AppError::InvalidCredentials);
    }

    let access_token = state.jwt.generate_token(account.id, &account.username, role)?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer",
        expires_in: state.jwt.expiration_secs(),
        role,
    }))
}
