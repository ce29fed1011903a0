//! Contact form

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use validator::Validate;

use super::{list, ListResponse};
use crate::AppState;
use papertrail_common::{
    auth::{AuthContext, Role},
    db::models::ContactMessage,
    errors::Result,
};

#[derive(Debug, Deserialize, Validate)]
pub struct ContactRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1, max = 5000))]
    pub message: String,
}

/// Public contact form submission
pub async fn create_message(
    State(state): State<AppState>,
    Json(request): Json<ContactRequest>,
) -> Result<(StatusCode, Json<ContactMessage>)> {
    let request = ContactRequest {
        name: request.name.trim().to_string(),
        email: request.email.trim().to_string(),
        message: request.message.trim().to_string(),
    };
    request.validate()?;

    let message = state
        .repo
        .create_contact_message(request.name, request.email, request.message)
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn list_messages(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ListResponse<ContactMessage>>> {
    auth.require_role(Role::Admin)?;
    Ok(list(state.repo.list_contact_messages().await?))
}
