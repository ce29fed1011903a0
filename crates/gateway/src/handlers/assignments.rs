//! Reviewer allocation endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use super::{list, ListResponse};
use crate::AppState;
use papertrail_common::{
    auth::{AuthContext, Role},
    db::models::Assignment,
    db::AssignmentView,
    errors::Result,
};

#[derive(Debug, Deserialize)]
pub struct CreateAssignmentRequest {
    pub paper_id: i32,
    pub reviewer_id: i32,
}

/// Assign a paper to a reviewer through the allocator
pub async fn create_assignment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CreateAssignmentRequest>,
) -> Result<(StatusCode, Json<Assignment>)> {
    auth.require_role(Role::Admin)?;

    let assignment = state
        .allocator
        .assign(request.paper_id, request.reviewer_id)
        .await?;

    Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn list_assignments(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ListResponse<AssignmentView>>> {
    auth.require_role(Role::Admin)?;
    Ok(list(state.repo.list_assignments().await?))
}
