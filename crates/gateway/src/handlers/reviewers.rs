//! Reviewer registry and reviewer self-service lookups

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{list, AccessCodeRequest, ListResponse};
use crate::AppState;
use papertrail_common::{
    allocator::count_active_assignments,
    auth::{validate_access_code, AuthContext, Role},
    db::models::{AssignmentColumn, Paper, Reviewer},
    db::{AssignmentView, NewReviewer},
    errors::{AppError, Result},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewerRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[validate(length(min = 1, max = 255))]
    pub specialization: String,

    #[validate(range(min = 1, max = 100))]
    pub max_papers: i32,

    #[validate(email)]
    pub email: String,

    pub access_code: String,
}

/// Reviewer with current load
#[derive(Serialize)]
pub struct ReviewerSummary {
    #[serde(flatten)]
    pub reviewer: Reviewer,
    pub active_assignments: u64,
}

/// Register a reviewer (admin)
pub async fn create_reviewer(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CreateReviewerRequest>,
) -> Result<(StatusCode, Json<Reviewer>)> {
    auth.require_role(Role::Admin)?;
    request.validate()?;
    validate_access_code(request.access_code.trim())?;

    let reviewer = state
        .repo
        .create_reviewer(NewReviewer {
            name: request.name.trim().to_string(),
            specialization: request.specialization.trim().to_string(),
            max_papers: request.max_papers,
            email: request.email.trim().to_string(),
            access_code: request.access_code.trim().to_string(),
        })
        .await?;

    tracing::info!(reviewer_id = reviewer.id, capacity = reviewer.max_papers, "Reviewer registered");

    Ok((StatusCode::CREATED, Json(reviewer)))
}

/// All reviewers with their assignment counts
pub async fn list_reviewers(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ListResponse<ReviewerSummary>>> {
    let reviewers = state.repo.list_reviewers().await?;

    let mut summaries = Vec::with_capacity(reviewers.len());
    for reviewer in reviewers {
        let active_assignments =
            count_active_assignments(state.db.read(), AssignmentColumn::ReviewerId, reviewer.id)
                .await?;
        summaries.push(ReviewerSummary {
            reviewer,
            active_assignments,
        });
    }

    Ok(list(summaries))
}

async fn reviewer_for(state: &AppState, request: &AccessCodeRequest) -> Result<Reviewer> {
    let code = request.code()?;
    state
        .repo
        .find_reviewer_by_code(code)
        .await?
        .ok_or_else(|| AppError::ReviewerNotFound {
            id: format!("with access code {}", code),
        })
}

/// Assignments of the reviewer identified by the access code
pub async fn reviewer_assignments(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<AccessCodeRequest>,
) -> Result<Json<ListResponse<AssignmentView>>> {
    auth.require_role(Role::Reviewer)?;

    let reviewer = reviewer_for(&state, &request).await?;
    let assignments = state.repo.assignments_for_reviewer(reviewer.id).await?;

    Ok(list(assignments))
}

/// Papers assigned to the reviewer identified by the access code
pub async fn reviewer_papers(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<AccessCodeRequest>,
) -> Result<Json<ListResponse<Paper>>> {
    auth.require_role(Role::Reviewer)?;

    let reviewer = reviewer_for(&state, &request).await?;
    let papers = state.repo.papers_for_reviewer(reviewer.id).await?;

    Ok(list(papers))
}
