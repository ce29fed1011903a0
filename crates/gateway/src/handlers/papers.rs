//! Paper listing, lookup and status changes

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::{list, AccessCodeRequest, ListResponse};
use crate::AppState;
use papertrail_common::{
    auth::{AuthContext, Role},
    db::models::{Paper, PaperStatus},
    db::PaperWithAuthor,
    errors::{AppError, Result},
};

#[derive(Debug, Deserialize)]
pub struct ListPapersQuery {
    /// Status label, e.g. "Pending Review"
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

fn parse_status(value: &str) -> Result<PaperStatus> {
    PaperStatus::parse(value).ok_or_else(|| AppError::InvalidFormat {
        message: format!(
            "Unknown status '{}'; expected one of: Pending Review, Assigned, Reviewed, Scheduled",
            value
        ),
    })
}

/// All papers, optionally filtered by status
pub async fn list_papers(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<ListPapersQuery>,
) -> Result<Json<ListResponse<Paper>>> {
    auth.require_role(Role::Admin)?;

    let status = query.status.as_deref().map(parse_status).transpose()?;
    let papers = state.repo.list_papers(status).await?;

    Ok(list(papers))
}

/// Papers submitted under an access code
pub async fn lookup_papers(
    State(state): State<AppState>,
    _auth: AuthContext,
    Json(request): Json<AccessCodeRequest>,
) -> Result<Json<ListResponse<PaperWithAuthor>>> {
    let code = request.code()?;
    let papers = state.repo.papers_by_access_code(code).await?;

    if papers.is_empty() {
        return Err(AppError::NotFound {
            resource_type: "Papers for access code".to_string(),
            id: code.to_string(),
        });
    }

    Ok(list(papers))
}

/// Explicit administrative status change
pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(paper_id): Path<i32>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Paper>> {
    auth.require_role(Role::Admin)?;

    let status = parse_status(request.status.trim())?;
    let paper = state.repo.update_paper_status(paper_id, status).await?;

    tracing::info!(paper_id, status = %status, admin = %auth.username, "Paper status updated");

    Ok(Json(paper))
}
