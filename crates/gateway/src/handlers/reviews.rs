//! Review intake

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use validator::Validate;

use super::{list, ListResponse};
use crate::AppState;
use papertrail_common::{
    auth::{AuthContext, Role},
    db::models::Review,
    db::ReviewView,
    errors::Result,
    metrics,
};

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitReviewRequest {
    pub paper_id: i32,

    pub reviewer_id: i32,

    #[validate(range(min = 1, max = 10))]
    pub quality_score: i32,

    #[validate(length(min = 1, max = 20000))]
    pub comments: String,
}

/// Record (or replace) a reviewer's verdict on a paper
pub async fn submit_review(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<SubmitReviewRequest>,
) -> Result<(StatusCode, Json<Review>)> {
    auth.require_role(Role::Reviewer)?;

    let request = SubmitReviewRequest {
        comments: request.comments.trim().to_string(),
        ..request
    };
    request.validate()?;

    let review = state
        .repo
        .upsert_review(
            request.paper_id,
            request.reviewer_id,
            request.quality_score,
            request.comments,
        )
        .await?;

    metrics::record_review();
    tracing::info!(
        review_id = review.id,
        paper_id = review.paper_id,
        reviewer_id = review.reviewer_id,
        score = review.quality_score,
        "Review submitted"
    );

    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn list_reviews(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ListResponse<ReviewView>>> {
    auth.require_role(Role::Admin)?;
    Ok(list(state.repo.list_reviews().await?))
}
