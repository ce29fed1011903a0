//! Conference scheduling

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::Deserialize;
use validator::Validate;

use super::{list, ListResponse};
use crate::AppState;
use papertrail_common::{
    auth::{AuthContext, Role},
    db::models::ConferenceSlot,
    db::ConferenceSlotView,
    errors::{AppError, Result},
};

#[derive(Debug, Deserialize, Validate)]
pub struct ScheduleRequest {
    pub paper_id: i32,

    /// RFC 3339, or a local ISO-8601 date-time taken as UTC
    pub presentation_time: String,

    #[validate(length(min = 1, max = 255))]
    pub location: String,
}

const LOCAL_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse a presentation time; offset-less input is UTC
pub fn parse_presentation_time(value: &str) -> Result<DateTime<FixedOffset>> {
    let value = value.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Ok(time);
    }

    LOCAL_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc().fixed_offset())
        .ok_or_else(|| AppError::InvalidFormat {
            message: format!("Invalid presentation_time '{}'", value),
        })
}

/// Schedule a paper's presentation (admin)
pub async fn schedule_paper(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<ScheduleRequest>,
) -> Result<(StatusCode, Json<ConferenceSlot>)> {
    auth.require_role(Role::Admin)?;
    request.validate()?;

    let presentation_time = parse_presentation_time(&request.presentation_time)?;
    let slot = state
        .repo
        .create_conference_slot(request.paper_id, presentation_time, request.location.trim().to_string())
        .await?;

    tracing::info!(slot_id = slot.id, paper_id = slot.paper_id, "Paper scheduled");

    Ok((StatusCode::CREATED, Json(slot)))
}

pub async fn list_schedule(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ListResponse<ConferenceSlotView>>> {
    Ok(list(state.repo.list_conference_slots().await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_presentation_time() {
        let t = parse_presentation_time("2024-06-01T09:30:00+02:00").unwrap();
        assert_eq!(t.offset().local_minus_utc(), 7200);

        let t = parse_presentation_time("2024-06-01T09:30").unwrap();
        assert_eq!(t.to_rfc3339(), "2024-06-01T09:30:00+00:00");

        assert!(parse_presentation_time("next tuesday").is_err());
    }
}
