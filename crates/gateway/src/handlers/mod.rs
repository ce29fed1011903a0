//! API handlers module

pub mod assignments;
pub mod auth;
pub mod conference;
pub mod contact;
pub mod health;
pub mod papers;
pub mod reviewers;
pub mod reviews;
pub mod submissions;

use axum::Json;
use papertrail_common::{auth::validate_access_code, errors::Result};
use serde::Deserialize;

/// Body carrying only a five-digit access code
#[derive(Debug, Deserialize)]
pub struct AccessCodeRequest {
    pub access_code: String,
}

impl AccessCodeRequest {
    /// Trimmed, format-checked code
    pub fn code(&self) -> Result<&str> {
        let code = self.access_code.trim();
        validate_access_code(code)?;
        Ok(code)
    }
}

/// List wrapper used by every collection endpoint
#[derive(Debug, serde::Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub count: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}

pub(crate) fn list<T>(items: Vec<T>) -> Json<ListResponse<T>> {
    Json(items.into())
}
