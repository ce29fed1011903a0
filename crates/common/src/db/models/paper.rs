//! Paper entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Review lifecycle of a paper
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperStatus {
    #[serde(rename = "Pending Review")]
    PendingReview,
    Assigned,
    Reviewed,
    Scheduled,
}

impl PaperStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaperStatus::PendingReview => "Pending Review",
            PaperStatus::Assigned => "Assigned",
            PaperStatus::Reviewed => "Reviewed",
            PaperStatus::Scheduled => "Scheduled",
        }
    }

    /// Parse a stored or user-supplied status label
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Pending Review" => Some(PaperStatus::PendingReview),
            "Assigned" => Some(PaperStatus::Assigned),
            "Reviewed" => Some(PaperStatus::Reviewed),
            "Scheduled" => Some(PaperStatus::Scheduled),
            _ => None,
        }
    }
}

impl From<String> for PaperStatus {
    fn from(s: String) -> Self {
        PaperStatus::parse(&s).unwrap_or(PaperStatus::PendingReview)
    }
}

impl From<PaperStatus> for String {
    fn from(status: PaperStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for PaperStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "papers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub abstract_text: String,

    #[sea_orm(column_type = "Text")]
    pub keywords: String,

    pub paper_type: String,

    pub submission_date: Date,

    /// Content-addressed name of the stored manuscript file
    pub file_name: String,

    pub status: String,

    pub author_id: i32,

    /// Access code of the owning author
    pub access_code: String,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the paper status as an enum
    pub fn paper_status(&self) -> PaperStatus {
        PaperStatus::from(self.status.clone())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::author::Entity",
        from = "Column::AuthorId",
        to = "super::author::Column::Id",
        on_delete = "Cascade"
    )]
    Author,

    #[sea_orm(has_many = "super::assignment::Entity")]
    Assignments,

    #[sea_orm(has_many = "super::review::Entity")]
    Reviews,

    #[sea_orm(has_many = "super::conference_slot::Entity")]
    ConferenceSlots,
}

impl Related<super::author::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::assignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assignments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
