//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling and transaction support.
//! Assignment rows are written by [`crate::allocator::Allocator`] only.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::metrics;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult,
    JoinType, NotSet, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, SqlErr,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};

/// Author details captured on first submission
#[derive(Debug, Clone, Deserialize)]
pub struct NewAuthor {
    pub name: String,
    pub affiliation: String,
    pub tel_no: String,
    pub email: String,
    pub postal_address: String,
    pub access_code: String,
}

/// Paper details for a new submission; `file_name` is the stored file
#[derive(Debug, Clone, Deserialize)]
pub struct NewPaper {
    pub title: String,
    pub abstract_text: String,
    pub keywords: String,
    pub paper_type: String,
    pub submission_date: NaiveDate,
    pub file_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReviewer {
    pub name: String,
    pub specialization: String,
    pub max_papers: i32,
    pub email: String,
    pub access_code: String,
}

/// Paper joined with its author's name
#[derive(Debug, Clone, Serialize)]
pub struct PaperWithAuthor {
    #[serde(flatten)]
    pub paper: Paper,
    pub author_name: String,
}

/// Assignment joined with paper, reviewer and author details
#[derive(Debug, Clone, Serialize, FromQueryResult)]
pub struct AssignmentView {
    pub assignment_id: i32,
    pub paper_id: i32,
    pub reviewer_id: i32,
    pub assigned_at: DateTime<FixedOffset>,
    pub paper_title: String,
    pub keywords: String,
    pub paper_type: String,
    pub submission_date: NaiveDate,
    pub paper_status: String,
    pub reviewer_name: String,
    pub reviewer_specialization: String,
    pub max_papers: i32,
    pub author_name: String,
}

/// Review joined with paper title and reviewer name
#[derive(Debug, Clone, Serialize, FromQueryResult)]
pub struct ReviewView {
    pub review_id: i32,
    pub assignment_id: Option<i32>,
    pub paper_id: i32,
    pub paper_title: String,
    pub reviewer_id: i32,
    pub reviewer_name: String,
    pub quality_score: i32,
    pub comments: String,
    pub submitted_at: DateTime<FixedOffset>,
}

/// Conference slot joined with paper title and author name
#[derive(Debug, Clone, Serialize, FromQueryResult)]
pub struct ConferenceSlotView {
    pub slot_id: i32,
    pub paper_id: i32,
    pub paper_title: String,
    pub author_name: String,
    pub presentation_time: DateTime<FixedOffset>,
    pub location: String,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Account Operations
    // ========================================================================

    /// Create a login account
    pub async fn create_account(
        &self,
        username: String,
        role: &str,
        password_hash: String,
    ) -> Result<Account> {
        let account = AccountActiveModel {
            id: NotSet,
            username: Set(username.clone()),
            role: Set(role.to_string()),
            password_hash: Set(password_hash),
            created_at: Set(Utc::now().into()),
        };

        account
            .insert(self.write_conn())
            .await
            .map_err(|e| duplicate_or(e, format!("Username '{}' is already taken", username)))
    }

    /// Find an account by role and username
    pub async fn find_account(&self, role: &str, username: &str) -> Result<Option<Account>> {
        AccountEntity::find()
            .filter(AccountColumn::Role.eq(role))
            .filter(AccountColumn::Username.eq(username))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Author & Paper Operations
    // ========================================================================

    /// Find author by access code
    pub async fn find_author_by_code(&self, access_code: &str) -> Result<Option<Author>> {
        AuthorEntity::find()
            .filter(AuthorColumn::AccessCode.eq(access_code))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Register a new author together with their first paper
    pub async fn create_author_with_paper(
        &self,
        author: NewAuthor,
        paper: NewPaper,
    ) -> Result<(Author, Paper)> {
        let txn = self.write_conn().begin().await?;

        let in_use = AuthorEntity::find()
            .filter(AuthorColumn::AccessCode.eq(author.access_code.as_str()))
            .one(&txn)
            .await?
            .is_some();
        if in_use {
            return Err(AppError::Duplicate {
                message: "This PIN is already in use. Please use a unique PIN for new author registration.".to_string(),
            });
        }

        let now = Utc::now();
        let access_code = author.access_code.clone();

        let author = AuthorActiveModel {
            id: NotSet,
            name: Set(author.name),
            affiliation: Set(author.affiliation),
            tel_no: Set(author.tel_no),
            email: Set(author.email),
            postal_address: Set(author.postal_address),
            access_code: Set(author.access_code),
            created_at: Set(now.into()),
        }
        .insert(&txn)
        .await
        .map_err(|e| duplicate_or(e, "An author with this email already exists".to_string()))?;

        let paper = paper_active_model(paper, author.id, access_code)
            .insert(&txn)
            .await?;

        txn.commit().await?;

        tracing::info!(author_id = author.id, paper_id = paper.id, "Author registered with first paper");
        Ok((author, paper))
    }

    /// Add a paper for an existing author
    pub async fn create_paper_for_author(&self, author: &Author, paper: NewPaper) -> Result<Paper> {
        paper_active_model(paper, author.id, author.access_code.clone())
            .insert(self.write_conn())
            .await
            .map_err(Into::into)
    }

    /// Find paper by ID
    pub async fn find_paper_by_id(&self, id: i32) -> Result<Option<Paper>> {
        PaperEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List papers, optionally restricted to one status
    pub async fn list_papers(&self, status: Option<PaperStatus>) -> Result<Vec<Paper>> {
        let mut query = PaperEntity::find().order_by_asc(PaperColumn::Id);
        if let Some(status) = status {
            query = query.filter(PaperColumn::Status.eq(status.as_str()));
        }

        query.all(self.read_conn()).await.map_err(Into::into)
    }

    /// Papers submitted under an access code, with the author's name
    pub async fn papers_by_access_code(&self, access_code: &str) -> Result<Vec<PaperWithAuthor>> {
        let rows = PaperEntity::find()
            .filter(PaperColumn::AccessCode.eq(access_code))
            .find_also_related(AuthorEntity)
            .order_by_asc(PaperColumn::Id)
            .all(self.read_conn())
            .await?;

        Ok(rows
            .into_iter()
            .map(|(paper, author)| PaperWithAuthor {
                paper,
                author_name: author.map(|a| a.name).unwrap_or_default(),
            })
            .collect())
    }

    /// Explicitly set a paper's status
    pub async fn update_paper_status(&self, id: i32, status: PaperStatus) -> Result<Paper> {
        let mut paper: PaperActiveModel = PaperEntity::find_by_id(id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::PaperNotFound { id: id.to_string() })?
            .into();

        paper.status = Set(status.into());
        let paper = paper.update(self.write_conn()).await?;

        metrics::record_status_change(status.as_str());
        Ok(paper)
    }

    // ========================================================================
    // Reviewer Operations
    // ========================================================================

    /// Register a reviewer
    pub async fn create_reviewer(&self, reviewer: NewReviewer) -> Result<Reviewer> {
        let model = ReviewerActiveModel {
            id: NotSet,
            name: Set(reviewer.name),
            specialization: Set(reviewer.specialization),
            max_papers: Set(reviewer.max_papers),
            email: Set(reviewer.email),
            access_code: Set(reviewer.access_code),
            created_at: Set(Utc::now().into()),
        };

        model
            .insert(self.write_conn())
            .await
            .map_err(|e| duplicate_or(e, "A reviewer with this email or PIN already exists".to_string()))
    }

    pub async fn list_reviewers(&self) -> Result<Vec<Reviewer>> {
        ReviewerEntity::find()
            .order_by_asc(ReviewerColumn::Id)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_reviewer_by_id(&self, id: i32) -> Result<Option<Reviewer>> {
        ReviewerEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_reviewer_by_code(&self, access_code: &str) -> Result<Option<Reviewer>> {
        ReviewerEntity::find()
            .filter(ReviewerColumn::AccessCode.eq(access_code))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Papers currently assigned to a reviewer
    pub async fn papers_for_reviewer(&self, reviewer_id: i32) -> Result<Vec<Paper>> {
        PaperEntity::find()
            .inner_join(AssignmentEntity)
            .filter(AssignmentColumn::ReviewerId.eq(reviewer_id))
            .order_by_asc(PaperColumn::Id)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Assignment Views
    // ========================================================================

    /// All assignments with joined details
    pub async fn list_assignments(&self) -> Result<Vec<AssignmentView>> {
        self.assignment_views(None).await
    }

    /// Assignments of one reviewer with joined details
    pub async fn assignments_for_reviewer(&self, reviewer_id: i32) -> Result<Vec<AssignmentView>> {
        self.assignment_views(Some(reviewer_id)).await
    }

    async fn assignment_views(&self, reviewer_id: Option<i32>) -> Result<Vec<AssignmentView>> {
        let mut query = AssignmentEntity::find()
            .select_only()
            .column_as(AssignmentColumn::Id, "assignment_id")
            .column_as(AssignmentColumn::PaperId, "paper_id")
            .column_as(AssignmentColumn::ReviewerId, "reviewer_id")
            .column_as(AssignmentColumn::AssignedAt, "assigned_at")
            .column_as(PaperColumn::Title, "paper_title")
            .column_as(PaperColumn::Keywords, "keywords")
            .column_as(PaperColumn::PaperType, "paper_type")
            .column_as(PaperColumn::SubmissionDate, "submission_date")
            .column_as(PaperColumn::Status, "paper_status")
            .column_as(ReviewerColumn::Name, "reviewer_name")
            .column_as(ReviewerColumn::Specialization, "reviewer_specialization")
            .column_as(ReviewerColumn::MaxPapers, "max_papers")
            .column_as(AuthorColumn::Name, "author_name")
            .join(JoinType::InnerJoin, AssignmentRelation::Paper.def())
            .join(JoinType::InnerJoin, AssignmentRelation::Reviewer.def())
            .join(JoinType::InnerJoin, PaperRelation::Author.def())
            .order_by_asc(AssignmentColumn::Id);

        if let Some(reviewer_id) = reviewer_id {
            query = query.filter(AssignmentColumn::ReviewerId.eq(reviewer_id));
        }

        query
            .into_model::<AssignmentView>()
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Review Operations
    // ========================================================================

    /// Create or replace the review of a paper by a reviewer.
    ///
    /// Links the originating assignment when one exists and marks the paper
    /// as reviewed.
    pub async fn upsert_review(
        &self,
        paper_id: i32,
        reviewer_id: i32,
        quality_score: i32,
        comments: String,
    ) -> Result<Review> {
        let txn = self.write_conn().begin().await?;

        let paper = PaperEntity::find_by_id(paper_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::PaperNotFound { id: paper_id.to_string() })?;

        ReviewerEntity::find_by_id(reviewer_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::ReviewerNotFound { id: reviewer_id.to_string() })?;

        let assignment_id = AssignmentEntity::find()
            .filter(AssignmentColumn::PaperId.eq(paper_id))
            .filter(AssignmentColumn::ReviewerId.eq(reviewer_id))
            .one(&txn)
            .await?
            .map(|a| a.id);

        let existing = ReviewEntity::find()
            .filter(ReviewColumn::PaperId.eq(paper_id))
            .filter(ReviewColumn::ReviewerId.eq(reviewer_id))
            .one(&txn)
            .await?;

        let now = Utc::now();
        let review = match existing {
            Some(existing) => {
                let mut review: ReviewActiveModel = existing.into();
                review.assignment_id = Set(assignment_id);
                review.quality_score = Set(quality_score);
                review.comments = Set(comments);
                review.submitted_at = Set(now.into());
                review.update(&txn).await?
            }
            None => {
                ReviewActiveModel {
                    id: NotSet,
                    assignment_id: Set(assignment_id),
                    paper_id: Set(paper_id),
                    reviewer_id: Set(reviewer_id),
                    quality_score: Set(quality_score),
                    comments: Set(comments),
                    submitted_at: Set(now.into()),
                }
                .insert(&txn)
                .await?
            }
        };

        let mut paper: PaperActiveModel = paper.into();
        paper.status = Set(PaperStatus::Reviewed.into());
        paper.update(&txn).await?;

        txn.commit().await?;
        metrics::record_status_change(PaperStatus::Reviewed.as_str());
        Ok(review)
    }

    /// All reviews with joined details
    pub async fn list_reviews(&self) -> Result<Vec<ReviewView>> {
        ReviewEntity::find()
            .select_only()
            .column_as(ReviewColumn::Id, "review_id")
            .column_as(ReviewColumn::AssignmentId, "assignment_id")
            .column_as(ReviewColumn::PaperId, "paper_id")
            .column_as(PaperColumn::Title, "paper_title")
            .column_as(ReviewColumn::ReviewerId, "reviewer_id")
            .column_as(ReviewerColumn::Name, "reviewer_name")
            .column_as(ReviewColumn::QualityScore, "quality_score")
            .column_as(ReviewColumn::Comments, "comments")
            .column_as(ReviewColumn::SubmittedAt, "submitted_at")
            .join(JoinType::InnerJoin, ReviewRelation::Paper.def())
            .join(JoinType::InnerJoin, ReviewRelation::Reviewer.def())
            .order_by_asc(ReviewColumn::Id)
            .into_model::<ReviewView>()
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Conference Operations
    // ========================================================================

    /// Schedule a paper's presentation and mark it as scheduled
    pub async fn create_conference_slot(
        &self,
        paper_id: i32,
        presentation_time: DateTime<FixedOffset>,
        location: String,
    ) -> Result<ConferenceSlot> {
        let txn = self.write_conn().begin().await?;

        let paper = PaperEntity::find_by_id(paper_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::PaperNotFound { id: paper_id.to_string() })?;

        let slot = ConferenceSlotActiveModel {
            id: NotSet,
            paper_id: Set(paper_id),
            presentation_time: Set(presentation_time),
            location: Set(location),
        }
        .insert(&txn)
        .await?;

        let mut paper: PaperActiveModel = paper.into();
        paper.status = Set(PaperStatus::Scheduled.into());
        paper.update(&txn).await?;

        txn.commit().await?;
        metrics::record_status_change(PaperStatus::Scheduled.as_str());
        Ok(slot)
    }

    /// All conference slots with joined details
    pub async fn list_conference_slots(&self) -> Result<Vec<ConferenceSlotView>> {
        ConferenceSlotEntity::find()
            .select_only()
            .column_as(ConferenceSlotColumn::Id, "slot_id")
            .column_as(ConferenceSlotColumn::PaperId, "paper_id")
            .column_as(PaperColumn::Title, "paper_title")
            .column_as(AuthorColumn::Name, "author_name")
            .column_as(ConferenceSlotColumn::PresentationTime, "presentation_time")
            .column_as(ConferenceSlotColumn::Location, "location")
            .join(JoinType::InnerJoin, ConferenceSlotRelation::Paper.def())
            .join(JoinType::InnerJoin, PaperRelation::Author.def())
            .order_by_asc(ConferenceSlotColumn::PresentationTime)
            .into_model::<ConferenceSlotView>()
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Contact Operations
    // ========================================================================

    pub async fn create_contact_message(
        &self,
        name: String,
        email: String,
        message: String,
    ) -> Result<ContactMessage> {
        ContactMessageActiveModel {
            id: NotSet,
            name: Set(name),
            email: Set(email),
            message: Set(message),
            created_at: Set(Utc::now().into()),
        }
        .insert(self.write_conn())
        .await
        .map_err(Into::into)
    }

    pub async fn list_contact_messages(&self) -> Result<Vec<ContactMessage>> {
        ContactMessageEntity::find()
            .order_by_desc(ContactMessageColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }
}

fn paper_active_model(paper: NewPaper, author_id: i32, access_code: String) -> PaperActiveModel {
    PaperActiveModel {
        id: NotSet,
        title: Set(paper.title),
        abstract_text: Set(paper.abstract_text),
        keywords: Set(paper.keywords),
        paper_type: Set(paper.paper_type),
        submission_date: Set(paper.submission_date),
        file_name: Set(paper.file_name),
        status: Set(PaperStatus::PendingReview.into()),
        author_id: Set(author_id),
        access_code: Set(access_code),
        created_at: Set(Utc::now().into()),
    }
}

/// Map a unique-constraint violation to a duplicate error with the given message
fn duplicate_or(err: DbErr, message: String) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::Duplicate { message },
        _ => AppError::Database(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::Allocator;

    fn sample_author(code: &str) -> NewAuthor {
        NewAuthor {
            name: format!("Author {}", code),
            affiliation: "University of Testing".to_string(),
            tel_no: "555-0100".to_string(),
            email: format!("author{}@example.org", code),
            postal_address: "1 Test Road".to_string(),
            access_code: code.to_string(),
        }
    }

    fn sample_paper(title: &str) -> NewPaper {
        NewPaper {
            title: title.to_string(),
            abstract_text: "An abstract.".to_string(),
            keywords: "graphs, allocation".to_string(),
            paper_type: "Research".to_string(),
            submission_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            file_name: "deadbeef.pdf".to_string(),
        }
    }

    async fn repo() -> Repository {
        Repository::new(DbPool::ephemeral().await.unwrap())
    }

    #[tokio::test]
    async fn test_author_registration_rejects_reused_pin() {
        let repo = repo().await;

        let (author, paper) = repo
            .create_author_with_paper(sample_author("12345"), sample_paper("First"))
            .await
            .unwrap();
        assert_eq!(paper.author_id, author.id);
        assert_eq!(paper.access_code, "12345");
        assert_eq!(paper.paper_status(), PaperStatus::PendingReview);

        let mut second = sample_author("12345");
        second.email = "other@example.org".to_string();
        let err = repo
            .create_author_with_paper(second, sample_paper("Second"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Duplicate { .. }));

        // No partial write of the rejected paper
        assert_eq!(repo.list_papers(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_papers_by_access_code_includes_author_name() {
        let repo = repo().await;
        let (author, _) = repo
            .create_author_with_paper(sample_author("11111"), sample_paper("One"))
            .await
            .unwrap();
        repo.create_paper_for_author(&author, sample_paper("Two")).await.unwrap();

        let papers = repo.papers_by_access_code("11111").await.unwrap();
        assert_eq!(papers.len(), 2);
        assert!(papers.iter().all(|p| p.author_name == "Author 11111"));
        assert!(repo.papers_by_access_code("99999").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_papers_filters_by_status() {
        let repo = repo().await;
        let (_, paper) = repo
            .create_author_with_paper(sample_author("22222"), sample_paper("One"))
            .await
            .unwrap();

        repo.update_paper_status(paper.id, PaperStatus::Assigned).await.unwrap();

        let pending = repo.list_papers(Some(PaperStatus::PendingReview)).await.unwrap();
        assert!(pending.is_empty());
        let assigned = repo.list_papers(Some(PaperStatus::Assigned)).await.unwrap();
        assert_eq!(assigned.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_reviewer_email_is_reported() {
        let repo = repo().await;
        let reviewer = NewReviewer {
            name: "Ada".to_string(),
            specialization: "Graphs".to_string(),
            max_papers: 2,
            email: "ada@example.org".to_string(),
            access_code: "54321".to_string(),
        };
        repo.create_reviewer(reviewer.clone()).await.unwrap();

        let mut again = reviewer;
        again.access_code = "54322".to_string();
        let err = repo.create_reviewer(again).await.unwrap_err();
        assert!(matches!(err, AppError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn test_review_upsert_keeps_one_row_per_pair() {
        let pool = DbPool::ephemeral().await.unwrap();
        let repo = Repository::new(pool.clone());
        let (_, paper) = repo
            .create_author_with_paper(sample_author("33333"), sample_paper("Reviewed"))
            .await
            .unwrap();
        let reviewer = repo
            .create_reviewer(NewReviewer {
                name: "Grace".to_string(),
                specialization: "Compilers".to_string(),
                max_papers: 3,
                email: "grace@example.org".to_string(),
                access_code: "44444".to_string(),
            })
            .await
            .unwrap();
        let assignment = Allocator::new(pool.write().clone())
            .assign(paper.id, reviewer.id)
            .await
            .unwrap();

        let first = repo
            .upsert_review(paper.id, reviewer.id, 6, "Solid".to_string())
            .await
            .unwrap();
        assert_eq!(first.assignment_id, Some(assignment.id));

        let second = repo
            .upsert_review(paper.id, reviewer.id, 8, "Better after revision".to_string())
            .await
            .unwrap();
        assert_eq!(second.id, first.id);

        let reviews = repo.list_reviews().await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].quality_score, 8);
        assert_eq!(reviews[0].reviewer_name, "Grace");
        assert_eq!(reviews[0].paper_title, "Reviewed");

        let paper = repo.find_paper_by_id(paper.id).await.unwrap().unwrap();
        assert_eq!(paper.paper_status(), PaperStatus::Reviewed);
    }

    #[tokio::test]
    async fn test_review_for_missing_paper_is_not_found() {
        let repo = repo().await;
        let err = repo
            .upsert_review(404, 1, 5, "n/a".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PaperNotFound { .. }));
    }

    #[tokio::test]
    async fn test_conference_slot_schedules_paper() {
        let repo = repo().await;
        let (_, paper) = repo
            .create_author_with_paper(sample_author("55555"), sample_paper("Talk"))
            .await
            .unwrap();

        let when = DateTime::parse_from_rfc3339("2024-06-01T10:30:00+00:00").unwrap();
        repo.create_conference_slot(paper.id, when, "Hall A".to_string())
            .await
            .unwrap();

        let slots = repo.list_conference_slots().await.unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].author_name, "Author 55555");
        assert_eq!(slots[0].location, "Hall A");

        let paper = repo.find_paper_by_id(paper.id).await.unwrap().unwrap();
        assert_eq!(paper.paper_status(), PaperStatus::Scheduled);
    }

    #[test]
    fn test_every_status_write_is_counted() {
        let recorder = crate::metrics::testing::CountingRecorder::default();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        ::metrics::with_local_recorder(&recorder, || {
            runtime.block_on(async {
                let repo = repo().await;
                let (_, paper) = repo
                    .create_author_with_paper(sample_author("66666"), sample_paper("Counted"))
                    .await
                    .unwrap();
                let reviewer = repo
                    .create_reviewer(NewReviewer {
                        name: "Lin".to_string(),
                        specialization: "Databases".to_string(),
                        max_papers: 1,
                        email: "lin@example.org".to_string(),
                        access_code: "77777".to_string(),
                    })
                    .await
                    .unwrap();

                repo.update_paper_status(paper.id, PaperStatus::Assigned).await.unwrap();
                repo.upsert_review(paper.id, reviewer.id, 7, "Clear".to_string())
                    .await
                    .unwrap();
                let when = DateTime::parse_from_rfc3339("2024-06-02T09:00:00+00:00").unwrap();
                repo.create_conference_slot(paper.id, when, "Room 2".to_string())
                    .await
                    .unwrap();

                // Rejected writes are not counted
                repo.upsert_review(404, reviewer.id, 5, "n/a".to_string())
                    .await
                    .unwrap_err();
            })
        });

        let key = |status: &str| format!("papertrail_status_changes_total{{status={}}}", status);
        assert_eq!(recorder.total(&key("Assigned")), 1);
        assert_eq!(recorder.total(&key("Reviewed")), 1);
        assert_eq!(recorder.total(&key("Scheduled")), 1);
    }

    #[tokio::test]
    async fn test_account_usernames_unique_per_role() {
        let repo = repo().await;
        repo.create_account("kim".to_string(), "admin", "hash".to_string()).await.unwrap();
        repo.create_account("kim".to_string(), "author", "hash".to_string()).await.unwrap();

        let err = repo
            .create_account("kim".to_string(), "admin", "hash".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Duplicate { .. }));
        assert!(repo.find_account("author", "kim").await.unwrap().is_some());
    }
}
