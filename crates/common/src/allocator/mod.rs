//! Reviewer assignment allocator
//!
//! The only write path for assignments. Given an explicit paper and
//! reviewer it validates, in order:
//! 1. both exist
//! 2. the reviewer is below their capacity
//! 3. the paper has fewer than [`MAX_REVIEWERS_PER_PAPER`] reviewers
//! 4. the pair is not already linked
//!
//! and then inserts the assignment. Checks and insert share one transaction;
//! the paper and reviewer rows are locked (`FOR UPDATE` on Postgres) so
//! concurrent allocations touching either row serialize. The unique index on
//! `(paper_id, reviewer_id)` backs check 4.

use crate::db::models::*;
use crate::errors::AppError;
use crate::metrics;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    NotSet, PaginatorTrait, QueryFilter, QuerySelect, Select, Set, SqlErr, TransactionTrait,
};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

/// Maximum reviewer fan-out per paper
pub const MAX_REVIEWERS_PER_PAPER: u64 = 2;

/// Why an allocation was refused
#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("Paper {paper_id} not found")]
    PaperNotFound { paper_id: i32 },

    #[error("Reviewer {reviewer_id} not found")]
    ReviewerNotFound { reviewer_id: i32 },

    #[error("Reviewer '{reviewer}' has reached their maximum paper limit of {capacity}")]
    ReviewerAtCapacity { reviewer: String, capacity: i32 },

    #[error("Paper '{title}' has already been assigned to the maximum of {limit} reviewers")]
    PaperFullyAssigned { title: String, limit: u64 },

    #[error("Paper '{title}' is already assigned to reviewer '{reviewer}'")]
    DuplicateAssignment { title: String, reviewer: String },

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl AllocationError {
    /// Short label used for metrics and logs
    pub fn reason(&self) -> &'static str {
        match self {
            AllocationError::PaperNotFound { .. } | AllocationError::ReviewerNotFound { .. } => {
                "not_found"
            }
            AllocationError::ReviewerAtCapacity { .. } => "reviewer_at_capacity",
            AllocationError::PaperFullyAssigned { .. } => "paper_fully_assigned",
            AllocationError::DuplicateAssignment { .. } => "duplicate_assignment",
            AllocationError::Database(_) => "database_error",
        }
    }
}

impl From<AllocationError> for AppError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::PaperNotFound { paper_id } => AppError::PaperNotFound {
                id: paper_id.to_string(),
            },
            AllocationError::ReviewerNotFound { reviewer_id } => AppError::ReviewerNotFound {
                id: reviewer_id.to_string(),
            },
            AllocationError::ReviewerAtCapacity { reviewer, capacity } => {
                AppError::ReviewerAtCapacity { reviewer, capacity }
            }
            AllocationError::PaperFullyAssigned { title, limit } => {
                AppError::PaperFullyAssigned { title, limit }
            }
            AllocationError::DuplicateAssignment { title, reviewer } => {
                AppError::DuplicateAssignment { title, reviewer }
            }
            AllocationError::Database(e) => AppError::Database(e),
        }
    }
}

/// Counts observed inside the allocation transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationSnapshot {
    pub reviewer_capacity: i32,
    pub reviewer_load: u64,
    pub paper_load: u64,
    pub already_linked: bool,
}

/// Capacity or duplicate rule that refused an allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    ReviewerAtCapacity,
    PaperFullyAssigned,
    Duplicate,
}

/// Apply checks 2-4 in order to a snapshot
pub fn check_allocation(snapshot: &AllocationSnapshot) -> Result<(), Rejection> {
    let capacity = u64::try_from(snapshot.reviewer_capacity.max(0)).unwrap_or(0);

    if snapshot.reviewer_load >= capacity {
        return Err(Rejection::ReviewerAtCapacity);
    }
    if snapshot.paper_load >= MAX_REVIEWERS_PER_PAPER {
        return Err(Rejection::PaperFullyAssigned);
    }
    if snapshot.already_linked {
        return Err(Rejection::Duplicate);
    }
    Ok(())
}

/// Number of assignments counting against a paper or reviewer.
///
/// Every assignment row is active; there is no revocation state.
pub async fn count_active_assignments<C: ConnectionTrait>(
    conn: &C,
    column: AssignmentColumn,
    id: i32,
) -> Result<u64, DbErr> {
    AssignmentEntity::find()
        .filter(column.eq(id))
        .count(conn)
        .await
}

/// Paper row lookup holding a write lock until the transaction ends
fn paper_for_update(paper_id: i32) -> Select<PaperEntity> {
    PaperEntity::find_by_id(paper_id).lock_exclusive()
}

/// Reviewer row lookup holding a write lock until the transaction ends
fn reviewer_for_update(reviewer_id: i32) -> Select<ReviewerEntity> {
    ReviewerEntity::find_by_id(reviewer_id).lock_exclusive()
}

/// Validates and commits reviewer assignments
#[derive(Clone)]
pub struct Allocator {
    conn: DatabaseConnection,
}

impl Allocator {
    /// Create an allocator writing through the given connection
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Assign a paper to a reviewer, or explain why not.
    ///
    /// Nothing is written when an error is returned.
    pub async fn assign(
        &self,
        paper_id: i32,
        reviewer_id: i32,
    ) -> Result<Assignment, AllocationError> {
        let start = Instant::now();
        let outcome = self.try_assign(paper_id, reviewer_id).await;

        let label = match &outcome {
            Ok(_) => "assigned",
            Err(e) => e.reason(),
        };
        metrics::record_allocation(start.elapsed().as_secs_f64(), label);

        outcome
    }

    async fn try_assign(
        &self,
        paper_id: i32,
        reviewer_id: i32,
    ) -> Result<Assignment, AllocationError> {
        let txn = self.conn.begin().await?;

        // Fixed lock order (paper, then reviewer) across all allocations
        let paper = paper_for_update(paper_id)
            .one(&txn)
            .await?
            .ok_or(AllocationError::PaperNotFound { paper_id })?;

        let reviewer = reviewer_for_update(reviewer_id)
            .one(&txn)
            .await?
            .ok_or(AllocationError::ReviewerNotFound { reviewer_id })?;

        let snapshot = AllocationSnapshot {
            reviewer_capacity: reviewer.max_papers,
            reviewer_load: count_active_assignments(&txn, AssignmentColumn::ReviewerId, reviewer_id)
                .await?,
            paper_load: count_active_assignments(&txn, AssignmentColumn::PaperId, paper_id).await?,
            already_linked: AssignmentEntity::find()
                .filter(AssignmentColumn::PaperId.eq(paper_id))
                .filter(AssignmentColumn::ReviewerId.eq(reviewer_id))
                .count(&txn)
                .await?
                > 0,
        };

        debug!(paper_id, reviewer_id, ?snapshot, "Evaluating allocation");

        check_allocation(&snapshot).map_err(|rejection| match rejection {
            Rejection::ReviewerAtCapacity => AllocationError::ReviewerAtCapacity {
                reviewer: reviewer.name.clone(),
                capacity: reviewer.max_papers,
            },
            Rejection::PaperFullyAssigned => AllocationError::PaperFullyAssigned {
                title: paper.title.clone(),
                limit: MAX_REVIEWERS_PER_PAPER,
            },
            Rejection::Duplicate => AllocationError::DuplicateAssignment {
                title: paper.title.clone(),
                reviewer: reviewer.name.clone(),
            },
        })?;

        let assignment = AssignmentActiveModel {
            id: NotSet,
            paper_id: Set(paper_id),
            reviewer_id: Set(reviewer_id),
            assigned_at: Set(Utc::now().into()),
        }
        .insert(&txn)
        .await
        .map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => AllocationError::DuplicateAssignment {
                title: paper.title.clone(),
                reviewer: reviewer.name.clone(),
            },
            _ => AllocationError::Database(e),
        })?;

        txn.commit().await?;

        info!(
            assignment_id = assignment.id,
            paper_id,
            reviewer_id,
            reviewer_load = snapshot.reviewer_load + 1,
            "Paper assigned to reviewer"
        );

        Ok(assignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DbPool, NewAuthor, NewPaper, NewReviewer, Repository};
    use chrono::NaiveDate;
    use rand::Rng;
    use std::collections::{HashMap, HashSet};

    struct Fixture {
        pool: DbPool,
        repo: Repository,
        allocator: Allocator,
    }

    impl Fixture {
        async fn new() -> Self {
            let pool = DbPool::ephemeral().await.unwrap();
            Self {
                repo: Repository::new(pool.clone()),
                allocator: Allocator::new(pool.write().clone()),
                pool,
            }
        }

        async fn paper(&self, code: &str) -> Paper {
            let author = NewAuthor {
                name: format!("Author {}", code),
                affiliation: "Institute".to_string(),
                tel_no: "555-0101".to_string(),
                email: format!("{}@example.org", code),
                postal_address: "2 Sample Street".to_string(),
                access_code: code.to_string(),
            };
            let paper = NewPaper {
                title: format!("Paper {}", code),
                abstract_text: "Abstract".to_string(),
                keywords: "testing".to_string(),
                paper_type: "Short".to_string(),
                submission_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                file_name: format!("{}.pdf", code),
            };
            self.repo.create_author_with_paper(author, paper).await.unwrap().1
        }

        async fn reviewer(&self, code: &str, capacity: i32) -> Reviewer {
            self.repo
                .create_reviewer(NewReviewer {
                    name: format!("Reviewer {}", code),
                    specialization: "Systems".to_string(),
                    max_papers: capacity,
                    email: format!("r{}@example.org", code),
                    access_code: code.to_string(),
                })
                .await
                .unwrap()
        }

        async fn assignments(&self) -> Vec<Assignment> {
            AssignmentEntity::find().all(self.pool.read()).await.unwrap()
        }
    }

    fn snapshot(capacity: i32, reviewer_load: u64, paper_load: u64, linked: bool) -> AllocationSnapshot {
        AllocationSnapshot {
            reviewer_capacity: capacity,
            reviewer_load,
            paper_load,
            already_linked: linked,
        }
    }

    #[test]
    fn test_check_order_capacity_before_fanout_before_duplicate() {
        assert_eq!(check_allocation(&snapshot(2, 0, 0, false)), Ok(()));
        assert_eq!(
            check_allocation(&snapshot(2, 2, 2, true)),
            Err(Rejection::ReviewerAtCapacity)
        );
        assert_eq!(
            check_allocation(&snapshot(3, 1, 2, true)),
            Err(Rejection::PaperFullyAssigned)
        );
        assert_eq!(
            check_allocation(&snapshot(3, 1, 1, true)),
            Err(Rejection::Duplicate)
        );
    }

    #[test]
    fn test_zero_or_negative_capacity_never_admits() {
        assert_eq!(check_allocation(&snapshot(0, 0, 0, false)), Err(Rejection::ReviewerAtCapacity));
        assert_eq!(check_allocation(&snapshot(-1, 0, 0, false)), Err(Rejection::ReviewerAtCapacity));
    }

    #[tokio::test]
    async fn test_reviewer_capacity_scenario() {
        let fx = Fixture::new().await;
        let a = fx.paper("10001").await;
        let b = fx.paper("10002").await;
        let c = fx.paper("10003").await;
        let reviewer = fx.reviewer("20001", 2).await;

        fx.allocator.assign(a.id, reviewer.id).await.unwrap();
        fx.allocator.assign(b.id, reviewer.id).await.unwrap();

        let err = fx.allocator.assign(c.id, reviewer.id).await.unwrap_err();
        assert!(matches!(err, AllocationError::ReviewerAtCapacity { capacity: 2, .. }));
        assert_eq!(err.reason(), "reviewer_at_capacity");
        assert_eq!(fx.assignments().await.len(), 2);
    }

    #[tokio::test]
    async fn test_paper_fanout_scenario() {
        let fx = Fixture::new().await;
        let paper = fx.paper("10001").await;
        let r1 = fx.reviewer("20001", 5).await;
        let r2 = fx.reviewer("20002", 5).await;
        let r3 = fx.reviewer("20003", 5).await;

        fx.allocator.assign(paper.id, r1.id).await.unwrap();
        fx.allocator.assign(paper.id, r2.id).await.unwrap();

        let err = fx.allocator.assign(paper.id, r3.id).await.unwrap_err();
        assert!(matches!(err, AllocationError::PaperFullyAssigned { limit: 2, .. }));
        assert_eq!(fx.assignments().await.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_scenario_leaves_single_row() {
        let fx = Fixture::new().await;
        let paper = fx.paper("10001").await;
        let reviewer = fx.reviewer("20001", 5).await;

        fx.allocator.assign(paper.id, reviewer.id).await.unwrap();
        let err = fx.allocator.assign(paper.id, reviewer.id).await.unwrap_err();

        assert!(matches!(err, AllocationError::DuplicateAssignment { .. }));
        assert_eq!(fx.assignments().await.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_entities_are_not_found() {
        let fx = Fixture::new().await;
        let paper = fx.paper("10001").await;
        let reviewer = fx.reviewer("20001", 1).await;

        let err = fx.allocator.assign(999, reviewer.id).await.unwrap_err();
        assert!(matches!(err, AllocationError::PaperNotFound { paper_id: 999 }));

        let err = fx.allocator.assign(paper.id, 999).await.unwrap_err();
        assert!(matches!(err, AllocationError::ReviewerNotFound { reviewer_id: 999 }));

        // Paper is checked before the reviewer
        let err = fx.allocator.assign(998, 999).await.unwrap_err();
        assert!(matches!(err, AllocationError::PaperNotFound { .. }));
        assert!(fx.assignments().await.is_empty());
    }

    #[tokio::test]
    async fn test_allocation_does_not_advance_paper_status() {
        let fx = Fixture::new().await;
        let paper = fx.paper("10001").await;
        let reviewer = fx.reviewer("20001", 1).await;

        fx.allocator.assign(paper.id, reviewer.id).await.unwrap();

        let paper = fx.repo.find_paper_by_id(paper.id).await.unwrap().unwrap();
        assert_eq!(paper.paper_status(), PaperStatus::PendingReview);
    }

    #[tokio::test]
    async fn test_app_error_mapping_keeps_reason() {
        let err: AppError = AllocationError::ReviewerAtCapacity {
            reviewer: "Ada".to_string(),
            capacity: 2,
        }
        .into();
        assert_eq!(err.code(), crate::errors::ErrorCode::ReviewerAtCapacity);
        assert!(err.to_string().contains("maximum paper limit"));
    }

    #[test]
    fn test_row_lookups_lock_for_update_on_postgres() {
        use sea_orm::{DbBackend, QueryTrait};

        let paper_sql = paper_for_update(7).build(DbBackend::Postgres).to_string();
        assert!(paper_sql.contains(r#"FROM "papers""#), "{paper_sql}");
        assert!(paper_sql.ends_with("FOR UPDATE"), "{paper_sql}");

        let reviewer_sql = reviewer_for_update(9).build(DbBackend::Postgres).to_string();
        assert!(reviewer_sql.contains(r#"FROM "reviewers""#), "{reviewer_sql}");
        assert!(reviewer_sql.ends_with("FOR UPDATE"), "{reviewer_sql}");
    }

    // The ephemeral pool has one connection, so these tasks commit one at a
    // time; row locking is covered by the Postgres SQL check above.
    #[tokio::test]
    async fn test_random_allocation_sequence_respects_invariants() {
        let fx = Fixture::new().await;

        let mut papers = Vec::new();
        for i in 0..6 {
            papers.push(fx.paper(&format!("3000{}", i)).await.id);
        }
        let mut capacities = HashMap::new();
        for i in 0..4 {
            let reviewer = fx.reviewer(&format!("4000{}", i), (i % 3) + 1).await;
            capacities.insert(reviewer.id, reviewer.max_papers as usize);
        }
        let reviewers: Vec<i32> = capacities.keys().copied().collect();

        let mut rng = rand::thread_rng();
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..48 {
            let paper_id = papers[rng.gen_range(0..papers.len())];
            let reviewer_id = reviewers[rng.gen_range(0..reviewers.len())];
            let allocator = fx.allocator.clone();
            tasks.spawn(async move { allocator.assign(paper_id, reviewer_id).await });
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined.unwrap() {
                assert!(!matches!(e, AllocationError::Database(_)), "unexpected {e}");
            }
        }

        let rows = fx.assignments().await;
        let mut per_paper: HashMap<i32, usize> = HashMap::new();
        let mut per_reviewer: HashMap<i32, usize> = HashMap::new();
        let mut pairs = HashSet::new();
        for row in &rows {
            *per_paper.entry(row.paper_id).or_default() += 1;
            *per_reviewer.entry(row.reviewer_id).or_default() += 1;
            assert!(pairs.insert((row.paper_id, row.reviewer_id)), "duplicate pair");
        }

        assert!(per_paper.values().all(|&n| n as u64 <= MAX_REVIEWERS_PER_PAPER));
        for (reviewer_id, load) in per_reviewer {
            assert!(load <= capacities[&reviewer_id]);
        }
    }
}
