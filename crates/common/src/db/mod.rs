//! Database layer for Papertrail
//!
//! Provides:
//! - SeaORM entity models
//! - Repository pattern for data access
//! - Connection pool management
//! - Schema bootstrap from the entity definitions

pub mod models;
mod repository;

pub use repository::{
    AssignmentView, ConferenceSlotView, NewAuthor, NewPaper, NewReviewer, PaperWithAuthor,
    Repository, ReviewView,
};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use models::*;
use sea_orm::sea_query::Index;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema,
};
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    /// Primary connection (for writes)
    pub primary: DatabaseConnection,

    /// Read replica connection (optional)
    pub replica: Option<DatabaseConnection>,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to primary database...");

        let primary = Database::connect(connect_options(&config.url, config))
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect to primary: {}", e)
            })?;

        // Connect to replica if configured
        let replica = if let Some(ref read_url) = config.read_url {
            info!("Connecting to read replica...");

            let replica_conn = Database::connect(connect_options(read_url, config))
                .await
                .map_err(|e| AppError::DatabaseConnection {
                    message: format!("Failed to connect to replica: {}", e)
                })?;

            Some(replica_conn)
        } else {
            None
        };

        info!("Database connections established");

        Ok(Self { primary, replica })
    }

    /// In-memory SQLite database with the schema applied.
    ///
    /// A single pooled connection keeps every query on the same database.
    pub async fn ephemeral() -> Result<Self> {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            read_url: None,
            max_connections: 1,
            min_connections: 1,
            ..DatabaseConfig::default()
        };

        let pool = Self::new(&config).await?;
        pool.bootstrap_schema().await?;
        Ok(pool)
    }

    /// Get the connection for reads (replica if available, otherwise primary)
    pub fn read(&self) -> &DatabaseConnection {
        self.replica.as_ref().unwrap_or(&self.primary)
    }

    /// Get the connection for writes (always primary)
    pub fn write(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.primary
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Primary ping failed: {}", e),
            })?;

        if let Some(ref replica) = self.replica {
            replica
                .execute_unprepared("SELECT 1")
                .await
                .map_err(|e| AppError::DatabaseConnection {
                    message: format!("Replica ping failed: {}", e),
                })?;
        }

        Ok(())
    }

    /// Create missing tables and unique indexes on the primary.
    ///
    /// Tables are created in foreign-key order.
    pub async fn bootstrap_schema(&self) -> Result<()> {
        let conn = self.write();
        let schema = Schema::new(conn.get_database_backend());

        create_table(conn, &schema, AccountEntity).await?;
        create_table(conn, &schema, AuthorEntity).await?;
        create_table(conn, &schema, PaperEntity).await?;
        create_table(conn, &schema, ReviewerEntity).await?;
        create_table(conn, &schema, AssignmentEntity).await?;
        create_table(conn, &schema, ReviewEntity).await?;
        create_table(conn, &schema, ConferenceSlotEntity).await?;
        create_table(conn, &schema, ContactMessageEntity).await?;

        let indexes = [
            Index::create()
                .name("idx_assignments_paper_reviewer")
                .table(AssignmentEntity)
                .col(AssignmentColumn::PaperId)
                .col(AssignmentColumn::ReviewerId)
                .unique()
                .if_not_exists()
                .to_owned(),
            Index::create()
                .name("idx_reviews_paper_reviewer")
                .table(ReviewEntity)
                .col(ReviewColumn::PaperId)
                .col(ReviewColumn::ReviewerId)
                .unique()
                .if_not_exists()
                .to_owned(),
            Index::create()
                .name("idx_accounts_role_username")
                .table(AccountEntity)
                .col(AccountColumn::Role)
                .col(AccountColumn::Username)
                .unique()
                .if_not_exists()
                .to_owned(),
        ];

        for index in indexes {
            conn.execute(conn.get_database_backend().build(&index)).await?;
        }

        info!("Database schema ready");
        Ok(())
    }
}

fn connect_options(url: &str, config: &DatabaseConfig) -> ConnectOptions {
    let mut opts = ConnectOptions::new(url);
    opts
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .sqlx_logging(true);
    opts
}

async fn create_table<E: EntityTrait>(
    conn: &DatabaseConnection,
    schema: &Schema,
    entity: E,
) -> Result<()> {
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    conn.execute(conn.get_database_backend().build(&stmt)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let pool = DbPool::ephemeral().await.unwrap();
        pool.bootstrap_schema().await.unwrap();
        pool.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_falls_back_to_primary() {
        let pool = DbPool::ephemeral().await.unwrap();
        assert!(pool.replica.is_none());
        pool.read().execute_unprepared("SELECT 1").await.unwrap();
    }
}
