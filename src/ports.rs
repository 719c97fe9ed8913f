//! Boundary interfaces to the surrounding application: persistence reads and
//! writes, and the source-control diff client. The engine only consumes and
//! produces these records; it owns none of the underlying storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DiffError, StoreError};
use crate::types::{PrDiff, ReviewStatus, TestReportResult};

/// A persisted review (execution) as the store returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: ReviewStatus,
    pub source_type: Option<String>,
    pub source_id: Option<String>,
    pub source_url: Option<String>,
    pub repository_name: Option<String>,
    pub repository_url: Option<String>,
    pub branch_name: Option<String>,
    pub commit_sha: Option<String>,
    pub author_id: Option<String>,
    pub author_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub content: String,
    pub author_id: Option<String>,
    pub author_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
    pub severity: Option<String>,
    pub file_path: Option<String>,
    pub line_start: Option<u32>,
}

/// A persisted test report, keyed uniquely by `execution_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRecord {
    pub id: String,
    pub execution_id: String,
    pub result: TestReportResult,
    pub repository_name: Option<String>,
    pub branch_name: Option<String>,
    pub task_total: u32,
    pub task_completed: u32,
    pub author_name: Option<String>,
    /// True when AI generation failed and only context data was persisted.
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrParams {
    pub owner: String,
    pub repo: String,
    pub pull_number: u64,
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// `Ok(None)` means the review does not exist; that is a legitimate
    /// state, not an error.
    async fn review_by_id(&self, review_id: &str) -> Result<Option<ReviewRecord>, StoreError>;

    async fn comments_for_review(&self, review_id: &str)
        -> Result<Vec<CommentRecord>, StoreError>;
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn report_by_execution(
        &self,
        execution_id: &str,
    ) -> Result<Option<ReportRecord>, StoreError>;

    /// Inserts a new report. Must fail with [`StoreError::Duplicate`] when a
    /// report for the same `execution_id` already exists; that constraint is
    /// the engine's only guard against concurrent duplicate generation.
    async fn create_report(&self, record: &ReportRecord) -> Result<String, StoreError>;

    /// Replaces the report for `record.execution_id`. Reports are never
    /// deleted, only regenerated in place.
    async fn update_report(&self, record: &ReportRecord) -> Result<(), StoreError>;
}

#[async_trait]
pub trait DiffClient: Send + Sync {
    async fn get_diff(&self, params: &PrParams) -> Result<PrDiff, DiffError>;
}
