use async_trait::async_trait;
use bson::{doc, DateTime as BsonDateTime};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Collection, IndexModel};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::ports::{ReportRecord, ReportStore};
use crate::store::MongoClient;
use crate::types::TestReportResult;

const COLLECTION: &str = "test_reports";
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Mongo-backed report store. The unique index on `execution_id` is what
/// makes the trigger's lookup-then-create sequence effectively atomic.
pub struct ReportRepository {
    client: MongoClient,
}

#[derive(Debug, Serialize, Deserialize)]
struct ReportDocument {
    #[serde(rename = "_id")]
    id: String,
    execution_id: String,
    result: TestReportResult,
    repository_name: Option<String>,
    branch_name: Option<String>,
    task_total: u32,
    task_completed: u32,
    author_name: Option<String>,
    degraded: bool,
    created_at: BsonDateTime,
}

impl From<&ReportRecord> for ReportDocument {
    fn from(record: &ReportRecord) -> Self {
        Self {
            id: record.id.clone(),
            execution_id: record.execution_id.clone(),
            result: record.result.clone(),
            repository_name: record.repository_name.clone(),
            branch_name: record.branch_name.clone(),
            task_total: record.task_total,
            task_completed: record.task_completed,
            author_name: record.author_name.clone(),
            degraded: record.degraded,
            created_at: BsonDateTime::from_chrono(record.created_at),
        }
    }
}

impl ReportDocument {
    fn into_record(self) -> ReportRecord {
        ReportRecord {
            id: self.id,
            execution_id: self.execution_id,
            result: self.result,
            repository_name: self.repository_name,
            branch_name: self.branch_name,
            task_total: self.task_total,
            task_completed: self.task_completed,
            author_name: self.author_name,
            degraded: self.degraded,
            created_at: self.created_at.to_chrono(),
        }
    }
}

impl ReportRepository {
    pub fn new(client: MongoClient) -> Self {
        Self { client }
    }

    fn collection(&self) -> Collection<ReportDocument> {
        self.client.database().collection(COLLECTION)
    }

    /// Must run once at startup: without the unique index the duplicate
    /// guard degrades to lookup-then-create with a race window.
    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let index = IndexModel::builder()
            .keys(doc! { "execution_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        self.collection().create_index(index).await?;
        Ok(())
    }
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    matches!(
        *error.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

#[async_trait]
impl ReportStore for ReportRepository {
    async fn report_by_execution(
        &self,
        execution_id: &str,
    ) -> Result<Option<ReportRecord>, StoreError> {
        let document = self
            .collection()
            .find_one(doc! { "execution_id": execution_id })
            .await?;

        Ok(document.map(ReportDocument::into_record))
    }

    async fn create_report(&self, record: &ReportRecord) -> Result<String, StoreError> {
        let document = ReportDocument::from(record);

        match self.collection().insert_one(&document).await {
            Ok(_) => Ok(record.id.clone()),
            Err(e) if is_duplicate_key(&e) => {
                Err(StoreError::Duplicate(record.execution_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_report(&self, record: &ReportRecord) -> Result<(), StoreError> {
        let result = bson::to_bson(&record.result)
            .map_err(|e| StoreError::Backend(format!("failed to serialize result: {}", e)))?;

        self.collection()
            .update_one(
                doc! { "execution_id": &record.execution_id },
                doc! {
                    "$set": {
                        "result": result,
                        "repository_name": &record.repository_name,
                        "branch_name": &record.branch_name,
                        "task_total": record.task_total,
                        "task_completed": record.task_completed,
                        "author_name": &record.author_name,
                        "degraded": record.degraded,
                    }
                },
            )
            .await?;

        Ok(())
    }
}
