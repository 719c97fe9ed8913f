use async_trait::async_trait;
use bson::{doc, DateTime as BsonDateTime};
use futures::TryStreamExt;
use mongodb::Collection;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::ports::{CommentRecord, ReviewRecord, ReviewStore};
use crate::store::MongoClient;
use crate::types::ReviewStatus;

const REVIEWS_COLLECTION: &str = "reviews";
const COMMENTS_COLLECTION: &str = "review_comments";

/// Mongo-backed read side for reviews and their comment threads.
pub struct ReviewRepository {
    client: MongoClient,
}

#[derive(Debug, Serialize, Deserialize)]
struct ReviewDocument {
    #[serde(rename = "_id")]
    id: String,
    title: String,
    description: Option<String>,
    status: ReviewStatus,
    source_type: Option<String>,
    source_id: Option<String>,
    source_url: Option<String>,
    repository_name: Option<String>,
    repository_url: Option<String>,
    branch_name: Option<String>,
    commit_sha: Option<String>,
    author_id: Option<String>,
    author_name: Option<String>,
    created_at: BsonDateTime,
    updated_at: BsonDateTime,
}

impl ReviewDocument {
    fn into_record(self) -> ReviewRecord {
        ReviewRecord {
            id: self.id,
            title: self.title,
            description: self.description,
            status: self.status,
            source_type: self.source_type,
            source_id: self.source_id,
            source_url: self.source_url,
            repository_name: self.repository_name,
            repository_url: self.repository_url,
            branch_name: self.branch_name,
            commit_sha: self.commit_sha,
            author_id: self.author_id,
            author_name: self.author_name,
            created_at: self.created_at.to_chrono(),
            updated_at: self.updated_at.to_chrono(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CommentDocument {
    #[serde(rename = "_id")]
    id: String,
    review_id: String,
    content: String,
    author_id: Option<String>,
    author_name: Option<String>,
    created_at: BsonDateTime,
    resolved: bool,
    severity: Option<String>,
    file_path: Option<String>,
    line_start: Option<u32>,
}

impl CommentDocument {
    fn into_record(self) -> CommentRecord {
        CommentRecord {
            id: self.id,
            content: self.content,
            author_id: self.author_id,
            author_name: self.author_name,
            created_at: self.created_at.to_chrono(),
            resolved: self.resolved,
            severity: self.severity,
            file_path: self.file_path,
            line_start: self.line_start,
        }
    }
}

impl ReviewRepository {
    pub fn new(client: MongoClient) -> Self {
        Self { client }
    }

    fn reviews(&self) -> Collection<ReviewDocument> {
        self.client.database().collection(REVIEWS_COLLECTION)
    }

    fn comments(&self) -> Collection<CommentDocument> {
        self.client.database().collection(COMMENTS_COLLECTION)
    }
}

#[async_trait]
impl ReviewStore for ReviewRepository {
    async fn review_by_id(&self, review_id: &str) -> Result<Option<ReviewRecord>, StoreError> {
        let document = self.reviews().find_one(doc! { "_id": review_id }).await?;
        Ok(document.map(ReviewDocument::into_record))
    }

    async fn comments_for_review(
        &self,
        review_id: &str,
    ) -> Result<Vec<CommentRecord>, StoreError> {
        let cursor = self
            .comments()
            .find(doc! { "review_id": review_id })
            .sort(doc! { "created_at": 1 })
            .await?;

        let documents: Vec<CommentDocument> = cursor.try_collect().await?;
        Ok(documents
            .into_iter()
            .map(CommentDocument::into_record)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_document_round_trip() {
        let raw = doc! {
            "_id": "rev-1",
            "title": "Add retries",
            "description": null,
            "status": "approved",
            "source_type": "pull_request",
            "source_id": "17",
            "source_url": "https://github.com/acme/app/pull/17",
            "repository_name": null,
            "repository_url": null,
            "branch_name": "feature/retries",
            "commit_sha": null,
            "author_id": "u1",
            "author_name": "Dana",
            "created_at": BsonDateTime::now(),
            "updated_at": BsonDateTime::now(),
        };

        let document: ReviewDocument = bson::from_document(raw).unwrap();
        let record = document.into_record();

        assert_eq!(record.id, "rev-1");
        assert_eq!(record.status, ReviewStatus::Approved);
        assert_eq!(record.branch_name.as_deref(), Some("feature/retries"));
        assert!(record.description.is_none());
    }

    #[test]
    fn test_comment_document_round_trip() {
        let raw = doc! {
            "_id": "c1",
            "review_id": "rev-1",
            "content": "tighten this",
            "author_id": null,
            "author_name": "Robin",
            "created_at": BsonDateTime::now(),
            "resolved": true,
            "severity": "warning",
            "file_path": "src/a.rs",
            "line_start": 12,
        };

        let document: CommentDocument = bson::from_document(raw).unwrap();
        let record = document.into_record();

        assert_eq!(record.id, "c1");
        assert!(record.resolved);
        assert_eq!(record.file_path.as_deref(), Some("src/a.rs"));
        assert_eq!(record.line_start, Some(12));
    }
}
