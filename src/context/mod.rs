pub mod tasks;

use std::sync::Arc;

use chrono::Utc;

use crate::error::EngineError;
use crate::ports::{CommentRecord, DiffClient, PrParams, ReviewRecord, ReviewStore};
use crate::types::{
    CommentInfo, ConversationSummary, ExecutionInfo, PlanInfo, PrDiff, ReportContext,
};

/// Assembles one immutable [`ReportContext`] snapshot from scattered,
/// partially-available domain data. Built fresh for every generation
/// attempt; nothing is cached across review mutations.
pub struct ContextCollector {
    reviews: Arc<dyn ReviewStore>,
    diffs: Option<Arc<dyn DiffClient>>,
}

impl ContextCollector {
    pub fn new(reviews: Arc<dyn ReviewStore>) -> Self {
        Self {
            reviews,
            diffs: None,
        }
    }

    pub fn with_diff_client(mut self, diffs: Arc<dyn DiffClient>) -> Self {
        self.diffs = Some(diffs);
        self
    }

    /// Runs the four sub-fetches concurrently. A missing review yields a
    /// context with `execution: None`; a missing or failing diff yields
    /// `pr_diff: None`. Only a hard store failure aborts collection.
    pub async fn collect(
        &self,
        review_id: &str,
        pr_params: Option<&PrParams>,
    ) -> Result<ReportContext, EngineError> {
        let (record, task_comments, conversation_comments, pr_diff) = tokio::join!(
            self.reviews.review_by_id(review_id),
            self.reviews.comments_for_review(review_id),
            self.reviews.comments_for_review(review_id),
            self.fetch_diff(pr_params),
        );

        let record = record?;
        let tasks = tasks::infer_tasks(&task_comments?);
        let conversation = summarize_conversation(conversation_comments?);

        if record.is_none() {
            tracing::debug!(
                review_id,
                "review not found; collecting context without execution data"
            );
        }

        let plan = record.as_ref().map(derive_plan);
        let execution = record.map(execution_info);

        Ok(ReportContext {
            execution,
            plan,
            tasks,
            conversation,
            pr_diff,
            collected_at: Utc::now(),
        })
    }

    /// Diff data is enrichment, not a precondition: failures are logged and
    /// swallowed.
    async fn fetch_diff(&self, params: Option<&PrParams>) -> Option<PrDiff> {
        let params = params?;
        let client = self.diffs.as_ref()?;

        match client.get_diff(params).await {
            Ok(diff) => Some(diff),
            Err(e) => {
                tracing::warn!(
                    owner = %params.owner,
                    repo = %params.repo,
                    pull_number = params.pull_number,
                    error = %e,
                    "diff fetch failed; continuing without diff"
                );
                None
            }
        }
    }
}

fn execution_info(record: ReviewRecord) -> ExecutionInfo {
    ExecutionInfo {
        id: record.id,
        title: record.title,
        description: record.description,
        status: record.status,
        source_type: record.source_type,
        source_id: record.source_id,
        source_url: record.source_url,
        author_id: record.author_id,
        author_name: record.author_name,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

/// Derived synchronously from the execution record; it has no failure mode
/// of its own.
fn derive_plan(record: &ReviewRecord) -> PlanInfo {
    let parsed = record.source_url.as_deref().and_then(parse_pull_request_url);

    PlanInfo {
        repository_name: record.repository_name.clone().or_else(|| {
            parsed
                .as_ref()
                .map(|p| format!("{}/{}", p.owner, p.repo))
        }),
        repository_url: record.repository_url.clone(),
        branch_name: record.branch_name.clone(),
        commit_sha: record.commit_sha.clone(),
        pull_request_id: parsed.as_ref().map(|p| p.number),
        pull_request_url: parsed.and_then(|_| record.source_url.clone()),
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ParsedSourceUrl {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

/// Parses a GitHub-style pull request URL: `.../{owner}/{repo}/pull/{n}`.
pub(crate) fn parse_pull_request_url(url: &str) -> Option<ParsedSourceUrl> {
    let path = url.split("://").last().unwrap_or(url);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let pull_index = segments.iter().position(|s| *s == "pull")?;
    if pull_index < 3 {
        // Need host, owner, and repo ahead of the pull segment.
        return None;
    }
    let number: u64 = segments.get(pull_index + 1)?.parse().ok()?;

    Some(ParsedSourceUrl {
        owner: segments[pull_index - 2].to_string(),
        repo: segments[pull_index - 1].to_string(),
        number,
    })
}

fn summarize_conversation(comments: Vec<CommentRecord>) -> ConversationSummary {
    let resolved = comments.iter().filter(|c| c.resolved).count();

    ConversationSummary {
        total_comments: comments.len(),
        resolved_comments: resolved,
        unresolved_comments: comments.len() - resolved,
        comments: comments
            .into_iter()
            .map(|c| CommentInfo {
                id: c.id,
                content: c.content,
                author_name: c.author_name,
                created_at: c.created_at,
                is_resolved: c.resolved,
                severity: c.severity,
                file_path: c.file_path,
                line_start: c.line_start,
            })
            .collect(),
    }
}
