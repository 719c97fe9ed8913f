use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::ai::report::ReportGenerator;
use crate::context::{parse_pull_request_url, ContextCollector};
use crate::error::{EngineError, StoreError};
use crate::llm::ModelClient;
use crate::ports::{PrParams, ReportRecord, ReportStore, ReviewStore};
use crate::types::{ReportContext, ReviewStatus, TestReportResult, TriggerOutcome};

/// Watches for reviews entering a terminal status and generates the final
/// test report exactly once per review. Failures never propagate into the
/// caller's own state transition; the worst case is a context-only report.
pub struct CompletionTrigger {
    reviews: Arc<dyn ReviewStore>,
    reports: Arc<dyn ReportStore>,
    collector: ContextCollector,
    generator: ReportGenerator,
    client: Box<dyn ModelClient>,
}

impl CompletionTrigger {
    pub fn new(
        reviews: Arc<dyn ReviewStore>,
        reports: Arc<dyn ReportStore>,
        collector: ContextCollector,
        client: Box<dyn ModelClient>,
    ) -> Self {
        Self {
            reviews,
            reports,
            collector,
            generator: ReportGenerator::new(),
            client,
        }
    }

    /// Observer entry point. Idempotent: a review that already has a report
    /// returns the existing report id without generating anything.
    pub async fn on_review_completed(
        &self,
        review_id: &str,
        status: ReviewStatus,
    ) -> TriggerOutcome {
        if !status.is_terminal() {
            return TriggerOutcome::failure(format!(
                "review {} is not in a terminal status ({:?})",
                review_id, status
            ));
        }

        match self.run(review_id, status).await {
            Ok(report_id) => TriggerOutcome::success(report_id),
            Err(e) => {
                tracing::error!(review_id, error = %e, "report generation failed");
                TriggerOutcome::failure(e.to_string())
            }
        }
    }

    /// Fire-and-forget variant: the caller's state transition must not block
    /// on report generation, so the outcome is only logged.
    pub fn spawn_on_review_completed(self: &Arc<Self>, review_id: String, status: ReviewStatus) {
        let trigger = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = trigger.on_review_completed(&review_id, status).await;
            match outcome.report_id {
                Some(report_id) => {
                    tracing::info!(review_id = %review_id, report_id = %report_id, "completion report ready");
                }
                None => {
                    tracing::error!(
                        review_id = %review_id,
                        error = outcome.error.as_deref().unwrap_or("unknown"),
                        "completion report skipped"
                    );
                }
            }
        });
    }

    async fn run(&self, review_id: &str, status: ReviewStatus) -> Result<String, EngineError> {
        if let Some(existing) = self.reports.report_by_execution(review_id).await? {
            tracing::debug!(review_id, report_id = %existing.id, "report already exists");
            return Ok(existing.id);
        }

        let pr_params = self.derive_pr_params(review_id).await;
        let context = self.collector.collect(review_id, pr_params.as_ref()).await?;

        let recommendation = status.recommendation();
        let (mut result, degraded) = match self
            .generator
            .generate(self.client.as_ref(), &context, None)
            .await
        {
            Ok(result) => (result, false),
            Err(e) => {
                tracing::warn!(
                    review_id,
                    code = ?e.code(),
                    error = %e,
                    "falling back to context-only report"
                );
                (TestReportResult::context_only(recommendation), true)
            }
        };
        // The persisted verdict always follows the review's own outcome.
        result.recommendation = recommendation;

        let record = build_record(review_id, &context, result, degraded);

        match self.reports.create_report(&record).await {
            Ok(report_id) => Ok(report_id),
            // A concurrent trigger won the lookup-then-create race; return
            // the winner's report.
            Err(StoreError::Duplicate(_)) => {
                let existing = self
                    .reports
                    .report_by_execution(review_id)
                    .await?
                    .ok_or_else(|| {
                        StoreError::Backend(format!(
                            "duplicate reported for review {} but no report found",
                            review_id
                        ))
                    })?;
                tracing::debug!(review_id, report_id = %existing.id, "lost creation race");
                Ok(existing.id)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Pull request coordinates for the diff sub-fetch, read from the
    /// review's source URL. Best-effort; a review without a PR URL simply
    /// gets no diff.
    async fn derive_pr_params(&self, review_id: &str) -> Option<PrParams> {
        let record = self.reviews.review_by_id(review_id).await.ok()??;
        let parsed = parse_pull_request_url(record.source_url.as_deref()?)?;
        Some(PrParams {
            owner: parsed.owner,
            repo: parsed.repo,
            pull_number: parsed.number,
        })
    }
}

fn build_record(
    review_id: &str,
    context: &ReportContext,
    result: TestReportResult,
    degraded: bool,
) -> ReportRecord {
    ReportRecord {
        id: Uuid::new_v4().to_string(),
        execution_id: review_id.to_string(),
        result,
        repository_name: context
            .plan
            .as_ref()
            .and_then(|p| p.repository_name.clone()),
        branch_name: context.plan.as_ref().and_then(|p| p.branch_name.clone()),
        task_total: context.tasks.len() as u32,
        task_completed: context.completed_task_count() as u32,
        author_name: context
            .execution
            .as_ref()
            .and_then(|e| e.author_name.clone()),
        degraded,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedClient;
    use crate::ports::testing::{MemoryReportStore, MemoryReviewStore};
    use crate::ports::{CommentRecord, ReviewRecord};
    use crate::types::Recommendation;

    fn review(id: &str, status: ReviewStatus) -> ReviewRecord {
        ReviewRecord {
            id: id.to_string(),
            title: "Harden input validation".to_string(),
            description: None,
            status,
            source_type: Some("pull_request".to_string()),
            source_id: Some("9".to_string()),
            source_url: Some("https://github.com/acme/app/pull/9".to_string()),
            repository_name: Some("acme/app".to_string()),
            repository_url: None,
            branch_name: Some("hardening".to_string()),
            commit_sha: None,
            author_id: Some("u1".to_string()),
            author_name: Some("Dana".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn comment(id: &str, resolved: bool) -> CommentRecord {
        CommentRecord {
            id: id.to_string(),
            content: "tighten the regex".to_string(),
            author_id: Some("u2".to_string()),
            author_name: Some("Robin".to_string()),
            created_at: Utc::now(),
            resolved,
            severity: None,
            file_path: Some("src/input.rs".to_string()),
            line_start: Some(12),
        }
    }

    fn report_json() -> &'static str {
        r#"{
            "summary": "well handled review",
            "overall_analysis": "all findings addressed",
            "score": 90,
            "max_score": 100,
            "recommendation": "NEEDS_CHANGES",
            "recommendation_reason": "model opinion",
            "acceptance_suggestion": "merge",
            "key_findings": [],
            "concerns": [],
            "positives": [],
            "suggestions": []
        }"#
    }

    fn trigger_with(
        reviews: MemoryReviewStore,
        reports: Arc<MemoryReportStore>,
        client: ScriptedClient,
    ) -> CompletionTrigger {
        let reviews: Arc<dyn ReviewStore> = Arc::new(reviews);
        CompletionTrigger::new(
            Arc::clone(&reviews),
            reports,
            ContextCollector::new(reviews),
            Box::new(client),
        )
    }

    #[tokio::test]
    async fn test_approved_review_produces_merge_report() {
        let reviews = MemoryReviewStore::default()
            .with_review(review("rev-1", ReviewStatus::Approved))
            .with_comments("rev-1", vec![comment("1", true), comment("2", false)]);
        let reports = Arc::new(MemoryReportStore::default());
        let trigger = trigger_with(reviews, Arc::clone(&reports), ScriptedClient::new().reply(report_json()));

        let outcome = trigger.on_review_completed("rev-1", ReviewStatus::Approved).await;

        assert!(outcome.success);
        let stored = reports
            .report_by_execution("rev-1")
            .await
            .unwrap()
            .unwrap();
        // The model said NEEDS_CHANGES; the terminal status wins.
        assert_eq!(stored.result.recommendation, Recommendation::Merge);
        assert!(!stored.degraded);
        assert_eq!(stored.repository_name.as_deref(), Some("acme/app"));
        assert_eq!(stored.task_total, 1);
        assert_eq!(stored.author_name.as_deref(), Some("Dana"));
        assert_eq!(reports.create_count(), 1);
    }

    #[tokio::test]
    async fn test_trigger_is_idempotent() {
        let reviews = MemoryReviewStore::default()
            .with_review(review("rev-1", ReviewStatus::Approved));
        let reports = Arc::new(MemoryReportStore::default());
        // Only one scripted reply: the second call must not reach the model.
        let trigger = trigger_with(reviews, Arc::clone(&reports), ScriptedClient::new().reply(report_json()));

        let first = trigger.on_review_completed("rev-1", ReviewStatus::Approved).await;
        let second = trigger.on_review_completed("rev-1", ReviewStatus::Approved).await;

        assert!(first.success);
        assert!(second.success);
        assert_eq!(first.report_id, second.report_id);
        assert_eq!(reports.create_count(), 1);
    }

    #[tokio::test]
    async fn test_generator_failure_degrades_to_context_only_report() {
        let reviews = MemoryReviewStore::default()
            .with_review(review("rev-1", ReviewStatus::Rejected))
            .with_comments("rev-1", vec![comment("1", true)]);
        let reports = Arc::new(MemoryReportStore::default());
        let trigger = trigger_with(
            reviews,
            Arc::clone(&reports),
            ScriptedClient::new().reply("I cannot produce JSON today."),
        );

        let outcome = trigger.on_review_completed("rev-1", ReviewStatus::Rejected).await;

        assert!(outcome.success);
        let stored = reports
            .report_by_execution("rev-1")
            .await
            .unwrap()
            .unwrap();
        assert!(stored.degraded);
        assert_eq!(stored.result.recommendation, Recommendation::Reject);
        assert!(stored.result.overall_analysis.is_empty());
        assert_eq!(stored.task_total, 1);
        assert_eq!(stored.task_completed, 1);
    }

    #[tokio::test]
    async fn test_non_terminal_status_is_skipped() {
        let reviews = MemoryReviewStore::default()
            .with_review(review("rev-1", ReviewStatus::InProgress));
        let reports = Arc::new(MemoryReportStore::default());
        let client = ScriptedClient::new();
        let trigger = trigger_with(reviews, Arc::clone(&reports), client);

        let outcome = trigger
            .on_review_completed("rev-1", ReviewStatus::InProgress)
            .await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("not in a terminal status"));
        assert_eq!(reports.create_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_review_maps_to_needs_changes() {
        let reviews = MemoryReviewStore::default()
            .with_review(review("rev-1", ReviewStatus::Closed));
        let reports = Arc::new(MemoryReportStore::default());
        let trigger = trigger_with(reviews, Arc::clone(&reports), ScriptedClient::new().reply(report_json()));

        let outcome = trigger.on_review_completed("rev-1", ReviewStatus::Closed).await;

        assert!(outcome.success);
        let stored = reports
            .report_by_execution("rev-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.result.recommendation, Recommendation::NeedsChanges);
    }

    #[tokio::test]
    async fn test_deleted_review_still_gets_degraded_report() {
        // Review vanished mid-flight: the generator refuses (no execution
        // identity) and the trigger degrades instead of failing.
        let reviews = MemoryReviewStore::default();
        let reports = Arc::new(MemoryReportStore::default());
        let client = ScriptedClient::new();
        let trigger = trigger_with(reviews, Arc::clone(&reports), client);

        let outcome = trigger.on_review_completed("ghost", ReviewStatus::Approved).await;

        assert!(outcome.success);
        let stored = reports
            .report_by_execution("ghost")
            .await
            .unwrap()
            .unwrap();
        assert!(stored.degraded);
        assert!(stored.repository_name.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_create_resolves_to_existing_report() {
        let reviews = MemoryReviewStore::default()
            .with_review(review("rev-1", ReviewStatus::Approved));
        let reports = Arc::new(MemoryReportStore::default());

        // Simulate a concurrent winner between lookup and create.
        let winner = ReportRecord {
            id: "winner".to_string(),
            execution_id: "rev-1".to_string(),
            result: TestReportResult::context_only(Recommendation::Merge),
            repository_name: None,
            branch_name: None,
            task_total: 0,
            task_completed: 0,
            author_name: None,
            degraded: false,
            created_at: Utc::now(),
        };

        struct RacingStore {
            inner: Arc<MemoryReportStore>,
            winner: ReportRecord,
            raced: std::sync::atomic::AtomicBool,
        }

        #[async_trait::async_trait]
        impl ReportStore for RacingStore {
            async fn report_by_execution(
                &self,
                execution_id: &str,
            ) -> Result<Option<ReportRecord>, StoreError> {
                // First lookup sees nothing; after the race the winner exists.
                if self.raced.load(std::sync::atomic::Ordering::SeqCst) {
                    Ok(Some(self.winner.clone()))
                } else {
                    self.inner.report_by_execution(execution_id).await
                }
            }

            async fn create_report(&self, record: &ReportRecord) -> Result<String, StoreError> {
                self.raced.store(true, std::sync::atomic::Ordering::SeqCst);
                let _ = record;
                Err(StoreError::Duplicate("rev-1".to_string()))
            }

            async fn update_report(&self, record: &ReportRecord) -> Result<(), StoreError> {
                self.inner.update_report(record).await
            }
        }

        let racing = Arc::new(RacingStore {
            inner: Arc::clone(&reports),
            winner,
            raced: std::sync::atomic::AtomicBool::new(false),
        });

        let reviews: Arc<dyn ReviewStore> = Arc::new(reviews);
        let trigger = CompletionTrigger::new(
            Arc::clone(&reviews),
            racing,
            ContextCollector::new(reviews),
            Box::new(ScriptedClient::new().reply(report_json())),
        );

        let outcome = trigger.on_review_completed("rev-1", ReviewStatus::Approved).await;

        assert!(outcome.success);
        assert_eq!(outcome.report_id.as_deref(), Some("winner"));
    }

    #[tokio::test]
    async fn test_fire_and_forget_does_not_block_caller() {
        let reviews = MemoryReviewStore::default()
            .with_review(review("rev-1", ReviewStatus::Approved));
        let reports = Arc::new(MemoryReportStore::default());
        let trigger = Arc::new(trigger_with(
            reviews,
            Arc::clone(&reports),
            ScriptedClient::new().reply(report_json()),
        ));

        trigger.spawn_on_review_completed("rev-1".to_string(), ReviewStatus::Approved);

        // The spawned task owns the work; wait for it to land.
        for _ in 0..50 {
            if reports.report_by_execution("rev-1").await.unwrap().is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(reports
            .report_by_execution("rev-1")
            .await
            .unwrap()
            .is_some());
    }
}
