use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::TokenUsage;

// ============================================================================
// REVIEW RESULT SHAPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Approval {
    Approve,
    RequestChanges,
    Comment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewComment {
    pub line: u32,
    pub severity: Severity,
    pub category: String,
    pub comment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Per-diff review verdict for a single file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResult {
    pub summary: String,
    pub comments: Vec<ReviewComment>,
    pub approval: Approval,
    /// Clamped to [0, 10] at validation time.
    pub score: u8,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VulnSeverity {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vulnerability {
    pub line: u32,
    pub severity: VulnSeverity,
    #[serde(rename = "type")]
    pub vuln_type: String,
    pub description: String,
    pub impact: String,
    pub remediation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityReviewResult {
    pub vulnerabilities: Vec<Vulnerability>,
    pub security_score: u8,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrReviewResult {
    pub summary: String,
    pub key_changes: Vec<String>,
    pub concerns: Vec<String>,
    pub suggestions: Vec<String>,
    pub testing_recommendations: Vec<String>,
    pub approval: Approval,
    pub score: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReviewResult {
    pub path: String,
    pub review: ReviewResult,
}

/// Combined verdict over a multi-file review request. Built once, never
/// mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedReviewResult {
    pub results: Vec<FileReviewResult>,
    /// Mean of per-file scores, rounded half-up.
    pub aggregate_score: u8,
}

// ============================================================================
// EXECUTION LIFECYCLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Draft,
    InProgress,
    ChangesRequested,
    Approved,
    Rejected,
    Closed,
}

impl ReviewStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Closed)
    }

    /// Maps a terminal review status to the report recommendation. Anything
    /// that is not an outright approval or rejection asks for changes.
    pub fn recommendation(&self) -> Recommendation {
        match self {
            Self::Approved => Recommendation::Merge,
            Self::Rejected => Recommendation::Reject,
            _ => Recommendation::NeedsChanges,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Merge,
    NeedsChanges,
    Reject,
}

// ============================================================================
// REPORT CONTEXT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionInfo {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: ReviewStatus,
    pub source_type: Option<String>,
    pub source_id: Option<String>,
    pub source_url: Option<String>,
    pub author_id: Option<String>,
    pub author_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanInfo {
    pub repository_name: Option<String>,
    pub repository_url: Option<String>,
    pub branch_name: Option<String>,
    pub commit_sha: Option<String>,
    pub pull_request_id: Option<u64>,
    pub pull_request_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

/// A unit of review work inferred from comment threads. Derived data, not
/// authoritative: a real task system can replace the inference without
/// changing this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    pub task_id: String,
    pub title: String,
    pub status: TaskState,
    pub assignee_id: Option<String>,
    pub assignee_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentInfo {
    pub id: String,
    pub content: String,
    pub author_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_start: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub total_comments: usize,
    pub resolved_comments: usize,
    pub unresolved_comments: usize,
    pub comments: Vec<CommentInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffFile {
    pub filename: String,
    pub status: String,
    pub additions: u32,
    pub deletions: u32,
    pub changes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrDiff {
    pub owner: String,
    pub repo: String,
    pub pull_number: u64,
    pub files: Vec<DiffFile>,
    pub total_additions: u32,
    pub total_deletions: u32,
    pub total_changes: u32,
}

/// Immutable snapshot of everything report generation may draw on. Built
/// fresh for every generation attempt; staleness is bounded by
/// `collected_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportContext {
    pub execution: Option<ExecutionInfo>,
    pub plan: Option<PlanInfo>,
    pub tasks: Vec<TaskInfo>,
    pub conversation: ConversationSummary,
    pub pr_diff: Option<PrDiff>,
    pub collected_at: DateTime<Utc>,
}

impl ReportContext {
    pub fn completed_task_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskState::Completed)
            .count()
    }
}

// ============================================================================
// TEST REPORT
// ============================================================================

pub const DEFAULT_MAX_SCORE: f64 = 100.0;

/// Final structured report for a completed review. All fields are required
/// when validating model output; the engine only fills defaults for reports
/// it fabricates itself (see [`TestReportResult::context_only`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReportResult {
    pub summary: String,
    pub overall_analysis: String,
    /// Clamped to [0, max_score] at validation time.
    pub score: f64,
    pub max_score: f64,
    pub recommendation: Recommendation,
    pub recommendation_reason: String,
    pub acceptance_suggestion: String,
    pub key_findings: Vec<String>,
    pub concerns: Vec<String>,
    pub positives: Vec<String>,
    pub suggestions: Vec<String>,
}

impl TestReportResult {
    /// Fallback report built when AI generation fails: the AI-derived fields
    /// stay empty, only the recommendation (mapped from the review status)
    /// and a fixed notice are filled in.
    pub fn context_only(recommendation: Recommendation) -> Self {
        Self {
            summary: "AI analysis was unavailable; report generated from review context only."
                .to_string(),
            overall_analysis: String::new(),
            score: 0.0,
            max_score: DEFAULT_MAX_SCORE,
            recommendation,
            recommendation_reason: "Derived from the final review status.".to_string(),
            acceptance_suggestion: String::new(),
            key_findings: Vec::new(),
            concerns: Vec::new(),
            positives: Vec::new(),
            suggestions: Vec::new(),
        }
    }
}

// ============================================================================
// TRIGGER OUTCOME
// ============================================================================

/// Return contract of the completion trigger. Ephemeral, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TriggerOutcome {
    pub fn success(report_id: impl Into<String>) -> Self {
        Self {
            success: true,
            report_id: Some(report_id.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            report_id: None,
            error: Some(error.into()),
        }
    }
}
