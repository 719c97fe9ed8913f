use futures::future::try_join_all;

use crate::ai::extract::parse_value;
use crate::ai::truncate_chars;
use crate::ai::validate::{validate_pr_review, validate_review, validate_security_review};
use crate::error::EngineError;
use crate::llm::{ChatMessage, ModelClient};
use crate::types::{
    AggregatedReviewResult, FileReviewResult, PrReviewResult, SecurityReviewResult,
};

const DEFAULT_MAX_DIFF_CHARS: usize = 24_000;

/// A changed file submitted for review.
#[derive(Debug, Clone)]
pub struct FileInput {
    pub path: String,
    pub diff: String,
}

const REVIEW_SYSTEM_PROMPT: &str = r#"You are a senior engineer reviewing a single file diff.

## Response Format
Respond ONLY with valid JSON (no markdown, no explanation):
{
    "summary": "One-paragraph assessment of the change",
    "comments": [
        {
            "line": 42,
            "severity": "error"|"warning"|"info",
            "category": "correctness"|"error_handling"|"performance"|"style"|"testing",
            "comment": "What is wrong and why it matters",
            "suggestion": "Concrete fix (optional)"
        }
    ],
    "approval": "approve"|"request_changes"|"comment",
    "score": 0-10
}"#;

const SECURITY_SYSTEM_PROMPT: &str = r#"You are a security engineer auditing a set of diffs for vulnerabilities.

## Response Format
Respond ONLY with valid JSON (no markdown, no explanation):
{
    "vulnerabilities": [
        {
            "line": 10,
            "severity": "critical"|"high"|"medium"|"low",
            "type": "Vulnerability class, e.g. sql_injection",
            "description": "What the flaw is",
            "impact": "What an attacker gains",
            "remediation": "How to fix it"
        }
    ],
    "security_score": 0-10,
    "summary": "Overall security posture of the change"
}"#;

const PR_REVIEW_SYSTEM_PROMPT: &str = r#"You are reviewing an entire pull request.

## Response Format
Respond ONLY with valid JSON (no markdown, no explanation):
{
    "summary": "What this pull request does",
    "key_changes": ["..."],
    "concerns": ["..."],
    "suggestions": ["..."],
    "testing_recommendations": ["..."],
    "approval": "approve"|"request_changes"|"comment",
    "score": 0-10
}"#;

/// Runs one adapter call per changed file and combines the validated results
/// into a single verdict. Any per-file failure fails the whole batch: a
/// partial score average would be misleading.
pub struct ReviewAggregator {
    max_diff_chars: usize,
}

impl ReviewAggregator {
    pub fn new() -> Self {
        Self {
            max_diff_chars: DEFAULT_MAX_DIFF_CHARS,
        }
    }

    pub fn with_max_diff_chars(mut self, max_diff_chars: usize) -> Self {
        self.max_diff_chars = max_diff_chars;
        self
    }

    pub async fn review_files(
        &self,
        client: &dyn ModelClient,
        files: &[FileInput],
    ) -> Result<AggregatedReviewResult, EngineError> {
        if files.is_empty() {
            return Err(EngineError::InvalidRequest(
                "at least one file is required".to_string(),
            ));
        }

        // Dispatched concurrently for latency; the semantics are the same as
        // sequential because the first failure aborts the batch.
        let results =
            try_join_all(files.iter().map(|file| self.review_file(client, file))).await?;

        let aggregate_score = aggregate_score(&results);
        Ok(AggregatedReviewResult {
            results,
            aggregate_score,
        })
    }

    async fn review_file(
        &self,
        client: &dyn ModelClient,
        file: &FileInput,
    ) -> Result<FileReviewResult, EngineError> {
        let prompt = format!(
            "## File\n{}\n\n## Diff\n{}\n\nReview this change. Return JSON only.",
            file.path,
            truncate_chars(&file.diff, self.max_diff_chars)
        );

        let messages = vec![
            ChatMessage::system(REVIEW_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];
        let completion = client.chat(&messages).await?;

        let value = parse_value(&completion.content)?;
        let mut review = validate_review(&value)?;
        review.model = client.model().to_string();
        review.token_usage = completion.token_usage;

        tracing::debug!(path = %file.path, score = review.score, "file reviewed");

        Ok(FileReviewResult {
            path: file.path.clone(),
            review,
        })
    }

    /// One call over all diffs; vulnerabilities tend to span files.
    pub async fn review_security(
        &self,
        client: &dyn ModelClient,
        files: &[FileInput],
    ) -> Result<SecurityReviewResult, EngineError> {
        if files.is_empty() {
            return Err(EngineError::InvalidRequest(
                "at least one file is required".to_string(),
            ));
        }

        let diffs = files
            .iter()
            .map(|f| {
                format!(
                    "=== {} ===\n{}",
                    f.path,
                    truncate_chars(&f.diff, self.max_diff_chars / files.len().max(1))
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let messages = vec![
            ChatMessage::system(SECURITY_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "## Diffs\n{}\n\nAudit these changes. Return JSON only.",
                diffs
            )),
        ];
        let completion = client.chat(&messages).await?;

        let value = parse_value(&completion.content)?;
        Ok(validate_security_review(&value)?)
    }

    pub async fn review_pull_request(
        &self,
        client: &dyn ModelClient,
        title: &str,
        description: Option<&str>,
        diff: &str,
    ) -> Result<PrReviewResult, EngineError> {
        let prompt = format!(
            "## Pull Request\n{}\n\n## Description\n{}\n\n## Diff\n{}\n\nReview this pull request. Return JSON only.",
            title,
            description.unwrap_or("N/A"),
            truncate_chars(diff, self.max_diff_chars)
        );

        let messages = vec![
            ChatMessage::system(PR_REVIEW_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];
        let completion = client.chat(&messages).await?;

        let value = parse_value(&completion.content)?;
        Ok(validate_pr_review(&value)?)
    }
}

impl Default for ReviewAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Arithmetic mean of per-file scores, rounded half-up (6.5 rounds to 7).
fn aggregate_score(results: &[FileReviewResult]) -> u8 {
    if results.is_empty() {
        return 0;
    }
    let sum: u32 = results.iter().map(|r| r.review.score as u32).sum();
    let mean = sum as f64 / results.len() as f64;
    (mean + 0.5).floor() as u8
}
