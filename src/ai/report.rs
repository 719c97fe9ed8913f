use crate::ai::extract::parse_value;
use crate::ai::truncate_chars;
use crate::ai::validate::validate_test_report;
use crate::error::EngineError;
use crate::llm::{ChatMessage, ModelClient};
use crate::types::{ReportContext, TestReportResult};

const MAX_COMMENT_CHARS: usize = 400;
const MAX_PATCH_CHARS: usize = 2000;

const REPORT_SYSTEM_PROMPT: &str = r#"You are writing the final test report for a completed code review.

## Your Role
Assess the review as a whole: what was done, what was found, and whether the change should be accepted.

## Response Format
Respond ONLY with valid JSON (no markdown, no explanation):
{
    "summary": "Executive summary of the review",
    "overall_analysis": "Detailed analysis of findings and resolution",
    "score": 0-100,
    "max_score": 100,
    "recommendation": "MERGE"|"NEEDS_CHANGES"|"REJECT",
    "recommendation_reason": "Why this recommendation",
    "acceptance_suggestion": "Conditions under which the change can be accepted",
    "key_findings": ["..."],
    "concerns": ["..."],
    "positives": ["..."],
    "suggestions": ["..."]
}"#;

/// Renders a [`ReportContext`] into one prompt, issues a single adapter call,
/// and validates the output into a [`TestReportResult`].
pub struct ReportGenerator;

impl ReportGenerator {
    pub fn new() -> Self {
        Self
    }

    pub async fn generate(
        &self,
        client: &dyn ModelClient,
        context: &ReportContext,
        additional_context: Option<&str>,
    ) -> Result<TestReportResult, EngineError> {
        // A report without an underlying execution identity is meaningless;
        // bail before spending a provider call.
        if context.execution.is_none() {
            return Err(EngineError::MissingExecution);
        }

        let prompt = render_prompt(context, additional_context);
        let messages = vec![
            ChatMessage::system(REPORT_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];

        let completion = client.chat(&messages).await?;

        let value = parse_value(&completion.content)?;
        let mut report = validate_test_report(&value)?;
        report.score = report.score.clamp(0.0, report.max_score);

        tracing::debug!(
            score = report.score,
            recommendation = ?report.recommendation,
            "test report generated"
        );

        Ok(report)
    }
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn or_na(value: Option<&str>) -> &str {
    match value {
        Some(s) if !s.is_empty() => s,
        _ => "N/A",
    }
}

/// Every populated context field is serialized; absent fields render as an
/// explicit "N/A" so the model is never silently missing context.
fn render_prompt(context: &ReportContext, additional_context: Option<&str>) -> String {
    let mut prompt = String::new();

    if let Some(execution) = &context.execution {
        prompt.push_str(&format!(
            "## Execution\n\
             - ID: {}\n\
             - Title: {}\n\
             - Description: {}\n\
             - Status: {:?}\n\
             - Source: {} ({})\n\
             - Source URL: {}\n\
             - Author: {}\n\
             - Created: {}\n\
             - Updated: {}\n",
            execution.id,
            execution.title,
            or_na(execution.description.as_deref()),
            execution.status,
            or_na(execution.source_type.as_deref()),
            or_na(execution.source_id.as_deref()),
            or_na(execution.source_url.as_deref()),
            or_na(execution.author_name.as_deref()),
            execution.created_at.to_rfc3339(),
            execution.updated_at.to_rfc3339(),
        ));
    }

    prompt.push_str("\n## Repository\n");
    match &context.plan {
        Some(plan) => {
            prompt.push_str(&format!(
                "- Repository: {}\n\
                 - URL: {}\n\
                 - Branch: {}\n\
                 - Commit: {}\n\
                 - Pull Request: {}\n",
                or_na(plan.repository_name.as_deref()),
                or_na(plan.repository_url.as_deref()),
                or_na(plan.branch_name.as_deref()),
                or_na(plan.commit_sha.as_deref()),
                plan.pull_request_id
                    .map(|n| format!("#{}", n))
                    .unwrap_or_else(|| "N/A".to_string()),
            ));
        }
        None => prompt.push_str("N/A\n"),
    }

    prompt.push_str(&format!("\n## Tasks ({})\n", context.tasks.len()));
    if context.tasks.is_empty() {
        prompt.push_str("N/A\n");
    } else {
        for task in &context.tasks {
            prompt.push_str(&format!(
                "- [{:?}] {} (assignee: {})\n",
                task.status,
                task.title,
                or_na(task.assignee_name.as_deref()),
            ));
        }
    }

    let conv = &context.conversation;
    prompt.push_str(&format!(
        "\n## Conversation ({} comments, {} resolved, {} unresolved)\n",
        conv.total_comments, conv.resolved_comments, conv.unresolved_comments
    ));
    if conv.comments.is_empty() {
        prompt.push_str("N/A\n");
    } else {
        for comment in &conv.comments {
            let location = match (&comment.file_path, comment.line_start) {
                (Some(path), Some(line)) => format!("{}:{}", path, line),
                (Some(path), None) => path.clone(),
                _ => "general".to_string(),
            };
            prompt.push_str(&format!(
                "- [{}] {} ({}): {}\n",
                if comment.is_resolved {
                    "resolved"
                } else {
                    "unresolved"
                },
                or_na(comment.author_name.as_deref()),
                location,
                truncate_chars(&comment.content, MAX_COMMENT_CHARS),
            ));
        }
    }

    prompt.push_str("\n## Pull Request Diff\n");
    match &context.pr_diff {
        Some(diff) => {
            prompt.push_str(&format!(
                "{}/{} #{} (+{} -{} across {} files)\n",
                diff.owner,
                diff.repo,
                diff.pull_number,
                diff.total_additions,
                diff.total_deletions,
                diff.files.len()
            ));
            for file in &diff.files {
                prompt.push_str(&format!(
                    "### {} ({}, +{} -{})\n{}\n",
                    file.filename,
                    file.status,
                    file.additions,
                    file.deletions,
                    file.patch
                        .as_deref()
                        .map(|p| truncate_chars(p, MAX_PATCH_CHARS))
                        .unwrap_or_else(|| "N/A".to_string()),
                ));
            }
        }
        None => prompt.push_str("N/A\n"),
    }

    prompt.push_str(&format!(
        "\n## Additional Context\n{}\n",
        or_na(additional_context)
    ));

    prompt.push_str("\nWrite the test report. Return JSON only.");
    prompt
}
