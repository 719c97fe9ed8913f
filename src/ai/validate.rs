//! Strict validation of extracted model output into result shapes.
//!
//! Structurally wrong data (missing or mistyped required fields, scalars
//! where sequences are expected, unknown enum values) is fatal; out-of-range
//! numeric scores are clamped, never rejected.

use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::types::{
    Approval, PrReviewResult, Recommendation, ReviewComment, ReviewResult, SecurityReviewResult,
    Severity, TestReportResult, VulnSeverity, Vulnerability,
};

const REVIEW_SCORE_MAX: f64 = 10.0;

type Obj = Map<String, Value>;

pub fn validate_review(value: &Value) -> Result<ReviewResult, ValidationError> {
    let obj = as_object(value, "review")?;

    let comments = require_array(obj, "comments")?
        .iter()
        .enumerate()
        .map(|(i, item)| validate_review_comment(item, i))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ReviewResult {
        summary: require_str(obj, "summary")?,
        comments,
        approval: parse_approval(&require_str(obj, "approval")?)?,
        score: clamp_score(require_f64(obj, "score")?),
        // Filled in by the caller from the adapter metadata.
        model: String::new(),
        token_usage: None,
    })
}

fn validate_review_comment(value: &Value, index: usize) -> Result<ReviewComment, ValidationError> {
    let path = format!("comments[{}]", index);
    let obj = as_object(value, &path)?;

    Ok(ReviewComment {
        line: require_line(obj, &format!("{}.line", path))?,
        severity: parse_severity(&require_str(obj, "severity")?)?,
        category: require_str(obj, "category")?,
        comment: require_str(obj, "comment")?,
        suggestion: optional_str(obj, "suggestion")?,
    })
}

pub fn validate_security_review(value: &Value) -> Result<SecurityReviewResult, ValidationError> {
    let obj = as_object(value, "security_review")?;

    let vulnerabilities = require_array(obj, "vulnerabilities")?
        .iter()
        .enumerate()
        .map(|(i, item)| validate_vulnerability(item, i))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SecurityReviewResult {
        vulnerabilities,
        security_score: clamp_score(require_f64(obj, "security_score")?),
        summary: require_str(obj, "summary")?,
    })
}

fn validate_vulnerability(value: &Value, index: usize) -> Result<Vulnerability, ValidationError> {
    let path = format!("vulnerabilities[{}]", index);
    let obj = as_object(value, &path)?;

    Ok(Vulnerability {
        line: require_line(obj, &format!("{}.line", path))?,
        severity: parse_vuln_severity(&require_str(obj, "severity")?)?,
        vuln_type: require_str(obj, "type")?,
        description: require_str(obj, "description")?,
        impact: require_str(obj, "impact")?,
        remediation: require_str(obj, "remediation")?,
    })
}

pub fn validate_pr_review(value: &Value) -> Result<PrReviewResult, ValidationError> {
    let obj = as_object(value, "pr_review")?;

    Ok(PrReviewResult {
        summary: require_str(obj, "summary")?,
        key_changes: require_string_array(obj, "key_changes")?,
        concerns: require_string_array(obj, "concerns")?,
        suggestions: require_string_array(obj, "suggestions")?,
        testing_recommendations: require_string_array(obj, "testing_recommendations")?,
        approval: parse_approval(&require_str(obj, "approval")?)?,
        score: clamp_score(require_f64(obj, "score")?),
    })
}

/// All eleven fields are required; no partial report is accepted.
pub fn validate_test_report(value: &Value) -> Result<TestReportResult, ValidationError> {
    let obj = as_object(value, "test_report")?;

    let max_score = require_f64(obj, "max_score")?;
    if !max_score.is_finite() || max_score <= 0.0 {
        return Err(ValidationError::field(
            "max_score",
            "must be a positive number",
        ));
    }

    let score = require_f64(obj, "score")?.clamp(0.0, max_score);

    Ok(TestReportResult {
        summary: require_str(obj, "summary")?,
        overall_analysis: require_str(obj, "overall_analysis")?,
        score,
        max_score,
        recommendation: parse_recommendation(&require_str(obj, "recommendation")?)?,
        recommendation_reason: require_str(obj, "recommendation_reason")?,
        acceptance_suggestion: require_str(obj, "acceptance_suggestion")?,
        key_findings: require_string_array(obj, "key_findings")?,
        concerns: require_string_array(obj, "concerns")?,
        positives: require_string_array(obj, "positives")?,
        suggestions: require_string_array(obj, "suggestions")?,
    })
}

// ----------------------------------------------------------------------------
// Field helpers
// ----------------------------------------------------------------------------

fn as_object<'a>(value: &'a Value, field: &str) -> Result<&'a Obj, ValidationError> {
    value
        .as_object()
        .ok_or_else(|| ValidationError::field(field, "expected a JSON object"))
}

fn require<'a>(obj: &'a Obj, field: &str) -> Result<&'a Value, ValidationError> {
    obj.get(field)
        .ok_or_else(|| ValidationError::field(field, "missing required field"))
}

fn require_str(obj: &Obj, field: &str) -> Result<String, ValidationError> {
    require(obj, field)?
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| ValidationError::field(field, "expected a string"))
}

/// Absent or `null` is fine; a present value of the wrong type is not.
fn optional_str(obj: &Obj, field: &str) -> Result<Option<String>, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ValidationError::field(field, "expected a string")),
    }
}

fn require_f64(obj: &Obj, field: &str) -> Result<f64, ValidationError> {
    require(obj, field)?
        .as_f64()
        .ok_or_else(|| ValidationError::field(field, "expected a number"))
}

fn require_line(obj: &Obj, field: &str) -> Result<u32, ValidationError> {
    require(obj, "line")?
        .as_u64()
        .map(|n| n.min(u32::MAX as u64) as u32)
        .ok_or_else(|| ValidationError::field(field, "expected a non-negative integer"))
}

/// A scalar where a sequence is expected fails validation outright.
fn require_array<'a>(obj: &'a Obj, field: &str) -> Result<&'a Vec<Value>, ValidationError> {
    require(obj, field)?
        .as_array()
        .ok_or_else(|| ValidationError::field(field, "expected an array"))
}

fn require_string_array(obj: &Obj, field: &str) -> Result<Vec<String>, ValidationError> {
    require_array(obj, field)?
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_str().map(|s| s.to_string()).ok_or_else(|| {
                ValidationError::field(format!("{}[{}]", field, i), "expected a string")
            })
        })
        .collect()
}

fn clamp_score(raw: f64) -> u8 {
    raw.clamp(0.0, REVIEW_SCORE_MAX).round() as u8
}

// ----------------------------------------------------------------------------
// Closed enum sets
// ----------------------------------------------------------------------------

fn parse_approval(s: &str) -> Result<Approval, ValidationError> {
    match s.to_lowercase().as_str() {
        "approve" => Ok(Approval::Approve),
        "request_changes" => Ok(Approval::RequestChanges),
        "comment" => Ok(Approval::Comment),
        other => Err(ValidationError::field(
            "approval",
            format!("unknown value `{}`", other),
        )),
    }
}

fn parse_severity(s: &str) -> Result<Severity, ValidationError> {
    match s.to_lowercase().as_str() {
        "error" => Ok(Severity::Error),
        "warning" => Ok(Severity::Warning),
        "info" => Ok(Severity::Info),
        other => Err(ValidationError::field(
            "severity",
            format!("unknown value `{}`", other),
        )),
    }
}

fn parse_vuln_severity(s: &str) -> Result<VulnSeverity, ValidationError> {
    match s.to_lowercase().as_str() {
        "critical" => Ok(VulnSeverity::Critical),
        "high" => Ok(VulnSeverity::High),
        "medium" => Ok(VulnSeverity::Medium),
        "low" => Ok(VulnSeverity::Low),
        other => Err(ValidationError::field(
            "severity",
            format!("unknown value `{}`", other),
        )),
    }
}

fn parse_recommendation(s: &str) -> Result<Recommendation, ValidationError> {
    match s.to_uppercase().as_str() {
        "MERGE" => Ok(Recommendation::Merge),
        "NEEDS_CHANGES" => Ok(Recommendation::NeedsChanges),
        "REJECT" => Ok(Recommendation::Reject),
        other => Err(ValidationError::field(
            "recommendation",
            format!("unknown value `{}`", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn review_value() -> Value {
        json!({
            "summary": "Solid change with one concern",
            "comments": [
                {
                    "line": 42,
                    "severity": "warning",
                    "category": "error_handling",
                    "comment": "missing error propagation",
                    "suggestion": "use the ? operator"
                }
            ],
            "approval": "comment",
            "score": 7
        })
    }

    #[test]
    fn test_validate_review_happy_path() {
        let review = validate_review(&review_value()).unwrap();
        assert_eq!(review.score, 7);
        assert_eq!(review.approval, Approval::Comment);
        assert_eq!(review.comments.len(), 1);
        assert_eq!(review.comments[0].severity, Severity::Warning);
        assert_eq!(
            review.comments[0].suggestion.as_deref(),
            Some("use the ? operator")
        );
    }

    #[test]
    fn test_review_score_clamped_not_rejected() {
        let mut value = review_value();
        value["score"] = json!(15);
        assert_eq!(validate_review(&value).unwrap().score, 10);

        value["score"] = json!(-3);
        assert_eq!(validate_review(&value).unwrap().score, 0);
    }

    #[test]
    fn test_review_missing_summary_fails() {
        let mut value = review_value();
        value.as_object_mut().unwrap().remove("summary");
        let err = validate_review(&value).unwrap_err();
        assert!(err.to_string().contains("summary"));
    }

    #[test]
    fn test_review_wrong_score_type_fails() {
        let mut value = review_value();
        value["score"] = json!("seven");
        assert!(validate_review(&value).is_err());
    }

    #[test]
    fn test_review_scalar_comments_fails() {
        let mut value = review_value();
        value["comments"] = json!("no comments");
        let err = validate_review(&value).unwrap_err();
        assert!(err.to_string().contains("expected an array"));
    }

    #[test]
    fn test_review_unknown_approval_fails() {
        let mut value = review_value();
        value["approval"] = json!("maybe");
        assert!(validate_review(&value).is_err());
    }

    #[test]
    fn test_review_null_suggestion_is_none() {
        let mut value = review_value();
        value["comments"][0]["suggestion"] = Value::Null;
        let review = validate_review(&value).unwrap();
        assert!(review.comments[0].suggestion.is_none());
    }

    #[test]
    fn test_validate_security_review() {
        let value = json!({
            "vulnerabilities": [
                {
                    "line": 10,
                    "severity": "high",
                    "type": "sql_injection",
                    "description": "raw string interpolation into query",
                    "impact": "database compromise",
                    "remediation": "use bound parameters"
                }
            ],
            "security_score": 12,
            "summary": "one high severity finding"
        });
        let result = validate_security_review(&value).unwrap();
        assert_eq!(result.vulnerabilities.len(), 1);
        assert_eq!(result.vulnerabilities[0].severity, VulnSeverity::High);
        assert_eq!(result.security_score, 10);
    }

    #[test]
    fn test_security_review_unknown_severity_fails() {
        let value = json!({
            "vulnerabilities": [
                {
                    "line": 10,
                    "severity": "catastrophic",
                    "type": "x",
                    "description": "y",
                    "impact": "z",
                    "remediation": "w"
                }
            ],
            "security_score": 5,
            "summary": "s"
        });
        assert!(validate_security_review(&value).is_err());
    }

    fn pr_review_value() -> Value {
        json!({
            "summary": "refactors the parser",
            "key_changes": ["extracted tokenizer"],
            "concerns": [],
            "suggestions": ["add fuzz tests"],
            "testing_recommendations": ["run the corpus suite"],
            "approval": "approve",
            "score": 9
        })
    }

    #[test]
    fn test_validate_pr_review() {
        let result = validate_pr_review(&pr_review_value()).unwrap();
        assert_eq!(result.approval, Approval::Approve);
        assert_eq!(result.key_changes.len(), 1);
        assert_eq!(result.score, 9);
    }

    #[test]
    fn test_pr_review_scalar_concerns_fails() {
        let mut value = pr_review_value();
        value["concerns"] = json!("none");
        assert!(validate_pr_review(&value).is_err());
    }

    fn test_report_value() -> Value {
        json!({
            "summary": "review went well",
            "overall_analysis": "all tasks were resolved",
            "score": 88,
            "max_score": 100,
            "recommendation": "MERGE",
            "recommendation_reason": "no unresolved findings",
            "acceptance_suggestion": "merge after CI",
            "key_findings": ["good test coverage"],
            "concerns": [],
            "positives": ["clear commit history"],
            "suggestions": ["add a changelog entry"]
        })
    }

    #[test]
    fn test_validate_test_report_happy_path() {
        let report = validate_test_report(&test_report_value()).unwrap();
        assert_eq!(report.score, 88.0);
        assert_eq!(report.recommendation, Recommendation::Merge);
        assert_eq!(report.key_findings.len(), 1);
    }

    #[test]
    fn test_test_report_every_field_required() {
        let fields = [
            "summary",
            "overall_analysis",
            "score",
            "max_score",
            "recommendation",
            "recommendation_reason",
            "acceptance_suggestion",
            "key_findings",
            "concerns",
            "positives",
            "suggestions",
        ];
        for field in fields {
            let mut value = test_report_value();
            value.as_object_mut().unwrap().remove(field);
            assert!(
                validate_test_report(&value).is_err(),
                "expected failure without `{}`",
                field
            );
        }
    }

    #[test]
    fn test_test_report_score_clamped_to_max_score() {
        let mut value = test_report_value();
        value["score"] = json!(150);
        assert_eq!(validate_test_report(&value).unwrap().score, 100.0);

        value["score"] = json!(-5);
        assert_eq!(validate_test_report(&value).unwrap().score, 0.0);
    }

    #[test]
    fn test_test_report_custom_max_score() {
        let mut value = test_report_value();
        value["max_score"] = json!(10);
        value["score"] = json!(42);
        let report = validate_test_report(&value).unwrap();
        assert_eq!(report.max_score, 10.0);
        assert_eq!(report.score, 10.0);
    }

    #[test]
    fn test_test_report_non_positive_max_score_fails() {
        let mut value = test_report_value();
        value["max_score"] = json!(0);
        assert!(validate_test_report(&value).is_err());
    }

    #[test]
    fn test_test_report_scalar_list_fails() {
        let mut value = test_report_value();
        value["concerns"] = json!("nothing of note");
        assert!(validate_test_report(&value).is_err());
    }

    #[test]
    fn test_test_report_unknown_recommendation_fails() {
        let mut value = test_report_value();
        value["recommendation"] = json!("SHIP_IT");
        assert!(validate_test_report(&value).is_err());
    }

    #[test]
    fn test_non_object_root_fails() {
        assert!(validate_review(&json!([1, 2])).is_err());
        assert!(validate_test_report(&json!("report")).is_err());
    }
}
