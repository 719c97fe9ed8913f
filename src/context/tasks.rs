//! Heuristic task inference from review comments.
//!
//! Comments are the only available signal for per-file review work, so they
//! are overloaded as a task-tracking proxy: the inferred status is derived,
//! not authoritative.

use std::collections::HashMap;

use crate::ports::CommentRecord;
use crate::types::{TaskInfo, TaskState};

const SYNTHETIC_KEY_PREFIX: &str = "comment:";
const MAX_TITLE_CHARS: usize = 60;

/// Groups comments into tasks by file path. Comments without a path get a
/// per-comment synthetic key, so every comment produces at least one task.
/// A task is completed when its latest contributing comment is resolved;
/// the first-seen comment supplies the assignee.
pub fn infer_tasks(comments: &[CommentRecord]) -> Vec<TaskInfo> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&CommentRecord>> = HashMap::new();

    for comment in comments {
        let key = comment
            .file_path
            .clone()
            .unwrap_or_else(|| format!("{}{}", SYNTHETIC_KEY_PREFIX, comment.id));
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(comment);
    }

    order
        .iter()
        .map(|key| {
            let group = &groups[key];
            let first = group[0];
            let latest = group
                .iter()
                .max_by_key(|c| c.created_at)
                .copied()
                .unwrap_or(first);

            let status = if latest.resolved {
                TaskState::Completed
            } else {
                TaskState::InProgress
            };

            TaskInfo {
                task_id: key.clone(),
                title: title_for(key, first),
                status,
                assignee_id: first.author_id.clone(),
                assignee_name: first.author_name.clone(),
                completed_at: latest.resolved.then_some(latest.created_at),
                failed_at: None,
            }
        })
        .collect()
}

fn title_for(key: &str, first: &CommentRecord) -> String {
    if key.starts_with(SYNTHETIC_KEY_PREFIX) {
        excerpt(&first.content)
    } else {
        key.to_string()
    }
}

fn excerpt(content: &str) -> String {
    if content.chars().count() <= MAX_TITLE_CHARS {
        content.to_string()
    } else {
        let head: String = content.chars().take(MAX_TITLE_CHARS).collect();
        format!("{}...", head)
    }
}
