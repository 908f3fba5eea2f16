//! Update adapters: classify a tracked URL and fetch whatever changed since
//! the last check, formatted into a single digest string.
//!
//! Grounded on `original_source/internal/application/scrapper/api/{github,stackoverflow}.go`
//! for classification and request shape, and on
//! `internal/formatter/format_messages.go` for the exact digest templates.

mod github;
mod stackoverflow;

pub use github::GithubUpdater;
pub use stackoverflow::StackOverflowUpdater;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AdapterError;

const PREVIEW_LIMIT: usize = 200;

/// Truncates a preview to at most 200 characters, appending `...` when cut.
/// Boundaries on a `char` index so multi-byte UTF-8 previews never panic.
fn truncate_preview(preview: &str) -> String {
    if preview.chars().count() <= PREVIEW_LIMIT {
        return preview.to_string();
    }
    let truncated: String = preview.chars().take(PREVIEW_LIMIT).collect();
    format!("{truncated}...")
}

/// One remote item observed since the last check, already classified.
#[derive(Debug, Clone)]
pub struct UpdateItem {
    pub kind: String,
    pub title: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub preview: String,
}

/// Fetches and formats updates for a single tracked URL.
#[async_trait]
pub trait Updater: Send + Sync {
    /// Returns the formatted digest (empty string if nothing changed) and the
    /// newest timestamp observed, to be persisted as the new cursor.
    async fn get_updates(
        &self,
        url: &str,
        since: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), AdapterError>;
}

/// Picks the adapter for a URL, or `None` if it matches neither GitHub nor
/// StackOverflow (strict classification: GitHub links must end in `/pulls`
/// or `/issues`).
pub fn select_updater(
    url: &str,
    client: reqwest::Client,
    github_api_key: &str,
    stackoverflow_api_key: &str,
) -> Option<Box<dyn Updater>> {
    if github::is_github_url(url) && (url.ends_with("/pulls") || url.ends_with("/issues")) {
        return Some(Box::new(GithubUpdater::new(client, github_api_key.to_string())));
    }
    if stackoverflow::is_stackoverflow_url(url) {
        return Some(Box::new(StackOverflowUpdater::new(
            client,
            stackoverflow_api_key.to_string(),
        )));
    }
    None
}

fn format_github_digest(items: &[UpdateItem]) -> String {
    let mut out = String::new();
    for item in items {
        let preview = truncate_preview(&item.preview);
        out.push_str(&format!(
            "Новый {} на Github\n\nНазвание: {}\nАвтор: {}\nВремя: {}\n\n",
            item.kind, item.title, item.author, item.created_at
        ));
        if !preview.is_empty() {
            out.push_str(&format!("Превью:\n{preview}\n\n"));
        }
    }
    out
}

fn format_stackoverflow_digest(items: &[UpdateItem]) -> String {
    let mut out = String::new();
    for item in items {
        let preview = truncate_preview(&item.preview);
        out.push_str(&format!(
            "Новый {} на StackOverflow\n\nВопрос: {}\nАвтор: {}\nВремя: {}\n\nПревью:\n{}",
            item.kind, item.title, item.author, item.created_at, preview
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_is_untouched_under_the_limit() {
        assert_eq!(truncate_preview("short"), "short");
    }

    #[test]
    fn preview_is_truncated_with_ellipsis_over_the_limit() {
        let long = "a".repeat(250);
        let truncated = truncate_preview(&long);
        assert_eq!(truncated.chars().count(), PREVIEW_LIMIT + 3);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn github_digest_omits_preview_block_when_empty() {
        let items = vec![UpdateItem {
            kind: "PR".into(),
            title: "Fix bug".into(),
            author: "octocat".into(),
            created_at: Utc::now(),
            preview: String::new(),
        }];
        let digest = format_github_digest(&items);
        assert!(!digest.contains("Превью"));
    }

    #[test]
    fn select_updater_requires_pulls_or_issues_suffix() {
        let client = reqwest::Client::new();
        assert!(select_updater("https://github.com/rust-lang/rust", client.clone(), "", "").is_none());
        assert!(
            select_updater("https://github.com/rust-lang/rust/pulls", client.clone(), "", "")
                .is_some()
        );
        assert!(select_updater("https://github.com/rust-lang/rust/issues", client, "", "").is_some());
    }
}
