//! GitHub pull-request / issue digest adapter.
//!
//! Grounded on `original_source/internal/application/scrapper/api/github.go`:
//! owner/repo/type are parsed out of the tracked URL's path segments, and
//! only items updated strictly after the cursor are kept.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::AdapterError;

use super::{format_github_digest, Updater, UpdateItem};

pub(super) fn is_github_url(url: &str) -> bool {
    url.starts_with("https://github.com")
}

pub struct GithubUpdater {
    client: reqwest::Client,
    api_key: String,
}

impl GithubUpdater {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self { client, api_key }
    }

    fn owner_repo_and_kind(url: &str) -> Option<(String, String, &'static str)> {
        let rest = url.strip_prefix("https://github.com/")?;
        let parts: Vec<&str> = rest.split('/').filter(|p| !p.is_empty()).collect();
        if parts.len() < 3 {
            return None;
        }
        let kind = match parts[2] {
            "pulls" => "PR",
            "issues" => "issue",
            _ => return None,
        };
        Some((parts[0].to_string(), parts[1].to_string(), kind))
    }
}

#[derive(Debug, Deserialize)]
struct SearchIssuesResponse {
    items: Vec<SearchIssue>,
}

#[derive(Debug, Deserialize)]
struct SearchIssue {
    title: String,
    body: Option<String>,
    updated_at: DateTime<Utc>,
    user: SearchIssueUser,
}

#[derive(Debug, Deserialize)]
struct SearchIssueUser {
    login: String,
}

#[async_trait]
impl Updater for GithubUpdater {
    async fn get_updates(
        &self,
        url: &str,
        since: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), AdapterError> {
        let Some((owner, repo, kind)) = Self::owner_repo_and_kind(url) else {
            return Ok((String::new(), since));
        };

        let item_type = if kind == "PR" { "pr" } else { "issue" };
        let query = format!(
            "repo:{owner}/{repo} type:{item_type} updated:>{}",
            since.to_rfc3339()
        );

        let response = self
            .client
            .get("https://api.github.com/search/issues")
            .query(&[("q", query.as_str())])
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "LinkChecker")
            .send()
            .await
            .map_err(|e| AdapterError::DoRequest(e.to_string()))?;

        if !response.status().is_success() {
            return Ok((String::new(), since));
        }

        let body: SearchIssuesResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::ReadBody(e.to_string()))?;

        let mut newest = since;
        let items: Vec<UpdateItem> = body
            .items
            .into_iter()
            .filter(|i| i.updated_at > since)
            .map(|i| {
                if i.updated_at > newest {
                    newest = i.updated_at;
                }
                UpdateItem {
                    kind: kind.to_string(),
                    title: i.title,
                    author: i.user.login,
                    created_at: i.updated_at,
                    preview: i.body.unwrap_or_default(),
                }
            })
            .collect();

        if items.is_empty() {
            return Ok((String::new(), since));
        }

        Ok((format_github_digest(&items), newest))
    }
}
