//! StackOverflow question digest adapter: answers and comments posted after
//! the cursor on a tracked question.
//!
//! Grounded on `original_source/internal/application/scrapper/api/stackoverflow.go`
//! for question-id parsing and the two-call shape (title, then the feed
//! endpoint); query parameters (`sort=creation`, `key=<key>`, `filter=withbody`
//! on both calls) follow the external-interface contract, which diverges from
//! the prototype's `sort=activity`/keyless calls.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::error::AdapterError;

use super::{format_stackoverflow_digest, Updater, UpdateItem};

pub(super) fn is_stackoverflow_url(url: &str) -> bool {
    url.starts_with("https://stackoverflow.com")
}

pub struct StackOverflowUpdater {
    client: reqwest::Client,
    api_key: String,
}

impl StackOverflowUpdater {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self { client, api_key }
    }

    fn question_id(url: &str) -> Option<&str> {
        let rest = url.strip_prefix("https://stackoverflow.com/questions/")?;
        rest.split('/').next().filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    items: Vec<FeedItem>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    #[serde(default)]
    body: Option<String>,
    creation_date: i64,
    owner: Owner,
}

#[derive(Debug, Deserialize, Default)]
struct Owner {
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct QuestionResponse {
    items: Vec<Question>,
}

#[derive(Debug, Deserialize)]
struct Question {
    title: String,
}

#[async_trait]
impl Updater for StackOverflowUpdater {
    async fn get_updates(
        &self,
        url: &str,
        since: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), AdapterError> {
        let Some(question_id) = Self::question_id(url) else {
            return Ok((String::new(), since));
        };

        let Some(title) = self.fetch_title(question_id).await? else {
            return Ok((String::new(), since));
        };

        let mut newest = since;
        let mut items = Vec::new();
        items.extend(
            self.fetch_feed(question_id, "answers", "ответ", &title, since)
                .await?,
        );
        items.extend(
            self.fetch_feed(question_id, "comments", "комментарий", &title, since)
                .await?,
        );

        for item in &items {
            if item.created_at > newest {
                newest = item.created_at;
            }
        }

        if items.is_empty() {
            return Ok((String::new(), since));
        }

        Ok((format_stackoverflow_digest(&items), newest))
    }
}

impl StackOverflowUpdater {
    /// Fetches the question title. Per the external-interface contract, a
    /// failed title fetch is fatal for this poll: returns `Ok(None)` so the
    /// caller aborts the poll with an unchanged cursor rather than delivering
    /// a digest with a blank title.
    async fn fetch_title(&self, question_id: &str) -> Result<Option<String>, AdapterError> {
        let url = format!("https://api.stackexchange.com/2.3/questions/{question_id}");
        let response = self
            .client
            .get(&url)
            .query(&[
                ("site", "stackoverflow"),
                ("filter", "withbody"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AdapterError::DoRequest(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body: QuestionResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::ReadBody(e.to_string()))?;

        Ok(body.items.into_iter().next().map(|q| q.title))
    }

    async fn fetch_feed(
        &self,
        question_id: &str,
        segment: &str,
        kind: &str,
        title: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<UpdateItem>, AdapterError> {
        // `fromdate` excludes its own timestamp, so advance it by one second
        // past the cursor rather than comparing strictly afterwards.
        let fromdate = since.timestamp() + 1;
        let feed_url =
            format!("https://api.stackexchange.com/2.3/questions/{question_id}/{segment}");
        let response = self
            .client
            .get(&feed_url)
            .query(&[
                ("order", "desc"),
                ("sort", "creation"),
                ("site", "stackoverflow"),
                ("filter", "withbody"),
                ("fromdate", &fromdate.to_string()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AdapterError::DoRequest(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(Vec::new());
        }

        let body: FeedResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::ReadBody(e.to_string()))?;

        Ok(body
            .items
            .into_iter()
            .filter_map(|item| {
                let created_at = Utc.timestamp_opt(item.creation_date, 0).single()?;
                if created_at <= since {
                    return None;
                }
                Some(UpdateItem {
                    kind: kind.to_string(),
                    title: title.to_string(),
                    author: item.owner.display_name,
                    created_at,
                    preview: item.body.unwrap_or_default(),
                })
            })
            .collect())
    }
}
