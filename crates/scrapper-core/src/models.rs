//! Wire and persistence types shared across storage, adapters, and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked link together with its (user, link)-scoped tags and filters.
///
/// This is the only shape storage hands back to callers — a value copy, never
/// a handle into storage's own rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkResponse {
    pub id: i64,
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub filters: Vec<String>,
    pub last_checked: DateTime<Utc>,
    #[serde(default)]
    pub last_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListLinksResponse {
    pub links: Vec<LinkResponse>,
    pub size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddLinkRequest {
    pub link: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub filters: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoveLinkRequest {
    pub link: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct APIErrorResponse {
    pub description: String,
    pub code: String,
    #[serde(rename = "exceptionName")]
    pub exception_name: String,
    #[serde(rename = "exceptionMessage")]
    pub exception_message: String,
    pub stacktrace: Vec<String>,
}

/// Envelope POSTed from the scrapper to the bot's `/updates` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct LinkUpdate {
    pub id: i64,
    pub url: String,
    pub description: String,
    #[serde(rename = "tgChatIds")]
    pub tg_chat_ids: Vec<i64>,
}

/// A single link row as returned by the monitor's batched cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRow {
    pub id: i64,
    pub url: String,
    pub changed_at: DateTime<Utc>,
}

/// User-facing message shown when a chat tries to subscribe to a link twice.
pub const MSG_ALREADY_EXISTS: &str = "already exists";
