//! Link storage: the contract shared by the SQL, ORM, and in-memory implementations.

mod memory;
mod orm;
mod sql;

#[cfg(test)]
mod tests;

pub use memory::MemoryLinkStorage;
pub use orm::OrmLinkStorage;
pub use sql::SqlLinkStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::models::{LinkResponse, LinkRow};

/// Idempotent CRUD over chats/links/tags/filters, plus the monitor-facing cursor
/// and cursor-update operations. See spec §4.1 for the full contract.
#[async_trait]
pub trait LinkStorage: Send + Sync {
    async fn create_chat(&self, user_tg_id: i64) -> Result<(), StorageError>;

    async fn delete_chat(&self, user_tg_id: i64) -> Result<(), StorageError>;

    async fn add_link(
        &self,
        user_tg_id: i64,
        url: &str,
        tags: &[String],
        filters: &[String],
    ) -> Result<(), StorageError>;

    async fn remove_link(&self, user_tg_id: i64, url: &str) -> Result<(), StorageError>;

    async fn get_links(&self, user_tg_id: i64) -> Result<Vec<LinkResponse>, StorageError>;

    async fn delete_tag(&self, user_tg_id: i64, tag: &str) -> Result<(), StorageError>;

    async fn is_url_in_added(&self, user_tg_id: i64, url: &str) -> Result<bool, StorageError>;

    /// Returns up to `batch_size` link rows with `id > after_id`, ordered by id,
    /// and the id of the last row returned (or `after_id` unchanged if empty).
    async fn get_batch_of_links(
        &self,
        batch_size: i64,
        after_id: i64,
    ) -> Result<(Vec<LinkRow>, i64), StorageError>;

    async fn get_previous_update(&self, link_id: i64) -> Result<DateTime<Utc>, StorageError>;

    async fn save_last_update(
        &self,
        link_id: i64,
        ts: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    async fn get_tg_chat_ids_for_link(&self, url: &str) -> Result<Vec<i64>, StorageError>;

    /// Does this user already exist? Used by handlers that want to distinguish
    /// "chat not found" from other precondition failures before mutating.
    async fn chat_exists(&self, user_tg_id: i64) -> Result<bool, StorageError>;
}

/// Which `LinkStorage` implementation to construct, selected by `LINK_SERVICE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkServiceKind {
    Sql,
    Orm,
    Memory,
}

impl std::str::FromStr for LinkServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sql" => Ok(Self::Sql),
            "orm" => Ok(Self::Orm),
            "memory" => Ok(Self::Memory),
            other => Err(format!("no such link storage type: {other}")),
        }
    }
}
