//! In-process `LinkStorage` behind a `RwLock<HashMap<...>>`.
//!
//! Grounded on the original service's `dictionary_storage.go`, which guards a
//! set of plain Go maps with a `sync.RWMutex`. Used for `LINK_SERVICE=memory`
//! and as the always-on half of the storage contract test suite.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::models::{LinkResponse, LinkRow};

use super::LinkStorage;

#[derive(Debug, Clone)]
struct LinkEntry {
    id: i64,
    url: String,
    changed_at: DateTime<Utc>,
    subscribers: std::collections::HashSet<i64>,
    tags: HashMap<i64, Vec<String>>,
    filters: HashMap<i64, Vec<String>>,
}

#[derive(Default)]
struct Inner {
    users: std::collections::HashSet<i64>,
    links_by_url: HashMap<String, i64>,
    links: HashMap<i64, LinkEntry>,
}

pub struct MemoryLinkStorage {
    inner: RwLock<Inner>,
    next_link_id: AtomicI64,
}

impl Default for MemoryLinkStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLinkStorage {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            next_link_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl LinkStorage for MemoryLinkStorage {
    async fn create_chat(&self, user_tg_id: i64) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        inner.users.insert(user_tg_id);
        Ok(())
    }

    async fn delete_chat(&self, user_tg_id: i64) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        inner.users.remove(&user_tg_id);
        for link in inner.links.values_mut() {
            link.subscribers.remove(&user_tg_id);
        }
        Ok(())
    }

    async fn chat_exists(&self, user_tg_id: i64) -> Result<bool, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner.users.contains(&user_tg_id))
    }

    async fn add_link(
        &self,
        user_tg_id: i64,
        url: &str,
        tags: &[String],
        filters: &[String],
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains(&user_tg_id) {
            return Err(StorageError::ChatNotFound);
        }

        let link_id = match inner.links_by_url.get(url) {
            Some(id) => *id,
            None => {
                let id = self.next_link_id.fetch_add(1, Ordering::SeqCst);
                inner.links_by_url.insert(url.to_string(), id);
                inner.links.insert(
                    id,
                    LinkEntry {
                        id,
                        url: url.to_string(),
                        changed_at: Utc::now(),
                        subscribers: std::collections::HashSet::new(),
                        tags: HashMap::new(),
                        filters: HashMap::new(),
                    },
                );
                id
            }
        };

        let entry = inner.links.get_mut(&link_id).expect("just inserted");
        if !entry.subscribers.insert(user_tg_id) {
            return Err(StorageError::LinkAlreadyExists);
        }
        entry.tags.insert(user_tg_id, tags.to_vec());
        entry.filters.insert(user_tg_id, filters.to_vec());
        Ok(())
    }

    async fn remove_link(&self, user_tg_id: i64, url: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        let link_id = *inner
            .links_by_url
            .get(url)
            .ok_or(StorageError::LinkNotFound)?;
        let entry = inner
            .links
            .get_mut(&link_id)
            .ok_or(StorageError::LinkNotFound)?;
        if !entry.subscribers.remove(&user_tg_id) {
            return Err(StorageError::LinkNotFound);
        }
        entry.tags.remove(&user_tg_id);
        entry.filters.remove(&user_tg_id);

        if entry.subscribers.is_empty() {
            inner.links.remove(&link_id);
            inner.links_by_url.remove(url);
        }
        Ok(())
    }

    async fn get_links(&self, user_tg_id: i64) -> Result<Vec<LinkResponse>, StorageError> {
        let inner = self.inner.read().await;
        let mut links: Vec<LinkResponse> = inner
            .links
            .values()
            .filter(|l| l.subscribers.contains(&user_tg_id))
            .map(|l| LinkResponse {
                id: l.id,
                url: l.url.clone(),
                tags: l.tags.get(&user_tg_id).cloned().unwrap_or_default(),
                filters: l.filters.get(&user_tg_id).cloned().unwrap_or_default(),
                last_checked: l.changed_at,
                last_version: String::new(),
            })
            .collect();
        links.sort_by_key(|l| l.id);
        Ok(links)
    }

    async fn delete_tag(&self, user_tg_id: i64, tag: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        let mut found = false;
        for link in inner.links.values_mut() {
            if let Some(tags) = link.tags.get_mut(&user_tg_id) {
                let before = tags.len();
                tags.retain(|t| t != tag);
                if tags.len() != before {
                    found = true;
                }
            }
        }
        if !found {
            return Err(StorageError::TagNotFound);
        }
        Ok(())
    }

    async fn is_url_in_added(&self, user_tg_id: i64, url: &str) -> Result<bool, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .links_by_url
            .get(url)
            .and_then(|id| inner.links.get(id))
            .is_some_and(|l| l.subscribers.contains(&user_tg_id)))
    }

    async fn get_batch_of_links(
        &self,
        batch_size: i64,
        after_id: i64,
    ) -> Result<(Vec<LinkRow>, i64), StorageError> {
        let inner = self.inner.read().await;
        let mut ids: Vec<i64> = inner
            .links
            .keys()
            .copied()
            .filter(|id| *id > after_id)
            .collect();
        ids.sort_unstable();
        ids.truncate(batch_size.max(0) as usize);

        let mut new_after_id = after_id;
        let rows: Vec<LinkRow> = ids
            .into_iter()
            .map(|id| {
                let l = &inner.links[&id];
                new_after_id = id;
                LinkRow {
                    id: l.id,
                    url: l.url.clone(),
                    changed_at: l.changed_at,
                }
            })
            .collect();
        Ok((rows, new_after_id))
    }

    async fn get_previous_update(&self, link_id: i64) -> Result<DateTime<Utc>, StorageError> {
        let inner = self.inner.read().await;
        inner
            .links
            .get(&link_id)
            .map(|l| l.changed_at)
            .ok_or(StorageError::LinkNotFound)
    }

    async fn save_last_update(&self, link_id: i64, ts: DateTime<Utc>) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        let entry = inner
            .links
            .get_mut(&link_id)
            .ok_or(StorageError::LinkNotFound)?;
        entry.changed_at = ts;
        Ok(())
    }

    async fn get_tg_chat_ids_for_link(&self, url: &str) -> Result<Vec<i64>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .links_by_url
            .get(url)
            .and_then(|id| inner.links.get(id))
            .map(|l| l.subscribers.iter().copied().collect())
            .unwrap_or_default())
    }
}
