//! The background scheduler: every tick, walk all tracked links in batches,
//! fan them out across `W` workers, and notify the bot about whatever
//! changed.
//!
//! The tick loop itself follows `borg_server::main`'s pipeline-tick pattern:
//! an outer `tokio::spawn`'d loop that runs each tick inside its own spawn so
//! a panic in one tick can't kill the loop, sleeping the cadence in between.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::adapters::select_updater;
use crate::bot_client::BotClient;
use crate::models::LinkUpdate;
use crate::storage::LinkStorage;

const BATCH_SIZE: i64 = 100;
const TICK_INTERVAL: Duration = Duration::from_secs(600);

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonitorState {
    Idle = 0,
    Running = 1,
    Stopping = 2,
}

pub struct Monitor {
    storage: Arc<dyn LinkStorage>,
    bot_client: Arc<BotClient>,
    http_client: reqwest::Client,
    github_api_key: String,
    stackoverflow_api_key: String,
    workers: usize,
    state: AtomicU8,
}

impl Monitor {
    pub fn new(
        storage: Arc<dyn LinkStorage>,
        bot_client: Arc<BotClient>,
        http_client: reqwest::Client,
        github_api_key: String,
        stackoverflow_api_key: String,
        workers: usize,
    ) -> Self {
        Self {
            storage,
            bot_client,
            http_client,
            github_api_key,
            stackoverflow_api_key,
            workers,
            state: AtomicU8::new(MonitorState::Idle as u8),
        }
    }

    /// Spawns the tick loop at the fixed 10-minute cadence. Returns
    /// immediately; the loop runs for the lifetime of the process.
    pub fn spawn(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                let monitor = Arc::clone(&self);
                let handle = tokio::spawn(async move { monitor.tick().await });
                match handle.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!("monitor tick error: {e}"),
                    Err(join_err) => error!("monitor tick panicked: {join_err}"),
                }
                tokio::time::sleep(TICK_INTERVAL).await;
            }
        });
    }

    async fn tick(&self) -> anyhow::Result<()> {
        if self.workers == 0 {
            error!("Invalid number of workers: tick skipped");
            return Ok(());
        }

        if self
            .state
            .compare_exchange(
                MonitorState::Idle as u8,
                MonitorState::Running as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            warn!("monitor tick skipped: previous tick still running");
            return Ok(());
        }

        let result = self.run_batches().await;

        self.state.store(MonitorState::Idle as u8, Ordering::SeqCst);
        result
    }

    async fn run_batches(&self) -> anyhow::Result<()> {
        let mut after_id = 0i64;
        loop {
            let (links, new_after_id) = self
                .storage
                .get_batch_of_links(BATCH_SIZE, after_id)
                .await?;
            if links.is_empty() {
                break;
            }
            after_id = new_after_id;

            let chunk_size = links.len().div_ceil(self.workers).max(1);
            let chunks: Vec<Vec<_>> = links
                .chunks(chunk_size)
                .map(|c| c.to_vec())
                .collect();

            let mut handles = Vec::with_capacity(chunks.len());
            for chunk in chunks {
                let storage = Arc::clone(&self.storage);
                let bot_client = Arc::clone(&self.bot_client);
                let http_client = self.http_client.clone();
                let github_api_key = self.github_api_key.clone();
                let stackoverflow_api_key = self.stackoverflow_api_key.clone();
                handles.push(tokio::spawn(async move {
                    for link in chunk {
                        if let Err(e) = process_link(
                            &*storage,
                            &bot_client,
                            http_client.clone(),
                            &github_api_key,
                            &stackoverflow_api_key,
                            link.id,
                            &link.url,
                        )
                        .await
                        {
                            error!("process_link({}): {e}", link.url);
                        }
                    }
                }));
            }
            for handle in handles {
                let _ = handle.await;
            }
        }
        Ok(())
    }
}

/// Checks one link for updates and notifies the bot. Advances the cursor
/// before sending the notification (at-most-once relative to the cursor):
/// if `send_update` fails, the link is not re-checked on the next tick.
async fn process_link(
    storage: &dyn LinkStorage,
    bot_client: &BotClient,
    http_client: reqwest::Client,
    github_api_key: &str,
    stackoverflow_api_key: &str,
    link_id: i64,
    url: &str,
) -> anyhow::Result<()> {
    let since = storage.get_previous_update(link_id).await?;

    let Some(updater) = select_updater(url, http_client, github_api_key, stackoverflow_api_key)
    else {
        return Ok(());
    };

    let (digest, newest) = updater.get_updates(url, since).await?;
    if digest.is_empty() {
        return Ok(());
    }

    storage.save_last_update(link_id, newest).await?;

    let chat_ids = storage.get_tg_chat_ids_for_link(url).await?;
    if chat_ids.is_empty() {
        return Ok(());
    }

    let update = LinkUpdate {
        id: link_id,
        url: url.to_string(),
        description: digest,
        tg_chat_ids: chat_ids,
    };

    bot_client.send_update(&update).await?;
    info!("notified {} chat(s) about {}", update.tg_chat_ids.len(), url);
    Ok(())
}
