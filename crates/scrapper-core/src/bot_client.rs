//! HTTP client the scrapper uses to push a [`LinkUpdate`] to the bot's
//! `/updates` endpoint.
//!
//! Grounded on `borg_core::telegram::Telegram`: one shared `reqwest::Client`
//! for every call, no per-call state, a single request method per concern.

use tracing::warn;

use crate::error::AdapterError;
use crate::models::LinkUpdate;

pub struct BotClient {
    client: reqwest::Client,
    updates_url: String,
}

impl BotClient {
    pub fn new(client: reqwest::Client, bot_host: &str) -> Self {
        Self {
            client,
            updates_url: format!("{bot_host}/updates"),
        }
    }

    /// POSTs the envelope to the bot. Non-2xx responses and transport
    /// failures are both surfaced as errors; the caller does not retry.
    pub async fn send_update(&self, update: &LinkUpdate) -> Result<(), AdapterError> {
        let response = self
            .client
            .post(&self.updates_url)
            .json(update)
            .send()
            .await
            .map_err(|e| AdapterError::DoRequest(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("bot rejected update {}: {} {}", update.id, status, body);
            return Err(AdapterError::Api(format!("{status}: {body}")));
        }

        Ok(())
    }
}
