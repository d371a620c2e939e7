//! Webhook delivery of floor notifications.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use venue_floor::notify::{Notification, NotificationDispatcher};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// Dispatcher that POSTs each notification as JSON to a webhook
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
    url: String,
}

impl WebhookDispatcher {
    pub fn new(url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .context("Failed to build webhook client")?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookDispatcher {
    async fn dispatch(&self, notification: &Notification) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .context("Failed to send notification webhook")?;

        if !response.status().is_success() {
            anyhow::bail!("Webhook responded with {}", response.status());
        }

        tracing::debug!(kind = notification.kind(), "Notification delivered");
        Ok(())
    }
}
