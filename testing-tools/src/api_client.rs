use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    pub async fn health(&self) -> Result<()> {
        self.client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?
            .error_for_status()
            .context("Health check failed")?;
        Ok(())
    }

    /// Publishes to `channel`, or to every channel when `channel` is `None`.
    /// Returns the number of deliveries the server reported.
    pub async fn publish(
        &self,
        channel: Option<&str>,
        id: &str,
        event: &str,
        data: &str,
    ) -> Result<u64> {
        let url = match channel {
            Some(channel) => format!("{}/events/{}", self.base_url, channel),
            None => format!("{}/events", self.base_url),
        };

        let response: Value = self
            .client
            .post(url)
            .json(&json!({ "id": id, "event": event, "data": data }))
            .send()
            .await?
            .error_for_status()
            .context("Publish failed")?
            .json()
            .await?;

        response["data"]["deliveries"]
            .as_u64()
            .context("No delivery count in publish response")
    }

    pub async fn subscriber_count(&self, channel: &str) -> Result<u64> {
        let response: Value = self
            .client
            .get(format!("{}/channels", self.base_url))
            .send()
            .await?
            .error_for_status()
            .context("Listing channels failed")?
            .json()
            .await?;

        let count = response["data"]
            .as_array()
            .context("No channel list in response")?
            .iter()
            .find(|summary| summary["name"] == channel)
            .and_then(|summary| summary["clients"].as_u64())
            .unwrap_or(0);
        Ok(count)
    }

    /// Polls the channel listing until `channel` has at least `expected` subscribers.
    pub async fn wait_for_subscribers(
        &self,
        channel: &str,
        expected: u64,
        timeout: Duration,
    ) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.subscriber_count(channel).await? >= expected {
                return Ok(());
            }
            if Instant::now() >= deadline {
                anyhow::bail!(
                    "Timeout waiting for {} subscriber(s) on {}",
                    expected,
                    channel
                );
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}
