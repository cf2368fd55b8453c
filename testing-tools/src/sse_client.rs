use anyhow::Result;
use eventsource_client::{self as es, Client};
use futures_util::stream::StreamExt;
use log::*;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: String,
    pub id: Option<String>,
    pub data: String,
    pub timestamp: Instant,
}

/// One live subscription to a channel's event stream.
pub struct Connection {
    pub label: String,
    pub channel: String,
    event_rx: mpsc::UnboundedReceiver<Event>,
    handle: tokio::task::JoinHandle<()>,
}

impl Connection {
    pub async fn establish(
        base_url: &str,
        channel: &str,
        last_event_id: Option<&str>,
        label: String,
    ) -> Result<Self> {
        let url = format!("{}/events/{}", base_url, channel);
        let (tx, rx) = mpsc::unbounded_channel();

        let mut builder = es::ClientBuilder::for_url(&url)?;
        if let Some(id) = last_event_id {
            builder = builder.header("Last-Event-ID", id)?;
        }
        let client = builder.build();

        let task_label = label.clone();
        let handle = tokio::spawn(async move {
            let mut stream = client.stream();

            loop {
                match stream.next().await {
                    Some(Ok(es::SSE::Event(event))) => {
                        let sse_event = Event {
                            event_type: event.event_type,
                            id: event.id,
                            data: event.data,
                            timestamp: Instant::now(),
                        };

                        if tx.send(sse_event).is_err() {
                            debug!("SSE receiver dropped for {}", task_label);
                            break;
                        }
                    }
                    Some(Ok(es::SSE::Comment(_))) => {
                        // Ignore comments (keep-alive)
                    }
                    Some(Err(e)) => {
                        warn!("SSE error for {}: {}", task_label, e);
                    }
                    None => {
                        debug!("SSE stream ended for {}", task_label);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            label,
            channel: channel.to_string(),
            event_rx: rx,
            handle,
        })
    }

    pub async fn wait_for_event(&mut self, event_type: &str, timeout: Duration) -> Result<Event> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                anyhow::bail!("Timeout waiting for event: {}", event_type);
            }

            match tokio::time::timeout(remaining, self.event_rx.recv()).await {
                Ok(Some(event)) if event.event_type == event_type => {
                    return Ok(event);
                }
                Ok(Some(_)) => {
                    // Wrong event type, keep waiting
                    continue;
                }
                Ok(None) => {
                    anyhow::bail!("SSE connection closed");
                }
                Err(_) => {
                    anyhow::bail!("Timeout waiting for event: {}", event_type);
                }
            }
        }
    }

    /// Returns `true` if no event of `event_type` arrives within `window`.
    pub async fn stays_quiet(&mut self, event_type: &str, window: Duration) -> bool {
        self.wait_for_event(event_type, window).await.is_err()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
