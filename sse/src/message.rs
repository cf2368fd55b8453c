use axum::response::sse::Event;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Source of ids for messages published without one.
static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

fn next_message_id() -> String {
    NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed).to_string()
}

/// An immutable message fanned out to the clients of one or more channels.
///
/// Ids and event names are single-line SSE fields, so carriage returns, line
/// feeds and NUL bytes are stripped from them. CR and CRLF line endings in the
/// payload are normalised to LF; each payload line becomes its own `data:` line
/// on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: String,
    data: String,
    event: Option<String>,
}

impl Message {
    pub fn new(id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: single_line(id.into()),
            data: normalize_line_endings(data.into()),
            event: None,
        }
    }

    /// Builds a message with an auto-generated, process-wide increasing id.
    pub fn simple(data: impl Into<String>) -> Self {
        Self::new(next_message_id(), data)
    }

    /// Sets the SSE `event:` name for this message.
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        let event = single_line(event.into());
        self.event = (!event.is_empty()).then_some(event);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn event(&self) -> Option<&str> {
        self.event.as_deref()
    }

    /// Encodes the message as an SSE event, optionally carrying a reconnection
    /// delay for the browser.
    pub fn to_event(&self, retry: Option<Duration>) -> Event {
        let mut event = Event::default().id(&self.id).data(&self.data);
        if let Some(name) = &self.event {
            event = event.event(name);
        }
        if let Some(retry) = retry {
            event = event.retry(retry);
        }
        event
    }
}

fn single_line(value: String) -> String {
    if value.contains(['\r', '\n', '\0']) {
        value.replace(['\r', '\n', '\0'], "")
    } else {
        value
    }
}

fn normalize_line_endings(value: String) -> String {
    if value.contains('\r') {
        value.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        value
    }
}

/// Where a published message should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageScope {
    /// Send to every client of the named channel
    Channel { name: String },
    /// Send to every client of every channel
    Broadcast,
}

impl From<&str> for MessageScope {
    /// The empty channel name is the "all channels" target.
    fn from(name: &str) -> Self {
        if name.is_empty() {
            MessageScope::Broadcast
        } else {
            MessageScope::Channel {
                name: name.to_string(),
            }
        }
    }
}
