use crate::connection::Client;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Log target used for engine records when none is configured.
pub const DEFAULT_LOG_TARGET: &str = "sse";

/// Mailbox capacity used when none is configured.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 16;

/// Hooks invoked as clients join and leave the server.
///
/// Both methods default to doing nothing, so implementors only override what
/// they need. Hooks are called without any engine lock held and may call back
/// into the server.
pub trait ClientEvents: Send + Sync {
    fn on_connect(&self, _client: &Client) {}

    fn on_disconnect(&self, _client: &Client) {}
}

/// The hooks used when the embedder supplies none.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEvents;

impl ClientEvents for NoopEvents {}

/// What a broadcast does when a client's mailbox is full.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Backpressure {
    /// Wait for the client to make room. A slow subscriber slows publishing to
    /// its whole channel; a disconnected subscriber never blocks.
    #[default]
    Block,
    /// Disconnect the client and move on. Publishers never wait.
    Disconnect,
}

#[derive(Debug, PartialEq, Eq)]
pub struct BackpressureParseError;

impl fmt::Display for BackpressureParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "expected one of: block, disconnect")
    }
}

impl std::error::Error for BackpressureParseError {}

impl FromStr for Backpressure {
    type Err = BackpressureParseError;
    fn from_str(value: &str) -> Result<Backpressure, Self::Err> {
        match value.to_lowercase().as_str() {
            "block" => Ok(Backpressure::Block),
            "disconnect" => Ok(Backpressure::Disconnect),
            _ => Err(BackpressureParseError),
        }
    }
}

impl fmt::Display for Backpressure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Backpressure::Block => write!(f, "block"),
            Backpressure::Disconnect => write!(f, "disconnect"),
        }
    }
}

/// Server configuration. Every field has a usable default.
#[derive(Clone)]
pub struct Options {
    /// Connect/disconnect hooks.
    pub events: Arc<dyn ClientEvents>,
    /// Target for every log record the engine emits.
    pub log_target: String,
    /// Number of messages a client mailbox holds before backpressure applies.
    pub mailbox_capacity: usize,
    pub backpressure: Backpressure,
    /// Reconnection delay sent to browsers with each event.
    pub retry: Option<Duration>,
}

impl Options {
    pub fn with_events(mut self, events: Arc<dyn ClientEvents>) -> Self {
        self.events = events;
        self
    }

    pub fn with_log_target(mut self, log_target: impl Into<String>) -> Self {
        self.log_target = log_target.into();
        self
    }

    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    pub fn with_backpressure(mut self, backpressure: Backpressure) -> Self {
        self.backpressure = backpressure;
        self
    }

    pub fn with_retry(mut self, retry: Option<Duration>) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces unusable values with defaults: an empty log target and a zero
    /// mailbox capacity.
    pub(crate) fn normalized(mut self) -> Self {
        if self.log_target.is_empty() {
            self.log_target = DEFAULT_LOG_TARGET.to_string();
        }
        self.mailbox_capacity = self.mailbox_capacity.max(1);
        self
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            events: Arc::new(NoopEvents),
            log_target: DEFAULT_LOG_TARGET.to_string(),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            backpressure: Backpressure::default(),
            retry: None,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Options")
            .field("log_target", &self.log_target)
            .field("mailbox_capacity", &self.mailbox_capacity)
            .field("backpressure", &self.backpressure)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_fills_in_defaults() {
        let options = Options::default()
            .with_log_target("")
            .with_mailbox_capacity(0)
            .normalized();

        assert_eq!(options.log_target, DEFAULT_LOG_TARGET);
        assert_eq!(options.mailbox_capacity, 1);
    }

    #[test]
    fn test_backpressure_parses_case_insensitively() {
        assert_eq!("BLOCK".parse(), Ok(Backpressure::Block));
        assert_eq!("disconnect".parse(), Ok(Backpressure::Disconnect));
        assert_eq!("drop".parse::<Backpressure>(), Err(BackpressureParseError));
        assert_eq!(Backpressure::Disconnect.to_string(), "disconnect");
    }
}
