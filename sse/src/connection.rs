use crate::error::{Error, ErrorKind, Result};
use crate::message::Message;
use crate::options::Backpressure;
use log::*;
use std::fmt;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One subscriber's live connection, bound to a single channel for its lifetime.
///
/// The broadcaster writes into the client's mailbox through [`Client::deliver`];
/// the connection adapter drains it through the paired [`Mailbox`].
pub struct Client {
    id: ConnectionId,
    name: String,
    channel: String,
    last_event_id: RwLock<String>,
    sender: mpsc::Sender<Arc<Message>>,
    backpressure: Backpressure,
    cancel: CancellationToken,
    log_target: Arc<str>,
}

impl Client {
    pub(crate) fn new(
        name: String,
        channel: String,
        last_event_id: String,
        capacity: usize,
        backpressure: Backpressure,
        cancel: CancellationToken,
        log_target: Arc<str>,
    ) -> (Self, Mailbox) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let id = ConnectionId::new();
        let name = if name.is_empty() { id.to_string() } else { name };
        let client = Self {
            id,
            name,
            channel,
            last_event_id: RwLock::new(last_event_id),
            sender,
            backpressure,
            cancel: cancel.clone(),
            log_target,
        };
        (client, Mailbox { receiver, cancel })
    }

    /// Hands `message` to the mailbox after recording its id as the last event id.
    ///
    /// Under [`Backpressure::Block`] this waits for mailbox space, returning early
    /// if the client disconnects. Under [`Backpressure::Disconnect`] a full
    /// mailbox disconnects the client instead.
    pub async fn deliver(&self, message: Arc<Message>) -> Result<()> {
        if !self.is_connected() {
            return Err(ErrorKind::ClientGone.into());
        }

        self.set_last_event_id(message.id());

        match self.backpressure {
            Backpressure::Block => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(Error::new(ErrorKind::ClientGone)),
                    sent = self.sender.send(message) => {
                        sent.map_err(|_| Error::new(ErrorKind::ClientGone))
                    }
                }
            }
            Backpressure::Disconnect => match self.sender.try_send(message) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => {
                    warn!(
                        target: &*self.log_target,
                        "Mailbox full for client {} on channel {}, disconnecting",
                        self.id, self.channel
                    );
                    self.disconnect();
                    Err(ErrorKind::MailboxFull.into())
                }
                Err(TrySendError::Closed(_)) => Err(ErrorKind::ClientGone.into()),
            },
        }
    }

    /// Asks the connection adapter to end this client's stream. Idempotent.
    pub fn disconnect(&self) {
        if !self.cancel.is_cancelled() {
            debug!(target: &*self.log_target, "Disconnecting client {}", self.id);
            self.cancel.cancel();
        }
    }

    pub fn is_connected(&self) -> bool {
        !self.cancel.is_cancelled() && !self.sender.is_closed()
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The channel this client is subscribed to.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// The id of the last message handed to this client.
    pub fn last_event_id(&self) -> String {
        self.last_event_id
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_last_event_id(&self, id: &str) {
        let mut last_event_id = self
            .last_event_id
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        last_event_id.clear();
        last_event_id.push_str(id);
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("channel", &self.channel)
            .field("last_event_id", &self.last_event_id())
            .finish()
    }
}

/// Receiving half of a client's mailbox, owned by its connection adapter.
#[derive(Debug)]
pub struct Mailbox {
    receiver: mpsc::Receiver<Arc<Message>>,
    cancel: CancellationToken,
}

impl Mailbox {
    /// Waits for the next message. Returns `None` once the client has been
    /// disconnected or the sending side is gone.
    pub async fn recv(&mut self) -> Option<Arc<Message>> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            message = self.receiver.recv() => message,
        }
    }
}
