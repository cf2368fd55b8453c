use crate::connection::{Client, ConnectionId};
use crate::message::Message;
use log::*;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

/// Outcome of [`Channel::add_client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The client is now a member of the channel.
    Added,
    /// The client was already a member; nothing changed.
    AlreadyMember,
    /// The client is subscribed to a different channel.
    WrongChannel,
    /// The channel has been closed and accepts no more clients.
    Closed,
}

/// A named topic and the clients subscribed to it.
///
/// The client set is guarded by a per-channel lock, so unrelated channels never
/// contend. [`Channel::broadcast`] holds that lock for the whole fan-out: a client
/// is either fully registered and receives the message, or it does not see it at
/// all. Concurrent registrations wait for the broadcast to finish.
pub struct Channel {
    name: String,
    clients: Mutex<HashMap<ConnectionId, Arc<Client>>>,
    last_event_id: RwLock<String>,
    // Only flipped while `clients` is locked.
    closed: AtomicBool,
    log_target: Arc<str>,
}

impl Channel {
    pub(crate) fn new(name: String, log_target: Arc<str>) -> Self {
        Self {
            name,
            clients: Mutex::new(HashMap::new()),
            last_event_id: RwLock::new(String::new()),
            closed: AtomicBool::new(false),
            log_target,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds `client` to the channel. Nothing changes unless the result is
    /// [`Admission::Added`].
    pub async fn add_client(&self, client: Arc<Client>) -> Admission {
        if client.channel() != self.name {
            warn!(
                target: &*self.log_target,
                "Refusing client {} subscribed to {} on channel {}",
                client.id(),
                client.channel(),
                self.name
            );
            return Admission::WrongChannel;
        }

        let mut clients = self.clients.lock().await;
        if self.closed.load(Ordering::Acquire) {
            return Admission::Closed;
        }
        if clients.contains_key(client.id()) {
            return Admission::AlreadyMember;
        }
        clients.insert(client.id().clone(), client);
        Admission::Added
    }

    /// Removes `client` from the channel. Returns `false` if it was not a member.
    pub async fn remove_client(&self, client: &Client) -> bool {
        self.clients.lock().await.remove(client.id()).is_some()
    }

    /// Delivers `message` to every current client and returns how many accepted it.
    pub async fn broadcast(&self, message: Arc<Message>) -> usize {
        let clients = self.clients.lock().await;
        self.set_last_event_id(message.id());

        let mut delivered = 0;
        for client in clients.values() {
            match client.deliver(message.clone()).await {
                Ok(()) => delivered += 1,
                Err(e) => debug!(
                    target: &*self.log_target,
                    "Skipped client {} on channel {}: {}",
                    client.id(),
                    self.name,
                    e
                ),
            }
        }

        trace!(
            target: &*self.log_target,
            "Broadcast message {} on channel {} to {}/{} clients",
            message.id(),
            self.name,
            delivered,
            clients.len()
        );
        delivered
    }

    /// Disconnects and removes every client, returning the ones that were removed.
    /// A closed channel refuses new clients; closing it again returns nothing.
    pub async fn close(&self) -> Vec<Arc<Client>> {
        let mut clients = self.clients.lock().await;
        self.closed.store(true, Ordering::Release);
        let removed: Vec<Arc<Client>> = clients.drain().map(|(_, client)| client).collect();
        for client in &removed {
            client.disconnect();
        }
        removed
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Snapshot of the current clients.
    pub async fn clients(&self) -> Vec<Arc<Client>> {
        self.clients.lock().await.values().cloned().collect()
    }

    /// The id of the last message broadcast on this channel.
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

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("last_event_id", &self.last_event_id())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::tests::test_client;
    use crate::options::Backpressure;

    fn channel(name: &str) -> Channel {
        Channel::new(name.to_string(), Arc::from("sse"))
    }

    #[tokio::test]
    async fn test_add_client_twice_is_a_no_op() {
        let ch = channel("CH-1");
        let (client, _mailbox) = test_client("CH-1", 1, Backpressure::Block);

        assert_eq!(ch.add_client(client.clone()).await, Admission::Added);
        assert_eq!(ch.add_client(client).await, Admission::AlreadyMember);
        assert_eq!(ch.client_count().await, 1);
    }

    #[tokio::test]
    async fn test_add_client_from_other_channel_is_refused() {
        let ch = channel("CH-1");
        let (client, _mailbox) = test_client("CH-2", 1, Backpressure::Block);

        assert_eq!(ch.add_client(client).await, Admission::WrongChannel);
        assert_eq!(ch.client_count().await, 0);
    }

    #[tokio::test]
    async fn test_remove_client_is_idempotent() {
        let ch = channel("CH-1");
        let (client, _mailbox) = test_client("CH-1", 1, Backpressure::Block);
        ch.add_client(client.clone()).await;

        assert!(ch.remove_client(&client).await);
        assert!(!ch.remove_client(&client).await);
        assert_eq!(ch.client_count().await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_client() {
        let ch = channel("CH-1");
        let mut mailboxes = Vec::new();
        for _ in 0..3 {
            let (client, mailbox) = test_client("CH-1", 1, Backpressure::Block);
            ch.add_client(client).await;
            mailboxes.push(mailbox);
        }

        let delivered = ch.broadcast(Arc::new(Message::new("9", "hello"))).await;

        assert_eq!(delivered, 3);
        assert_eq!(ch.last_event_id(), "9");
        for mailbox in &mut mailboxes {
            assert_eq!(mailbox.recv().await.unwrap().id(), "9");
        }
        for client in ch.clients().await {
            assert_eq!(client.last_event_id(), "9");
        }
    }

    #[tokio::test]
    async fn test_broadcast_skips_departed_clients() {
        let ch = channel("CH-1");
        let (alive, mut alive_mailbox) = test_client("CH-1", 1, Backpressure::Block);
        let (gone, gone_mailbox) = test_client("CH-1", 1, Backpressure::Block);
        ch.add_client(alive).await;
        ch.add_client(gone).await;
        drop(gone_mailbox);

        let delivered = ch.broadcast(Arc::new(Message::new("1", "x"))).await;

        assert_eq!(delivered, 1);
        assert!(alive_mailbox.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_close_disconnects_and_empties() {
        let ch = channel("CH-1");
        let (client, mut mailbox) = test_client("CH-1", 1, Backpressure::Block);
        ch.add_client(client.clone()).await;

        let removed = ch.close().await;

        assert_eq!(removed.len(), 1);
        assert!(!client.is_connected());
        assert!(mailbox.recv().await.is_none());
        assert_eq!(ch.client_count().await, 0);
    }

    #[tokio::test]
    async fn test_closed_channel_refuses_new_clients() {
        let ch = channel("CH-1");
        ch.close().await;
        let (late, mut late_mailbox) = test_client("CH-1", 1, Backpressure::Block);

        assert_eq!(ch.add_client(late.clone()).await, Admission::Closed);

        assert!(ch.is_closed());
        assert_eq!(ch.client_count().await, 0);
        assert!(ch.close().await.is_empty());
        assert!(late.is_connected(), "a refused client is left for its caller");
        late.disconnect();
        assert!(late_mailbox.recv().await.is_none());
    }
}
