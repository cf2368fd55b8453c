use crate::channel::{Admission, Channel};
use crate::connection::{Client, Mailbox};
use crate::error::{ErrorKind, Result};
use crate::message::{Message, MessageScope};
use crate::options::Options;
use dashmap::DashMap;
use futures_util::future::join_all;
use log::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// The channel registry: maps channel names to channels, routes published
/// messages and coordinates shutdown.
///
/// Channels are created on first use and kept for the life of the server, even
/// once empty. Every client's cancellation token is a child of the server's, so
/// shutting down ends every connection adapter even if it is in the middle of a
/// blocked delivery.
pub struct Server {
    channels: DashMap<String, Arc<Channel>>,
    options: Options,
    log_target: Arc<str>,
    shutdown: CancellationToken,
    closed: AtomicBool,
}

impl Server {
    pub fn new(options: Options) -> Self {
        let options = options.normalized();
        let log_target = Arc::from(options.log_target.as_str());
        Self {
            channels: DashMap::new(),
            options,
            log_target,
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Reconnection delay to send to browsers, if configured.
    pub fn retry(&self) -> Option<Duration> {
        self.options.retry
    }

    pub fn is_shutdown(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Creates the channel if it does not exist yet and returns it.
    pub fn add_channel(&self, name: &str) -> Result<Arc<Channel>> {
        if name.is_empty() {
            return Err(ErrorKind::InvalidChannel.into());
        }
        if self.is_shutdown() {
            return Err(ErrorKind::ServerClosed.into());
        }
        let channel = self.channel_or_insert(name);
        if self.is_shutdown() {
            self.forget_channel(&channel);
            return Err(ErrorKind::ServerClosed.into());
        }
        Ok(channel)
    }

    fn channel_or_insert(&self, name: &str) -> Arc<Channel> {
        if let Some(channel) = self.channel(name) {
            return channel;
        }
        self.channels
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(target: &*self.log_target, "Channel {name} created");
                Arc::new(Channel::new(name.to_string(), self.log_target.clone()))
            })
            .clone()
    }

    pub fn channel(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.get(name).map(|entry| entry.value().clone())
    }

    pub fn has_channel(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    /// Names of all registered channels, sorted.
    pub fn channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of clients registered across all channels.
    pub async fn client_count(&self) -> usize {
        let mut count = 0;
        for channel in self.snapshot() {
            count += channel.client_count().await;
        }
        count
    }

    fn snapshot(&self) -> Vec<Arc<Channel>> {
        self.channels.iter().map(|e| e.value().clone()).collect()
    }

    /// Creates an unregistered client for `channel` whose mailbox follows this
    /// server's capacity and backpressure settings.
    pub fn new_client(
        &self,
        channel: &str,
        name: &str,
        last_event_id: &str,
    ) -> (Arc<Client>, Mailbox) {
        let (client, mailbox) = Client::new(
            name.to_string(),
            channel.to_string(),
            last_event_id.to_string(),
            self.options.mailbox_capacity,
            self.options.backpressure,
            self.shutdown.child_token(),
            self.log_target.clone(),
        );
        (Arc::new(client), mailbox)
    }

    /// Adds `client` to its channel, creating the channel on demand, and fires
    /// the connect hook. Registering a client that is already registered does
    /// nothing.
    pub async fn register(&self, client: &Arc<Client>) -> Result<()> {
        if client.channel().is_empty() {
            return Err(ErrorKind::InvalidChannel.into());
        }

        let channel = loop {
            if self.is_shutdown() {
                return Err(ErrorKind::ServerClosed.into());
            }
            let channel = self.channel_or_insert(client.channel());
            match channel.add_client(client.clone()).await {
                Admission::Added => break channel,
                Admission::AlreadyMember => return Ok(()),
                Admission::WrongChannel => return Err(ErrorKind::InvalidChannel.into()),
                // Closed after we looked it up; its replacement, if any, is in the map.
                Admission::Closed => self.forget_channel(&channel),
            }
        };

        info!(
            target: &*self.log_target,
            "Client {} ({}) connected to channel {}",
            client.id(),
            client.name(),
            client.channel()
        );
        self.options.events.on_connect(client);

        // Shutdown may have swept the channels while we were adding, or this
        // channel may have been created after the sweep.
        if self.is_shutdown() {
            self.remove_from(&channel, client).await;
            self.forget_channel(&channel);
            return Err(ErrorKind::ServerClosed.into());
        }
        Ok(())
    }

    /// Removes `client` from its channel and fires the disconnect hook.
    /// Returns `false`, firing nothing, if the client was not registered.
    pub async fn unregister(&self, client: &Client) -> bool {
        match self.channel(client.channel()) {
            Some(channel) => self.remove_from(&channel, client).await,
            None => false,
        }
    }

    async fn remove_from(&self, channel: &Channel, client: &Client) -> bool {
        if !channel.remove_client(client).await {
            return false;
        }

        client.disconnect();
        info!(
            target: &*self.log_target,
            "Client {} ({}) disconnected from channel {}",
            client.id(),
            client.name(),
            client.channel()
        );
        self.options.events.on_disconnect(client);
        true
    }

    /// Drops `channel` from the map if it is still the registered instance.
    fn forget_channel(&self, channel: &Arc<Channel>) {
        self.channels
            .remove_if(channel.name(), |_, current| Arc::ptr_eq(current, channel));
    }

    /// Creates and registers a client, returning the handle its connection
    /// adapter streams from.
    pub async fn subscribe(
        self: &Arc<Self>,
        channel: &str,
        name: &str,
        last_event_id: &str,
    ) -> Result<Subscription> {
        let (client, mailbox) = self.new_client(channel, name, last_event_id);
        self.register(&client).await?;
        Ok(Subscription {
            server: Arc::clone(self),
            client,
            mailbox,
        })
    }

    /// Sends `message` to every client of `channel`, or of every channel when
    /// `channel` is empty. Returns the number of deliveries. Publishing to an
    /// unknown channel, or after shutdown, delivers nothing.
    pub async fn publish(&self, channel: &str, message: Message) -> usize {
        if self.is_shutdown() {
            debug!(
                target: &*self.log_target,
                "Dropping message {} published after shutdown",
                message.id()
            );
            return 0;
        }

        let message = Arc::new(message);
        match MessageScope::from(channel) {
            MessageScope::Broadcast => {
                let channels = self.snapshot();
                join_all(channels.iter().map(|ch| ch.broadcast(message.clone())))
                    .await
                    .into_iter()
                    .sum()
            }
            MessageScope::Channel { name } => match self.channel(&name) {
                Some(ch) => ch.broadcast(message).await,
                None => {
                    trace!(
                        target: &*self.log_target,
                        "No channel {name}, message {} dropped",
                        message.id()
                    );
                    0
                }
            },
        }
    }

    /// Disconnects every client of `name` and forgets the channel.
    pub async fn close_channel(&self, name: &str) -> bool {
        let Some((_, channel)) = self.channels.remove(name) else {
            return false;
        };
        self.close(&channel).await;
        info!(target: &*self.log_target, "Channel {name} closed");
        true
    }

    async fn close(&self, channel: &Channel) {
        for client in channel.close().await {
            self.options.events.on_disconnect(&client);
        }
    }

    /// Stops accepting clients and disconnects everyone. Later calls do nothing.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        info!(target: &*self.log_target, "Shutting down SSE server");
        self.shutdown.cancel();

        let channels = self.snapshot();
        self.channels.clear();
        for channel in channels {
            self.close(&channel).await;
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

/// A registered client together with its mailbox.
///
/// Dropping the subscription disconnects the client and unregisters it in the
/// background, so a connection adapter unregisters no matter how its stream ends.
pub struct Subscription {
    server: Arc<Server>,
    client: Arc<Client>,
    mailbox: Mailbox,
}

impl Subscription {
    pub fn client(&self) -> &Arc<Client> {
        &self.client
    }

    pub fn retry(&self) -> Option<Duration> {
        self.server.retry()
    }

    /// Waits for the next message, or `None` once the client is disconnected.
    pub async fn recv(&mut self) -> Option<Arc<Message>> {
        self.mailbox.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.client.disconnect();

        let server = self.server.clone();
        let client = self.client.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    server.unregister(&client).await;
                });
            }
            Err(_) => error!(
                target: &*self.server.log_target,
                "No runtime to unregister client {}",
                self.client.id()
            ),
        }
    }
}
