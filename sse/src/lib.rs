//! Server-Sent Events (SSE) broadcast engine.
//!
//! This crate holds the connection registry and fan-out logic for pushing
//! messages to long-lived SSE connections grouped into named channels.
//!
//! # Architecture
//!
//! - **Channels**: A subscriber connects to exactly one named channel. Channels
//!   are created on demand and kept once created.
//! - **Per-channel locking**: Each channel guards its own client set, so
//!   unrelated channels never contend with each other.
//! - **Mailboxes**: Each client owns a bounded mailbox drained by its connection
//!   adapter. What happens when it fills up is an explicit [`Backpressure`]
//!   choice: wait for the reader, or disconnect the slow client.
//! - **Ephemeral messages**: Nothing is stored. A client that is not connected
//!   when a message is published misses it; the last event id it saw is kept
//!   so it can report where it left off.
//! - **Cancellation**: Every client carries a cancellation token derived from
//!   the server's, which is how both `Client::disconnect` and `Server::shutdown`
//!   end connection adapters.
//!
//! # Message Flow
//!
//! 1. The transport accepts a request and calls [`Server::subscribe`] with the
//!    channel name taken from the request path and the peer's `Last-Event-ID`.
//! 2. The client is added to its channel and [`ClientEvents::on_connect`] fires.
//! 3. The application calls [`Server::publish`] with a channel name, or with the
//!    empty name to reach every channel.
//! 4. The channel hands the message to each client's mailbox; the transport
//!    streams it out with [`Message::to_event`].
//! 5. When the peer goes away the [`Subscription`] is dropped, the client is
//!    unregistered and [`ClientEvents::on_disconnect`] fires.
//!
//! # Example: Publishing a message
//!
//! ```rust,ignore
//! use sse::{Message, Options, Server};
//! use std::sync::Arc;
//!
//! let server = Arc::new(Server::new(Options::default()));
//! server.add_channel("news")?;
//!
//! // To one channel
//! server.publish("news", Message::new("1", "hello")).await;
//! // To every channel
//! server.publish("", Message::simple("maintenance at noon")).await;
//!
//! server.shutdown().await;
//! ```
//!
//! # Modules
//!
//! - `channel`: Channel with its lock-guarded client set and broadcast
//! - `connection`: Client, its ConnectionId and the Mailbox read by the transport
//! - `error`: Engine error and error kinds
//! - `message`: Message value, SSE encoding and publish scope
//! - `options`: Server options, connect/disconnect hooks and backpressure policy
//! - `server`: The registry and the Subscription guard

pub mod channel;
pub mod connection;
pub mod error;
pub mod message;
pub mod options;
pub mod server;

pub use channel::{Admission, Channel};
pub use connection::{Client, ConnectionId, Mailbox};
pub use error::{Error, ErrorKind};
pub use message::{Message, MessageScope};
pub use options::{Backpressure, ClientEvents, NoopEvents, Options};
pub use server::{Server, Subscription};
