//! SSE HTTP handler for the web layer.
//!
//! This module contains only the Axum handler for SSE endpoints.
//! The broadcast engine (Server, Channel, Client, Message) lives in the
//! `sse` crate so it can be embedded without the HTTP layer.

pub mod handler;
