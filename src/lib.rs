//! # rawws - A WebSocket server with a hand-written protocol engine
//!
//! `rawws` terminates raw TCP connections, answers the HTTP Upgrade
//! handshake and speaks the RFC 6455 framing protocol directly over bytes.
//!
//! ## Features
//!
//! - **Frame codec** with 7-bit, 16-bit and 64-bit payload lengths
//! - **Per-connection state machine** with an idempotent, bounded close sequence
//! - **One session per remote address**: a newer connection evicts the older one
//! - **Listener-based API** for `connection`, `message_text`, `message_binary` and `close`
//!
//! Fragmented messages are not reassembled; fragments are dropped.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rawws::{Config, Server};
//!
//! let server = Server::bind(Config::default().with_port(2345)).await?;
//! server.on_connection(|ws| {
//!     let echo = ws.clone();
//!     ws.on_message_text(move |text| {
//!         let echo = echo.clone();
//!         tokio::spawn(async move { echo.send_text(text).await });
//!     });
//! });
//! server.start().await;
//! ```
//!
//! ## Listener timing
//!
//! A connection's receive loop starts before the `connection` listeners run,
//! and they run on their own tasks. A client that sends a message right after
//! the handshake can therefore have it dispatched before `on_message_text` is
//! registered, in which case nobody sees it. Clients that need every message
//! delivered should wait for an application-level greeting from the server
//! before sending.

pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod protocol;
pub mod server;

pub use config::{Config, DEFAULT_PORT, Limits};
pub use connection::{Connection, ConnectionState};
pub use error::{Error, Result};
pub use events::{ConnectionEvents, Listeners};
pub use protocol::{Frame, HandshakeResponse, OpCode, WS_GUID, compute_accept_key};
pub use server::{Registry, Server, WebSocket};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn test_public_types_are_send() {
        assert_send::<Error>();
        assert_send::<Config>();
        assert_send::<Limits>();
        assert_send::<Frame>();
        assert_send::<ConnectionState>();
        assert_send::<WebSocket>();
        assert_send::<Server>();
    }

    #[test]
    fn test_public_types_are_sync() {
        assert_sync::<Error>();
        assert_sync::<Config>();
        assert_sync::<Frame>();
        assert_sync::<ConnectionState>();
        assert_sync::<WebSocket>();
        assert_sync::<Server>();
    }
}
