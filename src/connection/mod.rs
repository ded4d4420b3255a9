//! WebSocket connection management and state machine.
//!
//! This module provides the `Connection` type: one accepted socket, its
//! upgrade handshake, inbound frame dispatch, outbound frames and its own
//! close sequence.
//!
//! ## Connection Lifecycle
//!
//! 1. **Connecting** - Reading the upgrade request
//! 2. **Open** - Handshake answered, frames flow both ways
//! 3. **Closing** - Close requested; listeners notified, close frame queued
//! 4. **Closed** - Socket shut down, listeners dropped
//!
//! ## Example
//!
//! ```rust,ignore
//! use rawws::{Config, Connection};
//!
//! let (stream, peer) = listener.accept().await?;
//! let conn = Connection::accept(stream, peer, Arc::new(Config::default())).await;
//!
//! conn.on_message_text(|text| println!("Received: {text}"));
//! conn.on_close(|reason| println!("Closed: {reason}"));
//! conn.run(CancellationToken::new()).await;
//! ```

mod state;

pub use state::{AtomicState, ConnectionState};

#[allow(clippy::module_inception)]
mod connection;

pub use connection::Connection;
