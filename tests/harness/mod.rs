//! Test harness utilities for end-to-end WebSocket testing.
//!
//! A [`TestServer`] runs a real server on an ephemeral loopback port and
//! forwards every listener callback into a channel. A [`TestClient`] speaks
//! the client side of the protocol over a raw TCP socket.

#![allow(dead_code)]

mod client;
mod server;

pub use client::{MASK, TestClient};
pub use server::{Event, TestServer};
