//! WebSocket connection state machine.
//!
//! States only move forward: `Connecting → Open → Closing → Closed`, with
//! `Connecting → Closing` for a failed handshake.

use std::sync::atomic::{AtomicU8, Ordering};

/// WebSocket connection state.
///
/// Represents the lifecycle states of a WebSocket connection. The derived
/// ordering follows the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum ConnectionState {
    /// Connection is being established (handshake in progress).
    #[default]
    Connecting = 0,
    /// Connection is open and ready for data transfer.
    Open = 1,
    /// Close sequence started; no further frames are sent or dispatched.
    Closing = 2,
    /// Connection is fully closed.
    Closed = 3,
}

impl ConnectionState {
    /// Check if sending data is allowed in this state.
    ///
    /// Returns `true` only for `Open` state.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Check if the close sequence has started.
    ///
    /// Returns `true` for `Closing` or `Closed` states.
    #[must_use]
    #[inline]
    pub const fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closing | ConnectionState::Closed)
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Open,
            2 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Closing => write!(f, "Closing"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

/// A [`ConnectionState`] shared between tasks.
///
/// Transitions go through [`advance`](Self::advance), which never moves the
/// state backwards.
#[derive(Debug, Default)]
pub struct AtomicState(AtomicU8);

impl AtomicState {
    /// Create a state cell.
    #[must_use]
    pub const fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    /// Current state.
    #[inline]
    pub fn load(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `to` unless the state is already past it.
    ///
    /// Returns the state observed before the call. Exactly one caller sees
    /// any given previous state, so `advance(Closing) < Closing` singles out
    /// the task that owns the close sequence.
    pub fn advance(&self, to: ConnectionState) -> ConnectionState {
        ConnectionState::from_u8(self.0.fetch_max(to as u8, Ordering::AcqRel))
    }
}
