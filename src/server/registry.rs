//! One live connection per remote IP address.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tracing::info;

use crate::connection::Connection;

/// Close reason given to a connection evicted by a newer one from the same address.
pub const REPLACED_REASON: &str = "Replaced by a new connection from the same address";

/// Address → connection map.
///
/// Admission is serialized: the lock is held across the eviction of the
/// previous connection, so an address never has two admitted connections.
pub struct Registry<S> {
    connections: Mutex<HashMap<IpAddr, Arc<Connection<S>>>>,
}

impl<S> Default for Registry<S> {
    fn default() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }
}

impl<S> std::fmt::Debug for Registry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").finish_non_exhaustive()
    }
}

impl<S> Registry<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `conn` as the connection for its address.
    ///
    /// Any other connection already recorded for that address is closed, and
    /// its close sequence has finished before this returns.
    pub async fn admit(&self, conn: Arc<Connection<S>>) {
        let ip = conn.ip();
        let mut connections = self.connections.lock().await;

        if let Some(old) = connections.remove(&ip) {
            if !Arc::ptr_eq(&old, &conn) {
                info!(%ip, old = %old.peer_addr(), new = %conn.peer_addr(), "evicting previous connection");
                old.close(REPLACED_REASON);
                old.closed().await;
            }
        }

        connections.insert(ip, conn);
    }

    /// Forget `conn` if it is still the connection recorded for its address.
    ///
    /// Returns whether an entry was removed.
    pub async fn remove(&self, conn: &Arc<Connection<S>>) -> bool {
        let mut connections = self.connections.lock().await;
        match connections.get(&conn.ip()) {
            Some(current) if Arc::ptr_eq(current, conn) => {
                connections.remove(&conn.ip());
                true
            }
            _ => false,
        }
    }

    /// The connection recorded for `ip`.
    pub async fn get(&self, ip: IpAddr) -> Option<Arc<Connection<S>>> {
        self.connections.lock().await.get(&ip).cloned()
    }

    /// Number of recorded connections.
    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Whether no connection is recorded.
    pub async fn is_empty(&self) -> bool {
        self.connections.lock().await.is_empty()
    }

    /// Remove and return every recorded connection.
    pub async fn drain(&self) -> Vec<Arc<Connection<S>>> {
        self.connections
            .lock()
            .await
            .drain()
            .map(|(_, conn)| conn)
            .collect()
    }
}
