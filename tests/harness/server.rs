//! WebSocket test server.
//!
//! Runs a real server on an ephemeral loopback port and records every
//! listener callback as an [`Event`].

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use rawws::{Config, Server, WebSocket};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// A listener callback observed by the server, tagged with the peer address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connected(SocketAddr),
    Text(SocketAddr, String),
    Binary(SocketAddr, Vec<u8>),
    Closed(SocketAddr, String),
}

pub struct TestServer {
    pub server: Server,
    pub addr: SocketAddr,
    events: mpsc::UnboundedReceiver<Event>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        Self::spawn_with(Config::default()).await
    }

    pub async fn spawn_with(config: Config) -> Self {
        let config = config
            .with_host(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .with_port(0);
        let server = Server::bind(config).await.unwrap();
        let port = server.local_addr().unwrap().port();
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);

        let (tx, events) = mpsc::unbounded_channel();
        server.on_connection(move |ws: Arc<WebSocket>| {
            let peer = ws.peer_addr();

            let text_tx = tx.clone();
            ws.on_message_text(move |text| {
                let _ = text_tx.send(Event::Text(peer, text));
            });
            let binary_tx = tx.clone();
            ws.on_message_binary(move |data| {
                let _ = binary_tx.send(Event::Binary(peer, data.to_vec()));
            });
            let close_tx = tx.clone();
            ws.on_close(move |reason| {
                let _ = close_tx.send(Event::Closed(peer, reason));
            });

            // Sent last, so message listeners are in place once a test sees it
            let _ = tx.send(Event::Connected(peer));
        });

        let handle = server.start_background();
        Self {
            server,
            addr,
            events,
            handle,
        }
    }

    /// Next recorded event; panics after a timeout.
    pub async fn next_event(&mut self) -> Event {
        tokio::time::timeout(EVENT_TIMEOUT, self.events.recv())
            .await
            .expect("timed out waiting for server event")
            .expect("event channel closed")
    }

    /// Assert no event arrives within `wait`.
    pub async fn expect_no_event(&mut self, wait: Duration) {
        if let Ok(Some(event)) = tokio::time::timeout(wait, self.events.recv()).await {
            panic!("unexpected event: {event:?}");
        }
    }

    pub async fn connection(&self, peer: SocketAddr) -> Arc<WebSocket> {
        self.server
            .connection(peer.ip())
            .await
            .expect("connection is admitted")
    }

    /// Poll until the server holds `count` connections.
    pub async fn wait_for_count(&self, count: usize) {
        tokio::time::timeout(EVENT_TIMEOUT, async {
            while self.server.connection_count().await != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("timed out waiting for connection count");
    }

    pub async fn shutdown(self) {
        self.server.stop().await;
        self.handle.await.unwrap();
    }
}
