use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::connection::Connection;
use crate::error::Result;
use crate::events::Listeners;
use crate::server::registry::Registry;

/// A connection accepted by [`Server`].
pub type WebSocket = Connection<TcpStream>;

/// Close reason given to every connection by [`Server::stop`].
pub const SHUTDOWN_REASON: &str = "Server shutting down";

/// WebSocket server: accept loop, per-address registry and the
/// `connection` event.
///
/// `Server` is a cheap handle; clones share the same listener, registry and
/// listeners.
///
/// # Example
///
/// ```rust,ignore
/// use rawws::{Config, Server};
///
/// let server = Server::bind(Config::default()).await?;
/// server.on_connection(|ws| {
///     let peer = ws.ip();
///     ws.on_message_text(move |text| println!("{peer}: {text}"));
/// });
/// server.start().await;
/// ```
#[derive(Clone)]
pub struct Server {
    listener: Arc<TcpListener>,
    registry: Arc<Registry<TcpStream>>,
    connection: Arc<Listeners<Arc<WebSocket>>>,
    config: Arc<Config>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.listener.local_addr().ok())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Bind the listening socket described by `config`.
    ///
    /// # Errors
    ///
    /// Returns the bind error, e.g. when the port is already in use.
    pub async fn bind(config: Config) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr()).await?;
        debug!(addr = %config.bind_addr(), "bound listener");

        Ok(Self {
            listener: Arc::new(listener),
            registry: Arc::new(Registry::new()),
            connection: Arc::new(Listeners::new()),
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        })
    }

    /// The address the server is listening on.
    ///
    /// # Errors
    ///
    /// Returns the socket error if the address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Server configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Register a listener for newly opened connections.
    ///
    /// Listeners run on their own tasks. Frames may be dispatched before a
    /// listener has registered its message callbacks.
    pub fn on_connection<F>(&self, listener: F)
    where
        F: Fn(Arc<WebSocket>) + Send + Sync + 'static,
    {
        self.connection.on(listener);
    }

    /// Number of admitted connections.
    pub async fn connection_count(&self) -> usize {
        self.registry.len().await
    }

    /// The admitted connection for `ip`, if any.
    pub async fn connection(&self, ip: IpAddr) -> Option<Arc<WebSocket>> {
        self.registry.get(ip).await
    }

    /// Run the accept loop until [`stop`](Self::stop) is called.
    ///
    /// Each accepted socket is served on its own task; a failure on one
    /// connection never reaches this loop.
    pub async fn start(&self) {
        match self.listener.local_addr() {
            Ok(addr) => info!(%addr, "WebSocket server listening"),
            Err(err) => warn!(error = %err, "WebSocket server listening on unknown address"),
        }

        loop {
            let accepted = tokio::select! {
                () = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "accepted TCP connection");
                    let server = self.clone();
                    tokio::spawn(async move { server.serve(stream, peer).await });
                }
                Err(err) => {
                    // Transient (e.g. out of file descriptors); keep accepting
                    error!(error = %err, "accept failed");
                }
            }
        }

        info!("accept loop stopped");
    }

    /// Run the accept loop on a spawned task.
    pub fn start_background(&self) -> JoinHandle<()> {
        let server = self.clone();
        tokio::spawn(async move { server.start().await })
    }

    /// Stop accepting and close every admitted connection.
    ///
    /// Returns once every close sequence has finished.
    pub async fn stop(&self) {
        self.shutdown.cancel();

        let connections = self.registry.drain().await;
        info!(count = connections.len(), "closing connections");

        for conn in &connections {
            conn.close(SHUTDOWN_REASON);
        }
        for conn in connections {
            conn.closed().await;
        }
    }

    async fn serve(&self, stream: TcpStream, peer: SocketAddr) {
        let conn = Connection::accept(stream, peer, Arc::clone(&self.config)).await;
        if !conn.is_open() {
            return;
        }

        self.registry.admit(Arc::clone(&conn)).await;
        if self.shutdown.is_cancelled() {
            // Raced with `stop` draining the registry
            conn.close(SHUTDOWN_REASON);
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let receiver = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move {
                let stop = CancellationToken::new();
                let on_close = stop.clone();
                conn.on_close(move |_| on_close.cancel());
                let _ = ready_tx.send(());

                conn.run(stop).await;
            })
        };

        if ready_rx.await.is_err() {
            warn!(%peer, "receive task ended before it was ready");
        }
        info!(%peer, "connection open");
        self.connection.emit_async(Arc::clone(&conn));

        if let Err(err) = receiver.await {
            error!(%peer, error = %err, "receive task failed");
            conn.close(err.to_string());
        }

        self.registry.remove(&conn).await;
        debug!(%peer, "connection released");
    }
}
