use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::connection::state::{AtomicState, ConnectionState};
use crate::error::{Error, Result};
use crate::events::ConnectionEvents;
use crate::protocol::handshake::{self, HandshakeResponse};
use crate::protocol::{Frame, OpCode};

/// A server-side WebSocket connection over an async I/O stream.
///
/// The connection is always held behind an [`Arc`]: the receive loop, the
/// close sequence and the embedder all share it. Inbound messages are
/// delivered to listeners registered with [`on_message_text`],
/// [`on_message_binary`] and [`on_close`].
///
/// ## Type Parameters
///
/// - `S`: The underlying async I/O stream (e.g., `TcpStream`)
///
/// ## Example
///
/// ```rust,ignore
/// use rawws::{Config, Connection};
///
/// let conn = Connection::accept(stream, peer, Arc::new(Config::default())).await;
/// conn.on_message_text(|text| println!("Received: {text}"));
/// conn.run(CancellationToken::new()).await;
/// ```
///
/// [`on_message_text`]: Connection::on_message_text
/// [`on_message_binary`]: Connection::on_message_binary
/// [`on_close`]: Connection::on_close
pub struct Connection<S> {
    peer: SocketAddr,
    config: Arc<Config>,
    state: AtomicState,
    reader: Mutex<BufReader<ReadHalf<S>>>,
    // Taken by the close sequence; `None` once the socket is shut down
    writer: Mutex<Option<WriteHalf<S>>>,
    events: ConnectionEvents,
    done: CancellationToken,
}

impl<S> std::fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("state", &self.state.load())
            .finish_non_exhaustive()
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Run the upgrade handshake on a freshly accepted stream.
    ///
    /// Always returns a connection. On success it is `Open`; on failure it
    /// has already begun closing with the failure as its reason.
    pub async fn accept(stream: S, peer: SocketAddr, config: Arc<Config>) -> Arc<Self> {
        let conn = Arc::new(Self::with_state(
            stream,
            peer,
            config,
            ConnectionState::Connecting,
        ));

        match conn.handshake().await {
            Ok(()) => {
                conn.state.advance(ConnectionState::Open);
                debug!(%peer, "handshake complete");
            }
            Err(err) => {
                warn!(%peer, error = %err, "handshake failed");
                conn.close(err.to_string());
            }
        }

        conn
    }

    /// Wrap a stream whose upgrade handshake has already completed.
    pub fn new(stream: S, peer: SocketAddr, config: Arc<Config>) -> Arc<Self> {
        Arc::new(Self::with_state(
            stream,
            peer,
            config,
            ConnectionState::Open,
        ))
    }

    fn with_state(
        stream: S,
        peer: SocketAddr,
        config: Arc<Config>,
        state: ConnectionState,
    ) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            peer,
            config,
            state: AtomicState::new(state),
            reader: Mutex::new(BufReader::new(read_half)),
            writer: Mutex::new(Some(write_half)),
            events: ConnectionEvents::default(),
            done: CancellationToken::new(),
        }
    }

    async fn handshake(&self) -> Result<()> {
        // Header bytes and the first frames share one buffered reader
        let request = {
            let mut reader = self.reader.lock().await;
            handshake::read_request(&mut *reader, &self.config.limits).await?
        };

        let key = handshake::extract_key(&request).ok_or(Error::MissingWebSocketKey)?;
        let response = HandshakeResponse::for_key(key).to_bytes();

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(Error::HandshakeFailed)?;
        writer
            .write_all(&response)
            .await
            .map_err(|_| Error::HandshakeFailed)?;
        writer.flush().await.map_err(|_| Error::HandshakeFailed)?;

        Ok(())
    }

    /// Decode one frame and dispatch it.
    ///
    /// Protocol violations and a stream that ends before a frame header
    /// close the connection; nothing is returned to the caller.
    pub async fn recv(self: &Arc<Self>) {
        if !self.is_open() {
            return;
        }

        let frame = {
            let mut reader = self.reader.lock().await;
            Frame::read_from(&mut *reader, &self.config.limits).await
        };

        let result = match frame {
            Ok(Some(frame)) => self.dispatch(frame).await,
            Ok(None) => Err(Error::ConnectionReset),
            Err(err) => Err(err),
        };

        if let Err(err) = result {
            debug!(peer = %self.peer, error = %err, "receive failed");
            self.close(err.to_string());
        }
    }

    async fn dispatch(self: &Arc<Self>, frame: Frame) -> Result<()> {
        frame.validate()?;

        if !frame.fin || frame.opcode == OpCode::Continuation {
            trace!(peer = %self.peer, opcode = %frame.opcode, "dropping fragmented frame");
            return Ok(());
        }

        if !self.is_open() {
            return Ok(());
        }

        trace!(peer = %self.peer, opcode = %frame.opcode, len = frame.payload_len, "frame");
        match frame.opcode {
            OpCode::Text => {
                let text = String::from_utf8(frame.payload().to_vec())?;
                self.events.message_text.emit(text);
            }
            OpCode::Binary => {
                self.events.message_binary.emit(frame.into_payload());
            }
            OpCode::Close => {
                let reason = match frame.close_status()? {
                    Some((code, message)) => {
                        format!("Closing with Status Code of {code}:\r\n{message}")
                    }
                    None => String::new(),
                };
                self.close(reason);
            }
            OpCode::Ping => {
                self.send(true, OpCode::Pong, false, frame.into_payload())
                    .await?;
            }
            OpCode::Reserved(code) => return Err(Error::ReservedOpcode(code)),
            OpCode::Pong | OpCode::Continuation => {}
        }

        Ok(())
    }

    /// Receive and dispatch frames until the connection closes or `stop`
    /// is cancelled.
    pub async fn run(self: &Arc<Self>, stop: CancellationToken) {
        while self.is_open() {
            tokio::select! {
                () = stop.cancelled() => break,
                () = self.recv() => {}
            }
        }
        trace!(peer = %self.peer, state = %self.state(), "receive loop finished");
    }

    /// Send a single frame.
    ///
    /// Nothing is written, and `Ok` is returned, when the connection is not
    /// open or the frame is one a server never sends: a fragment
    /// (`fin == false` or a continuation) or a masked frame.
    ///
    /// # Errors
    ///
    /// Returns the write error after closing the connection with it.
    pub async fn send(
        self: &Arc<Self>,
        fin: bool,
        opcode: OpCode,
        masked: bool,
        payload: impl Into<Bytes>,
    ) -> Result<()> {
        if !fin || opcode == OpCode::Continuation || masked {
            debug!(peer = %self.peer, %opcode, fin, masked, "refusing to send frame");
            return Ok(());
        }

        if !self.state().can_send() {
            return Ok(());
        }

        let buf = Frame::new(fin, opcode, payload).encode(None);

        let result = {
            let mut guard = self.writer.lock().await;
            match guard.as_mut() {
                Some(writer) => match writer.write_all(&buf).await {
                    Ok(()) => writer.flush().await,
                    Err(err) => Err(err),
                },
                None => return Ok(()),
            }
        };

        if let Err(err) = result {
            let err = Error::from(err);
            self.close(err.to_string());
            return Err(err);
        }

        Ok(())
    }

    /// Send a text message.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_text(self: &Arc<Self>, text: impl Into<String>) -> Result<()> {
        let text: String = text.into();
        self.send(true, OpCode::Text, false, text).await
    }

    /// Send a binary message.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_binary(self: &Arc<Self>, data: impl Into<Bytes>) -> Result<()> {
        self.send(true, OpCode::Binary, false, data).await
    }

    /// Begin closing the connection.
    ///
    /// Returns immediately and may be called from any task, including from
    /// inside a listener. Only the first call has an effect: it moves the
    /// connection to `Closing` and spawns the close sequence, which emits
    /// `close(reason)`, writes an empty CLOSE frame if the connection was
    /// open, shuts the socket down and finally moves to `Closed`.
    pub fn close(self: &Arc<Self>, reason: impl Into<String>) {
        let previous = self.state.advance(ConnectionState::Closing);
        if previous >= ConnectionState::Closing {
            return;
        }

        let reason = reason.into();
        debug!(peer = %self.peer, %reason, "closing connection");

        let conn = Arc::clone(self);
        tokio::spawn(async move { conn.finish_close(previous, reason).await });
    }

    async fn finish_close(&self, previous: ConnectionState, reason: String) {
        self.events.close.emit(reason);

        let shutdown = async {
            let mut guard = self.writer.lock().await;
            if let Some(mut writer) = guard.take() {
                if previous == ConnectionState::Open {
                    writer.write_all(&Frame::close(None, "").encode(None)).await?;
                }
                writer.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };

        match tokio::time::timeout(self.config.close_timeout, shutdown).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!(peer = %self.peer, error = %err, "close frame not delivered"),
            Err(_) => warn!(peer = %self.peer, "close sequence timed out"),
        }

        self.state.advance(ConnectionState::Closed);
        self.events.clear();
        self.done.cancel();
        info!(peer = %self.peer, "connection closed");
    }
}

impl<S> Connection<S> {
    /// Register a listener for text messages.
    pub fn on_message_text<F>(&self, listener: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.events.message_text.on(listener);
    }

    /// Register a listener for binary messages.
    pub fn on_message_binary<F>(&self, listener: F)
    where
        F: Fn(Bytes) + Send + Sync + 'static,
    {
        self.events.message_binary.on(listener);
    }

    /// Register a listener for the close reason.
    pub fn on_close<F>(&self, listener: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.events.close.on(listener);
    }

    /// Wait until the close sequence has finished.
    pub async fn closed(&self) {
        self.done.cancelled().await;
    }

    /// Remote IP address.
    #[must_use]
    pub fn ip(&self) -> IpAddr {
        self.peer.ip()
    }

    /// Remote port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.peer.port()
    }

    /// Remote socket address.
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state.load()
    }

    /// Check if the connection is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Check if the connection is closing or closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state().is_closed()
    }
}
