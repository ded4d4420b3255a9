//! WebSocket test client.
//!
//! Speaks the client side of the protocol over a raw TCP socket: sends the
//! upgrade request, masks every outgoing frame and parses the server's
//! unmasked frames.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use rawws::{Frame, OpCode, compute_accept_key};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpSocket, TcpStream};

/// Mask key used for every client frame.
pub const MASK: [u8; 4] = [1, 2, 3, 4];

const KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

pub struct TestClient {
    stream: BufReader<TcpStream>,
}

impl TestClient {
    /// Connect from 127.0.0.1 and complete the handshake.
    pub async fn connect(addr: SocketAddr) -> io::Result<Self> {
        Self::connect_from(addr, IpAddr::V4(Ipv4Addr::LOCALHOST)).await
    }

    /// Connect from a specific loopback address and complete the handshake.
    ///
    /// The server keeps one connection per IP, so concurrent clients need
    /// distinct addresses (any of 127.0.0.0/8 works on Linux).
    pub async fn connect_from(addr: SocketAddr, local: IpAddr) -> io::Result<Self> {
        let mut client = Self::connect_raw(addr, local).await?;
        client.handshake().await?;
        Ok(client)
    }

    /// Connect without sending anything.
    pub async fn connect_raw(addr: SocketAddr, local: IpAddr) -> io::Result<Self> {
        let socket = TcpSocket::new_v4()?;
        socket.bind(SocketAddr::new(local, 0))?;
        let stream = socket.connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream: BufReader::new(stream),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.stream
            .get_ref()
            .local_addr()
            .expect("connected socket has a local address")
    }

    async fn handshake(&mut self) -> io::Result<()> {
        let request = format!(
            "GET /chat HTTP/1.1\r\n\
             Host: localhost\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: {KEY}\r\n\
             Sec-WebSocket-Version: 13\r\n\
             \r\n"
        );
        self.send_raw(request.as_bytes()).await?;

        let response = self.read_response().await?;
        if !response.starts_with("HTTP/1.1 101 Switching Protocols\r\n") {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected handshake response: {response:?}"),
            ));
        }

        let accept = format!("Sec-WebSocket-Accept: {}\r\n", compute_accept_key(KEY));
        if !response.contains(&accept) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "wrong Sec-WebSocket-Accept",
            ));
        }
        Ok(())
    }

    /// Read response header lines up to the blank line.
    pub async fn read_response(&mut self) -> io::Result<String> {
        let mut response = String::new();
        loop {
            let mut line = String::new();
            if self.stream.read_line(&mut line).await? == 0 || line == "\r\n" {
                response.push_str(&line);
                return Ok(response);
            }
            response.push_str(&line);
        }
    }

    pub async fn send_raw(&mut self, data: &[u8]) -> io::Result<()> {
        let stream = self.stream.get_mut();
        stream.write_all(data).await?;
        stream.flush().await
    }

    /// Send a frame masked with [`MASK`].
    pub async fn send_frame(&mut self, frame: &Frame) -> io::Result<()> {
        self.send_raw(&frame.encode(Some(MASK))).await
    }

    pub async fn send_text(&mut self, text: &str) -> io::Result<()> {
        self.send_frame(&Frame::text(text.to_owned())).await
    }

    pub async fn send_binary(&mut self, data: &[u8]) -> io::Result<()> {
        self.send_frame(&Frame::binary(data.to_vec())).await
    }

    /// Read one server frame. `None` once the server has shut the socket.
    pub async fn recv_frame(&mut self) -> io::Result<Option<(OpCode, Vec<u8>)>> {
        let mut header = [0u8; 2];
        match self.stream.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }

        assert_ne!(header[0] & 0x80, 0, "server frames always have FIN set");
        assert_eq!(header[1] & 0x80, 0, "server frames are never masked");

        let opcode = OpCode::from(header[0]);
        let len = match header[1] & 0x7F {
            126 => u64::from(self.stream.read_u16().await?),
            127 => self.stream.read_u64().await?,
            len => u64::from(len),
        };

        let mut payload = vec![0u8; len as usize];
        self.stream.read_exact(&mut payload).await?;
        Ok(Some((opcode, payload)))
    }

    pub async fn recv_text(&mut self) -> io::Result<Option<String>> {
        match self.recv_frame().await? {
            Some((OpCode::Text, payload)) => String::from_utf8(payload)
                .map(Some)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Some((opcode, _)) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected text frame, got {opcode}"),
            )),
            None => Ok(None),
        }
    }

    /// Assert the next frame is an empty CLOSE and the socket then ends.
    pub async fn expect_close(&mut self) {
        let frame = self.recv_frame().await.unwrap();
        assert_eq!(frame, Some((OpCode::Close, Vec::new())));
        self.expect_eof().await;
    }

    /// Assert the server has shut the socket with nothing further written.
    pub async fn expect_eof(&mut self) {
        let mut rest = Vec::new();
        match self.stream.read_to_end(&mut rest).await {
            Ok(_) => assert!(rest.is_empty(), "unexpected trailing bytes: {rest:?}"),
            Err(e) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
        }
    }

    /// Close the socket without a CLOSE frame.
    pub async fn disconnect(mut self) {
        let _ = self.stream.get_mut().shutdown().await;
    }
}
