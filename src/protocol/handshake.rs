//! WebSocket handshake implementation (RFC 6455).
//!
//! This module handles the server side of the HTTP Upgrade mechanism: reading
//! the client's request headers, deriving the accept key and building the
//! `101 Switching Protocols` response.

use crate::config::Limits;
use crate::error::Result;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Header prefix the key is matched against. The match is case-sensitive.
const KEY_HEADER: &str = "Sec-WebSocket-Key:";

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use rawws::protocol::handshake::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// let accept = compute_accept_key(key);
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    let hash = hasher.finalize();
    BASE64.encode(hash)
}

/// Read the raw upgrade request up to and including the blank line.
///
/// Lines are read one at a time; a stream that ends before the blank line
/// yields whatever was read so far. Bytes that are not valid UTF-8 are
/// replaced, so a header such as a Latin-1 `User-Agent` does not fail the
/// handshake.
///
/// # Errors
///
/// Returns `Error::HandshakeTooLarge` once more than
/// `limits.max_handshake_size` bytes have been read, or an I/O error from the
/// underlying reader.
pub async fn read_request<R>(reader: &mut R, limits: &Limits) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut request = String::new();
    let mut size = 0usize;
    let mut line = Vec::new();

    loop {
        // One byte past the limit is enough to know the request is too large
        let remaining = limits
            .max_handshake_size
            .saturating_sub(size)
            .saturating_add(1);
        line.clear();
        let read = (&mut *reader)
            .take(remaining as u64)
            .read_until(b'\n', &mut line)
            .await?;

        if read == 0 {
            break;
        }

        size += read;
        limits.check_handshake_size(size)?;
        request.push_str(&String::from_utf8_lossy(&line));

        if line == b"\r\n" || line == b"\n" {
            break;
        }
    }

    Ok(request)
}

/// Extract the `Sec-WebSocket-Key` value from a raw request.
///
/// Returns `None` if no line carries the header or its value is empty.
#[must_use]
pub fn extract_key(request: &str) -> Option<&str> {
    request
        .lines()
        .filter_map(|line| line.strip_prefix(KEY_HEADER))
        .find_map(|value| value.split_whitespace().next())
}

/// Server handshake response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// The Sec-WebSocket-Accept value.
    pub accept: String,
}

impl HandshakeResponse {
    /// Build the response for a client key.
    #[must_use]
    pub fn for_key(key: &str) -> Self {
        Self {
            accept: compute_accept_key(key),
        }
    }

    /// Write the response to a buffer.
    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
        buf.extend_from_slice(b"Upgrade: websocket\r\n");
        buf.extend_from_slice(b"Connection: Upgrade\r\n");
        buf.extend_from_slice(b"Sec-WebSocket-Accept: ");
        buf.extend_from_slice(self.accept.as_bytes());
        buf.extend_from_slice(b"\r\n\r\n");
    }

    /// Serialize the response into a new buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128);
        self.write(&mut buf);
        buf
    }
}
