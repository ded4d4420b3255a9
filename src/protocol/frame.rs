//! WebSocket frame decoding and encoding (RFC 6455 Section 5.2).
//!
//! Decoding reads a single frame straight off a byte stream: two header
//! bytes, the optional extended length, the mask key, then the payload.
//! Encoding mirrors the same length branches.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask_fast;

/// Maximum payload size for control frames (RFC 6455).
pub const MAX_CONTROL_FRAME_PAYLOAD: u64 = 125;

/// Largest payload that still fits the 16-bit extended length.
const MAX_U16_PAYLOAD: usize = 0xFFFF;

/// A WebSocket frame as defined in RFC 6455.
///
/// ## Frame Structure
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode |M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)   |A|     (7)     |             (16/64)           |
/// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
/// | |1|2|3|       |K|             |                               |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                         Masking key (if present)              |
/// +---------------------------------------------------------------+
/// |                     Payload data                              |
/// +---------------------------------------------------------------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Frame opcode defining the interpretation of payload data.
    pub opcode: OpCode,
    /// Whether the frame arrived with the MASK bit set.
    pub masked: bool,
    /// Payload length as declared on the wire.
    pub payload_len: u64,
    /// Masking key of an inbound frame.
    pub mask: Option<[u8; 4]>,
    /// Unmasked payload data.
    payload: Bytes,
}

impl Frame {
    /// Create an outgoing (unmasked) frame.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            fin,
            opcode,
            masked: false,
            payload_len: payload.len() as u64,
            mask: None,
            payload,
        }
    }

    /// Create a text frame.
    #[must_use]
    pub fn text(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Text, data)
    }

    /// Create a binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Binary, data)
    }

    /// Create a close frame with an optional status code and reason.
    #[must_use]
    pub fn close(code: Option<u16>, reason: &str) -> Self {
        let payload = match code {
            Some(code) => {
                let mut data = BytesMut::with_capacity(2 + reason.len());
                data.put_u16(code);
                data.put_slice(reason.as_bytes());
                data.freeze()
            }
            None => Bytes::new(),
        };
        Self::new(true, OpCode::Close, payload)
    }

    /// Create a ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Ping, data)
    }

    /// Create a pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Pong, data)
    }

    /// Get the payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Read one client frame from `reader`.
    ///
    /// Returns `Ok(None)` when the stream ends before both header bytes
    /// arrive. The caller decides what a missing frame means.
    ///
    /// ## Errors
    ///
    /// - `Error::UnmaskedClientFrame` if the MASK bit is clear; no payload is read
    /// - `Error::FrameTooLarge` if the declared length exceeds `limits.max_frame_size`
    /// - `Error::ConnectionReset` if the stream ends mid-frame
    pub async fn read_from<R>(reader: &mut R, limits: &Limits) -> Result<Option<Self>>
    where
        R: AsyncRead + Unpin,
    {
        let mut header = [0u8; 2];
        match reader.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let fin = (header[0] & 0x80) != 0;
        let opcode = OpCode::from(header[0]);
        let masked = (header[1] & 0x80) != 0;

        // Extended lengths are big-endian: 2 bytes for 126, 8 bytes for 127
        let payload_len = match header[1] & 0x7F {
            126 => u64::from(reader.read_u16().await?),
            127 => reader.read_u64().await?,
            len => u64::from(len),
        };

        if !masked {
            return Err(Error::UnmaskedClientFrame);
        }

        limits.check_frame_size(payload_len)?;
        let len = usize::try_from(payload_len).map_err(|_| Error::FrameTooLarge {
            size: payload_len,
            max: usize::MAX as u64,
        })?;

        let mut mask = [0u8; 4];
        reader.read_exact(&mut mask).await?;

        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload).await?;
        apply_mask_fast(&mut payload, mask);

        Ok(Some(Frame {
            fin,
            opcode,
            masked,
            payload_len,
            mask: Some(mask),
            payload: Bytes::from(payload),
        }))
    }

    /// Validate control frame invariants.
    ///
    /// Data frames always pass.
    ///
    /// # Errors
    ///
    /// - `Error::FragmentedControlFrame` if a control frame has FIN=0
    /// - `Error::ControlFrameTooLarge` if a control frame payload > 125 bytes
    pub fn validate(&self) -> Result<()> {
        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::FragmentedControlFrame);
            }

            if self.payload_len > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::ControlFrameTooLarge(self.payload_len));
            }
        }

        Ok(())
    }

    /// Split a close frame payload into status code and reason.
    ///
    /// Returns `Ok(None)` for an empty payload. The reason is decoded lossily.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidClosePayload` for a 1-byte payload.
    pub fn close_status(&self) -> Result<Option<(u16, String)>> {
        match self.payload.as_ref() {
            [] => Ok(None),
            [_] => Err(Error::InvalidClosePayload),
            [hi, lo, reason @ ..] => Ok(Some((
                u16::from_be_bytes([*hi, *lo]),
                String::from_utf8_lossy(reason).into_owned(),
            ))),
        }
    }

    /// Serialize the frame.
    ///
    /// Server frames are written with `mask: None`; a key is only supplied
    /// when acting as a client.
    #[must_use]
    pub fn encode(&self, mask: Option<[u8; 4]>) -> BytesMut {
        let payload_len = self.payload.len();
        let mut buf = BytesMut::with_capacity(self.wire_size(mask.is_some()));

        let mut byte0 = self.opcode.as_u8();
        if self.fin {
            byte0 |= 0x80;
        }
        buf.put_u8(byte0);

        let mask_bit = if mask.is_some() { 0x80 } else { 0x00 };
        if payload_len < 126 {
            buf.put_u8(mask_bit | payload_len as u8);
        } else if payload_len <= MAX_U16_PAYLOAD {
            buf.put_u8(mask_bit | 126);
            buf.put_u16(payload_len as u16);
        } else {
            buf.put_u8(mask_bit | 127);
            buf.put_u64(payload_len as u64);
        }

        match mask {
            Some(key) => {
                buf.put_slice(&key);
                let start = buf.len();
                buf.put_slice(&self.payload);
                apply_mask_fast(&mut buf[start..], key);
            }
            None => buf.put_slice(&self.payload),
        }

        buf
    }

    /// Calculate the size needed to write this frame.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let payload_len = self.payload.len();
        let extended_len_size = if payload_len < 126 {
            0
        } else if payload_len <= MAX_U16_PAYLOAD {
            2
        } else {
            8
        };
        let mask_size = if masked { 4 } else { 0 };
        2 + extended_len_size + mask_size + payload_len
    }
}
