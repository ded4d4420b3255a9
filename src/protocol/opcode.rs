//! WebSocket frame opcodes as defined in RFC 6455.

/// WebSocket frame opcode.
///
/// Decoding never fails on the opcode: values RFC 6455 reserves are kept as
/// [`OpCode::Reserved`] so the connection can drop a reserved fragment like
/// any other fragment and reject only complete frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum OpCode {
    /// Continuation frame (0x0). Fragments are never reassembled.
    Continuation,
    /// Text frame (0x1), UTF-8 payload.
    Text,
    /// Binary frame (0x2).
    Binary,
    /// Close frame (0x8), optionally carrying a status code and reason.
    Close,
    /// Ping frame (0x9).
    Ping,
    /// Pong frame (0xA).
    Pong,
    /// Any other 4-bit value (0x3-0x7, 0xB-0xF).
    Reserved(u8),
}

impl From<u8> for OpCode {
    /// Map the low nibble of a frame's first byte. Higher bits are ignored.
    fn from(byte: u8) -> Self {
        match byte & 0x0F {
            0x0 => OpCode::Continuation,
            0x1 => OpCode::Text,
            0x2 => OpCode::Binary,
            0x8 => OpCode::Close,
            0x9 => OpCode::Ping,
            0xA => OpCode::Pong,
            other => OpCode::Reserved(other),
        }
    }
}

impl OpCode {
    /// The 4-bit wire value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
            OpCode::Reserved(byte) => byte & 0x0F,
        }
    }

    /// Close, Ping and Pong. Reserved control values are not included.
    #[must_use]
    pub const fn is_control(self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpCode::Continuation => f.write_str("Continuation"),
            OpCode::Text => f.write_str("Text"),
            OpCode::Binary => f.write_str("Binary"),
            OpCode::Close => f.write_str("Close"),
            OpCode::Ping => f.write_str("Ping"),
            OpCode::Pong => f.write_str("Pong"),
            OpCode::Reserved(byte) => write!(f, "Reserved({byte:#x})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_from_known_values() {
        assert_eq!(OpCode::from(0x0), OpCode::Continuation);
        assert_eq!(OpCode::from(0x1), OpCode::Text);
        assert_eq!(OpCode::from(0x2), OpCode::Binary);
        assert_eq!(OpCode::from(0x8), OpCode::Close);
        assert_eq!(OpCode::from(0x9), OpCode::Ping);
        assert_eq!(OpCode::from(0xA), OpCode::Pong);
    }

    #[test]
    fn test_opcode_from_reserved_values() {
        for reserved in [0x3, 0x4, 0x5, 0x6, 0x7, 0xB, 0xC, 0xD, 0xE, 0xF] {
            let opcode = OpCode::from(reserved);
            assert_eq!(opcode, OpCode::Reserved(reserved));
            assert_eq!(opcode.as_u8(), reserved);
            assert!(!opcode.is_control());
        }
    }

    #[test]
    fn test_opcode_ignores_high_bits() {
        // FIN bit set on the whole first byte
        assert_eq!(OpCode::from(0x81), OpCode::Text);
        assert_eq!(OpCode::from(0x83), OpCode::Reserved(0x3));
    }

    #[test]
    fn test_opcode_wire_value_round_trips() {
        for byte in 0u8..16 {
            assert_eq!(OpCode::from(byte).as_u8(), byte);
        }
    }

    #[test]
    fn test_opcode_is_control() {
        assert!(!OpCode::Continuation.is_control());
        assert!(!OpCode::Text.is_control());
        assert!(!OpCode::Binary.is_control());
        assert!(OpCode::Close.is_control());
        assert!(OpCode::Ping.is_control());
        assert!(OpCode::Pong.is_control());
    }

    #[test]
    fn test_opcode_display() {
        assert_eq!(OpCode::Text.to_string(), "Text");
        assert_eq!(OpCode::Close.to_string(), "Close");
        assert_eq!(OpCode::Reserved(0xB).to_string(), "Reserved(0xb)");
    }
}
