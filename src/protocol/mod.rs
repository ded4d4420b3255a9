//! WebSocket protocol core implementation (RFC 6455).

pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;

pub use frame::{Frame, MAX_CONTROL_FRAME_PAYLOAD};
pub use handshake::{HandshakeResponse, WS_GUID, compute_accept_key, extract_key, read_request};
pub use mask::{apply_mask, apply_mask_fast};
pub use opcode::OpCode;
