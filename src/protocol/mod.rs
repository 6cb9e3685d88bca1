//! WebSocket protocol core (RFC 6455).

pub mod assembler;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;

pub use assembler::{AssembledMessage, MessageAssembler};
pub use frame::Frame;
pub use handshake::{
    WS_GUID, accept_key, is_valid_ws_request, is_valid_ws_response, new_ws_request,
    new_ws_response,
};
pub use mask::apply_mask;
pub use opcode::OpCode;
