//! WebSocket frame opcodes as defined in RFC 6455.

use crate::error::{Error, Result};

/// WebSocket frame opcode.
///
/// Defines the interpretation of the payload data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Continuation frame (0x0), used after the initial frame of a
    /// fragmented message.
    Continuation = 0x0,

    /// Text frame (0x1). Payload must be valid UTF-8.
    Text = 0x1,

    /// Binary frame (0x2). Payload is arbitrary bytes.
    Binary = 0x2,

    /// Close frame (0x8). May carry a status code and reason.
    Close = 0x8,

    /// Ping frame (0x9). Receiver must answer with a Pong.
    Ping = 0x9,

    /// Pong frame (0xA). Response to a Ping.
    Pong = 0xA,
}

impl OpCode {
    /// Create an `OpCode` from its raw wire value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOpcode`] for anything outside the six
    /// defined values, including the RFC-reserved ranges.
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            other => Err(Error::InvalidOpcode(other)),
        }
    }

    /// Raw wire value of this opcode.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Control frame opcodes: Close, Ping, Pong.
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }

    /// Data frame opcodes: Continuation, Text, Binary.
    #[inline]
    #[must_use]
    pub const fn is_data(self) -> bool {
        matches!(self, OpCode::Continuation | OpCode::Text | OpCode::Binary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8_valid() {
        assert_eq!(OpCode::from_u8(0x0).unwrap(), OpCode::Continuation);
        assert_eq!(OpCode::from_u8(0x1).unwrap(), OpCode::Text);
        assert_eq!(OpCode::from_u8(0x2).unwrap(), OpCode::Binary);
        assert_eq!(OpCode::from_u8(0x8).unwrap(), OpCode::Close);
        assert_eq!(OpCode::from_u8(0x9).unwrap(), OpCode::Ping);
        assert_eq!(OpCode::from_u8(0xA).unwrap(), OpCode::Pong);
    }

    #[test]
    fn test_from_u8_rejects_undefined() {
        for bad in [0x3, 0x4, 0x5, 0x6, 0x7, 0xB, 0xC, 0xD, 0xE, 0xF] {
            assert!(matches!(
                OpCode::from_u8(bad),
                Err(Error::InvalidOpcode(b)) if b == bad
            ));
        }
    }

    #[test]
    fn test_as_u8() {
        assert_eq!(OpCode::Text.as_u8(), 0x1);
        assert_eq!(OpCode::Pong.as_u8(), 0xA);
    }

    #[test]
    fn test_control_vs_data() {
        assert!(OpCode::Close.is_control());
        assert!(OpCode::Ping.is_control());
        assert!(OpCode::Pong.is_control());
        assert!(OpCode::Continuation.is_data());
        assert!(OpCode::Text.is_data());
        assert!(OpCode::Binary.is_data());
        assert!(!OpCode::Text.is_control());
        assert!(!OpCode::Close.is_data());
    }
}
