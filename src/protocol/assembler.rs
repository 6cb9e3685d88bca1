//! Reassembly of fragmented messages (RFC 6455 §5.4).

use bytes::BytesMut;

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::{Frame, OpCode};

/// Reassembles data frames into complete messages.
///
/// Control frames are ignored; they may be interleaved with fragments.
/// The completed message carries the opcode of the *initial* fragment.
pub struct MessageAssembler {
    buffer: BytesMut,
    opcode: Option<OpCode>,
    fragment_count: usize,
    limits: Limits,
}

/// A fully reassembled message.
pub struct AssembledMessage {
    /// Opcode of the initial fragment (Text or Binary).
    pub opcode: OpCode,
    /// Concatenated payload of all fragments.
    pub payload: Vec<u8>,
}

impl AssembledMessage {
    /// Interpret the payload as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUtf8`] if the payload is not valid UTF-8.
    pub fn into_text(self) -> Result<String> {
        String::from_utf8(self.payload).map_err(|_| Error::InvalidUtf8)
    }
}

impl MessageAssembler {
    /// Create an assembler bounded by `limits`.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: BytesMut::new(),
            opcode: None,
            fragment_count: 0,
            limits,
        }
    }

    /// Add a frame; returns the complete message when FIN=1 arrives.
    ///
    /// # Errors
    ///
    /// - [`Error::ProtocolViolation`] for a continuation with no message
    ///   in progress, or a new data frame while one is in progress.
    /// - [`Error::MessageTooLarge`] / [`Error::TooManyFragments`] when
    ///   limits are exceeded.
    pub fn push(&mut self, frame: Frame) -> Result<Option<AssembledMessage>> {
        if frame.opcode.is_control() {
            return Ok(None);
        }

        let opcode = if frame.opcode == OpCode::Continuation {
            match self.opcode {
                Some(opcode) => opcode,
                None => {
                    return Err(Error::ProtocolViolation(
                        "continuation frame without a message in progress".into(),
                    ));
                }
            }
        } else {
            if self.opcode.is_some() {
                return Err(Error::ProtocolViolation(
                    "new data frame while a message is in progress".into(),
                ));
            }
            self.opcode = Some(frame.opcode);
            frame.opcode
        };

        self.limits.check_fragment_count(self.fragment_count + 1)?;
        self.limits
            .check_message_size(self.buffer.len() + frame.payload.len())?;

        self.buffer.extend_from_slice(&frame.payload);
        self.fragment_count += 1;

        if frame.fin {
            let payload = self.buffer.split().to_vec();
            self.opcode = None;
            self.fragment_count = 0;
            Ok(Some(AssembledMessage { opcode, payload }))
        } else {
            Ok(None)
        }
    }

    /// Whether a fragmented message is currently in progress.
    #[must_use]
    pub fn is_assembling(&self) -> bool {
        self.opcode.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assembler() -> MessageAssembler {
        MessageAssembler::new(Limits::default())
    }

    #[test]
    fn test_single_frame_message() {
        let mut asm = assembler();
        let msg = asm.push(Frame::text("Hello")).unwrap().unwrap();
        assert_eq!(msg.opcode, OpCode::Text);
        assert_eq!(msg.payload, b"Hello");
        assert!(!asm.is_assembling());
    }

    #[test]
    fn test_three_fragment_message() {
        let mut asm = assembler();

        assert!(asm
            .push(Frame::new(false, OpCode::Text, b"one".to_vec()))
            .unwrap()
            .is_none());
        assert!(asm.is_assembling());

        assert!(asm
            .push(Frame::new(false, OpCode::Continuation, b"two".to_vec()))
            .unwrap()
            .is_none());

        let msg = asm
            .push(Frame::new(true, OpCode::Continuation, b"three".to_vec()))
            .unwrap()
            .unwrap();
        assert_eq!(msg.opcode, OpCode::Text);
        assert_eq!(msg.payload, b"onetwothree");
        assert!(!asm.is_assembling());
    }

    #[test]
    fn test_original_opcode_preserved_for_binary() {
        let mut asm = assembler();
        asm.push(Frame::new(false, OpCode::Binary, vec![1, 2])).unwrap();
        let msg = asm
            .push(Frame::new(true, OpCode::Continuation, vec![3]))
            .unwrap()
            .unwrap();
        assert_eq!(msg.opcode, OpCode::Binary);
        assert_eq!(msg.payload, vec![1, 2, 3]);
    }

    #[test]
    fn test_control_frame_interleaved() {
        let mut asm = assembler();
        asm.push(Frame::new(false, OpCode::Text, b"Hel".to_vec()))
            .unwrap();

        assert!(asm.push(Frame::ping(b"ping".to_vec())).unwrap().is_none());
        assert!(asm.is_assembling());

        let msg = asm
            .push(Frame::new(true, OpCode::Continuation, b"lo".to_vec()))
            .unwrap()
            .unwrap();
        assert_eq!(msg.payload, b"Hello");
    }

    #[test]
    fn test_continuation_without_start_fails() {
        let mut asm = assembler();
        let result = asm.push(Frame::new(true, OpCode::Continuation, b"x".to_vec()));
        assert!(matches!(result, Err(Error::ProtocolViolation(_))));
    }

    #[test]
    fn test_new_data_frame_mid_message_fails() {
        let mut asm = assembler();
        asm.push(Frame::new(false, OpCode::Text, b"first".to_vec()))
            .unwrap();
        let result = asm.push(Frame::text("second"));
        assert!(matches!(result, Err(Error::ProtocolViolation(_))));
    }

    #[test]
    fn test_message_size_limit() {
        let mut asm = MessageAssembler::new(Limits::new(100, 100, 128, 8192));
        let result = asm.push(Frame::text(vec![0u8; 150]));
        assert!(matches!(result, Err(Error::MessageTooLarge { .. })));
    }

    #[test]
    fn test_fragment_count_limit() {
        let mut asm = MessageAssembler::new(Limits::new(1024, 1024, 2, 8192));
        asm.push(Frame::new(false, OpCode::Binary, vec![1])).unwrap();
        asm.push(Frame::new(false, OpCode::Continuation, vec![2]))
            .unwrap();
        let result = asm.push(Frame::new(true, OpCode::Continuation, vec![3]));
        assert!(matches!(result, Err(Error::TooManyFragments { .. })));
    }

    #[test]
    fn test_into_text() {
        let msg = AssembledMessage {
            opcode: OpCode::Text,
            payload: b"Hello".to_vec(),
        };
        assert_eq!(msg.into_text().unwrap(), "Hello");

        let bad = AssembledMessage {
            opcode: OpCode::Text,
            payload: vec![0x80, 0x81],
        };
        assert!(matches!(bad.into_text(), Err(Error::InvalidUtf8)));
    }
}
