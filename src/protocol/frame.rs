//! WebSocket frame encoding and decoding (RFC 6455 §5.2).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode |M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)   |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |                         Masking key (if present)              |
//! +---------------------------------------------------------------+
//! |                     Payload data                              |
//! +---------------------------------------------------------------+
//! ```
//!
//! Extended lengths are big-endian: a payload of up to 125 bytes is
//! encoded inline, up to 65535 bytes via the `126` marker and a `u16`,
//! and anything larger via the `127` marker and a `u64`.

use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask;

/// Maximum payload size for control frames (RFC 6455 §5.5).
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

struct FrameHeader {
    fin: bool,
    opcode: OpCode,
    mask: Option<[u8; 4]>,
    payload_len: usize,
    header_len: usize,
}

/// Parse the fixed and extended header portions of a frame.
fn parse_header(buf: &[u8]) -> Result<FrameHeader> {
    if buf.len() < 2 {
        return Err(Error::TruncatedFrame {
            needed: 2 - buf.len(),
        });
    }

    let byte0 = buf[0];
    let byte1 = buf[1];

    let fin = (byte0 & 0x80) != 0;
    // No extensions are negotiated, so any RSV bit is a violation.
    if byte0 & 0x70 != 0 {
        return Err(Error::ProtocolViolation("reserved bits set".into()));
    }
    let opcode = OpCode::from_u8(byte0 & 0x0F)?;

    let masked = (byte1 & 0x80) != 0;
    let payload_len_initial = byte1 & 0x7F;

    let (payload_len, header_size) = match payload_len_initial {
        0..=125 => (payload_len_initial as usize, 2),
        126 => {
            if buf.len() < 4 {
                return Err(Error::TruncatedFrame {
                    needed: 4 - buf.len(),
                });
            }
            (u16::from_be_bytes([buf[2], buf[3]]) as usize, 4)
        }
        127 => {
            if buf.len() < 10 {
                return Err(Error::TruncatedFrame {
                    needed: 10 - buf.len(),
                });
            }
            let len = u64::from_be_bytes([
                buf[2], buf[3], buf[4], buf[5], buf[6], buf[7], buf[8], buf[9],
            ]);
            let len = usize::try_from(len).map_err(|_| {
                Error::ProtocolViolation(format!("payload length {len} exceeds platform limit"))
            })?;
            (len, 10)
        }
        _ => unreachable!(),
    };

    let total_header_size = if masked { header_size + 4 } else { header_size };
    if buf.len() < total_header_size {
        return Err(Error::TruncatedFrame {
            needed: total_header_size - buf.len(),
        });
    }

    let mask = masked.then(|| {
        [
            buf[header_size],
            buf[header_size + 1],
            buf[header_size + 2],
            buf[header_size + 3],
        ]
    });

    Ok(FrameHeader {
        fin,
        opcode,
        mask,
        payload_len,
        header_len: total_header_size,
    })
}

/// A single WebSocket frame.
///
/// Payloads are stored unmasked; masking is applied on the wire by
/// [`Frame::write`] and removed by [`Frame::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag. False only while fragmenting a message.
    pub fin: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Unmasked payload bytes.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame with the given parameters.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin,
            opcode,
            payload,
        }
    }

    /// Create an unfragmented text frame.
    #[must_use]
    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Text, data.into())
    }

    /// Create an unfragmented binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Binary, data.into())
    }

    /// Create a close frame with optional status code and reason.
    #[must_use]
    pub fn close(code: Option<u16>, reason: &str) -> Self {
        let payload = match code {
            Some(code) => {
                let mut data = code.to_be_bytes().to_vec();
                data.extend_from_slice(reason.as_bytes());
                data
            }
            None => Vec::new(),
        };
        Self::new(true, OpCode::Close, payload)
    }

    /// Create a ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Ping, data.into())
    }

    /// Create a pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Pong, data.into())
    }

    /// Decode a frame from a buffer.
    ///
    /// Returns the frame (payload unmasked) and the number of bytes
    /// consumed.
    ///
    /// # Errors
    ///
    /// - [`Error::TruncatedFrame`] if fewer bytes are available than the
    ///   header declares.
    /// - [`Error::InvalidOpcode`] for opcodes outside the six defined
    ///   values.
    /// - [`Error::ProtocolViolation`] for reserved bits or oversized
    ///   length fields.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        let header = parse_header(buf)?;

        let total_size = header
            .header_len
            .checked_add(header.payload_len)
            .ok_or_else(|| Error::ProtocolViolation("frame length overflow".into()))?;

        if buf.len() < total_size {
            return Err(Error::TruncatedFrame {
                needed: total_size - buf.len(),
            });
        }

        let mut payload = buf[header.header_len..total_size].to_vec();
        if let Some(mask) = header.mask {
            apply_mask(&mut payload, mask);
        }

        Ok((
            Frame {
                fin: header.fin,
                opcode: header.opcode,
                payload,
            },
            total_size,
        ))
    }

    /// Declared payload length and mask flag, once enough bytes are
    /// buffered to parse the header. Lets a reader reject a frame before
    /// its payload arrives.
    pub(crate) fn peek_header(buf: &[u8]) -> Option<(usize, bool)> {
        parse_header(buf)
            .ok()
            .map(|header| (header.payload_len, header.mask.is_some()))
    }

    /// Validate control-frame constraints (RFC 6455 §5.5).
    ///
    /// # Errors
    ///
    /// - [`Error::FragmentedControlFrame`] if a control frame has FIN=0.
    /// - [`Error::ControlFrameTooLarge`] if a control payload exceeds 125
    ///   bytes.
    pub fn validate(&self) -> Result<()> {
        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if self.payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::ControlFrameTooLarge(self.payload.len()));
            }
        }
        Ok(())
    }

    /// Encode the frame into `buf`, masking the payload when a key is
    /// supplied. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TruncatedFrame`] if `buf` is smaller than
    /// [`Frame::wire_size`].
    pub fn write(&self, buf: &mut [u8], mask: Option<[u8; 4]>) -> Result<usize> {
        let payload_len = self.payload.len();

        let (len_marker, extended_len_size) = if payload_len <= 125 {
            (payload_len as u8, 0)
        } else if payload_len <= 65535 {
            (126, 2)
        } else {
            (127, 8)
        };

        let mask_size = if mask.is_some() { 4 } else { 0 };
        let total_size = 2 + extended_len_size + mask_size + payload_len;
        if buf.len() < total_size {
            return Err(Error::TruncatedFrame {
                needed: total_size - buf.len(),
            });
        }

        buf[0] = self.opcode.as_u8() | if self.fin { 0x80 } else { 0 };
        buf[1] = len_marker | if mask.is_some() { 0x80 } else { 0 };

        let mut offset = 2;
        match extended_len_size {
            2 => {
                buf[2..4].copy_from_slice(&(payload_len as u16).to_be_bytes());
                offset = 4;
            }
            8 => {
                buf[2..10].copy_from_slice(&(payload_len as u64).to_be_bytes());
                offset = 10;
            }
            _ => {}
        }

        if let Some(mask_key) = mask {
            buf[offset..offset + 4].copy_from_slice(&mask_key);
            offset += 4;
        }

        buf[offset..offset + payload_len].copy_from_slice(&self.payload);
        if let Some(mask_key) = mask {
            apply_mask(&mut buf[offset..offset + payload_len], mask_key);
        }

        Ok(total_size)
    }

    /// Size of this frame on the wire.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let payload_len = self.payload.len();
        let extended_len_size = if payload_len <= 125 {
            0
        } else if payload_len <= 65535 {
            2
        } else {
            8
        };
        let mask_size = if masked { 4 } else { 0 };
        2 + extended_len_size + mask_size + payload_len
    }

    /// Encode into a fresh buffer.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Frame::write`].
    pub fn encode(&self, mask: Option<[u8; 4]>) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.wire_size(mask.is_some())];
        let written = self.write(&mut buf, mask)?;
        buf.truncate(written);
        Ok(buf)
    }
}
