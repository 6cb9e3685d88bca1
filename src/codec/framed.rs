use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::Frame;

const READ_CHUNK: usize = 4096;

/// Generate a random seed for mask generation.
/// Falls back to system time if getrandom fails.
fn random_mask_seed() -> u32 {
    let mut buf = [0u8; 4];
    if getrandom::getrandom(&mut buf).is_ok() {
        u32::from_le_bytes(buf)
    } else {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u32)
            .unwrap_or(0x1234_5678)
    }
}

/// Buffered frame decoder over the read half of a stream.
///
/// Owned exclusively by a connection's receive loop. The declared payload
/// length and the mask flag are checked as soon as the header is buffered,
/// so an oversized or wrongly-masked frame is rejected without reading its
/// payload off the wire.
pub struct FrameReader<R> {
    io: R,
    read_buf: BytesMut,
    max_frame_size: usize,
    expects_masked: Option<bool>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    #[must_use]
    pub fn new(io: R) -> Self {
        Self {
            io,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            max_frame_size: usize::MAX,
            expects_masked: None,
        }
    }

    /// Create a reader whose buffer starts with bytes already read off the
    /// stream (e.g. frame data that arrived with the handshake).
    #[must_use]
    pub fn with_buffered(io: R, buffered: &[u8]) -> Self {
        let mut reader = Self::new(io);
        reader.read_buf.extend_from_slice(buffered);
        reader
    }

    /// Cap the declared payload length of a single frame.
    #[must_use]
    pub fn frame_size_limit(mut self, max: usize) -> Self {
        self.max_frame_size = max;
        self
    }

    /// Require incoming frames to be masked (`true`, server side) or
    /// unmasked (`false`, client side), per RFC 6455 §5.1.
    #[must_use]
    pub fn expect_masked(mut self, expected: bool) -> Self {
        self.expects_masked = Some(expected);
        self
    }

    /// Read raw bytes until one full frame is decodable, then decode it.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] on a clean EOF between frames.
    /// - [`Error::TruncatedFrame`] if the stream ends mid-frame.
    /// - [`Error::FrameTooLarge`] if the header declares a payload over the
    ///   configured limit.
    /// - [`Error::ProtocolViolation`] if the mask flag does not match what
    ///   this side expects.
    /// - Frame decode errors as per [`Frame::parse`].
    pub async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some((declared, masked)) = Frame::peek_header(&self.read_buf) {
                if declared > self.max_frame_size {
                    return Err(Error::FrameTooLarge {
                        size: declared,
                        max: self.max_frame_size,
                    });
                }
                if let Some(expected) = self.expects_masked {
                    if masked != expected {
                        return Err(Error::ProtocolViolation(if expected {
                            "unmasked frame from client".into()
                        } else {
                            "masked frame from server".into()
                        }));
                    }
                }
            }

            let needed = match Frame::parse(&self.read_buf) {
                Ok((frame, consumed)) => {
                    self.read_buf.advance(consumed);
                    return Ok(frame);
                }
                Err(Error::TruncatedFrame { needed }) => needed,
                Err(e) => return Err(e),
            };

            let n = self.io.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                if self.read_buf.is_empty() {
                    return Err(Error::ConnectionClosed);
                }
                return Err(Error::TruncatedFrame { needed });
            }
        }
    }
}

/// Frame encoder over the write half of a stream.
///
/// Masks outgoing payloads with a fresh key per frame when the role
/// requires it. Each frame is written with a single `write_all`, so a
/// caller holding this writer exclusively cannot interleave partial
/// frames.
pub struct FrameWriter<W> {
    io: W,
    write_buf: BytesMut,
    role: Role,
    mask_counter: u32,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    #[must_use]
    pub fn new(io: W, role: Role) -> Self {
        Self {
            io,
            write_buf: BytesMut::new(),
            role,
            mask_counter: random_mask_seed(),
        }
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    fn generate_mask(&mut self) -> [u8; 4] {
        self.mask_counter = self.mask_counter.wrapping_add(0x9E37_79B9);
        let a = self.mask_counter;
        let b = a.wrapping_mul(0x85EB_CA6B);
        let c = b ^ (b >> 13);
        let d = c.wrapping_mul(0xC2B2_AE35);
        d.to_le_bytes()
    }

    /// Encode and write one frame, masked iff the role is Client.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let mask = self.role.must_mask().then(|| self.generate_mask());

        let wire_size = frame.wire_size(mask.is_some());
        self.write_buf.clear();
        self.write_buf.resize(wire_size, 0);

        let written = frame.write(&mut self.write_buf, mask)?;
        self.io.write_all(&self.write_buf[..written]).await?;
        self.io.flush().await?;
        Ok(())
    }

    /// Shut down the underlying stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.io.shutdown().await?;
        Ok(())
    }
}
