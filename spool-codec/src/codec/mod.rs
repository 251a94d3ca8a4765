//! Frame codecs.
//!
//! A codec is a pair of inverse functions over the byte stream: `encode`
//! turns one application frame into wire bytes, `decode` carves the next
//! complete frame out of a connection's read buffer. Decoding either yields
//! one frame and consumes exactly its wire length, or reports an
//! incomplete-classified error and leaves the buffer untouched; the owning
//! loop calls `decode` to fixpoint after every read.
//!
//! Codecs hold configuration only, so one instance can sit behind an `Arc`
//! and serve every connection of a server.

mod length_field;

pub use length_field::{ByteOrder, DecoderConfig, EncoderConfig, LengthFieldCodec};

use bytes::{BufMut, Bytes, BytesMut};

use crate::buffer::ConnBuffer;
use crate::error::{CodecError, Result};

/// The line terminator used by [`LineCodec`].
pub const LINE_TERMINATOR: u8 = b'\n';

/// A frame encoder/decoder.
///
/// `decode` must call [`ConnBuffer::consume_n`] with the full wire length of
/// the frame (framing overhead included) before returning it, and must not
/// touch the buffer when it fails with an incomplete error.
pub trait Codec: Send + Sync {
    /// Encode one frame into wire bytes.
    fn encode(&self, buf: &[u8]) -> Result<Bytes>;

    /// Decode the next complete frame from the connection's read buffer.
    fn decode(&self, conn: &mut ConnBuffer) -> Result<Bytes>;
}

/// Pass-through codec, the default when no framing is configured.
///
/// Every arrival is treated as one opaque message: decode hands back all
/// buffered bytes and resets the buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCodec;

impl Codec for BuiltinCodec {
    fn encode(&self, buf: &[u8]) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(buf))
    }

    fn decode(&self, conn: &mut ConnBuffer) -> Result<Bytes> {
        if conn.is_empty() {
            return Err(CodecError::UnexpectedEof);
        }
        let frame = Bytes::copy_from_slice(conn.peek_all());
        conn.reset();
        Ok(frame)
    }
}

/// Newline-terminated frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineCodec;

impl Codec for LineCodec {
    fn encode(&self, buf: &[u8]) -> Result<Bytes> {
        Ok(terminated(buf, LINE_TERMINATOR))
    }

    fn decode(&self, conn: &mut ConnBuffer) -> Result<Bytes> {
        split_at_delimiter(conn, LINE_TERMINATOR)
    }
}

/// Frames terminated by an arbitrary configured byte.
#[derive(Debug, Clone, Copy)]
pub struct DelimiterCodec {
    delimiter: u8,
}

impl DelimiterCodec {
    /// Create a codec splitting frames on `delimiter`.
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }
}

impl Codec for DelimiterCodec {
    fn encode(&self, buf: &[u8]) -> Result<Bytes> {
        Ok(terminated(buf, self.delimiter))
    }

    fn decode(&self, conn: &mut ConnBuffer) -> Result<Bytes> {
        split_at_delimiter(conn, self.delimiter)
    }
}

/// Fixed-length frames.
///
/// Encoding is a pass-through for any whole number of frames; the only
/// check is that the output divides evenly, so callers may batch.
#[derive(Debug, Clone, Copy)]
pub struct FixedLengthCodec {
    frame_length: usize,
}

impl FixedLengthCodec {
    /// Create a codec for frames of exactly `frame_length` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `frame_length` is zero.
    pub fn new(frame_length: usize) -> Self {
        assert!(frame_length > 0, "frame_length must be positive");
        Self { frame_length }
    }
}

impl Codec for FixedLengthCodec {
    fn encode(&self, buf: &[u8]) -> Result<Bytes> {
        if buf.len() % self.frame_length != 0 {
            return Err(CodecError::InvalidFixedLength);
        }
        Ok(Bytes::copy_from_slice(buf))
    }

    fn decode(&self, conn: &mut ConnBuffer) -> Result<Bytes> {
        let (available, bytes) = conn.peek_n(self.frame_length);
        if available < self.frame_length {
            return Err(CodecError::UnexpectedEof);
        }
        let frame = Bytes::copy_from_slice(bytes);
        conn.consume_n(self.frame_length);
        Ok(frame)
    }
}

fn terminated(buf: &[u8], delimiter: u8) -> Bytes {
    let mut out = BytesMut::with_capacity(buf.len() + 1);
    out.extend_from_slice(buf);
    out.put_u8(delimiter);
    out.freeze()
}

fn split_at_delimiter(conn: &mut ConnBuffer, delimiter: u8) -> Result<Bytes> {
    let view = conn.peek_all();
    match view.iter().position(|&b| b == delimiter) {
        Some(idx) => {
            let frame = Bytes::copy_from_slice(&view[..idx]);
            conn.consume_n(idx + 1);
            Ok(frame)
        }
        None => Err(CodecError::DelimiterNotFound),
    }
}
