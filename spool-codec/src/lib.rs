//! spool-codec: frame codecs and connection read buffers.
//!
//! This crate is the pure core of the spool server library: given bytes
//! arriving at arbitrary boundaries, present the application with exactly
//! one fully-formed frame per callback, zero-copy on the hot path and
//! without per-frame heap churn.
//!
//! # Pieces
//!
//! - [`ConnBuffer`]: the per-connection two-tier read buffer (persistent
//!   inbound ring plus latest-read scratch) with a small peek/consume
//!   surface.
//! - [`Codec`] and five built-in framers: pass-through, line-terminated,
//!   arbitrary-delimiter, fixed-length, and the Netty-style
//!   [`LengthFieldCodec`].
//! - [`pool`]: thread-safe free lists the buffers are borrowed from and
//!   returned to across connection lifetimes.
//!
//! # Example
//!
//! ```rust
//! use spool_codec::{Codec, ConnBuffer, LineCodec};
//!
//! let codec = LineCodec;
//! let mut buf = ConnBuffer::new();
//! buf.fill(b"ping\npo");
//!
//! assert_eq!(&codec.decode(&mut buf).unwrap()[..], b"ping");
//! assert!(codec.decode(&mut buf).unwrap_err().is_incomplete());
//!
//! buf.spill();
//! buf.fill(b"ng\n");
//! assert_eq!(&codec.decode(&mut buf).unwrap()[..], b"pong");
//! ```

pub mod buffer;
pub mod codec;
pub mod error;
pub mod pool;
pub mod ring;

pub use buffer::ConnBuffer;
pub use codec::{
    BuiltinCodec, ByteOrder, Codec, DecoderConfig, DelimiterCodec, EncoderConfig,
    FixedLengthCodec, LengthFieldCodec, LineCodec, LINE_TERMINATOR,
};
pub use error::{CodecError, Result};
pub use ring::RingBuffer;
