//! spool: event-driven TCP/UDP server library core.
//!
//! Servers built on spool accept many concurrent connections, read bytes as
//! they arrive, and invoke user handlers once complete application-level
//! frames have been assembled out of the raw stream. This crate holds the
//! connection shell and the loop handoff; the frame codecs and the two-tier
//! read buffer live in [`spool_codec`] and are re-exported here.
//!
//! # Ownership model
//!
//! Each connection belongs to exactly one event loop, and only that loop
//! mutates its buffers and transport. Any other thread talks to a
//! connection through a [`ConnHandle`], which posts [`Command`]s onto the
//! owning loop's in-queue. That single invariant is what lets per-connection
//! state go entirely lock-free.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use spool::{Action, Conn, EventHandler, EventLoop, LineCodec, LoopConfig};
//!
//! struct Echo;
//!
//! impl EventHandler for Echo {
//!     fn on_data(&self, _conn: &mut Conn, frame: Bytes) -> (Option<Bytes>, Action) {
//!         (Some(frame), Action::None)
//!     }
//! }
//!
//! let event_loop = EventLoop::new(Arc::new(Echo), Arc::new(LineCodec), &LoopConfig::default());
//! # let _ = event_loop;
//! ```

pub mod command;
pub mod config;
pub mod conn;
pub mod error;
pub mod eventloop;
pub mod handler;

pub use command::{loop_channel, Command, ConnId, LoopQueue, LoopSender};
pub use config::{BufferConfig, LoopConfig, SpoolConfig};
pub use conn::{Conn, ConnHandle};
pub use error::{Error, Result};
pub use eventloop::EventLoop;
pub use handler::{Action, EventHandler};

// the codec half, re-exported so embedders need only one dependency
pub use spool_codec::{
    BuiltinCodec, ByteOrder, Codec, CodecError, ConnBuffer, DecoderConfig, DelimiterCodec,
    EncoderConfig, FixedLengthCodec, LengthFieldCodec, LineCodec,
};
