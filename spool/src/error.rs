//! Library error type.

use spool_codec::CodecError;
use thiserror::Error;

/// Result type for connection and loop operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the connection API.
///
/// Transport errors from writes executed on the owning loop are *not* here:
/// they are reported to the loop's error hook and never travel back to the
/// thread that posted the write.
#[derive(Debug, Error)]
pub enum Error {
    /// Encoding the outbound frame failed.
    #[error("codec: {0}")]
    Codec(#[from] CodecError),

    /// The owning loop's in-queue is gone.
    #[error("event loop is gone")]
    LoopGone,

    /// The connection has already been released.
    #[error("connection is closed")]
    Closed,

    /// `send_to` was called on a stream connection.
    #[error("send_to is only available on packet connections")]
    NotPacket,

    /// An I/O error from a direct (non-posted) transport operation.
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
}
