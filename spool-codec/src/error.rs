//! Codec error taxonomy.
//!
//! Decode errors fall into two classes: *incomplete* errors mean the buffer
//! does not yet hold a whole frame and the loop should simply wait for more
//! bytes; every other error is fatal for the connection (decode) or surfaced
//! to the caller (encode).

use thiserror::Error;

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors produced by frame encoders and decoders.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The configured delimiter byte is absent from the buffered data.
    #[error("delimiter not found in buffered data")]
    DelimiterNotFound,

    /// Fewer bytes are buffered than the frame header or body requires.
    #[error("unexpected end of buffered data")]
    UnexpectedEof,

    /// Length-field width outside the supported set {1, 2, 3, 4, 8}.
    #[error("unsupported length field width: {0} (expected 1, 2, 3, 4 or 8)")]
    UnsupportedLength(usize),

    /// Outbound data is not a whole number of fixed-length frames.
    #[error("outbound data length is not a multiple of the fixed frame length")]
    InvalidFixedLength,

    /// The adjusted length field value came out negative.
    #[error("adjusted length field is negative: {0}")]
    TooLessLength(isize),

    /// The length value does not fit into the configured field width.
    #[error("length does not fit into a {width}: {length}")]
    LengthOverflow {
        length: usize,
        width: &'static str,
    },

    /// `initial_bytes_to_strip` is larger than the decoded frame.
    #[error("initial_bytes_to_strip {strip} exceeds frame length {frame_len}")]
    StripExceedsFrame { strip: usize, frame_len: usize },
}

impl CodecError {
    /// Whether this error means "not enough bytes yet".
    ///
    /// The drain loop stops on incomplete errors and waits for the next
    /// read; any other decode error tears the connection down.
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            CodecError::DelimiterNotFound | CodecError::UnexpectedEof
        )
    }
}
