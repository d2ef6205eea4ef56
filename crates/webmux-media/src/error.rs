//! Error types for webmux-media.

use thiserror::Error;

/// Result type for webmux-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for webmux-media operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A value cannot be represented in the requested encoding.
    ///
    /// This is the one buffer-level error reachable from external input
    /// (e.g. a negative or non-finite duration), so callers should report it
    /// rather than treat it as a bug.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Growing the buffer failed.
    #[error("Capacity overflow: cannot grow buffer to {requested} bytes")]
    CapacityOverflow { requested: usize },

    /// A backpatch target was reserved with fewer bytes than the new size needs.
    #[error("Size mismatch for {element}: need {required} byte(s), reserved {reserved}")]
    SizeMismatch {
        element: String,
        required: usize,
        reserved: usize,
    },

    /// The cursor or an offset lies outside the valid data.
    #[error("Offset {offset} out of range (valid length {len})")]
    OutOfRange { offset: usize, len: usize },

    /// No element start was recorded under this name.
    #[error("Unknown element: {0}")]
    UnknownElement(String),

    /// The muxer was used after `finalize`.
    #[error("Muxer already finalized")]
    AlreadyFinalized,

    /// Codec string not recognised.
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// Input ended inside an element or VINT.
    #[error("Truncated input: need {need} bytes at offset {offset}, have {have}")]
    Truncated {
        offset: usize,
        need: usize,
        have: usize,
    },

    /// A byte that cannot start a VINT (all-zero leading byte).
    #[error("Invalid VINT at offset {offset}")]
    InvalidVint { offset: usize },

    /// Master elements nested deeper than the reader follows.
    #[error("Element at offset {offset} nested deeper than {max} levels")]
    TooDeep { offset: usize, max: usize },
}

impl Error {
    /// Create an invalid value error.
    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Self::InvalidValue(msg.into())
    }

    /// Create an unsupported codec error.
    pub fn unsupported_codec(msg: impl Into<String>) -> Self {
        Self::UnsupportedCodec(msg.into())
    }

    /// Whether the error comes from bad input rather than a contract violation
    /// inside the muxer.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InvalidValue(_)
                | Error::UnsupportedCodec(_)
                | Error::AlreadyFinalized
                | Error::Truncated { .. }
                | Error::InvalidVint { .. }
                | Error::TooDeep { .. }
        )
    }
}
