//! Error type for the muxing pipeline.
//!
//! Media-level failures are wrapped as [`Error::Media`]; everything the
//! pipeline itself can reject has its own variant so callers can match on it.

use std::fmt;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by [`MuxingPipeline`](crate::pipeline::MuxingPipeline)
/// and its configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A frame's size differs from the configured video track.
    #[error("Dimension mismatch: expected {expected_width}x{expected_height}, got {width}x{height}")]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    /// The encoder rejected every codec it was offered.
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// The pipeline was finalized, cancelled or failed.
    #[error("Pipeline closed")]
    PipelineClosed,

    /// A frame that cannot be encoded (e.g. no pixel data).
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// The encoder failed for a reason other than the codec.
    #[error("Encoder error [{encoder}]: {message}")]
    Encoder {
        /// Name of the encoder that failed.
        encoder: String,
        /// Human-readable error description.
        message: String,
    },

    /// Configuration could not be turned into a pipeline.
    #[error("Config error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// The container builder failed.
    #[error(transparent)]
    Media(#[from] webmux_media::Error),

    /// The muxing task panicked or was aborted.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the caller may keep using the pipeline after this error.
    ///
    /// Rejected submissions leave state untouched; anything that broke the
    /// encoder or the document does not.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::DimensionMismatch { .. }
            | Error::UnsupportedCodec(_)
            | Error::PipelineClosed
            | Error::InvalidFrame(_)
            | Error::Config(_) => true,
            Error::Encoder { .. } | Error::Io { .. } | Error::Internal(_) => false,
            Error::Media(e) => e.is_recoverable(),
        }
    }

    /// Convenience constructor for [`Error::Encoder`].
    pub fn encoder(encoder: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::Encoder {
            encoder: encoder.into(),
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Config`].
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::DimensionMismatch {
            expected_width: 64,
            expected_height: 64,
            width: 32,
            height: 64,
        };
        assert_eq!(
            err.to_string(),
            "Dimension mismatch: expected 64x64, got 32x64"
        );
        assert_eq!(
            Error::encoder("passthrough", "closed").to_string(),
            "Encoder error [passthrough]: closed"
        );
    }

    #[test]
    fn test_recoverable() {
        assert!(Error::PipelineClosed.is_recoverable());
        assert!(Error::UnsupportedCodec("avc1".into()).is_recoverable());
        assert!(!Error::encoder("x", "boom").is_recoverable());
        assert!(Error::from(webmux_media::Error::invalid_value("neg")).is_recoverable());
        assert!(!Error::from(webmux_media::Error::OutOfRange { offset: 2, len: 1 }).is_recoverable());
    }

    #[test]
    fn test_media_error_passthrough() {
        let err: Error = webmux_media::Error::AlreadyFinalized.into();
        assert_eq!(err.to_string(), "Muxer already finalized");
    }
}
