//! Encoded media chunks as produced by an encoder.

use bytes::Bytes;

use crate::{Error, Result};

/// One independently encoded frame (or audio packet).
///
/// Times are in microseconds from the start of the recording. The payload is
/// reference-counted, so handing a chunk to the muxer never copies it.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Presentation timestamp in microseconds.
    pub timestamp_micros: u64,
    /// Duration in microseconds (may be 0).
    pub duration_micros: u64,
    /// Whether the chunk decodes without reference to earlier chunks.
    pub is_keyframe: bool,
    /// Encoded bytes.
    pub payload: Bytes,
}

impl Chunk {
    pub fn new(
        timestamp_micros: u64,
        duration_micros: u64,
        is_keyframe: bool,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            timestamp_micros,
            duration_micros,
            is_keyframe,
            payload: payload.into(),
        }
    }

    /// Build a chunk from signed encoder metadata, rejecting negative times.
    pub fn try_new(
        timestamp_micros: i64,
        duration_micros: i64,
        is_keyframe: bool,
        payload: impl Into<Bytes>,
    ) -> Result<Self> {
        let timestamp = u64::try_from(timestamp_micros).map_err(|_| {
            Error::invalid_value(format!("negative chunk timestamp {timestamp_micros}"))
        })?;
        let duration = u64::try_from(duration_micros).map_err(|_| {
            Error::invalid_value(format!("negative chunk duration {duration_micros}"))
        })?;
        Ok(Self::new(timestamp, duration, is_keyframe, payload))
    }

    /// Timestamp at which this chunk stops presenting.
    pub fn end_micros(&self) -> u64 {
        self.timestamp_micros.saturating_add(self.duration_micros)
    }
}
