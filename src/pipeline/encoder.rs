//! The [`Encoder`] trait: the seam between the pipeline and whatever
//! compresses frames.
//!
//! Encoders are asynchronous and may deliver chunks out of submission order,
//! from any task. Output goes to a [`ChunkSink`] handed over in
//! [`Encoder::configure`]; the pipeline sorts everything before muxing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use webmux_media::{Chunk, Codec};

use crate::Result;

/// One uncompressed frame.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
}

impl RawFrame {
    pub fn new(width: u32, height: u32, data: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            data: data.into(),
        }
    }
}

/// Per-frame metadata handed to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub timestamp_micros: u64,
    pub duration_micros: u64,
    /// Force this frame to be a keyframe.
    pub key_frame: bool,
}

/// Parameters an encoder is configured with.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
    pub codec: Codec,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    /// Target bitrate in bits per second.
    pub bitrate: u32,
    /// Encoder-specific quality hint in 0.0..=1.0.
    pub quality: Option<f32>,
}

/// Append-only, shareable chunk collector.
///
/// Clones share the same storage, so the encoder can push from its own tasks
/// while the pipeline later drains everything at once.
#[derive(Debug, Clone, Default)]
pub struct ChunkSink {
    inner: Arc<SinkInner>,
}

#[derive(Debug, Default)]
struct SinkInner {
    chunks: Mutex<Vec<Chunk>>,
    collected: AtomicU64,
}

impl ChunkSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, chunk: Chunk) {
        self.inner.chunks.lock().push(chunk);
        self.inner.collected.fetch_add(1, Ordering::Relaxed);
    }

    /// Chunks currently held.
    pub fn len(&self) -> usize {
        self.inner.chunks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Chunks ever pushed, including drained ones.
    pub fn collected(&self) -> u64 {
        self.inner.collected.load(Ordering::Relaxed)
    }

    /// Drain all held chunks in arrival order.
    pub fn take(&self) -> Vec<Chunk> {
        std::mem::take(&mut *self.inner.chunks.lock())
    }

    /// Drop all held chunks.
    pub fn clear(&self) {
        self.inner.chunks.lock().clear();
    }
}

/// An asynchronous frame encoder.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// A short, human-readable name (e.g. "passthrough").
    fn name(&self) -> &'static str;

    /// Prepare for encoding with `config`, delivering output into `sink`.
    ///
    /// Fails with [`Error::UnsupportedCodec`](crate::Error::UnsupportedCodec)
    /// when the codec is not available; the pipeline may then call this
    /// again with a fallback codec.
    async fn configure(&self, config: &EncoderConfig, sink: ChunkSink) -> Result<()>;

    /// Queue one frame. The resulting chunk may arrive in the sink later.
    async fn encode(&self, frame: RawFrame, options: EncodeOptions) -> Result<()>;

    /// Wait until every queued frame has reached the sink.
    async fn flush(&self) -> Result<()>;

    /// Release encoder resources. Must be idempotent; called from `Drop`.
    fn close(&self);
}
