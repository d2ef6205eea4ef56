//! Shared fakes for pipeline integration tests.
//!
//! [`FakeEncoder`] stands in for a real codec: it can reject codecs, hold
//! chunks back and release them out of order on flush, or fail on a given
//! frame, or stall until the test releases it, while counting how the
//! pipeline drives it.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use webmux::pipeline::{ChunkSink, EncodeOptions, Encoder, EncoderConfig, RawFrame};
use webmux::{Error, PipelineConfig, Result};
use webmux_media::ebml::{ids, inspect, ElementValue};
use webmux_media::{Chunk, Codec, TrackConfig};

#[derive(Default)]
pub struct FakeEncoder {
    accepted: Option<Vec<Codec>>,
    reorder: bool,
    fail_at: Option<u64>,
    hold: Option<Arc<Semaphore>>,
    state: Mutex<FakeState>,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    pub configure_calls: AtomicUsize,
    pub flush_calls: AtomicUsize,
    pub close_calls: AtomicUsize,
}

#[derive(Default)]
struct FakeState {
    sink: Option<ChunkSink>,
    pending: Vec<Chunk>,
    encoded: u64,
}

impl FakeEncoder {
    /// Accepts any codec and emits chunks immediately.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepting(codecs: &[Codec]) -> Self {
        Self {
            accepted: Some(codecs.to_vec()),
            ..Self::default()
        }
    }

    /// Hold chunks until flush, then deliver them newest first.
    pub fn reordering() -> Self {
        Self {
            reorder: true,
            ..Self::default()
        }
    }

    /// Fail the `n`th encode call (0-based).
    pub fn failing_at(n: u64) -> Self {
        Self {
            fail_at: Some(n),
            ..Self::default()
        }
    }

    /// Every encode call waits for a permit on `release`.
    pub fn stalling(release: Arc<Semaphore>) -> Self {
        Self {
            hold: Some(release),
            ..Self::default()
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn configures(&self) -> usize {
        self.configure_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Encoder for FakeEncoder {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn configure(&self, config: &EncoderConfig, sink: ChunkSink) -> Result<()> {
        self.configure_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(accepted) = &self.accepted {
            if !accepted.contains(&config.codec) {
                return Err(Error::UnsupportedCodec(config.codec.to_string()));
            }
        }
        self.state.lock().sink = Some(sink);
        Ok(())
    }

    async fn encode(&self, frame: RawFrame, options: EncodeOptions) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        // Yield so concurrent submissions actually interleave.
        tokio::task::yield_now().await;
        if let Some(release) = &self.hold {
            release.acquire().await.unwrap().forget();
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut state = self.state.lock();
        let n = state.encoded;
        state.encoded += 1;
        if self.fail_at == Some(n) {
            return Err(Error::encoder("fake", format!("failed on frame {n}")));
        }

        let chunk = Chunk::new(
            options.timestamp_micros,
            options.duration_micros,
            options.key_frame,
            frame.data,
        );
        if self.reorder {
            state.pending.push(chunk);
        } else if let Some(sink) = &state.sink {
            sink.push(chunk);
        }
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.flush_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        let pending = std::mem::take(&mut state.pending);
        if let Some(sink) = &state.sink {
            for chunk in pending.into_iter().rev() {
                sink.push(chunk);
            }
        }
        Ok(())
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// 64x64 VP8 at 30 fps with no fallback.
pub fn vp8_config() -> PipelineConfig {
    PipelineConfig::new(TrackConfig::video(Codec::Vp8, 64, 64, 30.0))
}

pub fn frame(width: u32, height: u32) -> RawFrame {
    RawFrame::new(width, height, vec![0x5A; 16])
}

/// `(track, absolute timecode ms, keyframe)` for every block, in file order.
pub fn block_times(doc: &[u8]) -> Vec<(u64, i64, bool)> {
    let mut cluster_ms = 0i64;
    let mut out = Vec::new();
    for node in inspect(doc).unwrap() {
        match node.value {
            ElementValue::Uint(v) if node.header.id == ids::TIMECODE => cluster_ms = v as i64,
            ElementValue::Block {
                track,
                relative_timecode,
                keyframe,
                ..
            } => out.push((track, cluster_ms + relative_timecode as i64, keyframe)),
            _ => {}
        }
    }
    out
}

pub fn count_elements(doc: &[u8], id: u32) -> usize {
    inspect(doc)
        .unwrap()
        .iter()
        .filter(|n| n.header.id == id)
        .count()
}
