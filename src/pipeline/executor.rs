//! [`MuxingPipeline`]: frames in, one WebM document out.
//!
//! Frames are forwarded to an [`Encoder`] as they are submitted; chunks come
//! back through a [`ChunkSink`] in whatever order the encoder produces them.
//! Nothing is muxed until [`MuxingPipeline::finalize`], which flushes the
//! encoder, sorts the collected chunks and hands them to a [`WebmMuxer`]
//! running on a blocking task that owns it exclusively.
//!
//! `submit` calls hold a shared gate for their whole duration; `finalize`
//! and `cancel` take it exclusively, so they wait for in-flight submissions
//! and every call arriving afterwards sees a terminal state.
//!
//! At most `max_pending_frames` frames are inside the encoder at once; further
//! submissions wait for a slot, so a producer faster than the encoder is
//! slowed down instead of piling frames up in memory.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{RwLock, Semaphore};
use webmux_media::{
    AudioTrackConfig, Chunk, Codec, MuxerConfig, MuxerOptions, TrackConfig, WebmMuxer,
};

use super::context::{ProgressSender, Stage};
use super::encoder::{ChunkSink, EncodeOptions, Encoder, EncoderConfig, RawFrame};
use crate::{Error, Result};

/// Default distance between forced keyframes.
pub const DEFAULT_KEYFRAME_INTERVAL: u64 = 30;

/// Default target bitrate (5 Mbit/s).
pub const DEFAULT_BITRATE: u32 = 5_000_000;

/// Default number of frames allowed inside the encoder at once.
pub const DEFAULT_MAX_PENDING_FRAMES: usize = 10;

/// Minimum gap between periodic encoding statistics log lines.
const STATS_LOG_INTERVAL: Duration = Duration::from_secs(1);

/// Lifecycle of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    Ready,
    Muxing,
    Finalized,
    Cancelled,
    Errored,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Finalized | PipelineState::Cancelled | PipelineState::Errored
        )
    }
}

/// Everything needed to run one recording.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Video track; its codec is the one offered to the encoder first.
    pub video: TrackConfig,
    pub audio: Option<AudioTrackConfig>,
    /// Offered once if the encoder rejects the preferred codec.
    pub fallback_codec: Option<Codec>,
    /// Every Nth frame is forced to be a keyframe.
    pub keyframe_interval: u64,
    pub bitrate: u32,
    pub quality: Option<f32>,
    /// Frames allowed inside the encoder at once before `submit` waits.
    pub max_pending_frames: usize,
    pub muxer: MuxerOptions,
    /// Used only for progress percentages.
    pub expected_frames: Option<u64>,
}

impl PipelineConfig {
    pub fn new(video: TrackConfig) -> Self {
        Self {
            video,
            audio: None,
            fallback_codec: None,
            keyframe_interval: DEFAULT_KEYFRAME_INTERVAL,
            bitrate: DEFAULT_BITRATE,
            quality: None,
            max_pending_frames: DEFAULT_MAX_PENDING_FRAMES,
            muxer: MuxerOptions::default(),
            expected_frames: None,
        }
    }

    pub fn with_audio(mut self, audio: AudioTrackConfig) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_fallback_codec(mut self, codec: Codec) -> Self {
        self.fallback_codec = Some(codec);
        self
    }

    pub fn with_keyframe_interval(mut self, interval: u64) -> Self {
        self.keyframe_interval = interval;
        self
    }

    pub fn with_max_pending_frames(mut self, frames: usize) -> Self {
        self.max_pending_frames = frames;
        self
    }

    pub fn with_expected_frames(mut self, frames: u64) -> Self {
        self.expected_frames = Some(frames);
        self
    }

    pub fn with_muxer_options(mut self, options: MuxerOptions) -> Self {
        self.muxer = options;
        self
    }

    /// Check the encoder-side settings the muxer does not see.
    pub fn validate(&self) -> Result<()> {
        if self.keyframe_interval == 0 {
            return Err(Error::config("keyframe_interval must be at least 1"));
        }
        if self.max_pending_frames == 0 {
            return Err(Error::config("max_pending_frames must be at least 1"));
        }
        Ok(())
    }

    fn encoder_config(&self, codec: Codec) -> EncoderConfig {
        EncoderConfig {
            codec,
            width: self.video.width,
            height: self.video.height,
            frame_rate: self.video.frame_rate,
            bitrate: self.bitrate,
            quality: self.quality,
        }
    }

    /// Codecs to offer, in order: the preferred one, then the fallback.
    fn codec_candidates(&self) -> Vec<Codec> {
        let mut codecs = vec![self.video.codec];
        if let Some(fallback) = self.fallback_codec {
            if fallback != self.video.codec {
                codecs.push(fallback);
            }
        }
        codecs
    }

    fn encode_options(&self, frame_index: u64) -> EncodeOptions {
        let frame_micros = self.video.frame_duration_micros();
        EncodeOptions {
            timestamp_micros: (frame_index as f64 * frame_micros) as u64,
            duration_micros: frame_micros as u64,
            key_frame: frame_index % self.keyframe_interval == 0,
        }
    }
}

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_submitted: u64,
    /// Frames the encoder accepted without error.
    pub frames_encoded: u64,
    pub chunks_collected: u64,
    pub audio_chunks_collected: u64,
    /// Bytes in the document so far; the full length once finalized.
    pub bytes_written: u64,
    /// Frames currently inside the encoder.
    pub pending_frames: usize,
    /// Sum of time spent in `Encoder::encode`.
    pub encode_time: Duration,
    /// Slowest single `Encoder::encode` call.
    pub max_encode_time: Duration,
    /// Wall-clock time from the first submission to the last encoded frame.
    pub encoding_elapsed: Duration,
}

impl PipelineStats {
    /// Mean time per encoded frame.
    pub fn average_encode_time(&self) -> Option<Duration> {
        let frames = u32::try_from(self.frames_encoded).ok()?;
        if frames == 0 {
            return None;
        }
        Some(self.encode_time / frames)
    }

    /// Encoded frames per second of wall-clock time.
    pub fn encode_fps(&self) -> Option<f64> {
        let secs = self.encoding_elapsed.as_secs_f64();
        if self.frames_encoded == 0 || secs <= 0.0 {
            return None;
        }
        Some(self.frames_encoded as f64 / secs)
    }
}

struct Inner {
    state: PipelineState,
    active_codec: Option<Codec>,
    muxer: Option<WebmMuxer>,
    frames_submitted: u64,
    bytes_written: u64,
    timing: EncodeTiming,
}

#[derive(Default)]
struct EncodeTiming {
    frames: u64,
    total: Duration,
    max: Duration,
    started: Option<Instant>,
    last_done: Option<Instant>,
    last_logged: Option<Instant>,
}

impl EncodeTiming {
    fn start(&mut self, now: Instant) {
        self.started.get_or_insert(now);
    }

    fn record(&mut self, took: Duration, done: Instant) {
        self.frames += 1;
        self.total += took;
        self.max = self.max.max(took);
        self.last_done = Some(done);
    }

    fn elapsed(&self) -> Duration {
        match (self.started, self.last_done) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            _ => Duration::ZERO,
        }
    }

    /// Whether a periodic log line is due, marking it sent if so.
    fn log_due(&mut self, now: Instant) -> bool {
        match self.last_logged {
            Some(last) if now.saturating_duration_since(last) < STATS_LOG_INTERVAL => false,
            _ => {
                self.last_logged = Some(now);
                true
            }
        }
    }
}

/// Drives an [`Encoder`] and a [`WebmMuxer`] for one recording.
pub struct MuxingPipeline {
    config: PipelineConfig,
    encoder: Arc<dyn Encoder>,
    gate: RwLock<()>,
    slots: Semaphore,
    inner: Mutex<Inner>,
    video_chunks: ChunkSink,
    audio_chunks: ChunkSink,
    progress: Arc<ProgressSender>,
}

impl MuxingPipeline {
    pub fn new(config: PipelineConfig, encoder: Arc<dyn Encoder>) -> Self {
        let slots = Semaphore::new(config.max_pending_frames.min(Semaphore::MAX_PERMITS));
        Self {
            config,
            encoder,
            gate: RwLock::new(()),
            slots,
            inner: Mutex::new(Inner {
                state: PipelineState::Uninitialized,
                active_codec: None,
                muxer: None,
                frames_submitted: 0,
                bytes_written: 0,
                timing: EncodeTiming::default(),
            }),
            video_chunks: ChunkSink::new(),
            audio_chunks: ChunkSink::new(),
            progress: Arc::new(ProgressSender::noop()),
        }
    }

    /// Builder: attach a progress sender.
    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = Arc::new(progress);
        self
    }

    pub fn state(&self) -> PipelineState {
        self.inner.lock().state
    }

    /// Codec the encoder accepted, once initialized.
    pub fn active_codec(&self) -> Option<Codec> {
        self.inner.lock().active_codec
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stats(&self) -> PipelineStats {
        let inner = self.inner.lock();
        let bytes_written = match &inner.muxer {
            Some(muxer) => muxer.bytes_written() as u64,
            None => inner.bytes_written,
        };
        PipelineStats {
            frames_submitted: inner.frames_submitted,
            frames_encoded: inner.timing.frames,
            chunks_collected: self.video_chunks.collected(),
            audio_chunks_collected: self.audio_chunks.collected(),
            bytes_written,
            pending_frames: self
                .config
                .max_pending_frames
                .saturating_sub(self.slots.available_permits()),
            encode_time: inner.timing.total,
            max_encode_time: inner.timing.max,
            encoding_elapsed: inner.timing.elapsed(),
        }
    }

    /// Configure the encoder (falling back to the second codec once) and
    /// write the document header.
    ///
    /// On failure the pipeline is `Errored` and the encoder is released.
    pub async fn initialize(&self) -> Result<()> {
        let _exclusive = self.gate.write().await;
        match self.state() {
            PipelineState::Uninitialized => {}
            state if state.is_terminal() => return Err(Error::PipelineClosed),
            _ => return Err(Error::config("pipeline already initialized")),
        }
        self.progress.send(0.0, Stage::Initializing);

        match self.try_initialize().await {
            Ok(codec) => {
                tracing::info!(
                    encoder = self.encoder.name(),
                    %codec,
                    width = self.config.video.width,
                    height = self.config.video.height,
                    "pipeline ready"
                );
                Ok(())
            }
            Err(e) => {
                self.inner.lock().state = PipelineState::Errored;
                self.encoder.close();
                tracing::error!("pipeline initialization failed: {e}");
                Err(e)
            }
        }
    }

    async fn try_initialize(&self) -> Result<Codec> {
        self.config.validate()?;
        let codec = self.negotiate_codec().await?;

        let mut video = self.config.video.clone();
        video.codec = codec;
        let muxer_config = MuxerConfig {
            video,
            audio: self.config.audio.clone(),
        };
        let muxer = WebmMuxer::new(muxer_config, self.config.muxer.clone())?;

        let mut inner = self.inner.lock();
        inner.bytes_written = muxer.bytes_written() as u64;
        inner.muxer = Some(muxer);
        inner.active_codec = Some(codec);
        inner.state = PipelineState::Ready;
        Ok(codec)
    }

    async fn negotiate_codec(&self) -> Result<Codec> {
        let mut rejected = Vec::new();
        for codec in self.config.codec_candidates() {
            let encoder_config = self.config.encoder_config(codec);
            match self
                .encoder
                .configure(&encoder_config, self.video_chunks.clone())
                .await
            {
                Ok(()) => {
                    tracing::debug!(%codec, "encoder accepted codec");
                    return Ok(codec);
                }
                Err(Error::UnsupportedCodec(reason)) => {
                    tracing::warn!(%codec, "encoder rejected codec: {reason}");
                    rejected.push(codec.to_string());
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::UnsupportedCodec(rejected.join(", ")))
    }

    /// Validate a frame and hand it to the encoder.
    ///
    /// Waits while `max_pending_frames` frames are already being encoded.
    /// Rejected frames (`DimensionMismatch`, `InvalidFrame`) change nothing.
    pub async fn submit(&self, frame: RawFrame) -> Result<()> {
        let _shared = self.gate.read().await;
        let _slot = self
            .slots
            .acquire()
            .await
            .map_err(|_| Error::PipelineClosed)?;

        let (index, options) = {
            let mut inner = self.inner.lock();
            check_open(inner.state)?;

            let video = &self.config.video;
            if frame.width != video.width || frame.height != video.height {
                return Err(Error::DimensionMismatch {
                    expected_width: video.width,
                    expected_height: video.height,
                    width: frame.width,
                    height: frame.height,
                });
            }
            if frame.data.is_empty() {
                return Err(Error::InvalidFrame("frame has no data".into()));
            }

            let index = inner.frames_submitted;
            inner.frames_submitted += 1;
            inner.state = PipelineState::Muxing;
            inner.timing.start(Instant::now());
            (index, self.config.encode_options(index))
        };

        let started = Instant::now();
        if let Err(e) = self.encoder.encode(frame, options).await {
            self.inner.lock().state = PipelineState::Errored;
            self.encoder.close();
            tracing::error!(frame = index, "encoder failed: {e}");
            return Err(e);
        }
        let done = Instant::now();
        let log_due = {
            let mut inner = self.inner.lock();
            inner.timing.record(done.saturating_duration_since(started), done);
            inner.timing.log_due(done)
        };
        if log_due {
            self.log_encoding_stats();
        }

        let pct = match self.config.expected_frames {
            Some(expected) if expected > 0 => (index + 1) as f32 / expected as f32 * 100.0,
            _ => 0.0,
        };
        self.progress.send(pct, Stage::Encoding);
        tracing::trace!(frame = index, timestamp = options.timestamp_micros, "submitted frame");
        Ok(())
    }

    /// Queue an already-encoded audio chunk.
    pub async fn submit_audio_chunk(&self, chunk: Chunk) -> Result<()> {
        let _shared = self.gate.read().await;
        {
            let mut inner = self.inner.lock();
            check_open(inner.state)?;
            if self.config.audio.is_none() {
                return Err(Error::config("no audio track configured"));
            }
            inner.state = PipelineState::Muxing;
        }
        self.audio_chunks.push(chunk);
        Ok(())
    }

    /// Flush the encoder, mux every collected chunk in timestamp order and
    /// return the finished document.
    ///
    /// The encoder is released whether or not this succeeds.
    pub async fn finalize(&self) -> Result<Bytes> {
        let _exclusive = self.gate.write().await;
        check_open(self.state())?;
        let _release = EncoderRelease(self.encoder.as_ref());

        match self.finish().await {
            Ok(document) => {
                let mut inner = self.inner.lock();
                inner.state = PipelineState::Finalized;
                inner.bytes_written = document.len() as u64;
                drop(inner);

                self.progress.send(100.0, Stage::Finalizing);
                tracing::info!(bytes = document.len(), "pipeline finalized");
                Ok(document)
            }
            Err(e) => {
                let mut inner = self.inner.lock();
                inner.state = PipelineState::Errored;
                inner.muxer = None;
                drop(inner);

                self.video_chunks.clear();
                self.audio_chunks.clear();
                tracing::error!("finalize failed: {e}");
                Err(e)
            }
        }
    }

    async fn finish(&self) -> Result<Bytes> {
        self.encoder.flush().await?;
        self.log_encoding_stats();

        let muxer = self
            .inner
            .lock()
            .muxer
            .take()
            .ok_or_else(|| Error::Internal("muxer missing".into()))?;
        let video = self.video_chunks.take();
        let audio = self.audio_chunks.take();
        tracing::debug!(
            video = video.len(),
            audio = audio.len(),
            "muxing collected chunks"
        );

        let progress = Arc::clone(&self.progress);
        tokio::task::spawn_blocking(move || mux_sorted(muxer, video, audio, &progress))
            .await
            .map_err(|e| Error::Internal(format!("muxing task failed: {e}")))?
    }

    fn log_encoding_stats(&self) {
        let stats = self.stats();
        tracing::debug!(
            encoded = stats.frames_encoded,
            expected = ?self.config.expected_frames,
            avg_encode_ms = stats
                .average_encode_time()
                .map(|d| d.as_secs_f64() * 1000.0)
                .unwrap_or(0.0),
            max_encode_ms = stats.max_encode_time.as_secs_f64() * 1000.0,
            fps = stats.encode_fps().unwrap_or(0.0),
            pending = stats.pending_frames,
            capacity = self.config.max_pending_frames,
            "encoding stats"
        );
    }

    /// Drop everything collected and release the encoder. No document is
    /// produced.
    pub async fn cancel(&self) -> Result<()> {
        let _exclusive = self.gate.write().await;
        {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                return Err(Error::PipelineClosed);
            }
            inner.state = PipelineState::Cancelled;
            inner.muxer = None;
        }

        self.video_chunks.clear();
        self.audio_chunks.clear();
        self.encoder.close();
        tracing::info!("pipeline cancelled");
        Ok(())
    }
}

impl Drop for MuxingPipeline {
    fn drop(&mut self) {
        self.encoder.close();
    }
}

fn check_open(state: PipelineState) -> Result<()> {
    match state {
        PipelineState::Ready | PipelineState::Muxing => Ok(()),
        PipelineState::Uninitialized => Err(Error::config("pipeline not initialized")),
        _ => Err(Error::PipelineClosed),
    }
}

/// Closes the encoder when dropped.
struct EncoderRelease<'a>(&'a dyn Encoder);

impl Drop for EncoderRelease<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Sort each track by timestamp, interleave them (video first on ties) and
/// run them through the muxer.
fn mux_sorted(
    mut muxer: WebmMuxer,
    mut video: Vec<Chunk>,
    mut audio: Vec<Chunk>,
    progress: &ProgressSender,
) -> Result<Bytes> {
    video.sort_by_key(|c| c.timestamp_micros);
    audio.sort_by_key(|c| c.timestamp_micros);

    let total = (video.len() + audio.len()).max(1);
    let mut video = video.into_iter().peekable();
    let mut audio = audio.into_iter().peekable();
    let mut done = 0usize;

    loop {
        let take_video = match (video.peek(), audio.peek()) {
            (Some(v), Some(a)) => v.timestamp_micros <= a.timestamp_micros,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };

        if take_video {
            if let Some(chunk) = video.next() {
                muxer.add_video_chunk(&chunk)?;
            }
        } else if let Some(chunk) = audio.next() {
            muxer.add_audio_chunk(&chunk)?;
        }

        done += 1;
        if done % 64 == 0 {
            progress.send(done as f32 / total as f32 * 100.0, Stage::Muxing);
        }
    }
    progress.send(100.0, Stage::Muxing);

    Ok(muxer.finalize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::passthrough::PassthroughEncoder;
    use webmux_media::ebml::{ids, reader};

    fn config() -> PipelineConfig {
        PipelineConfig::new(TrackConfig::video(Codec::Vp8, 4, 4, 30.0))
    }

    #[test]
    fn test_encode_options() {
        let config = config().with_keyframe_interval(2);
        assert_eq!(
            config.encode_options(0),
            EncodeOptions {
                timestamp_micros: 0,
                duration_micros: 33_333,
                key_frame: true
            }
        );
        assert_eq!(config.encode_options(1).timestamp_micros, 33_333);
        assert!(!config.encode_options(1).key_frame);
        assert_eq!(config.encode_options(2).timestamp_micros, 66_666);
        assert!(config.encode_options(2).key_frame);
    }

    #[test]
    fn test_codec_candidates() {
        assert_eq!(config().codec_candidates(), vec![Codec::Vp8]);
        assert_eq!(
            config().with_fallback_codec(Codec::Vp8).codec_candidates(),
            vec![Codec::Vp8]
        );
        let mut vp9 = config().with_fallback_codec(Codec::Vp8);
        vp9.video.codec = Codec::Vp9;
        assert_eq!(vp9.codec_candidates(), vec![Codec::Vp9, Codec::Vp8]);
    }

    #[test]
    fn test_mux_sorted_interleaves() {
        let muxer_config = MuxerConfig::video_only(TrackConfig::video(Codec::Vp8, 4, 4, 30.0))
            .with_audio(AudioTrackConfig::new(Codec::Opus, 48_000.0, 1));
        let muxer = WebmMuxer::new(muxer_config, MuxerOptions::default()).unwrap();

        let video = vec![
            Chunk::new(40_000, 40_000, false, vec![2]),
            Chunk::new(0, 40_000, true, vec![1]),
        ];
        let audio = vec![
            Chunk::new(40_000, 20_000, true, vec![0xA2]),
            Chunk::new(20_000, 20_000, true, vec![0xA1]),
        ];
        let doc = mux_sorted(muxer, video, audio, &ProgressSender::noop()).unwrap();

        let order: Vec<_> = reader::find_all(&doc, ids::SIMPLE_BLOCK)
            .unwrap()
            .into_iter()
            .map(|n| match n.value {
                reader::ElementValue::Block {
                    track,
                    relative_timecode,
                    ..
                } => (track, relative_timecode),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(order, vec![(1, 0), (2, 20), (1, 40), (2, 40)]);
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let encoder = Arc::new(PassthroughEncoder::new());
        let pipeline = MuxingPipeline::new(config(), encoder.clone());
        assert_eq!(pipeline.state(), PipelineState::Uninitialized);
        assert!(matches!(
            pipeline.submit(RawFrame::new(4, 4, vec![0; 48])).await,
            Err(Error::Config(_))
        ));

        pipeline.initialize().await.unwrap();
        assert_eq!(pipeline.state(), PipelineState::Ready);
        assert_eq!(pipeline.active_codec(), Some(Codec::Vp8));
        assert!(pipeline.stats().bytes_written > 0);

        pipeline
            .submit(RawFrame::new(4, 4, vec![0; 48]))
            .await
            .unwrap();
        assert_eq!(pipeline.state(), PipelineState::Muxing);

        let doc = pipeline.finalize().await.unwrap();
        assert_eq!(pipeline.state(), PipelineState::Finalized);
        assert!(encoder.is_closed());
        assert_eq!(pipeline.stats().bytes_written, doc.len() as u64);
        assert!(matches!(
            pipeline.finalize().await,
            Err(Error::PipelineClosed)
        ));
    }

    #[tokio::test]
    async fn test_audio_requires_track() {
        let pipeline = MuxingPipeline::new(config(), Arc::new(PassthroughEncoder::new()));
        pipeline.initialize().await.unwrap();
        let err = pipeline
            .submit_audio_chunk(Chunk::new(0, 20_000, true, vec![1]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(pipeline.stats().audio_chunks_collected, 0);
        assert_eq!(pipeline.state(), PipelineState::Ready);
    }

    #[tokio::test]
    async fn test_zero_keyframe_interval_rejected() {
        let encoder = Arc::new(PassthroughEncoder::new());
        let pipeline = MuxingPipeline::new(config().with_keyframe_interval(0), encoder.clone());

        assert!(matches!(
            pipeline.initialize().await,
            Err(Error::Config(msg)) if msg.contains("keyframe_interval")
        ));
        assert_eq!(pipeline.state(), PipelineState::Errored);
        assert_eq!(encoder.codec(), None);
        assert!(encoder.is_closed());
        assert!(matches!(
            pipeline.submit(RawFrame::new(4, 4, vec![0; 48])).await,
            Err(Error::PipelineClosed)
        ));
    }

    #[tokio::test]
    async fn test_zero_pending_frames_rejected() {
        let pipeline = MuxingPipeline::new(
            config().with_max_pending_frames(0),
            Arc::new(PassthroughEncoder::new()),
        );
        assert!(matches!(
            pipeline.initialize().await,
            Err(Error::Config(_))
        ));
        assert_eq!(pipeline.state(), PipelineState::Errored);
    }

    #[tokio::test]
    async fn test_encode_timing() {
        let pipeline = MuxingPipeline::new(config(), Arc::new(PassthroughEncoder::new()));
        pipeline.initialize().await.unwrap();
        assert_eq!(pipeline.stats().average_encode_time(), None);

        for _ in 0..3 {
            pipeline
                .submit(RawFrame::new(4, 4, vec![0; 48]))
                .await
                .unwrap();
        }
        let stats = pipeline.stats();
        assert_eq!(stats.frames_encoded, 3);
        assert_eq!(stats.pending_frames, 0);
        assert!(stats.average_encode_time().is_some());
        assert!(stats.max_encode_time <= stats.encode_time);
        assert!(stats.encoding_elapsed >= stats.max_encode_time);
    }

    #[test]
    fn test_stats_rates() {
        let stats = PipelineStats {
            frames_encoded: 4,
            encode_time: Duration::from_millis(40),
            encoding_elapsed: Duration::from_secs(2),
            ..Default::default()
        };
        assert_eq!(stats.average_encode_time(), Some(Duration::from_millis(10)));
        assert_eq!(stats.encode_fps(), Some(2.0));

        let empty = PipelineStats::default();
        assert_eq!(empty.average_encode_time(), None);
        assert_eq!(empty.encode_fps(), None);
    }

    #[tokio::test]
    async fn test_initialize_twice() {
        let pipeline = MuxingPipeline::new(config(), Arc::new(PassthroughEncoder::new()));
        pipeline.initialize().await.unwrap();
        assert!(matches!(
            pipeline.initialize().await,
            Err(Error::Config(_))
        ));
        assert_eq!(pipeline.state(), PipelineState::Ready);
    }
}
