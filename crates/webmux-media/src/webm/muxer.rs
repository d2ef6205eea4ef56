//! WebM document builder.
//!
//! [`WebmMuxer`] writes the EBML header, Segment, Info and Tracks up front,
//! then gathers chunks into an in-memory [`Cluster`] which is serialized
//! whenever a new one has to be opened. Sizes that are not known until the
//! end (Segment, Duration) are backpatched in [`WebmMuxer::finalize`].

use bytes::Bytes;

use crate::buffer::GrowableByteBuffer;
use crate::chunk::Chunk;
use crate::ebml::ids;
use crate::webm::cluster::{Block, Cluster};
use crate::webm::track::{AudioTrackConfig, MuxerConfig, TrackConfig};
use crate::{Error, Result};

/// Timecode scale in nanoseconds (1 ms ticks).
pub const TIMECODE_SCALE_NS: u64 = 1_000_000;

/// Default maximum span of one cluster.
pub const DEFAULT_CLUSTER_DURATION_MS: u64 = 5_000;

// Registry names used for backpatching.
const EBML_HEADER: &str = "EBML";
const SEGMENT: &str = "Segment";
const INFO: &str = "Info";
const DURATION: &str = "Duration";
const TRACKS: &str = "Tracks";
const TRACK_ENTRY: &str = "TrackEntry";
const VIDEO: &str = "Video";
const AUDIO: &str = "Audio";

// Widest Segment size that can still be backpatched (7-byte VINT).
const SEGMENT_SIZE_WIDTH: usize = 7;

/// How the Segment size field is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serialize",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum SegmentSize {
    /// The 8-byte unknown-size sentinel, as live streams do.
    Unknown,
    /// A reserved field rewritten with the real size on finalize.
    #[default]
    Backpatched,
}

/// Knobs that do not affect track layout.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MuxerOptions {
    pub cluster_duration_ms: u64,
    pub segment_size: SegmentSize,
    /// Written as both MuxingApp and WritingApp. ASCII only.
    pub app_name: String,
    pub initial_capacity: usize,
}

impl Default for MuxerOptions {
    fn default() -> Self {
        Self {
            cluster_duration_ms: DEFAULT_CLUSTER_DURATION_MS,
            segment_size: SegmentSize::default(),
            app_name: concat!("webmux-", env!("CARGO_PKG_VERSION")).to_string(),
            initial_capacity: crate::buffer::DEFAULT_CAPACITY,
        }
    }
}

/// Which track a chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

/// Single-owner WebM writer.
#[derive(Debug)]
pub struct WebmMuxer {
    buffer: GrowableByteBuffer,
    config: MuxerConfig,
    options: MuxerOptions,
    segment_data_start: usize,
    current: Option<Cluster>,
    duration_micros: u64,
    clusters_written: usize,
    blocks_written: u64,
    finalized: bool,
}

impl WebmMuxer {
    /// Validate the tracks and write everything that precedes the first
    /// cluster.
    pub fn new(config: MuxerConfig, options: MuxerOptions) -> Result<Self> {
        config.validate()?;
        if options.cluster_duration_ms == 0 {
            return Err(Error::invalid_value("cluster duration must be non-zero"));
        }
        if !options.app_name.is_ascii() {
            return Err(Error::invalid_value(format!(
                "app name must be ASCII: {:?}",
                options.app_name
            )));
        }

        let mut muxer = Self {
            buffer: GrowableByteBuffer::with_capacity(options.initial_capacity),
            config,
            options,
            segment_data_start: 0,
            current: None,
            duration_micros: 0,
            clusters_written: 0,
            blocks_written: 0,
            finalized: false,
        };

        muxer.write_ebml_header()?;
        muxer.write_segment_start()?;
        muxer.write_info()?;
        muxer.write_tracks()?;

        tracing::debug!(
            header_bytes = muxer.buffer.size(),
            codec = %muxer.config.video.codec,
            audio = muxer.config.audio.is_some(),
            "initialized webm muxer"
        );
        Ok(muxer)
    }

    fn write_ebml_header(&mut self) -> Result<()> {
        let buf = &mut self.buffer;
        buf.start_element(EBML_HEADER, ids::EBML, 1)?;
        buf.write_uint_element(ids::EBML_VERSION, 1)?;
        buf.write_uint_element(ids::EBML_READ_VERSION, 1)?;
        buf.write_uint_element(ids::EBML_MAX_ID_LENGTH, 4)?;
        buf.write_uint_element(ids::EBML_MAX_SIZE_LENGTH, 8)?;
        buf.write_string_element(ids::DOC_TYPE, "webm")?;
        buf.write_uint_element(ids::DOC_TYPE_VERSION, 2)?;
        buf.write_uint_element(ids::DOC_TYPE_READ_VERSION, 2)?;
        buf.finish_element(EBML_HEADER)?;
        Ok(())
    }

    fn write_segment_start(&mut self) -> Result<()> {
        match self.options.segment_size {
            SegmentSize::Backpatched => {
                self.buffer
                    .start_element(SEGMENT, ids::SEGMENT, SEGMENT_SIZE_WIDTH)?;
            }
            SegmentSize::Unknown => {
                self.buffer.record_element_start(SEGMENT);
                self.buffer.write_ebml_id(ids::SEGMENT)?;
                self.buffer.write_unknown_size()?;
            }
        }
        self.segment_data_start = self.buffer.size();
        Ok(())
    }

    fn write_info(&mut self) -> Result<()> {
        let buf = &mut self.buffer;
        buf.start_element(INFO, ids::INFO, 4)?;
        buf.write_uint_element_width(ids::TIMECODE_SCALE, TIMECODE_SCALE_NS, 8)?;
        buf.record_element_start(DURATION);
        buf.write_float_element(ids::DURATION, 0.0)?;
        buf.write_string_element(ids::MUXING_APP, &self.options.app_name)?;
        buf.write_string_element(ids::WRITING_APP, &self.options.app_name)?;
        buf.finish_element(INFO)?;
        Ok(())
    }

    fn write_tracks(&mut self) -> Result<()> {
        self.buffer.start_element(TRACKS, ids::TRACKS, 4)?;
        write_video_entry(&mut self.buffer, &self.config.video)?;
        if let Some(audio) = &self.config.audio {
            write_audio_entry(&mut self.buffer, audio)?;
        }
        self.buffer.finish_element(TRACKS)?;
        Ok(())
    }

    pub fn add_video_chunk(&mut self, chunk: &Chunk) -> Result<()> {
        self.add_chunk(chunk, TrackKind::Video)
    }

    pub fn add_audio_chunk(&mut self, chunk: &Chunk) -> Result<()> {
        self.add_chunk(chunk, TrackKind::Audio)
    }

    /// Append a chunk to the open cluster, first closing it when it has run
    /// past the cluster duration or cannot address the chunk's timestamp.
    ///
    /// Chunks of one track must arrive in timestamp order; nothing is
    /// re-sorted here.
    pub fn add_chunk(&mut self, chunk: &Chunk, kind: TrackKind) -> Result<()> {
        if self.finalized {
            return Err(Error::AlreadyFinalized);
        }
        let track_number = self.track_number(kind)?;
        let timestamp = chunk.timestamp_micros;

        let limit_micros = self.options.cluster_duration_ms.saturating_mul(1000);
        let needs_cluster = match &self.current {
            None => true,
            Some(cluster) => {
                self.duration_micros.saturating_sub(cluster.start_micros()) > limit_micros
                    || cluster.relative_timecode(timestamp).is_none()
            }
        };
        if needs_cluster {
            self.write_current_cluster()?;
        }

        let duration = self.duration_micros;
        let cluster = self
            .current
            .get_or_insert_with(|| Cluster::opening_for(duration, timestamp));
        let relative = cluster.relative_timecode(timestamp).ok_or_else(|| {
            Error::invalid_value(format!("timestamp {timestamp}us outside cluster range"))
        })?;
        cluster.push(Block::from_chunk(track_number, relative, chunk));

        self.duration_micros = self.duration_micros.max(chunk.end_micros());
        Ok(())
    }

    fn track_number(&self, kind: TrackKind) -> Result<u8> {
        match kind {
            TrackKind::Video => Ok(self.config.video.track_number),
            TrackKind::Audio => self
                .config
                .audio
                .as_ref()
                .map(|audio| audio.track_number)
                .ok_or_else(|| Error::invalid_value("no audio track configured")),
        }
    }

    /// Serialize the open cluster now.
    pub fn flush(&mut self) -> Result<()> {
        if self.finalized {
            return Err(Error::AlreadyFinalized);
        }
        self.write_current_cluster()
    }

    fn write_current_cluster(&mut self) -> Result<()> {
        let Some(cluster) = self.current.take() else {
            return Ok(());
        };
        if cluster.is_empty() {
            return Ok(());
        }

        cluster.write_to(&mut self.buffer)?;
        self.clusters_written += 1;
        self.blocks_written += cluster.len() as u64;
        tracing::debug!(
            timecode_ms = cluster.timecode_ms(),
            blocks = cluster.len(),
            bytes = cluster.payload_len(),
            "flushed cluster"
        );
        Ok(())
    }

    /// Write the last cluster, backpatch Duration and Segment size, and
    /// return the finished document. The muxer is unusable afterwards.
    pub fn finalize(&mut self) -> Result<Bytes> {
        if self.finalized {
            return Err(Error::AlreadyFinalized);
        }
        self.finalized = true;

        self.write_current_cluster()?;

        let duration_ms = self.duration_micros as f64 / 1000.0;
        self.buffer.rewrite_f64(DURATION, duration_ms)?;

        if self.options.segment_size == SegmentSize::Backpatched {
            let segment_len = (self.buffer.size() - self.segment_data_start) as u64;
            self.buffer.rewrite_ebml_size(SEGMENT, segment_len)?;
        }

        let buffer = std::mem::take(&mut self.buffer);
        tracing::info!(
            bytes = buffer.size(),
            clusters = self.clusters_written,
            blocks = self.blocks_written,
            duration_ms,
            "finalized webm document"
        );
        buffer.into_bytes()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Running duration: the latest chunk end seen so far.
    pub fn duration_micros(&self) -> u64 {
        self.duration_micros
    }

    /// Clusters serialized so far (the open one is not counted).
    pub fn cluster_count(&self) -> usize {
        self.clusters_written
    }

    /// Blocks added so far, including those in the open cluster.
    pub fn block_count(&self) -> u64 {
        self.blocks_written + self.current.as_ref().map_or(0, |c| c.len() as u64)
    }

    /// Bytes written to the buffer so far.
    pub fn bytes_written(&self) -> usize {
        self.buffer.size()
    }

    pub fn config(&self) -> &MuxerConfig {
        &self.config
    }
}

fn write_video_entry(buf: &mut GrowableByteBuffer, track: &TrackConfig) -> Result<()> {
    buf.start_element(TRACK_ENTRY, ids::TRACK_ENTRY, 2)?;
    write_track_common(buf, track.track_number, 1, track.codec.matroska_id())?;
    buf.write_uint_element(ids::DEFAULT_DURATION, track.default_duration_ns())?;

    buf.start_element(VIDEO, ids::VIDEO, 1)?;
    buf.write_uint_element(ids::PIXEL_WIDTH, track.width as u64)?;
    buf.write_uint_element(ids::PIXEL_HEIGHT, track.height as u64)?;
    buf.finish_element(VIDEO)?;

    buf.finish_element(TRACK_ENTRY)?;
    Ok(())
}

fn write_audio_entry(buf: &mut GrowableByteBuffer, track: &AudioTrackConfig) -> Result<()> {
    buf.start_element(TRACK_ENTRY, ids::TRACK_ENTRY, 2)?;
    write_track_common(buf, track.track_number, 2, track.codec.matroska_id())?;

    buf.start_element(AUDIO, ids::AUDIO, 1)?;
    buf.write_float_element(ids::SAMPLING_FREQUENCY, track.sample_rate)?;
    buf.write_uint_element(ids::CHANNELS, track.channels as u64)?;
    buf.finish_element(AUDIO)?;

    buf.finish_element(TRACK_ENTRY)?;
    Ok(())
}

fn write_track_common(
    buf: &mut GrowableByteBuffer,
    track_number: u8,
    track_type: u64,
    codec_id: &str,
) -> Result<()> {
    buf.write_uint_element(ids::TRACK_NUMBER, track_number as u64)?;
    buf.write_uint_element(ids::TRACK_UID, track_number as u64)?;
    buf.write_uint_element(ids::TRACK_TYPE, track_type)?;
    buf.write_uint_element(ids::FLAG_LACING, 0)?;
    buf.write_string_element(ids::CODEC_ID, codec_id)
}
