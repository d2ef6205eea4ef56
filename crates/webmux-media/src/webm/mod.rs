//! WebM container writer.
//!
//! - `track` - codec and track descriptions
//! - `cluster` - in-memory clusters and SimpleBlocks
//! - `muxer` - the document builder

pub mod cluster;
pub mod muxer;
pub mod track;

pub use cluster::{Block, Cluster};
pub use muxer::{MuxerOptions, SegmentSize, TrackKind, WebmMuxer, DEFAULT_CLUSTER_DURATION_MS};
pub use track::{AudioTrackConfig, Codec, MuxerConfig, TrackConfig};
