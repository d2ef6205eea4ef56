//! Webmux-Media: EBML encoding and WebM container assembly
//!
//! This crate turns already-encoded media chunks into a WebM byte stream.
//! It never touches payload bytes beyond copying them into SimpleBlocks.
//!
//! # Modules
//!
//! - `buffer` - Growable byte buffer with VINT writers and size backpatching
//! - `ebml` - Element IDs, VINT encoding and a read-side walker
//! - `webm` - Track descriptions, clusters and the document builder
//! - `chunk` - Encoded chunks as handed over by an encoder
//!
//! # Architecture
//!
//! A document is written into a single [`GrowableByteBuffer`] owned by one
//! [`WebmMuxer`]:
//!
//! 1. EBML header, Segment, Info and Tracks are written on construction,
//!    with placeholder sizes where the final length is not yet known
//! 2. Chunks accumulate in an in-memory cluster; when the cluster has run
//!    past its duration it is serialized in one pass with exact sizes
//! 3. On finalize the last cluster is written and Duration and the Segment
//!    size are backpatched through the buffer's offset registry

pub mod buffer;
pub mod chunk;
pub mod ebml;
pub mod error;
pub mod webm;

pub use buffer::GrowableByteBuffer;
pub use chunk::Chunk;
pub use error::{Error, Result};
pub use webm::{
    AudioTrackConfig, Codec, MuxerConfig, MuxerOptions, SegmentSize, TrackConfig, TrackKind,
    WebmMuxer,
};
