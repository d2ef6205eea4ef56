//! In-memory clusters and SimpleBlocks awaiting serialization.

use bytes::Bytes;

use crate::buffer::GrowableByteBuffer;
use crate::chunk::Chunk;
use crate::ebml::{ids, vint};
use crate::Result;

/// One SimpleBlock: a chunk re-framed for a specific track and cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub track_number: u8,
    /// Block time minus cluster time, in milliseconds.
    pub relative_timecode: i16,
    pub flags: u8,
    pub payload: Bytes,
}

impl Block {
    /// Flag bit marking a keyframe.
    pub const KEYFRAME: u8 = 0x80;

    pub fn from_chunk(track_number: u8, relative_timecode: i16, chunk: &Chunk) -> Self {
        Self {
            track_number,
            relative_timecode,
            flags: if chunk.is_keyframe { Self::KEYFRAME } else { 0 },
            payload: chunk.payload.clone(),
        }
    }

    pub fn is_keyframe(&self) -> bool {
        self.flags & Self::KEYFRAME != 0
    }

    /// SimpleBlock payload length: track VINT, timecode, flags, then data.
    pub fn body_len(&self) -> u64 {
        self.payload.len() as u64 + 4
    }

    /// Full element length including ID and size field.
    pub fn encoded_len(&self) -> u64 {
        let body = self.body_len();
        ids::id_width(ids::SIMPLE_BLOCK) as u64 + vint::measure(body) as u64 + body
    }

    pub fn write_to(&self, buf: &mut GrowableByteBuffer) -> Result<()> {
        buf.write_ebml_id(ids::SIMPLE_BLOCK)?;
        buf.write_vint(self.body_len())?;
        buf.write_byte(0x80 | self.track_number)?;
        buf.write_bytes(&self.relative_timecode.to_be_bytes())?;
        buf.write_byte(self.flags)?;
        buf.write_bytes(&self.payload)
    }
}

/// An open cluster. Blocks are kept in insertion order until the cluster is
/// written, after which it is dropped.
#[derive(Debug, Clone, Default)]
pub struct Cluster {
    start_micros: u64,
    blocks: Vec<Block>,
}

impl Cluster {
    pub fn new(start_micros: u64) -> Self {
        Self {
            start_micros,
            blocks: Vec::new(),
        }
    }

    /// Open a cluster at the running duration, or at `timestamp_micros` when
    /// that chunk would be too far away for a 16-bit relative timecode.
    pub fn opening_for(running_duration_micros: u64, timestamp_micros: u64) -> Self {
        let cluster = Self::new(running_duration_micros);
        if cluster.relative_timecode(timestamp_micros).is_some() {
            cluster
        } else {
            Self::new(timestamp_micros)
        }
    }

    pub fn start_micros(&self) -> u64 {
        self.start_micros
    }

    /// Cluster Timecode value in milliseconds.
    pub fn timecode_ms(&self) -> u64 {
        self.start_micros / 1000
    }

    /// Relative timecode of a block at `timestamp_micros`, if it fits.
    pub fn relative_timecode(&self, timestamp_micros: u64) -> Option<i16> {
        let delta = (timestamp_micros / 1000) as i128 - self.timecode_ms() as i128;
        i16::try_from(delta).ok()
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    // Never narrower than 2 bytes; grows past 65s.
    fn timecode_width(&self) -> usize {
        GrowableByteBuffer::measure_uint(self.timecode_ms()).max(2)
    }

    /// Cluster payload length: the Timecode element plus every block.
    pub fn payload_len(&self) -> u64 {
        let width = self.timecode_width() as u64;
        let timecode = ids::id_width(ids::TIMECODE) as u64 + vint::measure(width) as u64 + width;
        timecode + self.blocks.iter().map(Block::encoded_len).sum::<u64>()
    }

    /// Serialize the whole cluster at the buffer's cursor.
    pub fn write_to(&self, buf: &mut GrowableByteBuffer) -> Result<()> {
        buf.write_ebml_id(ids::CLUSTER)?;
        buf.write_vint(self.payload_len())?;
        buf.write_uint_element_width(ids::TIMECODE, self.timecode_ms(), self.timecode_width())?;
        for block in &self.blocks {
            block.write_to(buf)?;
        }
        Ok(())
    }
}
