//! Read-side EBML walker.
//!
//! Used to verify muxer output and to dump the element tree of a file. It
//! understands exactly the element set in [`ids`]; anything else is reported
//! as an opaque binary element.

use crate::ebml::{ids, vint};
use crate::{Error, Result};

/// Decode a size VINT at the start of `bytes`.
pub fn read_vint(bytes: &[u8]) -> Result<(Option<u64>, usize)> {
    vint::decode(bytes, 0)
}

/// Decode an element ID at the start of `bytes`.
pub fn read_element_id(bytes: &[u8]) -> Result<(u32, usize)> {
    vint::decode_id(bytes, 0)
}

/// ID and size of one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ElementHeader {
    pub id: u32,
    /// `None` for the unknown-size sentinel.
    pub size: Option<u64>,
    /// Offset of the first ID byte.
    pub offset: usize,
    /// ID plus size field length.
    pub header_len: usize,
}

impl ElementHeader {
    pub fn name(&self) -> &'static str {
        ids::name(self.id)
    }

    pub fn data_offset(&self) -> usize {
        self.offset + self.header_len
    }

    /// End of the payload; unknown-size elements run to `parent_end`.
    pub fn end(&self, parent_end: usize) -> usize {
        match self.size {
            Some(size) => self.data_offset().saturating_add(size as usize),
            None => parent_end,
        }
    }
}

/// Sequential reader over the elements of one level.
#[derive(Debug, Clone)]
pub struct EbmlReader<'a> {
    data: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> EbmlReader<'a> {
    /// Reader over the top level of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            end: data.len(),
        }
    }

    /// Read the next header and skip its payload. `Ok(None)` at end of level.
    pub fn next_element(&mut self) -> Result<Option<ElementHeader>> {
        if self.pos >= self.end {
            return Ok(None);
        }

        let level = &self.data[..self.end];
        let (id, id_len) = vint::decode_id(level, self.pos)?;
        let (size, size_len) = vint::decode(level, self.pos + id_len)?;
        let header = ElementHeader {
            id,
            size,
            offset: self.pos,
            header_len: id_len + size_len,
        };

        let end = header.end(self.end);
        if end > self.end {
            return Err(Error::Truncated {
                offset: header.data_offset(),
                need: end - header.data_offset(),
                have: self.end - header.data_offset(),
            });
        }
        self.pos = end;
        Ok(Some(header))
    }

    /// Reader over the payload of a master element returned by this reader.
    pub fn children(&self, header: &ElementHeader) -> EbmlReader<'a> {
        EbmlReader {
            data: self.data,
            pos: header.data_offset(),
            end: header.end(self.end),
        }
    }

    /// Raw payload of an element returned by this reader.
    pub fn payload(&self, header: &ElementHeader) -> &'a [u8] {
        &self.data[header.data_offset()..header.end(self.end)]
    }
}

impl<'a> Iterator for EbmlReader<'a> {
    type Item = Result<ElementHeader>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_element() {
            Ok(header) => header.map(Ok),
            Err(e) => {
                self.pos = self.end;
                Some(Err(e))
            }
        }
    }
}

/// Big-endian unsigned integer payload (0..=8 bytes).
pub fn read_uint(payload: &[u8]) -> Result<u64> {
    if payload.len() > 8 {
        return Err(Error::invalid_value(format!(
            "{}-byte unsigned integer",
            payload.len()
        )));
    }
    Ok(payload.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
}

/// Float payload (0, 4 or 8 bytes).
pub fn read_float(payload: &[u8]) -> Result<f64> {
    match payload.len() {
        0 => Ok(0.0),
        4 => {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(payload);
            Ok(f32::from_be_bytes(raw) as f64)
        }
        8 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(payload);
            Ok(f64::from_be_bytes(raw))
        }
        n => Err(Error::invalid_value(format!("{n}-byte float"))),
    }
}

/// String payload, trailing NULs stripped.
pub fn read_string(payload: &[u8]) -> String {
    let trimmed = payload
        .iter()
        .rposition(|&b| b != 0)
        .map_or(&payload[..0], |last| &payload[..=last]);
    String::from_utf8_lossy(trimmed).into_owned()
}

/// Decoded value of a leaf element.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialize",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "type", content = "value", rename_all = "snake_case")
)]
pub enum ElementValue {
    Master,
    Uint(u64),
    Float(f64),
    String(String),
    Block {
        track: u64,
        relative_timecode: i16,
        keyframe: bool,
        len: usize,
    },
    Binary(usize),
}

/// One entry in the flattened element tree.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ElementNode {
    pub depth: usize,
    pub name: String,
    pub header: ElementHeader,
    pub value: ElementValue,
}

/// Deepest master nesting [`inspect`] descends into. Documents written by
/// this crate go four levels deep (Segment, Tracks, TrackEntry, Video).
pub const MAX_DEPTH: usize = 16;

/// Walk `data` depth-first and return every element, parents before
/// children.
///
/// Masters nested past [`MAX_DEPTH`] fail with [`Error::TooDeep`].
pub fn inspect(data: &[u8]) -> Result<Vec<ElementNode>> {
    let mut nodes = Vec::new();
    walk(EbmlReader::new(data), 0, &mut nodes)?;
    Ok(nodes)
}

fn walk(mut reader: EbmlReader<'_>, depth: usize, nodes: &mut Vec<ElementNode>) -> Result<()> {
    while let Some(header) = reader.next_element()? {
        let master = ids::is_master(header.id);
        let value = if master {
            ElementValue::Master
        } else {
            decode_value(header.id, reader.payload(&header))?
        };

        nodes.push(ElementNode {
            depth,
            name: header.name().to_string(),
            header,
            value,
        });

        if master {
            if depth + 1 > MAX_DEPTH {
                return Err(Error::TooDeep {
                    offset: header.offset,
                    max: MAX_DEPTH,
                });
            }
            walk(reader.children(&header), depth + 1, nodes)?;
        }
    }
    Ok(())
}

fn decode_value(id: u32, payload: &[u8]) -> Result<ElementValue> {
    let value = match id {
        ids::DOC_TYPE | ids::CODEC_ID | ids::MUXING_APP | ids::WRITING_APP => {
            ElementValue::String(read_string(payload))
        }
        ids::DURATION | ids::SAMPLING_FREQUENCY => ElementValue::Float(read_float(payload)?),
        ids::SIMPLE_BLOCK => {
            let block = SimpleBlockView::parse(payload)?;
            ElementValue::Block {
                track: block.track_number,
                relative_timecode: block.relative_timecode,
                keyframe: block.is_keyframe(),
                len: block.payload.len(),
            }
        }
        ids::EBML_VERSION
        | ids::EBML_READ_VERSION
        | ids::EBML_MAX_ID_LENGTH
        | ids::EBML_MAX_SIZE_LENGTH
        | ids::DOC_TYPE_VERSION
        | ids::DOC_TYPE_READ_VERSION
        | ids::TIMECODE_SCALE
        | ids::TRACK_NUMBER
        | ids::TRACK_UID
        | ids::TRACK_TYPE
        | ids::FLAG_LACING
        | ids::DEFAULT_DURATION
        | ids::PIXEL_WIDTH
        | ids::PIXEL_HEIGHT
        | ids::CHANNELS
        | ids::TIMECODE => ElementValue::Uint(read_uint(payload)?),
        _ => ElementValue::Binary(payload.len()),
    };
    Ok(value)
}

/// Every element with `id`, in document order.
pub fn find_all(data: &[u8], id: u32) -> Result<Vec<ElementNode>> {
    Ok(inspect(data)?.into_iter().filter(|n| n.header.id == id).collect())
}

/// Borrowed view of a SimpleBlock payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimpleBlockView<'a> {
    pub track_number: u64,
    pub relative_timecode: i16,
    pub flags: u8,
    pub payload: &'a [u8],
}

impl<'a> SimpleBlockView<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let (track, width) = vint::decode(data, 0)?;
        let track_number = track.ok_or(Error::InvalidVint { offset: 0 })?;
        if data.len() < width + 3 {
            return Err(Error::Truncated {
                offset: width,
                need: 3,
                have: data.len() - width,
            });
        }

        Ok(Self {
            track_number,
            relative_timecode: i16::from_be_bytes([data[width], data[width + 1]]),
            flags: data[width + 2],
            payload: &data[width + 3..],
        })
    }

    pub fn is_keyframe(&self) -> bool {
        self.flags & 0x80 != 0
    }
}
