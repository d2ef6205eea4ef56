//! Growable byte buffer with a write cursor and EBML backpatching.
//!
//! [`GrowableByteBuffer`] is the arena every WebM document is written into.
//! Element "handles" are byte offsets recorded by name at write time; a size
//! field written as a placeholder can later be rewritten in place through a
//! scoped seek that always restores the cursor.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use bytes::Bytes;

use crate::ebml::{ids, vint};
use crate::{Error, Result};

/// Default initial allocation.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Self-expanding byte buffer with a cursor and a name → offset registry.
///
/// The valid data is always `[0, size())`. Capacity doubles on growth and
/// never shrinks.
#[derive(Debug)]
pub struct GrowableByteBuffer {
    data: Vec<u8>,
    pos: usize,
    marks: HashMap<&'static str, usize>,
}

impl GrowableByteBuffer {
    /// Create a buffer with [`DEFAULT_CAPACITY`] bytes allocated.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a buffer with `capacity` bytes allocated up front.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            pos: 0,
            marks: HashMap::new(),
        }
    }

    /// Current valid length (the cursor position).
    pub fn size(&self) -> usize {
        self.pos
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    /// Allocated bytes, independent of [`size`](Self::size).
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Guarantee that at least `required` bytes are allocated.
    ///
    /// Grows to `max(required, capacity * 2)`.
    pub fn ensure_capacity(&mut self, required: usize) -> Result<()> {
        if self.data.len() >= required {
            return Ok(());
        }

        let doubled = self.data.len().checked_mul(2).unwrap_or(usize::MAX);
        let new_capacity = required.max(doubled);
        self.data
            .try_reserve_exact(new_capacity - self.data.len())
            .map_err(|_| Error::CapacityOverflow {
                requested: new_capacity,
            })?;
        self.data.resize(new_capacity, 0);
        tracing::trace!(capacity = new_capacity, "grew buffer");
        Ok(())
    }

    fn reserve_for(&mut self, additional: usize) -> Result<()> {
        let required = self
            .pos
            .checked_add(additional)
            .ok_or(Error::CapacityOverflow {
                requested: usize::MAX,
            })?;
        self.ensure_capacity(required)
    }

    pub fn write_byte(&mut self, b: u8) -> Result<()> {
        self.reserve_for(1)?;
        self.data[self.pos] = b;
        self.pos += 1;
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve_for(bytes.len())?;
        self.data[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }

    pub fn write_u16_be(&mut self, value: u16) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_u32_be(&mut self, value: u32) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_u64_be(&mut self, value: u64) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_f32_be(&mut self, value: f32) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_f64_be(&mut self, value: f64) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Write an ASCII string without terminator.
    pub fn write_string(&mut self, s: &str) -> Result<()> {
        if !s.is_ascii() {
            return Err(Error::invalid_value(format!("not an ASCII string: {s:?}")));
        }
        self.write_bytes(s.as_bytes())
    }

    /// Minimal number of bytes holding the non-zero bits of `value` (1..=8).
    pub fn measure_uint(value: u64) -> usize {
        let bits = 64 - value.leading_zeros() as usize;
        bits.div_ceil(8).max(1)
    }

    /// Write `value` big-endian in exactly `width` bytes (1..=8).
    pub fn write_uint_be(&mut self, value: u64, width: usize) -> Result<()> {
        if width == 0 || width > 8 {
            return Err(Error::invalid_value(format!("bad uint width {width}")));
        }
        if width < 8 && value >> (8 * width) != 0 {
            return Err(Error::invalid_value(format!(
                "{value} does not fit in {width} byte(s)"
            )));
        }
        self.write_bytes(&value.to_be_bytes()[8 - width..])
    }

    /// Smallest VINT width for `value`; see [`vint::measure`].
    pub fn measure_vint(value: u64) -> usize {
        vint::measure(value)
    }

    /// Smallest VINT width for a floating-point `value`, rejecting negative,
    /// non-finite and fractional input with [`Error::InvalidValue`].
    pub fn measure_vint_f64(value: f64) -> Result<usize> {
        vint::measure_f64(value)
    }

    /// Write `value` as a VINT of exactly `width` bytes.
    pub fn write_vint_width(&mut self, value: u64, width: usize) -> Result<()> {
        let (bytes, n) = vint::encode(value, width)?;
        self.write_bytes(&bytes[..n])
    }

    /// Write `value` as a VINT of minimal width.
    pub fn write_vint(&mut self, value: u64) -> Result<()> {
        self.write_vint_width(value, vint::measure(value))
    }

    /// Write the 8-byte unknown-size sentinel.
    pub fn write_unknown_size(&mut self) -> Result<()> {
        self.write_bytes(&vint::UNKNOWN_SIZE)
    }

    /// Write an element ID (marker bits included).
    pub fn write_ebml_id(&mut self, id: u32) -> Result<()> {
        let width = ids::id_width(id);
        self.write_bytes(&id.to_be_bytes()[4 - width..])
    }

    /// Move the cursor to `offset`, which must not exceed [`size`](Self::size).
    ///
    /// Data past the new cursor is no longer part of the valid prefix.
    pub fn seek(&mut self, offset: usize) -> Result<()> {
        if offset > self.pos {
            return Err(Error::OutOfRange {
                offset,
                len: self.pos,
            });
        }
        self.pos = offset;
        Ok(())
    }

    /// Seek to `offset` for the lifetime of the returned guard; the cursor is
    /// restored when the guard drops, whether or not the writes succeeded.
    pub fn seek_scoped(&mut self, offset: usize) -> Result<SeekGuard<'_>> {
        if offset > self.pos {
            return Err(Error::OutOfRange {
                offset,
                len: self.pos,
            });
        }
        let restore = self.pos;
        self.pos = offset;
        Ok(SeekGuard {
            buffer: self,
            restore,
        })
    }

    /// The valid prefix `[0, size())`.
    pub fn as_slice(&self) -> Result<&[u8]> {
        self.data.get(..self.pos).ok_or(Error::OutOfRange {
            offset: self.pos,
            len: self.data.len(),
        })
    }

    /// Consume the buffer, returning the valid prefix.
    pub fn into_bytes(mut self) -> Result<Bytes> {
        if self.pos > self.data.len() {
            return Err(Error::OutOfRange {
                offset: self.pos,
                len: self.data.len(),
            });
        }
        self.data.truncate(self.pos);
        Ok(Bytes::from(self.data))
    }

    // --- Offset registry -------------------------------------------------

    /// Remember the current cursor as the start of element `name`.
    pub fn record_element_start(&mut self, name: &'static str) {
        self.marks.insert(name, self.pos);
    }

    /// Offset recorded for `name`, if any.
    pub fn element_offset(&self, name: &str) -> Option<usize> {
        self.marks.get(name).copied()
    }

    /// Record `name`, then write `id` and a zero size placeholder of
    /// `reserved_width` bytes for a later [`rewrite_ebml_size`](Self::rewrite_ebml_size).
    ///
    /// A width of 8 writes the unknown-size sentinel, which cannot be
    /// rewritten with a concrete size afterwards.
    pub fn start_element(&mut self, name: &'static str, id: u32, reserved_width: usize) -> Result<()> {
        self.record_element_start(name);
        self.write_ebml_id(id)?;
        if reserved_width == vint::MAX_WIDTH {
            return self.write_unknown_size();
        }
        self.write_vint_width(0, reserved_width)
    }

    /// Locate the size field of a recorded element: `(offset, reserved width)`.
    fn size_field(&self, name: &str) -> Result<(usize, usize)> {
        let start = self
            .element_offset(name)
            .ok_or_else(|| Error::UnknownElement(name.to_string()))?;
        let data = self.as_slice()?;

        let (_, id_width) = vint::decode_id(data, start)?;
        let size_pos = start + id_width;
        let first = *data.get(size_pos).ok_or(Error::OutOfRange {
            offset: size_pos,
            len: data.len(),
        })?;
        let reserved = vint::width_of(first).ok_or(Error::InvalidVint { offset: size_pos })?;
        Ok((size_pos, reserved))
    }

    /// Rewrite the size field of element `name` in place, keeping the width
    /// reserved when the element was written.
    ///
    /// Fails with [`Error::SizeMismatch`] when `new_size` needs more bytes
    /// than were reserved, or when the placeholder is the 8-byte unknown-size
    /// sentinel.
    pub fn rewrite_ebml_size(&mut self, name: &str, new_size: u64) -> Result<()> {
        let (size_pos, reserved) = self.size_field(name)?;
        let required = vint::measure(new_size);
        if required > reserved || reserved == vint::MAX_WIDTH {
            return Err(Error::SizeMismatch {
                element: name.to_string(),
                required,
                reserved,
            });
        }

        let mut guard = self.seek_scoped(size_pos)?;
        guard.write_vint_width(new_size, reserved)
    }

    /// Backpatch element `name` with the number of bytes written after its
    /// size field, returning that payload length.
    pub fn finish_element(&mut self, name: &str) -> Result<u64> {
        let (size_pos, reserved) = self.size_field(name)?;
        let payload = (self.pos - (size_pos + reserved)) as u64;
        self.rewrite_ebml_size(name, payload)?;
        Ok(payload)
    }

    /// Overwrite the 8-byte float payload of recorded element `name`.
    pub fn rewrite_f64(&mut self, name: &str, value: f64) -> Result<()> {
        let (size_pos, width) = self.size_field(name)?;
        let (size, _) = vint::decode(self.as_slice()?, size_pos)?;
        if size != Some(8) {
            return Err(Error::SizeMismatch {
                element: name.to_string(),
                required: 8,
                reserved: size.unwrap_or(0) as usize,
            });
        }

        let mut guard = self.seek_scoped(size_pos + width)?;
        guard.write_f64_be(value)
    }

    // --- Element helpers -------------------------------------------------

    /// Unsigned integer element in minimal width.
    pub fn write_uint_element(&mut self, id: u32, value: u64) -> Result<()> {
        self.write_uint_element_width(id, value, Self::measure_uint(value))
    }

    /// Unsigned integer element in a fixed width.
    pub fn write_uint_element_width(&mut self, id: u32, value: u64, width: usize) -> Result<()> {
        self.write_ebml_id(id)?;
        self.write_vint(width as u64)?;
        self.write_uint_be(value, width)
    }

    /// 8-byte float element.
    pub fn write_float_element(&mut self, id: u32, value: f64) -> Result<()> {
        self.write_ebml_id(id)?;
        self.write_vint(8)?;
        self.write_f64_be(value)
    }

    /// ASCII string element.
    pub fn write_string_element(&mut self, id: u32, value: &str) -> Result<()> {
        self.write_ebml_id(id)?;
        self.write_vint(value.len() as u64)?;
        self.write_string(value)
    }

    /// Binary element.
    pub fn write_binary_element(&mut self, id: u32, value: &[u8]) -> Result<()> {
        self.write_ebml_id(id)?;
        self.write_vint(value.len() as u64)?;
        self.write_bytes(value)
    }
}

impl Default for GrowableByteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Cursor guard returned by [`GrowableByteBuffer::seek_scoped`].
pub struct SeekGuard<'a> {
    buffer: &'a mut GrowableByteBuffer,
    restore: usize,
}

impl Deref for SeekGuard<'_> {
    type Target = GrowableByteBuffer;

    fn deref(&self) -> &Self::Target {
        self.buffer
    }
}

impl DerefMut for SeekGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.buffer
    }
}

impl Drop for SeekGuard<'_> {
    fn drop(&mut self) {
        self.buffer.pos = self.restore;
    }
}
