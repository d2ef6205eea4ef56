//! EBML variable-length integers.
//!
//! A VINT of width `w` starts with `w - 1` zero bits followed by a marker
//! bit; the remaining `7w` bits hold the big-endian value:
//!
//! - 1 byte:  `1xxx xxxx`
//! - 2 bytes: `01xx xxxx xxxx xxxx`
//! - 3 bytes: `001x xxxx ...`
//!
//! The all-ones value of each width is reserved. Width 8 is only ever written
//! as the "unknown size" sentinel `01 FF FF FF FF FF FF FF`.

use crate::{Error, Result};

/// Widest VINT this crate reads or writes.
pub const MAX_WIDTH: usize = 8;

/// The 8-byte "unknown size" marker.
pub const UNKNOWN_SIZE: [u8; 8] = [0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

/// Largest value a VINT of `width` bytes (1..=7) can carry.
pub const fn max_value(width: usize) -> u64 {
    (1u64 << (7 * width)) - 2
}

/// Smallest width able to carry `value`. Values past the 7-byte range
/// measure as 8, which encodes as the unknown-size sentinel.
pub fn measure(value: u64) -> usize {
    (1..MAX_WIDTH)
        .find(|&width| value <= max_value(width))
        .unwrap_or(MAX_WIDTH)
}

/// [`measure`] for values arriving as floating point (durations, sizes
/// computed by callers). Rejects negative, non-finite and fractional input.
pub fn measure_f64(value: f64) -> Result<usize> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(Error::invalid_value(format!(
            "VINT value must be a non-negative finite integer, got {value}"
        )));
    }
    if value >= u64::MAX as f64 {
        return Ok(MAX_WIDTH);
    }
    Ok(measure(value as u64))
}

/// Encode `value` using exactly `width` bytes (1..=7).
///
/// Returns the scratch array and the number of bytes used. Width 8 is
/// reserved for [`UNKNOWN_SIZE`] and never carries a concrete value.
pub fn encode(value: u64, width: usize) -> Result<([u8; MAX_WIDTH], usize)> {
    if width == 0 || width >= MAX_WIDTH {
        return Err(Error::invalid_value(format!(
            "cannot encode {value} as a {width}-byte VINT"
        )));
    }
    if value > max_value(width) {
        return Err(Error::invalid_value(format!(
            "{value} does not fit a {width}-byte VINT"
        )));
    }

    let mut out = [0u8; MAX_WIDTH];
    for (i, byte) in out.iter_mut().take(width).enumerate() {
        *byte = (value >> (8 * (width - 1 - i))) as u8;
    }
    out[0] |= 0x80 >> (width - 1);
    Ok((out, width))
}

/// Width of a VINT given its first byte, or `None` for `0x00`.
pub fn width_of(first: u8) -> Option<usize> {
    if first == 0 {
        None
    } else {
        Some(first.leading_zeros() as usize + 1)
    }
}

/// Decode a size VINT at `offset`.
///
/// Returns `(None, width)` for the all-ones "unknown" value.
pub fn decode(bytes: &[u8], offset: usize) -> Result<(Option<u64>, usize)> {
    let first = *bytes.get(offset).ok_or(Error::Truncated {
        offset,
        need: 1,
        have: 0,
    })?;
    let width = width_of(first).ok_or(Error::InvalidVint { offset })?;
    let have = bytes.len() - offset;
    if have < width {
        return Err(Error::Truncated {
            offset,
            need: width,
            have,
        });
    }

    let mut value = first as u64 & (0xFF_u64 >> width);
    for &b in &bytes[offset + 1..offset + width] {
        value = (value << 8) | b as u64;
    }

    let all_ones = (1u64 << (7 * width)) - 1;
    if value == all_ones {
        return Ok((None, width));
    }
    Ok((Some(value), width))
}

/// Decode an element ID at `offset`. Unlike sizes, IDs keep the marker bit.
pub fn decode_id(bytes: &[u8], offset: usize) -> Result<(u32, usize)> {
    let first = *bytes.get(offset).ok_or(Error::Truncated {
        offset,
        need: 1,
        have: 0,
    })?;
    let width = match width_of(first) {
        Some(w) if w <= 4 => w,
        _ => return Err(Error::InvalidVint { offset }),
    };
    let have = bytes.len() - offset;
    if have < width {
        return Err(Error::Truncated {
            offset,
            need: width,
            have,
        });
    }

    let id = bytes[offset..offset + width]
        .iter()
        .fold(0u32, |acc, &b| (acc << 8) | b as u32);
    Ok((id, width))
}
