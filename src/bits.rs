//! Sub-word and byte-string primitives: nibble pairs, 24-bit integers, boolean bytes,
//! and hex address strings stored least-significant byte first.

use crate::codec::CodecError;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor};

pub const UINT24_MAX: u64 = 0xFF_FFFF;
pub const INT24_MIN: i64 = -0x80_0000;
pub const INT24_MAX: i64 = 0x7F_FFFF;

/// Two 4-bit values in one byte: `low | high << 4`.
pub fn pack_nibbles(low: u8, high: u8) -> u8 {
    (low & 0x0F) | (high << 4)
}

pub fn unpack_nibbles(byte: u8) -> (u8, u8) {
    (byte & 0x0F, byte >> 4)
}

/// Caller guarantees `v <= UINT24_MAX`.
pub fn write_u24(w: &mut Vec<u8>, v: u32) -> io::Result<()> {
    w.write_u24::<LittleEndian>(v)
}

pub fn read_u24(r: &mut Cursor<&[u8]>) -> io::Result<u32> {
    r.read_u24::<LittleEndian>()
}

/// Caller guarantees `INT24_MIN <= v <= INT24_MAX`.
pub fn write_i24(w: &mut Vec<u8>, v: i32) -> io::Result<()> {
    w.write_i24::<LittleEndian>(v)
}

pub fn read_i24(r: &mut Cursor<&[u8]>) -> io::Result<i32> {
    r.read_i24::<LittleEndian>()
}

pub fn write_bool(w: &mut Vec<u8>, v: bool) -> io::Result<()> {
    w.write_u8(v as u8)
}

pub fn read_bool(r: &mut Cursor<&[u8]>) -> io::Result<bool> {
    Ok(r.read_u8()? != 0)
}

/// `"0x2a00"` -> `[0x00, 0x2a]`. With `len`, the result is zero-padded or truncated
/// (dropping the most significant bytes) to exactly `len` bytes.
pub fn hex_to_le_bytes(s: &str, len: Option<usize>) -> Result<Vec<u8>, String> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("not a hex string: {:?}", s));
    }
    let padded = if digits.len() % 2 == 1 {
        format!("0{}", digits)
    } else {
        digits.to_string()
    };
    let mut bytes = (0..padded.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&padded[i..i + 2], 16))
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|e| e.to_string())?;
    bytes.reverse();
    if let Some(n) = len {
        bytes.resize(n, 0);
    }
    Ok(bytes)
}

/// `[0x00, 0x2a]` -> `"0x2a00"`.
pub fn le_bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(2 + bytes.len() * 2);
    s.push_str("0x");
    for b in bytes.iter().rev() {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

/// Pairs consecutive nibble fields. Lives for one compile pass only.
#[derive(Debug, Default)]
pub(crate) struct NibblePairs<'s> {
    pending: Option<&'s str>,
}

impl<'s> NibblePairs<'s> {
    /// Returns the `(low, high)` names once the second nibble of a pair arrives.
    pub(crate) fn push(&mut self, name: &'s str) -> Option<(&'s str, &'s str)> {
        match self.pending.take() {
            Some(low) => Some((low, name)),
            None => {
                self.pending = Some(name);
                None
            }
        }
    }

    /// Fails if a nibble is still waiting for its partner.
    pub(crate) fn ensure_idle(&self) -> Result<(), CodecError> {
        match self.pending {
            Some(name) => Err(CodecError::UnpairedNibble(name.to_string())),
            None => Ok(()),
        }
    }
}
