//! Fixed little-endian wire type for halo values.

use bytemuck::{Pod, Zeroable};
use static_assertions::assert_eq_size;
use std::mem::size_of;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// One `f64` carried on the wire; the bit pattern is stored pre-LE.
#[repr(transparent)]
#[derive(Copy, Clone, Pod, Zeroable, Debug, PartialEq)]
pub struct WireValue {
    bits_le: u64,
}

assert_eq_size!(WireValue, f64);

/// Byte length of one encoded halo value.
pub const WIRE_VALUE_LEN: usize = size_of::<WireValue>();

impl WireValue {
    pub fn new(v: f64) -> Self {
        Self {
            bits_le: v.to_bits().to_le(),
        }
    }

    pub fn get(self) -> f64 {
        f64::from_bits(u64::from_le(self.bits_le))
    }
}

/// Encode a single halo value.
pub fn encode_value(v: f64) -> [u8; WIRE_VALUE_LEN] {
    let mut out = [0u8; WIRE_VALUE_LEN];
    out.copy_from_slice(cast_slice(std::slice::from_ref(&WireValue::new(v))));
    out
}

/// Decode a single halo value, rejecting payloads of the wrong length.
pub fn decode_value(bytes: &[u8]) -> Result<f64, String> {
    expect_exact_len(bytes.len(), WIRE_VALUE_LEN)?;
    let mut w = WireValue::zeroed();
    cast_slice_mut(std::slice::from_mut(&mut w)).copy_from_slice(bytes);
    Ok(w.get())
}
