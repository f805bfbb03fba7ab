//! Three-point explicit diffusion update.
//!
//! `dst[i] = src[i] + alpha * (src[i-1] - 2*src[i] + src[i+1])`
//!
//! Stability requires `alpha < 0.5`; that is checked once by
//! [`DiffusionConfig::validate`](crate::config::DiffusionConfig::validate),
//! never inside the kernel.

use std::ops::RangeInclusive;

use crate::field::LocalField;
use crate::partition::Partition;

/// Update of one cell from its stencil.
#[inline(always)]
pub fn update(left: f64, center: f64, right: f64, alpha: f64) -> f64 {
    center + alpha * (left - 2.0 * center + right)
}

/// Apply the stencil to every `i` in `range`, writing only `dst[range]`.
///
/// `range` must lie within `1 ..= src.len() - 2`; an empty range is a no-op.
pub fn apply_range(src: &[f64], dst: &mut [f64], range: RangeInclusive<usize>, alpha: f64) {
    if range.is_empty() {
        return;
    }
    debug_assert!(*range.start() >= 1 && *range.end() + 1 < src.len());
    debug_assert_eq!(src.len(), dst.len());
    for i in range {
        dst[i] = update(src[i - 1], src[i], src[i + 1], alpha);
    }
}

/// Cells `2 ..= local_size - 3`: never reads a ghost.
pub fn apply_interior(part: &Partition, src: &LocalField, dst: &mut LocalField, alpha: f64) {
    apply_range(src.as_slice(), dst.as_mut_slice(), part.interior_range(), alpha);
}

/// Cells `1` and `local_size - 2` (one cell when they coincide): read ghosts
/// `0` and `local_size - 1`.
pub fn apply_boundary(part: &Partition, src: &LocalField, dst: &mut LocalField, alpha: f64) {
    for i in part.boundary_cells() {
        apply_range(src.as_slice(), dst.as_mut_slice(), i..=i, alpha);
    }
}

/// Whole owned range in one pass (blocking strategies).
pub fn apply_all(part: &Partition, src: &LocalField, dst: &mut LocalField, alpha: f64) {
    apply_range(src.as_slice(), dst.as_mut_slice(), part.owned_range(), alpha);
}
