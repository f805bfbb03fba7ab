//! Contiguous 1-D domain decomposition with one ghost cell per side.
//!
//! Rank `r` of `P` owns `G / P` consecutive cells of the global domain,
//! stored at local indices `1 ..= local_size - 2`. Local index `0` mirrors
//! the left neighbour's last owned cell and `local_size - 1` mirrors the
//! right neighbour's first owned cell. Ranks at the ends of the domain have
//! [`Neighbor::None`] on their outer side; that ghost is never written by an
//! exchange and keeps its zero initialisation (a fixed zero boundary).

use std::ops::RangeInclusive;

use crate::config::{DiffusionConfig, RemainderPolicy};
use crate::diffusion_error::DiffusionError;

/// Minimum number of ranks: the scheme needs at least one neighbour edge.
pub const MIN_RANKS: usize = 2;

/// Identity of the rank across one side of the slice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Neighbor {
    Rank(usize),
    /// Global domain boundary; exchanges against it are no-ops.
    None,
}

impl Neighbor {
    pub fn rank(self) -> Option<usize> {
        match self {
            Neighbor::Rank(r) => Some(r),
            Neighbor::None => None,
        }
    }

    pub fn is_none(self) -> bool {
        matches!(self, Neighbor::None)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Left,
    Right,
}

/// Layout of one rank's slice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Partition {
    pub rank: usize,
    pub nranks: usize,
    pub global_size: usize,
    /// Owned cells per rank.
    pub local_data_size: usize,
    /// Owned cells plus two ghosts.
    pub local_size: usize,
    /// Global index of local index 1.
    pub global_offset: usize,
    /// Trailing global cells no rank owns (`global_size % nranks`).
    pub dropped: usize,
    pub left: Neighbor,
    pub right: Neighbor,
}

impl Partition {
    /// Lay out `rank`'s slice of a `global_size` domain over `nranks` ranks.
    ///
    /// # Errors
    /// `TooFewRanks` if `nranks < 2`, `RankOutOfRange` if `rank >= nranks`,
    /// `SliceTooSmall` if a rank would own no cell at all (`global_size < nranks`).
    pub fn new(global_size: usize, nranks: usize, rank: usize) -> Result<Self, DiffusionError> {
        if nranks < MIN_RANKS {
            return Err(DiffusionError::TooFewRanks { ranks: nranks });
        }
        if rank >= nranks {
            return Err(DiffusionError::RankOutOfRange { rank, nranks });
        }
        let local_data_size = global_size / nranks;
        if local_data_size == 0 {
            return Err(DiffusionError::SliceTooSmall {
                global_size,
                nranks,
                local: local_data_size,
            });
        }
        let left = if rank > 0 {
            Neighbor::Rank(rank - 1)
        } else {
            Neighbor::None
        };
        let right = if rank < nranks - 1 {
            Neighbor::Rank(rank + 1)
        } else {
            Neighbor::None
        };
        Ok(Self {
            rank,
            nranks,
            global_size,
            local_data_size,
            local_size: local_data_size + 2,
            global_offset: rank * local_data_size,
            dropped: global_size % nranks,
            left,
            right,
        })
    }

    /// Like [`Partition::new`] but applies the config's remainder policy.
    pub fn from_config(
        config: &DiffusionConfig,
        nranks: usize,
        rank: usize,
    ) -> Result<Self, DiffusionError> {
        let part = Self::new(config.global_size, nranks, rank)?;
        if part.dropped > 0 {
            match config.remainder {
                RemainderPolicy::Reject => {
                    return Err(DiffusionError::UnevenPartition {
                        global_size: config.global_size,
                        nranks,
                        dropped: part.dropped,
                    });
                }
                RemainderPolicy::Warn if rank == 0 => {
                    log::warn!(
                        "global size {} is not divisible by {} ranks; simulating {} cells, {} dropped",
                        config.global_size,
                        nranks,
                        part.simulated_size(),
                        part.dropped
                    );
                }
                RemainderPolicy::Warn => {}
            }
        }
        log::debug!(
            "rank {}/{}: owns global [{}, {}), local_size={}, left={:?}, right={:?}",
            rank,
            nranks,
            part.global_offset,
            part.global_offset + part.local_data_size,
            part.local_size,
            part.left,
            part.right
        );
        Ok(part)
    }

    pub fn neighbor(&self, side: Side) -> Neighbor {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    /// Cells actually simulated across all ranks.
    pub fn simulated_size(&self) -> usize {
        self.local_data_size * self.nranks
    }

    /// Owned slot sent to `side`'s neighbour.
    pub fn edge_index(&self, side: Side) -> usize {
        match side {
            Side::Left => 1,
            Side::Right => self.local_size - 2,
        }
    }

    pub fn owned_range(&self) -> RangeInclusive<usize> {
        1..=self.local_size - 2
    }

    /// Cells whose three-point stencil never touches a ghost. Empty when the
    /// rank owns at most two cells.
    pub fn interior_range(&self) -> RangeInclusive<usize> {
        2..=self.local_size - 3
    }

    /// Cells whose stencil reads a ghost: `1` and `local_size - 2`, or just
    /// `1` when the rank owns a single cell.
    pub fn boundary_cells(&self) -> impl Iterator<Item = usize> + use<> {
        let last = self.local_size - 2;
        std::iter::once(1).chain((last > 1).then_some(last))
    }
}
