// SPDX-License-Identifier: MIT

use flashio::geometry::Geometry;

use crate::core::errors::*;

/// Longest entry name accepted by default.
pub const NAME_MAX: u32 = 255;

/// Largest file size accepted by default.
pub const FILE_MAX: u32 = i32::MAX as u32;

pub const MIN_BLOCK_SIZE: u32 = 128;
pub const MIN_BLOCK_COUNT: u32 = 4;

/// Engine configuration, derived from a device [`Geometry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LfsConfig {
    pub read_size: u32,
    pub prog_size: u32,
    pub block_size: u32,
    pub block_count: u32,
    pub block_cycles: i32,
    pub cache_size: u32,
    /// Lookahead bitmap size in bytes; the window covers `8 * lookahead_size` blocks.
    pub lookahead_size: u32,
    pub name_max: u32,
    pub file_max: u32,
}

impl LfsConfig {
    pub fn from_geometry(geometry: &Geometry) -> Self {
        let block_size = geometry.block_size;
        Self {
            read_size: geometry.read_size.unwrap_or(block_size),
            prog_size: geometry.prog_size.unwrap_or(block_size),
            block_size,
            block_count: geometry.block_count,
            block_cycles: geometry.block_cycles,
            cache_size: geometry.cache_size,
            lookahead_size: geometry.lookahead_size,
            name_max: NAME_MAX,
            file_max: FILE_MAX,
        }
    }

    pub fn validate(&self) -> LfsResult {
        ensure!(self.block_size >= MIN_BLOCK_SIZE, LfsError::Inval);
        ensure!(self.block_count >= MIN_BLOCK_COUNT, LfsError::Inval);
        ensure!(self.read_size > 0 && self.prog_size > 0, LfsError::Inval);
        ensure!(self.cache_size > 0, LfsError::Inval);
        ensure!(self.cache_size % self.read_size == 0, LfsError::Inval);
        ensure!(self.cache_size % self.prog_size == 0, LfsError::Inval);
        ensure!(self.block_size % self.cache_size == 0, LfsError::Inval);
        ensure!(
            self.lookahead_size > 0 && self.lookahead_size % 8 == 0,
            LfsError::Inval
        );
        ensure!(self.block_cycles != 0, LfsError::Inval);
        ensure!(self.name_max > 0 && self.name_max <= u16::MAX as u32, LfsError::Inval);
        ensure!(self.file_max > 0 && self.file_max <= FILE_MAX, LfsError::Inval);
        Ok(())
    }

    /// Number of blocks tracked by one lookahead window.
    #[inline]
    pub fn lookahead_blocks(&self) -> u32 {
        self.lookahead_size.saturating_mul(8).min(self.block_count)
    }

    /// Blocks needed to hold `size` bytes of file data.
    #[inline]
    pub fn blocks_for(&self, size: u32) -> u32 {
        size.div_ceil(self.block_size)
    }
}
