// SPDX-License-Identifier: MIT

//! Static description of a flash device.
//!
//! A `Geometry` is the set of attributes a device publishes alongside its
//! read/write/erase operations. The filesystem derives its whole engine
//! configuration from it, so every field maps onto one engine knob.

/// Default number of erase cycles before the engine should move metadata.
pub const DEFAULT_BLOCK_CYCLES: i32 = 100;

/// Default lookahead window in bytes (each bit tracks one block).
pub const DEFAULT_LOOKAHEAD_SIZE: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Geometry {
    /// Erase unit size in bytes.
    pub block_size: u32,
    /// Number of erase units exposed to the filesystem.
    pub block_count: u32,
    /// First device block owned by the filesystem.
    pub start_block: u32,
    /// Minimum read granularity; `None` means whole blocks.
    pub read_size: Option<u32>,
    /// Minimum program granularity; `None` means whole blocks.
    pub prog_size: Option<u32>,
    pub cache_size: u32,
    pub lookahead_size: u32,
    /// Wear-leveling threshold; `-1` disables it.
    pub block_cycles: i32,
}

impl Geometry {
    pub fn new(block_size: u32, block_count: u32) -> Self {
        Self {
            block_size,
            block_count,
            start_block: 0,
            read_size: None,
            prog_size: None,
            cache_size: block_size,
            lookahead_size: DEFAULT_LOOKAHEAD_SIZE,
            block_cycles: DEFAULT_BLOCK_CYCLES,
        }
    }

    #[inline]
    pub fn with_start_block(mut self, start_block: u32) -> Self {
        self.start_block = start_block;
        self
    }

    #[inline]
    pub fn with_granularity(mut self, read_size: u32, prog_size: u32) -> Self {
        self.read_size = Some(read_size);
        self.prog_size = Some(prog_size);
        self
    }

    #[inline]
    pub fn with_cache_size(mut self, cache_size: u32) -> Self {
        self.cache_size = cache_size;
        self
    }

    #[inline]
    pub fn with_lookahead_size(mut self, lookahead_size: u32) -> Self {
        self.lookahead_size = lookahead_size;
        self
    }

    #[inline]
    pub fn with_block_cycles(mut self, block_cycles: i32) -> Self {
        self.block_cycles = block_cycles;
        self
    }

    /// Size in bytes of the region covered by the filesystem.
    #[inline]
    pub fn size_bytes(&self) -> u64 {
        self.block_size as u64 * self.block_count as u64
    }

    /// Absolute byte offset of `offset` inside filesystem block `block`.
    #[inline]
    pub fn byte_offset(&self, block: u32, offset: u32) -> u64 {
        (self.start_block as u64 + block as u64) * self.block_size as u64 + offset as u64
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new(4096, 0)
    }
}
