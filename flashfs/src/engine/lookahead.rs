// SPDX-License-Identifier: MIT

//! Lookahead block allocator.
//!
//! A bitmap covers a window of `8 * lookahead_size` blocks starting at
//! `start`. Free blocks are handed out in order; when the window runs dry it
//! slides forward and is repopulated by the engine from the committed tree.
//! Blocks released by a commit only become allocatable once the window comes
//! around again, so the previous revision stays readable until then.

use alloc::vec;
use alloc::vec::Vec;

use crate::core::bitmap::BitmapOps;
use crate::engine::config::LfsConfig;

#[derive(Debug)]
pub(crate) struct Lookahead {
    block_count: u32,
    window: u32,
    /// First block of the current window.
    start: u32,
    /// Blocks covered by the current window.
    size: u32,
    next: u32,
    /// Blocks that may still be scanned before the device counts as full.
    ack: u32,
    bitmap: Vec<u8>,
}

impl Lookahead {
    pub fn new(cfg: &LfsConfig) -> Self {
        let window = cfg.lookahead_blocks();
        Self {
            block_count: cfg.block_count,
            window,
            start: 0,
            size: 0,
            next: 0,
            ack: cfg.block_count,
            bitmap: vec![0u8; window.div_ceil(8) as usize],
        }
    }

    /// Drops the window; `seed` picks where the next scan starts.
    pub fn reset(&mut self, seed: u32) {
        self.start = seed % self.block_count;
        self.size = 0;
        self.next = 0;
        self.ack = self.block_count;
        self.bitmap.fill(0);
    }

    /// Forgets the loaded window after an aborted transaction, so blocks it
    /// allocated are found free on the next scan.
    pub fn drop_window(&mut self) {
        self.size = 0;
        self.next = 0;
        self.ack = self.block_count;
        self.bitmap.fill(0);
    }

    /// A commit landed: everything may be scanned again.
    #[inline]
    pub fn ack(&mut self) {
        self.ack = self.block_count;
    }

    /// Next free block of the loaded window, marked as used.
    pub fn take(&mut self) -> Option<u32> {
        let off = self
            .bitmap
            .find_first_zero(self.next as usize, self.size as usize)? as u32;
        self.bitmap.set_bit(off as usize, true);
        self.next = off + 1;
        Some(((self.start as u64 + off as u64) % self.block_count as u64) as u32)
    }

    /// Slides to the next window. Returns `false` once every block has been
    /// scanned since the last [`ack`](Self::ack).
    pub fn advance(&mut self) -> bool {
        if self.ack == 0 {
            return false;
        }
        self.start = ((self.start as u64 + self.size as u64) % self.block_count as u64) as u32;
        self.size = self.window.min(self.ack);
        self.ack -= self.size;
        self.next = 0;
        self.bitmap.fill(0);
        true
    }

    /// Marks `block` as in use if it falls inside the current window.
    pub fn mark_used(&mut self, block: u32) {
        if block >= self.block_count {
            return;
        }
        let off = (block as u64 + self.block_count as u64 - self.start as u64) % self.block_count as u64;
        if off < self.size as u64 {
            self.bitmap.set_bit(off as usize, true);
        }
    }
}
