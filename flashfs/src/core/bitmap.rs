// SPDX-License-Identifier: MIT

//! Bit operations on byte slices (lookahead windows, reachability tracking).
//!
//! Bit 0 is the LSB of byte 0.

pub trait BitmapOps {
    /// Sets or clears a bit. Does nothing if `bit` is out of bounds.
    fn set_bit(&mut self, bit: usize, value: bool);

    /// Returns `false` if `bit` is out of bounds.
    fn get_bit(&self, bit: usize) -> bool;

    /// First zero bit in `[start, end)`.
    fn find_first_zero(&self, start: usize, end: usize) -> Option<usize>;

    fn count_ones(&self) -> usize;
}

impl BitmapOps for [u8] {
    #[inline]
    fn set_bit(&mut self, bit: usize, value: bool) {
        if let Some(byte) = self.get_mut(bit / 8) {
            let mask = 1u8 << (bit % 8);
            if value {
                *byte |= mask;
            } else {
                *byte &= !mask;
            }
        }
    }

    #[inline]
    fn get_bit(&self, bit: usize) -> bool {
        self.get(bit / 8)
            .is_some_and(|b| (b & (1 << (bit % 8))) != 0)
    }

    fn find_first_zero(&self, start: usize, end: usize) -> Option<usize> {
        let end = end.min(self.len() * 8);
        let mut bit = start;
        while bit < end {
            // Skip full bytes
            if bit % 8 == 0 && self[bit / 8] == 0xFF {
                bit += 8;
                continue;
            }
            if !self.get_bit(bit) {
                return Some(bit);
            }
            bit += 1;
        }
        None
    }

    fn count_ones(&self) -> usize {
        self.iter().map(|b| b.count_ones() as usize).sum()
    }
}
