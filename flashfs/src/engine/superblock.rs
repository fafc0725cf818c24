// SPDX-License-Identifier: MIT

//! On-flash superblock, stored twice (blocks 0 and 1).
//!
//! A commit always targets the slot that does not hold the current revision,
//! so one intact copy survives any interrupted update.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::engine::config::LfsConfig;

pub const SUPERBLOCK_MAGIC: [u8; 8] = *b"flashfs\0";
pub const SUPERBLOCK_VERSION: u32 = 0x0001_0000;
pub const SUPERBLOCK_PAIR: [u32; 2] = [0, 1];

/// Sentinel for "no block" in chain pointers.
pub const NO_BLOCK: u32 = u32::MAX;

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct Superblock {
    pub magic: [u8; 8],
    pub version: u32,
    pub revision: u32,
    pub block_size: u32,
    pub block_count: u32,
    pub name_max: u32,
    pub file_max: u32,
    /// First block of the serialized directory tree.
    pub tree_head: u32,
    pub tree_len: u32,
    pub tree_crc: u32,
    /// CRC32 of every preceding byte.
    pub crc: u32,
}

/// Decoded state of one superblock slot.
#[derive(Debug, Clone, Copy)]
pub enum Slot {
    /// No magic: never formatted (or erased).
    Blank,
    /// Magic present but the header does not verify.
    Damaged,
    Valid(Superblock),
}

impl Superblock {
    pub const SIZE: usize = core::mem::size_of::<Self>();

    pub fn new(cfg: &LfsConfig, revision: u32, tree_head: u32, tree_len: u32, tree_crc: u32) -> Self {
        let mut sb = Self {
            magic: SUPERBLOCK_MAGIC,
            version: SUPERBLOCK_VERSION,
            revision,
            block_size: cfg.block_size,
            block_count: cfg.block_count,
            name_max: cfg.name_max,
            file_max: cfg.file_max,
            tree_head,
            tree_len,
            tree_crc,
            crc: 0,
        };
        sb.crc = sb.header_crc();
        sb
    }

    #[inline]
    fn header_crc(&self) -> u32 {
        crc32fast::hash(&self.as_bytes()[..Self::SIZE - 4])
    }

    pub fn decode(raw: &[u8]) -> Slot {
        let Ok(sb) = Superblock::read_from_bytes(&raw[..Self::SIZE.min(raw.len())]) else {
            return Slot::Damaged;
        };
        if sb.magic != SUPERBLOCK_MAGIC {
            return Slot::Blank;
        }
        let (crc, version) = (sb.crc, sb.version);
        if crc != sb.header_crc() {
            return Slot::Damaged;
        }
        if version >> 16 != SUPERBLOCK_VERSION >> 16 {
            return Slot::Damaged;
        }
        Slot::Valid(sb)
    }

    /// Wrapping revision comparison, so the counter may overflow.
    #[inline]
    pub fn is_newer_than(&self, other: &Superblock) -> bool {
        (self.revision.wrapping_sub(other.revision) as i32) > 0
    }

    /// Geometry recorded at format time must match the mounting config.
    pub fn matches(&self, cfg: &LfsConfig) -> bool {
        let (block_size, block_count) = (self.block_size, self.block_count);
        block_size == cfg.block_size && block_count == cfg.block_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashio::geometry::Geometry;

    fn config() -> LfsConfig {
        LfsConfig::from_geometry(&Geometry::new(512, 64))
    }

    #[test]
    fn test_round_trip_and_damage() {
        let sb = Superblock::new(&config(), 7, 2, 40, 0xDEAD_BEEF);
        let mut raw = sb.as_bytes().to_vec();

        match Superblock::decode(&raw) {
            Slot::Valid(back) => {
                assert_eq!({ back.revision }, 7);
                assert_eq!({ back.tree_head }, 2);
                assert!(back.matches(&config()));
            }
            other => panic!("unexpected slot {other:?}"),
        }

        raw[20] ^= 0xFF;
        assert!(matches!(Superblock::decode(&raw), Slot::Damaged));

        let blank = [0xFFu8; 64];
        assert!(matches!(Superblock::decode(&blank), Slot::Blank));
    }

    #[test]
    fn test_revision_wraps() {
        let cfg = config();
        let old = Superblock::new(&cfg, u32::MAX, 2, 0, 0);
        let new = Superblock::new(&cfg, 0, 3, 0, 0);
        assert!(new.is_newer_than(&old));
        assert!(!old.is_newer_than(&new));
    }
}
