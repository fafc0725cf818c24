// SPDX-License-Identifier: MIT
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

// Core modules
pub mod errors;
pub mod geometry;
pub mod stats;

// Backend modules
#[cfg(feature = "mem")]
mod mem;

#[cfg(feature = "std")]
mod std;

// Prelude re-exports (central entrypoint)
pub mod prelude {
    pub use super::BlockDevice;
    pub use super::BlockDeviceExt;
    pub use super::BlockProtocol;
    pub use super::IoctlOp;
    pub use super::errors::*;
    pub use super::geometry::*;
    pub use super::stats::*;

    #[cfg(feature = "mem")]
    pub use super::mem::MemFlash;

    #[cfg(feature = "std")]
    pub use super::std::FileFlash;
}

// Internal use
use errors::*;
use geometry::Geometry;

/// Value erased flash reads back as.
pub const ERASED_BYTE: u8 = 0xFF;

/// Control protocol a device speaks besides read/write/erase.
///
/// Resolved once when a device is attached; callers never re-probe it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockProtocol {
    /// Single `ioctl` entry point for init/deinit/sync/count queries.
    Ioctl,
    /// Older devices: optional `sync()` plus a required `count()`.
    Legacy { has_sync: bool },
}

/// Operations understood by [`BlockDevice::ioctl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IoctlOp {
    Init = 1,
    Deinit = 2,
    Sync = 3,
    BlockCount = 4,
    BlockSize = 5,
    BlockErase = 6,
}

// Traits

/// Flash block device capability.
///
/// Blocks are addressed in device coordinates (the filesystem adds its
/// `start_block`). Optional capabilities are announced through `has_write`
/// and `has_erase`; the defaults describe a read-only, non-erasable device
/// on the legacy protocol.
pub trait BlockDevice {
    /// Static geometry published by the device.
    fn geometry(&self) -> Geometry;

    /// Fills `buf` entirely from `offset` inside `block`, or fails.
    fn read(&mut self, block: u32, offset: u32, buf: &mut [u8]) -> FlashIOResult;

    /// Programs `data` at `offset` inside an erased `block`.
    fn write(&mut self, _block: u32, _offset: u32, _data: &[u8]) -> FlashIOResult {
        Err(FlashIOError::Unsupported)
    }

    /// Erases `block` back to [`ERASED_BYTE`].
    fn erase(&mut self, _block: u32) -> FlashIOResult {
        Err(FlashIOError::Unsupported)
    }

    fn has_write(&self) -> bool {
        false
    }

    fn has_erase(&self) -> bool {
        false
    }

    fn protocol(&self) -> BlockProtocol {
        BlockProtocol::Legacy { has_sync: false }
    }

    /// Modern control entry point. Returns `Some(value)` for queries.
    fn ioctl(&mut self, _op: IoctlOp, _arg: u32) -> FlashIOResult<Option<u32>> {
        Err(FlashIOError::Unsupported)
    }

    /// Legacy flush.
    fn sync(&mut self) -> FlashIOResult {
        Ok(())
    }

    /// Legacy block count query.
    fn count(&mut self) -> FlashIOResult<u32> {
        Ok(self.geometry().block_count)
    }
}

impl<T: BlockDevice + ?Sized> BlockDevice for &mut T {
    #[inline]
    fn geometry(&self) -> Geometry {
        (**self).geometry()
    }

    #[inline]
    fn read(&mut self, block: u32, offset: u32, buf: &mut [u8]) -> FlashIOResult {
        (**self).read(block, offset, buf)
    }

    #[inline]
    fn write(&mut self, block: u32, offset: u32, data: &[u8]) -> FlashIOResult {
        (**self).write(block, offset, data)
    }

    #[inline]
    fn erase(&mut self, block: u32) -> FlashIOResult {
        (**self).erase(block)
    }

    #[inline]
    fn has_write(&self) -> bool {
        (**self).has_write()
    }

    #[inline]
    fn has_erase(&self) -> bool {
        (**self).has_erase()
    }

    #[inline]
    fn protocol(&self) -> BlockProtocol {
        (**self).protocol()
    }

    #[inline]
    fn ioctl(&mut self, op: IoctlOp, arg: u32) -> FlashIOResult<Option<u32>> {
        (**self).ioctl(op, arg)
    }

    #[inline]
    fn sync(&mut self) -> FlashIOResult {
        (**self).sync()
    }

    #[inline]
    fn count(&mut self) -> FlashIOResult<u32> {
        (**self).count()
    }
}

/// Extension helpers shared by every [`BlockDevice`].
pub trait BlockDeviceExt: BlockDevice {
    /// Reads a whole block into `buf` (which must be `block_size` long).
    #[inline]
    fn read_block(&mut self, block: u32, buf: &mut [u8]) -> FlashIOResult {
        if buf.len() != self.geometry().block_size as usize {
            return Err("read_block: buffer length mismatch".into());
        }
        self.read(block, 0, buf)
    }

    /// Device-reported block count, through whichever protocol the device speaks.
    fn query_block_count(&mut self) -> FlashIOResult<u32> {
        match self.protocol() {
            BlockProtocol::Ioctl => match self.ioctl(IoctlOp::BlockCount, 0)? {
                Some(count) => Ok(count),
                None => Ok(self.geometry().block_count),
            },
            BlockProtocol::Legacy { .. } => self.count(),
        }
    }
}

impl<T: BlockDevice + ?Sized> BlockDeviceExt for T {}
