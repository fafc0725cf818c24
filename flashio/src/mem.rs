// SPDX-License-Identifier: MIT

use log::warn;

use crate::geometry::Geometry;
use crate::{BlockDevice, BlockProtocol, ERASED_BYTE, FlashIOError, FlashIOResult, IoctlOp};

/// In-memory flash device.
///
/// Useful for tests, RAM-backed filesystems and crash simulation. Blocks are
/// addressed from the start of `buffer`; a filesystem with a non-zero
/// `start_block` simply lives further into the buffer.
#[derive(Debug)]
pub struct MemFlash<'a> {
    buffer: &'a mut [u8],
    geometry: Geometry,
    protocol: BlockProtocol,
    writable: bool,
    erasable: bool,
    /// Remaining program/erase operations before a simulated power loss.
    budget: Option<usize>,
    powered_off: bool,
}

impl<'a> MemFlash<'a> {
    #[inline]
    pub fn new(buffer: &'a mut [u8], geometry: Geometry) -> Self {
        Self {
            buffer,
            geometry,
            protocol: BlockProtocol::Ioctl,
            writable: true,
            erasable: true,
            budget: None,
            powered_off: false,
        }
    }

    /// Same device, but speaking the legacy sync/count protocol.
    #[inline]
    pub fn legacy(buffer: &'a mut [u8], geometry: Geometry) -> Self {
        Self::new(buffer, geometry).with_protocol(BlockProtocol::Legacy { has_sync: true })
    }

    #[inline]
    pub fn with_protocol(mut self, protocol: BlockProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Drops the write capability entirely.
    #[inline]
    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    /// Drops the erase capability entirely.
    #[inline]
    pub fn without_erase(mut self) -> Self {
        self.erasable = false;
        self
    }

    /// Allows `ops` more program/erase calls, then simulates a power cut:
    /// the failing program only lands its first half, and every later
    /// program/erase fails without touching the buffer.
    #[inline]
    pub fn with_program_budget(mut self, ops: usize) -> Self {
        self.budget = Some(ops);
        self
    }

    #[inline]
    pub fn is_powered_off(&self) -> bool {
        self.powered_off
    }

    #[inline]
    fn check_bounds(&self, abs_off: u64, len: usize) -> FlashIOResult<usize> {
        let end = abs_off
            .checked_add(len as u64)
            .ok_or(FlashIOError::OutOfBounds)?;
        if end > self.buffer.len() as u64 {
            return Err(FlashIOError::OutOfBounds);
        }
        Ok(abs_off as usize)
    }

    #[inline]
    fn abs_offset(&self, block: u32, offset: u32) -> u64 {
        block as u64 * self.geometry.block_size as u64 + offset as u64
    }

    /// Consumes one operation from the budget. `Ok(false)` means the power
    /// goes out during this very operation.
    fn spend(&mut self) -> FlashIOResult<bool> {
        if self.powered_off {
            return Err("device powered off".into());
        }
        match self.budget.as_mut() {
            Some(0) => {
                self.powered_off = true;
                Ok(false)
            }
            Some(left) => {
                *left -= 1;
                Ok(true)
            }
            None => Ok(true),
        }
    }
}

impl<'a> BlockDevice for MemFlash<'a> {
    #[inline]
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    #[inline(always)]
    fn read(&mut self, block: u32, offset: u32, buf: &mut [u8]) -> FlashIOResult {
        let start = self.check_bounds(self.abs_offset(block, offset), buf.len())?;
        buf.copy_from_slice(&self.buffer[start..start + buf.len()]);
        Ok(())
    }

    fn write(&mut self, block: u32, offset: u32, data: &[u8]) -> FlashIOResult {
        if !self.writable {
            return Err(FlashIOError::ReadOnly);
        }
        let start = self.check_bounds(self.abs_offset(block, offset), data.len())?;
        if !self.spend()? {
            let torn = data.len() / 2;
            warn!("mem: power cut while programming block {block} ({torn} of {} bytes landed)", data.len());
            self.buffer[start..start + torn].copy_from_slice(&data[..torn]);
            return Err("power lost during program".into());
        }
        self.buffer[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn erase(&mut self, block: u32) -> FlashIOResult {
        if !self.erasable {
            return Err(FlashIOError::Unsupported);
        }
        let len = self.geometry.block_size as usize;
        let start = self.check_bounds(self.abs_offset(block, 0), len)?;
        if !self.spend()? {
            warn!("mem: power cut while erasing block {block}");
            return Err("power lost during erase".into());
        }
        self.buffer[start..start + len].fill(ERASED_BYTE);
        Ok(())
    }

    #[inline]
    fn has_write(&self) -> bool {
        self.writable
    }

    #[inline]
    fn has_erase(&self) -> bool {
        self.erasable
    }

    #[inline]
    fn protocol(&self) -> BlockProtocol {
        self.protocol
    }

    fn ioctl(&mut self, op: IoctlOp, arg: u32) -> FlashIOResult<Option<u32>> {
        if self.protocol != BlockProtocol::Ioctl {
            return Err(FlashIOError::Unsupported);
        }
        match op {
            IoctlOp::Init | IoctlOp::Deinit | IoctlOp::Sync => Ok(None),
            IoctlOp::BlockCount => Ok(Some(self.geometry.block_count)),
            IoctlOp::BlockSize => Ok(Some(self.geometry.block_size)),
            IoctlOp::BlockErase => self.erase(arg).map(|_| None),
        }
    }

    fn sync(&mut self) -> FlashIOResult {
        match self.protocol {
            BlockProtocol::Legacy { has_sync: true } => Ok(()),
            _ => Err(FlashIOError::Unsupported),
        }
    }

    fn count(&mut self) -> FlashIOResult<u32> {
        match self.protocol {
            BlockProtocol::Legacy { .. } => Ok(self.geometry.block_count),
            BlockProtocol::Ioctl => Err(FlashIOError::Unsupported),
        }
    }
}
