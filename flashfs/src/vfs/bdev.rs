// SPDX-License-Identifier: MIT

//! Binds a [`BlockDevice`] to the engine's storage callbacks.

use flashio::prelude::*;
use log::{debug, trace, warn};

use crate::engine::LfsStorage;

/// Adapter between a host device and the engine.
///
/// The device protocol and its write/erase capabilities are resolved once,
/// when the adapter is built. Engine block numbers are shifted by the
/// geometry's `start_block` before reaching the device.
pub struct BlockDeviceAdapter<D: BlockDevice> {
    device: D,
    geometry: Geometry,
    protocol: BlockProtocol,
    writable: bool,
    erasable: bool,
    attached: bool,
}

impl<D: BlockDevice> BlockDeviceAdapter<D> {
    /// Probes `device` and attaches it (`ioctl(Init)` on the modern protocol).
    pub fn new(mut device: D) -> FlashIOResult<Self> {
        let geometry = device.geometry();
        let protocol = device.protocol();

        if protocol == BlockProtocol::Ioctl {
            match device.ioctl(IoctlOp::Init, 0) {
                Ok(_) | Err(FlashIOError::Unsupported) => {}
                Err(e) => return Err(e),
            }
        }

        match device.query_block_count() {
            Ok(reported) if reported < geometry.block_count => {
                warn!(
                    "device reports {reported} blocks, geometry claims {}",
                    geometry.block_count
                );
            }
            Ok(_) | Err(FlashIOError::Unsupported) => {}
            Err(e) => return Err(e),
        }

        let adapter = Self {
            writable: device.has_write(),
            erasable: device.has_erase(),
            device,
            geometry,
            protocol,
            attached: true,
        };
        debug!(
            "attach: {:?}, write={}, erase={}, start_block={}",
            adapter.protocol, adapter.writable, adapter.erasable, adapter.geometry.start_block
        );
        Ok(adapter)
    }

    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[inline]
    pub fn protocol(&self) -> BlockProtocol {
        self.protocol
    }

    #[inline]
    pub fn has_write(&self) -> bool {
        self.writable
    }

    #[inline]
    pub fn has_erase(&self) -> bool {
        self.erasable
    }

    /// Treats the device as read-only from now on.
    #[inline]
    pub fn disable_write(&mut self) {
        self.writable = false;
    }

    /// Flushes and releases the device. Runs at most once.
    pub fn detach(&mut self) -> FlashIOResult {
        if !self.attached {
            return Ok(());
        }
        self.attached = false;
        debug!("detach: {:?}", self.protocol);
        match self.protocol {
            BlockProtocol::Ioctl => {
                let synced = self.device.ioctl(IoctlOp::Sync, 0).map(|_| ());
                let released = self.device.ioctl(IoctlOp::Deinit, 0).map(|_| ());
                ignore_unsupported(synced)?;
                ignore_unsupported(released)
            }
            BlockProtocol::Legacy { has_sync: true } => self.device.sync(),
            BlockProtocol::Legacy { has_sync: false } => Ok(()),
        }
    }

    #[inline]
    fn check_range(&self, block: u32) -> FlashIOResult<u32> {
        if block >= self.geometry.block_count {
            return Err(FlashIOError::OutOfBounds);
        }
        self.geometry
            .start_block
            .checked_add(block)
            .ok_or(FlashIOError::OutOfBounds)
    }
}

fn ignore_unsupported(res: FlashIOResult) -> FlashIOResult {
    match res {
        Err(FlashIOError::Unsupported) => Ok(()),
        other => other,
    }
}

impl<D: BlockDevice> LfsStorage for BlockDeviceAdapter<D> {
    fn read(&mut self, block: u32, offset: u32, buf: &mut [u8]) -> FlashIOResult {
        let dev_block = self.check_range(block)?;
        trace!("read block={dev_block} off={offset} len={}", buf.len());
        self.device.read(dev_block, offset, buf)
    }

    fn prog(&mut self, block: u32, offset: u32, data: &[u8]) -> FlashIOResult {
        if !self.writable {
            return Err(FlashIOError::ReadOnly);
        }
        let dev_block = self.check_range(block)?;
        trace!("prog block={dev_block} off={offset} len={}", data.len());
        self.device.write(dev_block, offset, data)
    }

    /// Erasing only ever precedes a program, so a read-only device refuses it too.
    fn erase(&mut self, block: u32) -> FlashIOResult {
        if !self.writable {
            return Err(FlashIOError::ReadOnly);
        }
        if !self.erasable {
            return Err(FlashIOError::Unsupported);
        }
        let dev_block = self.check_range(block)?;
        trace!("erase block={dev_block}");
        self.device.erase(dev_block)
    }

    /// Durability is the device's business.
    fn sync(&mut self) -> FlashIOResult {
        Ok(())
    }
}

impl<D: BlockDevice> Drop for BlockDeviceAdapter<D> {
    fn drop(&mut self) {
        if let Err(e) = self.detach() {
            warn!("detach failed: {e}");
        }
    }
}
