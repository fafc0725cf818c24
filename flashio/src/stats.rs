// SPDX-License-Identifier: MIT

use crate::geometry::Geometry;
use crate::{BlockDevice, BlockProtocol, FlashIOResult, IoctlOp};

/// Simple counters, no_std friendly.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct IoStats {
    pub reads: u64,
    pub read_bytes: u64,
    pub writes: u64,
    pub write_bytes: u64,
    pub erases: u64,
    pub ioctls: u64,
    pub syncs: u64,

    // Useful sizes to diagnose granularity
    pub max_read: u64,
    pub max_write: u64,
}

impl IoStats {
    #[inline]
    pub fn reset(&mut self) {
        *self = IoStats::default();
    }

    /// Number of calls that may have modified the device.
    #[inline]
    pub fn mutations(&self) -> u64 {
        self.writes + self.erases
    }
}

/// Transparent instrumentation wrapper.
pub struct IOCounter<'a, D: BlockDevice + ?Sized> {
    inner: &'a mut D,
    pub stats: IoStats,
}

impl<'a, D: BlockDevice + ?Sized> IOCounter<'a, D> {
    #[inline]
    pub fn new(inner: &'a mut D) -> Self {
        Self {
            inner,
            stats: IoStats::default(),
        }
    }

    #[inline]
    pub fn snapshot(&self) -> IoStats {
        self.stats
    }

    #[inline]
    pub fn into_inner(self) -> &'a mut D {
        self.inner
    }
}

impl<'a, D: BlockDevice + ?Sized> BlockDevice for IOCounter<'a, D> {
    #[inline]
    fn geometry(&self) -> Geometry {
        self.inner.geometry()
    }

    #[inline]
    fn read(&mut self, block: u32, offset: u32, buf: &mut [u8]) -> FlashIOResult {
        self.stats.reads += 1;
        self.stats.read_bytes += buf.len() as u64;
        self.stats.max_read = self.stats.max_read.max(buf.len() as u64);
        self.inner.read(block, offset, buf)
    }

    #[inline]
    fn write(&mut self, block: u32, offset: u32, data: &[u8]) -> FlashIOResult {
        self.stats.writes += 1;
        self.stats.write_bytes += data.len() as u64;
        self.stats.max_write = self.stats.max_write.max(data.len() as u64);
        self.inner.write(block, offset, data)
    }

    #[inline]
    fn erase(&mut self, block: u32) -> FlashIOResult {
        self.stats.erases += 1;
        self.inner.erase(block)
    }

    #[inline]
    fn has_write(&self) -> bool {
        self.inner.has_write()
    }

    #[inline]
    fn has_erase(&self) -> bool {
        self.inner.has_erase()
    }

    #[inline]
    fn protocol(&self) -> BlockProtocol {
        self.inner.protocol()
    }

    #[inline]
    fn ioctl(&mut self, op: IoctlOp, arg: u32) -> FlashIOResult<Option<u32>> {
        self.stats.ioctls += 1;
        self.inner.ioctl(op, arg)
    }

    #[inline]
    fn sync(&mut self) -> FlashIOResult {
        self.stats.syncs += 1;
        self.inner.sync()
    }

    #[inline]
    fn count(&mut self) -> FlashIOResult<u32> {
        self.inner.count()
    }
}

/// Per-call hooks for [`TracingDevice`].
pub trait IOTracer {
    fn on_read(&mut self, _block: u32, _offset: u32, _len: usize) {}
    fn on_write(&mut self, _block: u32, _offset: u32, _len: usize) {}
    fn on_erase(&mut self, _block: u32) {}
    fn on_ioctl(&mut self, _op: IoctlOp) {}
}

pub struct TracingDevice<'a, D: BlockDevice + ?Sized, Tr: IOTracer> {
    inner: &'a mut D,
    pub tracer: Tr,
}

impl<'a, D: BlockDevice + ?Sized, Tr: IOTracer> TracingDevice<'a, D, Tr> {
    pub fn new(inner: &'a mut D, tracer: Tr) -> Self {
        Self { inner, tracer }
    }
}

impl<'a, D: BlockDevice + ?Sized, Tr: IOTracer> BlockDevice for TracingDevice<'a, D, Tr> {
    fn geometry(&self) -> Geometry {
        self.inner.geometry()
    }
    fn read(&mut self, block: u32, offset: u32, buf: &mut [u8]) -> FlashIOResult {
        self.tracer.on_read(block, offset, buf.len());
        self.inner.read(block, offset, buf)
    }
    fn write(&mut self, block: u32, offset: u32, data: &[u8]) -> FlashIOResult {
        self.tracer.on_write(block, offset, data.len());
        self.inner.write(block, offset, data)
    }
    fn erase(&mut self, block: u32) -> FlashIOResult {
        self.tracer.on_erase(block);
        self.inner.erase(block)
    }
    fn has_write(&self) -> bool {
        self.inner.has_write()
    }
    fn has_erase(&self) -> bool {
        self.inner.has_erase()
    }
    fn protocol(&self) -> BlockProtocol {
        self.inner.protocol()
    }
    fn ioctl(&mut self, op: IoctlOp, arg: u32) -> FlashIOResult<Option<u32>> {
        self.tracer.on_ioctl(op);
        self.inner.ioctl(op, arg)
    }
    fn sync(&mut self) -> FlashIOResult {
        self.inner.sync()
    }
    fn count(&mut self) -> FlashIOResult<u32> {
        self.inner.count()
    }
}
