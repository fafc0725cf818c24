// SPDX-License-Identifier: MIT

//! Storage contract consumed by the engine and its read cache.

use alloc::vec;
use alloc::vec::Vec;

use flashio::ERASED_BYTE;
use log::trace;

use crate::core::errors::*;
use crate::engine::config::LfsConfig;

/// Block-level callbacks the engine is driven through.
///
/// Blocks are filesystem-relative. Any failure aborts the current engine
/// operation with [`LfsError::Io`]; the original error is kept and can be
/// taken back with [`Lfs::take_fault`](crate::engine::Lfs::take_fault).
pub trait LfsStorage {
    fn read(&mut self, block: u32, offset: u32, buf: &mut [u8]) -> FlashIOResult;
    fn prog(&mut self, block: u32, offset: u32, data: &[u8]) -> FlashIOResult;
    fn erase(&mut self, block: u32) -> FlashIOResult;
    fn sync(&mut self) -> FlashIOResult;
}

impl<T: LfsStorage + ?Sized> LfsStorage for &mut T {
    #[inline]
    fn read(&mut self, block: u32, offset: u32, buf: &mut [u8]) -> FlashIOResult {
        (**self).read(block, offset, buf)
    }

    #[inline]
    fn prog(&mut self, block: u32, offset: u32, data: &[u8]) -> FlashIOResult {
        (**self).prog(block, offset, data)
    }

    #[inline]
    fn erase(&mut self, block: u32) -> FlashIOResult {
        (**self).erase(block)
    }

    #[inline]
    fn sync(&mut self) -> FlashIOResult {
        (**self).sync()
    }
}

/// Storage plus one `cache_size` read line and the last device fault.
pub(crate) struct CachedStorage<S: LfsStorage> {
    storage: S,
    block_size: u32,
    cache_size: u32,
    prog_size: u32,
    /// `(block, offset)` of the cached line.
    line: Option<(u32, u32)>,
    cache: Vec<u8>,
    fault: Option<FlashIOError>,
}

impl<S: LfsStorage> CachedStorage<S> {
    pub fn new(storage: S, cfg: &LfsConfig) -> Self {
        Self {
            storage,
            block_size: cfg.block_size,
            cache_size: cfg.cache_size,
            prog_size: cfg.prog_size,
            line: None,
            cache: vec![0u8; cfg.cache_size as usize],
            fault: None,
        }
    }

    #[inline]
    pub fn inner(&self) -> &S {
        &self.storage
    }

    #[inline]
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    #[inline]
    pub fn take_fault(&mut self) -> Option<FlashIOError> {
        self.fault.take()
    }

    #[inline]
    pub fn clear_fault(&mut self) {
        self.fault = None;
    }

    #[inline]
    pub fn invalidate(&mut self) {
        self.line = None;
    }

    fn record<T>(&mut self, res: FlashIOResult<T>) -> LfsResult<T> {
        res.map_err(|e| {
            self.fault = Some(e);
            LfsError::Io
        })
    }

    /// Reads `buf.len()` bytes at `offset` in `block` through the cache.
    pub fn read(&mut self, block: u32, offset: u32, buf: &mut [u8]) -> LfsResult {
        ensure!(
            offset as u64 + buf.len() as u64 <= self.block_size as u64,
            LfsError::Inval
        );

        let mut done = 0usize;
        while done < buf.len() {
            let pos = offset + done as u32;
            let line_off = pos - pos % self.cache_size;
            if self.line != Some((block, line_off)) {
                self.line = None;
                trace!("cache fill block={block} off={line_off}");
                let res = self.storage.read(block, line_off, &mut self.cache);
                self.record(res)?;
                self.line = Some((block, line_off));
            }
            let start = (pos - line_off) as usize;
            let n = (self.cache_size as usize - start).min(buf.len() - done);
            buf[done..done + n].copy_from_slice(&self.cache[start..start + n]);
            done += n;
        }
        Ok(())
    }

    /// Erases `block` and programs `data` from its start, padded with the
    /// erased value up to the program granularity.
    pub fn write_block(&mut self, block: u32, data: &[u8]) -> LfsResult {
        ensure!(data.len() <= self.block_size as usize, LfsError::Inval);
        if self.line.is_some_and(|(b, _)| b == block) {
            self.line = None;
        }

        let res = self.storage.erase(block);
        self.record(res)?;

        let prog = self.prog_size as usize;
        let padded_len = data.len().div_ceil(prog) * prog;
        if padded_len == 0 {
            return Ok(());
        }
        let res = if padded_len == data.len() {
            self.storage.prog(block, 0, data)
        } else {
            let mut padded = vec![ERASED_BYTE; padded_len];
            padded[..data.len()].copy_from_slice(data);
            self.storage.prog(block, 0, &padded)
        };
        self.record(res)
    }

    pub fn sync(&mut self) -> LfsResult {
        let res = self.storage.sync();
        self.record(res)
    }
}
