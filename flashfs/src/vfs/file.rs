// SPDX-License-Identifier: MIT

//! Open file streams.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;

use flashio::BlockDevice;
use log::warn;

use crate::core::errors::*;
use crate::engine::{LfsFile, SeekWhence};
use crate::vfs::mode::{OpenMode, StreamKind};
use crate::vfs::mount::Core;

/// Read chunk used by [`FileHandle::read_to_end`].
const READ_CHUNK: usize = 256;

/// One open file: `Open` while it holds an engine file, `Closed` after.
///
/// Dropping an open handle closes it (committing pending writes); errors at
/// that point can only be logged, so call [`close`](Self::close) to see them.
pub struct FileHandle<D: BlockDevice> {
    core: Rc<RefCell<Core<D>>>,
    file: Option<LfsFile>,
    mode: OpenMode,
}

impl<D: BlockDevice> FileHandle<D> {
    pub(crate) fn open(core: &Rc<RefCell<Core<D>>>, path: &str, mode: &str) -> VfsResult<Self> {
        let mode = OpenMode::parse(mode);
        let file = {
            let mut c = core.borrow_mut();
            c.require_mounted()?;
            let path = c.resolve(path);
            c.engine(|lfs| lfs.file_open(&path, mode.flags))?
        };
        Ok(Self {
            core: Rc::clone(core),
            file: Some(file),
            mode,
        })
    }

    #[inline]
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    #[inline]
    pub fn kind(&self) -> StreamKind {
        self.mode.kind
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Absolute path the handle was opened with.
    pub fn path(&self) -> Option<String> {
        self.file.as_ref().map(LfsFile::path)
    }

    /// Runs `f` against the open engine file.
    fn with_file<T, F>(&mut self, f: F) -> VfsResult<T>
    where
        F: FnOnce(&mut crate::vfs::mount::Engine<D>, &mut LfsFile) -> LfsResult<T>,
    {
        let file = self.file.as_mut().ok_or(UsageError::Closed)?;
        let mut core = self.core.borrow_mut();
        core.require_mounted()?;
        core.engine(|lfs| f(lfs, file))
    }

    /// Reads into `buf`; a short count only happens at end of file.
    pub fn read_into(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        self.with_file(|lfs, file| lfs.file_read(file, buf))
    }

    /// Reads up to `max` bytes.
    pub fn read(&mut self, max: usize) -> VfsResult<Vec<u8>> {
        let mut buf = vec![0u8; max];
        let n = self.read_into(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Reads everything from the current position.
    pub fn read_to_end(&mut self) -> VfsResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = self.read_into(&mut chunk)?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&chunk[..n]);
        }
    }

    /// Text read of up to `max` bytes; only on text streams.
    ///
    /// A character cut by `max` is left for the next read. When `max` is
    /// smaller than the first character, that whole character is returned.
    /// Invalid UTF-8 fails with `NotText` and leaves the position unchanged.
    pub fn read_text(&mut self, max: usize) -> VfsResult<String> {
        ensure!(self.mode.is_text(), UsageError::NotText);
        let mut raw = self.read(max)?;
        loop {
            let err = match core::str::from_utf8(&raw) {
                Ok(_) => break,
                Err(e) => e,
            };
            if err.error_len().is_none() {
                let valid = err.valid_up_to();
                if valid > 0 {
                    self.seek(-((raw.len() - valid) as i64), SeekWhence::Cur)?;
                    raw.truncate(valid);
                    break;
                }
                let mut next = [0u8; 1];
                if self.read_into(&mut next)? == 1 {
                    raw.push(next[0]);
                    continue;
                }
            }
            self.seek(-(raw.len() as i64), SeekWhence::Cur)?;
            return Err(UsageError::NotText.into());
        }
        String::from_utf8(raw).map_err(|_| UsageError::NotText.into())
    }

    /// Writes `data`, returning how much was taken. Callers loop on short
    /// writes.
    pub fn write(&mut self, data: &[u8]) -> VfsResult<usize> {
        self.with_file(|lfs, file| lfs.file_write(file, data))
    }

    /// Text write; only on text streams.
    pub fn write_text(&mut self, text: &str) -> VfsResult<usize> {
        ensure!(self.mode.is_text(), UsageError::NotText);
        self.write(text.as_bytes())
    }

    pub fn seek(&mut self, offset: i64, whence: SeekWhence) -> VfsResult<u32> {
        self.with_file(|lfs, file| lfs.file_seek(file, offset, whence))
    }

    pub fn tell(&mut self) -> VfsResult<u32> {
        self.with_file(|lfs, file| lfs.file_tell(file))
    }

    pub fn size(&mut self) -> VfsResult<u32> {
        self.with_file(|lfs, file| lfs.file_size(file))
    }

    /// Commits buffered writes, keeping the handle open.
    pub fn flush(&mut self) -> VfsResult {
        self.with_file(|lfs, file| lfs.file_sync(file))
    }

    /// Closes the handle. Closing a closed handle succeeds.
    pub fn close(&mut self) -> VfsResult {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        let mut core = self.core.borrow_mut();
        core.require_mounted()?;
        core.engine(|lfs| lfs.file_close(file))
    }
}

impl<D: BlockDevice> Drop for FileHandle<D> {
    fn drop(&mut self) {
        if self.file.is_some()
            && let Err(e) = self.close()
        {
            warn!("implicit close failed: {e}");
        }
    }
}

#[cfg(feature = "std")]
mod io_impls {
    use std::io;

    use super::*;

    impl<D: BlockDevice> io::Read for FileHandle<D> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            Ok(self.read_into(buf)?)
        }
    }

    impl<D: BlockDevice> io::Write for FileHandle<D> {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(FileHandle::write(self, buf)?)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(FileHandle::flush(self)?)
        }
    }

    impl<D: BlockDevice> io::Seek for FileHandle<D> {
        fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
            let (offset, whence) = match pos {
                io::SeekFrom::Start(off) => {
                    let off = i64::try_from(off).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
                    (off, SeekWhence::Set)
                }
                io::SeekFrom::Current(off) => (off, SeekWhence::Cur),
                io::SeekFrom::End(off) => (off, SeekWhence::End),
            };
            Ok(FileHandle::seek(self, offset, whence)? as u64)
        }
    }
}
