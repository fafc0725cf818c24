// SPDX-License-Identifier: MIT

#[cfg(feature = "std")]
use std::io::{Error, Read, Seek, SeekFrom, Write};

use crate::geometry::Geometry;
use crate::{BlockDevice, BlockProtocol, ERASED_BYTE, FlashIOError, FlashIOResult, IoctlOp};

/// Flash device emulated on top of any seekable byte stream (image file,
/// raw partition, cursor).
///
/// Blocks are addressed from offset 0 of the stream. Speaks the ioctl
/// protocol; `Sync` flushes the stream.
#[cfg(feature = "std")]
#[derive(Debug)]
pub struct FileFlash<'a, T: Read + Write + Seek> {
    io: &'a mut T,
    geometry: Geometry,
}

#[cfg(feature = "std")]
impl<'a, T: Read + Write + Seek> FileFlash<'a, T> {
    #[inline]
    pub fn new(io: &'a mut T, geometry: Geometry) -> Self {
        Self { io, geometry }
    }

    #[inline]
    fn seek_to(&mut self, block: u32, offset: u32) -> FlashIOResult {
        let abs_offset = block as u64 * self.geometry.block_size as u64 + offset as u64;
        self.io.seek(SeekFrom::Start(abs_offset))?;
        Ok(())
    }
}

#[cfg(feature = "std")]
impl<'a, T: Read + Write + Seek> BlockDevice for FileFlash<'a, T> {
    #[inline]
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn read(&mut self, block: u32, offset: u32, buf: &mut [u8]) -> FlashIOResult {
        self.seek_to(block, offset)?;
        self.io.read_exact(buf)?;
        Ok(())
    }

    fn write(&mut self, block: u32, offset: u32, data: &[u8]) -> FlashIOResult {
        self.seek_to(block, offset)?;
        self.io.write_all(data)?;
        Ok(())
    }

    fn erase(&mut self, block: u32) -> FlashIOResult {
        let erased = vec![ERASED_BYTE; self.geometry.block_size as usize];
        self.seek_to(block, 0)?;
        self.io.write_all(&erased)?;
        Ok(())
    }

    #[inline]
    fn has_write(&self) -> bool {
        true
    }

    #[inline]
    fn has_erase(&self) -> bool {
        true
    }

    #[inline]
    fn protocol(&self) -> BlockProtocol {
        BlockProtocol::Ioctl
    }

    fn ioctl(&mut self, op: IoctlOp, arg: u32) -> FlashIOResult<Option<u32>> {
        match op {
            IoctlOp::Init | IoctlOp::Deinit => Ok(None),
            IoctlOp::Sync => {
                self.io.flush()?;
                Ok(None)
            }
            IoctlOp::BlockCount => Ok(Some(self.geometry.block_count)),
            IoctlOp::BlockSize => Ok(Some(self.geometry.block_size)),
            IoctlOp::BlockErase => self.erase(arg).map(|_| None),
        }
    }
}

#[cfg(feature = "std")]
impl From<Error> for FlashIOError {
    #[cold]
    #[inline(never)]
    fn from(e: Error) -> Self {
        // Leak the string to produce a 'static str. Acceptable for error mapping.
        let leaked_str: &'static str = Box::leak(e.to_string().into_boxed_str());
        FlashIOError::Other(leaked_str)
    }
}

#[cfg(all(test, feature = "std"))]
mod test {
    use super::*;
    use crate::prelude::*;
    use tempfile::tempfile;

    #[test]
    fn test_rw() {
        let mut file = tempfile().unwrap();
        file.set_len(512).unwrap();
        let mut dev = FileFlash::new(&mut file, Geometry::new(128, 4));
        dev.write(2, 10, &[1, 2, 3, 4]).unwrap();

        let mut output = [0u8; 4];
        dev.read(2, 10, &mut output).unwrap();
        assert_eq!(output, [1, 2, 3, 4]);
    }

    #[test]
    fn test_erase() {
        let mut file = tempfile().unwrap();
        file.set_len(512).unwrap();
        let mut dev = FileFlash::new(&mut file, Geometry::new(128, 4));
        dev.write(1, 0, &[0u8; 16]).unwrap();
        dev.ioctl(IoctlOp::BlockErase, 1).unwrap();

        let mut output = [0u8; 128];
        dev.read_block(1, &mut output).unwrap();
        assert!(output.iter().all(|&b| b == ERASED_BYTE));
    }

    #[test]
    fn test_read_past_end_fails() {
        let mut file = tempfile().unwrap();
        file.set_len(256).unwrap();
        let mut dev = FileFlash::new(&mut file, Geometry::new(128, 4));

        let mut output = [0u8; 16];
        assert!(dev.read(3, 0, &mut output).is_err());
    }

    #[test]
    fn test_ioctl_queries() {
        let mut file = tempfile().unwrap();
        let mut dev = FileFlash::new(&mut file, Geometry::new(128, 4));
        assert_eq!(dev.ioctl(IoctlOp::BlockSize, 0).unwrap(), Some(128));
        assert_eq!(dev.query_block_count().unwrap(), 4);
        assert_eq!(dev.ioctl(IoctlOp::Sync, 0).unwrap(), None);
    }
}
