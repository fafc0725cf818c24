// SPDX-License-Identifier: MIT

//! Directory listings.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::iter::FusedIterator;

use flashio::BlockDevice;
use log::warn;

use crate::core::errors::*;
use crate::engine::{FileType, Info, LfsDir};
use crate::vfs::mount::Core;
use crate::vfs::ops::{S_IFDIR, S_IFREG};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
}

impl From<FileType> for EntryKind {
    fn from(kind: FileType) -> Self {
        match kind {
            FileType::Reg => EntryKind::File,
            FileType::Dir => EntryKind::Directory,
        }
    }
}

/// Entry name in the form the listing was requested with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryName {
    Text(String),
    Bytes(Vec<u8>),
}

impl EntryName {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            EntryName::Text(name) => name.as_bytes(),
            EntryName::Bytes(name) => name,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EntryName::Text(name) => Some(name),
            EntryName::Bytes(name) => core::str::from_utf8(name).ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: EntryName,
    pub kind: EntryKind,
    /// Always 0: the engine has no stable inode numbers.
    pub ino: u32,
    pub size: u32,
}

impl DirEntry {
    /// POSIX type bits (`S_IFREG` / `S_IFDIR`).
    pub fn mode(&self) -> u32 {
        match self.kind {
            EntryKind::File => S_IFREG,
            EntryKind::Directory => S_IFDIR,
        }
    }

    fn from_info(info: Info, bytes: bool) -> Self {
        let name = if bytes {
            EntryName::Bytes(info.name.into_bytes())
        } else {
            EntryName::Text(info.name)
        };
        Self {
            name,
            kind: info.kind.into(),
            ino: 0,
            size: info.size,
        }
    }
}

/// Lazy listing of one directory, without `.` and `..`.
///
/// The engine directory is closed as soon as the end is reached or an error
/// is returned; after that the stream only yields `None`.
pub struct DirectoryStream<D: BlockDevice> {
    core: Rc<RefCell<Core<D>>>,
    dir: Option<LfsDir>,
    bytes: bool,
}

impl<D: BlockDevice> DirectoryStream<D> {
    pub(crate) fn open(core: &Rc<RefCell<Core<D>>>, path: &str, bytes: bool) -> VfsResult<Self> {
        let dir = {
            let mut c = core.borrow_mut();
            c.require_mounted()?;
            let path = c.resolve(path);
            c.engine(|lfs| lfs.dir_open(&path))?
        };
        Ok(Self {
            core: Rc::clone(core),
            dir: Some(dir),
            bytes,
        })
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.dir.is_none()
    }

    /// Releases the engine directory; later calls are no-ops.
    pub fn close(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = self.core.borrow_mut().lfs.dir_close(dir) {
                warn!("directory close failed: {e}");
            }
        }
    }
}

impl<D: BlockDevice> Iterator for DirectoryStream<D> {
    type Item = VfsResult<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let res = {
                let dir = self.dir.as_mut()?;
                self.core.borrow_mut().engine(|lfs| lfs.dir_read(dir))
            };
            match res {
                Ok(Some(info)) if info.name == "." || info.name == ".." => continue,
                Ok(Some(info)) => return Some(Ok(DirEntry::from_info(info, self.bytes))),
                Ok(None) => {
                    self.close();
                    return None;
                }
                Err(e) => {
                    self.close();
                    return Some(Err(e));
                }
            }
        }
    }
}

impl<D: BlockDevice> FusedIterator for DirectoryStream<D> {}

impl<D: BlockDevice> Drop for DirectoryStream<D> {
    fn drop(&mut self) {
        self.close();
    }
}
