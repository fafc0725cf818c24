// SPDX-License-Identifier: MIT

//! Path-level operations of [`LittleFsVfs`].

use alloc::string::String;

use flashio::BlockDevice;

use crate::core::errors::*;
use crate::core::path::{components_to_path, normalize_components};
use crate::engine::FileType;
use crate::vfs::dir::DirectoryStream;
use crate::vfs::file::FileHandle;
use crate::vfs::mount::LittleFsVfs;

pub const S_IFDIR: u32 = 0o040000;
pub const S_IFREG: u32 = 0o100000;

/// `stat` record. Timestamps are not tracked and read as 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stat {
    pub mode: u32,
    pub ino: u32,
    pub dev: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
    pub atime: u32,
    pub mtime: u32,
    pub ctime: u32,
}

impl Stat {
    #[inline]
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFDIR != 0
    }

    #[inline]
    pub fn is_file(&self) -> bool {
        self.mode & S_IFREG != 0
    }
}

/// `statvfs` record; fields the engine cannot answer are 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatVfs {
    pub bsize: u32,
    pub frsize: u32,
    pub blocks: u32,
    pub bfree: u32,
    pub bavail: u32,
    pub files: u32,
    pub ffree: u32,
    pub favail: u32,
    pub flag: u32,
    pub namemax: u32,
}

/// Answer to a module-loader existence probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStat {
    NoExist,
    File,
    Dir,
}

impl<D: BlockDevice> LittleFsVfs<D> {
    /// Opens `path` with a mode string such as `"r"`, `"wb"` or `"a+"`.
    pub fn open(&self, path: &str, mode: &str) -> VfsResult<FileHandle<D>> {
        FileHandle::open(&self.core, path, mode)
    }

    /// Lists `path` (the current directory when `None`) with text names.
    pub fn ilistdir(&self, path: Option<&str>) -> VfsResult<DirectoryStream<D>> {
        DirectoryStream::open(&self.core, path.unwrap_or(""), false)
    }

    /// Lists a directory given as raw bytes; names come back as bytes.
    pub fn ilistdir_bytes(&self, path: &[u8]) -> VfsResult<DirectoryStream<D>> {
        let path = core::str::from_utf8(path).map_err(|_| UsageError::InvalidPath)?;
        DirectoryStream::open(&self.core, path, true)
    }

    pub fn mkdir(&self, path: &str) -> VfsResult {
        let mut core = self.core.borrow_mut();
        core.require_mounted()?;
        let path = core.resolve(path);
        core.engine(|lfs| lfs.mkdir(&path))
    }

    /// Removes a file; directories go through [`rmdir`](Self::rmdir).
    pub fn remove(&self, path: &str) -> VfsResult {
        self.remove_kind(path, FileType::Reg)
    }

    /// Removes an empty directory.
    pub fn rmdir(&self, path: &str) -> VfsResult {
        self.remove_kind(path, FileType::Dir)
    }

    fn remove_kind(&self, path: &str, expected: FileType) -> VfsResult {
        let mut core = self.core.borrow_mut();
        core.require_mounted()?;
        let path = core.resolve(path);
        let info = core.engine(|lfs| lfs.stat(&path))?;
        match (expected, info.kind) {
            (FileType::Reg, FileType::Dir) => return Err(UsageError::IsADirectory.into()),
            (FileType::Dir, FileType::Reg) => return Err(UsageError::NotADirectory.into()),
            _ => {}
        }
        core.engine(|lfs| lfs.remove(&path))
    }

    /// Atomic rename; replaces a compatible existing target.
    pub fn rename(&self, old: &str, new: &str) -> VfsResult {
        let mut core = self.core.borrow_mut();
        core.require_mounted()?;
        let (old, new) = (core.resolve(old), core.resolve(new));
        core.engine(|lfs| lfs.rename(&old, &new))
    }

    pub fn stat(&self, path: &str) -> VfsResult<Stat> {
        let mut core = self.core.borrow_mut();
        core.require_mounted()?;
        let path = core.resolve(path);
        let info = core.engine(|lfs| lfs.stat(&path))?;
        let mode = match info.kind {
            FileType::Reg => S_IFREG,
            FileType::Dir => S_IFDIR,
        };
        Ok(Stat {
            mode,
            size: info.size,
            ..Stat::default()
        })
    }

    /// Filesystem usage. `bfree` is `blocks` minus what the engine reports
    /// as allocated; a count above `blocks` is reported as corruption.
    pub fn statvfs(&self, _path: &str) -> VfsResult<StatVfs> {
        let mut core = self.core.borrow_mut();
        core.require_mounted()?;
        let cfg = *core.lfs.config();
        let allocated = core.engine(|lfs| lfs.fs_size())?;
        let free = cfg
            .block_count
            .checked_sub(allocated)
            .ok_or(VfsError::Engine(LfsError::Corrupt))?;
        Ok(StatVfs {
            bsize: cfg.block_size,
            frsize: cfg.block_size,
            blocks: cfg.block_count,
            bfree: free,
            bavail: free,
            namemax: cfg.name_max,
            ..StatVfs::default()
        })
    }

    /// Existence probe that never fails.
    pub fn import_stat(&self, path: &str) -> ImportStat {
        match self.stat(path) {
            Ok(st) if st.is_dir() => ImportStat::Dir,
            Ok(_) => ImportStat::File,
            Err(_) => ImportStat::NoExist,
        }
    }

    pub fn chdir(&self, path: &str) -> VfsResult {
        let mut core = self.core.borrow_mut();
        core.require_mounted()?;
        let path = core.resolve(path);
        let info = core.engine(|lfs| lfs.stat(&path))?;
        ensure!(info.kind == FileType::Dir, UsageError::NotADirectory);
        core.cwd = components_to_path(&normalize_components(&path));
        Ok(())
    }

    pub fn getcwd(&self) -> String {
        self.core.borrow().cwd.clone()
    }
}
