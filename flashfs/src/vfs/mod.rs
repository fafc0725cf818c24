// SPDX-License-Identifier: MIT

//! POSIX-like filesystem surface over a [`BlockDevice`](flashio::BlockDevice).

pub mod bdev;
pub mod dir;
pub mod errno;
pub mod file;
pub mod mode;
pub mod mount;
pub mod ops;

pub use bdev::BlockDeviceAdapter;
pub use dir::{DirEntry, DirectoryStream, EntryKind, EntryName};
pub use errno::Errno;
pub use file::FileHandle;
pub use mode::{OpenMode, StreamKind};
pub use mount::{LittleFsVfs, MountState};
pub use ops::{ImportStat, S_IFDIR, S_IFREG, Stat, StatVfs};

#[cfg(test)]
mod tests;
