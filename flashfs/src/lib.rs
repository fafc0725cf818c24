// SPDX-License-Identifier: MIT
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

// Core Modules
#[macro_use]
pub mod core;
pub mod engine;
pub mod vfs;

// Reusable types
pub use crate::core::errors::*;
pub use crate::engine::{LfsConfig, OpenFlags, SeekWhence};
pub use crate::vfs::{
    DirEntry, DirectoryStream, EntryKind, EntryName, Errno, FileHandle, ImportStat, LittleFsVfs,
    MountState, OpenMode, Stat, StatVfs, StreamKind,
};

// Prelude re-exports (central entrypoint)
pub mod prelude {
    pub use flashio::prelude::*;

    pub use crate::core::errors::*;
    pub use crate::engine::{LfsConfig, OpenFlags, SeekWhence};
    pub use crate::vfs::{
        BlockDeviceAdapter, DirEntry, DirectoryStream, EntryKind, EntryName, Errno, FileHandle,
        ImportStat, LittleFsVfs, MountState, OpenMode, S_IFDIR, S_IFREG, Stat, StatVfs, StreamKind,
    };
}
