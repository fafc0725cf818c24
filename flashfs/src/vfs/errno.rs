// SPDX-License-Identifier: MIT

//! Error translation to the externally visible POSIX codes.
//!
//! Every code handed out is a positive errno: engine codes are negated,
//! device and usage errors get the closest POSIX meaning.

use core::fmt;

use crate::core::errors::*;
use crate::engine::Lfs;
use crate::engine::storage::LfsStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Errno {
    ENOENT = 2,
    EIO = 5,
    EBADF = 9,
    ENOMEM = 12,
    EEXIST = 17,
    ENODEV = 19,
    ENOTDIR = 20,
    EISDIR = 21,
    EINVAL = 22,
    EFBIG = 27,
    ENOSPC = 28,
    EROFS = 30,
    ENAMETOOLONG = 36,
    ENOTEMPTY = 39,
    ENODATA = 61,
    EILSEQ = 84,
}

impl Errno {
    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            Errno::ENOENT => "ENOENT",
            Errno::EIO => "EIO",
            Errno::EBADF => "EBADF",
            Errno::ENOMEM => "ENOMEM",
            Errno::EEXIST => "EEXIST",
            Errno::ENODEV => "ENODEV",
            Errno::ENOTDIR => "ENOTDIR",
            Errno::EISDIR => "EISDIR",
            Errno::EINVAL => "EINVAL",
            Errno::EFBIG => "EFBIG",
            Errno::ENOSPC => "ENOSPC",
            Errno::EROFS => "EROFS",
            Errno::ENAMETOOLONG => "ENAMETOOLONG",
            Errno::ENOTEMPTY => "ENOTEMPTY",
            Errno::ENODATA => "ENODATA",
            Errno::EILSEQ => "EILSEQ",
        }
    }

    /// Translates a raw engine return value. Success (`>= 0`) has no errno;
    /// unknown negative codes are reported as `EIO`.
    pub fn from_engine_code(code: i32) -> Option<Self> {
        LfsError::check(code).err().map(Errno::from)
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Errno {}] {}", self.code(), self.name())?;
        Ok(())
    }
}

impl From<LfsError> for Errno {
    fn from(err: LfsError) -> Self {
        match err {
            LfsError::Io => Errno::EIO,
            LfsError::Corrupt => Errno::EILSEQ,
            LfsError::NoEnt => Errno::ENOENT,
            LfsError::Exist => Errno::EEXIST,
            LfsError::NotDir => Errno::ENOTDIR,
            LfsError::IsDir => Errno::EISDIR,
            LfsError::NotEmpty => Errno::ENOTEMPTY,
            LfsError::BadF => Errno::EBADF,
            LfsError::FBig => Errno::EFBIG,
            LfsError::Inval => Errno::EINVAL,
            LfsError::NoSpc => Errno::ENOSPC,
            LfsError::NoMem => Errno::ENOMEM,
            LfsError::NoAttr => Errno::ENODATA,
            LfsError::NameTooLong => Errno::ENAMETOOLONG,
        }
    }
}

impl From<FlashIOError> for Errno {
    fn from(err: FlashIOError) -> Self {
        match err {
            FlashIOError::ReadOnly => Errno::EROFS,
            FlashIOError::Other(_) | FlashIOError::OutOfBounds | FlashIOError::Unsupported => Errno::EIO,
        }
    }
}

impl From<UsageError> for Errno {
    fn from(err: UsageError) -> Self {
        match err {
            UsageError::IsADirectory => Errno::EISDIR,
            UsageError::NotADirectory => Errno::ENOTDIR,
            UsageError::Closed => Errno::EBADF,
            UsageError::NotMounted => Errno::ENODEV,
            UsageError::ReadOnly => Errno::EROFS,
            UsageError::NotText | UsageError::InvalidPath => Errno::EINVAL,
        }
    }
}

impl VfsError {
    pub fn errno(&self) -> Errno {
        match *self {
            VfsError::Device(e) => e.into(),
            VfsError::Engine(e) => e.into(),
            VfsError::Usage(e) => e.into(),
        }
    }
}

#[cfg(feature = "std")]
impl From<VfsError> for std::io::Error {
    fn from(err: VfsError) -> Self {
        std::io::Error::from_raw_os_error(err.errno().code())
    }
}

/// Turns an engine failure into a [`VfsError`], surfacing the device fault
/// behind an `Io` status when there is one.
pub(crate) fn engine_error<S: LfsStorage>(lfs: &mut Lfs<S>, err: LfsError) -> VfsError {
    match (err, lfs.take_fault()) {
        (LfsError::Io, Some(fault)) => VfsError::Device(fault),
        _ => VfsError::Engine(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_codes_are_negated() {
        for err in LfsError::ALL {
            assert_eq!(Errno::from(err).code(), -err.code(), "{err}");
        }
    }

    #[test]
    fn test_raw_codes() {
        assert_eq!(Errno::from_engine_code(0), None);
        assert_eq!(Errno::from_engine_code(12), None);
        assert_eq!(Errno::from_engine_code(-28), Some(Errno::ENOSPC));
        assert_eq!(Errno::from_engine_code(-9999), Some(Errno::EIO));
    }

    #[test]
    fn test_vfs_errors() {
        assert_eq!(VfsError::from(FlashIOError::ReadOnly).errno(), Errno::EROFS);
        assert_eq!(VfsError::from(FlashIOError::OutOfBounds).errno(), Errno::EIO);
        assert_eq!(VfsError::from(UsageError::IsADirectory).errno(), Errno::EISDIR);
        assert_eq!(VfsError::from(UsageError::Closed).errno(), Errno::EBADF);
        assert_eq!(VfsError::from(LfsError::Exist).errno(), Errno::EEXIST);
        assert_eq!(Errno::ENOENT.to_string(), "[Errno 2] ENOENT");
    }
}
