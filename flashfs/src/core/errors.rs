// SPDX-License-Identifier: MIT

use core::fmt;

pub use flashio::errors::*;

/// Status codes reported by the flash engine.
///
/// Discriminants are the engine's native (negative errno) codes; success is
/// never an error value and lives in the `Ok` arm of [`LfsResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum LfsError {
    Io = -5,
    Corrupt = -84,
    NoEnt = -2,
    Exist = -17,
    NotDir = -20,
    IsDir = -21,
    NotEmpty = -39,
    BadF = -9,
    FBig = -27,
    Inval = -22,
    NoSpc = -28,
    NoMem = -12,
    NoAttr = -61,
    NameTooLong = -36,
}

impl LfsError {
    pub const ALL: [LfsError; 14] = [
        LfsError::Io,
        LfsError::Corrupt,
        LfsError::NoEnt,
        LfsError::Exist,
        LfsError::NotDir,
        LfsError::IsDir,
        LfsError::NotEmpty,
        LfsError::BadF,
        LfsError::FBig,
        LfsError::Inval,
        LfsError::NoSpc,
        LfsError::NoMem,
        LfsError::NoAttr,
        LfsError::NameTooLong,
    ];

    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.code() == code)
    }

    /// Decodes a raw engine return value: non-negative is success, unknown
    /// negative codes are reported as `Io`.
    pub fn check(code: i32) -> LfsResult<u32> {
        if code >= 0 {
            return Ok(code as u32);
        }
        Err(Self::from_code(code).unwrap_or(LfsError::Io))
    }

    pub fn msg(&self) -> &'static str {
        match self {
            LfsError::Io => "Error during device operation",
            LfsError::Corrupt => "Corrupted",
            LfsError::NoEnt => "No directory entry",
            LfsError::Exist => "Entry already exists",
            LfsError::NotDir => "Entry is not a dir",
            LfsError::IsDir => "Entry is a dir",
            LfsError::NotEmpty => "Dir is not empty",
            LfsError::BadF => "Bad file number",
            LfsError::FBig => "File too large",
            LfsError::Inval => "Invalid parameter",
            LfsError::NoSpc => "No space left on device",
            LfsError::NoMem => "No more memory available",
            LfsError::NoAttr => "No data/attr available",
            LfsError::NameTooLong => "File name too long",
        }
    }
}

impl fmt::Display for LfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.msg(), self.code())?;
        Ok(())
    }
}

/// Misuse of the VFS surface, detected before the engine is involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageError {
    /// `remove` aimed at a directory.
    IsADirectory,
    /// `rmdir`/`chdir` aimed at a file.
    NotADirectory,
    /// Operation on a closed file handle.
    Closed,
    /// Operation while no filesystem is mounted.
    NotMounted,
    /// Format requested on a device without write capability.
    ReadOnly,
    /// Text operation on a binary stream, or data that is not UTF-8.
    NotText,
    InvalidPath,
}

impl UsageError {
    pub fn msg(&self) -> &'static str {
        match self {
            UsageError::IsADirectory => "Is a directory",
            UsageError::NotADirectory => "Not a directory",
            UsageError::Closed => "I/O operation on closed file",
            UsageError::NotMounted => "Filesystem not mounted",
            UsageError::ReadOnly => "Read-only filesystem",
            UsageError::NotText => "Stream is not a text stream",
            UsageError::InvalidPath => "Invalid path",
        }
    }
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg())?;
        Ok(())
    }
}

/// Top-level error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VfsError {
    /// Raised by a device callback; fatal to the in-flight operation.
    Device(FlashIOError),
    Engine(LfsError),
    Usage(UsageError),
}

impl VfsError {
    pub fn msg(&self) -> &'static str {
        match self {
            VfsError::Device(_) => "Device error",
            VfsError::Engine(e) => e.msg(),
            VfsError::Usage(e) => e.msg(),
        }
    }

    pub fn source(&self) -> Option<&'static str> {
        match self {
            VfsError::Device(e) => Some(e.msg()),
            _ => None,
        }
    }
}

impl fmt::Display for VfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg())?;
        if let Some(src) = self.source() {
            write!(f, "\n  caused by: {src}")?;
        }
        Ok(())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for VfsError {}

// === type *Result ===

pub type LfsResult<T = ()> = Result<T, LfsError>;
pub type VfsResult<T = ()> = Result<T, VfsError>;

crate::vfs_error_wiring! {
    top => VfsError {
        FlashIOError : Device,
        LfsError     : Engine,
        UsageError   : Usage,
    },
}
