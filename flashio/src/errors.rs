// SPDX-License-Identifier: MIT

use core::fmt;

/// Result type for flash device operations.
pub type FlashIOResult<T = ()> = core::result::Result<T, FlashIOError>;

/// Error type for flash device operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashIOError {
    Other(&'static str),
    OutOfBounds,
    Unsupported,
    /// The device has no write capability (or it was disabled for a read-only mount).
    ReadOnly,
}

impl FlashIOError {
    pub fn msg(&self) -> &'static str {
        match self {
            FlashIOError::Other(msg) => msg,
            FlashIOError::OutOfBounds => "Out of bounds",
            FlashIOError::Unsupported => "Unsupported operation",
            FlashIOError::ReadOnly => "Read-only device",
        }
    }
}

impl From<&'static str> for FlashIOError {
    #[inline]
    fn from(msg: &'static str) -> Self {
        FlashIOError::Other(msg)
    }
}

impl fmt::Display for FlashIOError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg())?;
        Ok(())
    }
}
