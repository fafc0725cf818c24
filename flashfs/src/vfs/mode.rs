// SPDX-License-Identifier: MIT

//! Open-mode strings (`"r"`, `"wb"`, `"a+"`...).

use log::trace;

use crate::engine::OpenFlags;

/// How returned buffers are meant to be interpreted. Text mode does no
/// transcoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamKind {
    Binary,
    #[default]
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMode {
    pub flags: OpenFlags,
    pub kind: StreamKind,
}

impl OpenMode {
    /// Parses left to right; a later character overrides the access set by
    /// an earlier one. Unknown characters are ignored, an empty string means
    /// `"r"`.
    pub fn parse(mode: &str) -> Self {
        let mut flags = OpenFlags::RDONLY;
        let mut kind = StreamKind::default();
        for c in mode.chars() {
            match c {
                'r' => flags = OpenFlags::RDONLY,
                'w' => flags = OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::TRUNC,
                'x' => flags = OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::EXCL,
                'a' => flags = OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::APPEND,
                '+' => flags |= OpenFlags::RDWR,
                'b' => kind = StreamKind::Binary,
                't' => kind = StreamKind::Text,
                other => trace!("open mode: ignoring {other:?}"),
            }
        }
        Self { flags, kind }
    }

    #[inline]
    pub fn readable(&self) -> bool {
        self.flags.readable()
    }

    #[inline]
    pub fn writable(&self) -> bool {
        self.flags.writable()
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        self.kind == StreamKind::Text
    }
}

impl Default for OpenMode {
    fn default() -> Self {
        Self::parse("r")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_table() {
        let cases = [
            ("r", OpenFlags::RDONLY),
            ("w", OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::TRUNC),
            ("x", OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::EXCL),
            ("a", OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::APPEND),
            ("r+", OpenFlags::RDWR),
            ("w+", OpenFlags::RDWR | OpenFlags::CREAT | OpenFlags::TRUNC),
            ("a+", OpenFlags::RDWR | OpenFlags::CREAT | OpenFlags::APPEND),
            ("", OpenFlags::RDONLY),
        ];
        for (mode, flags) in cases {
            assert_eq!(OpenMode::parse(mode).flags, flags, "mode {mode:?}");
        }
    }

    #[test]
    fn test_later_characters_win() {
        assert_eq!(OpenMode::parse("wr").flags, OpenFlags::RDONLY);
        assert_eq!(
            OpenMode::parse("+w").flags,
            OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::TRUNC
        );
        assert_eq!(OpenMode::parse("bt").kind, StreamKind::Text);
        assert_eq!(OpenMode::parse("tb").kind, StreamKind::Binary);
    }

    #[test]
    fn test_kind_and_unknown_chars() {
        let mode = OpenMode::parse("rbQ");
        assert_eq!(mode.kind, StreamKind::Binary);
        assert!(mode.readable());
        assert!(!mode.writable());
        assert!(OpenMode::parse("z").is_text());
        assert_eq!(OpenMode::default().flags, OpenFlags::RDONLY);
    }
}
