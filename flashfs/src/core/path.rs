// SPDX-License-Identifier: MIT

//! Path helpers shared by the engine and the VFS layer.
//!
//! Paths are `/`-separated. `.` and `..` are resolved lexically and `..`
//! never climbs above the root.

use alloc::string::String;
use alloc::vec::Vec;

/// Splits a path into its components, using `/` as separator.
///
/// Returns a Vec of non-empty components.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|part| !part.is_empty()).collect()
}

/// Splits and resolves `.`/`..` components.
pub fn normalize_components(path: &str) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for part in split_path(path) {
        match part {
            "." => {}
            ".." => {
                out.pop();
            }
            name => out.push(name),
        }
    }
    out
}

/// Renders components back to an absolute path (`/` for the root).
pub fn components_to_path<S: AsRef<str>>(components: &[S]) -> String {
    if components.is_empty() {
        return String::from("/");
    }
    let mut out = String::new();
    for part in components {
        out.push('/');
        out.push_str(part.as_ref());
    }
    out
}

/// Join two path components with `/`, ensuring no duplicate slash
pub fn join_paths(base: &str, part: &str) -> String {
    let mut out = String::new();
    out.push_str(base.trim_end_matches('/'));
    out.push('/');
    out.push_str(part.trim_start_matches('/'));
    out
}

/// Anchors `path` at `cwd` unless it is already absolute.
pub fn absolute_path(cwd: &str, path: &str) -> String {
    if path.starts_with('/') {
        String::from(path)
    } else {
        join_paths(cwd, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_utils_basic() {
        let joined = join_paths("path/to/", "/dir/file.txt");
        assert_eq!(joined.as_str(), "path/to/dir/file.txt");

        let split = split_path("//path/to//file.txt/");
        assert_eq!(split.as_slice(), ["path", "to", "file.txt"]);
    }

    #[test]
    fn test_normalize_dots() {
        assert_eq!(normalize_components("/a/./b/../c").as_slice(), ["a", "c"]);
        assert_eq!(normalize_components("/../..").len(), 0);
        assert_eq!(normalize_components(".").len(), 0);
        assert_eq!(components_to_path(&normalize_components("a/b/..")), "/a");
        assert_eq!(components_to_path::<&str>(&[]), "/");
    }

    #[test]
    fn test_absolute_path() {
        assert_eq!(absolute_path("/", "x.txt"), "/x.txt");
        assert_eq!(absolute_path("/sub", "x.txt"), "/sub/x.txt");
        assert_eq!(absolute_path("/sub", "/x.txt"), "/x.txt");
    }
}
