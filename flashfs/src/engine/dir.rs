// SPDX-License-Identifier: MIT

use alloc::string::String;
use alloc::vec::Vec;

use crate::core::errors::*;
use crate::core::path::normalize_components;
use crate::engine::storage::LfsStorage;
use crate::engine::tree::NodeRef;
use crate::engine::Lfs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Reg,
    Dir,
}

/// Entry metadata as reported by `stat` and directory reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    pub kind: FileType,
    pub size: u32,
    pub name: String,
}

/// Open directory: a snapshot of the listing taken at open time.
#[derive(Debug)]
pub struct LfsDir {
    entries: Vec<Info>,
    pos: usize,
}

impl<S: LfsStorage> Lfs<S> {
    pub fn dir_open(&mut self, path: &str) -> LfsResult<LfsDir> {
        let state = self.state()?;
        let comps = normalize_components(path);
        let NodeRef::Dir(dir) = state.root.resolve(&comps)? else {
            return Err(LfsError::NotDir);
        };

        let mut entries = Vec::with_capacity(dir.entries.len() + 2);
        for dot in [".", ".."] {
            entries.push(Info { kind: FileType::Dir, size: 0, name: String::from(dot) });
        }
        entries.extend(dir.entries.iter().map(|(name, node)| Info {
            kind: node.kind(),
            size: node.size(),
            name: name.clone(),
        }));
        Ok(LfsDir { entries, pos: 0 })
    }

    /// Next entry, or `None` at the end of the listing.
    pub fn dir_read(&mut self, dir: &mut LfsDir) -> LfsResult<Option<Info>> {
        ensure!(self.is_mounted(), LfsError::BadF);
        let info = dir.entries.get(dir.pos).cloned();
        if info.is_some() {
            dir.pos += 1;
        }
        Ok(info)
    }

    pub fn dir_close(&mut self, dir: LfsDir) -> LfsResult {
        drop(dir);
        Ok(())
    }
}
