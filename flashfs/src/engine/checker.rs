// SPDX-License-Identifier: MIT

//! Consistency checker for a mounted engine.
//!
//! Storage failures abort the check; inconsistencies are collected as
//! findings so a single run reports all of them.

use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::core::bitmap::BitmapOps;
use crate::core::errors::*;
use crate::engine::Lfs;
use crate::engine::storage::LfsStorage;
use crate::engine::superblock::{SUPERBLOCK_PAIR, Slot, Superblock};
use crate::engine::tree::{DirNode, Node};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

#[derive(Clone, Debug)]
pub struct Finding {
    pub sev: Severity,
    pub code: &'static str,
    pub msg: String,
}

impl Finding {
    pub fn warn(code: &'static str, msg: impl Into<String>) -> Self {
        Self {
            sev: Severity::Warn,
            code,
            msg: msg.into(),
        }
    }

    pub fn err(code: &'static str, msg: impl Into<String>) -> Self {
        Self {
            sev: Severity::Error,
            code,
            msg: msg.into(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CheckReport {
    pub findings: Vec<Finding>,
    pub revision: u32,
    pub files: usize,
    pub dirs: usize,
    pub used_blocks: u32,
}

impl CheckReport {
    pub fn has_error(&self) -> bool {
        self.findings.iter().any(|f| f.sev == Severity::Error)
    }

    pub fn first_error(&self) -> Option<&str> {
        self.findings
            .iter()
            .find(|f| f.sev == Severity::Error)
            .map(|f| f.msg.as_str())
    }

    pub fn ok(&self) -> bool {
        !self.has_error()
    }

    pub fn push(&mut self, f: Finding) {
        self.findings.push(f)
    }
}

/// One bit per block; flags blocks claimed twice or out of range.
struct BlockTracker {
    bitmap: Vec<u8>,
    count: u32,
}

impl BlockTracker {
    fn new(count: u32) -> Self {
        Self {
            bitmap: vec![0u8; count.div_ceil(8) as usize],
            count,
        }
    }

    fn claim(&mut self, block: u32, owner: &str, rep: &mut CheckReport) {
        if block < SUPERBLOCK_PAIR.len() as u32 || block >= self.count {
            rep.push(Finding::err(
                "BLOCK_RANGE",
                format!("{owner}: block {block} outside the data area"),
            ));
        } else if self.bitmap.get_bit(block as usize) {
            rep.push(Finding::err(
                "BLOCK_SHARED",
                format!("{owner}: block {block} is referenced twice"),
            ));
        } else {
            self.bitmap.set_bit(block as usize, true);
        }
    }

    fn used(&self) -> u32 {
        self.bitmap.count_ones() as u32
    }
}

impl<S: LfsStorage> Lfs<S> {
    pub fn check(&mut self) -> LfsResult<CheckReport> {
        let mut rep = CheckReport::default();
        let (revision, slot) = {
            let state = self.state()?;
            (state.revision, state.slot)
        };
        rep.revision = revision;

        // Superblock the in-memory state came from
        let mut raw = [0u8; Superblock::SIZE];
        self.bd.read(SUPERBLOCK_PAIR[slot], 0, &mut raw)?;
        match Superblock::decode(&raw) {
            Slot::Valid(sb) => {
                let on_disk = sb.revision;
                if on_disk != revision {
                    rep.push(Finding::err(
                        "SB_REVISION",
                        format!("slot {slot} holds revision {on_disk}, expected {revision}"),
                    ));
                }
                match self.load_tree(&sb) {
                    Ok((root, _)) if root != self.state()?.root => {
                        rep.push(Finding::err("TREE_STALE", "on-flash tree differs from the mounted one"));
                    }
                    Ok(_) => {}
                    Err(LfsError::Corrupt) => {
                        rep.push(Finding::err("TREE_CORRUPT", "tree chain does not verify"));
                    }
                    Err(e) => return Err(e),
                }
            }
            Slot::Blank | Slot::Damaged => {
                rep.push(Finding::err("SB_INVALID", format!("slot {slot} does not verify")));
            }
        }

        let mut other = [0u8; Superblock::SIZE];
        self.bd.read(SUPERBLOCK_PAIR[1 - slot], 0, &mut other)?;
        if matches!(Superblock::decode(&other), Slot::Damaged) {
            rep.push(Finding::warn("SB_FALLBACK", "fallback superblock is damaged"));
        }

        let state = self.state()?;
        let mut tracker = BlockTracker::new(self.cfg.block_count);
        for block in &state.tree_blocks {
            tracker.claim(*block, "tree", &mut rep);
        }
        self.check_dir(&state.root, "", &mut tracker, &mut rep);

        let (files, dirs) = state.root.count();
        rep.files = files;
        rep.dirs = dirs;
        rep.used_blocks = tracker.used() + SUPERBLOCK_PAIR.len() as u32;
        Ok(rep)
    }

    fn check_dir(&self, dir: &DirNode, prefix: &str, tracker: &mut BlockTracker, rep: &mut CheckReport) {
        for (name, node) in &dir.entries {
            let path = format!("{prefix}/{name}");
            if name.len() > self.cfg.name_max as usize {
                rep.push(Finding::err("NAME_TOO_LONG", format!("{path}: name exceeds name_max")));
            }
            match node {
                Node::File(file) => {
                    let expected = self.cfg.blocks_for(file.size) as usize;
                    if file.blocks.len() != expected {
                        rep.push(Finding::err(
                            "FILE_BLOCKS",
                            format!(
                                "{path}: {} blocks for {} bytes, expected {expected}",
                                file.blocks.len(),
                                file.size
                            ),
                        ));
                    }
                    for block in &file.blocks {
                        tracker.claim(*block, &path, rep);
                    }
                }
                Node::Dir(sub) => self.check_dir(sub, &path, tracker, rep),
            }
        }
    }
}
