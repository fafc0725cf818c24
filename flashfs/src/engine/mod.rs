// SPDX-License-Identifier: MIT

//! Copy-on-write flash filesystem engine.
//!
//! Layout: blocks 0 and 1 hold the superblock pair, every other block is
//! either part of the serialized directory tree (a chain of blocks, each
//! starting with the next block id) or file data. Nothing reachable from the
//! current superblock is ever rewritten in place; a commit programs the new
//! tree, then the superblock with the next revision into the other slot.

use alloc::vec;
use alloc::vec::Vec;

use log::{debug, trace, warn};
use zerocopy::IntoBytes;

use crate::core::errors::*;
use crate::core::path::normalize_components;

pub mod checker;
pub mod config;
pub mod dir;
pub mod file;
mod lookahead;
pub mod storage;
pub mod superblock;
pub mod tree;

pub use checker::{CheckReport, Finding, Severity};
pub use config::LfsConfig;
pub use dir::{FileType, Info, LfsDir};
pub use file::{LfsFile, OpenFlags, SeekWhence};
pub use storage::LfsStorage;

use lookahead::Lookahead;
use storage::CachedStorage;
use superblock::{NO_BLOCK, SUPERBLOCK_PAIR, Slot, Superblock};
use tree::{DirNode, MAX_DEPTH, Node, NodeRef};

/// Size of the `next` pointer heading every tree block.
const CHAIN_HEADER: u32 = 4;

/// Outcome of a successful [`Lfs::mount`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountStatus {
    Mounted,
    /// Neither superblock slot carries the magic: the device was never formatted.
    NoFilesystem,
}

#[derive(Debug)]
struct MountedState {
    root: DirNode,
    revision: u32,
    /// Superblock slot (0 or 1) holding `revision`.
    slot: usize,
    tree_blocks: Vec<u32>,
}

pub struct Lfs<S: LfsStorage> {
    cfg: LfsConfig,
    bd: CachedStorage<S>,
    mounted: Option<MountedState>,
    lookahead: Lookahead,
    /// Blocks allocated by the transaction in progress.
    pending: Vec<u32>,
}

impl<S: LfsStorage> Lfs<S> {
    pub fn new(cfg: LfsConfig, storage: S) -> LfsResult<Self> {
        cfg.validate()?;
        Ok(Self {
            bd: CachedStorage::new(storage, &cfg),
            lookahead: Lookahead::new(&cfg),
            cfg,
            mounted: None,
            pending: Vec::new(),
        })
    }

    #[inline]
    pub fn config(&self) -> &LfsConfig {
        &self.cfg
    }

    #[inline]
    pub fn storage(&self) -> &S {
        self.bd.inner()
    }

    #[inline]
    pub fn storage_mut(&mut self) -> &mut S {
        self.bd.inner_mut()
    }

    /// Storage error behind the last [`LfsError::Io`], if any.
    #[inline]
    pub fn take_fault(&mut self) -> Option<FlashIOError> {
        self.bd.take_fault()
    }

    #[inline]
    pub fn clear_fault(&mut self) {
        self.bd.clear_fault();
    }

    #[inline]
    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    /// Writes an empty filesystem. Leaves the engine unmounted.
    pub fn format(&mut self) -> LfsResult {
        debug!(
            "format: {} blocks of {} bytes",
            self.cfg.block_count, self.cfg.block_size
        );
        self.mounted = None;
        self.pending.clear();
        self.bd.invalidate();
        for block in SUPERBLOCK_PAIR {
            self.bd.write_block(block, &[])?;
        }

        self.lookahead.reset(0);
        // Revision 0 "lives" in slot 1, so the first commit lands in slot 0
        self.mounted = Some(MountedState {
            root: DirNode::default(),
            revision: 0,
            slot: 1,
            tree_blocks: Vec::new(),
        });
        let res = self.commit(DirNode::default());
        self.mounted = None;
        res
    }

    pub fn mount(&mut self) -> LfsResult<MountStatus> {
        self.mounted = None;
        self.bd.invalidate();

        let mut slots = [Slot::Blank; 2];
        for (slot, block) in slots.iter_mut().zip(SUPERBLOCK_PAIR) {
            let mut raw = [0u8; Superblock::SIZE];
            self.bd.read(block, 0, &mut raw)?;
            *slot = Superblock::decode(&raw);
        }

        let mut candidates: Vec<(usize, Superblock)> = slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| match slot {
                Slot::Valid(sb) => Some((idx, *sb)),
                _ => None,
            })
            .collect();
        if candidates.is_empty() {
            if slots.iter().all(|s| matches!(s, Slot::Blank)) {
                debug!("mount: no filesystem found");
                return Ok(MountStatus::NoFilesystem);
            }
            warn!("mount: no valid superblock");
            return Err(LfsError::Corrupt);
        }
        if candidates.len() == 2 && candidates[1].1.is_newer_than(&candidates[0].1) {
            candidates.swap(0, 1);
        }

        for (slot, sb) in candidates {
            let revision = sb.revision;
            if !sb.matches(&self.cfg) {
                warn!("mount: superblock {slot} was formatted with another geometry");
                return Err(LfsError::Inval);
            }
            match self.load_tree(&sb) {
                Ok((root, tree_blocks)) => {
                    debug!("mount: revision {revision} from slot {slot}");
                    self.lookahead.reset(revision);
                    self.mounted = Some(MountedState { root, revision, slot, tree_blocks });
                    return Ok(MountStatus::Mounted);
                }
                Err(LfsError::Corrupt) => {
                    warn!("mount: revision {revision} in slot {slot} has a damaged tree");
                }
                Err(e) => return Err(e),
            }
        }
        Err(LfsError::Corrupt)
    }

    pub fn unmount(&mut self) -> LfsResult {
        if self.mounted.take().is_some() {
            debug!("unmount");
        }
        self.pending.clear();
        self.bd.sync()
    }

    /// Blocks in use: the superblock pair, the tree chain and all file data.
    pub fn fs_size(&self) -> LfsResult<u32> {
        let state = self.state()?;
        let mut used = SUPERBLOCK_PAIR.len() as u32 + state.tree_blocks.len() as u32;
        state.root.for_each_block(&mut |_| used += 1);
        Ok(used)
    }

    pub fn stat(&self, path: &str) -> LfsResult<Info> {
        let comps = normalize_components(path);
        let node = self.state()?.root.resolve(&comps)?;
        Ok(Info {
            kind: node.kind(),
            size: node.size(),
            name: comps.last().map_or_else(|| "/".into(), |name| (*name).into()),
        })
    }

    pub fn mkdir(&mut self, path: &str) -> LfsResult {
        let comps = normalize_components(path);
        let Some((name, parent)) = comps.split_last() else {
            return Err(LfsError::Exist);
        };
        ensure!(name.len() <= self.cfg.name_max as usize, LfsError::NameTooLong);
        ensure!(comps.len() <= MAX_DEPTH, LfsError::Inval);
        trace!("mkdir {path}");
        self.update(|root| {
            let dir = root.dir_mut(parent)?;
            ensure!(!dir.entries.contains_key(*name), LfsError::Exist);
            dir.entries.insert((*name).into(), Node::Dir(DirNode::default()));
            Ok(())
        })
    }

    /// Removes a file or an empty directory.
    pub fn remove(&mut self, path: &str) -> LfsResult {
        let comps = normalize_components(path);
        let Some((name, parent)) = comps.split_last() else {
            return Err(LfsError::Inval);
        };
        trace!("remove {path}");
        self.update(|root| {
            let dir = root.dir_mut(parent)?;
            match dir.entries.get(*name) {
                None => return Err(LfsError::NoEnt),
                Some(Node::Dir(sub)) if !sub.is_empty() => return Err(LfsError::NotEmpty),
                Some(_) => {}
            }
            dir.entries.remove(*name);
            Ok(())
        })
    }

    /// Atomically moves `old` to `new`, replacing a compatible target.
    pub fn rename(&mut self, old: &str, new: &str) -> LfsResult {
        let from = normalize_components(old);
        let to = normalize_components(new);
        let (Some((old_name, old_parent)), Some((new_name, new_parent))) = (from.split_last(), to.split_last())
        else {
            return Err(LfsError::Inval);
        };

        let state = self.state()?;
        let source = state.root.resolve(&from)?;
        if from == to {
            return Ok(());
        }
        // A directory cannot move below itself
        ensure!(!to.starts_with(&from), LfsError::Inval);
        ensure!(new_name.len() <= self.cfg.name_max as usize, LfsError::NameTooLong);
        if let NodeRef::Dir(dir) = source {
            ensure!(new_parent.len() + 1 + dir.height() <= MAX_DEPTH, LfsError::Inval);
        }
        match (source, state.root.resolve(&to)) {
            (_, Err(LfsError::NoEnt)) => {}
            (_, Err(e)) => return Err(e),
            (NodeRef::Dir(_), Ok(NodeRef::File(_))) => return Err(LfsError::NotDir),
            (NodeRef::File(_), Ok(NodeRef::Dir(_))) => return Err(LfsError::IsDir),
            (NodeRef::Dir(_), Ok(NodeRef::Dir(target))) if !target.is_empty() => {
                return Err(LfsError::NotEmpty);
            }
            _ => {}
        }

        trace!("rename {old} -> {new}");
        self.update(|root| {
            root.dir_mut(new_parent)?;
            let node = root
                .dir_mut(old_parent)?
                .entries
                .remove(*old_name)
                .ok_or(LfsError::NoEnt)?;
            root.dir_mut(new_parent)?.entries.insert((*new_name).into(), node);
            Ok(())
        })
    }

    // === internals ===

    fn state(&self) -> LfsResult<&MountedState> {
        self.mounted.as_ref().ok_or(LfsError::Inval)
    }

    /// Applies `f` to a copy of the tree and commits the result.
    fn update<F>(&mut self, f: F) -> LfsResult
    where
        F: FnOnce(&mut DirNode) -> LfsResult,
    {
        let mut root = self.state()?.root.clone();
        f(&mut root)?;
        self.commit(root)
    }

    fn commit(&mut self, root: DirNode) -> LfsResult {
        let res = self.try_commit(root);
        self.end_transaction(res.is_ok());
        res
    }

    fn end_transaction(&mut self, committed: bool) {
        if !committed && !self.pending.is_empty() {
            self.lookahead.drop_window();
        }
        self.pending.clear();
    }

    fn try_commit(&mut self, root: DirNode) -> LfsResult {
        let (revision, slot) = {
            let state = self.state()?;
            (state.revision.wrapping_add(1), 1 - state.slot)
        };

        let raw = root.encode();
        let tree_crc = crc32fast::hash(&raw);
        let tree_blocks = self.write_chain(&raw)?;

        let sb = Superblock::new(&self.cfg, revision, tree_blocks[0], raw.len() as u32, tree_crc);
        self.bd.write_block(SUPERBLOCK_PAIR[slot], sb.as_bytes())?;
        self.bd.sync()?;
        trace!("commit revision {revision} to slot {slot}, tree {} bytes", raw.len());

        let state = self.mounted.as_mut().ok_or(LfsError::Inval)?;
        state.root = root;
        state.revision = revision;
        state.slot = slot;
        state.tree_blocks = tree_blocks;
        self.lookahead.ack();
        Ok(())
    }

    fn write_chain(&mut self, raw: &[u8]) -> LfsResult<Vec<u32>> {
        let payload = (self.cfg.block_size - CHAIN_HEADER) as usize;
        let count = raw.len().div_ceil(payload).max(1);
        let blocks = (0..count).map(|_| self.alloc()).collect::<LfsResult<Vec<_>>>()?;

        let mut buf = vec![0u8; self.cfg.block_size as usize];
        for (i, chunk) in raw.chunks(payload).enumerate() {
            let next = blocks.get(i + 1).copied().unwrap_or(NO_BLOCK);
            buf[..CHAIN_HEADER as usize].copy_from_slice(&next.to_le_bytes());
            buf[CHAIN_HEADER as usize..CHAIN_HEADER as usize + chunk.len()].copy_from_slice(chunk);
            self.bd.write_block(blocks[i], &buf[..CHAIN_HEADER as usize + chunk.len()])?;
        }
        Ok(blocks)
    }

    fn load_tree(&mut self, sb: &Superblock) -> LfsResult<(DirNode, Vec<u32>)> {
        let (mut block, len, crc) = (sb.tree_head, sb.tree_len as usize, sb.tree_crc);
        let payload = (self.cfg.block_size - CHAIN_HEADER) as usize;
        let mut raw = vec![0u8; len];
        let mut blocks = Vec::new();
        let mut done = 0usize;

        loop {
            let valid = (SUPERBLOCK_PAIR.len() as u32..self.cfg.block_count).contains(&block);
            ensure!(valid && blocks.len() < self.cfg.block_count as usize, LfsError::Corrupt);
            blocks.push(block);

            let mut next = [0u8; CHAIN_HEADER as usize];
            self.bd.read(block, 0, &mut next)?;
            let n = payload.min(len - done);
            self.bd.read(block, CHAIN_HEADER, &mut raw[done..done + n])?;
            done += n;
            if done == len {
                break;
            }
            block = u32::from_le_bytes(next);
        }

        ensure!(crc32fast::hash(&raw) == crc, LfsError::Corrupt);
        Ok((DirNode::decode(&raw)?, blocks))
    }

    fn alloc(&mut self) -> LfsResult<u32> {
        loop {
            if let Some(block) = self.lookahead.take() {
                self.pending.push(block);
                return Ok(block);
            }
            if !self.lookahead.advance() {
                warn!("alloc: no free block left");
                return Err(LfsError::NoSpc);
            }
            self.populate_lookahead()?;
        }
    }

    /// Marks every block the committed revision or the current transaction uses.
    fn populate_lookahead(&mut self) -> LfsResult {
        let state = self.mounted.as_ref().ok_or(LfsError::Inval)?;
        let lookahead = &mut self.lookahead;
        for block in SUPERBLOCK_PAIR
            .iter()
            .chain(&state.tree_blocks)
            .chain(&self.pending)
        {
            lookahead.mark_used(*block);
        }
        state.root.for_each_block(&mut |block| lookahead.mark_used(block));
        Ok(())
    }
}
