// SPDX-License-Identifier: MIT

//! Open files.
//!
//! Reads go straight to the committed blocks until the first write; from
//! then on the whole content is buffered and the touched block indices are
//! tracked. A sync copies only those blocks into fresh ones and commits the
//! new block list, so the previous content survives an interrupted sync.

use alloc::collections::BTreeSet;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use bitflags::bitflags;
use log::{trace, warn};

use crate::core::errors::*;
use crate::core::path::{components_to_path, normalize_components};
use crate::engine::storage::LfsStorage;
use crate::engine::superblock::SUPERBLOCK_PAIR;
use crate::engine::tree::{FileNode, Node, NodeRef};
use crate::engine::Lfs;

bitflags! {
    /// Access flags, with the engine's native values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u32 {
        const RDONLY = 0x0001;
        const WRONLY = 0x0002;
        const RDWR   = 0x0003;
        const CREAT  = 0x0100;
        const EXCL   = 0x0200;
        const TRUNC  = 0x0400;
        const APPEND = 0x0800;
    }
}

impl OpenFlags {
    #[inline]
    pub fn readable(self) -> bool {
        self.contains(OpenFlags::RDONLY)
    }

    #[inline]
    pub fn writable(self) -> bool {
        self.contains(OpenFlags::WRONLY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekWhence {
    Set,
    Cur,
    End,
}

#[derive(Debug)]
pub struct LfsFile {
    path: Vec<String>,
    flags: OpenFlags,
    pos: u32,
    size: u32,
    /// Blocks of the last committed content.
    blocks: Vec<u32>,
    buffer: Option<Vec<u8>>,
    dirty: BTreeSet<u32>,
    modified: bool,
}

impl LfsFile {
    #[inline]
    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    pub fn path(&self) -> String {
        components_to_path(&self.path)
    }
}

impl<S: LfsStorage> Lfs<S> {
    pub fn file_open(&mut self, path: &str, flags: OpenFlags) -> LfsResult<LfsFile> {
        let comps: Vec<String> = normalize_components(path).into_iter().map(String::from).collect();
        let refs: Vec<&str> = comps.iter().map(String::as_str).collect();
        let Some((name, parent)) = refs.split_last() else {
            return Err(LfsError::IsDir);
        };

        let existing = {
            let NodeRef::Dir(dir) = self.state()?.root.resolve(parent)? else {
                return Err(LfsError::NotDir);
            };
            match dir.entries.get(*name) {
                Some(Node::Dir(_)) => return Err(LfsError::IsDir),
                Some(Node::File(file)) => Some(file.clone()),
                None => None,
            }
        };

        let node = match existing {
            Some(node) => {
                ensure!(
                    !flags.contains(OpenFlags::CREAT | OpenFlags::EXCL),
                    LfsError::Exist
                );
                node
            }
            None => {
                ensure!(flags.contains(OpenFlags::CREAT), LfsError::NoEnt);
                ensure!(name.len() <= self.cfg.name_max as usize, LfsError::NameTooLong);
                trace!("create file {path}");
                self.update(|root| {
                    root.dir_mut(parent)?
                        .entries
                        .insert(String::from(*name), Node::File(FileNode::default()));
                    Ok(())
                })?;
                FileNode::default()
            }
        };

        let mut file = LfsFile {
            path: comps,
            flags,
            pos: 0,
            size: node.size,
            blocks: node.blocks,
            buffer: None,
            dirty: BTreeSet::new(),
            modified: false,
        };
        if flags.contains(OpenFlags::TRUNC) && flags.writable() && file.size > 0 {
            file.size = 0;
            file.buffer = Some(Vec::new());
            file.modified = true;
        }
        Ok(file)
    }

    pub fn file_read(&mut self, file: &mut LfsFile, buf: &mut [u8]) -> LfsResult<usize> {
        ensure!(file.flags.readable(), LfsError::BadF);
        self.state()?;
        if file.pos >= file.size || buf.is_empty() {
            return Ok(0);
        }

        let n = buf.len().min((file.size - file.pos) as usize);
        match &file.buffer {
            Some(data) => {
                let pos = file.pos as usize;
                buf[..n].copy_from_slice(&data[pos..pos + n]);
            }
            None => self.read_blocks(&file.blocks, file.pos, &mut buf[..n])?,
        }
        file.pos += n as u32;
        Ok(n)
    }

    pub fn file_write(&mut self, file: &mut LfsFile, data: &[u8]) -> LfsResult<usize> {
        ensure!(file.flags.writable(), LfsError::BadF);
        self.state()?;
        if file.flags.contains(OpenFlags::APPEND) {
            file.pos = file.size;
        }
        if data.is_empty() {
            return Ok(0);
        }

        let end = file.pos as u64 + data.len() as u64;
        ensure!(end <= self.cfg.file_max as u64, LfsError::FBig);
        // The buffered content must fit next to the superblocks and the tree
        let reserved = SUPERBLOCK_PAIR.len() as u32 + self.state()?.tree_blocks.len() as u32;
        let capacity = self.cfg.block_count.saturating_sub(reserved);
        if self.cfg.blocks_for(end as u32) > capacity {
            warn!("write: {end} bytes cannot fit in {capacity} blocks");
            return Err(LfsError::NoSpc);
        }
        self.load_buffer(file)?;

        let block_size = self.cfg.block_size as usize;
        let (pos, end) = (file.pos as usize, end as usize);
        let buffer = file.buffer.get_or_insert_with(Vec::new);
        let old_len = buffer.len();
        if old_len < end {
            buffer.resize(end, 0);
        }
        buffer[pos..end].copy_from_slice(data);

        // Zero-filled gaps count as written too
        for idx in old_len.min(pos) / block_size..=(end - 1) / block_size {
            file.dirty.insert(idx as u32);
        }
        file.size = buffer.len() as u32;
        file.pos = end as u32;
        file.modified = true;
        Ok(data.len())
    }

    pub fn file_seek(&mut self, file: &mut LfsFile, offset: i64, whence: SeekWhence) -> LfsResult<u32> {
        self.state()?;
        let base = match whence {
            SeekWhence::Set => 0,
            SeekWhence::Cur => file.pos as i64,
            SeekWhence::End => file.size as i64,
        };
        let target = base.checked_add(offset).ok_or(LfsError::Inval)?;
        ensure!(target >= 0 && target <= self.cfg.file_max as i64, LfsError::Inval);
        file.pos = target as u32;
        Ok(file.pos)
    }

    pub fn file_tell(&self, file: &LfsFile) -> LfsResult<u32> {
        self.state()?;
        Ok(file.pos)
    }

    pub fn file_size(&self, file: &LfsFile) -> LfsResult<u32> {
        self.state()?;
        Ok(file.size)
    }

    /// Commits buffered changes; a no-op for clean files.
    pub fn file_sync(&mut self, file: &mut LfsFile) -> LfsResult {
        if !file.modified {
            return Ok(());
        }
        self.state()?;
        let res = self.flush_file(file);
        self.end_transaction(res.is_ok());
        res
    }

    pub fn file_close(&mut self, mut file: LfsFile) -> LfsResult {
        self.file_sync(&mut file)
    }

    fn load_buffer(&mut self, file: &mut LfsFile) -> LfsResult {
        if file.buffer.is_some() {
            return Ok(());
        }
        let mut data = vec![0u8; file.size as usize];
        self.read_blocks(&file.blocks, 0, &mut data)?;
        file.buffer = Some(data);
        Ok(())
    }

    fn read_blocks(&mut self, blocks: &[u32], mut pos: u32, out: &mut [u8]) -> LfsResult {
        let block_size = self.cfg.block_size;
        let mut done = 0usize;
        while done < out.len() {
            let off = pos % block_size;
            let n = ((block_size - off) as usize).min(out.len() - done);
            let block = *blocks.get((pos / block_size) as usize).ok_or(LfsError::Corrupt)?;
            self.bd.read(block, off, &mut out[done..done + n])?;
            done += n;
            pos += n as u32;
        }
        Ok(())
    }

    fn flush_file(&mut self, file: &mut LfsFile) -> LfsResult {
        let block_size = self.cfg.block_size as usize;
        let buffer = file.buffer.as_deref().ok_or(LfsError::BadF)?;
        let nblocks = self.cfg.blocks_for(file.size) as usize;

        let mut blocks = Vec::with_capacity(nblocks);
        for idx in 0..nblocks {
            match file.blocks.get(idx) {
                Some(&block) if !file.dirty.contains(&(idx as u32)) => blocks.push(block),
                _ => {
                    let block = self.alloc()?;
                    let start = idx * block_size;
                    let end = (start + block_size).min(buffer.len());
                    self.bd.write_block(block, &buffer[start..end])?;
                    blocks.push(block);
                }
            }
        }
        trace!("sync {} size={} blocks={:?}", file.path(), file.size, blocks);

        let refs: Vec<&str> = file.path.iter().map(String::as_str).collect();
        let (name, parent) = refs.split_last().ok_or(LfsError::Inval)?;
        let node = FileNode { size: file.size, blocks: blocks.clone() };
        self.update(|root| match root.dir_mut(parent)?.entries.get_mut(*name) {
            Some(Node::File(entry)) => {
                *entry = node;
                Ok(())
            }
            Some(Node::Dir(_)) => Err(LfsError::IsDir),
            None => Err(LfsError::NoEnt),
        })?;

        file.blocks = blocks;
        file.dirty.clear();
        file.modified = false;
        file.buffer = None;
        Ok(())
    }
}
