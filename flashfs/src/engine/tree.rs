// SPDX-License-Identifier: MIT

//! In-memory directory tree and its on-flash encoding.
//!
//! Encoding (little-endian):
//! - dir:   `count:u32` then `count` entries
//! - entry: `tag:u8`, `name_len:u16`, name bytes, body
//! - file body: `size:u32`, `nblocks:u32`, `nblocks` block ids
//! - dir body:  a nested dir

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::core::errors::*;
use crate::engine::dir::FileType;

const TAG_FILE: u8 = 1;
const TAG_DIR: u8 = 2;

/// Deepest directory nesting the engine creates or accepts.
pub const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileNode {
    pub size: u32,
    pub blocks: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirNode {
    pub entries: BTreeMap<String, Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    File(FileNode),
    Dir(DirNode),
}

/// Borrowed view of a resolved path; the root has no `Node` of its own.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    File(&'a FileNode),
    Dir(&'a DirNode),
}

impl Node {
    #[inline]
    pub fn kind(&self) -> FileType {
        match self {
            Node::File(_) => FileType::Reg,
            Node::Dir(_) => FileType::Dir,
        }
    }

    #[inline]
    pub fn size(&self) -> u32 {
        match self {
            Node::File(f) => f.size,
            Node::Dir(_) => 0,
        }
    }

    #[inline]
    pub fn view(&self) -> NodeRef<'_> {
        match self {
            Node::File(f) => NodeRef::File(f),
            Node::Dir(d) => NodeRef::Dir(d),
        }
    }
}

impl NodeRef<'_> {
    #[inline]
    pub fn kind(&self) -> FileType {
        match self {
            NodeRef::File(_) => FileType::Reg,
            NodeRef::Dir(_) => FileType::Dir,
        }
    }

    #[inline]
    pub fn size(&self) -> u32 {
        match self {
            NodeRef::File(f) => f.size,
            NodeRef::Dir(_) => 0,
        }
    }
}

impl DirNode {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resolve(&self, comps: &[&str]) -> LfsResult<NodeRef<'_>> {
        let mut node = NodeRef::Dir(self);
        for name in comps {
            let NodeRef::Dir(dir) = node else {
                return Err(LfsError::NotDir);
            };
            node = dir.entries.get(*name).ok_or(LfsError::NoEnt)?.view();
        }
        Ok(node)
    }

    pub fn dir_mut(&mut self, comps: &[&str]) -> LfsResult<&mut DirNode> {
        let mut dir = self;
        for name in comps {
            dir = match dir.entries.get_mut(*name) {
                Some(Node::Dir(d)) => d,
                Some(Node::File(_)) => return Err(LfsError::NotDir),
                None => return Err(LfsError::NoEnt),
            };
        }
        Ok(dir)
    }

    /// Calls `f` for every data block referenced below this directory.
    pub fn for_each_block<F: FnMut(u32)>(&self, f: &mut F) {
        for node in self.entries.values() {
            match node {
                Node::File(file) => file.blocks.iter().copied().for_each(&mut *f),
                Node::Dir(dir) => dir.for_each_block(f),
            }
        }
    }

    /// `(files, dirs)` below this directory.
    pub fn count(&self) -> (usize, usize) {
        self.entries.values().fold((0, 0), |(files, dirs), node| match node {
            Node::File(_) => (files + 1, dirs),
            Node::Dir(dir) => {
                let (f, d) = dir.count();
                (files + f, dirs + d + 1)
            }
        })
    }

    /// Nesting levels below this directory (0 when it holds no directory).
    pub fn height(&self) -> usize {
        self.entries
            .values()
            .filter_map(|node| match node {
                Node::Dir(dir) => Some(dir.height() + 1),
                Node::File(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for (name, node) in &self.entries {
            let tag = match node {
                Node::File(_) => TAG_FILE,
                Node::Dir(_) => TAG_DIR,
            };
            out.push(tag);
            out.extend_from_slice(&(name.len() as u16).to_le_bytes());
            out.extend_from_slice(name.as_bytes());
            match node {
                Node::File(file) => {
                    out.extend_from_slice(&file.size.to_le_bytes());
                    out.extend_from_slice(&(file.blocks.len() as u32).to_le_bytes());
                    for block in &file.blocks {
                        out.extend_from_slice(&block.to_le_bytes());
                    }
                }
                Node::Dir(dir) => dir.encode_into(out),
            }
        }
    }

    pub fn decode(raw: &[u8]) -> LfsResult<Self> {
        let mut reader = Reader { raw, pos: 0 };
        let root = Self::decode_from(&mut reader, 0)?;
        ensure!(reader.pos == raw.len(), LfsError::Corrupt);
        Ok(root)
    }

    fn decode_from(reader: &mut Reader<'_>, depth: usize) -> LfsResult<Self> {
        ensure!(depth <= MAX_DEPTH, LfsError::Corrupt);
        let count = reader.u32()?;
        let mut entries = BTreeMap::new();
        for _ in 0..count {
            let tag = reader.u8()?;
            let name_len = reader.u16()? as usize;
            let name = core::str::from_utf8(reader.bytes(name_len)?).map_err(|_| LfsError::Corrupt)?;
            ensure!(!name.is_empty() && !name.contains('/'), LfsError::Corrupt);
            let node = match tag {
                TAG_FILE => {
                    let size = reader.u32()?;
                    let nblocks = reader.u32()? as usize;
                    ensure!(nblocks <= reader.remaining() / 4, LfsError::Corrupt);
                    let blocks = (0..nblocks).map(|_| reader.u32()).collect::<LfsResult<Vec<_>>>()?;
                    Node::File(FileNode { size, blocks })
                }
                TAG_DIR => Node::Dir(Self::decode_from(reader, depth + 1)?),
                _ => return Err(LfsError::Corrupt),
            };
            if entries.insert(String::from(name), node).is_some() {
                return Err(LfsError::Corrupt);
            }
        }
        Ok(DirNode { entries })
    }
}

struct Reader<'a> {
    raw: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    #[inline]
    fn remaining(&self) -> usize {
        self.raw.len() - self.pos
    }

    fn bytes(&mut self, len: usize) -> LfsResult<&'a [u8]> {
        ensure!(len <= self.remaining(), LfsError::Corrupt);
        let out = &self.raw[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn u8(&mut self) -> LfsResult<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> LfsResult<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> LfsResult<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}
