//! UnixFS DAG construction for a directory tree.
//!
//! Files are cut into 256 KiB raw leaves and joined by balanced dag-pb file nodes of at
//! most 174 links. Leaves are recorded as file ranges and only read again when packed.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use super::cid::{Cid, Codec};
use super::put_uvarint;
use crate::error::UploadError;

pub const CHUNK_SIZE: usize = 256 * 1024;
pub const MAX_LINKS: usize = 174;

const UNIXFS_DIRECTORY: u64 = 1;
const UNIXFS_FILE: u64 = 2;

#[derive(Debug, Clone)]
pub enum BlockData {
    Inline(Vec<u8>),
    FileRange {
        path: PathBuf,
        offset: u64,
        len: usize,
    },
}

#[derive(Debug, Clone)]
pub struct Block {
    pub cid: Cid,
    pub data: BlockData,
}

impl Block {
    pub fn len(&self) -> usize {
        match &self.data {
            BlockData::Inline(bytes) => bytes.len(),
            BlockData::FileRange { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Every block of the tree, children before parents. The root is the last block.
#[derive(Debug)]
pub struct Dag {
    pub root: Cid,
    pub blocks: Vec<Block>,
    pub file_bytes: u64,
}

/// What a parent needs to link to a child.
#[derive(Debug, Clone, Copy)]
struct Linked {
    cid: Cid,
    /// Encoded size of the child and everything under it.
    tsize: u64,
    /// File content bytes under the child.
    file_size: u64,
}

struct PbLink<'a> {
    cid: Cid,
    name: Option<&'a str>,
    tsize: u64,
}

/// Builds the DAG for `dir`, wrapped in a root directory holding it as `wrap_name`.
pub fn build(dir: &Path, wrap_name: &str) -> Result<Dag, UploadError> {
    let mut builder = Builder::default();
    let mut pending: HashMap<PathBuf, Vec<(String, Linked)>> = HashMap::new();
    let mut top = None;

    let walker = WalkDir::new(dir)
        .follow_links(false)
        .contents_first(true)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            UploadError::Io {
                path,
                source: e.into(),
            }
        })?;
        let path = entry.path();
        let file_type = entry.file_type();

        let node = if file_type.is_file() {
            builder.add_file(path)?
        } else if file_type.is_dir() {
            let children = pending.remove(path).unwrap_or_default();
            builder.add_directory(children)
        } else {
            debug!("skipping {}", path.display());
            continue;
        };

        if entry.depth() == 0 {
            top = Some(node);
            continue;
        }
        let name = entry
            .file_name()
            .to_str()
            .ok_or_else(|| UploadError::InvalidName(path.to_path_buf()))?
            .to_string();
        let parent = path.parent().unwrap_or(dir).to_path_buf();
        pending.entry(parent).or_default().push((name, node));
    }

    let top = top.ok_or_else(|| UploadError::Io {
        path: dir.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "nothing to upload"),
    })?;
    let root = builder.add_directory(vec![(wrap_name.to_string(), top)]);

    debug!(
        "built dag {} with {} blocks over {} bytes",
        root.cid,
        builder.blocks.len(),
        builder.file_bytes
    );
    Ok(Dag {
        root: root.cid,
        blocks: builder.blocks,
        file_bytes: builder.file_bytes,
    })
}

#[derive(Default)]
struct Builder {
    blocks: Vec<Block>,
    file_bytes: u64,
}

impl Builder {
    fn add_file(&mut self, path: &Path) -> Result<Linked, UploadError> {
        let io_err = |source| UploadError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::open(path).map_err(io_err)?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut leaves = Vec::new();
        let mut offset = 0u64;

        loop {
            let n = read_full(&mut file, &mut buf).map_err(io_err)?;
            if n == 0 {
                break;
            }
            let cid = Cid::of(Codec::Raw, &buf[..n]);
            self.blocks.push(Block {
                cid,
                data: BlockData::FileRange {
                    path: path.to_path_buf(),
                    offset,
                    len: n,
                },
            });
            leaves.push(Linked {
                cid,
                tsize: n as u64,
                file_size: n as u64,
            });
            offset += n as u64;
            if n < CHUNK_SIZE {
                break;
            }
        }
        self.file_bytes += offset;

        Ok(match leaves.len() {
            0 => self.push_node(&[], &file_data(0, &[])),
            1 => leaves[0],
            _ => self.balance(leaves),
        })
    }

    fn balance(&mut self, mut level: Vec<Linked>) -> Linked {
        while level.len() > 1 {
            let mut parents = Vec::with_capacity(level.len().div_ceil(MAX_LINKS));
            for group in level.chunks(MAX_LINKS) {
                let links: Vec<PbLink> = group
                    .iter()
                    .map(|child| PbLink {
                        cid: child.cid,
                        name: None,
                        tsize: child.tsize,
                    })
                    .collect();
                let sizes: Vec<u64> = group.iter().map(|child| child.file_size).collect();
                let total = sizes.iter().sum();
                let mut parent = self.push_node(&links, &file_data(total, &sizes));
                parent.file_size = total;
                parents.push(parent);
            }
            level = parents;
        }
        level[0]
    }

    fn add_directory(&mut self, mut children: Vec<(String, Linked)>) -> Linked {
        children.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
        let links: Vec<PbLink> = children
            .iter()
            .map(|(name, child)| PbLink {
                cid: child.cid,
                name: Some(name),
                tsize: child.tsize,
            })
            .collect();
        let mut node = self.push_node(&links, &directory_data());
        node.file_size = children.iter().map(|(_, child)| child.file_size).sum();
        node
    }

    fn push_node(&mut self, links: &[PbLink], data: &[u8]) -> Linked {
        let bytes = encode_pb_node(links, data);
        let cid = Cid::of(Codec::DagPb, &bytes);
        let tsize = bytes.len() as u64 + links.iter().map(|l| l.tsize).sum::<u64>();
        self.blocks.push(Block {
            cid,
            data: BlockData::Inline(bytes),
        });
        Linked {
            cid,
            tsize,
            file_size: 0,
        }
    }
}

/// Reads until `buf` is full or the file ends.
pub(crate) fn read_full(file: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// dag-pb: links (field 2) precede data (field 1).
fn encode_pb_node(links: &[PbLink], data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    for link in links {
        let mut inner = Vec::new();
        put_bytes_field(&mut inner, 1, &link.cid.to_bytes());
        if let Some(name) = link.name {
            put_bytes_field(&mut inner, 2, name.as_bytes());
        }
        put_uint_field(&mut inner, 3, link.tsize);
        put_bytes_field(&mut buf, 2, &inner);
    }
    put_bytes_field(&mut buf, 1, data);
    buf
}

fn file_data(filesize: u64, blocksizes: &[u64]) -> Vec<u8> {
    let mut buf = Vec::new();
    put_uint_field(&mut buf, 1, UNIXFS_FILE);
    put_uint_field(&mut buf, 3, filesize);
    for size in blocksizes {
        put_uint_field(&mut buf, 4, *size);
    }
    buf
}

fn directory_data() -> Vec<u8> {
    let mut buf = Vec::new();
    put_uint_field(&mut buf, 1, UNIXFS_DIRECTORY);
    buf
}

fn put_uint_field(buf: &mut Vec<u8>, field: u64, value: u64) {
    put_uvarint(buf, field << 3);
    put_uvarint(buf, value);
}

fn put_bytes_field(buf: &mut Vec<u8>, field: u64, bytes: &[u8]) {
    put_uvarint(buf, (field << 3) | 2);
    put_uvarint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}
