//! CARv1 packing. Every chunk is a standalone CAR naming the same root.

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::ops::Range;

use super::cid::Cid;
use super::dag::{read_full, Block, BlockData};
use super::{put_uvarint, uvarint_len};
use crate::error::UploadError;

const CID_LEN: usize = 36;

/// `{"roots": [root], "version": 1}` as dag-cbor, varint length prefixed.
pub fn header(root: &Cid) -> Vec<u8> {
    let cid = root.to_bytes();
    let mut cbor = Vec::with_capacity(64);
    cbor.push(0xa2); // map(2)
    cbor.push(0x65); // text(5)
    cbor.extend_from_slice(b"roots");
    cbor.push(0x81); // array(1)
    cbor.extend_from_slice(&[0xd8, 0x2a]); // tag(42)
    put_cbor_bytes_len(&mut cbor, cid.len() + 1);
    cbor.push(0x00); // identity multibase prefix
    cbor.extend_from_slice(&cid);
    cbor.push(0x67); // text(7)
    cbor.extend_from_slice(b"version");
    cbor.push(0x01);

    let mut out = Vec::with_capacity(cbor.len() + 2);
    put_uvarint(&mut out, cbor.len() as u64);
    out.extend_from_slice(&cbor);
    out
}

fn put_cbor_bytes_len(buf: &mut Vec<u8>, len: usize) {
    match len {
        0..=23 => buf.push(0x40 | len as u8),
        24..=0xff => buf.extend_from_slice(&[0x58, len as u8]),
        _ => {
            buf.push(0x59);
            buf.extend_from_slice(&(len as u16).to_be_bytes());
        }
    }
}

/// Size of one block's section: length prefix, CID, data.
pub fn section_len(block: &Block) -> usize {
    let body = CID_LEN + block.len();
    uvarint_len(body as u64) + body
}

/// Splits `blocks` into runs whose CAR encoding stays within `target` bytes. A block too
/// large for any chunk is sent on its own.
pub fn plan(blocks: &[Block], header_len: usize, target: usize) -> Vec<Range<usize>> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut size = header_len;

    for (i, block) in blocks.iter().enumerate() {
        let section = section_len(block);
        if i > start && size + section > target {
            chunks.push(start..i);
            start = i;
            size = header_len;
        }
        size += section;
    }
    if start < blocks.len() {
        chunks.push(start..blocks.len());
    }
    chunks
}

/// Encoded size of a planned chunk.
pub fn chunk_len(blocks: &[Block], header_len: usize) -> usize {
    header_len + blocks.iter().map(section_len).sum::<usize>()
}

/// Writes one CAR. File-backed blocks are re-read and must still hash to their CID.
pub fn write_chunk(header: &[u8], blocks: &[Block]) -> Result<Vec<u8>, UploadError> {
    let mut out = Vec::with_capacity(chunk_len(blocks, header.len()));
    out.extend_from_slice(header);

    for block in blocks {
        let cid = block.cid.to_bytes();
        put_uvarint(&mut out, (cid.len() + block.len()) as u64);
        out.extend_from_slice(&cid);

        match &block.data {
            BlockData::Inline(bytes) => out.extend_from_slice(bytes),
            BlockData::FileRange { path, offset, len } => {
                let io_err = |source| UploadError::Io {
                    path: path.clone(),
                    source,
                };
                let mut file = File::open(path).map_err(io_err)?;
                file.seek(SeekFrom::Start(*offset)).map_err(io_err)?;

                let at = out.len();
                out.resize(at + len, 0);
                let read = read_full(&mut file, &mut out[at..]).map_err(io_err)?;
                if read != *len || Cid::of(block.cid.codec(), &out[at..]) != block.cid {
                    return Err(UploadError::FileChanged(path.clone()));
                }
            }
        }
    }
    Ok(out)
}
