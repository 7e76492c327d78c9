//! CIDv1 over sha2-256, rendered as multibase base32.

use std::fmt;

use sha2::{Digest, Sha256};

use super::put_uvarint;

const CID_V1: u64 = 0x01;
const SHA2_256: u64 = 0x12;
const DIGEST_LEN: usize = 32;
const BASE32_LOWER: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Bare file bytes.
    Raw,
    /// Protobuf-framed UnixFS node.
    DagPb,
}

impl Codec {
    fn code(&self) -> u64 {
        match self {
            Codec::Raw => 0x55,
            Codec::DagPb => 0x70,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cid {
    codec: Codec,
    digest: [u8; DIGEST_LEN],
}

impl Cid {
    /// Hashes a block's bytes.
    pub fn of(codec: Codec, block: &[u8]) -> Self {
        Cid {
            codec,
            digest: Sha256::digest(block).into(),
        }
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Binary form: version, codec, then the multihash.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + DIGEST_LEN);
        put_uvarint(&mut buf, CID_V1);
        put_uvarint(&mut buf, self.codec.code());
        put_uvarint(&mut buf, SHA2_256);
        put_uvarint(&mut buf, DIGEST_LEN as u64);
        buf.extend_from_slice(&self.digest);
        buf
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", base32_lower(&self.to_bytes()))
    }
}

/// RFC 4648 base32, lower case, no padding.
fn base32_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8).div_ceil(5));
    let mut buffer: u16 = 0;
    let mut bits = 0;
    for &byte in bytes {
        buffer = (buffer << 8) | byte as u16;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_LOWER[((buffer >> bits) & 0x1f) as usize] as char);
        }
        buffer &= (1 << bits) - 1;
    }
    if bits > 0 {
        out.push(BASE32_LOWER[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}
