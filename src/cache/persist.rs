//! On-disk snapshot of a transposition cache, for warm starts.
//!
//! Layout (little-endian):
//! `magic(4) version(1) capacity(u64) salts(u32)`, then `capacity` blocks of
//! `sign(u64) data(u64)`, then `salts` salt words, then a CRC32C of all
//! preceding bytes.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::AtomicU64;

use log::{info, warn};

use super::{Block, TranspositionCache};

const MAGIC: &[u8; 4] = b"TDC1";
const VERSION: u8 = 1;
const HEADER_LEN: usize = 4 + 1 + 8 + 4;

#[derive(thiserror::Error, Debug)]
pub enum CacheIoError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid magic or version")]
    MagicOrVersion,
    #[error("file too short or malformed")]
    Malformed,
    #[error("checksum mismatch")]
    Checksum,
    #[error("capacity {0} is not a power of two or salt table is empty")]
    Geometry(u64),
}

#[inline]
fn read_u32_le(bytes: &[u8]) -> Option<u32> {
    Some(u32::from_le_bytes(bytes.get(..4)?.try_into().ok()?))
}

#[inline]
fn read_u64_le(bytes: &[u8]) -> Option<u64> {
    Some(u64::from_le_bytes(bytes.get(..8)?.try_into().ok()?))
}

impl TranspositionCache {
    /// Serialize the cache. Concurrent writers may leave torn slots in the
    /// snapshot; those fail the signature check after loading like any other.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.blocks.len() * 16 + self.salts.len() * 8 + 4);
        buf.extend_from_slice(MAGIC);
        buf.push(VERSION);
        buf.extend_from_slice(&(self.blocks.len() as u64).to_le_bytes());
        buf.extend_from_slice(&(self.salts.len() as u32).to_le_bytes());
        for block in self.blocks.iter() {
            let (sign, data) = block.load();
            buf.extend_from_slice(&sign.to_le_bytes());
            buf.extend_from_slice(&data.to_le_bytes());
        }
        for salt in self.salts.iter() {
            buf.extend_from_slice(&salt.to_le_bytes());
        }
        let checksum = crc32c::crc32c(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CacheIoError> {
        if bytes.len() < HEADER_LEN + 4 {
            return Err(CacheIoError::Malformed);
        }
        let (content, trailer) = bytes.split_at(bytes.len() - 4);
        let file_crc = read_u32_le(trailer).ok_or(CacheIoError::Malformed)?;
        if file_crc != crc32c::crc32c(content) {
            return Err(CacheIoError::Checksum);
        }
        if &content[..4] != MAGIC || content[4] != VERSION {
            return Err(CacheIoError::MagicOrVersion);
        }

        let capacity = read_u64_le(&content[5..]).ok_or(CacheIoError::Malformed)?;
        let salt_count = read_u32_le(&content[13..]).ok_or(CacheIoError::Malformed)? as usize;
        if !capacity.is_power_of_two() || salt_count == 0 {
            return Err(CacheIoError::Geometry(capacity));
        }
        let capacity = usize::try_from(capacity).map_err(|_| CacheIoError::Geometry(capacity))?;
        let blocks_len = capacity.checked_mul(16).ok_or(CacheIoError::Malformed)?;
        let expected = HEADER_LEN
            .checked_add(blocks_len)
            .and_then(|n| n.checked_add(salt_count * 8))
            .ok_or(CacheIoError::Malformed)?;
        if content.len() != expected {
            return Err(CacheIoError::Malformed);
        }

        let body = &content[HEADER_LEN..];
        let blocks: Vec<Block> = body[..blocks_len]
            .chunks_exact(16)
            .map(|chunk| Block {
                sign: AtomicU64::new(read_u64_le(chunk).unwrap_or(0)),
                data: AtomicU64::new(read_u64_le(&chunk[8..]).unwrap_or(0)),
            })
            .collect();
        let salts: Vec<u64> = body[blocks_len..].chunks_exact(8).filter_map(read_u64_le).collect();

        Ok(Self::from_parts(blocks.into_boxed_slice(), salts.into_boxed_slice()))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CacheIoError> {
        let data = self.encode();
        let mut f = BufWriter::new(fs::File::create(path.as_ref())?);
        f.write_all(&data)?;
        f.flush()?;
        info!("transposition cache saved to {} ({} bytes)", path.as_ref().display(), data.len());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CacheIoError> {
        let data = fs::read(path.as_ref())?;
        match Self::decode(&data) {
            Ok(cache) => {
                info!("transposition cache loaded from {} ({} slots)", path.as_ref().display(), cache.capacity());
                Ok(cache)
            }
            Err(e) => {
                warn!("rejected transposition cache {}: {e}", path.as_ref().display());
                Err(e)
            }
        }
    }
}
