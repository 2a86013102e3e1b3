//! File digests for AniDB lookups
//!
//! AniDB identifies files by size and ED2K hash. The hashing service is a
//! trait so that tests and other front-ends can supply precomputed digests.

use async_trait::async_trait;
use log::debug;
use md4::{Digest, Md4};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::Result;
use crate::error::{InternalError, IoError};

/// ED2K chunk size (9.5 MiB in AniDB's reckoning)
pub const ED2K_CHUNK_SIZE: usize = 9_728_000;

/// Read size used while streaming a file
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Size and ED2K digest of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDigest {
    pub size: u64,
    /// Lower-case hex
    pub ed2k: String,
}

/// Computes the digest AniDB needs to look a file up
#[async_trait]
pub trait HashService: Send + Sync {
    async fn digest(&self, path: &Path) -> Result<FileDigest>;
}

/// Streaming ED2K hasher
///
/// Files are split into `ED2K_CHUNK_SIZE` chunks, each hashed with MD4. A file
/// of one chunk or less hashes to that chunk's MD4; otherwise the result is the
/// MD4 of the concatenated chunk digests. A size that is an exact multiple of
/// the chunk size gets the digest of an empty trailing chunk appended.
pub struct Ed2kHasher {
    current: Md4,
    current_len: usize,
    chunk_hashes: Vec<u8>,
    total: u64,
}

impl Default for Ed2kHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Ed2kHasher {
    pub fn new() -> Self {
        Self {
            current: Md4::new(),
            current_len: 0,
            chunk_hashes: Vec::new(),
            total: 0,
        }
    }

    fn finish_chunk(&mut self) {
        let chunk = std::mem::take(&mut self.current);
        self.chunk_hashes.extend_from_slice(&chunk.finalize());
        self.current_len = 0;
    }

    pub fn update(&mut self, mut data: &[u8]) {
        self.total += data.len() as u64;
        while !data.is_empty() {
            let take = data.len().min(ED2K_CHUNK_SIZE - self.current_len);
            self.current.update(&data[..take]);
            self.current_len += take;
            data = &data[take..];
            if self.current_len == ED2K_CHUNK_SIZE {
                self.finish_chunk();
            }
        }
    }

    /// Bytes hashed so far
    pub fn len(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn finalize(mut self) -> String {
        if self.chunk_hashes.is_empty() {
            return hex(&self.current.finalize());
        }
        // Trailing partial chunk, or the empty chunk of an exact multiple
        self.finish_chunk();
        hex(&Md4::digest(&self.chunk_hashes))
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// ED2K digest of an in-memory buffer
pub fn ed2k_bytes(data: &[u8]) -> String {
    let mut hasher = Ed2kHasher::new();
    hasher.update(data);
    hasher.finalize()
}

fn digest_file(path: &Path) -> Result<FileDigest> {
    let file = File::open(path).map_err(|e| IoError::from_std(e).with_path(path))?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    let mut hasher = Ed2kHasher::new();
    loop {
        let read = reader
            .read(&mut buffer)
            .map_err(|e| IoError::from_std(e).with_path(path))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(FileDigest {
        size: hasher.len(),
        ed2k: hasher.finalize(),
    })
}

/// Default hashing service; reads on the blocking pool
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed2kHashService;

#[async_trait]
impl HashService for Ed2kHashService {
    async fn digest(&self, path: &Path) -> Result<FileDigest> {
        let owned: PathBuf = path.to_path_buf();
        debug!("Hashing {}", owned.display());
        tokio::task::spawn_blocking(move || digest_file(&owned))
            .await
            .map_err(|e| InternalError::hashing(e.to_string()))?
    }
}
