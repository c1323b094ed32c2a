//! Chunk planning for uploads
//!
//! A [`ChunkPlan`] fixes, before the first byte is sent, how a file of a
//! given length is split and how each piece is addressed on the server.
//! Chunk names follow the ownCloud chunking scheme:
//! `<path>-chunking-<token>-<count>-<index>`.

use std::ops::Range;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Default chunk size in bytes; servers expect exactly this value
pub const CHUNK_SIZE: u64 = 1_024_000;

/// Range the per-upload session token is drawn from
pub const TOKEN_RANGE: std::ops::RangeInclusive<u32> = 1000..=9999;

/// Split of one file into fixed-size, sequentially uploaded chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPlan {
    total_len: u64,
    chunk_size: u64,
    chunk_count: u64,
    token: u32,
}

impl ChunkPlan {
    /// Plan an upload with a fresh random token
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidChunkSize`] if `chunk_size` is zero.
    pub fn new(total_len: u64, chunk_size: u64) -> Result<Self, DomainError> {
        let token = rand::thread_rng().gen_range(TOKEN_RANGE);
        Self::with_token(total_len, chunk_size, token)
    }

    /// Plan an upload with a caller-chosen token
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidChunkSize`] if `chunk_size` is zero.
    pub fn with_token(total_len: u64, chunk_size: u64, token: u32) -> Result<Self, DomainError> {
        if chunk_size == 0 {
            return Err(DomainError::InvalidChunkSize);
        }
        // An empty file still needs one (empty) request.
        let chunk_count = total_len.div_ceil(chunk_size).max(1);
        Ok(Self {
            total_len,
            chunk_size,
            chunk_count,
            token,
        })
    }

    pub fn total_len(&self) -> u64 {
        self.total_len
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    pub fn token(&self) -> u32 {
        self.token
    }

    /// Byte range covered by chunk `index`
    ///
    /// The last chunk may be shorter than `chunk_size`. Indices past the end
    /// yield an empty range at `total_len`.
    pub fn range(&self, index: u64) -> Range<u64> {
        let start = index.saturating_mul(self.chunk_size).min(self.total_len);
        let end = start.saturating_add(self.chunk_size).min(self.total_len);
        start..end
    }

    /// All chunk ranges in upload order
    pub fn ranges(&self) -> impl Iterator<Item = Range<u64>> + '_ {
        (0..self.chunk_count).map(move |index| self.range(index))
    }

    /// Suffix appended to the encoded remote path to address chunk `index`
    pub fn chunk_suffix(&self, index: u64) -> String {
        format!(
            "-chunking-{}-{}-{}",
            self.token, self.chunk_count, index
        )
    }
}
