//! Streaming content digests

use ftpsync_types::{DigestAlgorithm, Error, Result};
use md5::{Digest, Md5};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Default read size for digest computation
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

enum HashState {
    Md5(Md5),
    Blake3(Box<blake3::Hasher>),
}

impl HashState {
    fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Md5 => Self::Md5(Md5::new()),
            DigestAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(hasher) => hasher.update(data),
            Self::Blake3(hasher) => {
                hasher.update(data);
            }
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Self::Md5(hasher) => format!("{:x}", hasher.finalize()),
            Self::Blake3(hasher) => hasher.finalize().to_hex().to_string(),
        }
    }
}

/// Computes lowercase hex digests of file contents, reading in fixed-size chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Digester {
    algorithm: DigestAlgorithm,
    chunk_size: usize,
}

impl Default for Digester {
    fn default() -> Self {
        Self::new(DigestAlgorithm::default(), DEFAULT_CHUNK_SIZE)
    }
}

impl Digester {
    /// Create a digester; a zero chunk size falls back to the default
    pub fn new(algorithm: DigestAlgorithm, chunk_size: usize) -> Self {
        Self {
            algorithm,
            chunk_size: if chunk_size == 0 {
                DEFAULT_CHUNK_SIZE
            } else {
                chunk_size
            },
        }
    }

    /// Algorithm in use
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Digest an in-memory buffer
    pub fn digest_bytes(&self, data: &[u8]) -> String {
        let mut state = HashState::new(self.algorithm);
        state.update(data);
        state.finalize_hex()
    }

    /// Digest a file's full content
    pub async fn digest_file(&self, path: &Path) -> Result<String> {
        let mut file = File::open(path)
            .await
            .map_err(|e| Error::local_io(path, &e))?;

        let mut state = HashState::new(self.algorithm);
        let mut buffer = vec![0u8; self.chunk_size];
        loop {
            let read = file
                .read(&mut buffer)
                .await
                .map_err(|e| Error::local_io(path, &e))?;
            if read == 0 {
                break;
            }
            state.update(&buffer[..read]);
        }

        Ok(state.finalize_hex())
    }
}
