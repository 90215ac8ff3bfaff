//! Content addressing of photo bytes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Digest of zero bytes, stored for contacts without a photo.
pub const EMPTY_CONTENT_HASH: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Placeholder for content that was written but could not be read back.
///
/// It never equals a real digest, so the next pass re-evaluates the contact.
pub const UNKNOWN_CONTENT_HASH: &str = "UNKNOWN";

/// Lowercase hex SHA-256 of a photo.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash of the absent photo.
    pub fn empty() -> Self {
        Self(EMPTY_CONTENT_HASH.to_string())
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN_CONTENT_HASH.to_string())
    }

    /// Wrap a stored value without validating it.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn is_empty_content(&self) -> bool {
        self.0 == EMPTY_CONTENT_HASH
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_CONTENT_HASH
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Incremental hasher; feeding the same bytes in any chunking yields the
/// same [`ContentHash`].
#[derive(Default, Clone)]
pub struct ContentHasher {
    digest: Sha256,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.digest.update(chunk);
    }

    pub fn finalize(self) -> ContentHash {
        ContentHash(format!("{:x}", self.digest.finalize()))
    }
}

pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
    let mut hasher = ContentHasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// Hash a stream in `chunk_size` pieces, returning the digest and the byte
/// count.
pub async fn hash_reader<R>(reader: &mut R, chunk_size: usize) -> std::io::Result<(ContentHash, u64)>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut hasher = ContentHasher::new();
    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;

    loop {
        let read = reader.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        total += read as u64;
    }

    Ok((hasher.finalize(), total))
}
