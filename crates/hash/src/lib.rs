#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Content hashing for kiln
//!
//! BLAKE3 is used for everything kiln computes itself: installed file
//! checksums and directory tree digests recorded in manifests. Source
//! archives are checked against whichever digest the recipe declares,
//! which may be SHA-256 (the common upstream format) or BLAKE3.

mod digest;
mod tree;

pub use digest::{DigestAlgorithm, DigestHasher, SourceDigest};
pub use tree::{hash_tree, FileHashResult, TreeDigest};

use blake3::Hasher;
use kiln_errors::{Error, FetchError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Size of chunks for streaming hash computation
pub(crate) const CHUNK_SIZE: usize = 64 * 1024; // 64KB

/// A BLAKE3 hash value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hash {
    bytes: [u8; 32],
}

impl Hash {
    /// Create a hash from raw bytes
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Get the raw bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Convert to hex string
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parse from hex string
    ///
    /// # Errors
    /// Returns an error if the input string is not valid hexadecimal or is not exactly 64 characters (32 bytes).
    pub fn from_hex(s: &str) -> Result<Self, Error> {
        let bytes = hex::decode(s).map_err(|e| FetchError::InvalidDigest {
            digest: s.to_string(),
            message: format!("invalid hex: {e}"),
        })?;

        let array: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            FetchError::InvalidDigest {
                digest: s.to_string(),
                message: format!("hash must be 32 bytes, got {}", b.len()),
            }
        })?;
        Ok(Self::from_bytes(array))
    }

    /// Compute hash of a byte slice
    #[must_use]
    pub fn from_data(data: &[u8]) -> Self {
        let hash = blake3::hash(data);
        Self::from_bytes(*hash.as_bytes())
    }

    /// Compute hash of a file
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, read, or if any I/O operation fails.
    pub async fn hash_file(path: &Path) -> Result<Self, Error> {
        let mut file = File::open(path)
            .await
            .map_err(|e| Error::io_with_path(&e, path))?;

        let mut hasher = Hasher::new();
        let mut buffer = vec![0; CHUNK_SIZE];

        loop {
            let n = file
                .read(&mut buffer)
                .await
                .map_err(|e| Error::io_with_path(&e, path))?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(Self::from_bytes(*hasher.finalize().as_bytes()))
    }

    /// Blocking variant of [`Hash::hash_file`] for use inside directory walks
    pub(crate) fn hash_file_blocking(path: &Path) -> Result<Self, Error> {
        let mut file = std::fs::File::open(path).map_err(|e| Error::io_with_path(&e, path))?;
        let mut hasher = Hasher::new();
        std::io::copy(&mut file, &mut hasher).map_err(|e| Error::io_with_path(&e, path))?;
        Ok(Self::from_bytes(*hasher.finalize().as_bytes()))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Verify a file matches an expected hash
///
/// # Errors
/// Returns an error if the file cannot be read or hashed.
pub async fn verify_file(path: &Path, expected: &Hash) -> Result<bool, Error> {
    let actual = Hash::hash_file(path).await?;
    Ok(actual == *expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_hash_basics() {
        let hash = Hash::from_data(b"hello world");

        // Known BLAKE3 hash of "hello world"
        let expected = "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24";
        assert_eq!(hash.to_hex(), expected);
    }

    #[test]
    fn test_hash_serialization() {
        let hash = Hash::from_data(b"test");
        let json = serde_json::to_string(&hash).unwrap();
        let deserialized: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(hash, deserialized);
    }

    #[test]
    fn test_from_hex_rejects_short_input() {
        let err = Hash::from_hex("abcd").unwrap_err();
        assert!(err.to_string().contains("32 bytes"));
        assert!(Hash::from_hex("not-hex").is_err());
    }

    #[tokio::test]
    async fn test_hash_file() {
        use std::io::Write;
        let mut temp = NamedTempFile::new().unwrap();
        let data = b"test file content";
        temp.write_all(data).unwrap();

        let hash = Hash::hash_file(temp.path()).await.unwrap();
        assert_eq!(hash, Hash::from_data(data));
        assert!(verify_file(temp.path(), &hash).await.unwrap());
        assert_eq!(Hash::hash_file_blocking(temp.path()).unwrap(), hash);
    }

    #[tokio::test]
    async fn test_hash_missing_file_reports_path() {
        let err = Hash::hash_file(Path::new("/definitely/not/here"))
            .await
            .unwrap_err();
        match err {
            Error::Io { path, .. } => assert!(path.is_some()),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
