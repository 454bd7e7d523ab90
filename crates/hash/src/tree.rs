//! Directory tree digests
//!
//! Installed directories are recorded as a single digest over their sorted
//! contents, plus the per-file results so uninstall and integrity checks can
//! reason about individual files.

use crate::Hash;
use kiln_errors::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Result of hashing a single file inside a tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHashResult {
    /// Path relative to the tree root, with `/` separators
    pub relative_path: String,
    /// BLAKE3 of the file contents, or of the link target for symlinks
    pub hash: Hash,
    pub size: u64,
    pub is_symlink: bool,
    /// Unix permission bits, when available
    pub mode: Option<u32>,
}

/// Digest of a whole directory tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeDigest {
    pub hash: Hash,
    pub files: Vec<FileHashResult>,
}

/// Hash every file under `root`
///
/// Files are visited in sorted order so the combined digest depends only on
/// relative paths, contents and link targets. Empty directories do not
/// contribute.
///
/// # Errors
///
/// Returns an error if the walk fails or a file cannot be read.
pub async fn hash_tree(root: &Path) -> Result<TreeDigest, Error> {
    let root: PathBuf = root.to_path_buf();
    tokio::task::spawn_blocking(move || hash_tree_blocking(&root))
        .await
        .map_err(|e| Error::internal(format!("tree hashing task failed: {e}")))?
}

fn hash_tree_blocking(root: &Path) -> Result<TreeDigest, Error> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .min_depth(1)
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            match e.into_io_error() {
                Some(io) => Error::io_with_path(&io, path),
                None => Error::internal(format!("directory walk failed at {}", path.display())),
            }
        })?;

        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }

        let path = entry.path();
        let relative_path = path
            .strip_prefix(root)
            .map_err(|_| {
                Error::internal(format!(
                    "failed to compute relative path for {}",
                    path.display()
                ))
            })?
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        let metadata = entry
            .metadata()
            .map_err(|e| Error::internal(format!("{}: {e}", path.display())))?;

        let (hash, size, is_symlink) = if file_type.is_symlink() {
            let target = std::fs::read_link(path).map_err(|e| Error::io_with_path(&e, path))?;
            let target = target.to_string_lossy().into_owned();
            (
                Hash::from_data(target.as_bytes()),
                target.len() as u64,
                true,
            )
        } else {
            (Hash::hash_file_blocking(path)?, metadata.len(), false)
        };

        files.push(FileHashResult {
            relative_path,
            hash,
            size,
            is_symlink,
            mode: file_mode(&metadata),
        });
    }

    let mut hasher = blake3::Hasher::new();
    for file in &files {
        hasher.update(file.relative_path.as_bytes());
        hasher.update(&[0]);
        hasher.update(if file.is_symlink { b"l" } else { b"f" });
        hasher.update(file.hash.as_bytes());
    }

    Ok(TreeDigest {
        hash: Hash::from_bytes(*hasher.finalize().as_bytes()),
        files,
    })
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode())
}

#[cfg(not(unix))]
fn file_mode(_metadata: &std::fs::Metadata) -> Option<u32> {
    None
}
