//! Filesystem operations on `tokio::fs`

use async_trait::async_trait;
use kiln_errors::PlatformError;
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

use crate::core::PlatformContext;
use crate::filesystem::FilesystemOperations;

/// Portable filesystem operations
pub struct NativeFilesystemOperations;

impl NativeFilesystemOperations {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NativeFilesystemOperations {
    fn default() -> Self {
        Self::new()
    }
}

fn failed(operation: &str, path: &Path, err: impl std::fmt::Display) -> PlatformError {
    PlatformError::FilesystemOperationFailed {
        operation: operation.to_string(),
        message: format!("{}: {err}", path.display()),
    }
}

fn copy_tree_blocking(src: &Path, dst: &Path) -> Result<(), PlatformError> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| failed("copy_directory", src, e))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| failed("copy_directory", entry.path(), e))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| failed("create_dir", &target, e))?;
        } else if file_type.is_symlink() {
            let link = std::fs::read_link(entry.path())
                .map_err(|e| failed("read_link", entry.path(), e))?;
            symlink(&link, &target)?;
        } else {
            // std::fs::copy carries permission bits over
            std::fs::copy(entry.path(), &target).map_err(|e| failed("copy_file", &target, e))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn symlink(link: &Path, target: &Path) -> Result<(), PlatformError> {
    std::os::unix::fs::symlink(link, target).map_err(|e| failed("symlink", target, e))
}

#[cfg(not(unix))]
fn symlink(link: &Path, target: &Path) -> Result<(), PlatformError> {
    std::fs::copy(link, target)
        .map(|_| ())
        .map_err(|e| failed("symlink", target, e))
}

#[async_trait]
impl FilesystemOperations for NativeFilesystemOperations {
    async fn copy_file(
        &self,
        _ctx: &PlatformContext,
        src: &Path,
        dst: &Path,
    ) -> Result<(), PlatformError> {
        let metadata = fs::symlink_metadata(src)
            .await
            .map_err(|e| failed("copy_file", src, e))?;
        if metadata.file_type().is_symlink() {
            let link = fs::read_link(src)
                .await
                .map_err(|e| failed("read_link", src, e))?;
            return symlink(&link, dst);
        }
        fs::copy(src, dst)
            .await
            .map(|_| ())
            .map_err(|e| failed("copy_file", dst, e))
    }

    async fn copy_directory(
        &self,
        _ctx: &PlatformContext,
        src: &Path,
        dst: &Path,
    ) -> Result<(), PlatformError> {
        let (src, dst): (PathBuf, PathBuf) = (src.to_path_buf(), dst.to_path_buf());
        tokio::task::spawn_blocking(move || copy_tree_blocking(&src, &dst))
            .await
            .map_err(|e| PlatformError::FilesystemOperationFailed {
                operation: "copy_directory".to_string(),
                message: format!("task join error: {e}"),
            })?
    }

    async fn atomic_rename(
        &self,
        _ctx: &PlatformContext,
        src: &Path,
        dst: &Path,
    ) -> Result<(), PlatformError> {
        fs::rename(src, dst)
            .await
            .map_err(|e| failed("atomic_rename", src, e))
    }

    async fn create_dir_all(
        &self,
        _ctx: &PlatformContext,
        path: &Path,
    ) -> Result<(), PlatformError> {
        fs::create_dir_all(path)
            .await
            .map_err(|e| failed("create_dir_all", path, e))
    }

    async fn remove_dir_all(
        &self,
        _ctx: &PlatformContext,
        path: &Path,
    ) -> Result<(), PlatformError> {
        fs::remove_dir_all(path)
            .await
            .map_err(|e| failed("remove_dir_all", path, e))
    }

    async fn remove_file(&self, _ctx: &PlatformContext, path: &Path) -> Result<(), PlatformError> {
        fs::remove_file(path)
            .await
            .map_err(|e| failed("remove_file", path, e))
    }

    async fn exists(&self, _ctx: &PlatformContext, path: &Path) -> bool {
        fs::symlink_metadata(path).await.is_ok()
    }

    async fn is_dir(&self, _ctx: &PlatformContext, path: &Path) -> bool {
        fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
    }
}
