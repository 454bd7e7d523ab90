//! Filesystem operations used by the installer and manifest store

use async_trait::async_trait;
use kiln_errors::PlatformError;
use std::path::Path;

use crate::core::PlatformContext;

/// Trait for filesystem operations
#[async_trait]
pub trait FilesystemOperations: Send + Sync {
    /// Copy a regular file, keeping its permission bits
    async fn copy_file(
        &self,
        ctx: &PlatformContext,
        src: &Path,
        dst: &Path,
    ) -> Result<(), PlatformError>;

    /// Recursively copy a directory; symlinks are recreated, not followed
    async fn copy_directory(
        &self,
        ctx: &PlatformContext,
        src: &Path,
        dst: &Path,
    ) -> Result<(), PlatformError>;

    /// Atomically rename a file or directory
    async fn atomic_rename(
        &self,
        ctx: &PlatformContext,
        src: &Path,
        dst: &Path,
    ) -> Result<(), PlatformError>;

    /// Create directory and all parent directories
    async fn create_dir_all(&self, ctx: &PlatformContext, path: &Path)
        -> Result<(), PlatformError>;

    /// Remove directory and all contents
    async fn remove_dir_all(&self, ctx: &PlatformContext, path: &Path)
        -> Result<(), PlatformError>;

    /// Remove a single file or symlink
    async fn remove_file(&self, ctx: &PlatformContext, path: &Path) -> Result<(), PlatformError>;

    /// Check if a path exists without following a final symlink
    async fn exists(&self, ctx: &PlatformContext, path: &Path) -> bool;

    /// Check if a path points to a directory.
    async fn is_dir(&self, ctx: &PlatformContext, path: &Path) -> bool;
}
