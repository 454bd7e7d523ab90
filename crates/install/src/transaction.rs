//! Install transaction journal
//!
//! Every change the installer makes to the root goes through an
//! `InstallTransaction`: placed entries, backups of superseded entries and
//! directories created along the way. Rollback replays the journal in
//! reverse; commit drops backups and stale artifacts.

use crate::manifest::EntryKind;
use kiln_errors::{Error, InstallError, PlatformError};
use kiln_events::{AppEvent, EventEmitter, EventSender, FailureContext, TransactionEvent};
use kiln_platform::{Platform, PlatformContext};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
enum JournalEntry {
    CreatedDir(PathBuf),
    Placed { path: PathBuf, kind: EntryKind },
    BackedUp { original: PathBuf, backup: PathBuf },
}

/// Counts reported by a completed rollback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollbackSummary {
    pub removed: usize,
    pub restored: usize,
}

/// Journal of changes to one install root
pub struct InstallTransaction {
    id: Uuid,
    root: PathBuf,
    backup_dir: PathBuf,
    journal: Vec<JournalEntry>,
    platform: Arc<Platform>,
    ctx: PlatformContext,
    event_sender: Option<EventSender>,
}

impl std::fmt::Debug for InstallTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallTransaction")
            .field("id", &self.id)
            .field("root", &self.root)
            .field("journal", &self.journal.len())
            .finish_non_exhaustive()
    }
}

impl EventEmitter for InstallTransaction {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl InstallTransaction {
    /// Open a transaction on `root`
    ///
    /// Backups of superseded entries are kept under `scratch_dir` until the
    /// transaction ends.
    #[must_use]
    pub fn begin(
        platform: Arc<Platform>,
        root: &Path,
        scratch_dir: &Path,
        event_sender: Option<EventSender>,
    ) -> Self {
        let id = Uuid::new_v4();
        let ctx = platform.create_context(event_sender.clone());
        tracing::debug!(%id, root = %root.display(), "install transaction opened");
        Self {
            id,
            root: root.to_path_buf(),
            backup_dir: scratch_dir.join(format!("txn-{id}")),
            journal: Vec::new(),
            platform,
            ctx,
            event_sender,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of entries placed so far
    #[must_use]
    pub fn placed(&self) -> usize {
        self.journal
            .iter()
            .filter(|e| matches!(e, JournalEntry::Placed { .. }))
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.journal.is_empty()
    }

    /// Create `dir` and any missing ancestors, journaling each one
    ///
    /// # Errors
    ///
    /// Returns `FilesystemError` if a directory cannot be created.
    pub async fn ensure_dir(&mut self, dir: &Path) -> Result<(), Error> {
        let fs = self.platform.filesystem();
        let mut missing = Vec::new();
        let mut cursor = Some(dir);
        while let Some(path) = cursor {
            if fs.exists(&self.ctx, path).await {
                break;
            }
            missing.push(path.to_path_buf());
            cursor = path.parent();
        }

        for path in missing.into_iter().rev() {
            fs.create_dir_all(&self.ctx, &path)
                .await
                .map_err(|e| fs_error("create_dir", &path, &e))?;
            self.journal.push(JournalEntry::CreatedDir(path));
        }
        Ok(())
    }

    /// Move an existing entry out of the way so it can be restored on rollback
    ///
    /// # Errors
    ///
    /// Returns `FilesystemError` if the entry cannot be moved.
    pub async fn back_up(&mut self, path: &Path) -> Result<(), Error> {
        let fs = self.platform.filesystem();
        fs.create_dir_all(&self.ctx, &self.backup_dir)
            .await
            .map_err(|e| fs_error("create_dir_all", &self.backup_dir, &e))?;

        let backup = self.backup_dir.join(self.journal.len().to_string());
        self.move_entry(path, &backup).await?;
        self.journal.push(JournalEntry::BackedUp {
            original: path.to_path_buf(),
            backup,
        });
        Ok(())
    }

    /// Copy `source` to `destination`, creating parents as needed
    ///
    /// `destination` must not exist.
    ///
    /// # Errors
    ///
    /// Returns `FilesystemError` if the copy fails. A partially copied
    /// directory is still journaled so rollback removes it.
    pub async fn place(
        &mut self,
        source: &Path,
        destination: &Path,
        kind: EntryKind,
    ) -> Result<(), Error> {
        if let Some(parent) = destination.parent() {
            self.ensure_dir(parent).await?;
        }

        self.journal.push(JournalEntry::Placed {
            path: destination.to_path_buf(),
            kind,
        });

        let fs = self.platform.filesystem();
        let result = match kind {
            EntryKind::File => fs.copy_file(&self.ctx, source, destination).await,
            EntryKind::Directory => fs.copy_directory(&self.ctx, source, destination).await,
        };
        result.map_err(|e| fs_error("copy", destination, &e))
    }

    /// Undo every journaled change in reverse order
    ///
    /// All steps are attempted even when one fails; the failures are
    /// reported together.
    ///
    /// # Errors
    ///
    /// Returns `RollbackFailed` if any step could not be undone.
    pub async fn rollback(mut self, reason: &Error) -> Result<RollbackSummary, Error> {
        let journal = std::mem::take(&mut self.journal);
        self.emit(AppEvent::Transaction(TransactionEvent::RollbackStarted {
            transaction_id: self.id,
            entries: journal.len(),
            reason: FailureContext::from_error(reason),
        }));
        tracing::warn!(id = %self.id, reason = %reason, "rolling back install transaction");

        let mut summary = RollbackSummary::default();
        let mut failures = Vec::new();

        for entry in journal.into_iter().rev() {
            let step = match &entry {
                JournalEntry::Placed { path, kind } => {
                    let removed = self.remove_entry(path, *kind).await;
                    if matches!(removed, Ok(true)) {
                        summary.removed += 1;
                    }
                    removed.map(|_| ())
                }
                JournalEntry::BackedUp { original, backup } => {
                    let restored = self.move_entry(backup, original).await;
                    if restored.is_ok() {
                        summary.restored += 1;
                    }
                    restored
                }
                JournalEntry::CreatedDir(dir) => remove_empty_dir(dir).await.map(|_| ()),
            };
            if let Err(e) = step {
                failures.push(e.to_string());
            }
        }

        self.discard_backups().await;

        if failures.is_empty() {
            self.emit(AppEvent::Transaction(TransactionEvent::RollbackCompleted {
                transaction_id: self.id,
                removed: summary.removed,
                restored: summary.restored,
            }));
            Ok(summary)
        } else {
            let err: Error = InstallError::RollbackFailed {
                message: failures.join("; "),
            }
            .into();
            self.emit(AppEvent::Transaction(TransactionEvent::RollbackFailed {
                transaction_id: self.id,
                failure: FailureContext::from_error(&err),
            }));
            Err(err)
        }
    }

    /// Make the journaled changes permanent
    ///
    /// `stale` lists entries of superseded manifests that the new manifests
    /// no longer contain; they are removed along with any directories that
    /// become empty.
    ///
    /// Every stale entry is attempted and backups are discarded even when a
    /// removal fails.
    ///
    /// # Errors
    ///
    /// Returns `FilesystemError` listing every stale entry that could not be
    /// removed.
    pub async fn commit(mut self, stale: &[(PathBuf, EntryKind)]) -> Result<(), Error> {
        let mut failures = Vec::new();
        for (path, kind) in stale {
            match self.remove_entry(path, *kind).await {
                Ok(_) => self.prune_empty_parents(path).await,
                Err(e) => failures.push(e.to_string()),
            }
        }
        self.discard_backups().await;
        self.journal.clear();

        if failures.is_empty() {
            tracing::debug!(id = %self.id, "install transaction committed");
            Ok(())
        } else {
            tracing::warn!(id = %self.id, failed = failures.len(), "stale artifacts left after commit");
            Err(InstallError::FilesystemError {
                operation: "remove_stale".to_string(),
                path: self.root.display().to_string(),
                message: failures.join("; "),
            }
            .into())
        }
    }

    async fn remove_entry(&self, path: &Path, kind: EntryKind) -> Result<bool, Error> {
        let fs = self.platform.filesystem();
        if !fs.exists(&self.ctx, path).await {
            return Ok(false);
        }
        let result = if kind == EntryKind::Directory && fs.is_dir(&self.ctx, path).await {
            fs.remove_dir_all(&self.ctx, path).await
        } else {
            fs.remove_file(&self.ctx, path).await
        };
        result.map_err(|e| fs_error("remove", path, &e))?;
        Ok(true)
    }

    async fn move_entry(&self, from: &Path, to: &Path) -> Result<(), Error> {
        let fs = self.platform.filesystem();
        if fs.atomic_rename(&self.ctx, from, to).await.is_ok() {
            return Ok(());
        }

        // rename fails across filesystems; fall back to copy and remove
        let is_dir = fs.is_dir(&self.ctx, from).await;
        let copied = if is_dir {
            fs.copy_directory(&self.ctx, from, to).await
        } else {
            fs.copy_file(&self.ctx, from, to).await
        };
        copied.map_err(|e| fs_error("move", from, &e))?;

        let removed = if is_dir {
            fs.remove_dir_all(&self.ctx, from).await
        } else {
            fs.remove_file(&self.ctx, from).await
        };
        removed.map_err(|e| fs_error("move", from, &e))
    }

    async fn prune_empty_parents(&self, path: &Path) {
        let mut cursor = path.parent();
        while let Some(dir) = cursor {
            if dir == self.root || !dir.starts_with(&self.root) {
                break;
            }
            if !matches!(remove_empty_dir(dir).await, Ok(true)) {
                break;
            }
            cursor = dir.parent();
        }
    }

    async fn discard_backups(&self) {
        let fs = self.platform.filesystem();
        if fs.exists(&self.ctx, &self.backup_dir).await {
            if let Err(e) = fs.remove_dir_all(&self.ctx, &self.backup_dir).await {
                tracing::warn!(path = %self.backup_dir.display(), error = %e, "failed to remove transaction backups");
            }
        }
    }
}

/// Remove `dir` only if it is empty; a missing or non-empty dir is left alone
async fn remove_empty_dir(dir: &Path) -> Result<bool, Error> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(InstallError::fs("read_dir", dir, &e).into()),
    };
    if entries
        .next_entry()
        .await
        .map_err(|e| InstallError::fs("read_dir", dir, &e))?
        .is_some()
    {
        return Ok(false);
    }
    tokio::fs::remove_dir(dir)
        .await
        .map_err(|e| InstallError::fs("remove_dir", dir, &e))?;
    Ok(true)
}

fn fs_error(operation: &str, path: &Path, err: &PlatformError) -> Error {
    InstallError::FilesystemError {
        operation: operation.to_string(),
        path: path.display().to_string(),
        message: err.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txn(root: &Path, scratch: &Path) -> InstallTransaction {
        InstallTransaction::begin(Arc::new(Platform::current()), root, scratch, None)
    }

    #[tokio::test]
    async fn rollback_restores_pristine_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        let build = tmp.path().join("build");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(build.join("examples")).unwrap();
        std::fs::write(build.join("o2l"), b"binary").unwrap();
        std::fs::write(build.join("examples/hello.obq"), b"print").unwrap();

        let mut txn = txn(&root, &tmp.path().join("scratch"));
        txn.place(&build.join("o2l"), &root.join("bin/o2l"), EntryKind::File)
            .await
            .unwrap();
        txn.place(
            &build.join("examples"),
            &root.join("share/o2l/examples"),
            EntryKind::Directory,
        )
        .await
        .unwrap();
        assert_eq!(txn.placed(), 2);
        assert!(root.join("share/o2l/examples/hello.obq").is_file());

        let reason = Error::internal("verification failed");
        let summary = txn.rollback(&reason).await.unwrap();
        assert_eq!(summary.removed, 2);
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn rollback_restores_backups() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        std::fs::create_dir_all(root.join("bin")).unwrap();
        std::fs::write(root.join("bin/tool"), b"old").unwrap();
        let new = tmp.path().join("tool");
        std::fs::write(&new, b"new").unwrap();

        let mut txn = txn(&root, &tmp.path().join("scratch"));
        txn.back_up(&root.join("bin/tool")).await.unwrap();
        txn.place(&new, &root.join("bin/tool"), EntryKind::File)
            .await
            .unwrap();
        assert_eq!(std::fs::read(root.join("bin/tool")).unwrap(), b"new");

        let summary = txn.rollback(&Error::Cancelled).await.unwrap();
        assert_eq!(summary.restored, 1);
        assert_eq!(std::fs::read(root.join("bin/tool")).unwrap(), b"old");
        assert!(tmp.path().join("scratch").read_dir().unwrap().next().is_none());
    }

    #[tokio::test]
    async fn commit_removes_stale_entries_and_backups() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        std::fs::create_dir_all(root.join("share/doc/o2l")).unwrap();
        std::fs::write(root.join("share/doc/o2l/OLD.md"), b"old").unwrap();
        std::fs::create_dir_all(root.join("bin")).unwrap();
        std::fs::write(root.join("bin/o2l"), b"v1").unwrap();
        let new = tmp.path().join("o2l");
        std::fs::write(&new, b"v2").unwrap();

        let scratch = tmp.path().join("scratch");
        let mut txn = txn(&root, &scratch);
        txn.back_up(&root.join("bin/o2l")).await.unwrap();
        txn.place(&new, &root.join("bin/o2l"), EntryKind::File)
            .await
            .unwrap();
        txn.commit(&[(root.join("share/doc/o2l/OLD.md"), EntryKind::File)])
            .await
            .unwrap();

        assert_eq!(std::fs::read(root.join("bin/o2l")).unwrap(), b"v2");
        assert!(!root.join("share").exists());
        assert!(scratch.read_dir().unwrap().next().is_none());
    }

    #[tokio::test]
    async fn commit_attempts_every_stale_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        std::fs::create_dir_all(root.join("share/doc/o2l")).unwrap();
        std::fs::write(root.join("share/doc/o2l/README.md"), b"docs").unwrap();
        std::fs::create_dir_all(root.join("bin")).unwrap();
        std::fs::write(root.join("bin/o2l-old"), b"old").unwrap();
        std::fs::write(root.join("bin/o2l"), b"v1").unwrap();
        let new = tmp.path().join("o2l");
        std::fs::write(&new, b"v2").unwrap();

        let scratch = tmp.path().join("scratch");
        let mut txn = txn(&root, &scratch);
        txn.back_up(&root.join("bin/o2l")).await.unwrap();
        txn.place(&new, &root.join("bin/o2l"), EntryKind::File)
            .await
            .unwrap();

        // a directory recorded as a file cannot be removed as one
        let err = txn
            .commit(&[
                (root.join("share/doc/o2l"), EntryKind::File),
                (root.join("bin/o2l-old"), EntryKind::File),
            ])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Install(InstallError::FilesystemError { ref operation, .. }) if operation == "remove_stale"
        ));
        assert!(!root.join("bin/o2l-old").exists());
        assert!(root.join("share/doc/o2l/README.md").is_file());
        assert!(scratch.read_dir().unwrap().next().is_none());
    }
}
