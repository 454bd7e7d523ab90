//! Reverse-apply a committed manifest

use crate::manifest::{EntryKind, InstalledManifest, ManifestStore};
use kiln_errors::{Error, InstallError};
use kiln_events::{AppEvent, EventEmitter, EventSender, InstallEvent};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What an uninstall removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UninstallReport {
    pub name: String,
    pub version: String,
    pub removed: Vec<PathBuf>,
    /// Entries whose content no longer matched the manifest
    pub modified: Vec<PathBuf>,
}

/// Removes installed recipes recorded in a manifest store
#[derive(Debug, Clone)]
pub struct Uninstaller {
    store: ManifestStore,
    event_sender: Option<EventSender>,
}

impl EventEmitter for Uninstaller {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl Uninstaller {
    #[must_use]
    pub fn new(store: ManifestStore, event_sender: Option<EventSender>) -> Self {
        Self {
            store,
            event_sender,
        }
    }

    /// Remove every entry of `name`'s manifest, then the manifest itself
    ///
    /// # Errors
    ///
    /// Returns `NotInstalled` when there is no manifest, `HasDependents` when
    /// another recipe needs `name` at runtime and `force` is unset, and
    /// `FilesystemError` when an entry cannot be removed.
    pub async fn uninstall(&self, name: &str, force: bool) -> Result<UninstallReport, Error> {
        let manifest = self.store.require(name).await?;

        let dependents = self.store.dependents(name).await?;
        if !dependents.is_empty() && !force {
            return Err(InstallError::HasDependents {
                name: name.to_string(),
                dependents,
            }
            .into());
        }

        let report = self.remove_entries(&manifest).await?;
        self.store.remove(name).await?;

        self.emit(AppEvent::Install(InstallEvent::UninstallCompleted {
            recipe: name.to_string(),
            removed: report.removed.len(),
        }));
        Ok(report)
    }

    async fn remove_entries(&self, manifest: &InstalledManifest) -> Result<UninstallReport, Error> {
        let root = &manifest.install_root;
        self.emit(AppEvent::Install(InstallEvent::UninstallStarted {
            recipe: manifest.name.clone(),
            entries: manifest.entries.len(),
        }));

        let mut report = UninstallReport {
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            removed: Vec::new(),
            modified: Vec::new(),
        };

        for entry in manifest.entries.iter().rev() {
            let Some(current) = entry.current_checksum(root).await? else {
                continue;
            };
            if current != entry.checksum {
                self.emit(AppEvent::Install(InstallEvent::ModifiedArtifactRemoved {
                    recipe: manifest.name.clone(),
                    destination: entry.destination.clone(),
                }));
                report.modified.push(entry.destination.clone());
            }

            let path = root.join(&entry.destination);
            remove_path(&path, entry.kind).await?;
            prune_empty_parents(root, &path).await;
            report.removed.push(entry.destination.clone());
        }

        Ok(report)
    }
}

async fn remove_path(path: &Path, kind: EntryKind) -> Result<(), Error> {
    let is_dir = tokio::fs::symlink_metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    let result = if kind == EntryKind::Directory && is_dir {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };
    result.map_err(|e| InstallError::fs("remove", path, &e).into())
}

/// Remove directories left empty below `root`, stopping at the first
/// non-empty one
async fn prune_empty_parents(root: &Path, path: &Path) {
    let mut cursor = path.parent();
    while let Some(dir) = cursor {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        if tokio::fs::remove_dir(dir).await.is_err() {
            break;
        }
        cursor = dir.parent();
    }
}
