//! Conditional installer
//!
//! Installation is two passes over the recipe's install actions. The dry
//! pass evaluates every predicate and checks every destination for
//! conflicts without touching the root; only when it succeeds does the
//! apply pass copy anything.

use crate::manifest::{EntryKind, InstalledManifest, ManifestEntry};
use crate::transaction::InstallTransaction;
use kiln_errors::{Error, InstallError};
use kiln_events::{AppEvent, EventEmitter, EventSender, FailureContext, InstallEvent};
use kiln_hash::{hash_tree, Hash};
use kiln_recipe::{InstallAction, InstallPredicate, Recipe};
use kiln_types::DestinationCategory;
use std::fs::Metadata;
use std::path::{Component, Path, PathBuf};

/// One artifact selected by the dry pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub action_index: usize,
    /// Relative to the source directory
    pub source: PathBuf,
    /// Relative to the install root
    pub destination: PathBuf,
    pub category: DestinationCategory,
    pub kind: EntryKind,
    /// The previous manifest of the same recipe owns the destination
    pub supersedes: bool,
}

/// An action whose predicate evaluated false
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedAction {
    pub action_index: usize,
    pub source: PathBuf,
    pub predicate: InstallPredicate,
}

/// Result of the dry pass
#[derive(Debug, Clone, Default)]
pub struct PlacementPlan {
    pub placements: Vec<Placement>,
    pub skipped: Vec<SkippedAction>,
}

/// What the apply pass placed
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub entries: Vec<ManifestEntry>,
    pub skipped: Vec<SkippedAction>,
}

/// Places build outputs into their destination categories
#[derive(Debug, Clone, Default)]
pub struct ConditionalInstaller {
    event_sender: Option<EventSender>,
}

impl EventEmitter for ConditionalInstaller {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl ConditionalInstaller {
    #[must_use]
    pub fn new(event_sender: Option<EventSender>) -> Self {
        Self { event_sender }
    }

    /// Evaluate predicates and detect conflicts without writing anything
    ///
    /// # Errors
    ///
    /// Returns `MissingArtifact` for an `always` action whose source is
    /// absent, `InvalidDestination` when no destination name can be derived,
    /// and `InstallConflict` for duplicate or nested destinations or for a
    /// destination already present in the root and not owned by `previous`.
    pub async fn plan(
        &self,
        recipe: &Recipe,
        source_dir: &Path,
        root: &Path,
        previous: Option<&InstalledManifest>,
    ) -> Result<PlacementPlan, Error> {
        let mut plan = PlacementPlan::default();

        for (index, action) in recipe.install.iter().enumerate() {
            let source = source_dir.join(&action.source);
            let metadata = tokio::fs::metadata(&source).await.ok();

            if !predicate_holds(action.when, metadata.as_ref()) {
                if action.when.is_required() {
                    return Err(InstallError::MissingArtifact {
                        source_path: action.source.display().to_string(),
                        action_index: index,
                    }
                    .into());
                }
                plan.skipped.push(SkippedAction {
                    action_index: index,
                    source: action.source.clone(),
                    predicate: action.when,
                });
                continue;
            }

            let kind = match metadata {
                Some(m) if m.is_dir() => EntryKind::Directory,
                _ => EntryKind::File,
            };
            let destination = destination_for(recipe.name(), action)?;
            plan.placements.push(Placement {
                action_index: index,
                source: action.source.clone(),
                destination,
                category: action.category,
                kind,
                supersedes: false,
            });
        }

        check_overlaps(&plan.placements)?;

        for placement in &mut plan.placements {
            let owned = previous.is_some_and(|m| m.owns(&placement.destination));
            check_ancestors(root, &placement.destination, owned).await?;
            let present = tokio::fs::symlink_metadata(root.join(&placement.destination))
                .await
                .is_ok();
            if present && !owned {
                return Err(conflict(
                    &placement.destination,
                    format!("already exists and is not owned by {}", recipe.name()),
                ));
            }
            placement.supersedes = present;
        }

        Ok(plan)
    }

    /// Copy every planned artifact through `txn`
    ///
    /// Entries owned by the previous manifest are backed up first so
    /// rollback can restore them.
    ///
    /// # Errors
    ///
    /// Returns `FilesystemError` if a copy fails; everything placed so far
    /// stays journaled in `txn`.
    pub async fn apply(
        &self,
        recipe: &Recipe,
        plan: &PlacementPlan,
        source_dir: &Path,
        txn: &mut InstallTransaction,
    ) -> Result<Vec<ManifestEntry>, Error> {
        let root = txn.root().to_path_buf();
        let mut entries = Vec::with_capacity(plan.placements.len());

        for placement in &plan.placements {
            let target = root.join(&placement.destination);
            if placement.supersedes {
                txn.back_up(&target).await?;
            }
            txn.place(&source_dir.join(&placement.source), &target, placement.kind)
                .await?;

            let (checksum, files) = match placement.kind {
                EntryKind::File => (Hash::hash_file(&target).await?, Vec::new()),
                EntryKind::Directory => {
                    let tree = hash_tree(&target).await?;
                    let files = tree.files.into_iter().map(|f| f.relative_path).collect();
                    (tree.hash, files)
                }
            };

            self.emit(AppEvent::Install(InstallEvent::ArtifactInstalled {
                recipe: recipe.name().to_string(),
                source: placement.source.clone(),
                destination: placement.destination.clone(),
                category: placement.category,
            }));

            entries.push(ManifestEntry {
                source: placement.source.clone(),
                destination: placement.destination.clone(),
                category: placement.category,
                kind: placement.kind,
                checksum,
                files,
            });
        }

        Ok(entries)
    }

    /// Dry pass then apply, with events
    ///
    /// # Errors
    ///
    /// Returns any error of [`plan`](Self::plan) (nothing is written) or
    /// [`apply`](Self::apply).
    pub async fn install(
        &self,
        recipe: &Recipe,
        source_dir: &Path,
        txn: &mut InstallTransaction,
        previous: Option<&InstalledManifest>,
    ) -> Result<InstallOutcome, Error> {
        self.emit(AppEvent::Install(InstallEvent::Started {
            recipe: recipe.name().to_string(),
            version: recipe.version().to_string(),
            actions: recipe.install.len(),
        }));

        let result = self.install_inner(recipe, source_dir, txn, previous).await;
        match &result {
            Ok(outcome) => {
                self.emit(AppEvent::Install(InstallEvent::Completed {
                    recipe: recipe.name().to_string(),
                    installed: outcome.entries.len(),
                    skipped: outcome.skipped.len(),
                }));
            }
            Err(e) => {
                self.emit(AppEvent::Install(InstallEvent::Failed {
                    recipe: recipe.name().to_string(),
                    failure: FailureContext::from_error(e),
                }));
            }
        }
        result
    }

    async fn install_inner(
        &self,
        recipe: &Recipe,
        source_dir: &Path,
        txn: &mut InstallTransaction,
        previous: Option<&InstalledManifest>,
    ) -> Result<InstallOutcome, Error> {
        let plan = self
            .plan(recipe, source_dir, txn.root(), previous)
            .await?;

        for skipped in &plan.skipped {
            self.emit(AppEvent::Install(InstallEvent::ArtifactSkipped {
                recipe: recipe.name().to_string(),
                source: skipped.source.clone(),
                predicate: skipped.predicate.to_string(),
            }));
        }

        let entries = self.apply(recipe, &plan, source_dir, txn).await?;
        Ok(InstallOutcome {
            entries,
            skipped: plan.skipped,
        })
    }
}

fn predicate_holds(predicate: InstallPredicate, metadata: Option<&Metadata>) -> bool {
    match (predicate, metadata) {
        (_, None) => false,
        (InstallPredicate::Always | InstallPredicate::Exists, Some(_)) => true,
        (InstallPredicate::FileExists, Some(m)) => m.is_file(),
        (InstallPredicate::DirExists, Some(m)) => m.is_dir(),
    }
}

/// Destination of `action` relative to the install root
fn destination_for(recipe: &str, action: &InstallAction) -> Result<PathBuf, Error> {
    let name = action.destination_name().unwrap_or_default();
    let mut components = Path::new(&name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single {
        return Err(InstallError::InvalidDestination {
            path: action.source.display().to_string(),
            message: format!("`{name}` is not a single file name"),
        }
        .into());
    }
    Ok(action.category.relative_dir(recipe).join(name))
}

fn check_overlaps(placements: &[Placement]) -> Result<(), Error> {
    for (i, a) in placements.iter().enumerate() {
        for b in &placements[i + 1..] {
            if a.destination == b.destination {
                return Err(conflict(
                    &a.destination,
                    format!(
                        "install actions {} and {} target the same path",
                        a.action_index, b.action_index
                    ),
                ));
            }
            if a.destination.starts_with(&b.destination) || b.destination.starts_with(&a.destination)
            {
                return Err(conflict(
                    &a.destination,
                    format!(
                        "install actions {} and {} target nested paths",
                        a.action_index, b.action_index
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// Every existing ancestor between the root and `destination` must be a
/// directory; a non-owned directory entry cannot be installed into.
async fn check_ancestors(root: &Path, destination: &Path, owned: bool) -> Result<(), Error> {
    let mut current = root.to_path_buf();
    let parents: Vec<_> = destination.parent().map_or_else(Vec::new, |p| {
        p.components().collect()
    });
    for component in parents {
        current.push(component);
        match tokio::fs::symlink_metadata(&current).await {
            Ok(m) if m.is_dir() => {}
            Ok(_) if !owned => {
                return Err(conflict(
                    destination,
                    format!("{} exists and is not a directory", current.display()),
                ));
            }
            Ok(_) | Err(_) => break,
        }
    }
    Ok(())
}

fn conflict(destination: &Path, message: String) -> Error {
    InstallError::InstallConflict {
        destination: destination.display().to_string(),
        message,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(source: &str, category: DestinationCategory) -> InstallAction {
        InstallAction {
            source: PathBuf::from(source),
            category,
            when: InstallPredicate::Always,
            rename: None,
        }
    }

    #[test]
    fn destinations_follow_categories() {
        let bin = action("build/bin/o2l", DestinationCategory::Bin);
        assert_eq!(destination_for("o2l", &bin).unwrap(), PathBuf::from("bin/o2l"));

        let doc = action("README.md", DestinationCategory::Doc);
        assert_eq!(
            destination_for("o2l", &doc).unwrap(),
            PathBuf::from("share/doc/o2l/README.md")
        );

        let mut renamed = action("build/lib/libo2l.so.0", DestinationCategory::Lib);
        renamed.rename = Some("libo2l.so".to_string());
        assert_eq!(
            destination_for("o2l", &renamed).unwrap(),
            PathBuf::from("lib/libo2l.so")
        );

        let mut bad = action("build/bin/o2l", DestinationCategory::Bin);
        bad.rename = Some("..".to_string());
        assert!(destination_for("o2l", &bad).is_err());
    }

    #[test]
    fn overlaps_are_conflicts() {
        let placement = |i, dest: &str| Placement {
            action_index: i,
            source: PathBuf::from("x"),
            destination: PathBuf::from(dest),
            category: DestinationCategory::Share,
            kind: EntryKind::Directory,
            supersedes: false,
        };

        assert!(check_overlaps(&[placement(0, "share/o2l/a"), placement(1, "share/o2l/b")]).is_ok());
        assert!(check_overlaps(&[placement(0, "share/o2l/a"), placement(1, "share/o2l/a")]).is_err());
        assert!(check_overlaps(&[placement(0, "share/o2l/a"), placement(1, "share/o2l/a/b")]).is_err());
    }

    #[test]
    fn predicates() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("f"), b"").unwrap();
        let file = std::fs::metadata(tmp.path().join("f")).unwrap();
        let dir = std::fs::metadata(tmp.path()).unwrap();

        assert!(predicate_holds(InstallPredicate::Exists, Some(&dir)));
        assert!(predicate_holds(InstallPredicate::FileExists, Some(&file)));
        assert!(!predicate_holds(InstallPredicate::FileExists, Some(&dir)));
        assert!(predicate_holds(InstallPredicate::DirExists, Some(&dir)));
        assert!(!predicate_holds(InstallPredicate::DirExists, Some(&file)));
        assert!(!predicate_holds(InstallPredicate::Always, None));
    }
}
