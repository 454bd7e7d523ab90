//! Installed manifests and their on-disk store
//!
//! A manifest is written once per committed install and superseded by the
//! next one; the store never edits a manifest in place.

use chrono::{DateTime, Utc};
use kiln_errors::{Error, InstallError};
use kiln_hash::{hash_tree, Hash};
use kiln_recipe::Recipe;
use kiln_types::DestinationCategory;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What an entry placed on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// One artifact placed by an install action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the build's source directory
    pub source: PathBuf,
    /// Path relative to the install root
    pub destination: PathBuf,
    pub category: DestinationCategory,
    pub kind: EntryKind,
    /// BLAKE3 of the file, or the tree digest of a directory
    pub checksum: Hash,
    /// Files inside a directory entry, relative to it
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

impl ManifestEntry {
    /// Checksum of what is currently at `root/destination`
    ///
    /// Returns `None` when nothing is there.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry exists but cannot be read.
    pub async fn current_checksum(&self, root: &Path) -> Result<Option<Hash>, Error> {
        let path = root.join(&self.destination);
        let Ok(metadata) = tokio::fs::symlink_metadata(&path).await else {
            return Ok(None);
        };
        match self.kind {
            EntryKind::Directory if metadata.is_dir() => Ok(Some(hash_tree(&path).await?.hash)),
            EntryKind::File if !metadata.is_dir() => Ok(Some(Hash::hash_file(&path).await?)),
            // kind changed underneath us
            _ => Ok(Some(Hash::from_data(&[]))),
        }
    }
}

/// Durable record of one committed installation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledManifest {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub license: Option<String>,
    pub source_url: String,
    #[serde(default)]
    pub source_digest: Option<String>,
    #[serde(default)]
    pub build_dependencies: Vec<String>,
    #[serde(default)]
    pub runtime_dependencies: Vec<String>,
    pub install_root: PathBuf,
    pub installed_at: DateTime<Utc>,
    pub entries: Vec<ManifestEntry>,
}

impl InstalledManifest {
    #[must_use]
    pub fn new(recipe: &Recipe, install_root: &Path, entries: Vec<ManifestEntry>) -> Self {
        Self {
            name: recipe.name().to_string(),
            version: recipe.version().to_string(),
            license: recipe.metadata.license.clone(),
            source_url: recipe.source.url.clone(),
            source_digest: recipe.source.digest().map(|d| d.to_string()),
            build_dependencies: recipe.build_dependencies(),
            runtime_dependencies: recipe.runtime_dependencies(),
            install_root: install_root.to_path_buf(),
            installed_at: Utc::now(),
            entries,
        }
    }

    /// Whether `destination` (relative to the root) is owned by this manifest
    #[must_use]
    pub fn owns(&self, destination: &Path) -> bool {
        self.entries.iter().any(|entry| {
            destination == entry.destination
                || (entry.kind == EntryKind::Directory
                    && destination.starts_with(&entry.destination))
        })
    }

    /// Whether this manifest describes an install into `root`
    #[must_use]
    pub fn is_in_root(&self, root: &Path) -> bool {
        self.install_root == root
    }

    /// Same recipe identity and source as `recipe`
    #[must_use]
    pub fn matches_recipe(&self, recipe: &Recipe) -> bool {
        self.name == recipe.name()
            && self.version == recipe.version()
            && self.source_digest == recipe.source.digest().map(|d| d.to_string())
    }

    /// Re-hash every entry against the root it was installed into
    ///
    /// # Errors
    ///
    /// Returns an error if an existing entry cannot be read.
    pub async fn check(&self) -> Result<IntegrityReport, Error> {
        let mut report = IntegrityReport {
            name: self.name.clone(),
            version: self.version.clone(),
            entries: self.entries.len(),
            missing: Vec::new(),
            modified: Vec::new(),
        };

        for entry in &self.entries {
            match entry.current_checksum(&self.install_root).await? {
                None => report.missing.push(entry.destination.clone()),
                Some(hash) if hash != entry.checksum => {
                    report.modified.push(entry.destination.clone());
                }
                Some(_) => {}
            }
        }

        Ok(report)
    }
}

/// Result of re-hashing a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub name: String,
    pub version: String,
    pub entries: usize,
    pub missing: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
}

impl IntegrityReport {
    #[must_use]
    pub fn is_intact(&self) -> bool {
        self.missing.is_empty() && self.modified.is_empty()
    }
}

/// JSON manifests under `<state_dir>/manifests`
#[derive(Debug, Clone)]
pub struct ManifestStore {
    dir: PathBuf,
}

impl ManifestStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Write `manifest`, superseding any previous one for the same name
    ///
    /// The document is written to a temporary file and renamed into place.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or any filesystem step fails.
    pub async fn save(&self, manifest: &InstalledManifest) -> Result<PathBuf, Error> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| InstallError::fs("create_dir_all", &self.dir, &e))?;

        let path = self.path_for(&manifest.name);
        let tmp = self
            .dir
            .join(format!(".{}.json.{}", manifest.name, uuid::Uuid::new_v4()));
        let json = serde_json::to_vec_pretty(manifest)?;

        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| InstallError::fs("write", &tmp, &e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(InstallError::fs("rename", &path, &e).into());
        }

        tracing::debug!(name = %manifest.name, path = %path.display(), "manifest saved");
        Ok(path)
    }

    /// # Errors
    ///
    /// Returns `ManifestCorrupt` if the stored document cannot be parsed.
    pub async fn load(&self, name: &str) -> Result<Option<InstalledManifest>, Error> {
        let path = self.path_for(name);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(InstallError::fs("read", &path, &e).into()),
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| {
                InstallError::ManifestCorrupt {
                    name: name.to_string(),
                    message: e.to_string(),
                }
                .into()
            })
    }

    /// Like [`load`](Self::load) but absence is an error
    ///
    /// # Errors
    ///
    /// Returns `NotInstalled` when no manifest exists for `name`.
    pub async fn require(&self, name: &str) -> Result<InstalledManifest, Error> {
        self.load(name).await?.ok_or_else(|| {
            InstallError::NotInstalled {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Every committed manifest, sorted by name
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or a manifest is corrupt.
    pub async fn list(&self) -> Result<Vec<InstalledManifest>, Error> {
        let mut read_dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(InstallError::fs("read_dir", &self.dir, &e).into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| InstallError::fs("read_dir", &self.dir, &e))?
        {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name.starts_with('.') {
                continue;
            }
            if let Some(name) = file_name.strip_suffix(".json") {
                names.push(name.to_string());
            }
        }
        names.sort();

        let mut manifests = Vec::with_capacity(names.len());
        for name in names {
            if let Some(manifest) = self.load(&name).await? {
                manifests.push(manifest);
            }
        }
        Ok(manifests)
    }

    /// # Errors
    ///
    /// Returns an error if the manifest exists and cannot be removed.
    pub async fn remove(&self, name: &str) -> Result<(), Error> {
        let path = self.path_for(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(InstallError::fs("remove_file", &path, &e).into()),
        }
    }

    /// Names of committed manifests that need `name` at runtime
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub async fn dependents(&self, name: &str) -> Result<Vec<String>, Error> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|m| m.name != name && m.runtime_dependencies.iter().any(|d| d == name))
            .map(|m| m.name)
            .collect())
    }
}
