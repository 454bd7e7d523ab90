//! Lookup of recipes by name

use crate::model::Recipe;
use crate::parser::parse_recipe;
use async_trait::async_trait;
use kiln_errors::Error;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Source of recipes the resolver can consult for missing dependencies
#[async_trait]
pub trait RecipeCatalog: Send + Sync {
    /// Find the recipe named `name`, or `None` when no recipe provides it
    ///
    /// # Errors
    ///
    /// Returns an error when a recipe exists but cannot be loaded.
    async fn lookup(&self, name: &str) -> Result<Option<Recipe>, Error>;
}

/// Recipes stored as `<name>.yml` (or `.yaml`) files in a list of directories
///
/// Directories are searched in order; the first match wins.
#[derive(Debug, Clone, Default)]
pub struct DirectoryCatalog {
    dirs: Vec<PathBuf>,
}

impl DirectoryCatalog {
    #[must_use]
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    #[must_use]
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Path the recipe named `name` would be loaded from
    pub async fn locate(&self, name: &str) -> Option<PathBuf> {
        for dir in &self.dirs {
            for ext in ["yml", "yaml"] {
                let candidate = dir.join(format!("{name}.{ext}"));
                if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

#[async_trait]
impl RecipeCatalog for DirectoryCatalog {
    async fn lookup(&self, name: &str) -> Result<Option<Recipe>, Error> {
        // Names with separators never map to a file in a catalog directory
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Ok(None);
        }
        match self.locate(name).await {
            Some(path) => {
                tracing::debug!(name, path = %path.display(), "catalog hit");
                parse_recipe(&path).await.map(Some)
            }
            None => Ok(None),
        }
    }
}

/// In-memory catalog, useful for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    recipes: HashMap<String, Recipe>,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, recipe: Recipe) {
        self.recipes.insert(recipe.name().to_string(), recipe);
    }

    #[must_use]
    pub fn with(mut self, recipe: Recipe) -> Self {
        self.insert(recipe);
        self
    }
}

#[async_trait]
impl RecipeCatalog for MemoryCatalog {
    async fn lookup(&self, name: &str) -> Result<Option<Recipe>, Error> {
        Ok(self.recipes.get(name).cloned())
    }
}

/// Catalogs consulted in order; the first one that knows a name wins
#[derive(Clone, Default)]
pub struct LayeredCatalog {
    layers: Vec<Arc<dyn RecipeCatalog>>,
}

impl LayeredCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, catalog: Arc<dyn RecipeCatalog>) -> Self {
        self.layers.push(catalog);
        self
    }
}

impl std::fmt::Debug for LayeredCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayeredCatalog")
            .field("layers", &self.layers.len())
            .finish()
    }
}

#[async_trait]
impl RecipeCatalog for LayeredCatalog {
    async fn lookup(&self, name: &str) -> Result<Option<Recipe>, Error> {
        for layer in &self.layers {
            if let Some(recipe) = layer.lookup(name).await? {
                return Ok(Some(recipe));
            }
        }
        Ok(None)
    }
}
