//! Read-only operations: plan, fetch, list, info and check

use crate::locate::load_recipe;
use crate::OpsCtx;
use kiln_errors::Error;
use kiln_install::{EntryKind, InstalledManifest, IntegrityReport};
use kiln_net::fetch_with_retry;
use kiln_types::{
    ArtifactInfo, FetchReport, InstalledRecipe, PlanEntry, PlanEntryAction, PlanReport,
    RecipeInfo,
};
use std::path::Path;

/// Resolve a recipe's install plan without touching the install root
///
/// # Errors
///
/// Returns recipe loading errors, `UnresolvedDependency` and
/// `DependencyCycle`.
pub async fn plan(ctx: &OpsCtx, locator: &str) -> Result<PlanReport, Error> {
    let recipe = load_recipe(ctx, locator).await?;
    let plan = ctx.resolver(&recipe).await?.resolve(&recipe).await?;

    let steps = plan
        .steps()
        .iter()
        .map(|step| PlanEntry {
            name: step.name.clone(),
            version: step.version.clone(),
            phase: step.phase,
            action: if step.is_install() {
                PlanEntryAction::Install
            } else {
                PlanEntryAction::Satisfied
            },
            reason: step.reason.clone(),
        })
        .collect();

    Ok(PlanReport {
        recipe: recipe.name().to_string(),
        version: recipe.version().to_string(),
        steps,
    })
}

/// Fetch a recipe's source and check its digest
///
/// With `dest`, the verified archive is written into that directory.
///
/// # Errors
///
/// Returns recipe loading errors and every fetch error, including
/// `MissingIntegrityDigest` and `IntegrityMismatch`.
pub async fn fetch(ctx: &OpsCtx, locator: &str, dest: Option<&Path>) -> Result<FetchReport, Error> {
    let recipe = load_recipe(ctx, locator).await?;
    let fetched =
        fetch_with_retry(ctx.transport.as_ref(), &recipe, &ctx.retry, ctx.tx.as_ref()).await?;

    let path = match dest {
        Some(dir) => {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| Error::io_with_path(&e, dir))?;
            Some(fetched.write_to(dir).await?)
        }
        None => None,
    };

    Ok(FetchReport {
        recipe: recipe.name().to_string(),
        version: recipe.version().to_string(),
        uri: fetched.uri.clone(),
        digest: fetched.digest.to_string(),
        size: fetched.size(),
        path,
    })
}

/// Every committed install, sorted by name
///
/// # Errors
///
/// Returns an error if the manifest store cannot be read.
pub async fn list(ctx: &OpsCtx) -> Result<Vec<InstalledRecipe>, Error> {
    Ok(ctx.store.list().await?.iter().map(summarize).collect())
}

/// Full record of one committed install
///
/// # Errors
///
/// Returns `NotInstalled` when `name` has no manifest.
pub async fn info(ctx: &OpsCtx, name: &str) -> Result<RecipeInfo, Error> {
    let manifest = ctx.store.require(name).await?;
    let dependents = ctx.store.dependents(name).await?;

    let artifacts = manifest
        .entries
        .iter()
        .map(|entry| ArtifactInfo {
            destination: entry.destination.clone(),
            category: entry.category.to_string(),
            kind: match entry.kind {
                EntryKind::File => "file".to_string(),
                EntryKind::Directory => "directory".to_string(),
            },
            checksum: entry.checksum.to_hex(),
        })
        .collect();

    Ok(RecipeInfo {
        summary: summarize(&manifest),
        source_url: manifest.source_url,
        source_digest: manifest.source_digest,
        install_root: manifest.install_root,
        artifacts,
        dependents,
    })
}

/// Re-hash an installed recipe's artifacts
///
/// # Errors
///
/// Returns `NotInstalled` when `name` has no manifest, or an error if an
/// artifact exists but cannot be read.
pub async fn check(ctx: &OpsCtx, name: &str) -> Result<IntegrityReport, Error> {
    let manifest = ctx.store.require(name).await?;
    manifest.check().await
}

fn summarize(manifest: &InstalledManifest) -> InstalledRecipe {
    InstalledRecipe {
        name: manifest.name.clone(),
        version: manifest.version.clone(),
        license: manifest.license.clone(),
        installed_at: manifest.installed_at,
        entries: manifest.entries.len(),
        runtime_dependencies: manifest.runtime_dependencies.clone(),
        build_dependencies: manifest.build_dependencies.clone(),
    }
}
