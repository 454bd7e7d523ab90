//! Install command implementation
//!
//! Runs one install transaction: resolve the plan, then for each recipe to
//! install fetch and verify its source, unpack it, run its phases, place its
//! artifacts and probe them. Everything placed during the invocation is
//! rolled back if any step fails; manifests are committed only at the end.

use crate::locate::{ensure_supported, load_recipe};
use crate::OpsCtx;
use kiln_builder::{unpack_source, BuildEnvironment, StageRunner};
use kiln_errors::Error;
use kiln_events::{AppEvent, EventEmitter, FetchEvent, TransactionEvent};
use kiln_install::{
    ConditionalInstaller, EntryKind, InstallTransaction, InstalledManifest, Uninstaller,
    VerificationHarness,
};
use kiln_net::fetch_with_retry;
use kiln_recipe::{Recipe, Variables};
use kiln_types::{DependencyPhase, InstallReport, RecipeChange};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Install request
#[derive(Debug, Clone, Default)]
pub struct InstallRequest {
    /// Recipe file path or catalog name
    pub recipe: String,
    /// Reinstall even when an intact install of the same recipe exists
    pub force: bool,
    /// Overrides `[build] jobs`
    pub jobs: Option<usize>,
    /// Keep work directories after the transaction
    pub keep_build_dir: bool,
}

impl InstallRequest {
    #[must_use]
    pub fn new(recipe: impl Into<String>) -> Self {
        Self {
            recipe: recipe.into(),
            ..Self::default()
        }
    }
}

/// A recipe that went through the pipeline and awaits commit
struct Staged {
    change: RecipeChange,
    manifest: InstalledManifest,
    previous: Option<InstalledManifest>,
}

/// Install a recipe and whatever it depends on
///
/// # Errors
///
/// Returns the first error of any stage (recipe, resolve, fetch, build,
/// install, verify). The install root is rolled back before the error is
/// returned; if the rollback itself fails, `RollbackFailed` is returned
/// instead.
#[allow(clippy::too_many_lines)]
pub async fn install(ctx: &OpsCtx, request: &InstallRequest) -> Result<InstallReport, Error> {
    let start = Instant::now();
    let root_dir = ctx.install_root();

    let recipe = load_recipe(ctx, &request.recipe).await?;
    let plan = ctx.resolver(&recipe).await?.resolve(&recipe).await?;

    let mut report = InstallReport {
        transaction_id: None,
        install_root: root_dir.clone(),
        installed: Vec::new(),
        already_installed: Vec::new(),
        satisfied: Vec::new(),
        removed_build_dependencies: Vec::new(),
        duration_ms: 0,
    };

    let mut pending = Vec::new();
    for step in plan.steps() {
        let Some(step_recipe) = step.recipe() else {
            report.satisfied.push(step.name.clone());
            continue;
        };
        if step_recipe.name() != recipe.name() {
            ensure_supported(ctx, step_recipe)?;
        }
        if !request.force && is_intact_install(ctx, step_recipe).await? {
            ctx.emit(AppEvent::Transaction(TransactionEvent::AlreadyInstalled {
                name: step_recipe.name().to_string(),
                version: step_recipe.version().to_string(),
            }));
            report.already_installed.push(step.name.clone());
            continue;
        }
        pending.push((step_recipe, step.phase));
    }

    if pending.is_empty() {
        report.duration_ms = elapsed_ms(start);
        return Ok(report);
    }

    let scratch = ctx.config.state_dir().join("tmp");
    let mut txn = InstallTransaction::begin(ctx.platform.clone(), &root_dir, &scratch, ctx.tx.clone());
    report.transaction_id = Some(txn.id());
    ctx.emit(AppEvent::Transaction(TransactionEvent::Started {
        transaction_id: txn.id(),
        root: root_dir.clone(),
        recipes: pending.iter().map(|(r, _)| r.name().to_string()).collect(),
    }));

    let jobs = request.jobs.unwrap_or_else(|| ctx.config.build_jobs());
    let mut work_dirs = Vec::new();

    let mut staged = Vec::new();
    // the root itself is journaled so a failed first install leaves no trace
    let mut result = txn.ensure_dir(&root_dir).await;
    for (step_recipe, phase) in &pending {
        if result.is_err() {
            break;
        }
        match stage_recipe(ctx, step_recipe, *phase, jobs, &mut txn, &mut work_dirs).await {
            Ok(done) => staged.push(done),
            Err(e) => {
                result = Err(e);
                break;
            }
        }
    }
    if result.is_ok() {
        result = save_manifests(ctx, &staged).await;
    }

    let keep = request.keep_build_dir || ctx.config.build.keep_build_dir;
    if let Err(err) = result {
        let rolled_back = txn.rollback(&err).await;
        cleanup_work_dirs(ctx, &work_dirs, keep).await;
        rolled_back?;
        return Err(err);
    }

    let stale = stale_entries(&root_dir, &staged);
    let txn_id = txn.id();
    // manifests are already saved; leftovers of superseded installs are reported
    if let Err(e) = txn.commit(&stale).await {
        ctx.emit_warning_with_context(
            "some superseded artifacts could not be removed",
            e.to_string(),
        );
    }
    ctx.emit(AppEvent::Transaction(TransactionEvent::Committed {
        transaction_id: txn_id,
        manifests: staged.iter().map(|s| s.manifest.name.clone()).collect(),
    }));
    cleanup_work_dirs(ctx, &work_dirs, keep).await;

    if ctx.config.build.remove_build_dependencies {
        report.removed_build_dependencies = remove_build_dependencies(ctx, &staged).await;
    }

    report.installed = staged.into_iter().map(|s| s.change).collect();
    report.duration_ms = elapsed_ms(start);
    Ok(report)
}

async fn is_intact_install(ctx: &OpsCtx, recipe: &Recipe) -> Result<bool, Error> {
    match ctx.manifest_in_root(recipe.name()).await? {
        Some(manifest) if manifest.matches_recipe(recipe) => Ok(manifest.check().await?.is_intact()),
        _ => Ok(false),
    }
}

/// Fetch, unpack, build, place and verify one recipe inside `txn`
async fn stage_recipe(
    ctx: &OpsCtx,
    recipe: &Recipe,
    phase: DependencyPhase,
    jobs: usize,
    txn: &mut InstallTransaction,
    work_dirs: &mut Vec<PathBuf>,
) -> Result<Staged, Error> {
    let root_dir = txn.root().to_path_buf();
    let work_dir = ctx.config.build_dir().join(format!(
        "{}-{}-{}",
        recipe.name(),
        recipe.version(),
        txn.id().simple()
    ));
    tokio::fs::create_dir_all(&work_dir)
        .await
        .map_err(|e| Error::io_with_path(&e, &work_dir))?;
    work_dirs.push(work_dir.clone());

    let fetched =
        fetch_with_retry(ctx.transport.as_ref(), recipe, &ctx.retry, ctx.tx.as_ref()).await?;
    let archive = fetched.write_to(&work_dir).await?;
    let unpacked = unpack_source(&archive, &work_dir.join("src")).await?;
    ctx.emit(AppEvent::Fetch(FetchEvent::Unpacked {
        recipe: recipe.name().to_string(),
        source_dir: unpacked.source_dir.clone(),
        entries: unpacked.entries,
    }));

    let vars = Variables::for_recipe(recipe, &root_dir, jobs);
    let env = BuildEnvironment::for_recipe(recipe, &root_dir, jobs, &vars);
    StageRunner::new(ctx.platform.clone())
        .with_event_sender(ctx.tx.clone())
        .run(recipe, &unpacked.source_dir, env, &vars)
        .await?;

    let previous = ctx.manifest_in_root(recipe.name()).await?;
    let outcome = ConditionalInstaller::new(ctx.tx.clone())
        .install(recipe, &unpacked.source_dir, txn, previous.as_ref())
        .await?;

    VerificationHarness::new(ctx.platform.clone(), ctx.tx.clone())
        .run(recipe, &root_dir, &vars)
        .await?;

    let change = RecipeChange {
        name: recipe.name().to_string(),
        version: recipe.version().to_string(),
        from_version: previous.as_ref().map(|p| p.version.clone()),
        phase,
        artifacts: outcome.entries.len(),
        skipped: outcome.skipped.len(),
    };
    Ok(Staged {
        change,
        manifest: InstalledManifest::new(recipe, &root_dir, outcome.entries),
        previous,
    })
}

/// Write every new manifest, putting the previous ones back if any write fails
async fn save_manifests(ctx: &OpsCtx, staged: &[Staged]) -> Result<(), Error> {
    for (saved, item) in staged.iter().enumerate() {
        if let Err(err) = ctx.store.save(&item.manifest).await {
            for done in &staged[..saved] {
                let restored = match &done.previous {
                    Some(previous) => ctx.store.save(previous).await.map(|_| ()),
                    None => ctx.store.remove(&done.manifest.name).await,
                };
                if let Err(e) = restored {
                    tracing::error!(recipe = %done.manifest.name, error = %e, "could not restore manifest");
                }
            }
            return Err(err);
        }
    }
    Ok(())
}

/// Entries of superseded manifests the new ones no longer contain
fn stale_entries(root: &Path, staged: &[Staged]) -> Vec<(PathBuf, EntryKind)> {
    staged
        .iter()
        .filter_map(|s| s.previous.as_ref().map(|p| (p, &s.manifest)))
        .flat_map(|(previous, manifest)| {
            previous
                .entries
                .iter()
                .filter(|e| !manifest.owns(&e.destination))
                .map(|e| (root.join(&e.destination), e.kind))
        })
        .collect()
}

/// Uninstall build-only dependencies this install put in place
///
/// Failures are reported as warnings; the install itself already committed.
async fn remove_build_dependencies(ctx: &OpsCtx, staged: &[Staged]) -> Vec<String> {
    let uninstaller = Uninstaller::new(ctx.store.clone(), ctx.tx.clone());
    let mut removed = Vec::new();

    for item in staged.iter().filter(|s| s.change.phase == DependencyPhase::Build) {
        let name = &item.change.name;
        match uninstaller.uninstall(name, false).await {
            Ok(_) => removed.push(name.clone()),
            Err(e) => ctx.emit_warning_with_context(
                format!("kept build dependency {name}"),
                e.to_string(),
            ),
        }
    }
    removed
}

async fn cleanup_work_dirs(ctx: &OpsCtx, dirs: &[PathBuf], keep: bool) {
    if keep {
        return;
    }
    for dir in dirs {
        if let Err(e) = tokio::fs::remove_dir_all(dir).await {
            ctx.emit_warning_with_context(
                format!("could not remove build directory {}", dir.display()),
                e.to_string(),
            );
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
