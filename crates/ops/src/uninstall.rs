//! Uninstall command implementation
//!
//! Delegates to `kiln_install` for the actual removal.

use crate::OpsCtx;
use kiln_errors::Error;
use kiln_install::{UninstallReport, Uninstaller};

/// Remove an installed recipe
///
/// # Errors
///
/// Returns `NotInstalled` when `name` has no manifest and `HasDependents`
/// when another installed recipe needs it at runtime and `force` is unset.
pub async fn uninstall(ctx: &OpsCtx, name: &str, force: bool) -> Result<UninstallReport, Error> {
    let report = Uninstaller::new(ctx.store.clone(), ctx.tx.clone())
        .uninstall(name, force)
        .await?;
    tracing::debug!(
        recipe = name,
        removed = report.removed.len(),
        modified = report.modified.len(),
        "uninstalled"
    );
    Ok(report)
}
