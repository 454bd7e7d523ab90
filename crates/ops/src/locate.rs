//! Turning a command-line recipe argument into a checked recipe

use crate::OpsCtx;
use kiln_errors::{Error, RecipeError};
use kiln_events::{AppEvent, EventEmitter, FailureContext, RecipeEvent};
use kiln_recipe::{check_platform, parse_recipe, Recipe};
use std::path::{Path, PathBuf};

/// Load the recipe named by `locator` and check it against the host
///
/// A locator naming a file (a `.yml`/`.yaml` extension, a path separator,
/// or an existing path) is parsed directly; anything else is looked up in
/// the catalog by name.
///
/// # Errors
///
/// Returns `ReadFailed` or `MalformedRecipe` for a bad file, `NotFound` when
/// the catalog has no such recipe, and `UnsupportedPlatform` when the host
/// does not match.
pub async fn load_recipe(ctx: &OpsCtx, locator: &str) -> Result<Recipe, Error> {
    let recipe = if looks_like_path(locator).await {
        let path = Path::new(locator);
        parse_recipe(path).await.inspect_err(|e| {
            ctx.emit(AppEvent::Recipe(RecipeEvent::Rejected {
                path: path.to_path_buf(),
                failure: FailureContext::from_error(e),
            }));
        })?
    } else {
        ctx.catalog
            .lookup(locator)
            .await?
            .ok_or_else(|| RecipeError::NotFound {
                name: locator.to_string(),
            })?
    };

    ctx.emit(AppEvent::Recipe(RecipeEvent::Loaded {
        name: recipe.name().to_string(),
        version: recipe.version().to_string(),
        path: recipe
            .origin()
            .map_or_else(|| PathBuf::from(locator), Path::to_path_buf),
    }));

    ensure_supported(ctx, &recipe)?;
    Ok(recipe)
}

/// Evaluate a recipe's platform section against the context's host
///
/// # Errors
///
/// Returns `UnsupportedPlatform` when the host does not match.
pub fn ensure_supported(ctx: &OpsCtx, recipe: &Recipe) -> Result<(), Error> {
    let result = check_platform(recipe, &ctx.host);
    ctx.emit(AppEvent::Recipe(RecipeEvent::PlatformChecked {
        name: recipe.name().to_string(),
        host_os: ctx.host.os.clone(),
        host_arch: ctx.host.arch.clone(),
        host_os_version: ctx.host.os_version.clone(),
        supported: result.is_ok(),
    }));
    result.map_err(Into::into)
}

async fn looks_like_path(locator: &str) -> bool {
    let path = Path::new(locator);
    let has_recipe_ext = path
        .extension()
        .is_some_and(|ext| ext == "yml" || ext == "yaml");
    has_recipe_ext
        || locator.contains(std::path::MAIN_SEPARATOR)
        || tokio::fs::try_exists(path).await.unwrap_or(false)
}
