//! YAML recipe parser with validation

use crate::model::{OptionalPhase, Recipe};
use kiln_errors::{Error, RecipeError};
use std::collections::HashSet;
use std::path::{Component, Path};

/// Names that would collide with fixed install layout directories
const RESERVED_NAMES: &[&str] = &["doc"];

/// Parse a YAML recipe from a file
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read
/// - The YAML is invalid
/// - Required fields are missing
/// - Validation fails
pub async fn parse_recipe(path: &Path) -> Result<Recipe, Error> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| RecipeError::ReadFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    let mut recipe = parse_recipe_from_str(&content, &path.display().to_string())?;
    recipe.origin = Some(path.to_path_buf());
    tracing::debug!(recipe = %recipe, path = %path.display(), "loaded recipe");
    Ok(recipe)
}

/// Parse a YAML recipe from a string
///
/// `source_name` identifies the document in error messages.
///
/// # Errors
///
/// Returns `MalformedRecipe` if the YAML is invalid, a required field is
/// missing, or validation fails.
pub fn parse_recipe_from_str(content: &str, source_name: &str) -> Result<Recipe, Error> {
    let recipe: Recipe = serde_yml::from_str(content)
        .map_err(|e| RecipeError::malformed(source_name, format!("invalid YAML: {e}")))?;

    validate_recipe(&recipe).map_err(|message| RecipeError::malformed(source_name, message))?;

    Ok(recipe)
}

/// Validate a parsed recipe, returning a description of the first problem
fn validate_recipe(recipe: &Recipe) -> Result<(), String> {
    validate_name(&recipe.metadata.name, "metadata.name")?;
    if RESERVED_NAMES.contains(&recipe.metadata.name.as_str()) {
        return Err(format!(
            "metadata.name `{}` is reserved",
            recipe.metadata.name
        ));
    }

    let version = recipe.metadata.version.trim();
    if version.is_empty() {
        return Err("metadata.version cannot be empty".to_string());
    }
    if version.contains(['/', '\\']) || version.chars().any(char::is_whitespace) {
        return Err(format!("metadata.version `{version}` is not a plain version"));
    }

    validate_source(recipe)?;
    validate_dependencies(recipe)?;

    for key in recipe.environment.variables.keys() {
        if !is_identifier(key) {
            return Err(format!("environment variable name `{key}` is invalid"));
        }
    }
    for key in recipe.facts.keys() {
        if !is_identifier(key) {
            return Err(format!("fact name `{key}` is invalid"));
        }
    }

    if let Some(configure) = &recipe.phases.configure {
        if configure.is_empty() {
            return Err("phases.configure must name a program".to_string());
        }
    }
    if let Some(build) = &recipe.phases.build {
        if build.is_empty() {
            return Err("phases.build must name a program".to_string());
        }
    }
    if let Some(test) = &recipe.phases.test {
        validate_optional_phase(test, "phases.test")?;
    }
    if let Some(smoke) = &recipe.phases.smoke {
        validate_optional_phase(smoke, "phases.smoke")?;
    }

    for (index, action) in recipe.install.iter().enumerate() {
        validate_relative(&action.source, &format!("install[{index}].source"))?;
        if let Some(rename) = &action.rename {
            validate_name(rename, &format!("install[{index}].rename"))?;
        }
    }

    if recipe.verify.is_empty() {
        return Err("verify must declare at least one check".to_string());
    }
    for (index, check) in recipe.verify.iter().enumerate() {
        if check.run.is_empty() {
            return Err(format!("verify[{index}].run must name a program"));
        }
    }

    Ok(())
}

fn validate_source(recipe: &Recipe) -> Result<(), String> {
    let source = &recipe.source;
    if source.url.trim().is_empty() {
        return Err("source.url cannot be empty".to_string());
    }
    if source.sha256.is_some() && source.blake3.is_some() {
        return Err("source declares both sha256 and blake3; keep one".to_string());
    }
    // Placeholders are rejected at fetch time; anything else must be well formed
    if let Some(digest) = source.digest() {
        if !digest.is_placeholder() {
            digest.validate().map_err(|e| format!("source digest: {e}"))?;
        }
    }
    Ok(())
}

fn validate_dependencies(recipe: &Recipe) -> Result<(), String> {
    let mut seen = HashSet::new();
    for (index, dep) in recipe.dependencies.iter().enumerate() {
        validate_name(&dep.name, &format!("dependencies[{index}].name"))?;
        if !seen.insert(dep.name.as_str()) {
            return Err(format!("dependency `{}` is declared twice", dep.name));
        }
    }
    Ok(())
}

fn validate_optional_phase(phase: &OptionalPhase, field: &str) -> Result<(), String> {
    validate_relative(&phase.requires, &format!("{field}.requires"))?;
    if phase.command.is_empty() {
        return Err(format!("{field}.command must name a program"));
    }
    Ok(())
}

/// A single, non-empty path segment without separators or traversal
fn validate_name(name: &str, field: &str) -> Result<(), String> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.chars().any(|c| c.is_whitespace() || c.is_control());
    if valid {
        Ok(())
    } else {
        Err(format!("{field} `{name}` must be a single path-safe segment"))
    }
}

/// Relative path that stays inside its base directory
fn validate_relative(path: &Path, field: &str) -> Result<(), String> {
    if path.as_os_str().is_empty() {
        return Err(format!("{field} cannot be empty"));
    }
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(format!(
            "{field} `{}` must be relative and must not contain `..`",
            path.display()
        ));
    }
    Ok(())
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Expectation, InstallPredicate};
    use kiln_types::{DependencyPhase, DestinationCategory};

    fn recipe_with(extra: &str) -> String {
        format!(
            r#"
metadata:
  name: o2l
  version: 0.0.1
  license: Apache-2.0
source:
  url: https://github.com/zombocoder/o2l/archive/refs/tags/v0.0.1.tar.gz
  sha256: "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
verify:
  - run: ["${{BIN}}/o2l", --version]
    expect: {{ contains: "0.0.1" }}
{extra}"#
        )
    }

    fn malformed_message(content: &str) -> String {
        match parse_recipe_from_str(content, "test.yml").unwrap_err() {
            Error::Recipe(RecipeError::MalformedRecipe { message, .. }) => message,
            other => panic!("expected MalformedRecipe, got {other:?}"),
        }
    }

    #[test]
    fn parses_full_document() {
        let recipe = parse_recipe_from_str(
            &recipe_with(
                r"
dependencies:
  - { name: cmake, phase: build }
  - { name: googletest, phase: build-only }
  - { name: libffi }
  - { name: ninja, phase: build, version: '>=1.10.0' }
environment:
  cxx_standard: 23
phases:
  configure: [cmake, -B, build, -GNinja]
  build: [cmake, --build, build]
  test: { requires: build/tests/o2l_tests, command: [./build/tests/o2l_tests] }
install:
  - { source: build/bin/o2l, category: bin }
  - { source: build/bin/o2l-fmt, category: bin, when: exists }
  - { source: examples, category: share, when: dir_exists }
",
            ),
            "o2l.yml",
        )
        .unwrap();

        assert_eq!(recipe.name(), "o2l");
        assert_eq!(recipe.build_dependencies(), vec!["cmake", "googletest", "ninja"]);
        assert_eq!(recipe.runtime_dependencies(), vec!["libffi"]);
        assert_eq!(recipe.dependencies[1].phase, DependencyPhase::Build);
        assert!(recipe.dependencies[0].version.is_any());
        assert!(!recipe.dependencies[3].version.is_any());
        assert_eq!(recipe.environment.cxx_standard, Some(23));
        assert_eq!(recipe.install[0].when, InstallPredicate::Always);
        assert_eq!(recipe.install[1].when, InstallPredicate::Exists);
        assert_eq!(recipe.install[2].category, DestinationCategory::Share);
        assert!(recipe.phases.smoke.is_none());
        assert_eq!(
            recipe.verify[0].expect,
            Expectation::Contains {
                contains: "0.0.1".to_string()
            }
        );
        assert_eq!(recipe.source.file_name(), "v0.0.1.tar.gz");
        assert!(recipe.origin().is_none());
    }

    #[test]
    fn empty_verify_list_is_malformed() {
        let content = r"
metadata: { name: o2l, version: 0.0.1 }
source: { url: https://example.invalid/o2l.tar.gz }
verify: []
";
        assert!(malformed_message(content).contains("verify"));
    }

    #[test]
    fn missing_source_url_is_malformed() {
        let content = r#"
metadata: { name: o2l, version: 0.0.1 }
source: { sha256: "" }
verify:
  - { run: [o2l], expect: { exit_code: 0 } }
"#;
        assert!(malformed_message(content).contains("url"));
    }

    #[test]
    fn placeholder_digest_still_loads() {
        let content = r#"
metadata: { name: o2l, version: 0.0.1 }
source: { url: https://example.invalid/o2l.tar.gz, sha256: "" }
verify:
  - { run: [o2l], expect: { exit_code: 0 } }
"#;
        let recipe = parse_recipe_from_str(content, "o2l.yml").unwrap();
        assert!(recipe.source.digest().unwrap().is_placeholder());
    }

    #[test]
    fn malformed_digest_is_rejected_at_load() {
        let content = r#"
metadata: { name: o2l, version: 0.0.1 }
source: { url: https://example.invalid/o2l.tar.gz, sha256: "abc123" }
verify:
  - { run: [o2l], expect: { exit_code: 0 } }
"#;
        assert!(malformed_message(content).contains("digest"));
    }

    #[test]
    fn names_must_be_path_safe() {
        let bad = recipe_with("").replace("name: o2l", "name: ../o2l");
        assert!(malformed_message(&bad).contains("metadata.name"));

        let reserved = recipe_with("").replace("name: o2l", "name: doc");
        assert!(malformed_message(&reserved).contains("reserved"));
    }

    #[test]
    fn install_sources_cannot_escape() {
        let content = recipe_with(
            r"
install:
  - { source: ../../etc/passwd, category: doc }
",
        );
        assert!(malformed_message(&content).contains("install[0].source"));
    }

    #[test]
    fn duplicate_dependencies_are_rejected() {
        let content = recipe_with(
            r"
dependencies:
  - { name: cmake, phase: build }
  - { name: cmake }
",
        );
        assert!(malformed_message(&content).contains("twice"));
    }

    #[test]
    fn invalid_yaml_is_malformed() {
        let err = parse_recipe_from_str("metadata: [", "broken.yml").unwrap_err();
        assert!(matches!(
            err,
            Error::Recipe(RecipeError::MalformedRecipe { .. })
        ));
    }

    #[tokio::test]
    async fn parse_from_file_records_origin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("o2l.yml");
        tokio::fs::write(&path, recipe_with("")).await.unwrap();

        let recipe = parse_recipe(&path).await.unwrap();
        assert_eq!(recipe.origin(), Some(path.as_path()));
        assert_eq!(recipe.base_dir(), Some(dir.path()));
    }

    #[tokio::test]
    async fn unreadable_file_is_read_failed() {
        let err = parse_recipe(Path::new("/nonexistent/o2l.yml"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Recipe(RecipeError::ReadFailed { .. })));
    }
}
