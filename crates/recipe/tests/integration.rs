//! Integration tests for recipe loading

#[cfg(test)]
mod tests {
    use kiln_errors::{Error, RecipeError};
    use kiln_platform::HostInfo;
    use kiln_recipe::*;
    use kiln_types::{DependencyPhase, DestinationCategory};
    use std::path::{Path, PathBuf};

    fn sample_recipe_path() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../recipes/o2l.yml")
    }

    #[tokio::test]
    async fn test_bundled_o2l_recipe_loads() {
        let recipe = parse_recipe(&sample_recipe_path()).await.unwrap();

        assert_eq!(recipe.to_string(), "o2l-0.0.1");
        assert_eq!(recipe.metadata.license.as_deref(), Some("Apache-2.0"));
        assert_eq!(
            recipe.build_dependencies(),
            vec!["cmake", "ninja", "pkg-config", "googletest"]
        );
        assert_eq!(recipe.runtime_dependencies(), vec!["libffi"]);
        assert_eq!(recipe.environment.cxx_standard, Some(23));

        // Only the main binary and the two required docs are mandatory
        let required: Vec<_> = recipe
            .install
            .iter()
            .filter(|a| a.when.is_required())
            .map(|a| a.source.display().to_string())
            .collect();
        assert_eq!(required, vec!["build/bin/o2l", "README.md", "LICENSE"]);

        let share = recipe
            .install
            .iter()
            .filter(|a| a.category == DestinationCategory::Share)
            .count();
        assert_eq!(share, 3);

        // Digest left empty in the bundled recipe
        assert!(recipe.source.digest().unwrap().is_placeholder());
    }

    #[tokio::test]
    async fn test_bundled_recipe_platform_gate() {
        let recipe = parse_recipe(&sample_recipe_path()).await.unwrap();

        let monterey = HostInfo::new("macos", "aarch64", Some("12.0".into()));
        assert!(check_platform(&recipe, &monterey).is_ok());

        let big_sur = HostInfo::new("macos", "x86_64", Some("11.6".into()));
        assert!(check_platform(&recipe, &big_sur).is_err());

        let linux = HostInfo::new("linux", "x86_64", Some("6.8".into()));
        assert!(matches!(
            check_platform(&recipe, &linux),
            Err(RecipeError::UnsupportedPlatform { .. })
        ));
    }

    #[tokio::test]
    async fn test_variables_expand_phase_commands() {
        let recipe = parse_recipe(&sample_recipe_path()).await.unwrap();
        let vars = Variables::for_recipe(&recipe, Path::new("/opt/kiln"), 8);

        let configure = vars.expand_all(recipe.phases.configure.as_ref().unwrap());
        assert!(configure.contains(&"-DCMAKE_BUILD_TYPE=Release".to_string()));
        assert!(configure.contains(&"-DCMAKE_INSTALL_PREFIX=/opt/kiln".to_string()));

        let probe = vars.expand_all(&recipe.verify[0].run);
        assert_eq!(probe, vec!["/opt/kiln/bin/o2l", "--version"]);
    }

    #[tokio::test]
    async fn test_directory_catalog_finds_bundled_recipe() {
        let dir = sample_recipe_path().parent().unwrap().to_path_buf();
        let catalog = DirectoryCatalog::new(vec![dir]);
        let recipe = catalog.lookup("o2l").await.unwrap().unwrap();
        assert_eq!(recipe.dependencies[2].phase, DependencyPhase::Runtime);
    }

    #[test]
    fn test_missing_metadata_is_malformed() {
        let err = parse_recipe_from_str(
            "source: { url: https://example.invalid/x.tar.gz }\nverify: []\n",
            "x.yml",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Recipe(RecipeError::MalformedRecipe { ref source_name, .. }) if source_name == "x.yml"
        ));
    }
}
