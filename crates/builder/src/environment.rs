//! Build environment scoped to phase processes
//!
//! The environment is a plain value. It is applied to each child command
//! with `env_clear()` first, so nothing leaks in from the invoking process
//! beyond the few variables copied into the base, and nothing is ever set
//! on the invoking process itself.

use kiln_platform::PlatformCommand;
use kiln_recipe::{Recipe, Variables};
use std::collections::BTreeMap;
use std::path::Path;

/// Host variables worth carrying into a clean build environment
const PASSTHROUGH_VARS: &[&str] = &["HOME", "USER", "LANG", "LC_ALL", "TMPDIR", "TERM"];

/// System directories appended after the install root's `bin`
const SYSTEM_PATH: &[&str] = &["/usr/local/bin", "/usr/bin", "/bin", "/usr/sbin", "/sbin"];

/// Environment variables for one recipe's phase processes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEnvironment {
    vars: BTreeMap<String, String>,
}

impl BuildEnvironment {
    /// Environment for building `recipe` against `install_root`
    ///
    /// Recipe variables are expanded with `vars` and win over every computed
    /// default.
    #[must_use]
    pub fn for_recipe(recipe: &Recipe, install_root: &Path, jobs: usize, vars: &Variables) -> Self {
        Self::with_host(recipe, install_root, jobs, vars, |key| std::env::var(key).ok())
    }

    /// Like [`for_recipe`](Self::for_recipe) with an explicit host lookup
    #[must_use]
    pub fn with_host<F>(
        recipe: &Recipe,
        install_root: &Path,
        jobs: usize,
        vars: &Variables,
        host: F,
    ) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env = Self::default();
        env.setup_clean_base(install_root, &host);
        env.setup_prefix_paths(install_root, jobs);

        if let Some(standard) = recipe.environment.cxx_standard {
            env.append_flag("CXXFLAGS", &format!("-std=c++{standard}"));
        }

        for (key, value) in &recipe.environment.variables {
            env.set(key, vars.expand(value));
        }

        env
    }

    fn setup_clean_base<F>(&mut self, install_root: &Path, host: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let root_bin = install_root.join("bin").display().to_string();
        let path = std::iter::once(root_bin.as_str())
            .chain(SYSTEM_PATH.iter().copied())
            .collect::<Vec<_>>()
            .join(":");
        self.set("PATH", path);

        for key in PASSTHROUGH_VARS {
            if let Some(value) = host(key) {
                self.set(*key, value);
            }
        }
    }

    fn setup_prefix_paths(&mut self, install_root: &Path, jobs: usize) {
        let root = install_root.display().to_string();
        let include = install_root.join("include").display().to_string();
        let lib = install_root.join("lib").display().to_string();

        self.set("PREFIX", root.clone());
        self.set("JOBS", jobs.to_string());
        self.set("MAKEFLAGS", format!("-j{jobs}"));

        for key in ["CPPFLAGS", "CFLAGS", "CXXFLAGS"] {
            self.set(key, format!("-I{include}"));
        }
        self.set("LDFLAGS", format!("-L{lib}"));
        self.set("LIBRARY_PATH", lib.clone());
        self.set(
            "PKG_CONFIG_PATH",
            install_root.join("lib").join("pkgconfig").display().to_string(),
        );
        self.set("CMAKE_PREFIX_PATH", root);
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Append a space-separated flag to `key`
    pub fn append_flag(&mut self, key: &str, flag: &str) {
        match self.vars.get_mut(key) {
            Some(value) if !value.is_empty() => {
                value.push(' ');
                value.push_str(flag);
            }
            _ => self.set(key, flag),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// Scope this environment onto a child command
    pub fn apply(&self, cmd: &mut PlatformCommand) {
        cmd.env_clear().envs(self.vars.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_recipe::parse_recipe_from_str;

    fn recipe() -> Recipe {
        parse_recipe_from_str(
            r#"
metadata: { name: o2l, version: 0.0.1 }
source: { url: "https://example.invalid/o2l.tar.gz" }
environment:
  cxx_standard: 23
  variables:
    MACOSX_DEPLOYMENT_TARGET: "12.0"
    CMAKE_PREFIX_PATH: "${PREFIX}/opt"
verify:
  - { run: [o2l], expect: { exit_code: 0 } }
"#,
            "o2l.yml",
        )
        .unwrap()
    }

    fn env() -> BuildEnvironment {
        let recipe = recipe();
        let root = Path::new("/opt/kiln");
        let vars = Variables::for_recipe(&recipe, root, 4);
        BuildEnvironment::with_host(&recipe, root, 4, &vars, |key| match key {
            "HOME" => Some("/home/builder".to_string()),
            "CFLAGS" => Some("-O0 -leak".to_string()),
            _ => None,
        })
    }

    #[test]
    fn base_is_clean_and_rooted() {
        let env = env();
        assert_eq!(
            env.get("PATH"),
            Some("/opt/kiln/bin:/usr/local/bin:/usr/bin:/bin:/usr/sbin:/sbin")
        );
        assert_eq!(env.get("HOME"), Some("/home/builder"));
        assert_eq!(env.get("USER"), None);
        assert_eq!(env.get("CFLAGS"), Some("-I/opt/kiln/include"));
        assert_eq!(env.get("LDFLAGS"), Some("-L/opt/kiln/lib"));
        assert_eq!(env.get("MAKEFLAGS"), Some("-j4"));
        assert_eq!(env.get("PKG_CONFIG_PATH"), Some("/opt/kiln/lib/pkgconfig"));
    }

    #[test]
    fn cxx_standard_and_recipe_variables_apply() {
        let env = env();
        assert_eq!(
            env.get("CXXFLAGS"),
            Some("-I/opt/kiln/include -std=c++23")
        );
        assert_eq!(env.get("MACOSX_DEPLOYMENT_TARGET"), Some("12.0"));
        // recipe variables override computed defaults
        assert_eq!(env.get("CMAKE_PREFIX_PATH"), Some("/opt/kiln/opt"));
    }

    #[test]
    fn apply_clears_inherited_environment() {
        let env = env();
        let mut cmd = PlatformCommand::new("cmake");
        env.apply(&mut cmd);
        assert!(cmd.clears_env());
        assert_eq!(cmd.get_env_vars(), env.vars());
    }
}
