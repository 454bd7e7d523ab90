//! `${VAR}` expansion for commands and environment values

use crate::model::Recipe;
use kiln_types::DestinationCategory;
use std::collections::BTreeMap;
use std::path::Path;

/// Variable table used to expand recipe strings
#[derive(Debug, Clone, Default)]
pub struct Variables {
    values: BTreeMap<String, String>,
}

impl Variables {
    /// Built-in variables for `recipe` installed under `install_root`
    ///
    /// Facts are expanded against the built-ins first and may then be
    /// referenced by commands and environment variables.
    #[must_use]
    pub fn for_recipe(recipe: &Recipe, install_root: &Path, jobs: usize) -> Self {
        let mut vars = Self::default();
        vars.insert("NAME", recipe.name());
        vars.insert("VERSION", recipe.version());
        vars.insert("PREFIX", install_root.display().to_string());
        vars.insert("JOBS", jobs.to_string());
        for category in DestinationCategory::all() {
            vars.insert(
                category.variable_name(),
                install_root
                    .join(category.relative_dir(recipe.name()))
                    .display()
                    .to_string(),
            );
        }

        for (key, value) in &recipe.facts {
            let expanded = vars.expand(value);
            vars.insert(key.clone(), expanded);
        }

        vars
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Replace every `${NAME}` whose name is known; unknown references are
    /// left untouched so tools that use the same syntax still see them.
    #[must_use]
    pub fn expand(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) => {
                    let key = &after[..end];
                    match self.values.get(key) {
                        Some(value) => out.push_str(value),
                        None => {
                            out.push_str("${");
                            out.push_str(key);
                            out.push('}');
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }

    #[must_use]
    pub fn expand_all(&self, inputs: &[String]) -> Vec<String> {
        inputs.iter().map(|s| self.expand(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_recipe_from_str;

    const RECIPE: &str = r#"
metadata: { name: o2l, version: 0.0.1 }
source: { url: "https://example.invalid/o2l.tar.gz", sha256: "" }
facts:
  BUILD_TYPE: Release
  OUT: "${PREFIX}/out"
verify:
  - run: ["${BIN}/o2l", --version]
    expect: { contains: "0.0.1" }
"#;

    #[test]
    fn builtins_and_facts_expand() {
        let recipe = parse_recipe_from_str(RECIPE, "o2l.yml").unwrap();
        let vars = Variables::for_recipe(&recipe, Path::new("/opt/kiln"), 4);

        assert_eq!(vars.expand("${BIN}/o2l"), "/opt/kiln/bin/o2l");
        assert_eq!(vars.expand("${DOC}"), "/opt/kiln/share/doc/o2l");
        assert_eq!(vars.expand("${SHARE}"), "/opt/kiln/share/o2l");
        assert_eq!(
            vars.expand("-DCMAKE_BUILD_TYPE=${BUILD_TYPE} -j${JOBS}"),
            "-DCMAKE_BUILD_TYPE=Release -j4"
        );
        assert_eq!(vars.expand("${OUT}"), "/opt/kiln/out");
        assert_eq!(vars.expand("${NAME}-${VERSION}"), "o2l-0.0.1");
    }

    #[test]
    fn unknown_and_unterminated_references_survive() {
        let mut vars = Variables::default();
        vars.insert("A", "1");
        assert_eq!(vars.expand("${A}${B}"), "1${B}");
        assert_eq!(vars.expand("$A ${A"), "$A ${A");
        assert_eq!(vars.expand("plain"), "plain");
    }
}
