//! End-to-end tests driving the kiln binary

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct Sandbox {
    tmp: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let sandbox = Self {
            tmp: tempfile::tempdir().unwrap(),
        };
        std::fs::create_dir_all(sandbox.recipes()).unwrap();
        let config = format!(
            "[paths]\ninstall_root = \"{}\"\nstate_dir = \"{}\"\nbuild_dir = \"{}\"\nrecipe_dirs = [\"{}\"]\n\n[build]\njobs = 2\n",
            sandbox.root().display(),
            sandbox.path("state").display(),
            sandbox.path("build").display(),
            sandbox.recipes().display(),
        );
        std::fs::write(sandbox.path("config.toml"), config).unwrap();
        sandbox
    }

    fn path(&self, name: &str) -> PathBuf {
        self.tmp.path().join(name)
    }

    fn root(&self) -> PathBuf {
        self.path("root")
    }

    fn recipes(&self) -> PathBuf {
        self.path("recipes")
    }

    fn kiln(&self, args: &[&str]) -> Output {
        let mut command = Command::new(env!("CARGO_BIN_EXE_kiln"));
        for (key, _) in std::env::vars() {
            if key.starts_with("KILN_") {
                command.env_remove(key);
            }
        }
        command
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(self.path("config.toml"))
            .args(["--color", "never"])
            .args(args)
            .output()
            .unwrap()
    }

    /// A recipe whose archive holds a shell script reporting `version`
    fn add_tool(&self, name: &str, version: &str) -> PathBuf {
        let prefix = format!("{name}-{version}");
        let staging = self.path("staging").join(&prefix);
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(
            staging.join(format!("{name}.sh")),
            format!("#!/bin/sh\necho \"{name} {version}\"\n"),
        )
        .unwrap();

        let archive_name = format!("{prefix}.tar.gz");
        let archive = self.recipes().join(&archive_name);
        write_tarball(&staging, &prefix, &archive);
        let digest = hex::encode(Sha256::digest(std::fs::read(&archive).unwrap()));

        let yaml = format!(
            r#"metadata: {{ name: {name}, version: {version} }}
source: {{ url: "{archive_name}", sha256: "{digest}" }}
phases:
  build: [/bin/sh, -c, "mkdir -p out && cp {name}.sh out/{name} && chmod 755 out/{name}"]
install:
  - {{ source: out/{name}, category: bin }}
verify:
  - {{ run: ["${{BIN}}/{name}"], expect: {{ contains: "{version}" }} }}
"#
        );
        let path = self.recipes().join(format!("{name}.yml"));
        std::fs::write(&path, yaml).unwrap();
        path
    }
}

fn write_tarball(dir: &Path, prefix: &str, archive: &Path) {
    let file = std::fs::File::create(archive).unwrap();
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all(prefix, dir).unwrap();
    builder.into_inner().unwrap().finish().unwrap();
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(env!("CARGO_BIN_EXE_kiln"))
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let help = String::from_utf8_lossy(&output.stdout);
    for command in ["install", "uninstall", "plan", "fetch", "list", "info", "check"] {
        assert!(help.contains(command), "missing {command} in help");
    }
}

#[test]
fn test_list_on_empty_root() {
    let sandbox = Sandbox::new();
    let output = sandbox.kiln(&["list", "--json"]);
    assert!(output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["type"], "RecipeList");
    assert_eq!(json["data"], serde_json::json!([]));
}

#[test]
fn test_info_on_missing_recipe_fails_with_code() {
    let sandbox = Sandbox::new();
    let output = sandbox.kiln(&["info", "o2l", "--json"]);
    assert_eq!(output.status.code(), Some(1));

    let json = stdout_json(&output);
    assert_eq!(json["error"]["code"], "install.not_installed");
    assert_eq!(json["error"]["retryable"], false);
}

#[test]
fn test_empty_argument_is_rejected() {
    let sandbox = Sandbox::new();
    let output = sandbox.kiln(&["plan", " "]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Recipe cannot be empty"));
}

#[test]
fn test_plan_by_catalog_name() {
    let sandbox = Sandbox::new();
    sandbox.add_tool("greet", "1.2.0");

    let output = sandbox.kiln(&["plan", "greet", "--json"]);
    assert!(output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["type"], "PlanReport");
    assert_eq!(json["data"]["recipe"], "greet");
    assert_eq!(json["data"]["steps"][0]["action"], "install");
    assert_eq!(json["data"]["steps"][0]["reason"], "requested");
}

#[test]
fn test_install_check_and_uninstall() {
    let sandbox = Sandbox::new();
    let recipe = sandbox.add_tool("greet", "1.2.0");
    let recipe = recipe.to_string_lossy().into_owned();

    let output = sandbox.kiln(&["install", &recipe, "--json"]);
    assert!(
        output.status.success(),
        "install failed: {}",
        String::from_utf8_lossy(&output.stdout)
    );
    let json = stdout_json(&output);
    assert_eq!(json["type"], "InstallReport");
    assert_eq!(json["data"]["installed"][0]["name"], "greet");
    assert!(sandbox.root().join("bin").join("greet").is_file());

    let output = sandbox.kiln(&["check", "greet", "--json"]);
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["data"]["modified"], serde_json::json!([]));

    // Tampering makes `check` fail
    std::fs::write(sandbox.root().join("bin").join("greet"), "#!/bin/sh\n").unwrap();
    let output = sandbox.kiln(&["check", "greet", "--json"]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout_json(&output)["data"]["modified"][0], "bin/greet");

    let output = sandbox.kiln(&["uninstall", "greet", "--json"]);
    assert!(output.status.success());
    assert!(!sandbox.root().join("bin").join("greet").exists());

    let output = sandbox.kiln(&["list", "--json"]);
    assert_eq!(stdout_json(&output)["data"], serde_json::json!([]));
}

#[test]
fn test_plain_output_for_plan() {
    let sandbox = Sandbox::new();
    let recipe = sandbox.add_tool("greet", "1.2.0");

    let output = sandbox.kiln(&["plan", &recipe.to_string_lossy()]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Plan for greet 1.2.0"));
    assert!(stdout.contains("requested"));
}
