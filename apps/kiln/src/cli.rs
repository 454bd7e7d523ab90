//! Command line interface definition

use clap::{Parser, Subcommand};
use kiln_types::ColorChoice;
use std::path::PathBuf;

/// kiln - build and install software from declarative recipes
#[derive(Parser)]
#[command(name = "kiln")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build and install software from declarative YAML recipes")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Write JSON debug logs under the state directory's logs/
    #[arg(long, global = true)]
    pub debug: bool,

    /// Color output control
    #[arg(long, global = true, value_enum)]
    pub color: Option<ColorChoice>,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Install root (overrides config and KILN_INSTALL_ROOT)
    #[arg(long, global = true, value_name = "PATH")]
    pub root: Option<PathBuf>,

    /// Directory for manifests and logs
    #[arg(long, global = true, value_name = "PATH")]
    pub state_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Fetch, build, install and verify a recipe and its dependencies
    #[command(alias = "i")]
    Install {
        /// Recipe file path or recipe name
        recipe: String,

        /// Reinstall even if an intact install exists
        #[arg(long)]
        force: bool,

        /// Number of parallel build jobs (0=auto)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Keep the build work directory
        #[arg(long)]
        keep_build_dir: bool,
    },

    /// Remove an installed recipe
    #[command(alias = "rm")]
    Uninstall {
        /// Installed recipe name
        name: String,

        /// Remove even if other installed recipes depend on it
        #[arg(long)]
        force: bool,
    },

    /// Show the install plan without changing anything
    Plan {
        /// Recipe file path or recipe name
        recipe: String,
    },

    /// Download and verify a recipe's source archive
    Fetch {
        /// Recipe file path or recipe name
        recipe: String,

        /// Directory to write the verified archive to
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },

    /// List installed recipes
    #[command(alias = "ls")]
    List,

    /// Show details of an installed recipe
    Info {
        /// Installed recipe name
        name: String,
    },

    /// Re-hash an installed recipe's artifacts
    Check {
        /// Installed recipe name
        name: String,
    },
}

impl Commands {
    /// Get command name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Install { .. } => "install",
            Commands::Uninstall { .. } => "uninstall",
            Commands::Plan { .. } => "plan",
            Commands::Fetch { .. } => "fetch",
            Commands::List => "list",
            Commands::Info { .. } => "info",
            Commands::Check { .. } => "check",
        }
    }

    /// Validate command arguments
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Commands::Install { recipe, .. }
            | Commands::Plan { recipe }
            | Commands::Fetch { recipe, .. }
                if recipe.trim().is_empty() =>
            {
                Err("Recipe cannot be empty".to_string())
            }
            Commands::Uninstall { name, .. } | Commands::Info { name } | Commands::Check { name }
                if name.trim().is_empty() =>
            {
                Err("Recipe name cannot be empty".to_string())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_install_flags() {
        let cli = Cli::try_parse_from([
            "kiln",
            "--root",
            "/tmp/root",
            "install",
            "recipes/o2l.yml",
            "--force",
            "-j",
            "4",
        ])
        .unwrap();

        assert_eq!(cli.global.root, Some(PathBuf::from("/tmp/root")));
        match cli.command {
            Commands::Install {
                recipe,
                force,
                jobs,
                keep_build_dir,
            } => {
                assert_eq!(recipe, "recipes/o2l.yml");
                assert!(force);
                assert_eq!(jobs, Some(4));
                assert!(!keep_build_dir);
            }
            _ => panic!("expected install"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["kiln", "list", "--json", "--color", "never"]).unwrap();
        assert!(cli.global.json);
        assert_eq!(cli.global.color, Some(ColorChoice::Never));
        assert_eq!(cli.command.name(), "list");
    }

    #[test]
    fn test_command_aliases() {
        let cli = Cli::try_parse_from(["kiln", "rm", "o2l"]).unwrap();
        assert_eq!(cli.command.name(), "uninstall");
        let cli = Cli::try_parse_from(["kiln", "i", "o2l"]).unwrap();
        assert_eq!(cli.command.name(), "install");
    }

    #[test]
    fn test_command_validation() {
        let cli = Cli::try_parse_from(["kiln", "info", " "]).unwrap();
        assert!(cli.command.validate().is_err());
        let cli = Cli::try_parse_from(["kiln", "plan", "o2l"]).unwrap();
        assert!(cli.command.validate().is_ok());
    }
}
