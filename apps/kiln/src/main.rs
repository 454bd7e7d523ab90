//! kiln - declarative formula engine
//!
//! This is the CLI front end. It loads configuration, wires an operations
//! context and drives the ops crate while printing progress from the event
//! stream.

mod cli;
mod display;
mod error;
mod events;
mod logging;

use crate::cli::{Cli, Commands, GlobalArgs};
use crate::display::OutputRenderer;
use crate::error::CliError;
use crate::events::EventHandler;
use clap::Parser;
use kiln_config::Config;
use kiln_events::EventReceiver;
use kiln_ops::{InstallRequest, OperationResult, OpsContextBuilder, OpsCtx};
use kiln_types::{ColorChoice, OutputFormat};
use std::process;
use tokio::select;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            error!("Application error: {}", e);
            if json_mode {
                println!("{}", e.to_json());
            } else {
                eprintln!("Error: {e}");
            }
            process::exit(1);
        }
    }
}

/// Main application logic
///
/// Returns whether the rendered result counts as success.
async fn run(cli: Cli) -> Result<bool, CliError> {
    cli.command
        .validate()
        .map_err(CliError::InvalidArguments)?;

    // File config (or defaults), then environment, then CLI flags
    let mut config = Config::load_or_default(&cli.global.config).await?;
    config.merge_env()?;
    apply_cli_config(&mut config, &cli.global, &cli.command);

    let json_mode = cli.global.json || config.general.default_output == OutputFormat::Json;
    if let Some(log_file) = logging::init_tracing(json_mode, cli.global.debug, &config.logs_dir())
    {
        if !json_mode {
            eprintln!("Debug logging enabled: {}", log_file.display());
        }
    }
    info!("Starting kiln v{}", env!("CARGO_PKG_VERSION"));

    let color = config.general.color;
    let colors_enabled = match color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => console::Term::stderr().features().colors_supported(),
    };
    let mut event_handler = EventHandler::new(colors_enabled, json_mode, cli.global.debug);
    let renderer = OutputRenderer::new(json_mode, color);

    let (event_sender, event_receiver) = kiln_events::channel();
    let ctx = OpsContextBuilder::new()
        .with_config(config)
        .with_event_sender(event_sender)
        .build()?;

    let command_name = cli.command.name();
    let result =
        execute_command_with_events(cli.command, ctx, event_receiver, &mut event_handler).await?;

    renderer.render_result(&result)?;

    info!(command = command_name, "Command completed");
    Ok(result.is_success())
}

/// Execute command with concurrent event handling
async fn execute_command_with_events(
    command: Commands,
    ctx: OpsCtx,
    mut event_receiver: EventReceiver,
    event_handler: &mut EventHandler,
) -> Result<OperationResult, CliError> {
    let mut command_future = Box::pin(execute_command(command, ctx));

    loop {
        select! {
            result = &mut command_future => {
                // Drain whatever the command emitted last
                while let Ok(event) = event_receiver.try_recv() {
                    event_handler.handle_event(event);
                }
                return result;
            }

            Some(event) = event_receiver.recv() => {
                event_handler.handle_event(event);
            }
        }
    }
}

/// Execute the specified command
async fn execute_command(command: Commands, ctx: OpsCtx) -> Result<OperationResult, CliError> {
    match command {
        Commands::Install {
            recipe,
            force,
            jobs,
            keep_build_dir,
        } => {
            let request = InstallRequest {
                recipe,
                force,
                jobs,
                keep_build_dir,
            };
            let report = kiln_ops::install(&ctx, &request).await?;
            Ok(OperationResult::InstallReport(report))
        }

        Commands::Uninstall { name, force } => {
            let report = kiln_ops::uninstall(&ctx, &name, force).await?;
            Ok(OperationResult::UninstallReport(report))
        }

        Commands::Plan { recipe } => {
            let report = kiln_ops::plan(&ctx, &recipe).await?;
            Ok(OperationResult::PlanReport(report))
        }

        Commands::Fetch { recipe, output_dir } => {
            let report = kiln_ops::fetch(&ctx, &recipe, output_dir.as_deref()).await?;
            Ok(OperationResult::FetchReport(report))
        }

        Commands::List => {
            let recipes = kiln_ops::list(&ctx).await?;
            Ok(OperationResult::RecipeList(recipes))
        }

        Commands::Info { name } => {
            let info = kiln_ops::info(&ctx, &name).await?;
            Ok(OperationResult::RecipeInfo(info))
        }

        Commands::Check { name } => {
            let report = kiln_ops::check(&ctx, &name).await?;
            Ok(OperationResult::IntegrityReport(report))
        }
    }
}

/// Apply CLI configuration overrides (highest precedence)
fn apply_cli_config(config: &mut Config, global: &GlobalArgs, command: &Commands) {
    if let Some(color) = global.color {
        config.general.color = color;
    }
    if let Some(root) = &global.root {
        config.paths.install_root = Some(root.clone());
    }
    if let Some(state_dir) = &global.state_dir {
        config.paths.state_dir = Some(state_dir.clone());
    }

    if let Commands::Install {
        jobs: Some(jobs),
        keep_build_dir,
        ..
    } = command
    {
        config.build.jobs = *jobs;
        config.build.keep_build_dir |= *keep_build_dir;
    }
}
