//! CLI command definitions and execution
//!
//! Every command parses its arguments, builds the core engine inputs
//! explicitly from configuration and flags, and renders the engine's output
//! stream. Fatal conditions print one error line and map to an exit code.

use std::sync::Arc;

use clap::{Parser, Subcommand};

use ferry_core::{AliasManager, Config, ConfigManager, Error};
use ferry_s3::MultipartConfig;

use crate::exit_code::ExitCode;
use crate::factory::AliasFactory;
use crate::output::{Formatter, OutputConfig};

mod alias;
mod cat;
mod cp;
mod diff;
mod ls;
mod mirror;
mod share;

/// ferry - copy, mirror and compare files and objects
///
/// Works across local filesystems and S3-compatible object stores. A
/// trailing `...` on a URL means "this path and everything beneath it".
#[derive(Parser, Debug)]
#[command(name = "ferry")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress bar
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage storage service aliases
    #[command(subcommand)]
    Alias(alias::AliasCommands),

    /// List files and objects
    Ls(ls::LsArgs),

    /// Display object contents
    Cat(cat::CatArgs),

    /// Copy files and objects
    Cp(cp::CpArgs),

    /// Copy only what is missing or changed at the target
    Mirror(mirror::MirrorArgs),

    /// Show differences between two locations
    Diff(diff::DiffArgs),

    /// Generate shareable links and upload forms
    #[command(subcommand)]
    Share(share::ShareCommands),
}

/// Shared state for commands that talk to storage
pub(crate) struct Context {
    pub formatter: Formatter,
    pub config: Config,
    pub factory: Arc<AliasFactory>,
}

impl Context {
    fn load(output: OutputConfig) -> Result<Self, Error> {
        let config_manager = ConfigManager::new()?;
        let config = config_manager.load()?;
        let multipart = MultipartConfig::new().part_size(config.transfer.part_size);
        let factory = AliasFactory::new(
            AliasManager::with_config_manager(config_manager),
            multipart,
        );
        Ok(Self {
            formatter: Formatter::new(output),
            config,
            factory: Arc::new(factory),
        })
    }

    /// Report a fatal error and pick the exit code
    pub fn fail(&self, err: &Error) -> ExitCode {
        self.formatter.error(&err.to_string());
        ExitCode::from(err)
    }
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        no_progress: cli.no_progress,
        quiet: cli.quiet,
    };

    let ctx = match Context::load(output_config.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            let formatter = Formatter::new(output_config);
            formatter.error(&format!("Failed to load configuration: {e}"));
            return ExitCode::from(&e);
        }
    };

    match cli.command {
        Commands::Alias(cmd) => alias::execute(cmd, &ctx.formatter).await,
        Commands::Ls(args) => ls::execute(args, &ctx).await,
        Commands::Cat(args) => cat::execute(args, &ctx).await,
        Commands::Cp(args) => cp::execute(args, &ctx).await,
        Commands::Mirror(args) => mirror::execute(args, &ctx).await,
        Commands::Diff(args) => diff::execute(args, &ctx).await,
        Commands::Share(cmd) => share::execute(cmd, &ctx).await,
    }
}
