//! Alias management commands
//!
//! Aliases are named references to S3-compatible storage endpoints,
//! including connection details and credentials.

use clap::Subcommand;
use serde::Serialize;

use ferry_core::{Alias, AliasManager, Error};

use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Alias subcommands for managing storage service connections
#[derive(Subcommand, Debug)]
pub enum AliasCommands {
    /// Add or update an alias
    Set(SetArgs),

    /// List all configured aliases
    List(ListArgs),

    /// Remove an alias
    Remove(RemoveArgs),
}

/// Arguments for the `alias set` command
#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Alias name (e.g., "local", "s3", "backup")
    pub name: String,

    /// S3 endpoint URL (e.g., "http://localhost:9000", "https://s3.amazonaws.com")
    pub endpoint: String,

    /// Access key ID
    pub access_key: String,

    /// Secret access key
    pub secret_key: String,

    /// AWS region
    #[arg(long, default_value = "us-east-1")]
    pub region: String,

    /// Bucket lookup style: auto, path, or dns
    #[arg(long, default_value = "auto")]
    pub bucket_lookup: String,
}

/// Arguments for the `alias list` command
#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Show full details including region and lookup style
    #[arg(short, long)]
    pub long: bool,
}

/// Arguments for the `alias remove` command
#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    /// Name of the alias to remove
    pub name: String,
}

/// Alias information for JSON output (without credentials)
#[derive(Serialize)]
struct AliasInfo {
    name: String,
    endpoint: String,
    region: String,
    bucket_lookup: String,
}

impl From<&Alias> for AliasInfo {
    fn from(alias: &Alias) -> Self {
        Self {
            name: alias.name.clone(),
            endpoint: alias.endpoint.clone(),
            region: alias.region.clone(),
            bucket_lookup: alias.bucket_lookup.clone(),
        }
    }
}

impl std::fmt::Display for AliasInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:<12} {}", self.name, self.endpoint)
    }
}

/// JSON output for alias set/remove operations
#[derive(Serialize)]
struct AliasOperationOutput {
    success: bool,
    alias: String,
    message: String,
}

/// Execute an alias subcommand
pub async fn execute(cmd: AliasCommands, formatter: &Formatter) -> ExitCode {
    let manager = match AliasManager::new() {
        Ok(manager) => manager,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::GeneralError;
        }
    };

    match cmd {
        AliasCommands::Set(args) => execute_set(args, &manager, formatter),
        AliasCommands::List(args) => execute_list(args, &manager, formatter),
        AliasCommands::Remove(args) => execute_remove(args, &manager, formatter),
    }
}

fn validate(args: &SetArgs) -> Result<(), String> {
    if args.endpoint.is_empty() {
        return Err("Endpoint URL cannot be empty".into());
    }
    if !args.endpoint.starts_with("http://") && !args.endpoint.starts_with("https://") {
        return Err("Endpoint must start with http:// or https://".into());
    }
    if !matches!(args.bucket_lookup.as_str(), "auto" | "path" | "dns") {
        return Err("Bucket lookup must be 'auto', 'path', or 'dns'".into());
    }
    Ok(())
}

fn report(formatter: &Formatter, name: &str, message: String) {
    if formatter.is_json() {
        formatter.json(&AliasOperationOutput {
            success: true,
            alias: name.to_string(),
            message,
        });
    } else {
        formatter.success(&message);
    }
}

fn execute_set(args: SetArgs, manager: &AliasManager, formatter: &Formatter) -> ExitCode {
    if let Err(msg) = validate(&args) {
        formatter.error(&msg);
        return ExitCode::UsageError;
    }

    let mut alias = Alias::new(
        &args.name,
        &args.endpoint,
        &args.access_key,
        &args.secret_key,
    );
    alias.region = args.region;
    alias.bucket_lookup = args.bucket_lookup;

    match manager.set(alias) {
        Ok(()) => {
            report(
                formatter,
                &args.name,
                format!("Alias '{}' configured successfully", args.name),
            );
            ExitCode::Success
        }
        Err(e) => {
            formatter.error(&e.to_string());
            ExitCode::from(&e)
        }
    }
}

fn execute_list(args: ListArgs, manager: &AliasManager, formatter: &Formatter) -> ExitCode {
    let aliases = match manager.list() {
        Ok(aliases) => aliases,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from(&e);
        }
    };

    if formatter.is_json() {
        let infos: Vec<AliasInfo> = aliases.iter().map(AliasInfo::from).collect();
        formatter.json(&serde_json::json!({ "aliases": infos }));
    } else if aliases.is_empty() {
        formatter.println("No aliases configured.");
    } else {
        for alias in &aliases {
            let info = AliasInfo::from(alias);
            if args.long {
                formatter.println(&format!(
                    "{info} (region: {}, lookup: {})",
                    info.region, info.bucket_lookup
                ));
            } else {
                formatter.println(&info.to_string());
            }
        }
    }
    ExitCode::Success
}

fn execute_remove(args: RemoveArgs, manager: &AliasManager, formatter: &Formatter) -> ExitCode {
    match manager.remove(&args.name) {
        Ok(()) => {
            report(
                formatter,
                &args.name,
                format!("Alias '{}' removed successfully", args.name),
            );
            ExitCode::Success
        }
        Err(Error::AliasNotFound(_)) => {
            formatter.error(&format!("Alias '{}' not found", args.name));
            ExitCode::NotFound
        }
        Err(e) => {
            formatter.error(&e.to_string());
            ExitCode::from(&e)
        }
    }
}
