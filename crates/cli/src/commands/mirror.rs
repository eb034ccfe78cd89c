//! mirror command - Copy only what is missing or changed
//!
//! The source is always walked recursively. Destination objects that
//! already match (size and modification time by default) are skipped.

use clap::Args;

use ferry_core::{CompareSettings, RECURSIVE_MARKER};

use super::Context;
use super::cp::{TransferArgs, run};
use crate::exit_code::ExitCode;

/// Mirror a tree into a target
#[derive(Args, Debug)]
pub struct MirrorArgs {
    /// Source tree (local path, alias/bucket[/prefix] or http(s) URL)
    pub source: String,

    /// Target container
    pub target: String,

    /// Only show what would be copied
    #[arg(long)]
    pub dry_run: bool,

    /// Compare sizes only, ignoring modification times
    #[arg(long)]
    pub size_only: bool,

    /// Also compare checksums when both sides have one
    #[arg(long)]
    pub checksum: bool,

    #[command(flatten)]
    pub transfer: TransferArgs,
}

impl MirrorArgs {
    fn compare(&self) -> CompareSettings {
        let base = if self.size_only {
            CompareSettings::SIZE
        } else {
            CompareSettings::SIZE_AND_MTIME
        };
        CompareSettings {
            checksum: self.checksum,
            ..base
        }
    }
}

/// Source URL with the recursive marker
fn recursive_source(source: &str) -> String {
    if source.ends_with(RECURSIVE_MARKER) {
        source.to_string()
    } else {
        format!("{source}{RECURSIVE_MARKER}")
    }
}

/// Execute the mirror command
pub async fn execute(args: MirrorArgs, ctx: &Context) -> ExitCode {
    let mut settings = args.transfer.settings(ctx);
    settings.mirror = true;
    settings.dry_run = args.dry_run;
    settings.compare = args.compare();

    let sources = [recursive_source(&args.source)];
    run(ctx, &sources, &args.target, settings).await
}
