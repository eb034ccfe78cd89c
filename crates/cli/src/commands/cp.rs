//! cp command - Copy files and objects
//!
//! `cp SOURCE... TARGET` classifies the request, then drains the executor's
//! transfer stream, printing one line per unit and a final summary.
//! Per-unit failures do not stop the run; the exit code reports them.

use clap::Args;
use futures::StreamExt;
use serde::Serialize;

use ferry_core::{CopyReport, CopySettings, Outcome, OverlapPolicy, SkipReason, Transfer, copy};

use super::Context;
use crate::exit_code::ExitCode;
use crate::output::ProgressBar;

/// Copy files and objects
#[derive(Args, Debug)]
pub struct CpArgs {
    /// Sources followed by the target; end a source with `...` to copy recursively
    #[arg(required = true, num_args = 2..)]
    pub paths: Vec<String>,

    /// Only show what would be copied
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub transfer: TransferArgs,
}

/// Tuning flags shared by cp and mirror
#[derive(Args, Debug, Default)]
pub struct TransferArgs {
    /// Maximum number of parallel transfers
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Extra attempts for transfers failing with a transient error
    #[arg(long)]
    pub retries: Option<u32>,

    /// Which source wins when several write the same key: last-write-wins or first-write-wins
    #[arg(long, value_parser = parse_overlap)]
    pub overlap: Option<OverlapPolicy>,
}

impl TransferArgs {
    /// Configuration defaults overridden by flags
    pub fn settings(&self, ctx: &Context) -> CopySettings {
        let mut settings = CopySettings::from_defaults(&ctx.config.transfer);
        if let Some(concurrency) = self.concurrency {
            settings.concurrency = concurrency.max(1);
        }
        if let Some(retries) = self.retries {
            settings.retries = retries;
        }
        if let Some(overlap) = self.overlap {
            settings.overlap = overlap;
        }
        settings
    }
}

fn parse_overlap(value: &str) -> Result<OverlapPolicy, String> {
    match value {
        "last-write-wins" => Ok(OverlapPolicy::LastWriteWins),
        "first-write-wins" => Ok(OverlapPolicy::FirstWriteWins),
        other => Err(format!(
            "unknown overlap policy '{other}', expected last-write-wins or first-write-wins"
        )),
    }
}

/// One unit as printed
#[derive(Debug, Serialize)]
struct TransferOutput {
    status: &'static str,
    source: String,
    target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<SkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl TransferOutput {
    fn new(transfer: &Transfer) -> Self {
        let mut output = Self {
            status: "copied",
            source: transfer.unit.source.to_string(),
            target: transfer.unit.destination.to_string(),
            size_bytes: None,
            reason: None,
            error: None,
        };
        match &transfer.outcome {
            Outcome::Copied { bytes } => output.size_bytes = Some(*bytes),
            Outcome::Skipped { reason } => {
                output.status = "skipped";
                output.reason = Some(*reason);
            }
            Outcome::Failed { error } => {
                output.status = "failed";
                output.error = Some(error.to_string());
            }
        }
        output
    }
}

impl std::fmt::Display for TransferOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.status, self.reason) {
            ("skipped", Some(SkipReason::DryRun)) => {
                write!(f, "Would copy: {} -> {}", self.source, self.target)
            }
            ("skipped", Some(reason)) => {
                write!(f, "Skipped {} -> {} ({reason})", self.source, self.target)
            }
            ("failed", _) => write!(
                f,
                "Failed {} -> {}: {}",
                self.source,
                self.target,
                self.error.as_deref().unwrap_or_default()
            ),
            _ => write!(f, "{} -> {}", self.source, self.target),
        }
    }
}

/// Execute the cp command
pub async fn execute(args: CpArgs, ctx: &Context) -> ExitCode {
    let Some((target, sources)) = args.paths.split_last() else {
        ctx.formatter.error("cp needs at least one source and a target");
        return ExitCode::UsageError;
    };

    let mut settings = args.transfer.settings(ctx);
    settings.dry_run = args.dry_run;
    run(ctx, sources, target, settings).await
}

/// Drive a copy or mirror run to completion
pub(super) async fn run(
    ctx: &Context,
    sources: &[String],
    target: &str,
    settings: CopySettings,
) -> ExitCode {
    let formatter = &ctx.formatter;
    let mirror = settings.mirror;
    let mut transfers = match copy(ctx.factory.clone(), sources, target, settings) {
        Ok(stream) => stream,
        Err(e) => return ctx.fail(&e),
    };

    let progress = ProgressBar::spinner(formatter.config(), "Starting...");
    let mut report = CopyReport::default();
    let mut fatal: Option<ExitCode> = None;

    while let Some(item) = transfers.next().await {
        report.record(&item);
        match &item {
            Ok(transfer) => {
                let output = TransferOutput::new(transfer);
                if formatter.is_json() {
                    formatter.json(&output);
                } else if matches!(transfer.outcome, Outcome::Failed { .. }) {
                    progress.suspend(|| formatter.error(&output.to_string()));
                } else if !formatter.is_quiet() && !is_quiet_skip(transfer, mirror) {
                    progress.println(&output.to_string());
                }
            }
            Err(e) => {
                let code = progress.suspend(|| ctx.fail(e));
                fatal.get_or_insert(code);
            }
        }
        progress.set_message(format!(
            "{} copied ({}), {} skipped, {} failed",
            report.copied,
            humansize::format_size(report.bytes, humansize::BINARY),
            report.skipped,
            report.failed
        ));
    }
    progress.finish_and_clear();

    print_summary(ctx, &report);
    if report.is_success() {
        ExitCode::Success
    } else {
        fatal.unwrap_or(ExitCode::GeneralError)
    }
}

/// Up-to-date units are the normal case for mirror and are not listed
fn is_quiet_skip(transfer: &Transfer, mirror: bool) -> bool {
    mirror
        && matches!(
            transfer.outcome,
            Outcome::Skipped {
                reason: SkipReason::UpToDate
            }
        )
}

fn print_summary(ctx: &Context, report: &CopyReport) {
    let formatter = &ctx.formatter;
    if formatter.is_json() {
        formatter.json(&serde_json::json!({ "summary": report }));
        return;
    }

    let line = format!(
        "{} copied ({}), {} skipped, {} failed",
        report.copied,
        humansize::format_size(report.bytes, humansize::BINARY),
        report.skipped,
        report.failed
    );
    if report.is_success() {
        formatter.success(&line);
    } else {
        let mut line = line;
        if report.listing_errors > 0 {
            line.push_str(&format!(", {} sources aborted", report.listing_errors));
        }
        formatter.error(&line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::{ClientUrl, CopyUnit, Entry, Error};

    fn transfer(outcome: Outcome) -> Transfer {
        Transfer {
            unit: CopyUnit {
                source: ClientUrl::parse("/src/a.txt").unwrap(),
                entry: Entry::file("a.txt", 3),
                destination: ClientUrl::parse("u/bucket/a.txt").unwrap(),
            },
            outcome,
        }
    }

    #[test]
    fn test_parse_overlap() {
        assert_eq!(
            parse_overlap("first-write-wins").unwrap(),
            OverlapPolicy::FirstWriteWins
        );
        assert_eq!(
            parse_overlap("last-write-wins").unwrap(),
            OverlapPolicy::LastWriteWins
        );
        assert!(parse_overlap("newest").is_err());
    }

    #[test]
    fn test_transfer_output_lines() {
        let copied = TransferOutput::new(&transfer(Outcome::Copied { bytes: 3 }));
        assert_eq!(copied.to_string(), "/src/a.txt -> u/bucket/a.txt");
        assert_eq!(copied.size_bytes, Some(3));

        let dry = TransferOutput::new(&transfer(Outcome::Skipped {
            reason: SkipReason::DryRun,
        }));
        assert_eq!(dry.to_string(), "Would copy: /src/a.txt -> u/bucket/a.txt");

        let failed = TransferOutput::new(&transfer(Outcome::Failed {
            error: Error::Network("reset".into()).transfer_failed("u/bucket/a.txt"),
        }));
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert!(json["error"].as_str().unwrap().contains("reset"));
    }

    #[test]
    fn test_mirror_hides_up_to_date() {
        let up_to_date = transfer(Outcome::Skipped {
            reason: SkipReason::UpToDate,
        });
        assert!(is_quiet_skip(&up_to_date, true));
        assert!(!is_quiet_skip(&up_to_date, false));
        assert!(!is_quiet_skip(&transfer(Outcome::Copied { bytes: 1 }), true));
    }
}
