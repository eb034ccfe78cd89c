//! diff command - Show differences between two locations
//!
//! Output lines are prefixed by the kind of difference:
//! `<` only on the left, `>` only on the right, `!` contents differ,
//! `~` file on one side and directory on the other, `=` identical
//! (with `--verbose`).

use clap::Args;
use console::Style;
use futures::StreamExt;
use serde::Serialize;

use ferry_core::{ClientUrl, CompareSettings, DiffEvent, DiffKind, DiffOptions, do_diff};

use super::Context;
use crate::exit_code::ExitCode;

/// Compare two locations
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Left URL
    pub left: String,

    /// Right URL
    pub right: String,

    /// Compare both sides recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Also list entries that match
    #[arg(short, long)]
    pub verbose: bool,

    /// Report entries whose right side is older than the left
    #[arg(long)]
    pub mtime: bool,

    /// Also compare checksums when both sides have one
    #[arg(long)]
    pub checksum: bool,
}

impl DiffArgs {
    fn options(&self) -> DiffOptions {
        DiffOptions {
            recursive: self.recursive,
            verbose: self.verbose,
            compare: CompareSettings {
                mtime: self.mtime,
                checksum: self.checksum,
                ..CompareSettings::SIZE
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct DiffOutput {
    status: DiffKind,
    left: String,
    right: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl DiffOutput {
    fn new(event: &DiffEvent) -> Self {
        Self {
            status: event.kind,
            left: event.left.to_string(),
            right: event.right.to_string(),
            error: event.error.as_ref().map(ToString::to_string),
        }
    }
}

fn marker(kind: DiffKind) -> (&'static str, Style) {
    match kind {
        DiffKind::OnlyOnLeft => ("<", Style::new().red()),
        DiffKind::OnlyOnRight => (">", Style::new().green()),
        DiffKind::Differ => ("!", Style::new().yellow()),
        DiffKind::TypeMismatch => ("~", Style::new().magenta()),
        DiffKind::Same => ("=", Style::new().dim()),
        DiffKind::Error => ("?", Style::new().red().bold()),
    }
}

/// Human-readable line for one event
fn line(event: &DiffOutput) -> String {
    let (symbol, _) = marker(event.status);
    match event.status {
        DiffKind::OnlyOnLeft | DiffKind::Same => format!("{symbol} {}", event.left),
        DiffKind::OnlyOnRight => format!("{symbol} {}", event.right),
        _ => format!("{symbol} {} {}", event.left, event.right),
    }
}

/// Execute the diff command
pub async fn execute(args: DiffArgs, ctx: &Context) -> ExitCode {
    let formatter = &ctx.formatter;
    let (left, right) = match (ClientUrl::parse(&args.left), ClientUrl::parse(&args.right)) {
        (Ok(left), Ok(right)) => (left, right),
        (Err(e), _) | (_, Err(e)) => return ctx.fail(&e),
    };

    let mut code = ExitCode::Success;
    let mut events = do_diff(ctx.factory.clone(), left, right, args.options());
    while let Some(event) = events.next().await {
        if let Some(error) = &event.error {
            code = ctx.fail(error);
            continue;
        }

        let output = DiffOutput::new(&event);
        if formatter.is_json() {
            formatter.json(&output);
        } else {
            let (_, style) = marker(event.kind);
            formatter.println(&formatter.paint(style, &line(&output)));
        }
    }
    code
}
