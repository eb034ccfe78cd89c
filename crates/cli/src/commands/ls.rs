//! ls command - List files and objects
//!
//! Each URL is listed through the Listing Engine. A trailing `...` (or
//! `--recursive`) walks the whole tree and prints only files.

use clap::Args;
use console::Style;
use futures::StreamExt;
use serde::Serialize;

use ferry_core::{ClientFactory, ClientUrl, ContentMessage, Entry, do_list};

use super::Context;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// List files and objects
#[derive(Args, Debug)]
pub struct LsArgs {
    /// URLs to list (local path, alias/bucket[/prefix] or http(s) URL)
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// List recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Print totals after the listing
    #[arg(long)]
    pub summarize: bool,
}

#[derive(Debug, Default, Serialize)]
struct Summary {
    total_objects: u64,
    total_size_bytes: u64,
    total_size_human: String,
}

impl Summary {
    fn add(&mut self, entry: &Entry) {
        if !entry.is_dir() {
            self.total_objects += 1;
            self.total_size_bytes += entry.size;
        }
    }

    fn finish(mut self) -> Self {
        self.total_size_human = humansize::format_size(self.total_size_bytes, humansize::BINARY);
        self
    }
}

/// Execute the ls command
pub async fn execute(args: LsArgs, ctx: &Context) -> ExitCode {
    let multi_source = args.urls.len() > 1;
    let mut summary = Summary::default();
    let mut code = ExitCode::Success;

    for raw in &args.urls {
        let url = match ClientUrl::parse(raw) {
            Ok(url) => url,
            Err(e) => {
                code = ctx.fail(&e);
                continue;
            }
        };
        let client = match ctx.factory.client(&url).await {
            Ok(client) => client,
            Err(e) => {
                code = ctx.fail(&e);
                continue;
            }
        };

        let recursive = args.recursive || url.is_recursive();
        let mut entries = do_list(client.as_ref(), recursive, multi_source);
        while let Some(item) = entries.next().await {
            match item {
                Ok(entry) => {
                    summary.add(&entry);
                    render(&ctx.formatter, &ContentMessage::new(&entry));
                }
                Err(e) => code = ctx.fail(&e),
            }
        }
    }

    if args.summarize {
        let summary = summary.finish();
        if ctx.formatter.is_json() {
            ctx.formatter.json(&serde_json::json!({ "summary": summary }));
        } else {
            ctx.formatter.println(&format!(
                "\nTotal: {} objects, {}",
                summary.total_objects, summary.total_size_human
            ));
        }
    }
    code
}

fn render(formatter: &Formatter, message: &ContentMessage) {
    if formatter.is_json() || !formatter.colors_enabled() {
        formatter.output(message);
        return;
    }

    let name = if message.file_type == "folder" {
        formatter.paint(Style::new().blue().bold(), &message.name)
    } else {
        message.name.clone()
    };
    formatter.println(&format!(
        "{} {} {name}",
        formatter.paint(Style::new().green(), &format!("[{}]", message.time_string())),
        formatter.paint(Style::new().yellow(), &format!("{:>10}", message.size_string())),
    ));
}
