//! share command - Presigned downloads and browser upload forms
//!
//! `share download` prints a presigned GET URL. `share upload` issues a
//! signed POST policy, records it in the share history and prints a
//! ready-to-run `curl` command. Uploads to a prefix use the `...` form and
//! leave a `<FILE>` placeholder in the key.

use std::collections::BTreeMap;
use std::time::Duration;

use clap::{Args, Subcommand};
use serde::Serialize;

use ferry_core::share::FILE_PLACEHOLDER;
use ferry_core::{BackendKind, ClientFactory, ClientUrl, Error, Result, ShareRecord, ShareStore, share_upload};

use super::Context;
use crate::exit_code::ExitCode;

const DEFAULT_EXPIRY: &str = "168h";

#[derive(Subcommand, Debug)]
pub enum ShareCommands {
    /// Generate an upload form (printed as a curl command)
    Upload(UploadArgs),

    /// Generate a presigned download URL
    Download(DownloadArgs),
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Object URL, or `alias/bucket/prefix/...` to accept any key under a prefix
    pub url: String,

    /// How long the form stays valid, e.g. 1h, 30m, 7d
    #[arg(default_value = DEFAULT_EXPIRY, value_parser = humantime::parse_duration)]
    pub expiry: Duration,

    /// Content type uploads must declare
    pub content_type: Option<String>,
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Object URL
    pub url: String,

    /// How long the link stays valid, e.g. 1h, 30m, 7d
    #[arg(default_value = DEFAULT_EXPIRY, value_parser = humantime::parse_duration)]
    pub expiry: Duration,
}

#[derive(Debug, Serialize)]
struct UploadOutput<'a> {
    url: &'a str,
    share: String,
    #[serde(flatten)]
    record: &'a ShareRecord,
}

#[derive(Debug, Serialize)]
struct DownloadOutput<'a> {
    url: &'a str,
    expiry: u64,
    share: String,
}

pub async fn execute(cmd: ShareCommands, ctx: &Context) -> ExitCode {
    let result = match cmd {
        ShareCommands::Upload(args) => upload(args, ctx).await,
        ShareCommands::Download(args) => download(args, ctx).await,
    };
    match result {
        Ok(()) => ExitCode::Success,
        Err(e) => ctx.fail(&e),
    }
}

/// Reject URLs that cannot carry a share
fn validate_upload_url(url: &ClientUrl) -> Result<()> {
    if url.kind() != BackendKind::ObjectStore {
        return Err(Error::UnsupportedFeature(format!(
            "sharing is only available for object-store URLs: {url}"
        )));
    }
    if url.is_recursive() {
        return Ok(());
    }
    match url.key() {
        Some(key) if !key.is_empty() && !key.ends_with('/') => Ok(()),
        _ => Err(Error::InvalidPath(format!(
            "'{}' names a prefix, not an object; use '{}...' to share uploads under it",
            url.raw(),
            url.raw()
        ))),
    }
}

/// Shell command posting a file with the form fields
fn curl_command(post_url: &str, fields: &BTreeMap<String, String>) -> String {
    let mut command = format!("curl {post_url}");
    for (name, value) in fields {
        command.push_str(&format!(" -F '{name}={value}'"));
    }
    command.push_str(&format!(" -F 'file=@{FILE_PLACEHOLDER}'"));
    command
}

async fn upload(args: UploadArgs, ctx: &Context) -> Result<()> {
    let url = ClientUrl::parse(&args.url)?;
    validate_upload_url(&url)?;

    let alias = ctx.factory.resolve(&url)?;
    let client = ctx.factory.client(&url).await?;
    let store = ShareStore::new()?;
    let record = share_upload(
        client.as_ref(),
        url.is_recursive(),
        args.expiry,
        args.content_type.as_deref(),
        &store,
    )
    .await?;

    let post_url = format!(
        "{}/{}/",
        alias.normalized_endpoint(),
        url.bucket().unwrap_or_default()
    );
    let share = curl_command(&post_url, &record.upload_info);

    let formatter = &ctx.formatter;
    if formatter.is_json() {
        formatter.json(&UploadOutput {
            url: url.raw(),
            share,
            record: &record,
        });
    } else {
        formatter.println(&format!("URL: {}", formatter.bold(url.raw())));
        formatter.println(&format!(
            "Expire: {}",
            humantime::format_duration(args.expiry)
        ));
        formatter.println(&format!("Share: {share}"));
    }
    Ok(())
}

async fn download(args: DownloadArgs, ctx: &Context) -> Result<()> {
    let url = ClientUrl::parse(&args.url)?;
    if url.is_recursive() {
        return Err(Error::InvalidPath(format!(
            "'{}' names more than one object; share download takes a single object",
            url.raw()
        )));
    }

    let client = ctx.factory.client(&url).await?;
    let share = client.share_download(args.expiry).await?;

    let formatter = &ctx.formatter;
    if formatter.is_json() {
        formatter.json(&DownloadOutput {
            url: url.raw(),
            expiry: args.expiry.as_secs(),
            share,
        });
    } else {
        formatter.println(&format!("URL: {}", formatter.bold(url.raw())));
        formatter.println(&format!(
            "Expire: {}",
            humantime::format_duration(args.expiry)
        ));
        formatter.println(&format!("Share: {share}"));
    }
    Ok(())
}
