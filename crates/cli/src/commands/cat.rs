//! cat command - Display object contents
//!
//! Streams objects to stdout in the order given. `--offset`/`--length`
//! print a byte range of a single object.

use clap::Args;
use tokio::io::AsyncWriteExt;

use ferry_core::{ByteReader, ClientFactory, ClientUrl, Error, Result};

use super::Context;
use crate::exit_code::ExitCode;

/// Display object contents
#[derive(Args, Debug)]
pub struct CatArgs {
    /// Objects to print (local path, alias/bucket/key or http(s) URL)
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// First byte to print
    #[arg(long, requires = "length")]
    pub offset: Option<i64>,

    /// Number of bytes to print
    #[arg(long, requires = "offset")]
    pub length: Option<i64>,
}

/// Execute the cat command
pub async fn execute(args: CatArgs, ctx: &Context) -> ExitCode {
    let range = args.offset.zip(args.length);
    if range.is_some() && args.urls.len() > 1 {
        ctx.formatter
            .error("--offset and --length take exactly one URL");
        return ExitCode::UsageError;
    }

    let mut code = ExitCode::Success;
    for raw in &args.urls {
        if let Err(e) = print_object(ctx, raw, range).await {
            code = ctx.fail(&e);
        }
    }
    code
}

async fn print_object(ctx: &Context, raw: &str, range: Option<(i64, i64)>) -> Result<()> {
    let url = ClientUrl::parse(raw)?;
    if url.is_recursive() {
        return Err(Error::InvalidPath(format!(
            "cannot print '{raw}': recursive URLs name more than one object"
        )));
    }
    let client = ctx.factory.client(&url).await?;

    let mut body: ByteReader = match range {
        Some((offset, length)) => client.get_partial(offset, length).await?,
        None => client.get().await?.body,
    };

    // Raw bytes, so bypass the formatter
    let mut stdout = tokio::io::stdout();
    tokio::io::copy(&mut body, &mut stdout)
        .await
        .map_err(|e| Error::from_io(e, url.to_string()))?;
    stdout.flush().await?;
    Ok(())
}
