//! Listing Engine
//!
//! Turns one client's namespace into a finite, single-pass stream of
//! presentation-ready entries. Recoverable enumeration errors are logged and
//! skipped; the first fatal error ends the stream.

use futures::StreamExt;
use futures::stream::BoxStream;
use serde::Serialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::traits::{Client, Entry, ListError};
use crate::url::BackendKind;

/// Why an enumeration error was skipped instead of ending the listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipCategory {
    BrokenSymlink,
    SymlinkCycle,
    BrokenDirectoryLink,
    Inaccessible,
}

impl SkipCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipCategory::BrokenSymlink => "broken-symlink",
            SkipCategory::SymlinkCycle => "symlink-cycle",
            SkipCategory::BrokenDirectoryLink => "broken-directory-link",
            SkipCategory::Inaccessible => "inaccessible",
        }
    }
}

impl std::fmt::Display for SkipCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide whether an enumeration error can be skipped
///
/// Not-found and permission errors are only recoverable mid-walk on a
/// filesystem, where they come from concurrent deletion or unreadable
/// sub-paths.
pub fn skip_category(kind: BackendKind, err: &ListError) -> Option<SkipCategory> {
    match &err.error {
        Error::BrokenSymlink(_) => Some(SkipCategory::BrokenSymlink),
        Error::SymlinkCycle(_) => Some(SkipCategory::SymlinkCycle),
        Error::NotFound(_) | Error::PermissionDenied(_) if kind == BackendKind::Filesystem => {
            match &err.entry {
                Some(entry) if entry.is_dir() && entry.symlink => {
                    Some(SkipCategory::BrokenDirectoryLink)
                }
                _ => Some(SkipCategory::Inaccessible),
            }
        }
        _ => None,
    }
}

/// List a client's namespace
///
/// The root is stat-ed first; a missing root yields that error and nothing
/// else. With `multi_source` set and a directory root, entry names are
/// prefixed with the root's own name so several arguments stay distinct in
/// combined output.
pub fn do_list(
    client: &dyn Client,
    recursive: bool,
    multi_source: bool,
) -> BoxStream<'_, Result<Entry>> {
    Box::pin(async_stream::stream! {
        let root = match client.stat().await {
            Ok(root) => root,
            Err(e) => {
                yield Err(e);
                return;
            }
        };
        let kind = client.url().kind();

        let mut entries = client.list(recursive);
        while let Some(item) = entries.next().await {
            match item {
                Ok(mut entry) => {
                    if multi_source && root.is_dir() {
                        entry.name = format!("{}{}", root.name, entry.name);
                    }
                    yield Ok(entry);
                }
                Err(err) => match skip_category(kind, &err) {
                    Some(category) => {
                        warn!(
                            url = %client.url(),
                            entry = err.entry.as_ref().map(|e| e.name.as_str()).unwrap_or(""),
                            category = category.as_str(),
                            "Skipping: {}",
                            err.error
                        );
                    }
                    None => {
                        yield Err(err.error);
                        break;
                    }
                },
            }
        }
    })
}

/// One listing line, renderable as text or JSON
#[derive(Debug, Clone, Serialize)]
pub struct ContentMessage {
    #[serde(rename = "type")]
    pub file_type: &'static str,
    #[serde(rename = "lastModified", skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<jiff::Timestamp>,
    pub size: u64,
    pub name: String,
}

impl ContentMessage {
    pub fn new(entry: &Entry) -> Self {
        Self {
            file_type: if entry.is_dir() { "folder" } else { "file" },
            last_modified: entry.last_modified,
            size: entry.size,
            name: entry.display_name(),
        }
    }

    /// Local time, formatted as `YYYY-MM-DD HH:MM:SS TZ`
    pub fn time_string(&self) -> String {
        match self.last_modified {
            Some(ts) => ts
                .to_zoned(jiff::tz::TimeZone::system())
                .strftime("%Y-%m-%d %H:%M:%S %Z")
                .to_string(),
            None => String::new(),
        }
    }

    pub fn size_string(&self) -> String {
        humansize::format_size(self.size, humansize::BINARY)
    }
}

impl std::fmt::Display for ContentMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {:>10} {}",
            self.time_string(),
            self.size_string(),
            self.name
        )
    }
}
