//! Client Contract
//!
//! Every backend (local filesystem, S3-compatible object store) implements
//! [`Client`]. The listing, copy and diff engines talk to backends only
//! through this trait, so they never see a backend-native error or type.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::error::{Error, Result};
use crate::url::ClientUrl;

/// Type tag of a namespace node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryType {
    File,
    Directory,
    BrokenSymlink,
    SymlinkCycle,
}

/// One namespace node returned by a backend
///
/// Names are relative to the listing root and always use `/` as separator.
/// Directory names carry a trailing `/`; file names never do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Relative name
    pub name: String,

    /// Size in bytes (0 for directories)
    pub size: u64,

    /// Last modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<jiff::Timestamp>,

    /// Node type
    #[serde(rename = "type")]
    pub entry_type: EntryType,

    /// Backend checksum (ETag for object stores)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    /// Whether the node was reached through a symbolic link
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub symlink: bool,
}

impl Entry {
    /// Create a new Entry for a file
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        let name: String = name.into();
        Self {
            name: name.trim_end_matches('/').to_string(),
            size,
            last_modified: None,
            entry_type: EntryType::File,
            checksum: None,
            symlink: false,
        }
    }

    /// Create a new Entry for a directory/prefix
    pub fn dir(name: impl Into<String>) -> Self {
        let mut name: String = name.into();
        if !name.ends_with('/') {
            name.push('/');
        }
        Self {
            name,
            size: 0,
            last_modified: None,
            entry_type: EntryType::Directory,
            checksum: None,
            symlink: false,
        }
    }

    /// Create an Entry describing a link that cannot be followed
    pub fn link(name: impl Into<String>, entry_type: EntryType) -> Self {
        Self {
            name: name.into(),
            size: 0,
            last_modified: None,
            entry_type,
            checksum: None,
            symlink: true,
        }
    }

    pub fn with_modified(mut self, modified: Option<jiff::Timestamp>) -> Self {
        self.last_modified = modified;
        self
    }

    pub fn with_checksum(mut self, checksum: Option<String>) -> Self {
        self.checksum = checksum;
        self
    }

    pub fn is_dir(&self) -> bool {
        self.entry_type == EntryType::Directory
    }

    /// Name without the directory suffix
    pub fn trimmed_name(&self) -> &str {
        self.name.trim_end_matches('/')
    }

    /// Name with host-OS separators, for presentation only
    pub fn display_name(&self) -> String {
        if std::path::MAIN_SEPARATOR == '/' {
            self.name.clone()
        } else {
            self.name.replace('/', std::path::MAIN_SEPARATOR_STR)
        }
    }
}

/// Error yielded while enumerating, with the entry it concerns when known
#[derive(Debug)]
pub struct ListError {
    pub error: Error,
    pub entry: Option<Entry>,
}

impl ListError {
    pub fn new(error: Error, entry: Option<Entry>) -> Self {
        Self { error, entry }
    }
}

impl From<Error> for ListError {
    fn from(error: Error) -> Self {
        Self { error, entry: None }
    }
}

impl std::fmt::Display for ListError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

/// Lazy, single-pass enumeration of a client's namespace
///
/// Dropping the stream releases directory handles or pagination state.
pub type EntryStream<'a> = BoxStream<'a, std::result::Result<Entry, ListError>>;

/// Object body
pub type ByteReader = Pin<Box<dyn AsyncRead + Send>>;

/// Result of a full object read
pub struct ObjectReader {
    pub body: ByteReader,
    pub size: u64,
    pub checksum: Option<String>,
}

impl std::fmt::Debug for ObjectReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectReader")
            .field("size", &self.size)
            .field("checksum", &self.checksum)
            .finish_non_exhaustive()
    }
}

/// Longest expiry accepted for share links
pub const MAX_SHARE_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default expiry for share links
pub const DEFAULT_SHARE_EXPIRY: Duration = MAX_SHARE_EXPIRY;

/// Capability set every backend provides
///
/// A client is bound to one URL. `list` is restartable per call but the
/// returned streams must not be polled concurrently on the same instance.
#[async_trait]
pub trait Client: Send + Sync {
    /// URL this client is bound to
    fn url(&self) -> &ClientUrl;

    /// Metadata for the exact path
    async fn stat(&self) -> Result<Entry>;

    /// Enumerate children; shallow lists direct children only
    fn list(&self, recursive: bool) -> EntryStream<'_>;

    /// Read the whole object
    async fn get(&self) -> Result<ObjectReader>;

    /// Read `length` bytes starting at `offset`.
    ///
    /// Fails with [`Error::InvalidRange`] unless `offset >= 0`, `length >= 0`
    /// and `offset + length <= size`, so the last byte read is at
    /// `offset + length - 1`. A zero length reads nothing.
    async fn get_partial(&self, offset: i64, length: i64) -> Result<ByteReader>;

    /// Write the object from `body`, which must yield exactly `size` bytes
    async fn put(&self, body: ByteReader, size: u64) -> Result<()>;

    /// Create a bucket or directory; succeeds if it already exists
    async fn put_container(&self, name: &str) -> Result<()>;

    /// Pre-signed download URL
    async fn share_download(&self, expiry: Duration) -> Result<String>;

    /// Upload form fields for a pre-signed POST
    async fn share_upload(
        &self,
        recursive: bool,
        expiry: Duration,
        content_type: Option<&str>,
    ) -> Result<BTreeMap<String, String>>;
}

/// Creates a client for a URL, keyed by backend kind
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn client(&self, url: &ClientUrl) -> Result<Arc<dyn Client>>;
}

/// Check a partial read request against the object size.
///
/// Accepts exactly the ranges with `offset >= 0`, `length >= 0` and
/// `offset + length <= size`.
pub fn validate_range(offset: i64, length: i64, size: u64) -> Result<()> {
    let invalid = || Error::InvalidRange {
        offset,
        length,
        size,
    };
    if offset < 0 || length < 0 {
        return Err(invalid());
    }
    let end = (offset as u64).checked_add(length as u64).ok_or_else(invalid)?;
    if end > size {
        return Err(invalid());
    }
    Ok(())
}

/// Check a share expiry against the accepted window
pub fn validate_expiry(expiry: Duration) -> Result<()> {
    if expiry < Duration::from_secs(1) || expiry > MAX_SHARE_EXPIRY {
        return Err(Error::InvalidPath(format!(
            "Expiry must be between 1s and 7 days, got {}s",
            expiry.as_secs()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_file() {
        let entry = Entry::file("test.txt", 1024);
        assert_eq!(entry.name, "test.txt");
        assert_eq!(entry.size, 1024);
        assert!(!entry.is_dir());
    }

    #[test]
    fn test_entry_dir_trailing_separator() {
        let entry = Entry::dir("path/to/dir");
        assert_eq!(entry.name, "path/to/dir/");
        assert_eq!(entry.trimmed_name(), "path/to/dir");
        assert!(entry.is_dir());

        let entry = Entry::dir("already/");
        assert_eq!(entry.name, "already/");
    }

    #[test]
    fn test_entry_file_never_has_trailing_separator() {
        let entry = Entry::file("weird/", 1);
        assert_eq!(entry.name, "weird");
    }

    #[test]
    fn test_entry_json_shape() {
        let entry = Entry::file("a.txt", 5);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "file");
        assert_eq!(json["name"], "a.txt");
        assert!(json.get("symlink").is_none());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range(0, 5, 5).is_ok());
        assert!(validate_range(2, 3, 5).is_ok());
        assert!(validate_range(5, 0, 5).is_ok());
        assert!(matches!(
            validate_range(-1, 1, 5),
            Err(Error::InvalidRange { .. })
        ));
        assert!(matches!(
            validate_range(3, 3, 5),
            Err(Error::InvalidRange { .. })
        ));
        assert!(matches!(
            validate_range(0, -2, 5),
            Err(Error::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_validate_range_last_byte() {
        // Reading through the final byte is allowed, one past it is not
        assert!(validate_range(8, 2, 10).is_ok());
        assert!(validate_range(9, 1, 10).is_ok());
        assert!(validate_range(8, 3, 10).is_err());
        assert!(validate_range(10, 1, 10).is_err());
        assert!(validate_range(11, 0, 10).is_err());
        assert!(validate_range(0, 0, 0).is_ok());
        assert!(validate_range(i64::MAX, i64::MAX, u64::MAX).is_ok());
        assert!(validate_range(1, 0, 0).is_err());
    }

    #[test]
    fn test_validate_expiry() {
        assert!(validate_expiry(Duration::from_secs(3600)).is_ok());
        assert!(validate_expiry(MAX_SHARE_EXPIRY).is_ok());
        assert!(validate_expiry(Duration::ZERO).is_err());
        assert!(validate_expiry(MAX_SHARE_EXPIRY + Duration::from_secs(1)).is_err());
    }
}
