//! URL parsing and resolution
//!
//! A ferry URL addresses either the local filesystem or an object store.
//! Object-store URLs come in two shapes: `alias/bucket[/key]` and
//! `http(s)://host[:port]/bucket[/key]`. Anything else is a local path.
//!
//! A trailing `...` marks a URL as recursive ("this path and everything
//! beneath it"). The flag is derived from the literal string only.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Suffix that requests recursive traversal
pub const RECURSIVE_MARKER: &str = "...";

/// Backend a URL is served by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    Filesystem,
    ObjectStore,
}

/// A parsed remote path pointing to an S3 location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
    /// Alias name, or the endpoint (`scheme://host[:port]`) for URL-form paths
    pub alias: String,
    /// Bucket name
    pub bucket: String,
    /// Object key (empty for bucket root)
    pub key: String,
    /// Whether the path ends with a slash (directory semantics)
    pub is_dir: bool,
}

impl RemotePath {
    /// Create a new RemotePath
    pub fn new(
        alias: impl Into<String>,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let is_dir = key.ends_with('/') || key.is_empty();
        Self {
            alias: alias.into(),
            bucket: bucket.into(),
            key,
            is_dir,
        }
    }

    /// Whether the alias component is a literal endpoint rather than an alias name
    pub fn has_endpoint(&self) -> bool {
        self.alias.starts_with("http://") || self.alias.starts_with("https://")
    }

    /// Get the full path as a string (alias/bucket/key)
    pub fn to_full_path(&self) -> String {
        if self.key.is_empty() {
            format!("{}/{}", self.alias, self.bucket)
        } else {
            format!("{}/{}/{}", self.alias, self.bucket, self.key)
        }
    }

    /// Get the parent path (one level up)
    pub fn parent(&self) -> Option<Self> {
        if self.key.is_empty() {
            return None;
        }
        let key = self.key.trim_end_matches('/');
        let parent_key = match key.rfind('/') {
            Some(pos) => format!("{}/", &key[..pos]),
            None => String::new(),
        };
        Some(Self {
            alias: self.alias.clone(),
            bucket: self.bucket.clone(),
            key: parent_key,
            is_dir: true,
        })
    }

    /// Join a child path component
    pub fn join(&self, child: &str) -> Self {
        let base = self.key.trim_end_matches('/');
        let child = child.trim_start_matches('/');
        let key = if base.is_empty() {
            child.to_string()
        } else {
            format!("{base}/{child}")
        };
        let is_dir = child.ends_with('/');
        Self {
            alias: self.alias.clone(),
            bucket: self.bucket.clone(),
            key,
            is_dir,
        }
    }
}

impl std::fmt::Display for RemotePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_full_path())
    }
}

/// Parsed path that can be either local or remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedPath {
    /// Local filesystem path
    Local(PathBuf),
    /// Remote S3 path
    Remote(RemotePath),
}

impl ParsedPath {
    /// Check if this is a remote path
    pub fn is_remote(&self) -> bool {
        matches!(self, ParsedPath::Remote(_))
    }

    /// Check if this is a local path
    pub fn is_local(&self) -> bool {
        matches!(self, ParsedPath::Local(_))
    }

    /// Get the remote path if this is a remote path
    pub fn as_remote(&self) -> Option<&RemotePath> {
        match self {
            ParsedPath::Remote(p) => Some(p),
            ParsedPath::Local(_) => None,
        }
    }

    /// Get the local path if this is a local path
    pub fn as_local(&self) -> Option<&PathBuf> {
        match self {
            ParsedPath::Local(p) => Some(p),
            ParsedPath::Remote(_) => None,
        }
    }
}

/// Whether a URL string carries the recursive marker
pub fn is_recursive(raw: &str) -> bool {
    raw.trim().ends_with(RECURSIVE_MARKER)
}

/// Remove the recursive marker, if present
pub fn strip_recursive(raw: &str) -> &str {
    let raw = raw.trim();
    raw.strip_suffix(RECURSIVE_MARKER).unwrap_or(raw)
}

/// A resolved ferry URL: backend address plus the recursive flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientUrl {
    raw: String,
    path: ParsedPath,
    recursive: bool,
}

impl ClientUrl {
    /// Parse a URL string, honouring the recursive marker
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidPath("Path cannot be empty".into()));
        }
        let recursive = is_recursive(trimmed);
        let stripped = strip_recursive(trimmed);
        let path = if stripped.is_empty() {
            // A bare "..." is the current directory, recursively.
            ParsedPath::Local(PathBuf::from("."))
        } else {
            parse_path(stripped)?
        };
        Ok(Self {
            raw: trimmed.to_string(),
            path,
            recursive,
        })
    }

    /// Build a URL for a local path
    pub fn local(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            raw: path.to_string_lossy().into_owned(),
            path: ParsedPath::Local(path),
            recursive: false,
        }
    }

    /// Build a URL for a remote path
    pub fn remote(path: RemotePath) -> Self {
        Self {
            raw: path.to_full_path(),
            path: ParsedPath::Remote(path),
            recursive: false,
        }
    }

    /// The string this URL was parsed from, marker included
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn path(&self) -> &ParsedPath {
        &self.path
    }

    pub fn kind(&self) -> BackendKind {
        match self.path {
            ParsedPath::Local(_) => BackendKind::Filesystem,
            ParsedPath::Remote(_) => BackendKind::ObjectStore,
        }
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    pub fn as_local(&self) -> Option<&Path> {
        self.path.as_local().map(PathBuf::as_path)
    }

    pub fn as_remote(&self) -> Option<&RemotePath> {
        self.path.as_remote()
    }

    /// Alias name for `alias/bucket/key` URLs
    pub fn alias(&self) -> Option<&str> {
        self.as_remote()
            .filter(|r| !r.has_endpoint())
            .map(|r| r.alias.as_str())
    }

    /// Literal endpoint for `http(s)://` URLs
    pub fn endpoint(&self) -> Option<&str> {
        self.as_remote()
            .filter(|r| r.has_endpoint())
            .map(|r| r.alias.as_str())
    }

    pub fn bucket(&self) -> Option<&str> {
        self.as_remote().map(|r| r.bucket.as_str())
    }

    pub fn key(&self) -> Option<&str> {
        self.as_remote().map(|r| r.key.as_str())
    }

    /// Whether the URL names a container rather than an object
    ///
    /// Object stores: a bucket root or a key ending in `/`.
    /// Filesystem: a path written with a trailing separator, or whose last
    /// component is `.` or `..`. Decided from the string alone.
    pub fn is_container(&self) -> bool {
        match &self.path {
            ParsedPath::Remote(remote) => remote.is_dir,
            ParsedPath::Local(_) => {
                let stripped = strip_recursive(&self.raw);
                let last = stripped
                    .rsplit(['/', std::path::MAIN_SEPARATOR])
                    .next()
                    .unwrap_or_default();
                matches!(last, "" | "." | "..")
            }
        }
    }

    /// Name of the container that must exist before objects can be written under this URL
    ///
    /// For filesystem URLs naming a file this is the parent directory.
    pub fn container_name(&self) -> String {
        match &self.path {
            ParsedPath::Remote(remote) => remote.bucket.clone(),
            ParsedPath::Local(path) if self.is_container() => path.to_string_lossy().into_owned(),
            ParsedPath::Local(path) => match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => {
                    parent.to_string_lossy().into_owned()
                }
                _ => ".".to_string(),
            },
        }
    }

    /// Last path component, without any trailing separator
    pub fn base_name(&self) -> String {
        match &self.path {
            ParsedPath::Remote(remote) => {
                let key = remote.key.trim_end_matches('/');
                match key.rsplit('/').next() {
                    Some(name) if !name.is_empty() => name.to_string(),
                    _ => remote.bucket.clone(),
                }
            }
            ParsedPath::Local(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string_lossy().into_owned()),
        }
    }

    /// Append a `/`-separated relative path; the result is never recursive
    pub fn join(&self, relative: &str) -> Self {
        match &self.path {
            ParsedPath::Remote(remote) => Self::remote(remote.join(relative)),
            ParsedPath::Local(path) => {
                let mut joined = path.clone();
                for component in relative.split('/').filter(|c| !c.is_empty()) {
                    joined.push(component);
                }
                Self::local(joined)
            }
        }
    }

    /// Same address without the recursive flag
    pub fn non_recursive(&self) -> Self {
        let mut url = self.clone();
        url.raw = strip_recursive(&self.raw).to_string();
        url.recursive = false;
        url
    }
}

impl std::fmt::Display for ClientUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            ParsedPath::Remote(remote) => write!(f, "{remote}"),
            ParsedPath::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

impl std::str::FromStr for ClientUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Parse a path string into a ParsedPath
///
/// Remote paths have the format `alias/bucket[/key]` or
/// `http(s)://host/bucket[/key]`. Local paths are anything that:
/// - Starts with / (absolute path)
/// - Starts with ./ or ../ (relative path)
/// - Is a single component containing a dot
/// - Or doesn't match the alias/bucket pattern
pub fn parse_path(path: &str) -> Result<ParsedPath> {
    if path.is_empty() {
        return Err(Error::InvalidPath("Path cannot be empty".into()));
    }

    if path.starts_with("http://") || path.starts_with("https://") {
        return parse_endpoint_url(path);
    }

    if path.starts_with('/') {
        return Ok(ParsedPath::Local(PathBuf::from(path)));
    }

    if path == "." || path == ".." || path.starts_with("./") || path.starts_with("../") {
        return Ok(ParsedPath::Local(PathBuf::from(path)));
    }

    #[cfg(windows)]
    if path.len() >= 2 && path.chars().nth(1) == Some(':') {
        return Ok(ParsedPath::Local(PathBuf::from(path)));
    }

    let parts: Vec<&str> = path.splitn(3, '/').collect();

    match parts.as_slice() {
        [single] => {
            if single.contains('.') || single.contains('\\') {
                Ok(ParsedPath::Local(PathBuf::from(path)))
            } else {
                Err(Error::InvalidPath(format!(
                    "Path '{path}' is incomplete. Use format: alias/bucket[/key]"
                )))
            }
        }
        [alias, bucket] | [alias, bucket, _] => {
            if !is_valid_alias_name(alias) {
                return Ok(ParsedPath::Local(PathBuf::from(path)));
            }
            if bucket.is_empty() {
                return Err(Error::InvalidPath("Bucket name cannot be empty".into()));
            }
            let key = parts.get(2).copied().unwrap_or_default();
            Ok(ParsedPath::Remote(RemotePath::new(*alias, *bucket, key)))
        }
        _ => Err(Error::InvalidPath(format!("Invalid path format: {path}"))),
    }
}

fn parse_endpoint_url(raw: &str) -> Result<ParsedPath> {
    let parsed = url::Url::parse(raw)?;
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::InvalidPath(format!("URL '{raw}' has no host")))?;
    let endpoint = match parsed.port() {
        Some(port) => format!("{}://{host}:{port}", parsed.scheme()),
        None => format!("{}://{host}", parsed.scheme()),
    };

    // Keep the key exactly as written; url::Url would normalize it.
    let after_scheme = &raw[parsed.scheme().len() + 3..];
    let remainder = after_scheme
        .find('/')
        .map(|pos| &after_scheme[pos + 1..])
        .unwrap_or_default();
    let mut segments = remainder.splitn(2, '/');
    let bucket = segments.next().unwrap_or_default();
    if bucket.is_empty() {
        return Err(Error::InvalidPath(format!(
            "URL '{raw}' does not name a bucket"
        )));
    }
    let key = segments.next().unwrap_or_default();
    Ok(ParsedPath::Remote(RemotePath::new(endpoint, bucket, key)))
}

/// Check if a string is a valid alias name
pub fn is_valid_alias_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
