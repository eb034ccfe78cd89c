//! Filesystem backend
//!
//! Implements the Client Contract over the local filesystem. Listings are a
//! lazy depth-first walk that reads one directory at a time and sorts its
//! children so the overall output is in canonical byte order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::{
    ByteReader, Client, ClientFactory, Entry, EntryStream, EntryType, ListError, ObjectReader,
    validate_range,
};
use crate::url::{BackendKind, ClientUrl};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Client bound to one local path
#[derive(Debug, Clone)]
pub struct FsClient {
    url: ClientUrl,
    path: PathBuf,
}

impl FsClient {
    /// Create a client for a filesystem URL
    pub fn new(url: ClientUrl) -> Result<Self> {
        let path = url
            .as_local()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::InvalidPath(format!("{url} is not a filesystem path")))?;
        Ok(Self { url, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }

    async fn metadata(&self) -> Result<std::fs::Metadata> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => Ok(meta),
            Err(e) => Err(root_error(&self.path, e).await),
        }
    }

    /// Hidden sibling used as the write target before the final rename
    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.path.with_file_name(format!(
            ".{file_name}.ferry-{}-{seq}.tmp",
            std::process::id()
        ))
    }
}

#[async_trait]
impl Client for FsClient {
    fn url(&self) -> &ClientUrl {
        &self.url
    }

    async fn stat(&self) -> Result<Entry> {
        let meta = self.metadata().await?;
        if self.url.is_container() && !meta.is_dir() {
            return Err(Error::NotDirectory(self.display()));
        }
        let symlink = tokio::fs::symlink_metadata(&self.path)
            .await
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        Ok(entry_from_metadata(self.url.base_name(), &meta, symlink))
    }

    fn list(&self, recursive: bool) -> EntryStream<'_> {
        let root = self.path.clone();
        let root_name = self.url.base_name();

        Box::pin(async_stream::stream! {
            let meta = match tokio::fs::metadata(&root).await {
                Ok(meta) => meta,
                Err(e) => {
                    yield Err(ListError::from(root_error(&root, e).await));
                    return;
                }
            };
            if !meta.is_dir() {
                yield Ok(entry_from_metadata(root_name, &meta, false));
                return;
            }

            let mut stack: Vec<Node> = Vec::new();
            match read_children(&root, "", &Arc::new(Vec::new())).await {
                Ok(children) => stack.extend(children.into_iter().rev()),
                Err(error) => {
                    yield Err(ListError::from(error));
                    return;
                }
            }

            while let Some(node) = stack.pop() {
                let entry = match node.item {
                    Ok(entry) => entry,
                    Err(error) => {
                        yield Err(error);
                        continue;
                    }
                };
                if !entry.is_dir() || !recursive {
                    yield Ok(entry);
                    continue;
                }
                match read_children(&node.path, &entry.name, &node.ancestors).await {
                    Ok(children) => stack.extend(children.into_iter().rev()),
                    Err(error) => {
                        yield Err(ListError::new(error, Some(entry)));
                    }
                }
            }
        })
    }

    async fn get(&self) -> Result<ObjectReader> {
        let meta = self.metadata().await?;
        if meta.is_dir() {
            return Err(Error::IsDirectory(self.display()));
        }
        let file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| Error::from_io(e, self.display()))?;
        Ok(ObjectReader {
            body: Box::pin(file),
            size: meta.len(),
            checksum: None,
        })
    }

    async fn get_partial(&self, offset: i64, length: i64) -> Result<ByteReader> {
        let meta = self.metadata().await?;
        if meta.is_dir() {
            return Err(Error::IsDirectory(self.display()));
        }
        validate_range(offset, length, meta.len())?;

        let mut file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| Error::from_io(e, self.display()))?;
        file.seek(std::io::SeekFrom::Start(offset as u64)).await?;
        Ok(Box::pin(file.take(length as u64)))
    }

    async fn put(&self, body: ByteReader, size: u64) -> Result<()> {
        if let Ok(meta) = tokio::fs::metadata(&self.path).await
            && meta.is_dir()
        {
            return Err(Error::IsDirectory(self.display()));
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::from_io(e, parent.display().to_string()))?;
        }

        let temp = self.temp_path();
        debug!(target = %self.display(), temp = %temp.display(), "Writing object");
        let written = match write_temp(&temp, body, size).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp).await;
                return Err(e.transfer_failed(self.display()));
            }
        };
        if written != size {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(Error::General(format!(
                "short body: expected {size} bytes, received {written}"
            ))
            .transfer_failed(self.display()));
        }

        if let Err(e) = tokio::fs::rename(&temp, &self.path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(Error::from_io(e, self.display()).transfer_failed(self.display()));
        }
        Ok(())
    }

    async fn put_container(&self, name: &str) -> Result<()> {
        tokio::fs::create_dir_all(name)
            .await
            .map_err(|e| Error::ContainerCreateFailed {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }

    async fn share_download(&self, _expiry: Duration) -> Result<String> {
        Err(Error::UnsupportedFeature(
            "share links are not available for filesystem paths".into(),
        ))
    }

    async fn share_upload(
        &self,
        _recursive: bool,
        _expiry: Duration,
        _content_type: Option<&str>,
    ) -> Result<BTreeMap<String, String>> {
        Err(Error::UnsupportedFeature(
            "share links are not available for filesystem paths".into(),
        ))
    }
}

/// Factory for filesystem URLs only
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFactory;

#[async_trait]
impl ClientFactory for LocalFactory {
    async fn client(&self, url: &ClientUrl) -> Result<Arc<dyn Client>> {
        match url.kind() {
            BackendKind::Filesystem => Ok(Arc::new(FsClient::new(url.clone())?)),
            BackendKind::ObjectStore => Err(Error::UnsupportedFeature(format!(
                "no object-store backend configured for {url}"
            ))),
        }
    }
}

/// Pending walk item
struct Node {
    path: PathBuf,
    item: std::result::Result<Entry, ListError>,
    /// Canonical paths of the directories above this node
    ancestors: Arc<Vec<PathBuf>>,
}

impl Node {
    fn sort_key(&self) -> &str {
        match &self.item {
            Ok(entry) => &entry.name,
            Err(ListError {
                entry: Some(entry), ..
            }) => &entry.name,
            Err(_) => "",
        }
    }
}

/// Read one directory and resolve its children, sorted by canonical name
async fn read_children(
    dir: &Path,
    prefix: &str,
    ancestors: &Arc<Vec<PathBuf>>,
) -> Result<Vec<Node>> {
    let canonical = tokio::fs::canonicalize(dir)
        .await
        .map_err(|e| Error::from_io(e, dir.display().to_string()))?;
    if ancestors.contains(&canonical) {
        return Err(Error::SymlinkCycle(dir.display().to_string()));
    }
    let mut chain = ancestors.as_ref().clone();
    chain.push(canonical);
    let chain = Arc::new(chain);

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| Error::from_io(e, dir.display().to_string()))?;

    let mut nodes = Vec::new();
    loop {
        let dir_entry = match entries.next_entry().await {
            Ok(Some(dir_entry)) => dir_entry,
            Ok(None) => break,
            Err(e) => return Err(Error::from_io(e, dir.display().to_string())),
        };
        let path = dir_entry.path();
        let name = format!("{prefix}{}", dir_entry.file_name().to_string_lossy());
        let is_symlink = match dir_entry.file_type().await {
            Ok(file_type) => file_type.is_symlink(),
            Err(e) => {
                let error = Error::from_io(e, path.display().to_string());
                nodes.push(Node {
                    item: Err(ListError::new(error, Some(Entry::file(name, 0)))),
                    path,
                    ancestors: chain.clone(),
                });
                continue;
            }
        };
        let item = resolve_child(&path, name, is_symlink).await;
        nodes.push(Node {
            path,
            item,
            ancestors: chain.clone(),
        });
    }
    drop(entries);

    nodes.sort_by(|a, b| a.sort_key().cmp(b.sort_key()));
    Ok(nodes)
}

/// Stat a child, following symbolic links
async fn resolve_child(
    path: &Path,
    name: String,
    is_symlink: bool,
) -> std::result::Result<Entry, ListError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(entry_from_metadata(name, &meta, is_symlink)),
        Err(e) if is_symlink => {
            let display = path.display().to_string();
            match Error::from_io(e, display.clone()) {
                Error::NotFound(_) => Err(ListError::new(
                    Error::BrokenSymlink(display),
                    Some(Entry::link(name, EntryType::BrokenSymlink)),
                )),
                Error::SymlinkCycle(p) => Err(ListError::new(
                    Error::SymlinkCycle(p),
                    Some(Entry::link(name, EntryType::SymlinkCycle)),
                )),
                other => Err(ListError::new(other, Some(Entry::link(name, EntryType::File)))),
            }
        }
        Err(e) => Err(ListError::new(
            Error::from_io(e, path.display().to_string()),
            Some(Entry::file(name, 0)),
        )),
    }
}

/// Error for a root path that could not be stat-ed
async fn root_error(path: &Path, err: std::io::Error) -> Error {
    let display = path.display().to_string();
    if err.kind() == std::io::ErrorKind::NotFound
        && let Ok(meta) = tokio::fs::symlink_metadata(path).await
        && meta.file_type().is_symlink()
    {
        return Error::BrokenSymlink(display);
    }
    Error::from_io(err, display)
}

fn entry_from_metadata(name: String, meta: &std::fs::Metadata, symlink: bool) -> Entry {
    let modified = meta
        .modified()
        .ok()
        .and_then(|t| jiff::Timestamp::try_from(t).ok());
    let mut entry = if meta.is_dir() {
        Entry::dir(name)
    } else {
        Entry::file(name, meta.len())
    };
    entry.symlink = symlink;
    entry.with_modified(modified)
}

async fn write_temp(temp: &Path, body: ByteReader, size: u64) -> Result<u64> {
    let mut file = tokio::fs::File::create(temp)
        .await
        .map_err(|e| Error::from_io(e, temp.display().to_string()))?;
    let mut limited = body.take(size);
    let written = tokio::io::copy(&mut limited, &mut file).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tempfile::TempDir;

    fn client_for(path: &Path) -> FsClient {
        FsClient::new(ClientUrl::local(path)).unwrap()
    }

    async fn read_all(mut body: ByteReader) -> Vec<u8> {
        let mut buf = Vec::new();
        body.read_to_end(&mut buf).await.unwrap();
        buf
    }

    async fn names(client: &FsClient, recursive: bool) -> Vec<String> {
        client
            .list(recursive)
            .filter_map(|item| async move { item.ok().map(|e| e.name) })
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let temp = TempDir::new().unwrap();
        let client = client_for(&temp.path().join("nested/hello.txt"));

        client
            .put(Box::pin(std::io::Cursor::new(b"hello".to_vec())), 5)
            .await
            .unwrap();

        let reader = client.get().await.unwrap();
        assert_eq!(reader.size, 5);
        assert_eq!(read_all(reader.body).await, b"hello");

        // No temporary siblings are left behind.
        let leftovers: Vec<_> = std::fs::read_dir(temp.path().join("nested"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[tokio::test]
    async fn test_put_short_body_fails_and_leaves_nothing() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("short.bin");
        let client = client_for(&target);

        let result = client
            .put(Box::pin(std::io::Cursor::new(b"abc".to_vec())), 10)
            .await;
        assert!(matches!(result, Err(Error::TransferFailed { .. })));
        assert!(!target.exists());
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_get_partial_bounds() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.txt");
        std::fs::write(&path, b"hello world").unwrap();
        let client = client_for(&path);

        let body = client.get_partial(6, 5).await.unwrap();
        assert_eq!(read_all(body).await, b"world");

        let body = client.get_partial(0, 11).await.unwrap();
        assert_eq!(read_all(body).await.len(), 11);

        assert!(matches!(
            client.get_partial(-1, 2).await,
            Err(Error::InvalidRange { .. })
        ));
        assert!(matches!(
            client.get_partial(6, 6).await,
            Err(Error::InvalidRange { .. })
        ));
    }

    #[tokio::test]
    async fn test_stat_missing_and_directory() {
        let temp = TempDir::new().unwrap();
        let missing = client_for(&temp.path().join("nope"));
        assert!(matches!(missing.stat().await, Err(Error::NotFound(_))));

        let dir = client_for(temp.path());
        assert!(dir.stat().await.unwrap().is_dir());
        assert!(matches!(dir.get().await, Err(Error::IsDirectory(_))));
    }

    #[tokio::test]
    async fn test_stat_file_with_trailing_separator() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("f"), b"x").unwrap();
        let raw = format!("{}/f/", temp.path().display());
        let client = FsClient::new(ClientUrl::parse(&raw).unwrap()).unwrap();
        assert!(matches!(client.stat().await, Err(Error::NotDirectory(_))));
    }

    #[tokio::test]
    async fn test_list_sorted_canonical_order() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("a/deep")).unwrap();
        std::fs::write(temp.path().join("a.txt"), b"1").unwrap();
        std::fs::write(temp.path().join("a/x"), b"22").unwrap();
        std::fs::write(temp.path().join("a/deep/y"), b"333").unwrap();
        std::fs::write(temp.path().join("b"), b"4444").unwrap();

        let client = client_for(temp.path());
        assert_eq!(
            names(&client, true).await,
            vec!["a.txt", "a/deep/y", "a/x", "b"]
        );
        assert_eq!(names(&client, false).await, vec!["a.txt", "a/", "b"]);
    }

    #[tokio::test]
    async fn test_list_single_file_root() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("only.bin");
        std::fs::write(&path, b"12345").unwrap();

        let entries: Vec<_> = client_for(&path).list(true).collect().await;
        assert_eq!(entries.len(), 1);
        let entry = entries.into_iter().next().unwrap().unwrap();
        assert_eq!(entry.name, "only.bin");
        assert_eq!(entry.size, 5);
    }

    #[tokio::test]
    async fn test_list_missing_root() {
        let temp = TempDir::new().unwrap();
        let entries: Vec<_> = client_for(&temp.path().join("gone")).list(true).collect().await;
        assert_eq!(entries.len(), 1);
        assert!(matches!(
            &entries[0],
            Err(ListError {
                error: Error::NotFound(_),
                ..
            })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_reports_broken_symlink() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("real"), b"x").unwrap();
        std::os::unix::fs::symlink(temp.path().join("missing"), temp.path().join("dangling"))
            .unwrap();

        let items: Vec<_> = client_for(temp.path()).list(true).collect().await;
        assert_eq!(items.len(), 2);
        match &items[0] {
            Err(ListError {
                error: Error::BrokenSymlink(_),
                entry: Some(entry),
            }) => assert_eq!(entry.name, "dangling"),
            other => panic!("unexpected item: {other:?}"),
        }
        assert_eq!(items[1].as_ref().unwrap().name, "real");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_detects_directory_cycle() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("d")).unwrap();
        std::fs::write(temp.path().join("d/f"), b"x").unwrap();
        std::os::unix::fs::symlink(temp.path(), temp.path().join("d/up")).unwrap();

        let items: Vec<_> = client_for(temp.path()).list(true).collect().await;
        let files: Vec<_> = items.iter().filter_map(|i| i.as_ref().ok()).collect();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "d/f");
        assert!(items.iter().any(|i| matches!(
            i,
            Err(ListError {
                error: Error::SymlinkCycle(_),
                ..
            })
        )));
    }

    #[tokio::test]
    async fn test_put_container_idempotent() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("bucket");
        let client = client_for(temp.path());
        let name = dir.to_string_lossy().into_owned();

        client.put_container(&name).await.unwrap();
        client.put_container(&name).await.unwrap();
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn test_share_unsupported() {
        let temp = TempDir::new().unwrap();
        let client = client_for(temp.path());
        assert!(matches!(
            client.share_download(Duration::from_secs(60)).await,
            Err(Error::UnsupportedFeature(_))
        ));
    }

    #[tokio::test]
    async fn test_local_factory_rejects_remote() {
        let url = ClientUrl::parse("u/bucket/key").unwrap();
        assert!(matches!(
            LocalFactory.client(&url).await,
            Err(Error::UnsupportedFeature(_))
        ));
    }
}
