//! Copy/Mirror Executor
//!
//! Classifies a copy request, enumerates each source through the Listing
//! Engine, computes one destination per entry and drives the transfers
//! through a bounded worker pool. A failed transfer is recorded and the run
//! goes on; only a fatal listing error ends a source early.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classify::{Classification, classify};
use crate::compare::CompareSettings;
use crate::config::TransferDefaults;
use crate::error::{Error, Result};
use crate::listing::do_list;
use crate::traits::{Client, ClientFactory, Entry};
use crate::url::ClientUrl;

/// What happens when two sources produce the same destination key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlapPolicy {
    /// Later sources overwrite earlier ones
    #[default]
    LastWriteWins,
    /// A key written earlier in the run is not written again
    FirstWriteWins,
}

/// Tuning for one cp or mirror run
#[derive(Debug, Clone)]
pub struct CopySettings {
    /// Maximum number of transfers in flight
    pub concurrency: usize,
    /// Extra attempts for a transfer failing with a transient error
    pub retries: u32,
    /// Back-off step; attempt `n` waits `n * retry_backoff`
    pub retry_backoff: Duration,
    /// Skip units whose destination already matches
    pub mirror: bool,
    /// Equality policy used by mirror
    pub compare: CompareSettings,
    pub overlap: OverlapPolicy,
    /// Plan transfers without touching the target
    pub dry_run: bool,
}

impl CopySettings {
    pub fn from_defaults(defaults: &TransferDefaults) -> Self {
        Self {
            concurrency: defaults.concurrency.max(1),
            retries: defaults.retries,
            retry_backoff: defaults.retry_backoff(),
            overlap: defaults.overlap,
            ..Self::default()
        }
    }
}

impl Default for CopySettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            retries: 3,
            retry_backoff: Duration::from_millis(200),
            mirror: false,
            compare: CompareSettings::default(),
            overlap: OverlapPolicy::default(),
            dry_run: false,
        }
    }
}

/// One resolved transfer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyUnit {
    /// Object being copied
    pub source: ClientUrl,
    /// Source metadata as listed
    pub entry: Entry,
    /// Where the object is written
    pub destination: ClientUrl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// Destination already matches the source
    UpToDate,
    /// Destination key was written by an earlier source
    Overlap,
    DryRun,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SkipReason::UpToDate => "up to date",
            SkipReason::Overlap => "already written by an earlier source",
            SkipReason::DryRun => "dry run",
        };
        f.write_str(text)
    }
}

#[derive(Debug)]
pub enum Outcome {
    Copied { bytes: u64 },
    Skipped { reason: SkipReason },
    Failed { error: Error },
}

/// A unit together with what happened to it
#[derive(Debug)]
pub struct Transfer {
    pub unit: CopyUnit,
    pub outcome: Outcome,
}

/// Destination of one listed entry
///
/// Pure: depends only on the classification, the source root, the entry's
/// relative name and the target.
pub fn destination(
    classification: Classification,
    source_root: &ClientUrl,
    entry: &Entry,
    target: &ClientUrl,
) -> Result<ClientUrl> {
    match classification {
        Classification::TypeA => Ok(target.non_recursive()),
        Classification::TypeB => Ok(target.join(&source_root.base_name())),
        Classification::TypeC | Classification::TypeD => Ok(target.join(&entry.name)),
        Classification::Invalid => Err(Error::InvalidCopyCombination(format!(
            "no destination for {source_root}"
        ))),
    }
}

/// Start a copy (or mirror) run
///
/// An invalid source/target combination is rejected here, before any
/// client is created. The returned stream yields one `Transfer` per unit;
/// an `Err` item is a fatal error for one source, after which the next
/// source is attempted.
pub fn copy<S: AsRef<str>>(
    factory: Arc<dyn ClientFactory>,
    sources: &[S],
    target: &str,
    settings: CopySettings,
) -> Result<BoxStream<'static, Result<Transfer>>> {
    let classification = classify(sources, target);
    if !classification.is_valid() {
        return Err(Error::InvalidCopyCombination(describe_invalid(sources, target)));
    }
    let target = ClientUrl::parse(target)?;
    let sources = sources
        .iter()
        .map(|s| ClientUrl::parse(s.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    debug!(%classification, %target, sources = sources.len(), "Starting copy");

    let executor = Arc::new(Executor {
        factory,
        classification,
        target,
        concurrency: settings.concurrency.max(1),
        settings,
        claimed: Mutex::new(HashSet::new()),
    });

    Ok(Box::pin(async_stream::stream! {
        if !executor.settings.dry_run {
            if let Err(e) = executor.prepare_target().await {
                yield Err(e);
                return;
            }
        }

        for source in sources {
            let worker = executor.clone();
            let mut transfers = executor
                .clone()
                .plan(source)
                .map(move |item| {
                    let worker = worker.clone();
                    async move {
                        match item {
                            Ok(planned) => Ok(worker.run(planned).await),
                            Err(e) => Err(e),
                        }
                    }
                })
                .buffer_unordered(executor.concurrency);
            while let Some(item) = transfers.next().await {
                yield item;
            }
        }
    }))
}

fn describe_invalid<S: AsRef<str>>(sources: &[S], target: &str) -> String {
    if sources.is_empty() {
        return "no source given".into();
    }
    if target.trim().is_empty() {
        return "no target given".into();
    }
    if let Some(bad) = sources
        .iter()
        .map(|s| s.as_ref())
        .chain(std::iter::once(target))
        .find(|s| ClientUrl::parse(s).is_err())
    {
        return format!("cannot parse '{bad}'");
    }
    "multiple sources must all end with '...' to be copied recursively".into()
}

struct Planned {
    unit: CopyUnit,
    skip: Option<SkipReason>,
}

struct Executor {
    factory: Arc<dyn ClientFactory>,
    classification: Classification,
    target: ClientUrl,
    concurrency: usize,
    settings: CopySettings,
    /// Destination keys already assigned in this run
    claimed: Mutex<HashSet<String>>,
}

impl Executor {
    async fn prepare_target(&self) -> Result<()> {
        let client = self.factory.client(&self.target).await?;
        client.put_container(&self.target.container_name()).await
    }

    /// Enumerate one source into planned units
    fn plan(self: Arc<Self>, source: ClientUrl) -> BoxStream<'static, Result<Planned>> {
        Box::pin(async_stream::stream! {
            let client = match self.factory.client(&source).await {
                Ok(client) => client,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            let root = match client.stat().await {
                Ok(root) => root,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            if !self.classification.is_recursive() {
                if root.is_dir() {
                    yield Err(Error::IsDirectory(format!(
                        "{source} is a directory; append '...' to copy recursively"
                    )));
                } else {
                    yield self.planned(&source, source.non_recursive(), root);
                }
                return;
            }

            let mut entries = do_list(client.as_ref(), true, false);
            while let Some(item) = entries.next().await {
                match item {
                    Ok(entry) if entry.is_dir() => {}
                    Ok(entry) => {
                        let unit_source = if root.is_dir() {
                            source.join(&entry.name)
                        } else {
                            source.non_recursive()
                        };
                        yield self.planned(&source, unit_source, entry);
                    }
                    Err(e) => {
                        warn!(%source, error = %e, "Listing failed, abandoning source");
                        yield Err(e);
                        break;
                    }
                }
            }
        })
    }

    fn planned(&self, root: &ClientUrl, source: ClientUrl, entry: Entry) -> Result<Planned> {
        let destination = destination(self.classification, root, &entry, &self.target)?;
        debug!(source = %source, destination = %destination, "Computed destination");

        let skip = match self.settings.overlap {
            OverlapPolicy::FirstWriteWins => {
                let mut claimed = self
                    .claimed
                    .lock()
                    .map_err(|_| Error::General("destination key set poisoned".into()))?;
                (!claimed.insert(destination.to_string())).then_some(SkipReason::Overlap)
            }
            OverlapPolicy::LastWriteWins => None,
        };

        Ok(Planned {
            unit: CopyUnit {
                source,
                entry,
                destination,
            },
            skip,
        })
    }

    async fn run(&self, planned: Planned) -> Transfer {
        let Planned { unit, skip } = planned;
        let outcome = match skip {
            Some(reason) => Outcome::Skipped { reason },
            None if self.settings.dry_run => Outcome::Skipped {
                reason: SkipReason::DryRun,
            },
            None => self.execute(&unit).await,
        };
        Transfer { unit, outcome }
    }

    async fn execute(&self, unit: &CopyUnit) -> Outcome {
        let target = unit.destination.to_string();
        let clients = async {
            let src = self.factory.client(&unit.source).await?;
            let dst = self.factory.client(&unit.destination).await?;
            Ok::<_, Error>((src, dst))
        };
        let (src, dst) = match clients.await {
            Ok(clients) => clients,
            Err(error) => {
                return Outcome::Failed {
                    error: error.transfer_failed(target),
                };
            }
        };

        if self.settings.mirror
            && let Ok(existing) = dst.stat().await
            && self.settings.compare.equal(&unit.entry, &existing)
        {
            return Outcome::Skipped {
                reason: SkipReason::UpToDate,
            };
        }

        let mut attempt = 0;
        loop {
            match transfer_once(src.as_ref(), dst.as_ref()).await {
                Ok(bytes) => return Outcome::Copied { bytes },
                Err(error) if error.is_retryable() && attempt < self.settings.retries => {
                    attempt += 1;
                    warn!(%target, attempt, error = %error, "Transfer failed, retrying");
                    tokio::time::sleep(self.settings.retry_backoff * attempt).await;
                }
                Err(error) => {
                    warn!(%target, error = %error, "Transfer failed");
                    return Outcome::Failed {
                        error: error.transfer_failed(target),
                    };
                }
            }
        }
    }
}

async fn transfer_once(src: &dyn Client, dst: &dyn Client) -> Result<u64> {
    let reader = src.get().await?;
    let size = reader.size;
    dst.put(reader.body, size).await?;
    Ok(size)
}

/// Totals for a finished run
#[derive(Debug, Default, Clone, Serialize)]
pub struct CopyReport {
    pub copied: u64,
    pub skipped: u64,
    pub failed: u64,
    pub listing_errors: u64,
    pub bytes: u64,
}

impl CopyReport {
    pub fn record(&mut self, item: &Result<Transfer>) {
        match item {
            Ok(transfer) => match &transfer.outcome {
                Outcome::Copied { bytes } => {
                    self.copied += 1;
                    self.bytes += bytes;
                }
                Outcome::Skipped { .. } => self.skipped += 1,
                Outcome::Failed { .. } => self.failed += 1,
            },
            Err(_) => self.listing_errors += 1,
        }
    }

    /// Whether the run finished without any failure
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.listing_errors == 0
    }

    /// Drain a copy stream into totals
    pub async fn collect(mut stream: BoxStream<'_, Result<Transfer>>) -> Self {
        let mut report = Self::default();
        while let Some(item) = stream.next().await {
            report.record(&item);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{FsClient, LocalFactory};
    use crate::traits::{ByteReader, EntryStream, MockClientFactory, ObjectReader};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    /// Filesystem client whose writes fail on demand
    struct FaultyClient {
        inner: FsClient,
        fail: Option<fn() -> Error>,
        remaining_failures: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Client for FaultyClient {
        fn url(&self) -> &ClientUrl {
            self.inner.url()
        }

        async fn stat(&self) -> Result<Entry> {
            self.inner.stat().await
        }

        fn list(&self, recursive: bool) -> EntryStream<'_> {
            self.inner.list(recursive)
        }

        async fn get(&self) -> Result<ObjectReader> {
            self.inner.get().await
        }

        async fn get_partial(&self, offset: i64, length: i64) -> Result<ByteReader> {
            self.inner.get_partial(offset, length).await
        }

        async fn put(&self, body: ByteReader, size: u64) -> Result<()> {
            if let Some(fail) = self.fail {
                let previous = self
                    .remaining_failures
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
                if previous.is_ok() {
                    return Err(fail());
                }
            }
            self.inner.put(body, size).await
        }

        async fn put_container(&self, name: &str) -> Result<()> {
            self.inner.put_container(name).await
        }

        async fn share_download(&self, expiry: Duration) -> Result<String> {
            self.inner.share_download(expiry).await
        }

        async fn share_upload(
            &self,
            recursive: bool,
            expiry: Duration,
            content_type: Option<&str>,
        ) -> Result<BTreeMap<String, String>> {
            self.inner.share_upload(recursive, expiry, content_type).await
        }
    }

    /// Factory that injects failures into writes to one file name
    struct FaultyFactory {
        poisoned: &'static str,
        fail: fn() -> Error,
        failures: Arc<AtomicU32>,
    }

    #[async_trait]
    impl ClientFactory for FaultyFactory {
        async fn client(&self, url: &ClientUrl) -> Result<Arc<dyn Client>> {
            let fail = (url.base_name() == self.poisoned).then_some(self.fail);
            Ok(Arc::new(FaultyClient {
                inner: FsClient::new(url.clone())?,
                fail,
                remaining_failures: self.failures.clone(),
            }))
        }
    }

    fn settings() -> CopySettings {
        CopySettings {
            concurrency: 1,
            retry_backoff: Duration::ZERO,
            ..CopySettings::default()
        }
    }

    fn tree(root: &Path, files: &[(&str, &str)]) {
        for (name, content) in files {
            let path = root.join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
    }

    fn recursive(path: &Path) -> String {
        format!("{}/...", path.display())
    }

    fn container(path: &Path) -> String {
        format!("{}/", path.display())
    }

    async fn run(
        factory: Arc<dyn ClientFactory>,
        sources: &[String],
        target: &str,
        settings: CopySettings,
    ) -> (Vec<Result<Transfer>>, CopyReport) {
        let items: Vec<_> = copy(factory, sources, target, settings)
            .unwrap()
            .collect()
            .await;
        let mut report = CopyReport::default();
        for item in &items {
            report.record(item);
        }
        (items, report)
    }

    #[tokio::test]
    async fn test_invalid_combination_never_creates_clients() {
        let mut factory = MockClientFactory::new();
        factory.expect_client().times(0);
        let factory: Arc<dyn ClientFactory> = Arc::new(factory);

        let none: [&str; 0] = [];
        assert!(matches!(
            copy(factory.clone(), &none, "u/bucket", settings()),
            Err(Error::InvalidCopyCombination(_))
        ));
        assert!(matches!(
            copy(factory.clone(), &["u/bucket/a..."], "", settings()),
            Err(Error::InvalidCopyCombination(_))
        ));
        assert!(matches!(
            copy(factory, &["u/bucket/a...", "u/bucket/b"], "u/bucket/t", settings()),
            Err(Error::InvalidCopyCombination(_))
        ));
    }

    #[test]
    fn test_destination_by_type() {
        let target = ClientUrl::parse("u/dst/out/").unwrap();
        let source = ClientUrl::parse("u/src/photos/...").unwrap();
        let entry = Entry::file("2024/a.jpg", 1);

        let dest = destination(Classification::TypeC, &source, &entry, &target).unwrap();
        assert_eq!(dest.to_string(), "u/dst/out/2024/a.jpg");

        let source = ClientUrl::parse("u/src/photos/a.jpg").unwrap();
        let entry = Entry::file("a.jpg", 1);
        let dest = destination(Classification::TypeB, &source, &entry, &target).unwrap();
        assert_eq!(dest.to_string(), "u/dst/out/a.jpg");

        let target = ClientUrl::parse("u/dst/renamed.jpg").unwrap();
        let dest = destination(Classification::TypeA, &source, &entry, &target).unwrap();
        assert_eq!(dest.to_string(), "u/dst/renamed.jpg");

        assert!(destination(Classification::Invalid, &source, &entry, &target).is_err());
    }

    #[tokio::test]
    async fn test_type_a_and_b_copy() {
        let temp = TempDir::new().unwrap();
        tree(temp.path(), &[("src/file.txt", "hello")]);
        let source = temp.path().join("src/file.txt").display().to_string();

        let target = temp.path().join("renamed.txt").display().to_string();
        let (_, report) = run(Arc::new(LocalFactory), &[source.clone()], &target, settings()).await;
        assert_eq!(report.copied, 1);
        assert_eq!(std::fs::read(temp.path().join("renamed.txt")).unwrap(), b"hello");

        let target = container(&temp.path().join("out"));
        let (_, report) = run(Arc::new(LocalFactory), &[source], &target, settings()).await;
        assert_eq!(report.copied, 1);
        assert_eq!(report.bytes, 5);
        assert_eq!(
            std::fs::read(temp.path().join("out/file.txt")).unwrap(),
            b"hello"
        );
    }

    #[tokio::test]
    async fn test_non_recursive_directory_source_is_rejected() {
        let temp = TempDir::new().unwrap();
        tree(temp.path(), &[("src/a", "1")]);
        let source = temp.path().join("src").display().to_string();
        let target = container(&temp.path().join("out"));

        let (items, report) = run(Arc::new(LocalFactory), &[source], &target, settings()).await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(Error::IsDirectory(_))));
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_type_c_preserves_structure() {
        let temp = TempDir::new().unwrap();
        tree(
            temp.path(),
            &[("src/a.txt", "a"), ("src/sub/b.txt", "bb"), ("src/sub/deep/c", "ccc")],
        );
        let target = temp.path().join("dst").display().to_string();

        let (_, report) = run(
            Arc::new(LocalFactory),
            &[recursive(&temp.path().join("src"))],
            &target,
            settings(),
        )
        .await;
        assert_eq!(report.copied, 3);
        assert_eq!(report.bytes, 6);
        assert_eq!(std::fs::read(temp.path().join("dst/sub/deep/c")).unwrap(), b"ccc");
    }

    #[tokio::test]
    async fn test_partial_failure_continues() {
        let temp = TempDir::new().unwrap();
        tree(temp.path(), &[("src/a", "1"), ("src/b", "2"), ("src/c", "3")]);
        let factory = Arc::new(FaultyFactory {
            poisoned: "b",
            fail: || Error::PermissionDenied("injected".into()),
            failures: Arc::new(AtomicU32::new(u32::MAX)),
        });

        let (items, report) = run(
            factory,
            &[recursive(&temp.path().join("src"))],
            &container(&temp.path().join("dst")),
            settings(),
        )
        .await;

        assert_eq!(report.copied, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.listing_errors, 0);
        let failed: Vec<_> = items
            .iter()
            .filter_map(|i| match i {
                Ok(Transfer {
                    unit,
                    outcome: Outcome::Failed { error },
                }) => Some((unit.entry.name.clone(), error)),
                _ => None,
            })
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "b");
        assert!(matches!(failed[0].1, Error::TransferFailed { .. }));
        assert!(temp.path().join("dst/c").exists());
        assert!(!temp.path().join("dst/b").exists());
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let temp = TempDir::new().unwrap();
        tree(temp.path(), &[("src/a", "1"), ("src/b", "2")]);
        let failures = Arc::new(AtomicU32::new(2));
        let factory = Arc::new(FaultyFactory {
            poisoned: "b",
            fail: || Error::Network("connection reset".into()),
            failures: failures.clone(),
        });

        let (_, report) = run(
            factory,
            &[recursive(&temp.path().join("src"))],
            &container(&temp.path().join("dst")),
            settings(),
        )
        .await;
        assert_eq!(report.copied, 2);
        assert_eq!(failures.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let temp = TempDir::new().unwrap();
        tree(temp.path(), &[("src/b", "2")]);
        let failures = Arc::new(AtomicU32::new(10));
        let factory = Arc::new(FaultyFactory {
            poisoned: "b",
            fail: || Error::Network("down".into()),
            failures: failures.clone(),
        });

        let (_, report) = run(
            factory,
            &[recursive(&temp.path().join("src"))],
            &container(&temp.path().join("dst")),
            CopySettings {
                retries: 2,
                ..settings()
            },
        )
        .await;
        assert_eq!(report.failed, 1);
        // One attempt plus two retries.
        assert_eq!(failures.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn test_missing_source_does_not_stop_other_sources() {
        let temp = TempDir::new().unwrap();
        tree(temp.path(), &[("two/x", "x")]);
        let sources = [
            recursive(&temp.path().join("one")),
            recursive(&temp.path().join("two")),
        ];

        let (items, report) = run(
            Arc::new(LocalFactory),
            &sources,
            &container(&temp.path().join("dst")),
            settings(),
        )
        .await;
        assert_eq!(report.listing_errors, 1);
        assert_eq!(report.copied, 1);
        assert!(matches!(items[0], Err(Error::NotFound(_))));
        assert!(temp.path().join("dst/x").exists());
    }

    #[tokio::test]
    async fn test_overlap_policies() {
        let temp = TempDir::new().unwrap();
        tree(
            temp.path(),
            &[("one/same.txt", "first"), ("one/only1", "1"), ("two/same.txt", "second")],
        );
        let sources = [
            recursive(&temp.path().join("one")),
            recursive(&temp.path().join("two")),
        ];

        let last = container(&temp.path().join("last"));
        let (_, report) = run(Arc::new(LocalFactory), &sources, &last, settings()).await;
        assert_eq!(report.copied, 3);
        assert_eq!(
            std::fs::read_to_string(temp.path().join("last/same.txt")).unwrap(),
            "second"
        );

        let first = container(&temp.path().join("first"));
        let (items, report) = run(
            Arc::new(LocalFactory),
            &sources,
            &first,
            CopySettings {
                overlap: OverlapPolicy::FirstWriteWins,
                ..settings()
            },
        )
        .await;
        assert_eq!(report.copied, 2);
        assert_eq!(report.skipped, 1);
        assert!(items.iter().any(|i| matches!(
            i,
            Ok(Transfer {
                outcome: Outcome::Skipped {
                    reason: SkipReason::Overlap
                },
                ..
            })
        )));
        assert_eq!(
            std::fs::read_to_string(temp.path().join("first/same.txt")).unwrap(),
            "first"
        );
    }

    #[tokio::test]
    async fn test_mirror_skips_up_to_date() {
        let temp = TempDir::new().unwrap();
        tree(temp.path(), &[("src/a", "1"), ("src/b", "22")]);
        let sources = [recursive(&temp.path().join("src"))];
        let target = container(&temp.path().join("dst"));
        let mirror = CopySettings {
            mirror: true,
            ..settings()
        };

        let (_, report) = run(Arc::new(LocalFactory), &sources, &target, mirror.clone()).await;
        assert_eq!(report.copied, 2);

        let (_, report) = run(Arc::new(LocalFactory), &sources, &target, mirror.clone()).await;
        assert_eq!(report.copied, 0);
        assert_eq!(report.skipped, 2);

        std::fs::write(temp.path().join("src/b"), "changed").unwrap();
        let (_, report) = run(Arc::new(LocalFactory), &sources, &target, mirror).await;
        assert_eq!(report.copied, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(
            std::fs::read_to_string(temp.path().join("dst/b")).unwrap(),
            "changed"
        );
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let temp = TempDir::new().unwrap();
        tree(temp.path(), &[("src/a", "1")]);
        let (_, report) = run(
            Arc::new(LocalFactory),
            &[recursive(&temp.path().join("src"))],
            &container(&temp.path().join("dst")),
            CopySettings {
                dry_run: true,
                ..settings()
            },
        )
        .await;
        assert_eq!(report.skipped, 1);
        assert!(!temp.path().join("dst").exists());
    }

    #[test]
    fn test_settings_from_defaults() {
        let defaults = TransferDefaults {
            concurrency: 0,
            overlap: OverlapPolicy::FirstWriteWins,
            ..TransferDefaults::default()
        };
        let settings = CopySettings::from_defaults(&defaults);
        assert_eq!(settings.concurrency, 1);
        assert_eq!(settings.retries, 3);
        assert_eq!(settings.overlap, OverlapPolicy::FirstWriteWins);
        assert!(!settings.mirror);
    }
}
