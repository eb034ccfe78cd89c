//! Diff Engine
//!
//! Merge-joins two name-ordered listings in one pass and reports where they
//! diverge. Neither tree is materialized in memory.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use serde::Serialize;

use crate::compare::CompareSettings;
use crate::error::{Error, Result};
use crate::listing::do_list;
use crate::traits::{Client, ClientFactory, Entry};
use crate::url::ClientUrl;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffKind {
    OnlyOnLeft,
    OnlyOnRight,
    /// Same name, one side a file and the other a directory
    TypeMismatch,
    /// Same name and type, but the compare policy says they differ
    Differ,
    /// Only reported in verbose mode
    Same,
    /// Enumeration of one side failed; see `DiffEvent::error`
    Error,
}

#[derive(Debug)]
pub struct DiffEvent {
    pub left: ClientUrl,
    pub right: ClientUrl,
    pub kind: DiffKind,
    pub error: Option<Error>,
}

impl DiffEvent {
    fn failed(left: &ClientUrl, right: &ClientUrl, error: Error) -> Self {
        Self {
            left: left.clone(),
            right: right.clone(),
            kind: DiffKind::Error,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiffOptions {
    /// List both sides recursively even without the `...` marker
    pub recursive: bool,
    /// Also report entries that match
    pub verbose: bool,
    pub compare: CompareSettings,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            verbose: false,
            compare: CompareSettings::SIZE,
        }
    }
}

/// One side of the join
struct Side {
    url: ClientUrl,
    root: Entry,
}

impl Side {
    /// URL of a listed entry on this side
    fn locate(&self, name: &str) -> ClientUrl {
        if self.root.is_dir() {
            self.url.join(name)
        } else {
            self.url.non_recursive()
        }
    }
}

/// Diff two URLs
///
/// Each side is listed recursively when its own URL carries the recursive
/// marker or `options.recursive` is set. A root that cannot be stat-ed
/// produces a single error event and nothing else.
pub fn do_diff(
    factory: Arc<dyn ClientFactory>,
    left: ClientUrl,
    right: ClientUrl,
    options: DiffOptions,
) -> BoxStream<'static, DiffEvent> {
    Box::pin(async_stream::stream! {
        let (left_client, right_client) = match open(factory.as_ref(), &left, &right).await {
            Ok(clients) => clients,
            Err(error) => {
                yield DiffEvent::failed(&left, &right, error);
                return;
            }
        };
        let (left_root, right_root) = match stat_roots(left_client.as_ref(), right_client.as_ref()).await {
            Ok(roots) => roots,
            Err(error) => {
                yield DiffEvent::failed(&left, &right, error);
                return;
            }
        };
        let l_side = Side { url: left.clone(), root: left_root };
        let r_side = Side { url: right.clone(), root: right_root };

        if !l_side.root.is_dir() && !r_side.root.is_dir() {
            if let Some(kind) = classify_pair(&l_side.root, &r_side.root, &options) {
                yield DiffEvent {
                    left: left.non_recursive(),
                    right: right.non_recursive(),
                    kind,
                    error: None,
                };
            }
            return;
        }

        let mut left_entries = do_list(
            left_client.as_ref(),
            options.recursive || left.is_recursive(),
            false,
        );
        let mut right_entries = do_list(
            right_client.as_ref(),
            options.recursive || right.is_recursive(),
            false,
        );

        let mut left_head: Option<Entry> = None;
        let mut right_head: Option<Entry> = None;
        let mut left_done = false;
        let mut right_done = false;
        // Files held back until the other side passes `name/`
        let mut left_pending: Vec<Entry> = Vec::new();
        let mut right_pending: Vec<Entry> = Vec::new();
        // Children of a directory already reported as a type mismatch
        let mut left_skip: Option<String> = None;
        let mut right_skip: Option<String> = None;

        loop {
            while left_head.is_none() && !left_done {
                match left_entries.next().await {
                    Some(Ok(entry)) => {
                        if left_skip.as_deref().is_some_and(|dir| entry.name.starts_with(dir)) {
                            continue;
                        }
                        left_skip = None;
                        left_head = Some(entry);
                    }
                    Some(Err(error)) => {
                        left_done = true;
                        yield DiffEvent::failed(&left, &right, error);
                    }
                    None => left_done = true,
                }
            }
            while right_head.is_none() && !right_done {
                match right_entries.next().await {
                    Some(Ok(entry)) => {
                        if right_skip.as_deref().is_some_and(|dir| entry.name.starts_with(dir)) {
                            continue;
                        }
                        right_skip = None;
                        right_head = Some(entry);
                    }
                    Some(Err(error)) => {
                        right_done = true;
                        yield DiffEvent::failed(&left, &right, error);
                    }
                    None => right_done = true,
                }
            }

            for resolved in resolve_pending(&mut left_pending, &mut right_head, right_done, &mut right_skip) {
                let event = match resolved {
                    Resolved::Alone(file) => only(&l_side, &r_side, &file, DiffKind::OnlyOnLeft),
                    Resolved::Mismatch { file, dir } => DiffEvent {
                        left: l_side.locate(&file.name),
                        right: r_side.locate(&dir),
                        kind: DiffKind::TypeMismatch,
                        error: None,
                    },
                };
                yield event;
            }
            for resolved in resolve_pending(&mut right_pending, &mut left_head, left_done, &mut left_skip) {
                let event = match resolved {
                    Resolved::Alone(file) => only(&l_side, &r_side, &file, DiffKind::OnlyOnRight),
                    Resolved::Mismatch { file, dir } => DiffEvent {
                        left: l_side.locate(&dir),
                        right: r_side.locate(&file.name),
                        kind: DiffKind::TypeMismatch,
                        error: None,
                    },
                };
                yield event;
            }

            match (left_head.take(), right_head.take()) {
                (None, None) => {
                    if left_done && right_done && left_pending.is_empty() && right_pending.is_empty() {
                        break;
                    }
                }
                (Some(l), None) if right_done => {
                    yield only(&l_side, &r_side, &l, DiffKind::OnlyOnLeft);
                }
                (None, Some(r)) if left_done => {
                    yield only(&l_side, &r_side, &r, DiffKind::OnlyOnRight);
                }
                (Some(l), Some(r)) => {
                    if l.trimmed_name() == r.trimmed_name() {
                        if let Some(kind) = classify_pair(&l, &r, &options) {
                            yield DiffEvent {
                                left: l_side.locate(&l.name),
                                right: r_side.locate(&r.name),
                                kind,
                                error: None,
                            };
                        }
                    } else if l.name < r.name {
                        if awaits_directory(&l, &r) {
                            left_pending.push(l);
                        } else {
                            yield only(&l_side, &r_side, &l, DiffKind::OnlyOnLeft);
                        }
                        right_head = Some(r);
                    } else {
                        if awaits_directory(&r, &l) {
                            right_pending.push(r);
                        } else {
                            yield only(&l_side, &r_side, &r, DiffKind::OnlyOnRight);
                        }
                        left_head = Some(l);
                    }
                }
                // A head was consumed by a mismatch; refill it first
                (l, r) => {
                    left_head = l;
                    right_head = r;
                }
            }
        }
    })
}

/// Outcome for a held-back file
enum Resolved {
    Alone(Entry),
    Mismatch { file: Entry, dir: String },
}

/// Whether `other` may still be followed by a directory named like `file`
///
/// Listings sort `x/` after names such as `x.txt` or `x-1`, so a file `x`
/// and a directory `x/` on the other side are not always adjacent. In
/// recursive listings the directory only shows up through its children.
fn awaits_directory(file: &Entry, other: &Entry) -> bool {
    if file.is_dir() {
        return false;
    }
    let dir = format!("{}/", file.name);
    other.name < dir || other.name.starts_with(&dir)
}

/// Settle held-back files against the other side's head
///
/// Pending files nest as prefixes of each other, so the innermost is the
/// last pushed and the first settled. A matching directory head is
/// consumed, and its children are skipped through `other_skip`.
fn resolve_pending(
    pending: &mut Vec<Entry>,
    other: &mut Option<Entry>,
    other_done: bool,
    other_skip: &mut Option<String>,
) -> Vec<Resolved> {
    let mut resolved = Vec::new();
    while let Some(dir) = pending.last().map(|file| format!("{}/", file.name)) {
        let outcome = match other.as_ref() {
            None if other_done => None,
            None => break,
            Some(head) if head.name.starts_with(&dir) => Some(dir),
            Some(head) if head.name > dir => None,
            Some(_) => break,
        };
        let Some(file) = pending.pop() else {
            break;
        };
        match outcome {
            Some(dir) => {
                *other = None;
                *other_skip = Some(dir.clone());
                resolved.push(Resolved::Mismatch { file, dir });
            }
            None => resolved.push(Resolved::Alone(file)),
        }
    }
    resolved
}

async fn open(
    factory: &dyn ClientFactory,
    left: &ClientUrl,
    right: &ClientUrl,
) -> Result<(Arc<dyn Client>, Arc<dyn Client>)> {
    Ok((factory.client(left).await?, factory.client(right).await?))
}

async fn stat_roots(left: &dyn Client, right: &dyn Client) -> Result<(Entry, Entry)> {
    Ok((left.stat().await?, right.stat().await?))
}

/// Event kind for two entries with the same name, if any
fn classify_pair(left: &Entry, right: &Entry, options: &DiffOptions) -> Option<DiffKind> {
    let kind = if left.entry_type != right.entry_type {
        DiffKind::TypeMismatch
    } else if left.is_dir() || options.compare.equal(left, right) {
        DiffKind::Same
    } else {
        DiffKind::Differ
    };
    (kind != DiffKind::Same || options.verbose).then_some(kind)
}

fn only(left: &Side, right: &Side, entry: &Entry, kind: DiffKind) -> DiffEvent {
    DiffEvent {
        left: left.locate(&entry.name),
        right: right.locate(&entry.name),
        kind,
        error: None,
    }
}
