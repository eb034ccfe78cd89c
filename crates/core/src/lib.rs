//! ferry-core: Core library for the ferry storage client
//!
//! This crate provides:
//! - URL parsing with the `...` recursive marker
//! - The Client Contract every storage backend implements, plus the
//!   filesystem backend
//! - The Listing Engine, URL Classifier, Copy/Mirror Executor and Diff Engine
//! - Configuration, aliases and share-upload history
//!
//! Nothing here depends on a specific S3 SDK; the object-store backend lives
//! in `ferry-s3`.

pub mod alias;
pub mod classify;
pub mod compare;
pub mod config;
pub mod copy;
pub mod diff;
pub mod error;
pub mod fs;
pub mod listing;
pub mod share;
pub mod traits;
pub mod url;

pub use alias::{Alias, AliasManager};
pub use classify::{Classification, classify};
pub use compare::CompareSettings;
pub use config::{Config, ConfigManager, TransferDefaults};
pub use copy::{
    CopyReport, CopySettings, CopyUnit, Outcome, OverlapPolicy, SkipReason, Transfer, copy,
    destination,
};
pub use diff::{DiffEvent, DiffKind, DiffOptions, do_diff};
pub use error::{Error, Result};
pub use fs::{FsClient, LocalFactory};
pub use listing::{ContentMessage, SkipCategory, do_list};
pub use share::{ShareRecord, ShareStore, share_upload};
pub use traits::{
    ByteReader, Client, ClientFactory, Entry, EntryStream, EntryType, ListError, ObjectReader,
};
pub use url::{BackendKind, ClientUrl, ParsedPath, RECURSIVE_MARKER, RemotePath, parse_path};
