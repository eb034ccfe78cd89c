//! Share-upload issuance and history
//!
//! Every upload form handed out is appended to a JSON history file at
//! `~/.config/ferry/share/uploads.json`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::config_dir;
use crate::error::{Error, Result};
use crate::traits::{Client, validate_expiry};
use crate::url::RECURSIVE_MARKER;

/// Placeholder the uploader replaces with the file name
pub const FILE_PLACEHOLDER: &str = "<FILE>";

/// One issued upload form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRecord {
    /// When the form was issued
    pub date: jiff::Timestamp,
    #[serde(with = "seconds")]
    pub expiry: Duration,
    /// URL the form uploads to, with `...` for prefix uploads
    pub key: String,
    /// Form fields to post
    pub upload_info: BTreeMap<String, String>,
}

impl ShareRecord {
    /// When the form stops working
    pub fn expires_at(&self) -> Result<jiff::Timestamp> {
        let span = jiff::SignedDuration::try_from(self.expiry)
            .map_err(|e| Error::General(format!("invalid expiry: {e}")))?;
        self.date
            .checked_add(span)
            .map_err(|e| Error::General(format!("invalid expiry: {e}")))
    }
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ShareHistory {
    #[serde(default)]
    uploads: Vec<ShareRecord>,
}

/// JSON share-history file
#[derive(Debug, Clone)]
pub struct ShareStore {
    path: PathBuf,
}

impl ShareStore {
    /// Store in the default configuration directory
    pub fn new() -> Result<Self> {
        Ok(Self {
            path: config_dir()?.join("share").join("uploads.json"),
        })
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// All recorded uploads, oldest first
    pub fn load(&self) -> Result<Vec<ShareRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::from_io(e, self.path.display().to_string()))?;
        let history: ShareHistory = serde_json::from_str(&content)?;
        Ok(history.uploads)
    }

    pub fn append(&self, record: ShareRecord) -> Result<()> {
        let mut uploads = self.load()?;
        uploads.push(record);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&ShareHistory { uploads })?;
        std::fs::write(&self.path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

/// Issue an upload form for the client's URL and record it
///
/// Prefix uploads record the key with a trailing `...` and leave a
/// `<FILE>` placeholder at the end of the `key` form field.
pub async fn share_upload(
    client: &dyn Client,
    recursive: bool,
    expiry: Duration,
    content_type: Option<&str>,
    store: &ShareStore,
) -> Result<ShareRecord> {
    validate_expiry(expiry)?;
    let date = jiff::Timestamp::now();

    let mut upload_info = client.share_upload(recursive, expiry, content_type).await?;
    let mut key = client.url().to_string();
    if recursive {
        key.push_str(RECURSIVE_MARKER);
        if let Some(field) = upload_info.get_mut("key") {
            field.push_str(FILE_PLACEHOLDER);
        }
    }

    let record = ShareRecord {
        date,
        expiry,
        key,
        upload_info,
    };
    store.append(record.clone())?;
    debug!(key = %record.key, path = %store.path().display(), "Recorded share upload");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ByteReader, Entry, EntryStream, ObjectReader};
    use crate::url::ClientUrl;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Object-store stand-in returning fixed form fields
    struct FormClient {
        url: ClientUrl,
    }

    #[async_trait]
    impl Client for FormClient {
        fn url(&self) -> &ClientUrl {
            &self.url
        }

        async fn stat(&self) -> Result<Entry> {
            unimplemented!()
        }

        fn list(&self, _recursive: bool) -> EntryStream<'_> {
            unimplemented!()
        }

        async fn get(&self) -> Result<ObjectReader> {
            unimplemented!()
        }

        async fn get_partial(&self, _offset: i64, _length: i64) -> Result<ByteReader> {
            unimplemented!()
        }

        async fn put(&self, _body: ByteReader, _size: u64) -> Result<()> {
            unimplemented!()
        }

        async fn put_container(&self, _name: &str) -> Result<()> {
            unimplemented!()
        }

        async fn share_download(&self, _expiry: Duration) -> Result<String> {
            unimplemented!()
        }

        async fn share_upload(
            &self,
            _recursive: bool,
            _expiry: Duration,
            content_type: Option<&str>,
        ) -> Result<BTreeMap<String, String>> {
            let mut fields = BTreeMap::new();
            fields.insert("bucket".to_string(), self.url.bucket().unwrap_or_default().to_string());
            fields.insert("key".to_string(), self.url.key().unwrap_or_default().to_string());
            fields.insert("policy".to_string(), "cG9saWN5".to_string());
            if let Some(ct) = content_type {
                fields.insert("Content-Type".to_string(), ct.to_string());
            }
            Ok(fields)
        }
    }

    fn store(temp: &TempDir) -> ShareStore {
        ShareStore::with_path(temp.path().join("share").join("uploads.json"))
    }

    #[tokio::test]
    async fn test_single_object_share() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let client = FormClient {
            url: ClientUrl::parse("u/bucket/report.pdf").unwrap(),
        };

        let record = share_upload(&client, false, Duration::from_secs(3600), None, &store)
            .await
            .unwrap();
        assert_eq!(record.key, "u/bucket/report.pdf");
        assert_eq!(record.upload_info["key"], "report.pdf");
        assert_eq!(store.load().unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn test_recursive_share_rewrites_key() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let client = FormClient {
            url: ClientUrl::parse("u/bucket/incoming/...").unwrap(),
        };

        let record = share_upload(
            &client,
            true,
            Duration::from_secs(7200),
            Some("image/png"),
            &store,
        )
        .await
        .unwrap();
        assert_eq!(record.key, "u/bucket/incoming/...");
        assert_eq!(record.upload_info["key"], "incoming/<FILE>");
        assert_eq!(record.upload_info["Content-Type"], "image/png");
    }

    #[tokio::test]
    async fn test_history_appends() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let client = FormClient {
            url: ClientUrl::parse("u/bucket/a").unwrap(),
        };
        for _ in 0..3 {
            share_upload(&client, false, Duration::from_secs(60), None, &store)
                .await
                .unwrap();
        }
        assert_eq!(store.load().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_expiry_out_of_range_is_rejected() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let client = FormClient {
            url: ClientUrl::parse("u/bucket/a").unwrap(),
        };
        let result = share_upload(
            &client,
            false,
            Duration::from_secs(8 * 24 * 3600),
            None,
            &store,
        )
        .await;
        assert!(result.is_err());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_expires_at() {
        let record = ShareRecord {
            date: "2024-01-01T00:00:00Z".parse().unwrap(),
            expiry: Duration::from_secs(3600),
            key: "u/b/k".into(),
            upload_info: BTreeMap::new(),
        };
        assert_eq!(
            record.expires_at().unwrap().to_string(),
            "2024-01-01T01:00:00Z"
        );
    }
}
