//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the `Client` trait from ferry-core for
//! one bucket/key URL. Clients for other URLs on the same alias share the
//! underlying SDK client through [`S3Client::with_url`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Output;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CompletedMultipartUpload, CompletedPart, CreateBucketConfiguration,
};
use tracing::{debug, warn};

use ferry_core::traits::{validate_expiry, validate_range};
use ferry_core::{
    Alias, ByteReader, Client, ClientUrl, Entry, EntryStream, Error, ListError, ObjectReader,
    Result,
};

use crate::multipart::{MultipartConfig, read_exact_part};
use crate::post_policy::{PostPolicy, SigningKey};

/// Region S3 creates buckets in when no location constraint is sent
const DEFAULT_REGION: &str = "us-east-1";

/// S3 client bound to one URL
#[derive(Clone)]
pub struct S3Client {
    inner: aws_sdk_s3::Client,
    alias: Arc<Alias>,
    multipart: MultipartConfig,
    url: ClientUrl,
    bucket: String,
    key: String,
}

impl S3Client {
    /// Create a new S3 client from an alias configuration
    pub async fn new(alias: Alias, url: ClientUrl) -> Result<Self> {
        let credentials = aws_credential_types::Credentials::new(
            alias.access_key.clone(),
            alias.secret_key.clone(),
            None,
            None,
            "ferry-static-credentials",
        );

        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_config::Region::new(alias.region.clone()))
            .endpoint_url(&alias.endpoint)
            .load()
            .await;

        // "auto" resolves to path-style, which every S3-compatible server accepts
        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(alias.bucket_lookup == "path" || alias.bucket_lookup == "auto")
            .build();

        debug!(alias = %alias.name, endpoint = %alias.endpoint, "Created S3 client");
        let (bucket, key) = split_url(&url)?;
        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            alias: Arc::new(alias),
            multipart: MultipartConfig::default(),
            url,
            bucket,
            key,
        })
    }

    /// Client for another URL on the same alias
    pub fn with_url(&self, url: ClientUrl) -> Result<Self> {
        let (bucket, key) = split_url(&url)?;
        Ok(Self {
            url,
            bucket,
            key,
            ..self.clone()
        })
    }

    pub fn with_multipart(mut self, multipart: MultipartConfig) -> Self {
        self.multipart = multipart;
        self
    }

    pub fn alias(&self) -> &Alias {
        &self.alias
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }

    fn target(&self) -> String {
        self.url.to_string()
    }

    /// Key naming a single object
    fn object_key(&self) -> Result<&str> {
        if self.key.is_empty() || self.key.ends_with('/') {
            return Err(Error::IsDirectory(self.target()));
        }
        Ok(&self.key)
    }

    async fn head(&self, key: &str) -> Result<Entry> {
        let response = self
            .inner
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &self.target()))?;

        let size = response.content_length().unwrap_or(0).max(0) as u64;
        Ok(Entry::file(self.url.base_name(), size)
            .with_modified(response.last_modified().and_then(to_timestamp))
            .with_checksum(response.e_tag().map(trim_etag)))
    }

    /// Whether any object lives under `prefix`
    async fn has_prefix(&self, prefix: &str) -> Result<bool> {
        let response = self
            .inner
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &self.target()))?;
        Ok(!response.contents().is_empty() || !response.common_prefixes().is_empty())
    }

    /// Where a listing of this URL starts
    async fn list_root(&self) -> Result<ListRoot> {
        if self.key.is_empty() {
            return Ok(ListRoot::Prefix(String::new()));
        }
        if self.key.ends_with('/') {
            return Ok(ListRoot::Prefix(self.key.clone()));
        }
        match self.head(&self.key).await {
            Ok(entry) => Ok(ListRoot::Object(entry)),
            Err(Error::NotFound(_)) => Ok(ListRoot::Prefix(format!("{}/", self.key))),
            Err(err) => Err(err),
        }
    }

    async fn put_single(&self, body: &mut ByteReader, size: u64, content_type: &str) -> Result<()> {
        let data = read_exact_part(body, size, &self.target()).await?;
        self.inner
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &self.target()))?;
        Ok(())
    }

    async fn put_multipart(
        &self,
        body: &mut ByteReader,
        size: u64,
        content_type: &str,
    ) -> Result<()> {
        let target = self.target();
        let upload = self
            .inner
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &target))?;
        let upload_id = upload
            .upload_id()
            .ok_or_else(|| Error::General(format!("no upload id returned for {target}")))?
            .to_string();

        let parts = match self.upload_parts(body, size, &upload_id).await {
            Ok(parts) => parts,
            Err(err) => {
                if let Err(abort) = self
                    .inner
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(&self.key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(
                        target = %target,
                        error = %DisplayErrorContext(&abort),
                        "Failed to abort multipart upload"
                    );
                }
                return Err(err);
            }
        };

        self.inner
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &target))?;
        Ok(())
    }

    async fn upload_parts(
        &self,
        body: &mut ByteReader,
        size: u64,
        upload_id: &str,
    ) -> Result<Vec<CompletedPart>> {
        let target = self.target();
        let plan = self.multipart.plan(size);
        let total = plan.len();
        let mut parts = Vec::with_capacity(total);

        for part in plan.parts() {
            let part_number = part.number;
            let data = read_exact_part(body, part.len, &target).await?;
            let response = self
                .inner
                .upload_part()
                .bucket(&self.bucket)
                .key(&self.key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(data))
                .send()
                .await
                .map_err(|e| map_sdk_error(e, &target))?;

            debug!(target = %target, part_number, total, "Uploaded part");
            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .set_e_tag(response.e_tag().map(str::to_string))
                    .build(),
            );
        }
        Ok(parts)
    }
}

enum ListRoot {
    Object(Entry),
    Prefix(String),
}

#[async_trait]
impl Client for S3Client {
    fn url(&self) -> &ClientUrl {
        &self.url
    }

    async fn stat(&self) -> Result<Entry> {
        let name = self.url.base_name();
        if self.key.is_empty() {
            self.inner
                .head_bucket()
                .bucket(&self.bucket)
                .send()
                .await
                .map_err(|e| map_sdk_error(e, &self.target()))?;
            return Ok(Entry::dir(name));
        }

        if !self.key.ends_with('/') {
            match self.head(&self.key).await {
                Ok(entry) => return Ok(entry),
                Err(Error::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }

        let prefix = format!("{}/", self.key.trim_end_matches('/'));
        if self.has_prefix(&prefix).await? {
            Ok(Entry::dir(name))
        } else {
            Err(Error::NotFound(self.target()))
        }
    }

    fn list(&self, recursive: bool) -> EntryStream<'_> {
        Box::pin(stream! {
            let prefix = match self.list_root().await {
                Ok(ListRoot::Object(entry)) => {
                    yield Ok(entry);
                    return;
                }
                Ok(ListRoot::Prefix(prefix)) => prefix,
                Err(err) => {
                    yield Err(ListError::from(err));
                    return;
                }
            };

            let mut token: Option<String> = None;
            loop {
                let mut request = self
                    .inner
                    .list_objects_v2()
                    .bucket(&self.bucket)
                    .prefix(&prefix)
                    .set_continuation_token(token.take());
                if !recursive {
                    request = request.delimiter("/");
                }

                let page = match request.send().await {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(ListError::from(map_sdk_error(e, &self.target())));
                        return;
                    }
                };

                for entry in page_entries(&prefix, &page, recursive) {
                    yield Ok(entry);
                }

                match page.next_continuation_token() {
                    Some(next) if page.is_truncated() == Some(true) => {
                        token = Some(next.to_string());
                    }
                    _ => break,
                }
            }
        })
    }

    async fn get(&self) -> Result<ObjectReader> {
        let key = self.object_key()?;
        let response = self
            .inner
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &self.target()))?;

        let size = response.content_length().unwrap_or(0).max(0) as u64;
        let checksum = response.e_tag().map(trim_etag);
        Ok(ObjectReader {
            body: Box::pin(response.body.into_async_read()),
            size,
            checksum,
        })
    }

    async fn get_partial(&self, offset: i64, length: i64) -> Result<ByteReader> {
        let key = self.object_key()?;
        let size = self.head(key).await?.size;
        validate_range(offset, length, size)?;
        if length == 0 {
            return Ok(Box::pin(tokio::io::empty()));
        }

        let response = self
            .inner
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .range(format!("bytes={}-{}", offset, offset + length - 1))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &self.target()))?;
        Ok(Box::pin(response.body.into_async_read()))
    }

    async fn put(&self, mut body: ByteReader, size: u64) -> Result<()> {
        let target = self.target();
        self.object_key().map_err(|e| e.transfer_failed(target.clone()))?;

        let content_type = mime_guess::from_path(&self.key)
            .first_or_octet_stream()
            .to_string();
        let result = if self.multipart.is_single_put(size) {
            self.put_single(&mut body, size, &content_type).await
        } else {
            self.put_multipart(&mut body, size, &content_type).await
        };
        result.map_err(|e| e.transfer_failed(target))
    }

    async fn put_container(&self, name: &str) -> Result<()> {
        if self.inner.head_bucket().bucket(name).send().await.is_ok() {
            return Ok(());
        }

        let mut request = self.inner.create_bucket().bucket(name);
        if self.alias.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(
                        self.alias.region.as_str(),
                    ))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => {
                debug!(bucket = name, "Created bucket");
                Ok(())
            }
            Err(err) => match err.code() {
                Some("BucketAlreadyOwnedByYou" | "BucketAlreadyExists") => Ok(()),
                _ => Err(Error::ContainerCreateFailed {
                    name: name.to_string(),
                    reason: DisplayErrorContext(&err).to_string(),
                }),
            },
        }
    }

    async fn share_download(&self, expiry: Duration) -> Result<String> {
        validate_expiry(expiry)?;
        let key = self.object_key()?;
        let config = PresigningConfig::expires_in(expiry)
            .map_err(|e| Error::InvalidPath(format!("invalid expiry: {e}")))?;

        let request = self
            .inner
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| map_sdk_error(e, &self.target()))?;
        Ok(request.uri().to_string())
    }

    async fn share_upload(
        &self,
        recursive: bool,
        expiry: Duration,
        content_type: Option<&str>,
    ) -> Result<BTreeMap<String, String>> {
        validate_expiry(expiry)?;
        let key = if recursive {
            upload_prefix(&self.key)
        } else {
            self.object_key()?.to_string()
        };

        let policy = PostPolicy {
            bucket: &self.bucket,
            key: &key,
            key_prefix: recursive,
            content_type,
            expiry,
        };
        policy.sign(
            SigningKey {
                access_key: &self.alias.access_key,
                secret_key: &self.alias.secret_key,
                region: &self.alias.region,
            },
            jiff::Timestamp::now(),
        )
    }
}

fn split_url(url: &ClientUrl) -> Result<(String, String)> {
    let remote = url
        .as_remote()
        .ok_or_else(|| Error::InvalidPath(format!("not an object-store URL: {url}")))?;
    if remote.bucket.is_empty() {
        return Err(Error::InvalidPath(format!("bucket name required: {url}")));
    }
    Ok((remote.bucket.clone(), remote.key.clone()))
}

/// Key prefix a recursive upload form accepts
fn upload_prefix(key: &str) -> String {
    if key.is_empty() || key.ends_with('/') {
        key.to_string()
    } else {
        format!("{key}/")
    }
}

/// Entries of one listing page, relative to `prefix`, in canonical order
///
/// Recursive pages carry no directories, so zero-byte folder markers are
/// dropped there.
fn page_entries(prefix: &str, page: &ListObjectsV2Output, recursive: bool) -> Vec<Entry> {
    let mut entries = Vec::new();

    for common in page.common_prefixes() {
        if let Some(name) = common.prefix().and_then(|p| p.strip_prefix(prefix))
            && !name.is_empty()
        {
            entries.push(Entry::dir(name));
        }
    }

    for object in page.contents() {
        let Some(name) = object.key().and_then(|k| k.strip_prefix(prefix)) else {
            continue;
        };
        if name.is_empty() || (recursive && name.ends_with('/')) {
            continue;
        }
        let size = object.size().unwrap_or(0).max(0) as u64;
        entries.push(
            Entry::file(name, size)
                .with_modified(object.last_modified().and_then(to_timestamp))
                .with_checksum(object.e_tag().map(trim_etag)),
        );
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries
}

fn to_timestamp(time: &aws_smithy_types::DateTime) -> Option<jiff::Timestamp> {
    jiff::Timestamp::new(time.secs(), time.subsec_nanos() as i32).ok()
}

fn trim_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

/// Translate an SDK failure into the ferry error taxonomy
fn map_sdk_error<E>(err: SdkError<E, HttpResponse>, target: &str) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    let code = err.code().map(str::to_string);
    match (code.as_deref(), status) {
        (Some("NoSuchKey" | "NoSuchBucket" | "NotFound"), _) | (_, Some(404)) => {
            Error::NotFound(target.to_string())
        }
        (Some("AccessDenied" | "Forbidden"), _) | (_, Some(403)) => {
            Error::PermissionDenied(target.to_string())
        }
        (Some("InvalidAccessKeyId" | "SignatureDoesNotMatch"), _) => {
            Error::Auth(DisplayErrorContext(&err).to_string())
        }
        _ => Error::Network(DisplayErrorContext(&err).to_string()),
    }
}
