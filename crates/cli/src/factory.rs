//! Client construction for command URLs
//!
//! Filesystem URLs get an `FsClient`. Object-store URLs are resolved to an
//! alias, by name for `alias/bucket/key` and by endpoint for
//! `http(s)://host/bucket/key`, and share one SDK client per alias.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use ferry_core::{
    Alias, AliasManager, BackendKind, Client, ClientFactory, ClientUrl, Error, FsClient, Result,
};
use ferry_s3::{MultipartConfig, S3Client};

/// Factory resolving URLs against the configured aliases
pub struct AliasFactory {
    aliases: AliasManager,
    multipart: MultipartConfig,
    connections: Mutex<HashMap<String, S3Client>>,
}

impl AliasFactory {
    pub fn new(aliases: AliasManager, multipart: MultipartConfig) -> Self {
        Self {
            aliases,
            multipart,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Alias serving an object-store URL
    pub fn resolve(&self, url: &ClientUrl) -> Result<Alias> {
        if let Some(name) = url.alias() {
            return self.aliases.get(name);
        }
        let endpoint = url
            .endpoint()
            .ok_or_else(|| Error::InvalidPath(format!("not an object-store URL: {url}")))?;
        self.aliases.find_by_endpoint(endpoint)?.ok_or_else(|| {
            Error::AliasNotFound(format!("no alias configured for endpoint {endpoint}"))
        })
    }

    async fn object_store(&self, url: &ClientUrl) -> Result<S3Client> {
        let alias = self.resolve(url)?;
        let mut connections = self.connections.lock().await;
        if let Some(existing) = connections.get(&alias.name) {
            return existing.with_url(url.clone());
        }

        debug!(alias = %alias.name, "Connecting");
        let name = alias.name.clone();
        let client = S3Client::new(alias, url.clone())
            .await?
            .with_multipart(self.multipart);
        connections.insert(name, client.clone());
        Ok(client)
    }
}

#[async_trait]
impl ClientFactory for AliasFactory {
    async fn client(&self, url: &ClientUrl) -> Result<Arc<dyn Client>> {
        match url.kind() {
            BackendKind::Filesystem => Ok(Arc::new(FsClient::new(url.clone())?)),
            BackendKind::ObjectStore => Ok(Arc::new(self.object_store(url).await?)),
        }
    }
}
