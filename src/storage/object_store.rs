// Copyright 2025 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.
//
// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

//! Shared implementation of the storage contract on top of `object_store`.
//!
//! Container and bucket backends differ only in how a store for one container is
//! built and how objects are addressed; everything else (batching, not-found
//! handling, ownership checks, signing, blocking vs non-blocking execution) lives here.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration as ChronoDuration, Utc};
use futures::future::{join_all, try_join_all};
use object_store::aws::AmazonS3;
use object_store::azure::MicrosoftAzure;
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{ClientOptions, ObjectStore, ObjectStoreExt, PutPayload, RetryConfig};
use once_cell::sync::OnceCell;
use reqwest::Method;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, error, info, warn};
use url::Url;

use super::batch::{generate_name, UploadRequest};
use super::config::CloudConfig;
use super::error::{StorageError, StorageResult};
use super::provider::{
    CloudStorage, Downloaded, FastCloud, LinkOptions, OneOrMany, TemporaryLink,
};
use crate::media::MediaFile;

/// Anything that can presign a URL for one container.
#[derive(Clone)]
pub(crate) enum ContainerSigner {
    Azure(Arc<MicrosoftAzure>),
    S3(Arc<AmazonS3>),
}

impl ContainerSigner {
    async fn signed_put_url(&self, path: &ObjectPath, expires_in: Duration) -> StorageResult<Url> {
        let url = match self {
            ContainerSigner::Azure(store) => store.signed_url(Method::PUT, path, expires_in).await?,
            ContainerSigner::S3(store) => store.signed_url(Method::PUT, path, expires_in).await?,
        };
        Ok(url)
    }
}

/// A store bound to one container, plus a signer when the credential can sign.
#[derive(Clone)]
pub(crate) struct ContainerStore {
    pub store: Arc<dyn ObjectStore>,
    pub signer: Option<ContainerSigner>,
}

/// Builds the store for a container on first use.
pub(crate) trait ContainerStoreBuilder: Send + Sync {
    fn build(&self, container: &str) -> StorageResult<ContainerStore>;
}

/// The account URL every object URL of a provider starts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServiceRoot {
    url: Url,
}

impl ServiceRoot {
    pub(crate) fn parse(root: &str) -> StorageResult<Self> {
        let url = Url::parse(root.trim_end_matches('/'))?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(StorageError::ConfigError(format!(
                "Service URL must be an http(s) URL: {}",
                root
            )));
        }
        Ok(Self { url })
    }

    /// The root without a trailing slash.
    pub(crate) fn as_str(&self) -> &str {
        self.url.as_str().trim_end_matches('/')
    }

    pub(crate) fn owns(&self, url: &str) -> bool {
        url.starts_with(&format!("{}/", self.as_str()))
    }

    /// `{root}/{container}/{key}`, percent-encoded per segment.
    pub(crate) fn object_url(&self, container: &str, key: &str) -> StorageResult<String> {
        let mut url = self.url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                StorageError::InvalidUrl(format!("Cannot append to {}", self.as_str()))
            })?;
            segments.pop_if_empty().push(container);
            for part in key.split('/') {
                segments.push(part);
            }
        }
        Ok(url.to_string())
    }

    /// Split an object URL into container and object key.
    ///
    /// For URLs under this root the root's own path is skipped first; the next
    /// segment is the container and the remainder the key.
    pub(crate) fn parse_object_url(&self, url: &str) -> StorageResult<(String, ObjectPath)> {
        let parsed =
            Url::parse(url).map_err(|e| StorageError::InvalidUrl(format!("{}: {}", url, e)))?;
        let skip = if self.owns(url) {
            self.url
                .path_segments()
                .map(|segments| segments.filter(|s| !s.is_empty()).count())
                .unwrap_or(0)
        } else {
            0
        };

        let mut segments = parsed
            .path_segments()
            .ok_or_else(|| StorageError::InvalidUrl(format!("URL has no path: {}", url)))?
            .skip(skip);

        let container = segments
            .next()
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| StorageError::InvalidUrl(format!("URL has no container: {}", url)))?;
        let key = segments.collect::<Vec<_>>().join("/");
        if key.trim_matches('/').is_empty() {
            return Err(StorageError::InvalidUrl(format!(
                "URL has no object name: {}",
                url
            )));
        }

        let container = ObjectPath::from_url_path(container)?.to_string();
        Ok((container, ObjectPath::from_url_path(&key)?))
    }
}

/// Client for one execution mode, caching one store per container.
pub(crate) struct ObjectStoreClient {
    root: ServiceRoot,
    builder: Arc<dyn ContainerStoreBuilder>,
    stores: Mutex<HashMap<String, ContainerStore>>,
}

impl ObjectStoreClient {
    fn new(root: ServiceRoot, builder: Arc<dyn ContainerStoreBuilder>) -> Self {
        Self {
            root,
            builder,
            stores: Mutex::new(HashMap::new()),
        }
    }

    fn container(&self, container: &str) -> StorageResult<ContainerStore> {
        let mut stores = self.stores.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(store) = stores.get(container) {
            return Ok(store.clone());
        }

        debug!("Creating store for container={}", container);
        let store = self.builder.build(container)?;
        stores.insert(container.to_string(), store.clone());
        Ok(store)
    }

    /// Write `content` to `container/key`, overwriting, and return the object URL.
    async fn put(&self, container: &str, key: &str, content: Bytes) -> StorageResult<String> {
        let path = ObjectPath::parse(key)?;
        if path.as_ref().is_empty() {
            return Err(StorageError::ConfigError(format!(
                "Invalid object name '{}'",
                key
            )));
        }
        let store = self.container(container)?;
        let size = content.len();
        store.store.put(&path, PutPayload::from(content)).await?;

        // URL follows the normalized key, not the raw name.
        let url = self.root.object_url(container, path.as_ref())?;
        debug!("Uploaded size={} bytes to url={}", size, url);
        Ok(url)
    }

    /// Read an object; `None` if it does not exist.
    async fn get(&self, container: &str, path: &ObjectPath) -> StorageResult<Option<Bytes>> {
        let store = self.container(container)?;
        match store.store.get(path).await {
            Ok(result) => Ok(Some(result.bytes().await?)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete an object; `false` if it does not exist.
    ///
    /// Existence is checked first because some backends acknowledge deletes of missing keys.
    async fn delete(&self, container: &str, path: &ObjectPath) -> StorageResult<bool> {
        let store = self.container(container)?;
        match store.store.head(path).await {
            Ok(_) => {}
            Err(object_store::Error::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        store.store.delete(path).await?;
        Ok(true)
    }

    async fn signed_put_url(
        &self,
        container: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<Url> {
        let store = self.container(container)?;
        let signer = store.signer.ok_or_else(|| {
            StorageError::ConfigError(
                "The configured credential cannot sign upload links".to_string(),
            )
        })?;
        signer
            .signed_put_url(&ObjectPath::parse(key)?, expires_in)
            .await
    }
}

/// The blocking handle: its own client driven by a private runtime.
struct BlockingClient {
    runtime: Option<Runtime>,
    client: ObjectStoreClient,
}

impl BlockingClient {
    fn block_on<T>(&self, future: impl Future<Output = StorageResult<T>>) -> StorageResult<T> {
        match self.runtime.as_ref() {
            Some(runtime) => runtime.block_on(future),
            None => Err(StorageError::RuntimeError(
                "Blocking runtime has been shut down".to_string(),
            )),
        }
    }
}

impl Drop for BlockingClient {
    // The owner may be dropped inside an async context, where a blocking shutdown panics.
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Where a delete request points.
enum DeleteTarget {
    Object(String, ObjectPath),
    Unparseable(String, StorageError),
}

/// Generic container/bucket storage
///
/// Adapters wrap this type and only supply the service root, an optional default
/// container and a [`ContainerStoreBuilder`].
pub struct ObjectStorage {
    name: &'static str,
    root: ServiceRoot,
    default_container: Option<String>,
    builder: Arc<dyn ContainerStoreBuilder>,
    client: OnceCell<Arc<ObjectStoreClient>>,
    blocking: OnceCell<Arc<BlockingClient>>,
}

impl ObjectStorage {
    pub(crate) fn new(
        name: &'static str,
        root: ServiceRoot,
        default_container: Option<String>,
        builder: Arc<dyn ContainerStoreBuilder>,
    ) -> Self {
        Self {
            name,
            root,
            default_container,
            builder,
            client: OnceCell::new(),
            blocking: OnceCell::new(),
        }
    }

    /// The account URL, e.g. `https://account.blob.core.windows.net`.
    pub fn url(&self) -> &str {
        self.root.as_str()
    }

    pub fn default_container(&self) -> Option<&str> {
        self.default_container.as_deref()
    }

    /// Public URL of an object in this account.
    pub fn object_url(&self, container: &str, name: &str) -> StorageResult<String> {
        self.root.object_url(container, name)
    }

    /// Whether the non-blocking and blocking handles have been created yet.
    pub fn clients_initialized(&self) -> (bool, bool) {
        (
            self.client.get().is_some(),
            self.blocking.get().is_some(),
        )
    }

    fn async_client(&self) -> StorageResult<Arc<ObjectStoreClient>> {
        self.client
            .get_or_try_init(|| {
                info!("Initializing {} client", self.name);
                Ok(Arc::new(ObjectStoreClient::new(
                    self.root.clone(),
                    Arc::clone(&self.builder),
                )))
            })
            .cloned()
    }

    fn blocking_client(&self) -> StorageResult<Arc<BlockingClient>> {
        self.blocking
            .get_or_try_init(|| {
                info!("Initializing blocking {} client", self.name);
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| {
                        StorageError::RuntimeError(format!(
                            "Failed to start blocking runtime: {}",
                            e
                        ))
                    })?;
                Ok(Arc::new(BlockingClient {
                    runtime: Some(runtime),
                    client: ObjectStoreClient::new(self.root.clone(), Arc::clone(&self.builder)),
                }))
            })
            .cloned()
    }

    fn resolve_container(&self, requested: Option<&str>) -> StorageResult<String> {
        requested
            .filter(|c| !c.trim().is_empty())
            .or(self.default_container.as_deref())
            .map(|c| c.to_string())
            .ok_or_else(|| {
                StorageError::ConfigError(format!(
                    "A container must be provided for {} upload",
                    self.name
                ))
            })
    }

    /// Check ownership of every URL before anything is deleted.
    fn delete_targets(&self, urls: Vec<String>) -> StorageResult<Vec<DeleteTarget>> {
        urls.into_iter()
            .map(|url| {
                if !self.root.owns(&url) {
                    return Err(StorageError::ForeignUrl(url));
                }
                Ok(match self.root.parse_object_url(&url) {
                    Ok((container, path)) => DeleteTarget::Object(container, path),
                    Err(e) => DeleteTarget::Unparseable(url, e),
                })
            })
            .collect()
    }

    async fn delete_one(client: &ObjectStoreClient, target: DeleteTarget) -> bool {
        let (container, path) = match target {
            DeleteTarget::Object(container, path) => (container, path),
            DeleteTarget::Unparseable(url, e) => {
                error!("Cannot delete url={}: {}", url, e);
                return false;
            }
        };

        match client.delete(&container, &path).await {
            Ok(true) => {
                info!("Deleted file={}/{}", container, path);
                true
            }
            Ok(false) => {
                warn!("The file {}/{} was not found", container, path);
                false
            }
            Err(e) => {
                error!("Failed to delete file={}/{}: {}", container, path, e);
                false
            }
        }
    }

    fn to_download(
        path: &ObjectPath,
        content: Bytes,
    ) -> MediaFile {
        let file = MediaFile::from_bytes(content);
        match path.filename() {
            Some(name) => file.with_file_name(name),
            None => file,
        }
    }

    fn link_target(options: &LinkOptions) -> (String, Duration, chrono::DateTime<Utc>) {
        let name = options.name.clone().unwrap_or_else(generate_name);
        let minutes = u64::from(options.time_limit_minutes);
        let expiry = Utc::now() + ChronoDuration::minutes(i64::from(options.time_limit_minutes));
        (name, Duration::from_secs(minutes * 60), expiry)
    }

    fn finish_link(
        &self,
        result: StorageResult<Url>,
        expiry: chrono::DateTime<Utc>,
    ) -> Option<TemporaryLink> {
        match result {
            Ok(url) => Some(TemporaryLink {
                url: url.to_string(),
                expiry,
            }),
            Err(e) => {
                error!(
                    "An error occurred while generating a {} upload link: {}",
                    self.name, e
                );
                None
            }
        }
    }
}

#[async_trait]
impl FastCloud for ObjectStorage {
    fn provider_name(&self) -> &'static str {
        self.name
    }

    fn upload(&self, request: UploadRequest) -> StorageResult<OneOrMany<String>> {
        let container = self.resolve_container(request.container())?;
        let handle = self.blocking_client()?;
        let batch = request.normalize();

        let mut urls = Vec::with_capacity(batch.len());
        for (file, name) in batch.items {
            let url = handle.block_on(handle.client.put(&container, &name, file.to_bytes()))?;
            urls.push(url);
        }

        info!(
            "Uploaded count={} files to container={}",
            urls.len(),
            container
        );
        Ok(OneOrMany::collapse(urls))
    }

    async fn upload_async(&self, request: UploadRequest) -> StorageResult<OneOrMany<String>> {
        let container = self.resolve_container(request.container())?;
        let client = self.async_client()?;
        let batch = request.normalize();
        let count = batch.len();

        let uploads = batch.items.into_iter().map(|(file, name)| {
            let client = Arc::clone(&client);
            let container = container.as_str();
            async move { client.put(container, &name, file.to_bytes()).await }
        });

        let urls = try_join_all(uploads).await.map_err(|e| {
            error!(
                "Batch upload of count={} files to container={} failed: {}",
                count, container, e
            );
            e
        })?;

        info!(
            "Uploaded count={} files to container={}",
            urls.len(),
            container
        );
        Ok(OneOrMany::collapse(urls))
    }

    fn download(&self, url: &str, save_path: Option<&Path>) -> StorageResult<Option<Downloaded>> {
        let (container, path) = self.root.parse_object_url(url)?;
        let handle = self.blocking_client()?;

        let Some(content) = handle.block_on(handle.client.get(&container, &path))? else {
            error!("The file {}/{} was not found", container, path);
            return Ok(None);
        };

        let file = Self::to_download(&path, content);
        match save_path {
            Some(save_path) => Ok(Some(Downloaded::Saved(file.save(save_path)?))),
            None => Ok(Some(Downloaded::File(file))),
        }
    }

    async fn download_async(
        &self,
        url: &str,
        save_path: Option<&Path>,
    ) -> StorageResult<Option<Downloaded>> {
        let (container, path) = self.root.parse_object_url(url)?;
        let client = self.async_client()?;

        let Some(content) = client.get(&container, &path).await? else {
            error!("The file {}/{} was not found", container, path);
            return Ok(None);
        };

        let file = Self::to_download(&path, content);
        match save_path {
            Some(save_path) => Ok(Some(Downloaded::Saved(file.save_async(save_path).await?))),
            None => Ok(Some(Downloaded::File(file))),
        }
    }

    fn delete(&self, urls: OneOrMany<String>) -> StorageResult<OneOrMany<bool>> {
        if urls.is_blank() {
            return Ok(OneOrMany::One(false));
        }
        let single = matches!(urls, OneOrMany::One(_));
        let targets = self.delete_targets(urls.into_vec())?;
        let handle = self.blocking_client()?;

        let results = targets
            .into_iter()
            .map(|target| {
                handle.block_on(async { Ok(Self::delete_one(&handle.client, target).await) })
            })
            .collect::<StorageResult<Vec<bool>>>()?;

        Ok(shape_like(single, results))
    }

    async fn delete_async(&self, urls: OneOrMany<String>) -> StorageResult<OneOrMany<bool>> {
        if urls.is_blank() {
            return Ok(OneOrMany::One(false));
        }
        let single = matches!(urls, OneOrMany::One(_));
        let targets = self.delete_targets(urls.into_vec())?;
        let client = self.async_client()?;

        let results = join_all(
            targets
                .into_iter()
                .map(|target| Self::delete_one(&client, target)),
        )
        .await;

        Ok(shape_like(single, results))
    }
}

#[async_trait]
impl CloudStorage for ObjectStorage {
    fn create_temporary_upload_link(&self, options: &LinkOptions) -> Option<TemporaryLink> {
        let (name, expires_in, expiry) = Self::link_target(options);
        let result = self.blocking_client().and_then(|handle| {
            handle.block_on(handle.client.signed_put_url(
                &options.container,
                &name,
                expires_in,
            ))
        });
        self.finish_link(result, expiry)
    }

    async fn create_temporary_upload_link_async(
        &self,
        options: &LinkOptions,
    ) -> Option<TemporaryLink> {
        let (name, expires_in, expiry) = Self::link_target(options);
        let result = match self.async_client() {
            Ok(client) => {
                client
                    .signed_put_url(&options.container, &name, expires_in)
                    .await
            }
            Err(e) => Err(e),
        };
        self.finish_link(result, expiry)
    }
}

impl Debug for ObjectStorage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ObjectStorage(provider={}, url={}, default_container={:?})",
            self.name,
            self.root.as_str(),
            self.default_container
        )
    }
}

/// Deletes answer with the shape they were asked in.
fn shape_like(single: bool, mut results: Vec<bool>) -> OneOrMany<bool> {
    if single && results.len() == 1 {
        OneOrMany::One(results.remove(0))
    } else {
        OneOrMany::Many(results)
    }
}

/// Build connection options from configuration.
///
/// # Arguments
///
/// * `config` - Configuration with optional timeout and connection settings
///
/// # Returns
///
/// A `ClientOptions` instance configured with timeout and connection settings from the config.
pub(crate) fn build_connection_options(config: &CloudConfig) -> ClientOptions {
    let mut client_options = ClientOptions::default();
    if let Some(timeout_str) = config.options.get("timeout") {
        if timeout_str == "0" || timeout_str == "disabled" {
            client_options = client_options.with_timeout_disabled();
        } else if let Ok(sec) = timeout_str.parse::<u64>() {
            client_options = client_options.with_timeout(Duration::from_secs(sec))
        }
    };
    if let Some(connect_timeout_str) = config.options.get("connect_timeout") {
        if connect_timeout_str == "0" || connect_timeout_str == "disabled" {
            client_options = client_options.with_connect_timeout_disabled();
        } else if let Ok(sec) = connect_timeout_str.parse::<u64>() {
            client_options = client_options.with_connect_timeout(Duration::from_secs(sec))
        }
    }
    if let Some(pool_idle_timeout_str) = config.options.get("pool_idle_timeout") {
        if let Ok(sec) = pool_idle_timeout_str.parse::<u64>() {
            client_options = client_options.with_pool_idle_timeout(Duration::from_secs(sec))
        }
    }
    if let Some(pool_max_idle_per_host_str) = config.options.get("pool_max_idle_per_host") {
        if let Ok(max_idle) = pool_max_idle_per_host_str.parse::<usize>() {
            client_options = client_options.with_pool_max_idle_per_host(max_idle)
        }
    }
    client_options
}

/// Build the vendor retry policy from configuration.
///
/// Defaults to no retries so that failures surface immediately.
pub(crate) fn build_retry_options(config: &CloudConfig) -> RetryConfig {
    let default_retry_config = RetryConfig::default();
    let max_retries = config
        .options
        .get("max_retries")
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(0);
    let retry_timeout = config
        .options
        .get("retry_timeout")
        .and_then(|s| Some(Duration::from_secs(s.parse::<u64>().ok()?)))
        .unwrap_or(default_retry_config.retry_timeout);
    RetryConfig {
        backoff: Default::default(),
        max_retries,
        retry_timeout,
    }
}
