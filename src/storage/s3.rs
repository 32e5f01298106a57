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

use async_trait::async_trait;
use object_store::aws::AmazonS3Builder;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::batch::UploadRequest;
use super::config::CloudConfig;
use super::error::{StorageError, StorageResult};
use super::object_store::{
    build_connection_options, build_retry_options, ContainerSigner, ContainerStore,
    ContainerStoreBuilder, ObjectStorage, ServiceRoot,
};
use super::provider::{
    CloudStorage, Downloaded, FastCloud, LinkOptions, OneOrMany, TemporaryLink,
};

pub const DEFAULT_REGION: &str = "us-east-1";

/// Builds one `AmazonS3` store per bucket.
struct S3Buckets {
    config: CloudConfig,
    region: String,
    endpoint: Option<String>,
}

impl ContainerStoreBuilder for S3Buckets {
    fn build(&self, bucket: &str) -> StorageResult<ContainerStore> {
        let mut builder = AmazonS3Builder::new()
            .with_client_options(build_connection_options(&self.config))
            .with_retry(build_retry_options(&self.config))
            .with_bucket_name(bucket)
            .with_region(&self.region)
            .with_virtual_hosted_style_request(false);

        for (key, value) in &self.config.options {
            match key.as_str() {
                "access_key_id" => builder = builder.with_access_key_id(value),
                "secret_access_key" => builder = builder.with_secret_access_key(value),
                "session_token" | "token" => builder = builder.with_token(value),
                _ => (),
            }
        }
        if let Some(endpoint) = &self.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        let allow_http = self
            .config
            .get_option("allow_http")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
            || self
                .endpoint
                .as_deref()
                .is_some_and(|e| e.starts_with("http://"));
        if allow_http {
            builder = builder.with_allow_http(true);
        }

        let store = Arc::new(builder.build().map_err(|e| {
            StorageError::ConfigError(format!("Failed to create S3 store: {}", e))
        })?);
        Ok(ContainerStore {
            signer: Some(ContainerSigner::S3(Arc::clone(&store))),
            store,
        })
    }
}

/// Amazon S3 and S3-compatible bucket storage
///
/// Objects are addressed path-style as `{endpoint}/{bucket}/{key}`. The `bucket`
/// option, when set, is used for uploads that name no container.
#[derive(Debug)]
pub struct S3Storage {
    storage: ObjectStorage,
}

impl S3Storage {
    /// Create a client from `bucket`, `region`, `access_key_id`, `secret_access_key`,
    /// `session_token`, `endpoint` and `allow_http` options.
    ///
    /// Without static keys the store falls back to the instance credential chain.
    pub fn from_config(config: CloudConfig) -> StorageResult<Self> {
        let region = config
            .get_option("region")
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let endpoint = config
            .get_option("endpoint")
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.trim_end_matches('/').to_string());
        let bucket = config
            .get_option("bucket")
            .filter(|v| !v.trim().is_empty())
            .cloned();

        let root = match &endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://s3.{}.amazonaws.com", region),
        };
        info!(
            "Configured S3 url={} region={} bucket={:?}",
            root, region, bucket
        );

        let root = ServiceRoot::parse(&root)?;
        let builder = Arc::new(S3Buckets {
            config,
            region,
            endpoint,
        });
        Ok(Self {
            storage: ObjectStorage::new("s3", root, bucket, builder),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_storage(storage: ObjectStorage) -> Self {
        Self { storage }
    }

    pub fn url(&self) -> &str {
        self.storage.url()
    }

    pub fn bucket(&self) -> Option<&str> {
        self.storage.default_container()
    }

    pub fn storage(&self) -> &ObjectStorage {
        &self.storage
    }
}

#[async_trait]
impl FastCloud for S3Storage {
    fn provider_name(&self) -> &'static str {
        self.storage.provider_name()
    }

    fn upload(&self, request: UploadRequest) -> StorageResult<OneOrMany<String>> {
        self.storage.upload(request)
    }

    async fn upload_async(&self, request: UploadRequest) -> StorageResult<OneOrMany<String>> {
        self.storage.upload_async(request).await
    }

    fn download(&self, url: &str, save_path: Option<&Path>) -> StorageResult<Option<Downloaded>> {
        self.storage.download(url, save_path)
    }

    async fn download_async(
        &self,
        url: &str,
        save_path: Option<&Path>,
    ) -> StorageResult<Option<Downloaded>> {
        self.storage.download_async(url, save_path).await
    }

    fn delete(&self, urls: OneOrMany<String>) -> StorageResult<OneOrMany<bool>> {
        self.storage.delete(urls)
    }

    async fn delete_async(&self, urls: OneOrMany<String>) -> StorageResult<OneOrMany<bool>> {
        self.storage.delete_async(urls).await
    }
}

#[async_trait]
impl CloudStorage for S3Storage {
    fn create_temporary_upload_link(&self, options: &LinkOptions) -> Option<TemporaryLink> {
        self.storage.create_temporary_upload_link(options)
    }

    async fn create_temporary_upload_link_async(
        &self,
        options: &LinkOptions,
    ) -> Option<TemporaryLink> {
        self.storage.create_temporary_upload_link_async(options).await
    }
}
