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
use std::path::Path;
use tracing::info;

use super::azure::AzureBlobStorage;
use super::batch::UploadRequest;
use super::config::{CloudConfig, ProviderType};
use super::error::StorageResult;
use super::provider::{CloudStorage, Downloaded, FastCloud, OneOrMany};
use super::s3::S3Storage;
use crate::api::replicate::ReplicateUploadApi;
use crate::api::socaity::SocaityUploadApi;

/// One of the supported providers.
#[derive(Debug)]
pub enum FastCloudProvider {
    Azure(AzureBlobStorage),
    S3(S3Storage),
    Replicate(ReplicateUploadApi),
    Socaity(SocaityUploadApi),
}

impl FastCloudProvider {
    /// The provider as a storage backend, if it can hand out upload links.
    pub fn as_cloud_storage(&self) -> Option<&dyn CloudStorage> {
        match self {
            FastCloudProvider::Azure(p) => Some(p),
            FastCloudProvider::S3(p) => Some(p),
            FastCloudProvider::Replicate(_) | FastCloudProvider::Socaity(_) => None,
        }
    }

    fn inner(&self) -> &dyn FastCloud {
        match self {
            FastCloudProvider::Azure(p) => p,
            FastCloudProvider::S3(p) => p,
            FastCloudProvider::Replicate(p) => p,
            FastCloudProvider::Socaity(p) => p,
        }
    }
}

#[async_trait]
impl FastCloud for FastCloudProvider {
    fn provider_name(&self) -> &'static str {
        self.inner().provider_name()
    }

    fn upload(&self, request: UploadRequest) -> StorageResult<OneOrMany<String>> {
        self.inner().upload(request)
    }

    async fn upload_async(&self, request: UploadRequest) -> StorageResult<OneOrMany<String>> {
        self.inner().upload_async(request).await
    }

    fn download(&self, url: &str, save_path: Option<&Path>) -> StorageResult<Option<Downloaded>> {
        self.inner().download(url, save_path)
    }

    async fn download_async(
        &self,
        url: &str,
        save_path: Option<&Path>,
    ) -> StorageResult<Option<Downloaded>> {
        self.inner().download_async(url, save_path).await
    }

    fn delete(&self, urls: OneOrMany<String>) -> StorageResult<OneOrMany<bool>> {
        self.inner().delete(urls)
    }

    async fn delete_async(&self, urls: OneOrMany<String>) -> StorageResult<OneOrMany<bool>> {
        self.inner().delete_async(urls).await
    }
}

/// Factory for creating providers
pub struct FastCloudFactory;

impl FastCloudFactory {
    /// Create a provider from a configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration specifying the provider type and options
    ///
    /// # Returns
    ///
    /// A `Result` containing:
    /// * `Ok(FastCloudProvider)` - The configured provider; no network call has been made yet
    /// * `Err(StorageError)` - If the provider cannot be created
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// * Required configuration options are missing
    /// * Credentials or endpoints cannot be parsed
    pub fn from_config(config: CloudConfig) -> StorageResult<FastCloudProvider> {
        info!("Creating provider={}", config.provider_str());
        let provider = match config.provider {
            ProviderType::Azure => FastCloudProvider::Azure(AzureBlobStorage::from_config(config)?),
            ProviderType::S3 => FastCloudProvider::S3(S3Storage::from_config(config)?),
            ProviderType::Replicate => {
                FastCloudProvider::Replicate(ReplicateUploadApi::from_config(&config)?)
            }
            ProviderType::Socaity => {
                FastCloudProvider::Socaity(SocaityUploadApi::from_config(&config)?)
            }
        };
        Ok(provider)
    }
}
