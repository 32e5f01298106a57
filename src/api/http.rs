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

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use once_cell::sync::OnceCell;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::storage::config::{CloudConfig, DEFAULT_TIMEOUT_SECS};
use crate::storage::error::{StorageError, StorageResult};

pub const BLOB_TYPE_HEADER: &str = "x-ms-blob-type";
pub const BLOCK_BLOB: &str = "BlockBlob";
pub const IF_NONE_MATCH_HEADER: &str = "x-ms-if-none-match";

/// Blocking and non-blocking HTTP clients, each created on first use.
pub struct HttpClientManager {
    timeout: Duration,
    client: OnceCell<Arc<reqwest::Client>>,
    blocking: OnceCell<Arc<reqwest::blocking::Client>>,
}

impl HttpClientManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            client: OnceCell::new(),
            blocking: OnceCell::new(),
        }
    }

    pub fn from_config(config: &CloudConfig) -> Self {
        Self::new(config.timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn client(&self) -> StorageResult<Arc<reqwest::Client>> {
        self.client
            .get_or_try_init(|| {
                debug!("Creating HTTP client with timeout={:?}", self.timeout);
                reqwest::Client::builder()
                    .timeout(self.timeout)
                    .build()
                    .map(Arc::new)
                    .map_err(|e| {
                        StorageError::ConnectionError(format!("Failed to create HTTP client: {}", e))
                    })
            })
            .cloned()
    }

    /// The blocking client. Must not be created or used inside an async runtime.
    pub fn blocking_client(&self) -> StorageResult<Arc<reqwest::blocking::Client>> {
        self.blocking
            .get_or_try_init(|| {
                debug!("Creating blocking HTTP client with timeout={:?}", self.timeout);
                reqwest::blocking::Client::builder()
                    .timeout(self.timeout)
                    .build()
                    .map(Arc::new)
                    .map_err(|e| {
                        StorageError::ConnectionError(format!("Failed to create HTTP client: {}", e))
                    })
            })
            .cloned()
    }

    /// PUT raw bytes to a signed blob URL and return the response status.
    ///
    /// With `if_none_match` the write only succeeds when no blob exists yet.
    pub fn put_block_blob(
        &self,
        url: &str,
        content: Bytes,
        if_none_match: bool,
    ) -> StorageResult<StatusCode> {
        let client = self.blocking_client()?;
        let mut request = client.put(url).header(BLOB_TYPE_HEADER, BLOCK_BLOB);
        if if_none_match {
            request = request.header(IF_NONE_MATCH_HEADER, "*");
        }
        Ok(request.body(content).send()?.status())
    }

    pub async fn put_block_blob_async(
        &self,
        url: &str,
        content: Bytes,
        if_none_match: bool,
    ) -> StorageResult<StatusCode> {
        let client = self.client()?;
        let mut request = client.put(url).header(BLOB_TYPE_HEADER, BLOCK_BLOB);
        if if_none_match {
            request = request.header(IF_NONE_MATCH_HEADER, "*");
        }
        Ok(request.body(content).send().await?.status())
    }
}

impl std::fmt::Debug for HttpClientManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HttpClientManager(timeout={:?})", self.timeout)
    }
}

impl Default for HttpClientManager {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

/// `Authorization: Bearer {api_key}`
pub fn bearer_headers(api_key: &str) -> StorageResult<HeaderMap> {
    let value = HeaderValue::from_str(&format!("Bearer {}", api_key))
        .map_err(|e| StorageError::ConfigError(format!("Invalid API key: {}", e)))?;
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}
