// Copyright 2022 Adobe. All rights reserved.
// This file is licensed to you under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License. You may obtain a copy
// of the License at http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under
// the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR REPRESENTATIONS
// OF ANY KIND, either express or implied. See the License for the specific language
// governing permissions and limitations under the License.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use super::error::{StorageError, StorageResult};

/// Request timeout applied when the `timeout` option is absent or invalid, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Provider type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Azure Blob Storage
    Azure,
    /// AWS S3 or any S3 compatible service
    S3,
    /// Replicate file upload API
    Replicate,
    /// Socaity file upload API
    Socaity,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Azure => "azure",
            ProviderType::S3 => "s3",
            ProviderType::Replicate => "replicate",
            ProviderType::Socaity => "socaity",
        }
    }
}

impl FromStr for ProviderType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "azure" | "azure_blob" | "azureblob" => Ok(ProviderType::Azure),
            "s3" | "aws" => Ok(ProviderType::S3),
            "replicate" => Ok(ProviderType::Replicate),
            "socaity" => Ok(ProviderType::Socaity),
            _ => Err(StorageError::ConfigError(format!(
                "Unknown provider type: {}",
                s
            ))),
        }
    }
}

/// Configuration for any provider
///
/// Provider-specific options live in a flat map so new providers do not need
/// their own configuration structs.
///
/// # Examples
///
/// ## Azure Blob Storage
/// ```
/// use fastcloud::CloudConfig;
///
/// let config = CloudConfig::azure()
///     .with_option("connection_string", "AccountName=acc;AccountKey=a2V5");
/// ```
///
/// ## AWS S3
/// ```
/// use fastcloud::CloudConfig;
///
/// let config = CloudConfig::s3()
///     .with_option("bucket", "my-bucket")
///     .with_option("region", "us-east-1")
///     .with_option("access_key_id", "ACCESS_KEY")
///     .with_option("secret_access_key", "SECRET_ACCESS_KEY");
/// ```
///
/// ## Replicate
/// ```
/// use fastcloud::CloudConfig;
///
/// let config = CloudConfig::replicate().with_option("api_key", "r8_xxx");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Provider type
    #[serde(rename = "type")]
    pub provider: ProviderType,

    /// Provider-specific configuration options
    ///
    /// Azure:
    /// - sas_access_token: Account URL carrying a SAS query string
    /// - connection_string: Storage account connection string
    ///
    /// S3:
    /// - bucket: Default bucket
    /// - region: AWS region (e.g., "us-east-1")
    /// - access_key_id / secret_access_key / session_token: Credentials
    /// - endpoint: Custom endpoint URL (for S3-compatible services)
    /// - allow_http: "true" to allow HTTP connections
    ///
    /// Replicate / Socaity:
    /// - api_key: Bearer token
    /// - upload_endpoint: Override the default upload endpoint
    ///
    /// All providers:
    /// - timeout, connect_timeout, max_retries, retry_timeout,
    ///   pool_idle_timeout, pool_max_idle_per_host
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl CloudConfig {
    /// Create a new configuration from a provider name ("azure", "s3", "replicate", "socaity").
    ///
    /// # Errors
    ///
    /// Returns `StorageError::ConfigError` for an unknown provider name.
    pub fn new(provider: &str) -> StorageResult<Self> {
        Ok(Self::for_provider(provider.parse()?))
    }

    pub fn for_provider(provider: ProviderType) -> Self {
        Self {
            provider,
            options: Self::default_options(),
        }
    }

    pub fn azure() -> Self {
        Self::for_provider(ProviderType::Azure)
    }

    pub fn s3() -> Self {
        Self::for_provider(ProviderType::S3)
    }

    pub fn replicate() -> Self {
        Self::for_provider(ProviderType::Replicate)
    }

    pub fn socaity() -> Self {
        Self::for_provider(ProviderType::Socaity)
    }

    /// Build a configuration from environment variables.
    ///
    /// | Provider | Variables |
    /// | --- | --- |
    /// | azure | `AZURE_STORAGE_CONNECTION_STRING`, `AZURE_SAS_ACCESS_TOKEN` |
    /// | s3 | `S3_BUCKET`, `AWS_REGION`, `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_SESSION_TOKEN`, `AWS_ENDPOINT_URL` |
    /// | replicate | `REPLICATE_API_KEY`, `REPLICATE_UPLOAD_ENDPOINT` |
    /// | socaity | `SOCAITY_API_KEY`, `SOCAITY_UPLOAD_ENDPOINT` |
    pub fn from_env(provider: ProviderType) -> Self {
        Self::from_lookup(provider, |key| std::env::var(key).ok())
    }

    fn from_lookup(provider: ProviderType, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mapping: &[(&str, &str)] = match provider {
            ProviderType::Azure => &[
                ("AZURE_STORAGE_CONNECTION_STRING", "connection_string"),
                ("AZURE_SAS_ACCESS_TOKEN", "sas_access_token"),
            ],
            ProviderType::S3 => &[
                ("S3_BUCKET", "bucket"),
                ("AWS_REGION", "region"),
                ("AWS_ACCESS_KEY_ID", "access_key_id"),
                ("AWS_SECRET_ACCESS_KEY", "secret_access_key"),
                ("AWS_SESSION_TOKEN", "session_token"),
                ("AWS_ENDPOINT_URL", "endpoint"),
            ],
            ProviderType::Replicate => &[
                ("REPLICATE_API_KEY", "api_key"),
                ("REPLICATE_UPLOAD_ENDPOINT", "upload_endpoint"),
            ],
            ProviderType::Socaity => &[
                ("SOCAITY_API_KEY", "api_key"),
                ("SOCAITY_UPLOAD_ENDPOINT", "upload_endpoint"),
            ],
        };

        mapping
            .iter()
            .filter_map(|(var, key)| lookup(var).map(|value| (*key, value)))
            .fold(Self::for_provider(provider), |config, (key, value)| {
                config.with_option(key, value)
            })
    }

    /// Default connection options shared by all providers.
    ///
    /// `max_retries` is 0 so a failed network call surfaces immediately.
    pub fn default_options() -> HashMap<String, String> {
        [
            ("timeout", "60"),
            ("connect_timeout", "30"),
            ("max_retries", "0"),
            ("retry_timeout", "60"),
            ("pool_idle_timeout", "15"),
            ("pool_max_idle_per_host", "5"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn with_options(mut self, options: HashMap<String, String>) -> Self {
        self.options.extend(options);
        self
    }

    pub fn get_option(&self, key: &str) -> Option<&String> {
        self.options.get(key)
    }

    /// A required option, or a configuration error naming it.
    pub fn require_option(&self, key: &str) -> StorageResult<&String> {
        self.get_option(key)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                StorageError::ConfigError(format!(
                    "{} requires '{}' option",
                    self.provider_str(),
                    key
                ))
            })
    }

    /// The request timeout, falling back to 60 seconds.
    pub fn timeout(&self) -> Duration {
        let secs = self
            .get_option("timeout")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    pub fn provider_str(&self) -> &'static str {
        self.provider.as_str()
    }
}
