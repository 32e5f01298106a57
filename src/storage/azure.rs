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
use object_store::azure::MicrosoftAzureBuilder;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use url::Url;

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
use crate::api::http::HttpClientManager;
use crate::media::MediaFile;

const EMULATOR_ACCOUNT: &str = "devstoreaccount1";
const EMULATOR_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const EMULATOR_ROOT: &str = "http://127.0.0.1:10000/devstoreaccount1";

#[derive(Clone, PartialEq, Eq)]
enum AzureCredential {
    AccessKey(String),
    Sas(Vec<(String, String)>),
}

impl std::fmt::Debug for AzureCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AzureCredential::AccessKey(_) => write!(f, "AccessKey(***)"),
            AzureCredential::Sas(_) => write!(f, "Sas(***)"),
        }
    }
}

/// Account coordinates resolved from a SAS URL or a connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AzureAccount {
    name: String,
    credential: AzureCredential,
    root: String,
    /// Blob endpoint when it is not the public `*.blob.core.windows.net` one.
    endpoint: Option<String>,
    emulator: bool,
}

impl AzureAccount {
    fn public(name: &str, credential: AzureCredential) -> Self {
        Self {
            name: name.to_string(),
            credential,
            root: format!("https://{}.blob.core.windows.net", name),
            endpoint: None,
            emulator: false,
        }
    }

    fn emulator() -> Self {
        Self {
            name: EMULATOR_ACCOUNT.to_string(),
            credential: AzureCredential::AccessKey(EMULATOR_ACCOUNT_KEY.to_string()),
            root: EMULATOR_ROOT.to_string(),
            endpoint: None,
            emulator: true,
        }
    }

    /// `https://{account}.blob.core.windows.net/?sv=...&sig=...`
    fn from_sas_url(sas_url: &str) -> StorageResult<Self> {
        let url = Url::parse(sas_url)?;
        let host = url.host_str().ok_or_else(|| {
            StorageError::ConfigError(format!("SAS URL has no host: {}", sas_url))
        })?;
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        if pairs.is_empty() {
            return Err(StorageError::ConfigError(
                "SAS URL carries no signature".to_string(),
            ));
        }

        let mut root = url.clone();
        root.set_query(None);
        root.set_fragment(None);
        let root = root.as_str().trim_end_matches('/').to_string();

        let public_suffix = ".blob.core.windows.net";
        if let Some(name) = host.strip_suffix(public_suffix) {
            return Ok(Self {
                root,
                ..Self::public(name, AzureCredential::Sas(pairs))
            });
        }

        // Custom endpoints address the account in the first path segment
        let name = url
            .path_segments()
            .and_then(|mut segments| segments.next())
            .filter(|segment| !segment.is_empty())
            .unwrap_or_else(|| host.split('.').next().unwrap_or(host))
            .to_string();
        Ok(Self {
            name,
            credential: AzureCredential::Sas(pairs),
            endpoint: Some(root.clone()),
            root,
            emulator: false,
        })
    }

    fn from_connection_string(connection_string: &str) -> StorageResult<Self> {
        let parts: HashMap<&str, &str> = connection_string
            .split(';')
            .filter_map(|part| part.trim().split_once('='))
            .map(|(key, value)| (key.trim(), value.trim()))
            .collect();

        if parts
            .get("UseDevelopmentStorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Ok(Self::emulator());
        }

        let name = parts.get("AccountName").copied().ok_or_else(|| {
            StorageError::ConfigError("Connection string has no AccountName".to_string())
        })?;
        let credential = if let Some(key) = parts.get("AccountKey") {
            AzureCredential::AccessKey(key.to_string())
        } else if let Some(sas) = parts.get("SharedAccessSignature") {
            AzureCredential::Sas(
                url::form_urlencoded::parse(sas.trim_start_matches('?').as_bytes())
                    .into_owned()
                    .collect(),
            )
        } else {
            return Err(StorageError::ConfigError(
                "Connection string has neither AccountKey nor SharedAccessSignature".to_string(),
            ));
        };

        if let Some(endpoint) = parts.get("BlobEndpoint") {
            let endpoint = endpoint.trim_end_matches('/').to_string();
            return Ok(Self {
                name: name.to_string(),
                credential,
                root: endpoint.clone(),
                endpoint: Some(endpoint),
                emulator: false,
            });
        }

        let protocol = parts.get("DefaultEndpointsProtocol").unwrap_or(&"https");
        let suffix = parts.get("EndpointSuffix").unwrap_or(&"core.windows.net");
        let root = format!("{}://{}.blob.{}", protocol, name, suffix);
        let endpoint = (root != format!("https://{}.blob.core.windows.net", name))
            .then(|| root.clone());
        Ok(Self {
            name: name.to_string(),
            credential,
            root,
            endpoint,
            emulator: false,
        })
    }

    fn can_sign(&self) -> bool {
        matches!(self.credential, AzureCredential::AccessKey(_))
    }
}

/// Builds one `MicrosoftAzure` store per container.
struct AzureContainers {
    config: CloudConfig,
    account: AzureAccount,
}

impl ContainerStoreBuilder for AzureContainers {
    fn build(&self, container: &str) -> StorageResult<ContainerStore> {
        let mut builder = MicrosoftAzureBuilder::new()
            .with_client_options(build_connection_options(&self.config))
            .with_retry(build_retry_options(&self.config))
            .with_account(&self.account.name)
            .with_container_name(container);

        builder = match &self.account.credential {
            AzureCredential::AccessKey(key) => builder.with_access_key(key),
            AzureCredential::Sas(pairs) => builder.with_sas_authorization(pairs.clone()),
        };
        if self.account.emulator {
            builder = builder.with_use_emulator(true);
        } else if let Some(endpoint) = &self.account.endpoint {
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = Arc::new(builder.build().map_err(|e| {
            StorageError::ConfigError(format!("Failed to create Azure store: {}", e))
        })?);
        let signer = self
            .account
            .can_sign()
            .then(|| ContainerSigner::Azure(Arc::clone(&store)));
        Ok(ContainerStore { store, signer })
    }
}

/// Azure Blob Storage
///
/// Objects are addressed as `{account_url}/{container}/{blob}`. A container must be
/// given on every upload.
#[derive(Debug)]
pub struct AzureBlobStorage {
    storage: ObjectStorage,
    http: HttpClientManager,
}

impl AzureBlobStorage {
    /// Create a client from a signed account URL or a connection string.
    ///
    /// The signed URL wins when both are given.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::ConfigError` if neither is given or neither can be parsed.
    pub fn new(
        sas_access_token: Option<&str>,
        connection_string: Option<&str>,
    ) -> StorageResult<Self> {
        let mut config = CloudConfig::azure();
        if let Some(token) = sas_access_token {
            config = config.with_option("sas_access_token", token);
        }
        if let Some(connection_string) = connection_string {
            config = config.with_option("connection_string", connection_string);
        }
        Self::from_config(config)
    }

    pub fn from_config(config: CloudConfig) -> StorageResult<Self> {
        let sas_access_token = config
            .get_option("sas_access_token")
            .filter(|v| !v.trim().is_empty());
        let connection_string = config
            .get_option("connection_string")
            .filter(|v| !v.trim().is_empty());

        let account = match (sas_access_token, connection_string) {
            (Some(token), _) => AzureAccount::from_sas_url(token)?,
            (None, Some(connection_string)) => {
                AzureAccount::from_connection_string(connection_string)?
            }
            (None, None) => {
                return Err(StorageError::ConfigError(
                    "Azure requires 'sas_access_token' or 'connection_string' option".to_string(),
                ))
            }
        };

        info!(
            "Configured Azure account={} url={}",
            account.name, account.root
        );
        let root = ServiceRoot::parse(&account.root)?;
        let http = HttpClientManager::from_config(&config);
        let builder = Arc::new(AzureContainers { config, account });
        Ok(Self {
            storage: ObjectStorage::new("azure", root, None, builder),
            http,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_storage(storage: ObjectStorage) -> Self {
        Self {
            storage,
            http: HttpClientManager::default(),
        }
    }

    /// The account URL.
    pub fn url(&self) -> &str {
        self.storage.url()
    }

    pub fn storage(&self) -> &ObjectStorage {
        &self.storage
    }

    /// Write a file through a signed upload URL, e.g. one from
    /// [`CloudStorage::create_temporary_upload_link`].
    ///
    /// Returns `true` only if the service answered `201 Created`; failures are logged.
    pub fn upload_with_temporary_upload_link(
        &self,
        sas_url: &str,
        file: impl Into<MediaFile>,
    ) -> bool {
        let result = self
            .http
            .put_block_blob(sas_url, file.into().to_bytes(), false);
        Self::link_upload_succeeded(result)
    }

    /// Non-blocking form of [`AzureBlobStorage::upload_with_temporary_upload_link`].
    ///
    /// Refuses to overwrite an existing blob.
    pub async fn upload_with_temporary_upload_link_async(
        &self,
        sas_url: &str,
        file: impl Into<MediaFile>,
    ) -> bool {
        let result = self
            .http
            .put_block_blob_async(sas_url, file.into().to_bytes(), true)
            .await;
        Self::link_upload_succeeded(result)
    }

    fn link_upload_succeeded(result: StorageResult<StatusCode>) -> bool {
        match result {
            Ok(StatusCode::CREATED) => true,
            Ok(status) => {
                error!("Upload through temporary link failed with status={}", status);
                false
            }
            Err(e) => {
                error!("Upload through temporary link failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl FastCloud for AzureBlobStorage {
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
impl CloudStorage for AzureBlobStorage {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::object_store::testing::in_memory_storage;
    use chrono::{DateTime, Utc};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY: &str = "a2V5a2V5a2V5a2V5a2V5a2V5";

    fn key_connection_string() -> String {
        format!(
            "DefaultEndpointsProtocol=https;AccountName=account;AccountKey={};EndpointSuffix=core.windows.net",
            KEY
        )
    }

    fn in_memory() -> AzureBlobStorage {
        AzureBlobStorage::with_storage(in_memory_storage(
            "azure",
            "https://account.blob.core.windows.net",
            None,
        ))
    }

    #[test]
    fn test_new_requires_credentials() {
        match AzureBlobStorage::new(None, None) {
            Err(StorageError::ConfigError(msg)) => {
                assert!(msg.contains("connection_string"));
            }
            other => panic!("Expected ConfigError, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_connection_string_with_key() {
        let account = AzureAccount::from_connection_string(&key_connection_string()).unwrap();
        assert_eq!(account.name, "account");
        assert_eq!(account.root, "https://account.blob.core.windows.net");
        assert_eq!(account.endpoint, None);
        assert_eq!(account.credential, AzureCredential::AccessKey(KEY.to_string()));
        assert!(account.can_sign());
    }

    #[test]
    fn test_connection_string_with_blob_endpoint_and_sas() {
        let account = AzureAccount::from_connection_string(
            "BlobEndpoint=http://localhost:10000/acct/;AccountName=acct;SharedAccessSignature=sv=2022-11-02&sig=abc%2Bdef",
        )
        .unwrap();
        assert_eq!(account.root, "http://localhost:10000/acct");
        assert_eq!(account.endpoint.as_deref(), Some("http://localhost:10000/acct"));
        assert_eq!(
            account.credential,
            AzureCredential::Sas(vec![
                ("sv".to_string(), "2022-11-02".to_string()),
                ("sig".to_string(), "abc+def".to_string()),
            ])
        );
        assert!(!account.can_sign());
    }

    #[test]
    fn test_connection_string_development_storage() {
        let account =
            AzureAccount::from_connection_string("UseDevelopmentStorage=true").unwrap();
        assert!(account.emulator);
        assert_eq!(account.name, EMULATOR_ACCOUNT);
        assert_eq!(account.root, EMULATOR_ROOT);
    }

    #[test]
    fn test_connection_string_missing_credential() {
        assert!(matches!(
            AzureAccount::from_connection_string("AccountName=account"),
            Err(StorageError::ConfigError(_))
        ));
        assert!(matches!(
            AzureAccount::from_connection_string("AccountKey=abc"),
            Err(StorageError::ConfigError(_))
        ));
    }

    #[test]
    fn test_sas_url() {
        let account = AzureAccount::from_sas_url(
            "https://account.blob.core.windows.net/?sv=2022-11-02&sp=rwdl&sig=abc%3D",
        )
        .unwrap();
        assert_eq!(account.name, "account");
        assert_eq!(account.root, "https://account.blob.core.windows.net");
        assert_eq!(account.endpoint, None);
        match account.credential {
            AzureCredential::Sas(pairs) => {
                assert!(pairs.contains(&("sig".to_string(), "abc=".to_string())));
            }
            AzureCredential::AccessKey(_) => panic!("Expected SAS credential"),
        }
    }

    #[test]
    fn test_sas_url_without_signature() {
        assert!(matches!(
            AzureAccount::from_sas_url("https://account.blob.core.windows.net/"),
            Err(StorageError::ConfigError(_))
        ));
    }

    #[test]
    fn test_sas_token_wins_over_connection_string() {
        let storage = AzureBlobStorage::new(
            Some("https://sasaccount.blob.core.windows.net/?sv=1&sig=x"),
            Some(&key_connection_string()),
        )
        .unwrap();
        assert_eq!(storage.url(), "https://sasaccount.blob.core.windows.net");
    }

    #[tokio::test]
    async fn test_upload_and_download_greeting() {
        let storage = in_memory();
        let url = storage
            .upload_async(
                UploadRequest::new(b"hello".to_vec())
                    .with_name("greeting.txt")
                    .in_container("docs"),
            )
            .await
            .unwrap();
        assert_eq!(
            url,
            OneOrMany::One("https://account.blob.core.windows.net/docs/greeting.txt".to_string())
        );

        let file = storage
            .download_async(&url.one().unwrap(), None)
            .await
            .unwrap()
            .and_then(Downloaded::into_file)
            .unwrap();
        assert_eq!(file.to_bytes().as_ref(), b"hello");
    }

    #[tokio::test]
    async fn test_upload_requires_container() {
        let storage = in_memory();
        let result = storage
            .upload_async(UploadRequest::new(b"hello".to_vec()))
            .await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_delete_foreign_account() {
        let storage = in_memory();
        let result = storage
            .delete_async("https://other.blob.core.windows.net/docs/greeting.txt".into())
            .await;
        assert!(matches!(result, Err(StorageError::ForeignUrl(_))));
    }

    #[tokio::test]
    async fn test_temporary_upload_link_is_write_only() {
        let storage = AzureBlobStorage::new(None, Some(&key_connection_string())).unwrap();
        let before = Utc::now();
        let link = storage
            .create_temporary_upload_link_async(
                &LinkOptions::default()
                    .with_container("inbox")
                    .with_name("video.mp4"),
            )
            .await
            .unwrap();

        assert!(link
            .url
            .starts_with("https://account.blob.core.windows.net/inbox/video.mp4?"));
        let url = Url::parse(&link.url).unwrap();
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(query.get("sp").map(String::as_str), Some("w"));

        let expected = before + chrono::Duration::minutes(20);
        assert!((link.expiry - expected).num_seconds().abs() <= 5);

        let signed_expiry: DateTime<Utc> = DateTime::parse_from_rfc3339(&query["se"])
            .unwrap()
            .with_timezone(&Utc);
        assert!((signed_expiry - expected).num_seconds().abs() <= 5);
    }

    #[tokio::test]
    async fn test_temporary_upload_link_default_name_is_uuid() {
        let storage = AzureBlobStorage::new(None, Some(&key_connection_string())).unwrap();
        let link = storage
            .create_temporary_upload_link_async(&LinkOptions::default().with_time_limit(5))
            .await
            .unwrap();

        let url = Url::parse(&link.url).unwrap();
        let segments: Vec<&str> = url.path_segments().unwrap().collect();
        assert_eq!(segments[0], "upload");
        assert!(uuid::Uuid::parse_str(segments[1]).is_ok());
        assert!((link.expiry - Utc::now()).num_minutes() <= 5);
    }

    #[tokio::test]
    async fn test_temporary_upload_link_needs_account_key() {
        let storage = AzureBlobStorage::new(
            Some("https://account.blob.core.windows.net/?sv=1&sig=x"),
            None,
        )
        .unwrap();
        let link = storage
            .create_temporary_upload_link_async(&LinkOptions::default())
            .await;
        assert!(link.is_none());
    }

    #[test]
    fn test_temporary_upload_link_blocking() {
        let storage = AzureBlobStorage::new(None, Some(&key_connection_string())).unwrap();
        let link = storage
            .create_temporary_upload_link(&LinkOptions::default().with_name("a.bin"))
            .unwrap();
        assert!(link
            .url
            .starts_with("https://account.blob.core.windows.net/upload/a.bin?"));
    }

    #[tokio::test]
    async fn test_upload_with_temporary_upload_link_async() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/upload/video.mp4"))
            .and(header("x-ms-blob-type", "BlockBlob"))
            .and(header("x-ms-if-none-match", "*"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let storage = in_memory();
        let uploaded = storage
            .upload_with_temporary_upload_link_async(
                &format!("{}/upload/video.mp4?sig=x", server.uri()),
                b"frames".to_vec(),
            )
            .await;
        assert!(uploaded);
    }

    #[tokio::test]
    async fn test_upload_with_temporary_upload_link_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let storage = in_memory();
        let uploaded = storage
            .upload_with_temporary_upload_link_async(
                &format!("{}/upload/video.mp4", server.uri()),
                b"frames".to_vec(),
            )
            .await;
        assert!(!uploaded);
    }

    #[test]
    fn test_upload_with_temporary_upload_link_blocking() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let server = runtime.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("PUT"))
                .and(path("/upload/a.bin"))
                .and(header("x-ms-blob-type", "BlockBlob"))
                .respond_with(ResponseTemplate::new(201))
                .expect(1)
                .mount(&server)
                .await;
            server
        });

        let storage = in_memory();
        assert!(storage.upload_with_temporary_upload_link(
            &format!("{}/upload/a.bin", server.uri()),
            b"abc".to_vec()
        ));
        assert!(!storage.upload_with_temporary_upload_link("http://127.0.0.1:1/x", b"abc".to_vec()));

        runtime.block_on(async move { server.verify().await });
    }
}
