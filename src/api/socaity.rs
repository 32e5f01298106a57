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
use reqwest::StatusCode;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use super::upload_api::{self, UploadApi, UploadApiClient};
use crate::media::{MediaFile, MultipartField};
use crate::storage::batch::UploadRequest;
use crate::storage::config::CloudConfig;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::provider::{Downloaded, FastCloud, OneOrMany};

pub const SOCAITY_UPLOAD_ENDPOINT: &str = "https://socaity.ai.api/v1/files";

#[derive(Debug, Deserialize)]
struct UploadSlot {
    #[serde(default)]
    upload_url: Option<String>,
}

/// Socaity file API
///
/// Two phases: an authenticated POST hands out a signed blob URL, then the file is
/// PUT there. The signed URL is the file's address.
#[derive(Debug)]
pub struct SocaityUploadApi {
    client: UploadApiClient,
}

impl SocaityUploadApi {
    pub fn new(api_key: &str, upload_endpoint: Option<&str>) -> StorageResult<Self> {
        let mut config = CloudConfig::socaity().with_option("api_key", api_key);
        if let Some(endpoint) = upload_endpoint {
            config = config.with_option("upload_endpoint", endpoint);
        }
        Self::from_config(&config)
    }

    pub fn from_config(config: &CloudConfig) -> StorageResult<Self> {
        Ok(Self {
            client: UploadApiClient::from_config(config, SOCAITY_UPLOAD_ENDPOINT)?,
        })
    }

    fn check_put_status(upload_url: &str, status: StatusCode) -> StorageResult<()> {
        if status != StatusCode::CREATED {
            return Err(StorageError::UploadError(format!(
                "Failed to upload to temporary URL {}. status={}",
                upload_url, status
            )));
        }
        debug!("Uploaded file to temporary url={}", upload_url);
        Ok(())
    }
}

#[async_trait]
impl UploadApi for SocaityUploadApi {
    fn api_client(&self) -> &UploadApiClient {
        &self.client
    }

    fn process_upload_response(&self, status: StatusCode, body: &str) -> StorageResult<String> {
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(StorageError::UploadError(format!(
                "Failed to get temporary upload URL. status={} body={}",
                status, body
            )));
        }

        let slot: UploadSlot = serde_json::from_str(body).map_err(|e| {
            StorageError::UploadError(format!("Unreadable Socaity response: {}", e))
        })?;
        slot.upload_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                StorageError::UploadError(format!(
                    "Socaity response carries no upload_url: {}",
                    body
                ))
            })
    }

    fn upload_form(&self, _file: &MediaFile, _name: &str) -> Option<MultipartField> {
        None
    }

    fn complete_upload(&self, url: String, file: &MediaFile) -> StorageResult<String> {
        let status = self
            .client
            .http()
            .put_block_blob(&url, file.to_bytes(), true)?;
        Self::check_put_status(&url, status)?;
        Ok(url)
    }

    async fn complete_upload_async(&self, url: String, file: &MediaFile) -> StorageResult<String> {
        let status = self
            .client
            .http()
            .put_block_blob_async(&url, file.to_bytes(), true)
            .await?;
        Self::check_put_status(&url, status)?;
        Ok(url)
    }
}

#[async_trait]
impl FastCloud for SocaityUploadApi {
    fn provider_name(&self) -> &'static str {
        "socaity"
    }

    fn upload(&self, request: UploadRequest) -> StorageResult<OneOrMany<String>> {
        upload_api::upload(self, self.provider_name(), request)
    }

    async fn upload_async(&self, request: UploadRequest) -> StorageResult<OneOrMany<String>> {
        upload_api::upload_async(self, self.provider_name(), request).await
    }

    fn download(&self, url: &str, save_path: Option<&Path>) -> StorageResult<Option<Downloaded>> {
        self.client.download(url, save_path)
    }

    async fn download_async(
        &self,
        url: &str,
        save_path: Option<&Path>,
    ) -> StorageResult<Option<Downloaded>> {
        self.client.download_async(url, save_path).await
    }

    fn delete(&self, urls: OneOrMany<String>) -> StorageResult<OneOrMany<bool>> {
        Ok(upload_api::unsupported_delete(self.provider_name(), urls))
    }

    async fn delete_async(&self, urls: OneOrMany<String>) -> StorageResult<OneOrMany<bool>> {
        Ok(upload_api::unsupported_delete(self.provider_name(), urls))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_for(server: &MockServer) -> SocaityUploadApi {
        SocaityUploadApi::new("sk_key", Some(&format!("{}/v1/files", server.uri()))).unwrap()
    }

    async fn mount_slot(server: &MockServer, blob: &str) -> String {
        let upload_url = format!("{}/blobs/{}?sig=x", server.uri(), blob);
        Mock::given(method("POST"))
            .and(path("/v1/files"))
            .and(header("Authorization", "Bearer sk_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "upload_url": upload_url,
            })))
            .up_to_n_times(1)
            .mount(server)
            .await;
        upload_url
    }

    #[test]
    fn test_default_endpoint() {
        let api = SocaityUploadApi::new("sk_key", None).unwrap();
        assert_eq!(api.api_client().upload_endpoint(), SOCAITY_UPLOAD_ENDPOINT);
    }

    #[test]
    fn test_requires_api_key() {
        assert!(matches!(
            SocaityUploadApi::from_config(&CloudConfig::socaity()),
            Err(StorageError::ConfigError(_))
        ));
    }

    #[test]
    fn test_process_upload_response() {
        let api = SocaityUploadApi::new("sk_key", None).unwrap();
        assert_eq!(
            api.process_upload_response(StatusCode::CREATED, r#"{"upload_url": "https://b/x"}"#)
                .unwrap(),
            "https://b/x"
        );
        assert!(api
            .process_upload_response(StatusCode::ACCEPTED, r#"{"upload_url": "https://b/x"}"#)
            .is_err());
        assert!(api
            .process_upload_response(StatusCode::OK, r#"{"other": 1}"#)
            .is_err());
    }

    #[tokio::test]
    async fn test_two_phase_upload() {
        let server = MockServer::start().await;
        let upload_url = mount_slot(&server, "video.mp4").await;
        Mock::given(method("PUT"))
            .and(path("/blobs/video.mp4"))
            .and(header("x-ms-blob-type", "BlockBlob"))
            .and(header("x-ms-if-none-match", "*"))
            .and(body_bytes(b"frames".to_vec()))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server);
        let url = api
            .upload_async(UploadRequest::new(b"frames".to_vec()))
            .await
            .unwrap();
        assert_eq!(url, OneOrMany::One(upload_url));
    }

    #[tokio::test]
    async fn test_failed_slot_request_skips_put() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let api = api_for(&server);
        let result = api
            .upload_async(UploadRequest::new(b"frames".to_vec()))
            .await;
        assert!(matches!(result, Err(StorageError::UploadError(_))));
    }

    #[tokio::test]
    async fn test_rejected_put_is_error() {
        let server = MockServer::start().await;
        mount_slot(&server, "video.mp4").await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let api = api_for(&server);
        let result = api
            .upload_async(UploadRequest::new(b"frames".to_vec()))
            .await;
        match result {
            Err(StorageError::UploadError(msg)) => assert!(msg.contains("409")),
            other => panic!("Expected UploadError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_batch_upload() {
        let server = MockServer::start().await;
        let first = mount_slot(&server, "one").await;
        let second = mount_slot(&server, "two").await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(201))
            .expect(2)
            .mount(&server)
            .await;

        let api = api_for(&server);
        let urls = api
            .upload_async(UploadRequest::batch(vec![b"1".to_vec(), b"2".to_vec()]))
            .await
            .unwrap()
            .many()
            .unwrap();
        assert_eq!(urls.len(), 2);
        assert!(urls.contains(&first));
        assert!(urls.contains(&second));
    }

    #[test]
    fn test_blocking_upload_is_two_phase() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (server, upload_url) = runtime.block_on(async {
            let server = MockServer::start().await;
            let upload_url = mount_slot(&server, "a.bin").await;
            Mock::given(method("PUT"))
                .and(path("/blobs/a.bin"))
                .and(header("x-ms-if-none-match", "*"))
                .respond_with(ResponseTemplate::new(201))
                .expect(1)
                .mount(&server)
                .await;
            (server, upload_url)
        });

        let api = api_for(&server);
        let url = api.upload(UploadRequest::new(b"abc".to_vec())).unwrap();
        assert_eq!(url, OneOrMany::One(upload_url));

        runtime.block_on(async move { server.verify().await });
    }
}
