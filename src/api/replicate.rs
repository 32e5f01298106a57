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

use super::upload_api::{self, UploadApi, UploadApiClient};
use crate::storage::batch::UploadRequest;
use crate::storage::config::CloudConfig;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::provider::{Downloaded, FastCloud, OneOrMany};

pub const REPLICATE_UPLOAD_ENDPOINT: &str = "https://api.replicate.com/v1/files";

#[derive(Debug, Deserialize)]
struct ReplicateFile {
    #[serde(default)]
    urls: Option<ReplicateFileUrls>,
}

#[derive(Debug, Deserialize)]
struct ReplicateFileUrls {
    #[serde(default)]
    get: Option<String>,
}

/// Replicate file API: one multipart POST per file, answered with the file's URL.
#[derive(Debug)]
pub struct ReplicateUploadApi {
    client: UploadApiClient,
}

impl ReplicateUploadApi {
    pub fn new(api_key: &str, upload_endpoint: Option<&str>) -> StorageResult<Self> {
        let mut config = CloudConfig::replicate().with_option("api_key", api_key);
        if let Some(endpoint) = upload_endpoint {
            config = config.with_option("upload_endpoint", endpoint);
        }
        Self::from_config(&config)
    }

    pub fn from_config(config: &CloudConfig) -> StorageResult<Self> {
        Ok(Self {
            client: UploadApiClient::from_config(config, REPLICATE_UPLOAD_ENDPOINT)?,
        })
    }
}

impl UploadApi for ReplicateUploadApi {
    fn api_client(&self) -> &UploadApiClient {
        &self.client
    }

    fn process_upload_response(&self, status: StatusCode, body: &str) -> StorageResult<String> {
        if !status.is_success() {
            return Err(StorageError::UploadError(format!(
                "Failed to upload to Replicate. status={} body={}",
                status, body
            )));
        }

        let file: ReplicateFile = serde_json::from_str(body).map_err(|e| {
            StorageError::UploadError(format!("Unreadable Replicate response: {}", e))
        })?;
        file.urls
            .and_then(|urls| urls.get)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                StorageError::UploadError(format!(
                    "Failed to get file URL from Replicate response: {}",
                    body
                ))
            })
    }
}

#[async_trait]
impl FastCloud for ReplicateUploadApi {
    fn provider_name(&self) -> &'static str {
        "replicate"
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
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn file_response(url: &str) -> ResponseTemplate {
        ResponseTemplate::new(201).set_body_json(json!({
            "id": "file-1",
            "urls": { "get": url },
        }))
    }

    async fn api_for(server: &MockServer) -> ReplicateUploadApi {
        ReplicateUploadApi::new("r8_key", Some(&format!("{}/v1/files", server.uri()))).unwrap()
    }

    #[test]
    fn test_default_endpoint() {
        let api = ReplicateUploadApi::new("r8_key", None).unwrap();
        assert_eq!(api.api_client().upload_endpoint(), REPLICATE_UPLOAD_ENDPOINT);
    }

    #[test]
    fn test_process_upload_response() {
        let api = ReplicateUploadApi::new("r8_key", None).unwrap();
        let url = api
            .process_upload_response(
                StatusCode::OK,
                r#"{"urls": {"get": "https://api.replicate.com/v1/files/abc"}}"#,
            )
            .unwrap();
        assert_eq!(url, "https://api.replicate.com/v1/files/abc");
    }

    #[test]
    fn test_process_upload_response_errors() {
        let api = ReplicateUploadApi::new("r8_key", None).unwrap();
        assert!(matches!(
            api.process_upload_response(StatusCode::UNAUTHORIZED, "denied"),
            Err(StorageError::UploadError(_))
        ));
        assert!(matches!(
            api.process_upload_response(StatusCode::OK, r#"{"urls": {}}"#),
            Err(StorageError::UploadError(_))
        ));
        assert!(matches!(
            api.process_upload_response(StatusCode::OK, "not json"),
            Err(StorageError::UploadError(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_returns_file_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/files"))
            .and(header("Authorization", "Bearer r8_key"))
            .and(body_string_contains("name=\"content\""))
            .respond_with(file_response("https://api.replicate.com/v1/files/abc"))
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server).await;
        let url = api
            .upload_async(UploadRequest::new(b"image".to_vec()).with_name("cat.png"))
            .await
            .unwrap();
        assert_eq!(
            url,
            OneOrMany::One("https://api.replicate.com/v1/files/abc".to_string())
        );
    }

    #[tokio::test]
    async fn test_upload_failure_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let api = api_for(&server).await;
        let result = api
            .upload_async(UploadRequest::new(b"image".to_vec()))
            .await;
        assert!(matches!(result, Err(StorageError::UploadError(_))));
    }

    #[tokio::test]
    async fn test_batch_upload_keeps_order() {
        let server = MockServer::start().await;
        for name in ["a.txt", "b.txt", "c.txt"] {
            Mock::given(method("POST"))
                .and(body_string_contains(format!("filename=\"{}\"", name)))
                .respond_with(file_response(&format!("https://cdn/{}", name)))
                .expect(1)
                .mount(&server)
                .await;
        }

        let api = api_for(&server).await;
        let urls = api
            .upload_async(
                UploadRequest::batch(vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()])
                    .with_names(vec![Some("a.txt"), Some("b.txt"), Some("c.txt")]),
            )
            .await
            .unwrap();
        assert_eq!(
            urls,
            OneOrMany::Many(vec![
                "https://cdn/a.txt".to_string(),
                "https://cdn/b.txt".to_string(),
                "https://cdn/c.txt".to_string(),
            ])
        );
    }

    #[tokio::test]
    async fn test_batch_with_one_bad_response_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("filename=\"good\""))
            .respond_with(file_response("https://cdn/good"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("filename=\"bad\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "x" })))
            .mount(&server)
            .await;

        let api = api_for(&server).await;
        let result = api
            .upload_async(
                UploadRequest::batch(vec![b"1".to_vec(), b"2".to_vec()])
                    .with_names(vec![Some("good"), Some("bad")]),
            )
            .await;
        assert!(matches!(result, Err(StorageError::UploadError(_))));
    }

    #[tokio::test]
    async fn test_delete_is_unsupported() {
        let server = MockServer::start().await;
        let api = api_for(&server).await;
        let result = api
            .delete_async(vec!["https://cdn/a", "https://cdn/b"].into())
            .await
            .unwrap();
        assert_eq!(result, OneOrMany::Many(vec![false, false]));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[test]
    fn test_blocking_upload() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let server = runtime.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1/files"))
                .respond_with(file_response("https://cdn/blocking"))
                .expect(1)
                .mount(&server)
                .await;
            server
        });

        let api = ReplicateUploadApi::new("r8_key", Some(&format!("{}/v1/files", server.uri())))
            .unwrap();
        let url = api.upload(UploadRequest::new(b"x".to_vec())).unwrap();
        assert_eq!(url, OneOrMany::One("https://cdn/blocking".to_string()));

        runtime.block_on(async move { server.verify().await });
    }
}
