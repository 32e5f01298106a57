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

//! Shared flow of REST upload services.
//!
//! An upload is a POST to the service's upload endpoint, a provider-specific reading
//! of the response, and an optional completion step (e.g. a PUT to a returned URL).

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::fmt::{Debug, Formatter};
use std::path::Path;
use tracing::{info, warn};

use super::http::{bearer_headers, HttpClientManager};
use crate::media::{MediaFile, MultipartField};
use crate::storage::batch::UploadRequest;
use crate::storage::config::CloudConfig;
use crate::storage::error::StorageResult;
use crate::storage::provider::{Downloaded, OneOrMany};

/// Name of the multipart field carrying the file.
pub const CONTENT_FIELD: &str = "content";

/// Provider-specific parts of a REST upload.
#[async_trait]
pub trait UploadApi: Send + Sync {
    fn api_client(&self) -> &UploadApiClient;

    /// Read the URL out of the response to the upload request.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::UploadError` if the service refused the upload or the
    /// response carries no URL.
    fn process_upload_response(&self, status: StatusCode, body: &str) -> StorageResult<String>;

    /// Validate every response of a batch; the first bad one fails the batch.
    fn process_upload_responses(
        &self,
        responses: Vec<(StatusCode, String)>,
    ) -> StorageResult<Vec<String>> {
        responses
            .into_iter()
            .map(|(status, body)| self.process_upload_response(status, &body))
            .collect()
    }

    /// The multipart body of the upload request, or `None` for an empty POST.
    fn upload_form(&self, file: &MediaFile, name: &str) -> Option<MultipartField> {
        Some(file.to_request_body_form(name))
    }

    /// Second phase of the upload, given the URL from the first.
    fn complete_upload(&self, url: String, _file: &MediaFile) -> StorageResult<String> {
        Ok(url)
    }

    async fn complete_upload_async(&self, url: String, _file: &MediaFile) -> StorageResult<String> {
        Ok(url)
    }
}

/// Credentials, endpoint and HTTP clients of a REST upload service.
pub struct UploadApiClient {
    api_key: String,
    upload_endpoint: String,
    http: HttpClientManager,
}

impl UploadApiClient {
    pub fn new(
        api_key: impl Into<String>,
        upload_endpoint: impl Into<String>,
        http: HttpClientManager,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            upload_endpoint: upload_endpoint.into(),
            http,
        }
    }

    /// Read `api_key` (required) and `upload_endpoint` from the configuration.
    pub fn from_config(config: &CloudConfig, default_endpoint: &str) -> StorageResult<Self> {
        let api_key = config.require_option("api_key")?;
        let upload_endpoint = config
            .get_option("upload_endpoint")
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.as_str())
            .unwrap_or(default_endpoint);
        Ok(Self::new(
            api_key.as_str(),
            upload_endpoint,
            HttpClientManager::from_config(config),
        ))
    }

    pub fn upload_endpoint(&self) -> &str {
        &self.upload_endpoint
    }

    pub fn http(&self) -> &HttpClientManager {
        &self.http
    }

    pub fn auth_headers(&self) -> StorageResult<HeaderMap> {
        bearer_headers(&self.api_key)
    }

    /// POST to the upload endpoint and return status and body.
    pub fn post_upload(&self, form: Option<MultipartField>) -> StorageResult<(StatusCode, String)> {
        let client = self.http.blocking_client()?;
        let mut request = client
            .post(&self.upload_endpoint)
            .headers(self.auth_headers()?);
        if let Some(field) = form {
            let form = reqwest::blocking::multipart::Form::new()
                .part(CONTENT_FIELD, field.into_blocking_part()?);
            request = request.multipart(form);
        }

        let response = request.send()?;
        let status = response.status();
        Ok((status, response.text()?))
    }

    pub async fn post_upload_async(
        &self,
        form: Option<MultipartField>,
    ) -> StorageResult<(StatusCode, String)> {
        let client = self.http.client()?;
        let mut request = client
            .post(&self.upload_endpoint)
            .headers(self.auth_headers()?);
        if let Some(field) = form {
            let form = reqwest::multipart::Form::new().part(CONTENT_FIELD, field.into_part()?);
            request = request.multipart(form);
        }

        let response = request.send().await?;
        let status = response.status();
        Ok((status, response.text().await?))
    }

    /// GET a file with the service credentials.
    pub fn download(&self, url: &str, save_path: Option<&Path>) -> StorageResult<Option<Downloaded>> {
        let client = self.http.blocking_client()?;
        let file = MediaFile::from_url_blocking(&client, url, self.auth_headers()?)?;
        match save_path {
            Some(path) => Ok(Some(Downloaded::Saved(file.save(path)?))),
            None => Ok(Some(Downloaded::File(file))),
        }
    }

    pub async fn download_async(
        &self,
        url: &str,
        save_path: Option<&Path>,
    ) -> StorageResult<Option<Downloaded>> {
        let client = self.http.client()?;
        let file = MediaFile::from_url(&client, url, self.auth_headers()?).await?;
        match save_path {
            Some(path) => Ok(Some(Downloaded::Saved(file.save_async(path).await?))),
            None => Ok(Some(Downloaded::File(file))),
        }
    }
}

impl Debug for UploadApiClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "UploadApiClient(endpoint={}, api_key=***)",
            self.upload_endpoint
        )
    }
}

/// Upload every file of the request, one POST per file.
pub(crate) fn upload<A: UploadApi + ?Sized>(
    api: &A,
    provider: &str,
    request: UploadRequest,
) -> StorageResult<OneOrMany<String>> {
    let batch = request.normalize();
    let client = api.api_client();

    let responses = batch
        .items
        .iter()
        .map(|(file, name)| client.post_upload(api.upload_form(file, name)))
        .collect::<StorageResult<Vec<_>>>()?;
    let urls = api.process_upload_responses(responses)?;
    let urls = batch
        .items
        .iter()
        .zip(urls)
        .map(|((file, _), url)| api.complete_upload(url, file))
        .collect::<StorageResult<Vec<_>>>()?;

    info!("Uploaded count={} files to {}", urls.len(), provider);
    Ok(OneOrMany::collapse(urls))
}

/// Non-blocking [`upload`]; all requests of a phase are in flight together.
pub(crate) async fn upload_async<A: UploadApi + ?Sized>(
    api: &A,
    provider: &str,
    request: UploadRequest,
) -> StorageResult<OneOrMany<String>> {
    let batch = request.normalize();
    let client = api.api_client();

    let responses = try_join_all(
        batch
            .items
            .iter()
            .map(|(file, name)| client.post_upload_async(api.upload_form(file, name))),
    )
    .await?;
    let urls = api.process_upload_responses(responses)?;
    let urls = try_join_all(
        batch
            .items
            .iter()
            .zip(urls)
            .map(|((file, _), url)| api.complete_upload_async(url, file)),
    )
    .await?;

    info!("Uploaded count={} files to {}", urls.len(), provider);
    Ok(OneOrMany::collapse(urls))
}

/// Upload services offer no delete; every URL is reported as not deleted.
pub(crate) fn unsupported_delete(provider: &str, urls: OneOrMany<String>) -> OneOrMany<bool> {
    if urls.is_blank() {
        return OneOrMany::One(false);
    }
    urls.map(|url| {
        warn!("{} does not support deleting files, url={}", provider, url);
        false
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::error::StorageError;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Answers with the response body itself, `bad` bodies are refused.
    struct EchoApi {
        client: UploadApiClient,
    }

    impl UploadApi for EchoApi {
        fn api_client(&self) -> &UploadApiClient {
            &self.client
        }

        fn process_upload_response(&self, status: StatusCode, body: &str) -> StorageResult<String> {
            if !status.is_success() || body == "bad" {
                return Err(StorageError::UploadError(body.to_string()));
            }
            Ok(body.to_string())
        }
    }

    fn echo_api(endpoint: &str) -> EchoApi {
        EchoApi {
            client: UploadApiClient::new("key", endpoint, HttpClientManager::default()),
        }
    }

    #[test]
    fn test_from_config_requires_api_key() {
        match UploadApiClient::from_config(&CloudConfig::replicate(), "https://x") {
            Err(StorageError::ConfigError(msg)) => assert!(msg.contains("api_key")),
            other => panic!("Expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_from_config_endpoint_override() {
        let client = UploadApiClient::from_config(
            &CloudConfig::replicate().with_option("api_key", "k"),
            "https://default",
        )
        .unwrap();
        assert_eq!(client.upload_endpoint(), "https://default");

        let client = UploadApiClient::from_config(
            &CloudConfig::replicate()
                .with_option("api_key", "k")
                .with_option("upload_endpoint", "https://custom"),
            "https://default",
        )
        .unwrap();
        assert_eq!(client.upload_endpoint(), "https://custom");
        assert!(format!("{:?}", client).contains("api_key=***"));
    }

    #[test]
    fn test_process_upload_responses_fails_on_first_bad() {
        let api = echo_api("http://unused");
        let ok = api
            .process_upload_responses(vec![
                (StatusCode::OK, "a".to_string()),
                (StatusCode::OK, "b".to_string()),
            ])
            .unwrap();
        assert_eq!(ok, vec!["a", "b"]);

        let result = api.process_upload_responses(vec![
            (StatusCode::OK, "a".to_string()),
            (StatusCode::OK, "bad".to_string()),
            (StatusCode::INTERNAL_SERVER_ERROR, "c".to_string()),
        ]);
        match result {
            Err(StorageError::UploadError(msg)) => assert_eq!(msg, "bad"),
            other => panic!("Expected UploadError, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_delete_shape() {
        assert_eq!(
            unsupported_delete("replicate", "https://x/a".into()),
            OneOrMany::One(false)
        );
        assert_eq!(
            unsupported_delete("replicate", vec!["https://x/a", "https://x/b"].into()),
            OneOrMany::Many(vec![false, false])
        );
        assert_eq!(
            unsupported_delete("replicate", OneOrMany::Many(vec![])),
            OneOrMany::One(false)
        );
    }

    #[tokio::test]
    async fn test_download_sends_bearer_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/a.txt"))
            .and(header("Authorization", "Bearer key"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let api = echo_api(&server.uri());
        let file = api
            .api_client()
            .download_async(&format!("{}/files/a.txt", server.uri()), None)
            .await
            .unwrap()
            .and_then(Downloaded::into_file)
            .unwrap();
        assert_eq!(file.to_bytes().as_ref(), b"data");
        assert_eq!(file.file_name(), Some("a.txt"));
    }

    #[tokio::test]
    async fn test_download_to_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("a.txt");
        let api = echo_api(&server.uri());
        let result = api
            .api_client()
            .download_async(&format!("{}/a.txt", server.uri()), Some(&target))
            .await
            .unwrap();
        assert_eq!(result, Some(Downloaded::Saved(target.clone())));
        assert_eq!(std::fs::read(&target).unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_download_missing_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let api = echo_api(&server.uri());
        let result = api
            .api_client()
            .download_async(&format!("{}/missing", server.uri()), None)
            .await;
        assert!(matches!(result, Err(StorageError::HttpError(_))));
    }

    #[tokio::test]
    async fn test_upload_async_posts_multipart_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files"))
            .and(header("Authorization", "Bearer key"))
            .respond_with(ResponseTemplate::new(200).set_body_string("https://cdn/a"))
            .expect(1)
            .mount(&server)
            .await;

        let api = echo_api(&format!("{}/files", server.uri()));
        let urls = upload_async(
            &api,
            "echo",
            UploadRequest::new(b"hello".to_vec()).with_name("a.txt"),
        )
        .await
        .unwrap();
        assert_eq!(urls, OneOrMany::One("https://cdn/a".to_string()));

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"content\""));
        assert!(body.contains("filename=\"a.txt\""));
        assert!(body.contains("hello"));
    }
}
