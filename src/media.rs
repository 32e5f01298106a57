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

//! In-memory file value shared by every provider.
//!
//! A [`MediaFile`] is built from raw bytes, a local path or a remote URL and can be
//! turned back into bytes, a multipart part, or written to disk.

use bytes::Bytes;
use reqwest::header::HeaderMap;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};

use crate::storage::error::StorageResult;

/// Content type used when nothing more specific is known.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Canonical in-memory representation of a file.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaFile {
    content: Bytes,
    file_name: Option<String>,
    content_type: Option<String>,
}

/// The pieces needed to send a file as one multipart field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartField {
    pub file_name: String,
    pub content_type: String,
    pub content: Bytes,
}

impl MediaFile {
    pub fn from_bytes(content: impl Into<Bytes>) -> Self {
        Self {
            content: content.into(),
            file_name: None,
            content_type: None,
        }
    }

    /// Read a file from the local filesystem. The file name is taken from the path.
    pub fn from_path(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read(path)?;
        Ok(Self::from_bytes(content).with_file_name_from_path(path))
    }

    pub async fn from_path_async(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read(path).await?;
        Ok(Self::from_bytes(content).with_file_name_from_path(path))
    }

    /// Fetch a file over HTTP. Non-success status codes are errors.
    pub async fn from_url(
        client: &reqwest::Client,
        url: &str,
        headers: HeaderMap,
    ) -> StorageResult<Self> {
        let response = client
            .get(url)
            .headers(headers)
            .send()
            .await?
            .error_for_status()?;
        let content_type = content_type_of(response.headers());
        let content = response.bytes().await?;

        Ok(Self {
            content,
            file_name: file_name_from_url(url),
            content_type,
        })
    }

    pub fn from_url_blocking(
        client: &reqwest::blocking::Client,
        url: &str,
        headers: HeaderMap,
    ) -> StorageResult<Self> {
        let response = client.get(url).headers(headers).send()?.error_for_status()?;
        let content_type = content_type_of(response.headers());
        let content = response.bytes()?;

        Ok(Self {
            content,
            file_name: file_name_from_url(url),
            content_type,
        })
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    fn with_file_name_from_path(mut self, path: &Path) -> Self {
        self.file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string());
        self
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn content_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE)
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Cheap clone of the underlying buffer.
    pub fn to_bytes(&self) -> Bytes {
        self.content.clone()
    }

    /// Describe the file as a multipart field. `fallback_name` is used when the file has no name.
    pub fn to_request_body_form(&self, fallback_name: &str) -> MultipartField {
        MultipartField {
            file_name: self
                .file_name
                .clone()
                .unwrap_or_else(|| fallback_name.to_string()),
            content_type: self.content_type().to_string(),
            content: self.to_bytes(),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> StorageResult<PathBuf> {
        let path = path.as_ref();
        std::fs::write(path, &self.content)?;
        Ok(path.to_path_buf())
    }

    pub async fn save_async(&self, path: impl AsRef<Path>) -> StorageResult<PathBuf> {
        let path = path.as_ref();
        tokio::fs::write(path, &self.content).await?;
        Ok(path.to_path_buf())
    }
}

impl MultipartField {
    pub fn into_part(self) -> StorageResult<reqwest::multipart::Part> {
        let part = reqwest::multipart::Part::bytes(self.content.to_vec())
            .file_name(self.file_name)
            .mime_str(&self.content_type)?;
        Ok(part)
    }

    pub fn into_blocking_part(self) -> StorageResult<reqwest::blocking::multipart::Part> {
        let part = reqwest::blocking::multipart::Part::bytes(self.content.to_vec())
            .file_name(self.file_name)
            .mime_str(&self.content_type)?;
        Ok(part)
    }
}

impl From<Vec<u8>> for MediaFile {
    fn from(content: Vec<u8>) -> Self {
        Self::from_bytes(content)
    }
}

impl From<Bytes> for MediaFile {
    fn from(content: Bytes) -> Self {
        Self::from_bytes(content)
    }
}

impl From<&'static [u8]> for MediaFile {
    fn from(content: &'static [u8]) -> Self {
        Self::from_bytes(Bytes::from_static(content))
    }
}

impl<const N: usize> From<&'static [u8; N]> for MediaFile {
    fn from(content: &'static [u8; N]) -> Self {
        Self::from_bytes(Bytes::from_static(content))
    }
}

impl Debug for MediaFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MediaFile(file_name={:?}, content_type={}, size={})",
            self.file_name,
            self.content_type(),
            self.content.len()
        )
    }
}

fn content_type_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

fn file_name_from_url(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()?
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(|segment| segment.to_string())
}
