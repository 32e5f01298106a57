// Copyright 2022 Adobe. All rights reserved.
// This file is licensed to you under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License. You may obtain a copy
// of the License at http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under
// the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR REPRESENTATIONS
// OF ANY KIND, either express or implied. See the License for the specific language
// governing permissions and limitations under the License.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

use super::batch::UploadRequest;
use super::error::StorageResult;
use crate::media::MediaFile;

/// Default lifetime of a temporary upload link, in minutes.
pub const DEFAULT_LINK_TIME_LIMIT_MINUTES: u32 = 20;

/// Default container a temporary upload link points into.
pub const DEFAULT_LINK_CONTAINER: &str = "upload";

/// A single value or an ordered list of values.
///
/// Operations hand back the same shape they were given: a single item in gives a
/// single result out, several items give a list in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Collapse a list into `One` when it holds exactly one element.
    pub fn collapse(mut items: Vec<T>) -> Self {
        if items.len() == 1 {
            Self::One(items.remove(0))
        } else {
            Self::Many(items)
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The single value, if this is `One`.
    pub fn one(self) -> Option<T> {
        match self {
            Self::One(item) => Some(item),
            Self::Many(_) => None,
        }
    }

    /// The list of values, if this is `Many`.
    pub fn many(self) -> Option<Vec<T>> {
        match self {
            Self::One(_) => None,
            Self::Many(items) => Some(items),
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> OneOrMany<U> {
        match self {
            Self::One(item) => OneOrMany::One(f(item)),
            Self::Many(items) => OneOrMany::Many(items.into_iter().map(f).collect()),
        }
    }
}

impl From<&str> for OneOrMany<String> {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<String> for OneOrMany<String> {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

impl From<Vec<String>> for OneOrMany<String> {
    fn from(values: Vec<String>) -> Self {
        Self::Many(values)
    }
}

impl From<Vec<&str>> for OneOrMany<String> {
    fn from(values: Vec<&str>) -> Self {
        Self::Many(values.into_iter().map(|v| v.to_string()).collect())
    }
}

impl OneOrMany<String> {
    /// True for an empty list or a blank single URL.
    pub(crate) fn is_blank(&self) -> bool {
        match self {
            Self::One(value) => value.trim().is_empty(),
            Self::Many(values) => values.is_empty(),
        }
    }
}

/// Result of a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Downloaded {
    /// The file was loaded into memory.
    File(MediaFile),
    /// The file was written to the given path.
    Saved(PathBuf),
}

impl Downloaded {
    pub fn into_file(self) -> Option<MediaFile> {
        match self {
            Self::File(file) => Some(file),
            Self::Saved(_) => None,
        }
    }
}

/// A signed URL permitting a direct write until `expiry`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporaryLink {
    pub url: String,
    pub expiry: DateTime<Utc>,
}

/// Parameters for [`CloudStorage::create_temporary_upload_link`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOptions {
    /// How long the link stays valid, in minutes.
    pub time_limit_minutes: u32,
    pub container: String,
    /// Object name; a UUID is generated when absent.
    pub name: Option<String>,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            time_limit_minutes: DEFAULT_LINK_TIME_LIMIT_MINUTES,
            container: DEFAULT_LINK_CONTAINER.to_string(),
            name: None,
        }
    }
}

impl LinkOptions {
    pub fn with_time_limit(mut self, minutes: u32) -> Self {
        self.time_limit_minutes = minutes;
        self
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = container.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Common contract of every provider
///
/// Each operation comes in a blocking and an `_async` form with identical semantics.
/// The blocking forms must not be called from within an async runtime.
#[async_trait]
pub trait FastCloud: Send + Sync {
    /// Short provider name used in logs.
    fn provider_name(&self) -> &'static str;

    /// Upload one or many files.
    ///
    /// # Arguments
    ///
    /// * `request` - The files, optional names and optional container
    ///
    /// # Returns
    ///
    /// A `Result` containing:
    /// * `Ok(OneOrMany::One(url))` - If exactly one file was uploaded
    /// * `Ok(OneOrMany::Many(urls))` - Otherwise, in input order
    /// * `Err(StorageError)` - If the upload could not be guaranteed
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// * A container/bucket backend gets no container and has no default
    /// * The backend rejects any of the uploads
    fn upload(&self, request: UploadRequest) -> StorageResult<OneOrMany<String>>;

    /// Non-blocking form of [`FastCloud::upload`]. All items of a batch are in flight
    /// at the same time; the first failure fails the whole call.
    async fn upload_async(&self, request: UploadRequest) -> StorageResult<OneOrMany<String>>;

    /// Download a file.
    ///
    /// # Arguments
    ///
    /// * `url` - URL of the file
    /// * `save_path` - Where to write the file; it is returned in memory when `None`
    ///
    /// # Returns
    ///
    /// A `Result` containing:
    /// * `Ok(Some(Downloaded))` - The file or the path it was saved to
    /// * `Ok(None)` - The file does not exist on a storage backend
    /// * `Err(StorageError)` - Any other failure
    fn download(&self, url: &str, save_path: Option<&Path>) -> StorageResult<Option<Downloaded>>;

    async fn download_async(
        &self,
        url: &str,
        save_path: Option<&Path>,
    ) -> StorageResult<Option<Downloaded>>;

    /// Delete one or many files.
    ///
    /// Missing files and backend failures are logged and reported as `false`.
    /// Empty input returns `false` without contacting the backend.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::ForeignUrl` when a URL does not belong to the configured account.
    fn delete(&self, urls: OneOrMany<String>) -> StorageResult<OneOrMany<bool>>;

    async fn delete_async(&self, urls: OneOrMany<String>) -> StorageResult<OneOrMany<bool>>;
}

/// Storage backends that can also hand out signed upload links.
#[async_trait]
pub trait CloudStorage: FastCloud {
    /// Create a signed URL that allows a direct write for `options.time_limit_minutes`.
    ///
    /// Returns `None` (and logs) when the link cannot be signed, e.g. because the
    /// configured credential cannot sign or the backend refuses.
    fn create_temporary_upload_link(&self, options: &LinkOptions) -> Option<TemporaryLink>;

    async fn create_temporary_upload_link_async(
        &self,
        options: &LinkOptions,
    ) -> Option<TemporaryLink>;
}

impl Debug for dyn FastCloud {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "FastCloud(provider={})", self.provider_name())
    }
}
