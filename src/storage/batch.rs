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

//! Upload requests and their normalization into `(file, name)` pairs.

use uuid::Uuid;

use super::provider::OneOrMany;
use crate::media::MediaFile;

/// One or many files to upload, with optional names and an optional container.
///
/// # Examples
///
/// ```
/// use fastcloud::UploadRequest;
///
/// let single = UploadRequest::new(b"hello".to_vec())
///     .with_name("greeting.txt")
///     .in_container("docs");
///
/// let batch = UploadRequest::batch(vec![b"a".to_vec(), b"b".to_vec()])
///     .with_names(vec![None, Some("b.txt")]);
/// ```
#[derive(Debug, Clone)]
pub struct UploadRequest {
    files: OneOrMany<MediaFile>,
    names: Option<OneOrMany<Option<String>>>,
    container: Option<String>,
}

/// An upload request after normalization.
///
/// `items` holds exactly one name per file, in input order.
#[derive(Debug, Clone)]
pub struct NormalizedBatch {
    pub items: Vec<(MediaFile, String)>,
    pub container: Option<String>,
}

impl UploadRequest {
    pub fn new(file: impl Into<MediaFile>) -> Self {
        Self {
            files: OneOrMany::One(file.into()),
            names: None,
            container: None,
        }
    }

    /// A request for several files. The result of the upload is always a list,
    /// unless exactly one file was given.
    pub fn batch<I, F>(files: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<MediaFile>,
    {
        Self {
            files: OneOrMany::Many(files.into_iter().map(Into::into).collect()),
            names: None,
            container: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names = Some(OneOrMany::One(Some(name.into())));
        self
    }

    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        self.names = Some(OneOrMany::Many(
            names.into_iter().map(|name| name.map(Into::into)).collect(),
        ));
        self
    }

    pub fn in_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    pub fn container(&self) -> Option<&str> {
        self.container.as_deref()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Align names with files.
    ///
    /// Absent or blank names are replaced by fresh UUIDs, a shorter name list is
    /// padded with fresh UUIDs and surplus names are dropped.
    pub fn normalize(self) -> NormalizedBatch {
        let files = self.files.into_vec();
        let mut names: Vec<String> = self
            .names
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .into_iter()
            .map(|name| match name {
                Some(name) if !name.trim().is_empty() => name,
                _ => generate_name(),
            })
            .collect();

        names.truncate(files.len());
        while names.len() < files.len() {
            names.push(generate_name());
        }

        NormalizedBatch {
            items: files.into_iter().zip(names).collect(),
            container: self.container,
        }
    }
}

impl NormalizedBatch {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|(_, name)| name.as_str())
    }
}

/// A fresh object name.
pub fn generate_name() -> String {
    Uuid::new_v4().to_string()
}
