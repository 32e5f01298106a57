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

//! Storage abstraction layer
//!
//! This module defines the contract every provider implements and the container
//! and bucket backends (Azure Blob Storage, Amazon S3) built on the `object_store`
//! crate. Both backends share one implementation and differ only in how a store
//! for a container is configured.

pub mod azure;
pub mod batch;
pub mod config;
pub mod error;
pub mod factory;
pub mod object_store;
pub mod provider;
pub mod s3;

// Public exports
pub use azure::AzureBlobStorage;
pub use batch::{NormalizedBatch, UploadRequest};
pub use config::{CloudConfig, ProviderType};
pub use error::{StorageError, StorageResult};
pub use factory::{FastCloudFactory, FastCloudProvider};
pub use self::object_store::ObjectStorage;
pub use provider::{CloudStorage, Downloaded, FastCloud, LinkOptions, OneOrMany, TemporaryLink};
pub use s3::S3Storage;
