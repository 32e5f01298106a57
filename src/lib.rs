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

//! # fastcloud
//!
//! One interface for putting files into the cloud and getting them back out.
//!
//! fastcloud hides the differences between container storage (Azure Blob Storage),
//! bucket storage (Amazon S3 and compatible services) and REST upload services
//! (Replicate, Socaity) behind the [`FastCloud`] contract. Every operation comes in a
//! blocking and a non-blocking form.
//!
//! ## Features
//!
//! - **Upload**: one file or a batch, with optional names; unnamed files get a UUID
//! - **Download**: into memory or to a path
//! - **Delete**: one or many URLs, answered per URL
//! - **Temporary upload links**: signed, write-only URLs for direct uploads
//!
//! ## Quick Start
//!
//! ### Azure Blob Storage Example
//!
//! ```rust,no_run
//! use fastcloud::{CloudConfig, FastCloud, FastCloudFactory, UploadRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let config = CloudConfig::azure()
//!     .with_option("connection_string", "DefaultEndpointsProtocol=https;AccountName=...;AccountKey=...");
//!
//! let cloud = FastCloudFactory::from_config(config)?;
//! let url = cloud
//!     .upload_async(UploadRequest::new(b"hello".to_vec()).with_name("greeting.txt").in_container("docs"))
//!     .await?;
//! println!("{:?}", url);
//! # Ok(())
//! # }
//! ```
//!
//! ### Temporary Upload Link Example
//!
//! ```rust,no_run
//! use fastcloud::{CloudConfig, CloudStorage, LinkOptions, S3Storage};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let storage = S3Storage::from_config(
//!     CloudConfig::s3()
//!         .with_option("bucket", "my-bucket")
//!         .with_option("access_key_id", "ACCESS_KEY")
//!         .with_option("secret_access_key", "SECRET_KEY"),
//! )?;
//!
//! if let Some(link) = storage
//!     .create_temporary_upload_link_async(&LinkOptions::default().with_container("my-bucket"))
//!     .await
//! {
//!     println!("PUT to {} before {}", link.url, link.expiry);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`storage`] - Storage contract and the container/bucket backends
//! - [`api`] - REST upload services
//! - [`media`] - The file value passed in and out of every provider

pub mod api;
pub mod media;
pub mod storage;

// Re-export commonly used types
pub use api::{ReplicateUploadApi, SocaityUploadApi};
pub use media::MediaFile;
pub use storage::{
    AzureBlobStorage, CloudConfig, CloudStorage, Downloaded, FastCloud, FastCloudFactory,
    FastCloudProvider, LinkOptions, OneOrMany, ProviderType, S3Storage, StorageError,
    StorageResult, TemporaryLink, UploadRequest,
};
