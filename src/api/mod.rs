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

//! REST upload services
//!
//! Services that accept files over HTTP and answer with a URL. They support upload
//! and download only.

pub mod http;
pub mod replicate;
pub mod socaity;
pub mod upload_api;

pub use http::HttpClientManager;
pub use replicate::ReplicateUploadApi;
pub use socaity::SocaityUploadApi;
pub use upload_api::{UploadApi, UploadApiClient};
