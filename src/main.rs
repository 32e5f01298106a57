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

use std::error::Error;
use std::time::SystemTime;
use tracing::info;

use fastcloud::{CloudConfig, FastCloud, FastCloudFactory, MediaFile, ProviderType, UploadRequest};

/// Usage: `fastcloud <azure|s3|replicate|socaity> <file> [container]`
///
/// Credentials are read from the environment, see [`CloudConfig::from_env`].
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(provider), Some(file_path)) = (args.next(), args.next()) else {
        eprintln!("Usage: fastcloud <azure|s3|replicate|socaity> <file> [container]");
        std::process::exit(2);
    };
    let container = args.next();

    let provider: ProviderType = provider.parse()?;
    info!("Starting upload to provider={}", provider.as_str());

    let start_time = SystemTime::now();
    let cloud = FastCloudFactory::from_config(CloudConfig::from_env(provider))?;

    let file = MediaFile::from_path_async(&file_path).await?;
    let name = file.file_name().map(|name| name.to_string());
    let mut request = UploadRequest::new(file);
    if let Some(name) = name {
        request = request.with_name(name);
    }
    if let Some(container) = container {
        request = request.in_container(container);
    }

    let urls = cloud.upload_async(request).await?;
    for url in urls.into_vec() {
        println!("{}", url);
    }
    info!("Upload took duration={:?}", start_time.elapsed()?);

    Ok(())
}
