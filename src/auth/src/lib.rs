// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bearer credentials for agents calling Compute Engine style APIs.
//!
//! Every outbound call made by the agent carries an OAuth2 access token. This
//! crate decides how those tokens are minted, caches and rate-limits the
//! refreshes, and proves that a token is obtainable before any API client is
//! constructed.
//!
//! The typical startup sequence is:
//!
//! 1. Read the (optional) cloud provider configuration file.
//! 2. Select a token source: the [Application Default Credentials] chain, or
//!    an alternate token-exchange endpoint configured in the file.
//! 3. Resolve the project and zone, preferring the configuration file over
//!    the instance metadata.
//! 4. Warm up the token source, then hand an authorized HTTP client to the
//!    API clients.
//!
//! ```no_run
//! # use gce_credentials::metadata::MetadataServer;
//! # use gce_credentials::provider::AuthConfig;
//! # async fn sample() -> anyhow::Result<()> {
//! let metadata = MetadataServer::new().await?;
//! let config = AuthConfig::builder(metadata)
//!     .with_config_path("/etc/gce.conf")
//!     .build()?;
//! let client = config.authorized_client().await?;
//! let response = client
//!     .get(format!(
//!         "https://compute.googleapis.com/compute/v1/projects/{}/zones/{}/disks",
//!         config.project(),
//!         config.zone()
//!     ))
//!     .await?
//!     .send()
//!     .await?;
//! println!("{}", response.status());
//! # Ok(()) }
//! ```
//!
//! [Application Default Credentials]: https://cloud.google.com/docs/authentication/application-default-credentials

pub mod build_errors;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod http;
pub mod metadata;
pub mod provider;
pub mod token;
pub mod warmup;

pub(crate) mod constants;
pub(crate) mod mds;
pub(crate) mod throttle;
pub(crate) mod token_cache;

/// A `Result` alias where the `Err` case is [errors::CredentialsError].
pub type Result<T> = std::result::Result<T, crate::errors::CredentialsError>;
