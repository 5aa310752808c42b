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

//! Tokens from the [Metadata Service].
//!
//! Compute Engine instances, and GKE nodes, can obtain access tokens for
//! the [default service account] of the instance from the metadata server.
//! No secrets need to be downloaded or configured.
//!
//! These tokens authenticate the requests to alternate token endpoints.
//!
//! Example usage:
//!
//! ```
//! # use gce_credentials::credentials::mds::Builder;
//! # use gce_credentials::token::TokenSource;
//! # async fn sample() -> gce_credentials::Result<()> {
//! let source = Builder::default()
//!     .with_scopes(["https://www.googleapis.com/auth/cloud-platform"])
//!     .build();
//! let token = source.token().await?;
//! println!("Token type: {}", token.token_type);
//! # Ok(()) }
//! ```
//!
//! [default service account]: https://cloud.google.com/iam/docs/service-account-types#default
//! [Metadata Service]: https://cloud.google.com/compute/docs/metadata/overview

use crate::Result;
use crate::mds::client::Client as MDSClient;
use crate::token::{Token, TokenSource};
use crate::token_cache::TokenCache;

/// A [TokenSource] backed by the metadata server.
///
/// Tokens are cached until they are close to their expiration.
#[derive(Debug)]
pub struct MdsTokenSource {
    inner: TokenCache<MdsAccessTokenSource>,
}

#[async_trait::async_trait]
impl TokenSource for MdsTokenSource {
    async fn token(&self) -> Result<Token> {
        self.inner.token().await
    }
}

impl MdsTokenSource {
    /// The metadata server address used by this source.
    pub fn endpoint(&self) -> &str {
        self.inner.inner().client.endpoint()
    }
}

/// Creates [MdsTokenSource] instances.
#[derive(Debug, Default)]
pub struct Builder {
    endpoint: Option<String>,
    scopes: Option<Vec<String>>,
}

impl Builder {
    /// Sets the metadata server address.
    ///
    /// If not set, the source uses `http://metadata.google.internal`. The
    /// `GCE_METADATA_HOST` environment variable takes precedence over this
    /// setting.
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the [scopes] for the access tokens.
    ///
    /// If not set, the metadata server uses the scopes of the instance.
    ///
    /// [scopes]: https://developers.google.com/identity/protocols/oauth2/scopes
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(|s| s.into()).collect());
        self
    }

    /// Returns a [MdsTokenSource] with the configured settings.
    ///
    /// Creating the source makes no requests, the metadata server is only
    /// contacted when a token is needed.
    pub fn build(self) -> MdsTokenSource {
        let source = MdsAccessTokenSource {
            client: MDSClient::new(self.endpoint),
            scopes: self.scopes.unwrap_or_default(),
        };
        MdsTokenSource {
            inner: TokenCache::new(source),
        }
    }
}

#[derive(Debug)]
struct MdsAccessTokenSource {
    client: MDSClient,
    scopes: Vec<String>,
}

#[async_trait::async_trait]
impl TokenSource for MdsAccessTokenSource {
    async fn token(&self) -> Result<Token> {
        self.client.access_token(&self.scopes).await
    }
}
