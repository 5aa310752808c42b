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

//! An HTTP client that authenticates every request.

use crate::Result;
use crate::errors::CredentialsError;
use crate::token::{Token, TokenSource};
use http::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{IntoUrl, Method, RequestBuilder};
use std::sync::Arc;

/// Wraps a [reqwest::Client] and attaches a bearer token to each request.
///
/// This is the transport handed to API clients. Cloning the client is cheap,
/// all the clones share the same connection pool and token source.
///
/// # Example
/// ```no_run
/// # use gce_credentials::http::AuthorizedClient;
/// # use gce_credentials::credentials::mds::Builder;
/// # use std::sync::Arc;
/// # async fn sample() -> anyhow::Result<()> {
/// let client = AuthorizedClient::new(Arc::new(Builder::default().build()));
/// let response = client
///     .get("https://compute.googleapis.com/compute/v1/projects/my-project/zones")
///     .await?
///     .send()
///     .await?;
/// # Ok(()) }
/// ```
#[derive(Clone, Debug)]
pub struct AuthorizedClient {
    inner: reqwest::Client,
    source: Arc<dyn TokenSource>,
}

impl AuthorizedClient {
    /// Creates a client with a default [reqwest::Client].
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self::with_client(reqwest::Client::new(), source)
    }

    /// Creates a client using a pre-configured [reqwest::Client].
    pub fn with_client(inner: reqwest::Client, source: Arc<dyn TokenSource>) -> Self {
        Self { inner, source }
    }

    /// The token source used to authenticate requests.
    pub fn token_source(&self) -> &Arc<dyn TokenSource> {
        &self.source
    }

    /// Returns the headers needed to authenticate a request.
    pub async fn headers(&self) -> Result<HeaderMap> {
        let token = self.source.token().await?;
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization_value(&token)?);
        Ok(headers)
    }

    /// Starts an authenticated request.
    ///
    /// Fails if no token can be obtained.
    pub async fn request<U: IntoUrl>(&self, method: Method, url: U) -> Result<RequestBuilder> {
        let headers = self.headers().await?;
        Ok(self.inner.request(method, url).headers(headers))
    }

    /// Starts an authenticated `GET` request.
    pub async fn get<U: IntoUrl>(&self, url: U) -> Result<RequestBuilder> {
        self.request(Method::GET, url).await
    }

    /// Starts an authenticated `POST` request.
    pub async fn post<U: IntoUrl>(&self, url: U) -> Result<RequestBuilder> {
        self.request(Method::POST, url).await
    }
}

/// Formats the `Authorization` header value for `token`.
///
/// The value is marked as sensitive.
pub(crate) fn authorization_value(token: &Token) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("{} {}", token.token_type, token.token))
        .map_err(|e| CredentialsError::new(false, "the token is not a valid header value", e))?;
    value.set_sensitive(true);
    Ok(value)
}
