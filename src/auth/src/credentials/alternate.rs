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

//! Tokens minted by an alternate token-exchange endpoint.
//!
//! Some deployments do not use the default credential chain. Instead, the
//! configuration file names an endpoint (`token-url`) and a request body
//! (`token-body`). The token source sends the body, verbatim, in a `POST`
//! request to the endpoint, and expects a response like:
//!
//! ```json
//! { "accessToken": "ya29.c.abc123", "expireTime": "2026-01-01T12:00:00Z" }
//! ```
//!
//! The endpoint is assumed to be fragile. Refreshes are rate-limited with a
//! token bucket (by default one request every 20 seconds, with bursts of 3),
//! and tokens are cached until they are within 10 seconds of their
//! expiration. At most one refresh is in flight at any time.
//!
//! By default the requests to the endpoint are authenticated with a token
//! from the metadata server.
//!
//! Example usage:
//!
//! ```
//! # use gce_credentials::credentials::alternate::Builder;
//! # use gce_credentials::token::TokenSource;
//! # async fn sample() -> gce_credentials::Result<()> {
//! let source = Builder::new("https://example.com/token", r#"{"audience": "test"}"#)
//!     .without_transport_credentials()
//!     .build();
//! let token = source.token().await?;
//! println!("Token type: {}", token.token_type);
//! # Ok(()) }
//! ```

use crate::Result;
use crate::constants::{BEARER_TOKEN_TYPE, TOKEN_URL_BURST, TOKEN_URL_QPS};
use crate::credentials::mds::Builder as MdsBuilder;
use crate::errors::{self, CredentialsError, TokenDecodeError};
use crate::http::authorization_value;
use crate::throttle::ThrottledTokenSource;
use crate::token::{Token, TokenSource};
use crate::token_cache::TokenCache;
use http::header::AUTHORIZATION;
use std::sync::Arc;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::time::Instant;

/// A [TokenSource] backed by an alternate token-exchange endpoint.
pub struct AlternateTokenSource {
    inner: TokenCache<ThrottledTokenSource<AlternateMinter>>,
}

impl AlternateTokenSource {
    /// The endpoint used to mint tokens.
    pub fn token_url(&self) -> &str {
        &self.minter().url
    }

    /// The body sent to the endpoint.
    pub fn token_body(&self) -> &str {
        &self.minter().body
    }

    fn minter(&self) -> &AlternateMinter {
        self.inner.inner().inner()
    }
}

impl std::fmt::Debug for AlternateTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlternateTokenSource")
            .field("token_url", &self.token_url())
            .field("token_body", &"[censored]")
            .field("transport", &self.minter().transport)
            .finish()
    }
}

#[async_trait::async_trait]
impl TokenSource for AlternateTokenSource {
    async fn token(&self) -> Result<Token> {
        self.inner.token().await
    }
}

/// How the requests to the token endpoint are authenticated.
#[derive(Clone, Debug, Default)]
enum Transport {
    /// With a token from the metadata server.
    #[default]
    MetadataServer,
    /// With a token from a custom source.
    Custom(Arc<dyn TokenSource>),
    /// Not authenticated.
    None,
}

/// Creates [AlternateTokenSource] instances.
#[derive(Debug)]
pub struct Builder {
    url: String,
    body: String,
    qps: f64,
    burst: u32,
    transport: Transport,
    client: Option<reqwest::Client>,
}

impl Builder {
    /// Creates a builder for the given endpoint and request body.
    pub fn new<U, B>(token_url: U, token_body: B) -> Self
    where
        U: Into<String>,
        B: Into<String>,
    {
        Self {
            url: token_url.into(),
            body: token_body.into(),
            qps: TOKEN_URL_QPS,
            burst: TOKEN_URL_BURST,
            transport: Transport::default(),
            client: None,
        }
    }

    /// Changes the rate limit for requests to the token endpoint.
    ///
    /// `qps` is the sustained rate in requests per second, `burst` is the
    /// number of requests allowed before the sustained rate applies. Values
    /// that are not positive are ignored.
    pub fn with_rate_limit(mut self, qps: f64, burst: u32) -> Self {
        if qps.is_finite() && qps > 0.0 && burst > 0 {
            self.qps = qps;
            self.burst = burst;
        } else {
            tracing::warn!(
                "ignoring invalid rate limit for the token endpoint (qps={qps}, burst={burst})"
            );
        }
        self
    }

    /// Authenticates the requests to the token endpoint with tokens from
    /// `source`.
    pub fn with_transport_credentials(mut self, source: Arc<dyn TokenSource>) -> Self {
        self.transport = Transport::Custom(source);
        self
    }

    /// Sends unauthenticated requests to the token endpoint.
    pub fn without_transport_credentials(mut self) -> Self {
        self.transport = Transport::None;
        self
    }

    /// Uses a pre-configured HTTP client for the token endpoint.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Returns an [AlternateTokenSource] with the configured settings.
    ///
    /// No requests are made until a token is needed.
    pub fn build(self) -> AlternateTokenSource {
        let transport: Option<Arc<dyn TokenSource>> = match self.transport {
            Transport::MetadataServer => Some(Arc::new(MdsBuilder::default().build())),
            Transport::Custom(source) => Some(source),
            Transport::None => None,
        };
        let minter = AlternateMinter {
            client: self.client.unwrap_or_default(),
            url: self.url,
            body: self.body,
            transport,
        };
        AlternateTokenSource {
            inner: TokenCache::new(ThrottledTokenSource::new(minter, self.qps, self.burst)),
        }
    }
}

/// Performs the token exchange, one network request per call.
struct AlternateMinter {
    client: reqwest::Client,
    url: String,
    body: String,
    transport: Option<Arc<dyn TokenSource>>,
}

impl std::fmt::Debug for AlternateMinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlternateMinter")
            .field("url", &self.url)
            .field("body", &"[censored]")
            .field("transport", &self.transport)
            .finish()
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlternateTokenResponse {
    access_token: String,
    expire_time: String,
}

#[async_trait::async_trait]
impl TokenSource for AlternateMinter {
    async fn token(&self) -> Result<Token> {
        let mut request = self
            .client
            .post(self.url.as_str())
            .body(self.body.clone());
        if let Some(transport) = &self.transport {
            let token = transport.token().await?;
            request = request.header(AUTHORIZATION, authorization_value(&token)?);
        }

        tracing::debug!("requesting a new token from {}", self.url);
        let response = request
            .send()
            .await
            .map_err(|e| errors::from_http_error(e, &self.url))?;
        if !response.status().is_success() {
            return Err(errors::from_http_response(response, &self.url).await);
        }
        let body = response.bytes().await.map_err(|e| {
            CredentialsError::new(
                true,
                format!("cannot read the token response from {}", self.url),
                e,
            )
        })?;
        let decode_error = |e: BoxError| {
            CredentialsError::from_source(false, TokenDecodeError::new(self.url.as_str(), e))
        };
        let response = serde_json::from_slice::<AlternateTokenResponse>(&body)
            .map_err(|e| decode_error(Box::new(e) as BoxError))?;
        let expire_time = OffsetDateTime::parse(&response.expire_time, &Rfc3339)
            .map_err(|e| decode_error(Box::new(e) as BoxError))?;

        Ok(Token {
            token: response.access_token,
            token_type: BEARER_TOKEN_TYPE.to_string(),
            expires_at: Some(instant_from(expire_time)),
        })
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// Converts a wall-clock expiration to an `Instant`. Times in the past map to
// "now", such tokens are already expired.
fn instant_from(expire_time: OffsetDateTime) -> Instant {
    let remaining = expire_time - OffsetDateTime::now_utc();
    Instant::now() + std::time::Duration::try_from(remaining).unwrap_or_default()
}
