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

//! Selects the token source for the process.
//!
//! There are two strategies:
//!
//! * **Alternate**: tokens are minted by the endpoint named in the `token-url`
//!   key of the configuration file. See [alternate].
//! * **Default**: tokens come from the [Application Default Credentials]
//!   chain. See [adc].
//!
//! The alternate strategy is used if, and only if, there is a configuration
//! file, its `token-url` is not empty, and its `token-url` is not the literal
//! string `nil`.
//!
//! [Application Default Credentials]: https://cloud.google.com/docs/authentication/application-default-credentials

pub mod adc;
pub mod alternate;
pub mod mds;

use crate::Result;
use crate::build_errors::Error as BuildError;
use crate::config::{ConfigFile, ConfigGlobal};
use crate::constants::{DISABLED_TOKEN_URL, GOOGLE_APPLICATION_CREDENTIALS};
use crate::token::{Token, TokenSource};
use adc::DefaultTokenSource;
use alternate::AlternateTokenSource;
use std::sync::Arc;

/// The token source selected for the process.
///
/// `Credentials` are cheap to clone, all the clones share the same cache and
/// rate limiter.
#[derive(Clone, Debug)]
pub struct Credentials {
    strategy: Strategy,
}

#[derive(Clone, Debug)]
enum Strategy {
    Default(Arc<DefaultTokenSource>),
    Alternate(Arc<AlternateTokenSource>),
}

impl Credentials {
    /// Returns `true` if the tokens come from the default credential chain.
    pub fn is_default(&self) -> bool {
        matches!(self.strategy, Strategy::Default(_))
    }

    /// Returns `true` if the tokens come from an alternate token endpoint.
    pub fn is_alternate(&self) -> bool {
        matches!(self.strategy, Strategy::Alternate(_))
    }

    /// The default chain token source, if that strategy was selected.
    pub fn default_source(&self) -> Option<&DefaultTokenSource> {
        match &self.strategy {
            Strategy::Default(s) => Some(s),
            Strategy::Alternate(_) => None,
        }
    }

    /// The alternate token source, if that strategy was selected.
    pub fn alternate(&self) -> Option<&AlternateTokenSource> {
        match &self.strategy {
            Strategy::Alternate(s) => Some(s),
            Strategy::Default(_) => None,
        }
    }

    /// Returns the selected source as a trait object.
    pub fn token_source(&self) -> Arc<dyn TokenSource> {
        match &self.strategy {
            Strategy::Default(s) => s.clone(),
            Strategy::Alternate(s) => s.clone(),
        }
    }
}

#[async_trait::async_trait]
impl TokenSource for Credentials {
    async fn token(&self) -> Result<Token> {
        match &self.strategy {
            Strategy::Default(s) => s.token().await,
            Strategy::Alternate(s) => s.token().await,
        }
    }
}

#[derive(Clone, Debug, Default)]
enum TransportAuth {
    #[default]
    MetadataServer,
    Custom(Arc<dyn TokenSource>),
    None,
}

/// Creates [Credentials] from the (optional) configuration file.
///
/// # Example
/// ```
/// # use gce_credentials::config::ConfigFile;
/// # use gce_credentials::credentials::Builder;
/// # fn sample() -> anyhow::Result<()> {
/// let config = "[global]\ntoken-url = https://example.com/token\n".parse::<ConfigFile>()?;
/// let credentials = Builder::new(Some(&config)).build()?;
/// assert!(credentials.is_alternate());
/// # Ok(()) }
/// ```
#[derive(Debug, Default)]
pub struct Builder {
    config: Option<ConfigGlobal>,
    scopes: Option<Vec<String>>,
    metadata_endpoint: Option<String>,
    rate_limit: Option<(f64, u32)>,
    transport: TransportAuth,
}

impl Builder {
    /// Creates a builder. A `None` configuration selects the default chain.
    pub fn new(config: Option<&ConfigFile>) -> Self {
        Self::default().with_config(config)
    }

    pub(crate) fn with_config(mut self, config: Option<&ConfigFile>) -> Self {
        self.config = config.map(|c| c.global.clone());
        self
    }

    /// Sets the scopes requested by the default credential chain.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(|s| s.into()).collect());
        self
    }

    /// Sets the metadata server address used to authenticate requests to
    /// the alternate token endpoint.
    ///
    /// The default chain only honors the `GCE_METADATA_HOST` environment
    /// variable.
    pub fn with_metadata_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.metadata_endpoint = Some(endpoint.into());
        self
    }

    /// Changes the rate limit for the alternate token endpoint.
    ///
    /// See [alternate::Builder::with_rate_limit].
    pub fn with_rate_limit(mut self, qps: f64, burst: u32) -> Self {
        self.rate_limit = Some((qps, burst));
        self
    }

    /// Authenticates requests to the alternate token endpoint with tokens
    /// from `source` instead of the metadata server.
    pub fn with_token_exchange_auth(mut self, source: Arc<dyn TokenSource>) -> Self {
        self.transport = TransportAuth::Custom(source);
        self
    }

    /// Sends unauthenticated requests to the alternate token endpoint.
    pub fn without_token_exchange_auth(mut self) -> Self {
        self.transport = TransportAuth::None;
        self
    }

    /// Selects and creates the token source.
    ///
    /// Fails only if the default chain is selected and cannot be initialized.
    /// The default chain must be created from within a tokio runtime.
    pub fn build(self) -> std::result::Result<Credentials, BuildError> {
        if let Some(global) = self.config.as_ref().filter(|g| uses_alternate(g)) {
            return Ok(self.alternate(global));
        }
        self.default_chain()
    }

    fn alternate(&self, global: &ConfigGlobal) -> Credentials {
        let builder = alternate::Builder::new(&global.token_url, &global.token_body);
        let builder = match (&self.transport, &self.metadata_endpoint) {
            (TransportAuth::MetadataServer, None) => builder,
            (TransportAuth::MetadataServer, Some(endpoint)) => builder.with_transport_credentials(
                Arc::new(mds::Builder::default().with_endpoint(endpoint).build()),
            ),
            (TransportAuth::Custom(source), _) => builder.with_transport_credentials(source.clone()),
            (TransportAuth::None, _) => builder.without_transport_credentials(),
        };
        let builder = match self.rate_limit {
            Some((qps, burst)) => builder.with_rate_limit(qps, burst),
            None => builder,
        };
        let source = builder.build();
        tracing::debug!("using alternate token source {source:?}");
        Credentials {
            strategy: Strategy::Alternate(Arc::new(source)),
        }
    }

    fn default_chain(self) -> std::result::Result<Credentials, BuildError> {
        let builder = adc::Builder::default();
        let builder = match self.scopes {
            Some(scopes) => builder.with_scopes(scopes),
            None => builder,
        };
        let source = builder.build();

        // Diagnostics only, the chain does not require the variable.
        match std::env::var_os(GOOGLE_APPLICATION_CREDENTIALS) {
            Some(v) => tracing::debug!(
                "{GOOGLE_APPLICATION_CREDENTIALS} env var set {}",
                v.to_string_lossy()
            ),
            None => tracing::warn!("{GOOGLE_APPLICATION_CREDENTIALS} env var not set"),
        }

        let source = source?;
        tracing::debug!("using default token source {source:?}");
        Ok(Credentials {
            strategy: Strategy::Default(Arc::new(source)),
        })
    }
}

// The literal "nil" disables the alternate source, it is compared exactly.
fn uses_alternate(global: &ConfigGlobal) -> bool {
    !global.token_url.is_empty() && global.token_url != DISABLED_TOKEN_URL
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{Expectation, Server, matchers::*, responders::*};
    use scoped_env::ScopedEnv;
    use serial_test::serial;
    use test_case::test_case;

    type TestResult = anyhow::Result<()>;

    fn config(token_url: &str, token_body: &str) -> ConfigFile {
        ConfigFile {
            global: ConfigGlobal {
                token_url: token_url.into(),
                token_body: token_body.into(),
                ..Default::default()
            },
        }
    }

    #[test_case(""; "empty")]
    #[test_case("nil"; "nil sentinel")]
    #[tokio::test]
    #[serial]
    async fn default_strategy(token_url: &str) -> TestResult {
        // Forces the default chain to select the metadata server.
        let _e1 = ScopedEnv::remove(GOOGLE_APPLICATION_CREDENTIALS);
        let _e2 = ScopedEnv::remove("HOME");
        let _e3 = ScopedEnv::remove("APPDATA");
        let config = config(token_url, "test-only-body");
        let credentials = Builder::new(Some(&config)).build()?;
        assert!(credentials.is_default(), "{credentials:?}");
        assert!(credentials.alternate().is_none(), "{credentials:?}");
        assert!(credentials.default_source().is_some(), "{credentials:?}");
        Ok(())
    }

    #[test_case("https://example.com/token"; "url")]
    #[test_case("NIL"; "sentinel is case sensitive")]
    #[test_case(" nil"; "sentinel is not trimmed")]
    #[test_case("http://127.0.0.1:8080/token"; "local url")]
    fn alternate_strategy(token_url: &str) {
        let config = config(token_url, "test-only-body");
        let credentials = Builder::new(Some(&config))
            .without_token_exchange_auth()
            .build()
            .unwrap();
        assert!(credentials.is_alternate(), "{credentials:?}");
        assert!(credentials.default_source().is_none(), "{credentials:?}");
        let source = credentials.alternate().unwrap();
        assert_eq!(source.token_url(), token_url);
        assert_eq!(source.token_body(), "test-only-body");
    }

    #[test]
    #[serial]
    fn alternate_ignores_adc_errors() -> TestResult {
        // The default chain would fail, but it is never initialized.
        let _e = ScopedEnv::set(GOOGLE_APPLICATION_CREDENTIALS, "file-does-not-exist.json");
        let config = config("https://example.com/token", "");
        let credentials = Builder::new(Some(&config)).build()?;
        assert!(credentials.is_alternate(), "{credentials:?}");
        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn default_chain_error() {
        let _e = ScopedEnv::set(GOOGLE_APPLICATION_CREDENTIALS, "file-does-not-exist.json");
        let err = Builder::new(None).build().unwrap_err();
        assert!(err.is_credential_chain(), "{err:?}");
    }

    #[tokio::test]
    #[serial]
    async fn missing_env_var_is_not_an_error() -> TestResult {
        // Forces the default chain to select the metadata server.
        let _e1 = ScopedEnv::remove(GOOGLE_APPLICATION_CREDENTIALS);
        let _e2 = ScopedEnv::remove("HOME");
        let _e3 = ScopedEnv::remove("APPDATA");
        let credentials = Builder::new(None).build()?;
        assert!(credentials.is_default(), "{credentials:?}");
        Ok(())
    }

    #[tokio::test]
    async fn token_delegates_to_selected_source() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/token")).respond_with(
                json_encoded(serde_json::json!({
                    "accessToken": "test-access-token",
                    "expireTime": "2999-01-01T00:00:00Z",
                })),
            ),
        );

        let config = config(&server.url_str("/token"), "test-only-body");
        let credentials = Builder::new(Some(&config))
            .without_token_exchange_auth()
            .build()?;
        let token = credentials.token().await?;
        assert_eq!(token.token, "test-access-token");
        let token = credentials.token_source().token().await?;
        assert_eq!(token.token, "test-access-token");
        Ok(())
    }
}
