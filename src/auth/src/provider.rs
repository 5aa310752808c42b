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

//! Resolves the credentials, project and zone used by the process.

use crate::build_errors::Error as BuildError;
use crate::config::{ConfigFile, project_and_zone, read_config};
use crate::credentials::{self, Credentials};
use crate::http::AuthorizedClient;
use crate::metadata::MetadataService;
use crate::token::TokenSource;
use crate::warmup::Warmup;
use std::path::PathBuf;
use std::sync::Arc;

/// The credentials, project and zone for the process.
///
/// An `AuthConfig` is created once, at startup, and never changes. The token
/// source it holds refreshes its tokens as needed.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    credentials: Credentials,
    project: String,
    zone: String,
    warmup: Warmup,
}

impl AuthConfig {
    /// Returns a builder that falls back to `metadata` for the project and
    /// zone.
    pub fn builder<M>(metadata: M) -> Builder
    where
        M: MetadataService + 'static,
    {
        Builder::new(Arc::new(metadata))
    }

    /// The selected credentials.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn token_source(&self) -> Arc<dyn TokenSource> {
        self.credentials.token_source()
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Waits for an initial token, then returns a client authorized with
    /// these credentials.
    ///
    /// Fails with [BuildError::is_warmup_timeout] if no token is obtained
    /// within the warmup window.
    pub async fn authorized_client(&self) -> Result<AuthorizedClient, BuildError> {
        self.warmup.run(&self.credentials).await?;
        Ok(AuthorizedClient::new(self.token_source()))
    }
}

/// Creates an [AuthConfig].
///
/// # Example
/// ```
/// # use gce_credentials::metadata::StaticMetadataService;
/// # use gce_credentials::provider::AuthConfig;
/// # fn sample() -> anyhow::Result<()> {
/// let metadata = StaticMetadataService::default()
///     .with_project("my-project")
///     .with_zone("us-central1-a");
/// let config = AuthConfig::builder(metadata)
///     .with_config_path("/etc/gce.conf")
///     .build()?;
/// println!("project={} zone={}", config.project(), config.zone());
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct Builder {
    metadata: Arc<dyn MetadataService>,
    config_path: Option<PathBuf>,
    config: Option<ConfigFile>,
    credentials: credentials::Builder,
    warmup: Warmup,
}

impl Builder {
    fn new(metadata: Arc<dyn MetadataService>) -> Self {
        Self {
            metadata,
            config_path: None,
            config: None,
            credentials: credentials::Builder::default(),
            warmup: Warmup::default(),
        }
    }

    /// Reads the configuration file at `path`.
    ///
    /// An empty path is the same as no configuration file.
    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Uses an already parsed configuration file.
    ///
    /// This takes precedence over [with_config_path][Builder::with_config_path].
    pub fn with_config(mut self, config: ConfigFile) -> Self {
        self.config = Some(config);
        self
    }

    /// See [credentials::Builder::with_scopes].
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.credentials = self.credentials.with_scopes(scopes);
        self
    }

    /// See [credentials::Builder::with_metadata_endpoint].
    pub fn with_metadata_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.credentials = self.credentials.with_metadata_endpoint(endpoint);
        self
    }

    /// See [credentials::Builder::with_rate_limit].
    pub fn with_rate_limit(mut self, qps: f64, burst: u32) -> Self {
        self.credentials = self.credentials.with_rate_limit(qps, burst);
        self
    }

    /// See [credentials::Builder::with_token_exchange_auth].
    pub fn with_token_exchange_auth(mut self, source: Arc<dyn TokenSource>) -> Self {
        self.credentials = self.credentials.with_token_exchange_auth(source);
        self
    }

    /// See [credentials::Builder::without_token_exchange_auth].
    pub fn without_token_exchange_auth(mut self) -> Self {
        self.credentials = self.credentials.without_token_exchange_auth();
        self
    }

    /// Changes the warmup used by [AuthConfig::authorized_client].
    pub fn with_warmup(mut self, warmup: Warmup) -> Self {
        self.warmup = warmup;
        self
    }

    /// Reads the configuration, selects the credentials and resolves the
    /// project and zone.
    ///
    /// No tokens are requested.
    pub fn build(self) -> Result<AuthConfig, BuildError> {
        let config = match self.config {
            Some(c) => Some(c),
            None => read_config(self.config_path.as_ref())?,
        };
        let credentials = self.credentials.with_config(config.as_ref()).build()?;
        let (project, zone) = project_and_zone(config.as_ref(), self.metadata.as_ref());
        Ok(AuthConfig {
            credentials,
            project,
            zone,
            warmup: self.warmup,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::GOOGLE_APPLICATION_CREDENTIALS;
    use crate::metadata::testing::{FAKE_PROJECT, FAKE_ZONE, fake};
    use httptest::{Expectation, Server, matchers::*, responders::*};
    use scoped_env::ScopedEnv;
    use serde_json::json;
    use serial_test::{parallel, serial};
    use std::io::Write;
    use std::time::Duration;
    use time::OffsetDateTime;
    use time::format_description::well_known::Rfc3339;

    type TestResult = anyhow::Result<()>;

    fn write_config(contents: &str) -> anyhow::Result<tempfile::NamedTempFile> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(contents.as_bytes())?;
        Ok(file)
    }

    #[tokio::test]
    #[serial]
    async fn empty_config_uses_metadata_and_default() -> TestResult {
        let _e1 = ScopedEnv::remove(GOOGLE_APPLICATION_CREDENTIALS);
        let _e2 = ScopedEnv::remove("HOME");
        let _e3 = ScopedEnv::remove("APPDATA");

        let file = write_config("[global]\ntoken-url =\nzone =\nproject-id =\n")?;
        let config = AuthConfig::builder(fake())
            .with_config_path(file.path())
            .build()?;
        assert_eq!(config.project(), FAKE_PROJECT);
        assert_eq!(config.zone(), FAKE_ZONE);
        assert!(config.credentials().is_default(), "{config:?}");
        Ok(())
    }

    #[test]
    #[parallel]
    fn config_zone_and_alternate() -> TestResult {
        let file = write_config(
            r#"
[global]
token-url = https://example/token
token-body = body
zone = us-east1-b
"#,
        )?;
        let config = AuthConfig::builder(fake())
            .with_config_path(file.path())
            .build()?;
        assert_eq!(config.zone(), "us-east1-b");
        assert_eq!(config.project(), FAKE_PROJECT);
        let alternate = config.credentials().alternate();
        assert_eq!(
            alternate.map(|a| a.token_url()),
            Some("https://example/token"),
            "{config:?}"
        );
        assert_eq!(alternate.map(|a| a.token_body()), Some("body"));
        Ok(())
    }

    #[test]
    #[parallel]
    fn parsed_config() -> TestResult {
        let parsed = "[global]\ntoken-url = https://example/token\nproject-id = p\nzone = z\n"
            .parse::<ConfigFile>()?;
        let config = AuthConfig::builder(fake())
            .with_config_path("ignored-when-a-config-is-given.conf")
            .with_config(parsed)
            .build()?;
        assert_eq!(config.project(), "p");
        assert_eq!(config.zone(), "z");
        assert!(config.credentials().is_alternate(), "{config:?}");
        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn no_config_uses_metadata_and_default() -> TestResult {
        let _e1 = ScopedEnv::remove(GOOGLE_APPLICATION_CREDENTIALS);
        let _e2 = ScopedEnv::remove("HOME");
        let _e3 = ScopedEnv::remove("APPDATA");

        let config = AuthConfig::builder(fake()).build()?;
        assert_eq!(config.project(), FAKE_PROJECT);
        assert_eq!(config.zone(), FAKE_ZONE);
        assert!(config.credentials().is_default(), "{config:?}");
        Ok(())
    }

    #[test]
    #[parallel]
    fn missing_config_file() {
        let err = AuthConfig::builder(fake())
            .with_config_path("/this/file/does/not/exist.conf")
            .build()
            .unwrap_err();
        assert!(err.is_config_read(), "{err:?}");
        assert!(err.to_string().contains("exist.conf"), "{err}");
    }

    #[test]
    #[parallel]
    fn malformed_config_file() -> TestResult {
        let file = write_config("[global\ntoken-url = x\n")?;
        let err = AuthConfig::builder(fake())
            .with_config_path(file.path())
            .build()
            .unwrap_err();
        assert!(err.is_config_read(), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn credential_chain_error() {
        let _e = ScopedEnv::set(GOOGLE_APPLICATION_CREDENTIALS, "file-does-not-exist.json");
        let err = AuthConfig::builder(fake()).build().unwrap_err();
        assert!(err.is_credential_chain(), "{err:?}");
    }

    fn alternate_config(server: &Server) -> ConfigFile {
        let mut config = ConfigFile::default();
        config.global.token_url = server.url_str("/token");
        config.global.token_body = r#"{"audience":"test"}"#.to_string();
        config
    }

    #[tokio::test]
    #[parallel]
    async fn authorized_client() -> TestResult {
        let expire_time = (OffsetDateTime::now_utc() + Duration::from_secs(3600)).format(&Rfc3339)?;
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/token"),
                request::body(r#"{"audience":"test"}"#),
            ])
            .times(1)
            .respond_with(json_encoded(json!({
                "accessToken": "test-access-token",
                "expireTime": expire_time,
            }))),
        );
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/compute/v1/projects/test-project/zones"),
                request::headers(contains(("authorization", "Bearer test-access-token"))),
            ])
            .times(1)
            .respond_with(status_code(200)),
        );

        let config = AuthConfig::builder(fake())
            .with_config(alternate_config(&server))
            .without_token_exchange_auth()
            .build()?;
        let client = config.authorized_client().await?;
        let response = client
            .get(server.url_str(&format!(
                "/compute/v1/projects/{}/zones",
                config.project()
            )))
            .await?
            .send()
            .await?;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    #[parallel]
    async fn authorized_client_warmup_timeout() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/token"))
                .times(1..)
                .respond_with(status_code(403).body("test-only-permission-denied")),
        );

        let config = AuthConfig::builder(fake())
            .with_config(alternate_config(&server))
            .without_token_exchange_auth()
            .with_rate_limit(100.0, 10)
            .with_warmup(
                Warmup::default()
                    .with_interval(Duration::from_millis(20))
                    .with_window(Duration::from_millis(200)),
            )
            .build()?;
        let err = config.authorized_client().await.unwrap_err();
        assert!(err.is_warmup_timeout(), "{err:?}");
        assert!(err.to_string().contains("403"), "{err}");
        Ok(())
    }
}
