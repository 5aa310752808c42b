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

//! The [Application Default Credentials] chain.
//!
//! The chain itself is provided by the [google-cloud-auth] crate. It looks
//! for credentials in this order:
//!
//! 1. The file named by the `GOOGLE_APPLICATION_CREDENTIALS` environment
//!    variable.
//! 2. The well-known file created by `gcloud auth application-default login`.
//! 3. The metadata server, at the address in `GCE_METADATA_HOST` if set.
//!
//! The chain caches and refreshes its own tokens, [DefaultTokenSource] only
//! adapts them to [TokenSource].
//!
//! [Application Default Credentials]: https://cloud.google.com/docs/authentication/application-default-credentials
//! [google-cloud-auth]: https://docs.rs/google-cloud-auth

use crate::Result;
use crate::build_errors::Error as BuildError;
use crate::constants::{BEARER_TOKEN_TYPE, DEFAULT_SCOPES, GOOGLE_APPLICATION_CREDENTIALS};
use crate::errors::CredentialsError;
use crate::token::{Token, TokenSource};
use google_cloud_auth::credentials::{AccessTokenCredentials, Builder as ChainBuilder};

/// A [TokenSource] backed by the Application Default Credentials chain.
///
/// The chain does not report when its tokens expire, the tokens returned
/// here have no expiration.
pub struct DefaultTokenSource {
    credentials: AccessTokenCredentials,
}

impl DefaultTokenSource {
    /// Runs the chain with the default settings.
    pub fn new() -> std::result::Result<Self, BuildError> {
        Builder::default().build()
    }
}

impl std::fmt::Debug for DefaultTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultTokenSource").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl TokenSource for DefaultTokenSource {
    async fn token(&self) -> Result<Token> {
        let token = self.credentials.access_token().await.map_err(|e| {
            CredentialsError::new(
                e.is_transient(),
                "the default credential chain cannot provide an access token",
                e,
            )
        })?;
        Ok(Token {
            token: token.token,
            token_type: BEARER_TOKEN_TYPE.to_string(),
            expires_at: None,
        })
    }
}

/// Configures the Application Default Credentials chain.
#[derive(Debug, Default)]
pub struct Builder {
    scopes: Option<Vec<String>>,
}

impl Builder {
    /// Sets the scopes requested by the chain.
    ///
    /// The default is the `cloud-platform` and `compute` scopes.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(|s| s.into()).collect());
        self
    }

    /// Runs the chain.
    ///
    /// Fails if a credentials file is found but cannot be used. A missing
    /// metadata server is only detected when a token is requested.
    ///
    /// Must be called from within a tokio runtime, the chain may start
    /// background refresh tasks.
    pub fn build(self) -> std::result::Result<DefaultTokenSource, BuildError> {
        let scopes = self
            .scopes
            .unwrap_or_else(|| DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect());
        let credentials = ChainBuilder::default()
            .with_scopes(scopes)
            .build_access_token_credentials()
            .map_err(|e| match std::env::var_os(GOOGLE_APPLICATION_CREDENTIALS) {
                Some(path) => BuildError::credential_chain(KeyFileError {
                    path: path.to_string_lossy().into_owned(),
                    source: e.into(),
                }),
                None => BuildError::credential_chain(e),
            })?;
        tracing::debug!("using the Application Default Credentials chain");
        Ok(DefaultTokenSource { credentials })
    }
}

#[derive(thiserror::Error, Debug)]
#[error("cannot use the credentials in {path} (set by GOOGLE_APPLICATION_CREDENTIALS): {source}")]
struct KeyFileError {
    path: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{Expectation, Server, matchers::*, responders::*};
    use scoped_env::ScopedEnv;
    use serial_test::serial;
    use std::io::Write;

    type TestResult = anyhow::Result<()>;

    fn write_file(contents: &str) -> anyhow::Result<tempfile::NamedTempFile> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(contents.as_bytes())?;
        Ok(file)
    }

    fn authorized_user() -> serde_json::Value {
        serde_json::json!({
            "type": "authorized_user",
            "client_id": "test-client-id",
            "client_secret": "test-client-secret",
            "refresh_token": "test-refresh-token",
        })
    }

    #[tokio::test]
    #[serial]
    async fn env_var_authorized_user() -> TestResult {
        let file = write_file(&authorized_user().to_string())?;
        let _e = ScopedEnv::set(GOOGLE_APPLICATION_CREDENTIALS, file.path().to_str().unwrap());
        let source = Builder::default().build()?;
        assert!(format!("{source:?}").contains("DefaultTokenSource"));
        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn env_var_missing_file() {
        let _e = ScopedEnv::set(GOOGLE_APPLICATION_CREDENTIALS, "file-does-not-exist.json");
        let err = Builder::default().build().unwrap_err();
        assert!(err.is_credential_chain(), "{err:?}");
        let msg = err.to_string();
        assert!(msg.contains("file-does-not-exist.json"), "{msg}");
        assert!(msg.contains(GOOGLE_APPLICATION_CREDENTIALS), "{msg}");
    }

    #[tokio::test]
    #[serial]
    async fn env_var_malformed_file() -> TestResult {
        for contents in [
            "{}",
            r#"{"type": 42}"#,
            "not-json",
            r#"{"type": "test-only-unknown-type"}"#,
        ] {
            let file = write_file(contents)?;
            let _e = ScopedEnv::set(GOOGLE_APPLICATION_CREDENTIALS, file.path().to_str().unwrap());
            let err = Builder::default().build().unwrap_err();
            assert!(err.is_credential_chain(), "{contents} {err:?}");
        }
        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn well_known_file_is_read() -> TestResult {
        let home = tempfile::tempdir()?;
        let dir = if cfg!(windows) {
            home.path().join("gcloud")
        } else {
            home.path().join(".config").join("gcloud")
        };
        std::fs::create_dir_all(&dir)?;
        // Unusable, so the chain fails instead of falling back to the
        // metadata server.
        std::fs::write(dir.join("application_default_credentials.json"), "{}")?;

        let _e1 = ScopedEnv::remove(GOOGLE_APPLICATION_CREDENTIALS);
        let _e2 = ScopedEnv::set("HOME", home.path().to_str().unwrap());
        let _e3 = ScopedEnv::set("APPDATA", home.path().to_str().unwrap());
        let err = Builder::default().build().unwrap_err();
        assert!(err.is_credential_chain(), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn token_from_metadata_server() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path(
                    "GET",
                    "/computeMetadata/v1/instance/service-accounts/default/token"
                ),
                request::headers(contains(("metadata-flavor", "Google"))),
            ])
            .times(1..)
            .respond_with(json_encoded(serde_json::json!({
                "access_token": "test-mds-token",
                "expires_in": 3600,
                "token_type": "Bearer",
            }))),
        );
        server.expect(
            Expectation::matching(request::path(not(
                "/computeMetadata/v1/instance/service-accounts/default/token"
            )))
            .times(0..)
            .respond_with(status_code(404)),
        );

        let _e1 = ScopedEnv::remove(GOOGLE_APPLICATION_CREDENTIALS);
        let _e2 = ScopedEnv::remove("HOME");
        let _e3 = ScopedEnv::remove("APPDATA");
        let addr = server.addr().to_string();
        let _e4 = ScopedEnv::set("GCE_METADATA_HOST", &addr);
        let source = Builder::default().build()?;
        let token = source.token().await?;
        assert_eq!(token.token, "test-mds-token");
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_at, None);
        Ok(())
    }
}
