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

use crate::errors::{self, CredentialsError, TokenDecodeError};
use crate::token::Token;
use reqwest::{Client as ReqwestClient, RequestBuilder};
use std::time::Duration;
use tokio::time::Instant;

/// A client for the GCE metadata server.
#[derive(Clone, Debug)]
pub(crate) struct Client {
    endpoint: String,
    inner: ReqwestClient,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub(crate) struct MDSTokenResponse {
    pub(crate) access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) expires_in: Option<u64>,
    pub(crate) token_type: String,
}

impl Client {
    /// Creates a new client for the metadata server.
    pub(crate) fn new(endpoint_override: Option<String>) -> Self {
        let endpoint = Self::resolve_endpoint(endpoint_override);
        let endpoint = endpoint.trim_end_matches('/').to_string();
        Self {
            endpoint,
            inner: ReqwestClient::new(),
        }
    }

    fn resolve_endpoint(endpoint_override: Option<String>) -> String {
        if let Ok(host) = std::env::var(super::GCE_METADATA_HOST_ENV_VAR) {
            format!("http://{host}")
        } else if let Some(e) = endpoint_override {
            e
        } else {
            super::METADATA_ROOT.to_string()
        }
    }

    pub(crate) fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn get(&self, url: &str) -> RequestBuilder {
        self.inner
            .get(url)
            .header(super::METADATA_FLAVOR, super::METADATA_FLAVOR_VALUE)
    }

    /// Fetches an access token for the default service account.
    pub(crate) async fn access_token(&self, scopes: &[String]) -> crate::Result<Token> {
        let url = format!("{}{}/token", self.endpoint, super::MDS_DEFAULT_URI);
        let request = self.get(&url);

        // With no scopes the metadata server uses the scopes of the instance.
        let request = if scopes.is_empty() {
            request
        } else {
            request.query(&[("scopes", scopes.join(","))])
        };

        let response = request
            .send()
            .await
            .map_err(|e| errors::from_http_error(e, &url))?;
        let response = Self::check_response_status(response, &url).await?;

        let response = response.json::<MDSTokenResponse>().await.map_err(|e| {
            // Decoding errors are not transient. Typically they indicate a badly
            // configured metadata endpoint, or DNS redirecting the request to a
            // random server.
            let transient = !e.is_decode();
            CredentialsError::from_source(transient, TokenDecodeError::new(url.as_str(), e))
        })?;

        Ok(Token {
            token: response.access_token,
            token_type: response.token_type,
            expires_at: response
                .expires_in
                .map(|d| Instant::now() + Duration::from_secs(d)),
        })
    }

    /// Reads a plain text value, `path` is relative to `/computeMetadata/v1`.
    pub(crate) async fn value(&self, path: &str) -> crate::Result<String> {
        let url = format!(
            "{}{}/{}",
            self.endpoint,
            super::MDS_ROOT_URI,
            path.trim_start_matches('/')
        );
        let response = self
            .get(&url)
            .send()
            .await
            .map_err(|e| errors::from_http_error(e, &url))?;
        let response = Self::check_response_status(response, &url).await?;
        let value = response
            .text()
            .await
            .map_err(|e| CredentialsError::from_source(!e.is_decode(), e))?;
        Ok(value.trim().to_string())
    }

    async fn check_response_status(
        response: reqwest::Response,
        url: &str,
    ) -> crate::Result<reqwest::Response> {
        if !response.status().is_success() {
            let err = errors::from_http_response(response, url).await;
            Err(err)
        } else {
            Ok(response)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TokenMintError;
    use crate::mds::MDS_DEFAULT_URI;
    use httptest::{Expectation, Server, matchers::*, responders::*};
    use scoped_env::ScopedEnv;
    use serial_test::{parallel, serial};

    #[tokio::test]
    #[parallel]
    async fn access_token_success() {
        let server = Server::run();
        let client = Client::new(Some(format!("http://{}", server.addr())));
        let response = MDSTokenResponse {
            access_token: "test-token".to_string(),
            expires_in: Some(3600),
            token_type: "Bearer".to_string(),
        };

        server.expect(
            Expectation::matching(all_of![
                request::method("GET"),
                request::path(format!("{MDS_DEFAULT_URI}/token")),
                request::headers(contains(("metadata-flavor", "Google"))),
                request::query(url_decoded(contains((
                    "scopes",
                    "scope1,scope2".to_string()
                )))),
            ])
            .respond_with(json_encoded(response)),
        );

        let token = client
            .access_token(&["scope1".to_string(), "scope2".to_string()])
            .await
            .unwrap();
        assert_eq!(token.token, "test-token");
        assert_eq!(token.token_type, "Bearer");
        assert!(token.expires_at.is_some(), "{token:?}");
    }

    #[tokio::test]
    #[parallel]
    async fn access_token_failure() {
        let server = Server::run();
        let client = Client::new(Some(format!("http://{}", server.addr())));

        server.expect(
            Expectation::matching(all_of![
                request::method("GET"),
                request::path(format!("{MDS_DEFAULT_URI}/token")),
            ])
            .respond_with(status_code(404).body("Not Found")),
        );

        let err = client.access_token(&[]).await.unwrap_err();
        assert!(!err.is_transient(), "{err:?}");
        let mint = err.as_inner::<TokenMintError>().unwrap();
        assert_eq!(mint.status(), http::StatusCode::NOT_FOUND);
        assert_eq!(mint.reason(), "Not Found");
    }

    #[tokio::test]
    #[parallel]
    async fn access_token_bad_body() {
        let server = Server::run();
        let client = Client::new(Some(format!("http://{}", server.addr())));

        server.expect(
            Expectation::matching(request::path(format!("{MDS_DEFAULT_URI}/token")))
                .respond_with(status_code(200).body("<html>captive portal</html>")),
        );

        let err = client.access_token(&[]).await.unwrap_err();
        assert!(err.is_decode(), "{err:?}");
        assert!(!err.is_transient(), "{err:?}");
    }

    #[tokio::test]
    #[parallel]
    async fn value_success() {
        let server = Server::run();
        let client = Client::new(Some(format!("http://{}/", server.addr())));

        server.expect(
            Expectation::matching(all_of![
                request::method("GET"),
                request::path("/computeMetadata/v1/project/project-id"),
                request::headers(contains(("metadata-flavor", "Google"))),
            ])
            .respond_with(status_code(200).body("test-project\n")),
        );

        let value = client.value("project/project-id").await.unwrap();
        assert_eq!(value, "test-project");
    }

    #[tokio::test]
    #[parallel]
    async fn value_not_found() {
        let server = Server::run();
        let client = Client::new(Some(format!("http://{}", server.addr())));

        server.expect(
            Expectation::matching(request::path(
                "/computeMetadata/v1/instance/attributes/cluster-name",
            ))
            .respond_with(status_code(404)),
        );

        let err = client
            .value("/instance/attributes/cluster-name")
            .await
            .unwrap_err();
        assert!(err.is_mint(), "{err:?}");
        assert!(err.to_string().contains("cluster-name"), "{err}");
    }

    #[test]
    #[serial]
    fn resolve_endpoint_default() {
        let client = Client::new(None);
        assert_eq!(client.endpoint(), "http://metadata.google.internal");
    }

    #[test]
    #[serial]
    fn resolve_endpoint_override() {
        let client = Client::new(Some("http://custom.endpoint/".to_string()));
        assert_eq!(client.endpoint(), "http://custom.endpoint");
    }

    #[test]
    #[serial]
    fn resolve_endpoint_env_var() {
        let _s = ScopedEnv::set(super::super::GCE_METADATA_HOST_ENV_VAR, "env.var.host");
        let client = Client::new(None);
        assert_eq!(client.endpoint(), "http://env.var.host");
    }

    #[test]
    #[serial]
    fn resolve_endpoint_priority() {
        let _s = ScopedEnv::set(super::super::GCE_METADATA_HOST_ENV_VAR, "env.priority.host");
        // The environment variable takes precedence over the constructor argument.
        let client = Client::new(Some("http://custom.endpoint".to_string()));
        assert_eq!(client.endpoint(), "http://env.priority.host");
    }
}
