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

//! Errors returned when obtaining access tokens.

use http::StatusCode;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter, Result};
use std::sync::Arc;

type ArcError = Arc<dyn Error + Send + Sync + 'static>;

/// Represents an error obtaining an access token.
///
/// Token sources return this error from every call to
/// [token()](crate::token::TokenSource::token). The error is cheap to clone:
/// when several tasks wait on the same refresh, all of them receive a copy of
/// the refresh error.
///
/// Use [as_inner()][CredentialsError::as_inner] to examine the typed cause,
/// for example a [TokenMintError] or a [TokenDecodeError].
#[derive(Clone, Debug)]
pub struct CredentialsError {
    is_transient: bool,
    message: Option<String>,
    source: Option<ArcError>,
}

impl CredentialsError {
    /// Creates a new error with a message and a source.
    pub fn new<M, S>(is_transient: bool, message: M, source: S) -> Self
    where
        M: Into<String>,
        S: Error + Send + Sync + 'static,
    {
        Self {
            is_transient,
            message: Some(message.into()),
            source: Some(Arc::new(source)),
        }
    }

    /// Creates a new error with only a message.
    pub fn from_msg<M: Into<String>>(is_transient: bool, message: M) -> Self {
        Self {
            is_transient,
            message: Some(message.into()),
            source: None,
        }
    }

    /// Creates a new error wrapping `source`.
    pub fn from_source<S>(is_transient: bool, source: S) -> Self
    where
        S: Error + Send + Sync + 'static,
    {
        Self {
            is_transient,
            message: None,
            source: Some(Arc::new(source)),
        }
    }

    /// Returns `true` if a future attempt may succeed.
    pub fn is_transient(&self) -> bool {
        self.is_transient
    }

    /// Returns the typed cause of this error, if it is a `T`.
    pub fn as_inner<T: Error + Send + Sync + 'static>(&self) -> Option<&T> {
        self.source.as_ref()?.downcast_ref::<T>()
    }

    /// The token endpoint rejected the request.
    pub fn is_mint(&self) -> bool {
        self.as_inner::<TokenMintError>().is_some()
    }

    /// The token endpoint returned a response that is not a token.
    pub fn is_decode(&self) -> bool {
        self.as_inner::<TokenDecodeError>().is_some()
    }
}

impl Error for CredentialsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|arc| arc.as_ref() as &(dyn Error + 'static))
    }
}

const TRANSIENT_MSG: &str = "but future attempts may succeed";
const PERMANENT_MSG: &str = "and future attempts will not succeed";

impl Display for CredentialsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let msg = if self.is_transient {
            TRANSIENT_MSG
        } else {
            PERMANENT_MSG
        };
        match (&self.message, &self.source) {
            (Some(m), Some(s)) => write!(f, "{m}, {msg}: {s}"),
            (Some(m), None) => write!(f, "{m}, {msg}"),
            (None, Some(s)) => write!(f, "cannot create access token, {msg}: {s}"),
            (None, None) => write!(f, "cannot create access token, {msg}"),
        }
    }
}

/// A token endpoint answered with a non-success HTTP status.
///
/// The response body is never interpreted as a credential in this case. It is
/// kept, verbatim, as the `reason`.
#[derive(thiserror::Error, Debug)]
#[error("the token endpoint at {url} returned {status}: {reason}")]
pub struct TokenMintError {
    url: String,
    status: StatusCode,
    reason: String,
}

impl TokenMintError {
    pub(crate) fn new<U, R>(url: U, status: StatusCode, reason: R) -> Self
    where
        U: Into<String>,
        R: Into<String>,
    {
        Self {
            url: url.into(),
            status,
            reason: reason.into(),
        }
    }

    /// The endpoint that rejected the request.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The HTTP status returned by the endpoint.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The body of the error response.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// A token endpoint answered with a success status, but the body is not a
/// valid token response.
#[derive(thiserror::Error, Debug)]
#[error("cannot decode the token response from {url}: {source}")]
pub struct TokenDecodeError {
    url: String,
    #[source]
    source: Box<dyn Error + Send + Sync + 'static>,
}

impl TokenDecodeError {
    pub(crate) fn new<U, S>(url: U, source: S) -> Self
    where
        U: Into<String>,
        S: Into<Box<dyn Error + Send + Sync + 'static>>,
    {
        Self {
            url: url.into(),
            source: source.into(),
        }
    }

    /// The endpoint that returned the malformed response.
    pub fn url(&self) -> &str {
        &self.url
    }
}

pub(crate) fn is_retryable(c: StatusCode) -> bool {
    match c {
        // Internal server errors do not indicate that there is anything wrong
        // with our request, so we retry them.
        StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::REQUEST_TIMEOUT
        | StatusCode::TOO_MANY_REQUESTS => true,
        _ => false,
    }
}

/// Converts a failed `send()` into a credentials error.
///
/// The request never produced a response, most likely the endpoint is
/// temporarily unreachable.
pub(crate) fn from_http_error(err: reqwest::Error, url: &str) -> CredentialsError {
    CredentialsError::new(true, format!("cannot reach the token endpoint at {url}"), err)
}

/// Consumes a non-success response and converts it into a credentials error.
pub(crate) async fn from_http_response(response: reqwest::Response, url: &str) -> CredentialsError {
    let status = response.status();
    let reason = match response.text().await {
        Ok(body) if body.is_empty() => status
            .canonical_reason()
            .unwrap_or("unknown reason")
            .to_string(),
        Ok(body) => body,
        Err(e) => format!("<cannot read the response body: {e}>"),
    };
    CredentialsError::from_source(is_retryable(status), TokenMintError::new(url, status, reason))
}
