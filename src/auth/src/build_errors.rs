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

//! Errors created while provisioning credentials at startup.

use crate::errors::CredentialsError;
use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type for the startup stages.
///
/// None of these errors are retried by this crate: reading the configuration,
/// initializing the default credential chain, reading the instance metadata
/// and warming up the token source all happen once, when the process starts.
/// The error message identifies the failed stage.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct Error(ErrorKind);

impl Error {
    /// The configuration file was specified, but it cannot be read or parsed.
    pub fn is_config_read(&self) -> bool {
        matches!(self.0, ErrorKind::ConfigRead(_))
    }

    /// The default credential chain cannot be initialized.
    pub fn is_credential_chain(&self) -> bool {
        matches!(self.0, ErrorKind::CredentialChain(_))
    }

    /// No access token was obtained within the warmup window.
    pub fn is_warmup_timeout(&self) -> bool {
        matches!(self.0, ErrorKind::WarmupTimeout { .. })
    }

    /// The instance metadata cannot be read.
    pub fn is_metadata(&self) -> bool {
        matches!(self.0, ErrorKind::Metadata(_))
    }

    pub(crate) fn config_read<T>(source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error(ErrorKind::ConfigRead(source.into()))
    }

    pub(crate) fn credential_chain<T>(source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error(ErrorKind::CredentialChain(source.into()))
    }

    pub(crate) fn warmup_timeout(window: Duration, last: Option<CredentialsError>) -> Error {
        Error(ErrorKind::WarmupTimeout { window, last })
    }

    pub(crate) fn metadata<T>(source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error(ErrorKind::Metadata(source.into()))
    }
}

#[derive(thiserror::Error, Debug)]
enum ErrorKind {
    #[error("failed to read config file: {0}")]
    ConfigRead(#[source] BoxError),
    #[error("failed to initialize the default credential chain: {0}")]
    CredentialChain(#[source] BoxError),
    #[error("failed to obtain an initial access token within {window:?}{}", last_attempt(.last))]
    WarmupTimeout {
        window: Duration,
        #[source]
        last: Option<CredentialsError>,
    },
    #[error("failed to read the instance metadata: {0}")]
    Metadata(#[source] BoxError),
}

fn last_attempt(last: &Option<CredentialsError>) -> String {
    last.as_ref()
        .map(|e| format!(", last attempt: {e}"))
        .unwrap_or_default()
}
