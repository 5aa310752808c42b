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

//! Proves that a token source works before it is handed to API clients.
//!
//! A misconfigured token source is much easier to diagnose when the process
//! fails at startup than when the first API call, deep inside unrelated
//! code, fails to authenticate. The warmup polls the source at a fixed
//! interval until it returns a token, or until the warmup window expires.

use crate::build_errors::Error as BuildError;
use crate::constants::{WARMUP_INTERVAL, WARMUP_WINDOW};
use crate::errors::CredentialsError;
use crate::token::{Token, TokenSource};
use std::time::Duration;
use tokio::time::Instant;

/// Polls `source` until it returns a token, with the default settings.
///
/// The source is called every 5 seconds, for at most 30 seconds.
///
/// # Example
/// ```no_run
/// # use gce_credentials::credentials::mds::Builder;
/// # use gce_credentials::warmup::wait_for_initial_token;
/// # async fn sample() -> anyhow::Result<()> {
/// let source = Builder::default().build();
/// let token = wait_for_initial_token(&source).await?;
/// println!("token expires at {:?}", token.expires_at);
/// # Ok(()) }
/// ```
pub async fn wait_for_initial_token(source: &dyn TokenSource) -> Result<Token, BuildError> {
    Warmup::default().run(source).await
}

/// Configures the initial token polling loop.
#[derive(Clone, Debug)]
pub struct Warmup {
    interval: Duration,
    window: Duration,
}

impl Default for Warmup {
    fn default() -> Self {
        Self {
            interval: WARMUP_INTERVAL,
            window: WARMUP_WINDOW,
        }
    }
}

impl Warmup {
    /// Changes the time between attempts.
    pub fn with_interval(mut self, v: Duration) -> Self {
        self.interval = v;
        self
    }

    /// Changes the total time allowed to obtain a token.
    pub fn with_window(mut self, v: Duration) -> Self {
        self.window = v;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Polls `source` until it returns a token.
    ///
    /// Returns the first token obtained. If the window expires, either while
    /// waiting for the next attempt or during an attempt, the error carries
    /// the last error returned by `source`.
    pub async fn run(&self, source: &dyn TokenSource) -> Result<Token, BuildError> {
        let deadline = Instant::now() + self.window;
        let mut last: Option<CredentialsError> = None;
        let mut attempt = 0_u32;
        loop {
            attempt += 1;
            match tokio::time::timeout_at(deadline, source.token()).await {
                Ok(Ok(token)) => {
                    tracing::debug!("initial token obtained after {attempt} attempt(s)");
                    return Ok(token);
                }
                Ok(Err(e)) => {
                    tracing::error!("failed to get an initial token (attempt {attempt}): {e}");
                    last = Some(e);
                }
                Err(_) => {
                    tracing::error!("initial token attempt {attempt} did not complete in time");
                    break;
                }
            }
            let next = Instant::now() + self.interval;
            if next >= deadline {
                tokio::time::sleep_until(deadline).await;
                break;
            }
            tokio::time::sleep_until(next).await;
        }
        Err(BuildError::warmup_timeout(self.window, last))
    }
}
