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

use crate::Result;
use crate::constants::EXPIRY_SAFETY_MARGIN;
use crate::token::{Token, TokenSource};
use std::time::Duration;
use tokio::sync::Mutex;

/// Caches the token produced by an inner source.
///
/// The cache returns the last token until it is within `margin` of its
/// expiration. At most one refresh is in flight at any time. Callers that
/// arrive while a refresh is in progress wait for it, and receive its result,
/// be it a token or an error.
#[derive(Debug)]
pub(crate) struct TokenCache<T>
where
    T: TokenSource,
{
    // The result of the last refresh, tagged with a generation number.
    last: Mutex<Refreshed>,

    // Held for the duration of a refresh.
    refresh: Mutex<()>,

    margin: Duration,

    // The token source. This thing does the refreshing.
    inner: T,
}

#[derive(Debug)]
struct Refreshed {
    generation: u64,
    result: Option<Result<Token>>,
}

impl<T> TokenCache<T>
where
    T: TokenSource,
{
    pub(crate) fn new(inner: T) -> Self {
        Self::with_margin(inner, EXPIRY_SAFETY_MARGIN)
    }

    pub(crate) fn with_margin(inner: T, margin: Duration) -> Self {
        Self {
            last: Mutex::new(Refreshed {
                generation: 0,
                result: None,
            }),
            refresh: Mutex::new(()),
            margin,
            inner,
        }
    }

    pub(crate) fn inner(&self) -> &T {
        &self.inner
    }

    // Returns the cached token if it is still usable, otherwise the
    // generation the caller observed.
    async fn cached(&self) -> std::result::Result<Token, u64> {
        let last = self.last.lock().await;
        match &last.result {
            Some(Ok(token)) if token.is_valid_for(self.margin) => Ok(token.clone()),
            _ => Err(last.generation),
        }
    }
}

#[async_trait::async_trait]
impl<T> TokenSource for TokenCache<T>
where
    T: TokenSource,
{
    async fn token(&self) -> Result<Token> {
        let observed = match self.cached().await {
            Ok(token) => return Ok(token),
            Err(generation) => generation,
        };

        let _guard = self.refresh.lock().await;
        {
            let last = self.last.lock().await;
            if last.generation != observed {
                // Somebody else refreshed while we waited for the guard.
                match &last.result {
                    Some(Ok(token)) if !token.is_valid_for(self.margin) => {
                        tracing::debug!("refreshed token is within the expiry margin");
                    }
                    Some(result) => return result.clone(),
                    None => {}
                }
            }
        }

        let result = self.inner.token().await;
        if let Err(e) = &result {
            tracing::debug!("token refresh failed: {e}");
        }
        let mut last = self.last.lock().await;
        last.generation += 1;
        last.result = Some(result.clone());
        result
    }
}
