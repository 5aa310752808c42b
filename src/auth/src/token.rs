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

//! Types and traits to work with bearer [Tokens].
//!
//! [Tokens]: https://cloud.google.com/docs/authentication#token

use crate::Result;
use std::sync::Arc;
use std::time::Duration;
// Using tokio's wrapper makes expirations testable without relying on clock times.
use tokio::time::Instant;

/// Represents a bearer token.
#[derive(Clone, PartialEq)]
pub struct Token {
    /// The actual token string.
    ///
    /// This is the value used in `Authorization:` header.
    pub token: String,

    /// The type of the token.
    ///
    /// The most common type is `"Bearer"`.
    pub token_type: String,

    /// The instant at which the token expires.
    ///
    /// If `None`, the token does not expire.
    pub expires_at: Option<Instant>,
}

impl Token {
    /// Returns `true` if the token can be used for at least `margin` more.
    pub fn is_valid_for(&self, margin: Duration) -> bool {
        self.expires_at
            .is_none_or(|expires_at| Instant::now() + margin < expires_at)
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("token", &"[censored]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Produces bearer tokens on demand.
///
/// This is the only capability exposed to API clients. Implementations must
/// be safe to call from many tasks at once.
#[async_trait::async_trait]
pub trait TokenSource: std::fmt::Debug + Send + Sync {
    /// Returns a token that is valid for at least a few more seconds.
    async fn token(&self) -> Result<Token>;
}

#[async_trait::async_trait]
impl<T> TokenSource for Arc<T>
where
    T: TokenSource + ?Sized,
{
    async fn token(&self) -> Result<Token> {
        self.as_ref().token().await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    // Used by tests in other modules.
    mockall::mock! {
        #[derive(Debug)]
        pub TokenSource { }

        #[async_trait::async_trait]
        impl TokenSource for TokenSource {
            async fn token(&self) -> Result<Token>;
        }
    }

    #[test]
    fn debug() {
        let expires_at = Instant::now() + Duration::from_secs(3600);

        let token = Token {
            token: "token-test-only".into(),
            token_type: "token-type-test-only".into(),
            expires_at: Some(expires_at),
        };
        let got = format!("{token:?}");
        assert!(!got.contains("token-test-only"), "{got}");
        assert!(got.contains("token: \"[censored]\""), "{got}");
        assert!(got.contains("token_type: \"token-type-test-only"), "{got}");
        assert!(
            got.contains(&format!("expires_at: Some({expires_at:?}")),
            "{got}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn validity() {
        let never = Token {
            token: "test-only".into(),
            token_type: "Bearer".into(),
            expires_at: None,
        };
        assert!(never.is_valid_for(Duration::from_secs(3600 * 24 * 365)));

        let token = Token {
            expires_at: Some(Instant::now() + Duration::from_secs(60)),
            ..never
        };
        assert!(token.is_valid_for(Duration::from_secs(10)));
        tokio::time::advance(Duration::from_secs(49)).await;
        assert!(token.is_valid_for(Duration::from_secs(10)));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!token.is_valid_for(Duration::from_secs(10)));
    }
}
