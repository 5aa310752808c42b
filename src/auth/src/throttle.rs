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
use crate::token::{Token, TokenSource};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// A token bucket admission controller.
///
/// The bucket starts full with `burst` permits and accumulates `rate` permits
/// per second, up to `burst`. Callers never get rejected: [acquire] waits
/// until a permit is available.
///
/// Permits are reserved before waiting, so concurrent callers are admitted
/// in arrival order, and the bucket never needs a queue. Over any window `w`
/// at most `burst + rate * w` callers are admitted. A caller that abandons
/// the wait returns its reservation.
///
/// [acquire]: TokenBucket::acquire
#[derive(Debug)]
pub(crate) struct TokenBucket {
    rate: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    // May go negative: each waiting caller holds a reservation.
    permits: f64,
    updated: Instant,
}

impl BucketState {
    fn refill(&mut self, rate: f64, burst: f64) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.updated).as_secs_f64();
        self.permits = (self.permits + elapsed * rate).min(burst);
        self.updated = now;
    }
}

// A permit taken from the bucket. Dropped before the wait completes, it goes
// back to the bucket.
struct Reservation<'a> {
    bucket: &'a TokenBucket,
    wait: Duration,
    admitted: bool,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.admitted {
            self.bucket.cancel();
        }
    }
}

impl TokenBucket {
    pub(crate) fn new(rate: f64, burst: u32) -> Self {
        debug_assert!(rate > 0.0, "the token bucket rate must be positive");
        let burst = f64::from(burst.max(1));
        Self {
            rate,
            burst,
            state: Mutex::new(BucketState {
                permits: burst,
                updated: Instant::now(),
            }),
        }
    }

    /// Waits until the bucket admits one unit of work.
    ///
    /// Dropping the returned future abandons the wait and releases the
    /// reserved permit.
    pub(crate) async fn acquire(&self) {
        let mut reservation = self.reserve();
        if !reservation.wait.is_zero() {
            tracing::debug!(
                "token bucket is empty, waiting {:?} before the next request",
                reservation.wait
            );
            tokio::time::sleep(reservation.wait).await;
        }
        reservation.admitted = true;
    }

    fn reserve(&self) -> Reservation<'_> {
        let mut state = self.state();
        state.refill(self.rate, self.burst);
        state.permits -= 1.0;
        let wait = if state.permits >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-state.permits / self.rate)
        };
        Reservation {
            bucket: self,
            wait,
            admitted: false,
        }
    }

    fn cancel(&self) {
        let mut state = self.state();
        state.refill(self.rate, self.burst);
        state.permits = (state.permits + 1.0).min(self.burst);
    }

    // The state is updated atomically, poisoning does not corrupt it.
    fn state(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Admits every call to the inner source through a [TokenBucket].
#[derive(Debug)]
pub(crate) struct ThrottledTokenSource<T>
where
    T: TokenSource,
{
    inner: T,
    bucket: TokenBucket,
}

impl<T> ThrottledTokenSource<T>
where
    T: TokenSource,
{
    pub(crate) fn new(inner: T, rate: f64, burst: u32) -> Self {
        Self {
            inner,
            bucket: TokenBucket::new(rate, burst),
        }
    }

    pub(crate) fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait::async_trait]
impl<T> TokenSource for ThrottledTokenSource<T>
where
    T: TokenSource,
{
    async fn token(&self) -> Result<Token> {
        self.bucket.acquire().await;
        self.inner.token().await
    }
}
