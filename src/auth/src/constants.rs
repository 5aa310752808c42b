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

use std::time::Duration;

pub(crate) const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
pub(crate) const COMPUTE_SCOPE: &str = "https://www.googleapis.com/auth/compute";
/// The scopes requested by the default credential chain.
pub(crate) const DEFAULT_SCOPES: [&str; 2] = [CLOUD_PLATFORM_SCOPE, COMPUTE_SCOPE];

pub(crate) const GOOGLE_APPLICATION_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Disables the alternate token source when used as the `token-url`.
pub(crate) const DISABLED_TOKEN_URL: &str = "nil";

/// Tokens are treated as expired this long before their actual expiration.
pub(crate) const EXPIRY_SAFETY_MARGIN: Duration = Duration::from_secs(10);

// Backs off to one request every 20 seconds once the burst is spent.
pub(crate) const TOKEN_URL_QPS: f64 = 0.05;
pub(crate) const TOKEN_URL_BURST: u32 = 3;

pub(crate) const WARMUP_INTERVAL: Duration = Duration::from_secs(5);
pub(crate) const WARMUP_WINDOW: Duration = Duration::from_secs(30);

pub(crate) const BEARER_TOKEN_TYPE: &str = "Bearer";
