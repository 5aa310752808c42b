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

//! Fake instance metadata for tests.

use super::StaticMetadataService;

pub const FAKE_PROJECT: &str = "test-project";
pub const FAKE_ZONE: &str = "country-region-zone";
pub const FAKE_NAME: &str = "test-name";
pub const FAKE_MACHINE_TYPE: &str = "n1-standard-1";
pub const FAKE_CLUSTER_NAME: &str = "test-cluster";
pub const FAKE_CLUSTER_LOCATION: &str = "us-central1";

/// Returns a new fake, tests may change any value with the `with_*()` setters.
pub fn fake() -> StaticMetadataService {
    StaticMetadataService::default()
        .with_project(FAKE_PROJECT)
        .with_zone(FAKE_ZONE)
        .with_name(FAKE_NAME)
        .with_machine_type(FAKE_MACHINE_TYPE)
        .with_cluster_name(FAKE_CLUSTER_NAME)
        .with_cluster_location(FAKE_CLUSTER_LOCATION)
}
