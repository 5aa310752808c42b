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

//! The identity of the instance running the agent.
//!
//! The project and zone are needed by every API call. When the configuration
//! file does not provide them, they are taken from a [MetadataService].
//! Production code uses a [MetadataServer], which queries the [GCE metadata
//! server] once, at construction time. Tests, and deployments outside of
//! Compute Engine, use a [StaticMetadataService].
//!
//! [GCE metadata server]: https://cloud.google.com/compute/docs/metadata/overview

use crate::build_errors::Error as BuildError;
use crate::mds::client::Client as MDSClient;

pub mod testing;

/// Read-only access to the identity of the running instance.
///
/// All the methods are pure reads. Implementations resolve the values before
/// they are handed to consumers of this trait.
pub trait MetadataService: std::fmt::Debug + Send + Sync {
    /// The project that owns the instance.
    fn project(&self) -> &str;

    /// The zone where the instance runs, for example `us-central1-a`.
    fn zone(&self) -> &str;

    /// The name of the instance.
    fn name(&self) -> &str;

    /// The machine type, for example `n1-standard-1`.
    fn machine_type(&self) -> &str;

    /// The name of the cluster the instance belongs to.
    fn cluster_name(&self) -> &str;

    /// The location of the cluster the instance belongs to.
    fn cluster_location(&self) -> &str;
}

/// A [MetadataService] with explicitly provided values.
///
/// # Example
/// ```
/// # use gce_credentials::metadata::{MetadataService, StaticMetadataService};
/// let metadata = StaticMetadataService::default()
///     .with_project("my-project")
///     .with_zone("us-central1-a");
/// assert_eq!(metadata.project(), "my-project");
/// assert_eq!(metadata.zone(), "us-central1-a");
/// assert_eq!(metadata.cluster_name(), "");
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StaticMetadataService {
    project: String,
    zone: String,
    name: String,
    machine_type: String,
    cluster_name: String,
    cluster_location: String,
}

impl StaticMetadataService {
    /// Sets the project.
    pub fn with_project<V: Into<String>>(mut self, v: V) -> Self {
        self.project = v.into();
        self
    }

    /// Sets the zone.
    pub fn with_zone<V: Into<String>>(mut self, v: V) -> Self {
        self.zone = v.into();
        self
    }

    /// Sets the instance name.
    pub fn with_name<V: Into<String>>(mut self, v: V) -> Self {
        self.name = v.into();
        self
    }

    /// Sets the machine type.
    pub fn with_machine_type<V: Into<String>>(mut self, v: V) -> Self {
        self.machine_type = v.into();
        self
    }

    /// Sets the cluster name.
    pub fn with_cluster_name<V: Into<String>>(mut self, v: V) -> Self {
        self.cluster_name = v.into();
        self
    }

    /// Sets the cluster location.
    pub fn with_cluster_location<V: Into<String>>(mut self, v: V) -> Self {
        self.cluster_location = v.into();
        self
    }
}

impl MetadataService for StaticMetadataService {
    fn project(&self) -> &str {
        &self.project
    }

    fn zone(&self) -> &str {
        &self.zone
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn machine_type(&self) -> &str {
        &self.machine_type
    }

    fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    fn cluster_location(&self) -> &str {
        &self.cluster_location
    }
}

/// A [MetadataService] backed by the GCE metadata server.
///
/// All the values are fetched by [MetadataServer::new()]. A failure to fetch
/// any of them fails the construction.
#[derive(Clone, Debug, PartialEq)]
pub struct MetadataServer {
    values: StaticMetadataService,
}

impl MetadataServer {
    /// Reads the instance metadata from the default metadata server.
    ///
    /// The `GCE_METADATA_HOST` environment variable overrides the metadata
    /// server address.
    pub async fn new() -> Result<Self, BuildError> {
        Builder::default().build().await
    }

    /// Returns a builder to configure the metadata server address.
    pub fn builder() -> Builder {
        Builder::default()
    }
}

impl MetadataService for MetadataServer {
    fn project(&self) -> &str {
        self.values.project()
    }

    fn zone(&self) -> &str {
        self.values.zone()
    }

    fn name(&self) -> &str {
        self.values.name()
    }

    fn machine_type(&self) -> &str {
        self.values.machine_type()
    }

    fn cluster_name(&self) -> &str {
        self.values.cluster_name()
    }

    fn cluster_location(&self) -> &str {
        self.values.cluster_location()
    }
}

/// Creates [MetadataServer] instances.
#[derive(Debug, Default)]
pub struct Builder {
    endpoint: Option<String>,
}

impl Builder {
    /// Sets the metadata server address, for example `http://169.254.169.254`.
    ///
    /// The `GCE_METADATA_HOST` environment variable takes precedence over
    /// this setting.
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Reads all the instance metadata values.
    pub async fn build(self) -> Result<MetadataServer, BuildError> {
        let client = MDSClient::new(self.endpoint);

        let zone = fetch(&client, "instance/zone", "current zone").await?;
        let project = fetch(&client, "project/project-id", "project").await?;
        let name = fetch(&client, "instance/name", "instance name").await?;
        let machine_type = fetch(&client, "instance/machine-type", "machine-type").await?;
        let cluster_name =
            fetch(&client, "instance/attributes/cluster-name", "cluster name").await?;
        let cluster_location = fetch(
            &client,
            "instance/attributes/cluster-location",
            "cluster location",
        )
        .await?;

        let values = StaticMetadataService::default()
            // The server returns `projects/[NUMBER]/zones/[ZONE]`.
            .with_zone(last_segment(&zone))
            .with_project(project)
            .with_name(name)
            // The server returns `projects/[NUMBER]/machineTypes/[MACHINE_TYPE]`.
            .with_machine_type(last_segment(&machine_type))
            .with_cluster_name(cluster_name)
            .with_cluster_location(cluster_location);
        tracing::debug!("instance metadata: {values:?}");
        Ok(MetadataServer { values })
    }
}

async fn fetch(client: &MDSClient, path: &str, what: &str) -> Result<String, BuildError> {
    client.value(path).await.map_err(|e| {
        BuildError::metadata(format!(
            "failed to get {what} from {}: {e}",
            client.endpoint()
        ))
    })
}

fn last_segment(v: &str) -> &str {
    v.rsplit('/').next().unwrap_or(v)
}
