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

//! Verifies that the credentials for this instance can be provisioned.
//!
//! Resolves the project, zone and token source exactly as an agent would at
//! startup, then waits for the first access token.

use anyhow::{Context, Result};
use clap::Parser;
use gce_credentials::credentials::Credentials;
use gce_credentials::metadata::{MetadataServer, MetadataService, StaticMetadataService};
use gce_credentials::provider::AuthConfig;
use gce_credentials::token::TokenSource;
use gce_credentials::warmup::Warmup;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// The cloud provider configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// The project, skips the metadata server when used with `--zone`.
    #[arg(long)]
    project: Option<String>,

    /// The zone, skips the metadata server when used with `--project`.
    #[arg(long)]
    zone: Option<String>,

    /// The metadata server address.
    #[arg(long)]
    metadata_endpoint: Option<String>,

    /// How long to wait for the first access token.
    #[arg(long, default_value_t = 30)]
    warmup_seconds: u64,

    /// Log at `DEBUG` level instead of `INFO`, unless `RUST_LOG` is set.
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // `RUST_LOG` takes precedence over `--verbose`.
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_level(true)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let metadata = metadata(&cli).await?;
    let builder = AuthConfig::builder(metadata).with_warmup(
        Warmup::default().with_window(Duration::from_secs(cli.warmup_seconds)),
    );
    let builder = match &cli.config {
        Some(path) => builder.with_config_path(path),
        None => builder,
    };
    let builder = match &cli.metadata_endpoint {
        Some(endpoint) => builder.with_metadata_endpoint(endpoint),
        None => builder,
    };
    let config = builder
        .build()
        .context("cannot select the token source")?;

    println!("project:  {}", config.project());
    println!("zone:     {}", config.zone());
    println!("strategy: {}", strategy(config.credentials()));

    config
        .authorized_client()
        .await
        .context("cannot obtain an initial access token")?;
    let token = config
        .token_source()
        .token()
        .await
        .context("cannot obtain an access token")?;
    match token.expires_at {
        Some(expires_at) => println!(
            "token:    valid for {}s",
            expires_at.saturating_duration_since(Instant::now()).as_secs()
        ),
        None => println!("token:    expiration managed by the credential chain"),
    }
    Ok(())
}

async fn metadata(cli: &Cli) -> Result<StaticMetadataService> {
    if let (Some(project), Some(zone)) = (&cli.project, &cli.zone) {
        tracing::info!("using the project and zone from the command line");
        let values = StaticMetadataService::default()
            .with_project(project)
            .with_zone(zone);
        return Ok(values);
    }
    let builder = MetadataServer::builder();
    let builder = match &cli.metadata_endpoint {
        Some(endpoint) => builder.with_endpoint(endpoint),
        None => builder,
    };
    let server = builder
        .build()
        .await
        .context("cannot read the instance metadata")?;
    // Explicit flags still win over the metadata server.
    let values = StaticMetadataService::default()
        .with_project(cli.project.as_deref().unwrap_or(server.project()))
        .with_zone(cli.zone.as_deref().unwrap_or(server.zone()))
        .with_name(server.name())
        .with_machine_type(server.machine_type())
        .with_cluster_name(server.cluster_name())
        .with_cluster_location(server.cluster_location());
    Ok(values)
}

fn strategy(credentials: &Credentials) -> String {
    if let Some(alternate) = credentials.alternate() {
        return format!("alternate ({})", alternate.token_url());
    }
    if credentials.is_default() {
        return "default (Application Default Credentials)".to_string();
    }
    "unknown".to_string()
}
