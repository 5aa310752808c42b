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

//! The cloud provider configuration file.
//!
//! The file uses an INI-like format, the same format used by the cloud
//! provider configuration of Kubernetes. Only the `[global]` section is
//! recognized:
//!
//! ```text
//! [global]
//! token-url = https://example.com/token
//! token-body = "{\"audience\": \"example\"}"
//! project-id = my-project
//! zone = us-central1-a
//! ```
//!
//! Section and key names are case-insensitive. Unknown sections and keys are
//! ignored. When a key appears more than once, the last value wins.

use crate::build_errors::Error as BuildError;
use crate::metadata::MetadataService;
use std::path::Path;
use std::str::FromStr;

/// The parsed configuration file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigFile {
    /// The values in the `[global]` section.
    pub global: ConfigGlobal,
}

/// The `[global]` section of the configuration file.
///
/// Missing keys are empty strings.
#[derive(Clone, Default, PartialEq)]
pub struct ConfigGlobal {
    /// The `token-url` key: the endpoint for the alternate token source.
    pub token_url: String,
    /// The `token-body` key: sent verbatim to the `token-url`.
    pub token_body: String,
    /// The `project-id` key.
    pub project_id: String,
    /// The `zone` key.
    pub zone: String,
}

impl std::fmt::Debug for ConfigGlobal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = if self.token_body.is_empty() {
            ""
        } else {
            "[censored]"
        };
        f.debug_struct("ConfigGlobal")
            .field("token_url", &self.token_url)
            .field("token_body", &body)
            .field("project_id", &self.project_id)
            .field("zone", &self.zone)
            .finish()
    }
}

/// A syntax error in the configuration file.
#[derive(thiserror::Error, Debug, PartialEq)]
#[error("line {line}: {message}")]
pub struct ParseError {
    line: usize,
    message: String,
}

impl ParseError {
    fn new<M: Into<String>>(line: usize, message: M) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }

    /// The line (starting at 1) where the error was found.
    pub fn line(&self) -> usize {
        self.line
    }
}

impl FromStr for ConfigFile {
    type Err = ParseError;

    fn from_str(contents: &str) -> Result<Self, Self::Err> {
        let mut config = ConfigFile::default();
        let mut in_global = false;
        for (index, raw) in contents.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with([';', '#']) {
                continue;
            }
            if let Some(header) = trimmed.strip_prefix('[') {
                in_global = is_global_section(header, line)?;
                continue;
            }
            let Some((name, value)) = trimmed.split_once('=') else {
                return Err(ParseError::new(line, format!("missing value for {trimmed:?}")));
            };
            let name = name.trim();
            if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '-') {
                return Err(ParseError::new(line, format!("invalid variable name {name:?}")));
            }
            let value = parse_value(value, line)?;
            if !in_global {
                continue;
            }
            let global = &mut config.global;
            match name.to_ascii_lowercase().as_str() {
                "token-url" => global.token_url = value,
                "token-body" => global.token_body = value,
                "project-id" => global.project_id = value,
                "zone" => global.zone = value,
                _ => tracing::debug!("ignoring unknown key {name:?} in the [global] section"),
            }
        }
        Ok(config)
    }
}

// Returns true if the section header (without the leading `[`) names the
// `global` section.
fn is_global_section(header: &str, line: usize) -> Result<bool, ParseError> {
    let Some((name, rest)) = header.split_once(']') else {
        return Err(ParseError::new(line, "unterminated section header"));
    };
    let rest = rest.trim();
    if !(rest.is_empty() || rest.starts_with([';', '#'])) {
        return Err(ParseError::new(line, "unexpected text after section header"));
    }
    let name = name.trim();
    // Subsections, as in `[section "name"]`, are never the global section.
    let (section, subsection) = match name.split_once(char::is_whitespace) {
        Some((s, sub)) => (s, Some(sub.trim())),
        None => (name, None),
    };
    if section.is_empty() {
        return Err(ParseError::new(line, "empty section name"));
    }
    if let Some(sub) = subsection {
        if !(sub.len() >= 2 && sub.starts_with('"') && sub.ends_with('"')) {
            return Err(ParseError::new(line, "subsection names must be quoted"));
        }
        return Ok(false);
    }
    Ok(section.eq_ignore_ascii_case("global"))
}

// Parses the text after `=`: unquoted text is trimmed, quoted text is kept
// verbatim, and a `;` or `#` outside quotes starts a comment.
fn parse_value(text: &str, line: usize) -> Result<String, ParseError> {
    let mut value = String::new();
    // Unquoted whitespace is only kept when followed by more text.
    let mut pending_space = String::new();
    let mut quoted = false;
    let mut chars = text.trim().chars();
    while let Some(c) = chars.next() {
        match c {
            ';' | '#' if !quoted => break,
            '"' => {
                value.push_str(&pending_space);
                pending_space.clear();
                quoted = !quoted;
            }
            '\\' => {
                let escaped = match chars.next() {
                    Some('"') => '"',
                    Some('\\') => '\\',
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some(other) => {
                        return Err(ParseError::new(line, format!("invalid escape \\{other}")));
                    }
                    None => return Err(ParseError::new(line, "unterminated escape")),
                };
                value.push_str(&pending_space);
                pending_space.clear();
                value.push(escaped);
            }
            c if c.is_whitespace() && !quoted => pending_space.push(c),
            c => {
                value.push_str(&pending_space);
                pending_space.clear();
                value.push(c);
            }
        }
    }
    if quoted {
        return Err(ParseError::new(line, "unterminated quoted value"));
    }
    Ok(value)
}

/// Reads the configuration file at `path`.
///
/// Returns `Ok(None)` when `path` is `None` or empty: running without a
/// configuration file is valid. A file that cannot be read or parsed is an
/// error, the file is never partially applied.
pub fn read_config<P>(path: Option<P>) -> Result<Option<ConfigFile>, BuildError>
where
    P: AsRef<Path>,
{
    let Some(path) = path else {
        return Ok(None);
    };
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path).map_err(|e| {
        BuildError::config_read(format!(
            "couldn't open cloud provider configuration at {}: {e}",
            path.display()
        ))
    })?;
    let config = contents.parse::<ConfigFile>().map_err(|e| {
        BuildError::config_read(format!(
            "couldn't read cloud provider configuration at {}: {e}",
            path.display()
        ))
    })?;
    tracing::debug!("using GCE provider config {config:?}");
    Ok(Some(config))
}

/// Resolves the project and zone.
///
/// Each value comes from the configuration file when it is present and
/// non-empty, otherwise from the instance metadata. The two values are
/// resolved independently.
pub fn project_and_zone(
    config: Option<&ConfigFile>,
    metadata: &dyn MetadataService,
) -> (String, String) {
    let global = config.map(|c| &c.global);

    let zone = match global.map(|g| g.zone.as_str()) {
        Some(zone) if !zone.is_empty() => {
            tracing::debug!("using GCP zone from the local GCE cloud provider config file: {zone:?}");
            zone.to_string()
        }
        _ => {
            let zone = metadata.zone();
            tracing::debug!("using GCP zone from the metadata server: {zone:?}");
            zone.to_string()
        }
    };

    let project = match global.map(|g| g.project_id.as_str()) {
        Some(project) if !project.is_empty() => {
            tracing::debug!(
                "using GCP project ID from the local GCE cloud provider config file: {project:?}"
            );
            project.to_string()
        }
        _ => {
            // Not running in the control plane VM, or the file omits the
            // project: fall back to the metadata server.
            let project = metadata.project();
            tracing::debug!("using GCP project ID from the metadata server: {project:?}");
            project.to_string()
        }
    };

    (project, zone)
}
