use crate::domain::constants::NO_RESOURCE;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Serialize)]
pub struct JsonOut<T: Serialize> {
    pub ok: bool,
    pub data: T,
}

/// Read-only view of a module handed over by the host build.
///
/// The host owns module lifetimes; `issuer` is only a weak back-reference so
/// the engine never keeps parts of the host graph alive.
#[derive(Debug)]
pub struct ModuleNode {
    pub identifier: String,
    pub resource: Option<String>,
    pub issuer: Option<Weak<ModuleNode>>,
}

impl ModuleNode {
    pub fn root(identifier: impl Into<String>, resource: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            identifier: identifier.into(),
            resource,
            issuer: None,
        })
    }

    pub fn issued_by(
        identifier: impl Into<String>,
        resource: Option<String>,
        issuer: &Arc<ModuleNode>,
    ) -> Arc<Self> {
        Arc::new(Self {
            identifier: identifier.into(),
            resource,
            issuer: Some(Arc::downgrade(issuer)),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Scanning,
    Matched,
    Completed,
}

/// Counters the controller publishes to the progress ticker.
#[derive(Debug, Clone)]
pub struct ScanState {
    pub started_at: Instant,
    pub resource_count: u64,
    pub last_resource: Option<String>,
    pub matched: bool,
}

impl ScanState {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            resource_count: 0,
            last_resource: None,
            matched: false,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn last_resource_or_na(&self) -> &str {
        self.last_resource.as_deref().unwrap_or(NO_RESOURCE)
    }
}

impl Default for ScanState {
    fn default() -> Self {
        Self::new()
    }
}

/// Root-first list of resource identifiers ending at the matched module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionChain {
    links: Vec<String>,
    cycle_at: Option<String>,
}

impl InclusionChain {
    /// Builds the chain from a leaf-first walk.
    pub fn from_walk(mut walked: Vec<String>, cycle_at: Option<String>) -> Self {
        walked.reverse();
        Self {
            links: walked,
            cycle_at,
        }
    }

    pub fn links(&self) -> &[String] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Identifier whose reappearance stopped the walk, if the issuer relation
    /// looped back on itself.
    pub fn cycle_at(&self) -> Option<&str> {
        self.cycle_at.as_deref()
    }

    pub fn indented_lines(&self) -> Vec<String> {
        self.links
            .iter()
            .enumerate()
            .map(|(depth, link)| format!("{}{}", " ".repeat(depth * 2), link))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MatchReport {
    pub resource: String,
    pub chain: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_at: Option<String>,
}

impl MatchReport {
    pub fn new(resource: &str, chain: &InclusionChain) -> Self {
        Self {
            resource: resource.to_string(),
            chain: chain.links().to_vec(),
            cycle_at: chain.cycle_at().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScanOutcomeKind {
    Matched,
    Completed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub pattern: String,
    pub outcome: ScanOutcomeKind,
    pub matches: Vec<MatchReport>,
    pub resources_scanned: u64,
    pub last_resource: Option<String>,
    pub elapsed_seconds: f64,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigurationError {
    #[error("Invalid regular expression provided for `dependency-pattern`: {0}")]
    InvalidPattern(#[source] regex::Error),
    #[error("a dependency pattern is required (--dependency-pattern or `dependency_pattern` in settings)")]
    MissingPattern,
    #[error("no host to scan: pass --stats <FILE> or a host command after `--`")]
    MissingHost,
    #[error("unable to read settings file {}: {reason}", path.display())]
    Settings { path: PathBuf, reason: String },
    #[error("unable to load stats file {}: {reason}", path.display())]
    Stats { path: PathBuf, reason: String },
    #[error("unable to start host command `{command}`: {source}")]
    HostSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum HostError {
    #[error("host build exited with {0}")]
    Failed(std::process::ExitStatus),
    #[error("host event stream failed: {0}")]
    Stream(#[from] std::io::Error),
}
