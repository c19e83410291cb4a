use crate::cli::Cli;
use crate::domain::constants::{DEFAULT_LOG_FILE_NAME, DEFAULT_PROGRESS_INTERVAL_MS};
use crate::domain::models::ConfigurationError;
use crate::services::matcher::PatternMatcher;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Optional TOML file; every key can also be given on the command line.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    pub dependency_pattern: Option<String>,
    pub halt_on_match: Option<bool>,
    pub show_host_output: Option<bool>,
    pub log_file: Option<PathBuf>,
    pub progress_interval_ms: Option<u64>,
    pub json: Option<bool>,
}

pub fn load_settings(path: &Path) -> Result<SettingsFile, ConfigurationError> {
    let settings_err = |reason: String| ConfigurationError::Settings {
        path: path.to_path_buf(),
        reason,
    };
    let raw = std::fs::read_to_string(path).map_err(|e| settings_err(e.to_string()))?;
    toml::from_str(&raw).map_err(|e| settings_err(e.to_string()))
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostSource {
    Stats(PathBuf),
    Command { program: String, args: Vec<String> },
}

#[derive(Debug)]
pub struct LocatorSettings {
    pub matcher: PatternMatcher,
    pub halt_on_match: bool,
    pub show_host_output: bool,
    pub log_file: PathBuf,
    pub progress_interval: Duration,
    pub json: bool,
    pub host: HostSource,
}

/// Log file next to the executable, falling back to the working directory.
pub fn default_log_file() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_LOG_FILE_NAME)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE_NAME))
}

/// Flags win over the settings file, the settings file over defaults. Each
/// boolean has an on and an off flag so either file value can be overridden.
/// The pattern is compiled here so a bad one fails before any scanning starts.
pub fn resolve(cli: &Cli, file: SettingsFile) -> Result<LocatorSettings, ConfigurationError> {
    let pattern = cli
        .dependency_pattern
        .clone()
        .or(file.dependency_pattern)
        .ok_or(ConfigurationError::MissingPattern)?;
    let matcher = PatternMatcher::new(&pattern)?;

    let host = match (&cli.stats, cli.command.split_first()) {
        (Some(stats), _) => HostSource::Stats(stats.clone()),
        (None, Some((program, args))) => HostSource::Command {
            program: program.clone(),
            args: args.to_vec(),
        },
        (None, None) => return Err(ConfigurationError::MissingHost),
    };

    Ok(LocatorSettings {
        matcher,
        halt_on_match: switch(cli.halt, cli.no_halt)
            .or(file.halt_on_match)
            .unwrap_or(true),
        show_host_output: switch(cli.show_host_output, cli.hide_host_output)
            .or(file.show_host_output)
            .unwrap_or(false),
        log_file: cli
            .log_file
            .clone()
            .or(file.log_file)
            .unwrap_or_else(default_log_file),
        progress_interval: Duration::from_millis(
            cli.progress_interval_ms
                .or(file.progress_interval_ms)
                .unwrap_or(DEFAULT_PROGRESS_INTERVAL_MS)
                .max(1),
        ),
        json: switch(cli.json, cli.no_json).or(file.json).unwrap_or(false),
        host,
    })
}

// clap's `overrides_with` leaves at most one of the pair set.
fn switch(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}
