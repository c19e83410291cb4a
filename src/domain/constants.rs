/// Substring that marks a write as the engine's own output when it travels
/// through a routed (interceptable) channel.
pub const ENGINE_MARKER: &str = "[dep-finder]";

/// Prefix of a host trace line carrying a JSON lifecycle event.
pub const TRACE_EVENT_PREFIX: &str = "@@dep-finder-event ";

pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 1000;

pub const DEFAULT_LOG_FILE_NAME: &str = "dep-finder.log";

/// Env filter directive for the internal `tracing` subscriber.
pub const LOG_FILTER_ENV: &str = "DEP_FINDER_LOG";

/// Placeholder shown when no resource has been processed yet.
pub const NO_RESOURCE: &str = "N/A";
