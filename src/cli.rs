use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "dep-finder",
    version,
    about = "Find the import chain that pulls a module into a bundle"
)]
pub struct Cli {
    #[arg(
        short = 'd',
        long,
        value_name = "PATTERN",
        help = "Regex matched against each module's resource path"
    )]
    pub dependency_pattern: Option<String>,
    #[arg(
        short = 's',
        long,
        value_name = "FILE",
        conflicts_with = "command",
        help = "Replay the module graph recorded in a bundler stats JSON file"
    )]
    pub stats: Option<PathBuf>,
    #[arg(
        long,
        overrides_with = "halt",
        help = "Keep scanning after a match and report every one"
    )]
    pub no_halt: bool,
    #[arg(long, overrides_with = "no_halt", help = "Stop at the first match (default)")]
    pub halt: bool,
    #[arg(
        long,
        overrides_with = "hide_host_output",
        help = "Let host output through instead of writing it to the log file"
    )]
    pub show_host_output: bool,
    #[arg(
        long,
        overrides_with = "show_host_output",
        help = "Write host output to the log file (default)"
    )]
    pub hide_host_output: bool,
    #[arg(long, value_name = "FILE", help = "Where intercepted host output is appended")]
    pub log_file: Option<PathBuf>,
    #[arg(long, value_name = "MS", help = "Progress refresh cadence")]
    pub progress_interval_ms: Option<u64>,
    #[arg(long, value_name = "FILE", help = "TOML settings file")]
    pub settings: Option<PathBuf>,
    #[arg(long, overrides_with = "no_json", help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(long, overrides_with = "json", help = "Output human-readable text (default)")]
    pub no_json: bool,
    #[arg(
        last = true,
        value_name = "HOST_COMMAND",
        help = "Host build command emitting a dep-finder event trace"
    )]
    pub command: Vec<String>,
}
