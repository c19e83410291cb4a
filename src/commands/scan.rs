use crate::cli::Cli;
use crate::services::controller::{ControllerConfig, ScanController};
use crate::services::driver::{run_scan, ScanOutcome};
use crate::services::host::{StatsReplayHost, TraceCommandHost};
use crate::services::intercept::{open_log_file, OutputInterceptor, Stream};
use crate::services::output::{print_json, ConsoleLog, DiagnosticLog, DisplaySink, TerminalDisplay};
use crate::services::settings::{load_settings, resolve, HostSource, LocatorSettings, SettingsFile};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const EXIT_INTERRUPTED: i32 = 130;

enum PreparedHost {
    Stats(StatsReplayHost),
    // spawned once interception is in place
    Command { program: String, args: Vec<String> },
}

/// Validates configuration, then runs one scan on a single-threaded runtime.
/// Returns the process exit code.
pub fn handle_scan(cli: &Cli) -> anyhow::Result<i32> {
    let file = match &cli.settings {
        Some(path) => load_settings(path)?,
        None => SettingsFile::default(),
    };
    let settings = resolve(cli, file)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(scan(settings))
}

async fn scan(settings: LocatorSettings) -> anyhow::Result<i32> {
    // Bad stats files are configuration errors: fail before touching output.
    let host = match settings.host {
        HostSource::Stats(path) => {
            let host = StatsReplayHost::load(&path)?;
            tracing::debug!(path = %path.display(), modules = host.module_count(), "replaying stats file");
            PreparedHost::Stats(host)
        }
        HostSource::Command { program, args } => PreparedHost::Command { program, args },
    };

    let (log, display): (Arc<dyn DiagnosticLog>, Arc<dyn DisplaySink>) = if settings.json {
        (Arc::new(ConsoleLog::stderr()), Arc::new(TerminalDisplay::disabled()))
    } else {
        (Arc::new(ConsoleLog::stdout()), Arc::new(TerminalDisplay::detect()))
    };

    let _session = if settings.show_host_output {
        None
    } else {
        match open_log_file(&settings.log_file)
            .and_then(|sink| OutputInterceptor::global().begin_session(sink))
        {
            Ok(guard) => Some(guard),
            Err(e) => {
                tracing::warn!(error = %e, "host output interception disabled");
                log.log(&format!(
                    "Warning: {e}; host output will not be suppressed"
                ));
                None
            }
        }
    };

    let interrupt = CancellationToken::new();
    let on_signal = interrupt.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let mut controller = ScanController::new(
        settings.matcher,
        ControllerConfig {
            halt_on_match: settings.halt_on_match,
            progress_interval: settings.progress_interval,
        },
        log.clone(),
        display,
    );

    let outcome = match host {
        PreparedHost::Stats(mut host) => run_scan(&mut host, &mut controller, &interrupt).await?,
        PreparedHost::Command { program, args } => {
            let mut host = TraceCommandHost::spawn(&program, &args)?;
            if settings.json {
                // stdout carries only the report
                host = host.with_output_stream(Stream::Stderr);
            }
            run_scan(&mut host, &mut controller, &interrupt).await?
        }
    };

    tracing::debug!(phase = ?controller.phase(), ?outcome, "scan finished");
    if settings.json {
        print_json(controller.report())?;
    }

    match outcome {
        ScanOutcome::Halted => Ok(0),
        ScanOutcome::Completed => {
            log.log("Host build completed successfully.");
            Ok(0)
        }
        ScanOutcome::Interrupted => {
            log.log("Scan interrupted.");
            Ok(EXIT_INTERRUPTED)
        }
    }
}
