use crate::domain::constants::DEFAULT_PROGRESS_INTERVAL_MS;
use crate::domain::models::{
    InclusionChain, MatchReport, ScanOutcomeKind, ScanPhase, ScanReport, ScanState,
};
use crate::services::chain::reconstruct;
use crate::services::host::{HostModule, IssuerLookup};
use crate::services::matcher::PatternMatcher;
use crate::services::output::{DiagnosticLog, DisplaySink};
use crate::services::progress::{render_progress, ProgressReporter, RenderFn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub halt_on_match: bool,
    pub progress_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            halt_on_match: true,
            progress_interval: Duration::from_millis(DEFAULT_PROGRESS_INTERVAL_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt,
}

/// Reacts to host lifecycle events: counts visited modules, tests them
/// against the pattern and reports inclusion chains.
///
/// `Idle → Scanning → (Matched | Completed)`. Without `halt_on_match` a
/// matched scan keeps going and reports every later match the same way.
pub struct ScanController {
    matcher: PatternMatcher,
    config: ControllerConfig,
    log: Arc<dyn DiagnosticLog>,
    reporter: ProgressReporter,
    render: RenderFn,
    phase: ScanPhase,
    state: ScanState,
    published: watch::Sender<ScanState>,
    matches: Vec<MatchReport>,
    finished_in: Option<Duration>,
}

impl ScanController {
    pub fn new(
        matcher: PatternMatcher,
        config: ControllerConfig,
        log: Arc<dyn DiagnosticLog>,
        display: Arc<dyn DisplaySink>,
    ) -> Self {
        let state = ScanState::new();
        let (published, _) = watch::channel(state.clone());
        Self {
            matcher,
            config,
            log,
            reporter: ProgressReporter::new(display),
            render: Arc::new(render_progress),
            phase: ScanPhase::Idle,
            state,
            published,
            matches: Vec::new(),
            finished_in: None,
        }
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    #[cfg(test)]
    pub fn progress_running(&self) -> bool {
        self.reporter.is_running()
    }

    fn halted(&self) -> bool {
        self.phase == ScanPhase::Matched && self.config.halt_on_match
    }

    fn publish(&self) {
        self.published.send_replace(self.state.clone());
    }

    fn start_progress(&mut self) {
        self.reporter.start(
            self.config.progress_interval,
            self.published.subscribe(),
            self.render.clone(),
        );
    }

    fn stop_progress(&mut self) {
        self.reporter.stop();
        self.reporter.finish_line();
    }

    fn begin_scan(&mut self) {
        self.state = ScanState::new();
        self.phase = ScanPhase::Scanning;
        self.publish();
        self.start_progress();
    }

    pub fn before_run(&mut self) {
        if self.phase != ScanPhase::Idle {
            tracing::debug!(phase = ?self.phase, "ignoring repeated beforeRun");
            return;
        }
        self.begin_scan();
        self.log.log("Starting dependency scan...");
    }

    pub fn module_visited<M, L>(&mut self, module: &M, lookup: &L) -> Flow
    where
        M: HostModule + Clone,
        L: IssuerLookup<M> + ?Sized,
    {
        match self.phase {
            ScanPhase::Idle => {
                tracing::debug!("module visited before beforeRun, starting scan");
                self.begin_scan();
            }
            ScanPhase::Completed => {
                tracing::debug!(module = module.identifier(), "module visited after done");
                return Flow::Continue;
            }
            _ if self.halted() => return Flow::Halt,
            _ => {}
        }

        let resource = module.resource();
        self.state.resource_count += 1;
        self.state.last_resource = resource.map(str::to_string);
        self.publish();
        self.reporter.refresh(&self.state);

        let Some(resource) = resource.filter(|r| self.matcher.matches(Some(r))) else {
            if resource.is_none() {
                tracing::trace!(module = module.identifier(), "module has no resource");
            }
            return Flow::Continue;
        };
        let resource = resource.to_string();
        self.on_match(&resource, module, lookup)
    }

    fn on_match<M, L>(&mut self, resource: &str, module: &M, lookup: &L) -> Flow
    where
        M: HostModule + Clone,
        L: IssuerLookup<M> + ?Sized,
    {
        self.stop_progress();
        let chain = reconstruct(module, lookup);

        self.state.matched = true;
        self.phase = ScanPhase::Matched;
        self.publish();

        self.log
            .log(&format!("Found target dependency: {resource}"));
        self.log.log(&format!("Pattern: {}", self.matcher.as_str()));
        self.log.log(&format!(
            "Inclusion chain ({} {}):",
            chain.len(),
            if chain.len() == 1 { "module" } else { "modules" }
        ));
        print_inclusion_chain(self.log.as_ref(), &chain);
        if let Some(at) = chain.cycle_at() {
            self.log.log(&format!("Issuer cycle detected at: {at}"));
        }
        self.matches.push(MatchReport::new(resource, &chain));

        if self.config.halt_on_match {
            self.finished_in = Some(self.state.elapsed());
            Flow::Halt
        } else {
            self.start_progress();
            Flow::Continue
        }
    }

    pub fn done(&mut self) {
        if self.phase == ScanPhase::Completed || self.halted() {
            return;
        }
        self.stop_progress();
        let elapsed = self.state.elapsed();
        self.finished_in = Some(elapsed);
        self.phase = ScanPhase::Completed;

        self.log.log(&format!(
            "Dependency scan completed in {:.2} seconds.",
            elapsed.as_secs_f64()
        ));
        self.log.log(&format!(
            "Total resources scanned: {}",
            self.state.resource_count
        ));
        self.log
            .log(&format!("Processed: {}", self.state.last_resource_or_na()));
    }

    /// Takes down the progress line when the scan ends without `done`
    /// (interrupt, host stream failure).
    pub fn abort(&mut self) {
        self.stop_progress();
    }

    pub fn report(&self) -> ScanReport {
        let elapsed = self.finished_in.unwrap_or_else(|| self.state.elapsed());
        ScanReport {
            pattern: self.matcher.as_str().to_string(),
            outcome: if self.matches.is_empty() {
                ScanOutcomeKind::Completed
            } else {
                ScanOutcomeKind::Matched
            },
            matches: self.matches.clone(),
            resources_scanned: self.state.resource_count,
            last_resource: self.state.last_resource.clone(),
            elapsed_seconds: (elapsed.as_secs_f64() * 100.0).round() / 100.0,
        }
    }
}

pub fn print_inclusion_chain(log: &dyn DiagnosticLog, chain: &InclusionChain) {
    for line in chain.indented_lines() {
        log.log(&line);
    }
}
