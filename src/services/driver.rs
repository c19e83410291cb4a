use crate::domain::models::HostError;
use crate::services::controller::{Flow, ScanController};
use crate::services::host::{BuildHost, HostEvent};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Matched with `halt_on_match`; the host was stopped early.
    Halted,
    Completed,
    Interrupted,
}

/// Feeds host events to the controller until the host is done, a match
/// halts the scan or `interrupt` fires.
pub async fn run_scan<H: BuildHost>(
    host: &mut H,
    controller: &mut ScanController,
    interrupt: &CancellationToken,
) -> Result<ScanOutcome, HostError> {
    let lookup = host.issuer_lookup();

    loop {
        let event = tokio::select! {
            biased;
            _ = interrupt.cancelled() => {
                controller.abort();
                host.abort().await;
                return Ok(ScanOutcome::Interrupted);
            }
            event = host.next_event() => event,
        };
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                controller.abort();
                return Err(e);
            }
        };

        match event {
            Some(HostEvent::BeforeRun) => controller.before_run(),
            Some(HostEvent::ModuleVisited(module)) => {
                if controller.module_visited(&module, lookup.as_ref()) == Flow::Halt {
                    host.abort().await;
                    return Ok(ScanOutcome::Halted);
                }
            }
            Some(HostEvent::Done) => controller.done(),
            None => break,
        }
        // hosts that never block would otherwise starve the progress ticker
        tokio::task::yield_now().await;
    }

    controller.done();
    host.finish().await?;
    Ok(ScanOutcome::Completed)
}

#[cfg(test)]
mod tests {
    use super::{run_scan, ScanOutcome};
    use crate::domain::models::{HostError, ModuleNode};
    use crate::services::controller::{ControllerConfig, ScanController};
    use crate::services::host::{BuildHost, DirectIssuer, HostEvent, SharedIssuerLookup};
    use crate::services::matcher::PatternMatcher;
    use crate::services::output::testing::{RecordingDisplay, RecordingLog};
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    struct ScriptedHost {
        events: VecDeque<HostEvent>,
        _modules: Vec<Arc<ModuleNode>>,
        aborted: bool,
        finished: bool,
        stream_breaks: bool,
    }

    impl ScriptedHost {
        fn foo_bar_target() -> Self {
            let foo = ModuleNode::root("./foo.js", Some("foo.js".into()));
            let bar = ModuleNode::issued_by("./bar.js", Some("bar.js".into()), &foo);
            let target = ModuleNode::issued_by("./target.js", Some("target.js".into()), &bar);
            let modules = vec![foo, bar, target];
            let mut events: VecDeque<HostEvent> = modules
                .iter()
                .cloned()
                .map(HostEvent::ModuleVisited)
                .collect();
            events.push_front(HostEvent::BeforeRun);
            events.push_back(HostEvent::Done);
            Self {
                events,
                _modules: modules,
                aborted: false,
                finished: false,
                stream_breaks: false,
            }
        }
    }

    impl BuildHost for ScriptedHost {
        fn issuer_lookup(&self) -> SharedIssuerLookup {
            Arc::new(DirectIssuer)
        }

        async fn next_event(&mut self) -> Result<Option<HostEvent>, HostError> {
            match self.events.pop_front() {
                Some(HostEvent::Done) if self.stream_breaks => Err(HostError::Stream(
                    std::io::Error::new(std::io::ErrorKind::BrokenPipe, "host went away"),
                )),
                event => Ok(event),
            }
        }

        async fn abort(&mut self) {
            self.aborted = true;
        }

        async fn finish(&mut self) -> Result<(), HostError> {
            self.finished = true;
            Ok(())
        }
    }

    fn controller(pattern: &str) -> (ScanController, Arc<RecordingLog>) {
        let log = Arc::new(RecordingLog::default());
        let c = ScanController::new(
            PatternMatcher::new(pattern).unwrap(),
            ControllerConfig::default(),
            log.clone(),
            Arc::new(RecordingDisplay::default()),
        );
        (c, log)
    }

    #[tokio::test]
    async fn halts_and_aborts_host_on_match() {
        let mut host = ScriptedHost::foo_bar_target();
        let (mut c, log) = controller("target");

        let outcome = run_scan(&mut host, &mut c, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, ScanOutcome::Halted);
        assert!(host.aborted);
        assert!(!host.finished);
        assert!(log
            .lines()
            .contains(&"Found target dependency: target.js".to_string()));
        assert_eq!(
            c.report().matches[0].chain,
            ["foo.js", "bar.js", "target.js"]
        );
    }

    #[tokio::test]
    async fn completes_when_nothing_matches() {
        let mut host = ScriptedHost::foo_bar_target();
        let (mut c, log) = controller("react-dom");

        let outcome = run_scan(&mut host, &mut c, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, ScanOutcome::Completed);
        assert!(host.finished);
        let lines = log.lines();
        assert!(!lines.iter().any(|l| l.starts_with("Found target dependency")));
        assert_eq!(
            lines
                .iter()
                .filter(|l| l.starts_with("Dependency scan completed"))
                .count(),
            1
        );
        assert!(lines.contains(&"Total resources scanned: 3".to_string()));
    }

    #[tokio::test]
    async fn interrupt_aborts_host() {
        let mut host = ScriptedHost::foo_bar_target();
        let (mut c, _log) = controller("target");
        let interrupt = CancellationToken::new();
        interrupt.cancel();

        let outcome = run_scan(&mut host, &mut c, &interrupt).await.unwrap();

        assert_eq!(outcome, ScanOutcome::Interrupted);
        assert!(host.aborted);
        assert_eq!(c.report().resources_scanned, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stream_failure_takes_down_progress_line() {
        let mut host = ScriptedHost::foo_bar_target();
        host.stream_breaks = true;
        let display = Arc::new(RecordingDisplay::interactive());
        let mut c = ScanController::new(
            PatternMatcher::new("react-dom").unwrap(),
            ControllerConfig::default(),
            Arc::new(RecordingLog::default()),
            display.clone(),
        );

        let err = run_scan(&mut host, &mut c, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, HostError::Stream(_)));
        assert!(!c.progress_running());
        assert_eq!(display.line_ends(), 1);
    }
}
