use crate::domain::models::ScanState;
use crate::services::output::DisplaySink;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Formats one progress frame. Must not touch scan state.
pub type RenderFn = Arc<dyn Fn(Duration, &ScanState) -> String + Send + Sync>;

pub fn render_progress(elapsed: Duration, state: &ScanState) -> String {
    format!(
        "Elapsed Time: {:.2}s | Resources Scanned: {} | Processing: {}",
        elapsed.as_secs_f64(),
        state.resource_count,
        state.last_resource_or_na()
    )
}

struct Ticker {
    cancel: CancellationToken,
    render: RenderFn,
}

/// Periodically redraws the progress line while a scan runs.
///
/// Nothing is spawned when the display is not a live terminal, so piped
/// output only ever carries the final summary.
pub struct ProgressReporter {
    display: Arc<dyn DisplaySink>,
    ticker: Option<Ticker>,
    drawn: Arc<AtomicBool>,
}

impl ProgressReporter {
    pub fn new(display: Arc<dyn DisplaySink>) -> Self {
        Self {
            display,
            ticker: None,
            drawn: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn start(
        &mut self,
        interval: Duration,
        snapshots: watch::Receiver<ScanState>,
        render: RenderFn,
    ) {
        self.stop();
        if !self.display.is_interactive() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("no async runtime, progress ticker disabled");
            return;
        };

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let display = self.display.clone();
        let drawn = self.drawn.clone();
        let tick_render = render.clone();
        runtime.spawn(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + interval, interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticks.tick() => {
                        if token.is_cancelled() {
                            break;
                        }
                        let snapshot = snapshots.borrow().clone();
                        display.rewrite_line(&tick_render(snapshot.elapsed(), &snapshot));
                        drawn.store(true, Ordering::SeqCst);
                    }
                }
            }
        });

        self.ticker = Some(Ticker { cancel, render });
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    /// Draws a frame right away instead of waiting for the next tick.
    pub fn refresh(&self, state: &ScanState) {
        if let Some(ticker) = &self.ticker {
            self.display
                .rewrite_line(&(ticker.render)(state.elapsed(), state));
            self.drawn.store(true, Ordering::SeqCst);
        }
    }

    /// Idempotent; safe before `start`.
    pub fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel.cancel();
        }
    }

    /// Terminates a drawn progress line so the next diagnostic starts clean.
    pub fn finish_line(&self) {
        if self.drawn.swap(false, Ordering::SeqCst) {
            self.display.end_line();
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.stop();
    }
}
