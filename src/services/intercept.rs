//! Standard output interception.
//!
//! While a session is active, the two standard channels are swapped for
//! wrappers that send host output to a log sink. The engine itself never has
//! to win that routing decision: its diagnostics go through [`ConsoleWriter`],
//! which always targets the original channel. Writers that share the routed
//! channel can still reach the terminal by carrying [`ENGINE_MARKER`].
//!
//! The process-wide interceptor (`OutputInterceptor::global`) restores the
//! original channels on panic and on [`terminate`], so an aborted scan never
//! leaves the process redirected.

use crate::domain::constants::ENGINE_MARKER;
use crate::services::output::DiagnosticLog;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Once, OnceLock, PoisonError};

pub type SharedSink = Arc<Mutex<Box<dyn Write + Send>>>;

pub fn shared_sink(writer: impl Write + Send + 'static) -> SharedSink {
    Arc::new(Mutex::new(Box::new(writer)))
}

fn lock(sink: &SharedSink) -> MutexGuard<'_, Box<dyn Write + Send>> {
    sink.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

#[derive(Clone)]
pub struct StdChannels {
    pub stdout: SharedSink,
    pub stderr: SharedSink,
}

impl StdChannels {
    pub fn process() -> Self {
        Self {
            stdout: shared_sink(io::stdout()),
            stderr: shared_sink(io::stderr()),
        }
    }

    /// Reference identity, not content equality.
    #[cfg(test)]
    pub fn same_as(&self, other: &StdChannels) -> bool {
        Arc::ptr_eq(&self.stdout, &other.stdout) && Arc::ptr_eq(&self.stderr, &other.stderr)
    }

    fn get(&self, stream: Stream) -> &SharedSink {
        match stream {
            Stream::Stdout => &self.stdout,
            Stream::Stderr => &self.stderr,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum InterceptError {
    #[error("an output interception session is already active")]
    SessionActive,
    #[error("unable to open host output log {}: {source}", path.display())]
    LogSink {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Opens the host output log in append mode and stamps the session start.
pub fn open_log_file(path: &Path) -> Result<SharedSink, InterceptError> {
    let sink_err = |source| InterceptError::LogSink {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(sink_err)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(sink_err)?;
    writeln!(
        file,
        "=== dep-finder session {} ===",
        chrono::Local::now().to_rfc3339()
    )
    .map_err(sink_err)?;
    Ok(shared_sink(file))
}

fn contains_marker(buf: &[u8]) -> bool {
    let marker = ENGINE_MARKER.as_bytes();
    buf.windows(marker.len()).any(|w| w == marker)
}

/// Installed in place of a standard channel for the length of a session.
struct MarkerFilter {
    original: SharedSink,
    log: SharedSink,
}

impl Write for MarkerFilter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let target = if contains_marker(buf) {
            &self.original
        } else {
            &self.log
        };
        lock(target).write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        lock(&self.original).flush()?;
        lock(&self.log).flush()
    }
}

struct Session {
    id: u64,
    originals: StdChannels,
    log: SharedSink,
}

struct Routing {
    installed: StdChannels,
    session: Option<Session>,
}

pub struct OutputInterceptor {
    routing: Mutex<Routing>,
    next_session: AtomicU64,
    restore_on_exit: bool,
}

impl OutputInterceptor {
    pub fn new(channels: StdChannels) -> Self {
        Self {
            routing: Mutex::new(Routing {
                installed: channels,
                session: None,
            }),
            next_session: AtomicU64::new(1),
            restore_on_exit: false,
        }
    }

    /// The interceptor wired to the real process stdout/stderr.
    pub fn global() -> &'static OutputInterceptor {
        static GLOBAL: OnceLock<OutputInterceptor> = OnceLock::new();
        GLOBAL.get_or_init(|| Self {
            restore_on_exit: true,
            ..Self::new(StdChannels::process())
        })
    }

    fn routing(&self) -> MutexGuard<'_, Routing> {
        self.routing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Channels writes are currently routed to.
    #[cfg(test)]
    pub fn channels(&self) -> StdChannels {
        self.routing().installed.clone()
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.routing().session.is_some()
    }

    fn original(&self, stream: Stream) -> SharedSink {
        let routing = self.routing();
        let channels = routing
            .session
            .as_ref()
            .map(|s| &s.originals)
            .unwrap_or(&routing.installed);
        channels.get(stream).clone()
    }

    fn routed(&self, stream: Stream) -> SharedSink {
        self.routing().installed.get(stream).clone()
    }

    pub fn begin_session(&self, log: SharedSink) -> Result<InterceptionGuard<'_>, InterceptError> {
        let mut routing = self.routing();
        if routing.session.is_some() {
            return Err(InterceptError::SessionActive);
        }
        if self.restore_on_exit {
            register_exit_restoration();
        }

        let originals = routing.installed.clone();
        let wrap = |original: &SharedSink| {
            shared_sink(MarkerFilter {
                original: original.clone(),
                log: log.clone(),
            })
        };
        routing.installed = StdChannels {
            stdout: wrap(&originals.stdout),
            stderr: wrap(&originals.stderr),
        };

        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        routing.session = Some(Session { id, originals, log });
        // The tracing subscriber writes through the routed channel.
        drop(routing);
        tracing::debug!(session = id, "output interception started");
        Ok(InterceptionGuard {
            interceptor: self,
            id,
        })
    }

    /// Restores the original channels and releases the log sink. Returns
    /// whether a session was active.
    pub fn end_session(&self) -> bool {
        let session = {
            let mut routing = self.routing();
            let Some(session) = routing.session.take() else {
                return false;
            };
            routing.installed = session.originals.clone();
            session
        };
        if let Err(e) = lock(&session.log).flush() {
            tracing::warn!(error = %e, "failed to flush host output log");
        }
        tracing::debug!(session = session.id, "output interception ended");
        true
    }

    fn end_session_if(&self, id: u64) {
        let current = self.routing().session.as_ref().map(|s| s.id);
        if current == Some(id) {
            self.end_session();
        }
    }

    // Panic hooks run before unwinding releases any held guard, so never
    // block on the routing lock here.
    fn restore_quietly(&self) {
        let Ok(mut routing) = self.routing.try_lock() else {
            return;
        };
        if let Some(session) = routing.session.take() {
            routing.installed = session.originals;
            if let Ok(mut log) = session.log.try_lock() {
                let _ = log.flush();
            }
        }
    }

    /// Writer for host output; follows the current routing on every write.
    pub fn writer(&self, stream: Stream) -> RoutedWriter<'_> {
        RoutedWriter {
            interceptor: self,
            stream,
        }
    }

    /// Tagged engine channel; always reaches the original stream.
    pub fn console(&self, stream: Stream) -> ConsoleWriter<'_> {
        ConsoleWriter {
            interceptor: self,
            stream,
        }
    }

    pub fn output_to_console(&self, message: &str, mirror: Option<&dyn DiagnosticLog>) {
        let mut console = self.console(Stream::Stdout);
        if let Err(e) = writeln!(console, "{message}").and_then(|_| console.flush()) {
            tracing::warn!(error = %e, "console write failed");
        }
        if let Some(log) = mirror {
            log.log(message);
        }
    }
}

/// Ends its session when dropped, whichever way the scope is left.
pub struct InterceptionGuard<'a> {
    interceptor: &'a OutputInterceptor,
    id: u64,
}

impl Drop for InterceptionGuard<'_> {
    fn drop(&mut self) {
        self.interceptor.end_session_if(self.id);
    }
}

pub struct RoutedWriter<'a> {
    interceptor: &'a OutputInterceptor,
    stream: Stream,
}

impl Write for RoutedWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let sink = self.interceptor.routed(self.stream);
        let written = lock(&sink).write(buf)?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        let sink = self.interceptor.routed(self.stream);
        let result = lock(&sink).flush();
        result
    }
}

pub struct ConsoleWriter<'a> {
    interceptor: &'a OutputInterceptor,
    stream: Stream,
}

impl Write for ConsoleWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let sink = self.interceptor.original(self.stream);
        let written = lock(&sink).write(buf)?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        let sink = self.interceptor.original(self.stream);
        let result = lock(&sink).flush();
        result
    }
}

fn register_exit_restoration() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            OutputInterceptor::global().restore_quietly();
            previous(info);
        }));
    });
}

/// Exits the process after handing the standard channels back.
pub fn terminate(code: i32) -> ! {
    let interceptor = OutputInterceptor::global();
    interceptor.end_session();
    let _ = interceptor.console(Stream::Stdout).flush();
    let _ = interceptor.console(Stream::Stderr).flush();
    std::process::exit(code)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    /// In-memory sink whose contents stay readable after being boxed.
    #[derive(Clone, Default)]
    pub struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        pub fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
        }
    }

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
