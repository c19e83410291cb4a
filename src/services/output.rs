use crate::domain::models::JsonOut;
use crate::services::intercept::{OutputInterceptor, Stream};
use serde::Serialize;
use std::io::{IsTerminal, Write};

/// Sink for the engine's human-readable diagnostics.
pub trait DiagnosticLog: Send + Sync {
    fn log(&self, message: &str);
}

/// Writes diagnostics on the engine's console channel, past any interception.
pub struct ConsoleLog {
    stream: Stream,
}

impl ConsoleLog {
    pub fn stdout() -> Self {
        Self {
            stream: Stream::Stdout,
        }
    }

    /// Keeps stdout free for `--json` output.
    pub fn stderr() -> Self {
        Self {
            stream: Stream::Stderr,
        }
    }
}

impl DiagnosticLog for ConsoleLog {
    fn log(&self, message: &str) {
        let interceptor = OutputInterceptor::global();
        match self.stream {
            Stream::Stdout => interceptor.output_to_console(message, None),
            Stream::Stderr => {
                let mut console = interceptor.console(Stream::Stderr);
                if let Err(e) = writeln!(console, "{message}").and_then(|_| console.flush()) {
                    tracing::warn!(error = %e, "console write failed");
                }
            }
        }
    }
}

/// Where the progress line is drawn.
pub trait DisplaySink: Send + Sync {
    fn is_interactive(&self) -> bool;
    /// Replaces the current line with `line`.
    fn rewrite_line(&self, line: &str);
    /// Moves past a drawn progress line.
    fn end_line(&self);
}

pub struct TerminalDisplay {
    interactive: bool,
}

impl TerminalDisplay {
    pub fn detect() -> Self {
        Self {
            interactive: std::io::stdout().is_terminal(),
        }
    }

    pub fn disabled() -> Self {
        Self { interactive: false }
    }

    fn write(&self, text: &str) {
        let mut console = OutputInterceptor::global().console(Stream::Stdout);
        if let Err(e) = console
            .write_all(text.as_bytes())
            .and_then(|_| console.flush())
        {
            tracing::warn!(error = %e, "progress write failed");
        }
    }
}

impl DisplaySink for TerminalDisplay {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn rewrite_line(&self, line: &str) {
        // clear the line, back to column zero
        self.write(&format!("\r\x1b[2K{line}"));
    }

    fn end_line(&self) {
        self.write("\n");
    }
}

pub fn print_json<T: Serialize>(data: T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(&JsonOut { ok: true, data })?;
    let mut console = OutputInterceptor::global().console(Stream::Stdout);
    writeln!(console, "{text}")?;
    console.flush()?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{DiagnosticLog, DisplaySink};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingLog {
        lines: Mutex<Vec<String>>,
    }

    impl RecordingLog {
        pub fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }
    }

    impl DiagnosticLog for RecordingLog {
        fn log(&self, message: &str) {
            self.lines.lock().unwrap().push(message.to_string());
        }
    }

    #[derive(Default)]
    pub struct RecordingDisplay {
        pub interactive: bool,
        frames: Mutex<Vec<String>>,
        line_ends: AtomicUsize,
    }

    impl RecordingDisplay {
        pub fn interactive() -> Self {
            Self {
                interactive: true,
                ..Self::default()
            }
        }

        pub fn frames(&self) -> Vec<String> {
            self.frames.lock().unwrap().clone()
        }

        pub fn line_ends(&self) -> usize {
            self.line_ends.load(Ordering::SeqCst)
        }
    }

    impl DisplaySink for RecordingDisplay {
        fn is_interactive(&self) -> bool {
            self.interactive
        }

        fn rewrite_line(&self, line: &str) {
            self.frames.lock().unwrap().push(line.to_string());
        }

        fn end_line(&self) {
            self.line_ends.fetch_add(1, Ordering::SeqCst);
        }
    }
}
