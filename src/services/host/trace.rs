use crate::domain::constants::TRACE_EVENT_PREFIX;
use crate::domain::models::{ConfigurationError, HostError, ModuleNode};
use crate::services::host::{BuildHost, DirectIssuer, HostEvent, SharedIssuerLookup};
use crate::services::intercept::{OutputInterceptor, Stream};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Write;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase")]
enum TraceEvent {
    BeforeRun,
    ModuleVisited {
        identifier: String,
        #[serde(default)]
        resource: Option<String>,
        #[serde(default)]
        issuer: Option<String>,
    },
    Done,
}

#[derive(Debug, PartialEq)]
enum TraceLine {
    Event(TraceEvent),
    Output,
    Malformed(String),
}

/// Classifies one raw stdout line (terminator already stripped). Host output
/// is not required to be UTF-8; only event payloads are decoded.
fn parse_trace_line(line: &[u8]) -> TraceLine {
    let Some(payload) = line.strip_prefix(TRACE_EVENT_PREFIX.as_bytes()) else {
        return TraceLine::Output;
    };
    match serde_json::from_slice(payload) {
        Ok(event) => TraceLine::Event(event),
        Err(e) => TraceLine::Malformed(e.to_string()),
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Forwards one raw line, terminator included, in a single write so routing
/// sees the whole line at once.
fn forward_host_output(stream: Stream, line: &[u8]) {
    let mut writer = OutputInterceptor::global().writer(stream);
    let result = if line.ends_with(b"\n") {
        writer.write_all(line)
    } else {
        let mut terminated = line.to_vec();
        terminated.push(b'\n');
        writer.write_all(&terminated)
    };
    if let Err(e) = result {
        tracing::warn!(error = %e, "failed to forward host output");
    }
}

/// Runs a host build command that reports its module walk on stdout.
///
/// Event lines are `@@dep-finder-event {json}`; every other stdout line and
/// the whole of stderr is host output and goes through the routed channels.
pub struct TraceCommandHost {
    child: Child,
    stdout: BufReader<ChildStdout>,
    line: Vec<u8>,
    output_stream: Stream,
    stderr_pump: Option<JoinHandle<()>>,
    modules: HashMap<String, Arc<ModuleNode>>,
    // Earlier nodes for re-visited identifiers. Children hold only weak
    // issuer links, so these must outlive the scan.
    superseded: Vec<Arc<ModuleNode>>,
}

impl TraceCommandHost {
    pub fn spawn(program: &str, args: &[String]) -> Result<Self, ConfigurationError> {
        let spawn_err = |source| ConfigurationError::HostSpawn {
            command: std::iter::once(program)
                .chain(args.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" "),
            source,
        };
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_err)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_err(std::io::Error::other("host stdout not captured")))?;
        let stderr_pump = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr);
                let mut line = Vec::new();
                loop {
                    line.clear();
                    match reader.read_until(b'\n', &mut line).await {
                        Ok(0) => break,
                        Ok(_) => forward_host_output(Stream::Stderr, &line),
                        Err(e) => {
                            tracing::warn!(error = %e, "host stderr read failed");
                            break;
                        }
                    }
                }
            })
        });
        tracing::debug!(program, "host command started");

        Ok(Self {
            child,
            stdout: BufReader::new(stdout),
            line: Vec::new(),
            output_stream: Stream::Stdout,
            stderr_pump,
            modules: HashMap::new(),
            superseded: Vec::new(),
        })
    }

    /// Sends non-event stdout lines to `stream` instead of stdout.
    pub fn with_output_stream(mut self, stream: Stream) -> Self {
        self.output_stream = stream;
        self
    }

    fn visit(
        &mut self,
        identifier: String,
        resource: Option<String>,
        issuer: Option<String>,
    ) -> Arc<ModuleNode> {
        let issuer_node = issuer.and_then(|id| {
            let found = self.modules.get(&id).cloned();
            if found.is_none() {
                tracing::warn!(module = %identifier, issuer = %id, "issuer was never visited");
            }
            found
        });
        let node = match issuer_node {
            Some(issuer) => ModuleNode::issued_by(identifier.clone(), resource, &issuer),
            None => ModuleNode::root(identifier.clone(), resource),
        };
        if let Some(previous) = self.modules.insert(identifier, node.clone()) {
            tracing::trace!(module = %previous.identifier, "module visited again");
            self.superseded.push(previous);
        }
        node
    }
}

impl BuildHost for TraceCommandHost {
    fn issuer_lookup(&self) -> SharedIssuerLookup {
        Arc::new(DirectIssuer)
    }

    async fn next_event(&mut self) -> Result<Option<HostEvent>, HostError> {
        loop {
            self.line.clear();
            if self.stdout.read_until(b'\n', &mut self.line).await? == 0 {
                return Ok(None);
            }
            match parse_trace_line(trim_line_end(&self.line)) {
                TraceLine::Output => forward_host_output(self.output_stream, &self.line),
                TraceLine::Malformed(reason) => {
                    tracing::warn!(%reason, "skipping malformed host event");
                }
                TraceLine::Event(TraceEvent::BeforeRun) => return Ok(Some(HostEvent::BeforeRun)),
                TraceLine::Event(TraceEvent::Done) => return Ok(Some(HostEvent::Done)),
                TraceLine::Event(TraceEvent::ModuleVisited {
                    identifier,
                    resource,
                    issuer,
                }) => {
                    let node = self.visit(identifier, resource, issuer);
                    return Ok(Some(HostEvent::ModuleVisited(node)));
                }
            }
        }
    }

    async fn abort(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(error = %e, "host already exited");
        }
        let _ = self.child.wait().await;
        if let Some(pump) = self.stderr_pump.take() {
            pump.abort();
        }
    }

    async fn finish(&mut self) -> Result<(), HostError> {
        let status = self.child.wait().await?;
        if let Some(pump) = self.stderr_pump.take() {
            let _ = pump.await;
        }
        if status.success() {
            Ok(())
        } else {
            Err(HostError::Failed(status))
        }
    }
}
