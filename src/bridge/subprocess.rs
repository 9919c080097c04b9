//! Agent process supervisor.
//!
//! Launches the agent CLI once per query with:
//! - `env_clear()` plus a platform allowlist and the agent credentials, so
//!   nothing else from the bridge's environment leaks into the child.
//! - a per-session tool descriptor passed via `--mcp-config`.
//! - stdin closed, stdout parsed into [`StreamEvent`]s, stderr drained for
//!   diagnostics only.
//!
//! The session's busy flag and descriptor are released through the
//! [`InFlight`] guard on every exit path.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::process::Command;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::{AgentTransport, EventSink, QueryFuture, QueryOutcome};
use crate::config::{BridgeConfig, Credentials};
use crate::descriptor::DescriptorStore;
use crate::models::event::StreamEvent;
use crate::models::session::{InFlight, Session};
use crate::stream::codec::{Frame, LineCodec, MAX_LINE_BYTES};
use crate::stream::parser::parse_line;
use crate::util::truncate_text;
use crate::{AppError, Result};

// ── Environment allowlist ────────────────────────────────────────────────────

/// Environment variables inherited by the agent process.
///
/// Every other variable is stripped via `env_clear()`; credentials are added
/// explicitly from [`Credentials`].
pub const ALLOWED_ENV_VARS: &[&str] = &[
    "PATH",
    "HOME",
    "USER",
    "LANG",
    "TMPDIR",
    "RUST_LOG",
    // Windows-specific variables.
    "USERPROFILE",
    "SystemRoot",
    "TEMP",
    "TMP",
    "USERNAME",
    "APPDATA",
    "LOCALAPPDATA",
    "COMSPEC",
];

// ── Configuration ────────────────────────────────────────────────────────────

/// How to launch the agent CLI.
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Program followed by any leading arguments (e.g. `npx`, `@anthropic-ai/claude-code`).
    pub program: Vec<String>,
    /// Flags placed before the descriptor flag and the message.
    pub args: Vec<String>,
    /// Working directory of the child.
    pub workspace_root: PathBuf,
    /// Trailing stderr lines kept for diagnostics on abnormal exit.
    pub stderr_tail_lines: usize,
}

impl SpawnConfig {
    /// Build the spawn settings described by the bridge configuration.
    #[must_use]
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            program: config.agent_command(),
            args: config.agent_cli_args.clone(),
            workspace_root: config.workspace_root.clone(),
            stderr_tail_lines: config.stderr_tail_lines,
        }
    }

    /// Full argument vector for one query, program first.
    #[must_use]
    pub fn command_line(&self, descriptor: &Path, message: &str) -> Vec<String> {
        let mut line = self.program.clone();
        line.extend(self.args.iter().cloned());
        line.push("--mcp-config".to_owned());
        line.push(descriptor.to_string_lossy().into_owned());
        line.push("--".to_owned());
        line.push(message.to_owned());
        line
    }
}

// ── Transport ────────────────────────────────────────────────────────────────

/// Transport that runs the agent as a local child process per query.
#[derive(Debug, Clone)]
pub struct SubprocessTransport {
    spawn: SpawnConfig,
    descriptors: DescriptorStore,
    credentials: Credentials,
}

impl SubprocessTransport {
    /// Create a transport from explicit parts.
    #[must_use]
    pub fn new(spawn: SpawnConfig, descriptors: DescriptorStore, credentials: Credentials) -> Self {
        Self {
            spawn,
            descriptors,
            credentials,
        }
    }

    /// Create a transport from the bridge configuration and the given credentials.
    #[must_use]
    pub fn from_config(config: &BridgeConfig, credentials: Credentials) -> Self {
        Self::new(
            SpawnConfig::from_config(config),
            DescriptorStore::from_config(config),
            credentials,
        )
    }

    /// Run one query to completion.
    ///
    /// Returns [`QueryOutcome::Dropped`] without spawning anything when the
    /// session already has a query in flight. Every failure (missing
    /// credentials, spawn failure, stream failure, non-zero exit) is
    /// delivered as exactly one `error` event.
    pub async fn invoke(
        &self,
        session: &Session,
        message: &str,
        sink: &dyn EventSink,
    ) -> QueryOutcome {
        let Some(flight) = session.try_begin() else {
            debug!(session_id = session.id(), "session busy, dropping message");
            return QueryOutcome::Dropped;
        };

        let span = info_span!("agent_query", session_id = session.id());
        if let Err(err) = self.run(&flight, message, sink).instrument(span).await {
            error!(session_id = session.id(), %err, "agent query failed");
            sink.deliver(StreamEvent::error(err.client_message()));
        }

        drop(flight);
        QueryOutcome::Completed
    }

    async fn run(&self, flight: &InFlight<'_>, message: &str, sink: &dyn EventSink) -> Result<()> {
        let credentials = self.credentials.env_vars()?;
        let session_id = flight.session().id();

        let descriptor = self.descriptors.materialize(session_id)?;
        flight.attach_descriptor(descriptor.clone());

        let command_line = self.spawn.command_line(&descriptor, message);
        let (program, args) = command_line
            .split_first()
            .ok_or_else(|| AppError::Config("agent command is empty".into()))?;

        let mut cmd = Command::new(program);
        cmd.args(args);

        cmd.env_clear();
        for &key in ALLOWED_ENV_VARS {
            if let Ok(val) = std::env::var(key) {
                cmd.env(key, val);
            }
        }
        for (key, value) in credentials {
            cmd.env(key, value);
        }

        cmd.current_dir(&self.spawn.workspace_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            descriptor = %descriptor.display(),
            command = %command_line.join(" "),
            "launching agent"
        );

        let mut child = cmd.spawn().map_err(|err| AppError::Spawn(format!("{program}: {err}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Spawn("failed to capture agent stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::Spawn("failed to capture agent stderr".into()))?;

        info!(pid = child.id().unwrap_or(0), "agent process spawned");

        let cancel = CancellationToken::new();
        let stderr_task = tokio::spawn(
            drain_stderr(stderr, self.spawn.stderr_tail_lines, cancel.clone())
                .instrument(tracing::Span::current()),
        );

        let pumped = pump_events(stdout, sink).await;

        // stderr has no end-of-input of its own while the child lives.
        cancel.cancel();
        let tail = stderr_task.await.unwrap_or_else(|err| {
            warn!(%err, "stderr reader failed");
            Vec::new()
        });

        if let Err(err) = pumped {
            warn!(%err, "agent output unreadable, stopping agent");
            if let Err(kill_err) = child.kill().await {
                warn!(%kill_err, "failed to stop agent");
            }
            return Err(err);
        }

        let status = child
            .wait()
            .await
            .map_err(|err| AppError::Io(format!("failed to wait for agent: {err}")))?;

        if status.success() {
            info!("agent process finished");
            return Ok(());
        }

        error!(
            exit_code = ?status.code(),
            command = %command_line.join(" "),
            "agent exited unsuccessfully"
        );
        for line in &tail {
            error!(line = %line, "agent stderr");
        }
        Err(AppError::ProcessExit {
            code: status.code(),
        })
    }
}

impl AgentTransport for SubprocessTransport {
    fn name(&self) -> &'static str {
        "subprocess"
    }

    fn query<'a>(
        &'a self,
        session: &'a Session,
        message: &'a str,
        sink: &'a dyn EventSink,
    ) -> QueryFuture<'a> {
        Box::pin(self.invoke(session, message, sink))
    }
}

// ── Stream readers ───────────────────────────────────────────────────────────

/// Read agent output line by line, delivering every parsed event in order.
///
/// Non-UTF-8, undecodable, unrecognised and over-long lines are skipped.
/// Returns the number of events delivered.
///
/// # Errors
///
/// Returns `AppError::Io` when the underlying stream fails.
pub async fn pump_events<R>(reader: R, sink: &dyn EventSink) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut framed = FramedRead::new(reader, LineCodec::new());
    let mut delivered = 0;

    while let Some(item) = framed.next().await {
        match item? {
            Frame::Line(line) => {
                if let Some(event) = parse_line(&line) {
                    sink.deliver(event);
                    delivered += 1;
                }
            }
            Frame::Invalid(bytes) => {
                warn!(
                    line = %truncate_text(&String::from_utf8_lossy(&bytes), 100),
                    "agent stdout: line is not UTF-8, skipping"
                );
            }
            Frame::Oversized => {
                warn!(max_bytes = MAX_LINE_BYTES, "agent stdout: line too long, skipping");
            }
        }
    }

    Ok(delivered)
}

/// Drain agent stderr for diagnostics, keeping the last `keep` lines.
///
/// Lines already buffered are consumed before `cancel` is honoured; once the
/// stream has nothing ready the reader stops on cancellation.
pub async fn drain_stderr<R>(reader: R, keep: usize, cancel: CancellationToken) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut framed = FramedRead::new(reader, LineCodec::new());
    let mut tail = VecDeque::with_capacity(keep);

    loop {
        tokio::select! {
            biased;

            item = framed.next() => match item {
                None => break,
                Some(Ok(Frame::Oversized)) => {
                    warn!(max_bytes = MAX_LINE_BYTES, "agent stderr: line too long, skipping");
                }
                Some(Ok(frame)) => {
                    let line = frame.lossy_text();
                    debug!(line = %line, "agent stderr");
                    if keep > 0 {
                        if tail.len() == keep {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                }
                Some(Err(err)) => {
                    warn!(%err, "agent stderr: read failed, stopping");
                    break;
                }
            },

            () = cancel.cancelled() => {
                debug!("agent stderr: reader stopped");
                break;
            }
        }
    }

    tail.into()
}
