#![forbid(unsafe_code)]

//! `agent-bridge`: bridges chat messages to an agent CLI and streams the
//! agent's events back.
//!
//! `chat` reads one message per stdin line and prints every event as a JSON
//! line. `serve` exposes the same bridge over HTTP with SSE streaming.

use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use futures_util::StreamExt;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use agent_bridge::bridge::http::HttpTransport;
use agent_bridge::bridge::subprocess::SubprocessTransport;
use agent_bridge::bridge::{AgentTransport, ChatBridge, FnSink};
use agent_bridge::config::Credentials;
use agent_bridge::models::event::StreamEvent;
use agent_bridge::models::session::Session;
use agent_bridge::server::{self, ServerState};
use agent_bridge::stream::codec::{Frame, LineCodec};
use agent_bridge::{AppError, BridgeConfig, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum TransportKind {
    /// Spawn the agent CLI locally for every message.
    Subprocess,
    /// Forward messages to a remote agent service.
    Http,
}

#[derive(Debug, Parser)]
#[command(name = "agent-bridge", about = "Agent process event bridge", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the workspace root the agent runs in.
    #[arg(long)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read chat messages from stdin and print agent events as JSON lines.
    Chat {
        /// How to reach the agent.
        #[arg(long, value_enum, default_value_t = TransportKind::Subprocess)]
        transport: TransportKind,

        /// Agent service base URL for the http transport.
        #[arg(long)]
        agent_url: Option<String>,
    },

    /// Serve the bridge over HTTP.
    Serve {
        /// Listen port; overrides `http.port` from the config.
        #[arg(long)]
        port: Option<u16>,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("agent-bridge bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let mut config = match args.config {
        Some(ref path) => BridgeConfig::load_from_path(path)?,
        None => BridgeConfig::from_toml_str("")?,
    };

    if let Some(ws) = args.workspace {
        config.workspace_root = ws
            .canonicalize()
            .map_err(|err| AppError::Config(format!("invalid workspace override: {err}")))?;
    }
    info!(workspace = %config.workspace_root.display(), "configuration loaded");

    match args.command {
        Command::Chat {
            transport,
            agent_url,
        } => {
            let transport: Arc<dyn AgentTransport> = match transport {
                TransportKind::Subprocess => Arc::new(SubprocessTransport::from_config(
                    &config,
                    Credentials::from_env(),
                )),
                TransportKind::Http => Arc::new(HttpTransport::new(
                    agent_url.unwrap_or_else(|| config.http.agent_service_url.clone()),
                )),
            };
            chat(transport).await
        }
        Command::Serve { port } => {
            let transport = Arc::new(SubprocessTransport::from_config(
                &config,
                Credentials::from_env(),
            ));
            let addr = SocketAddr::from(([127, 0, 0, 1], port.unwrap_or(config.http.port)));
            let ct = CancellationToken::new();

            let server_ct = ct.clone();
            let handle = tokio::spawn(async move {
                if let Err(err) =
                    server::serve(Arc::new(ServerState::new(transport)), addr, server_ct).await
                {
                    error!(%err, "http server failed");
                }
            });

            shutdown_signal().await;
            info!("shutdown signal received");
            ct.cancel();
            if let Err(err) = handle.await {
                warn!(%err, "http server task failed");
            }
            info!("agent-bridge shut down");
            Ok(())
        }
    }
}

/// Feed stdin lines through one chat session until stdin closes.
async fn chat(transport: Arc<dyn AgentTransport>) -> Result<()> {
    let session = Arc::new(Session::new(Uuid::new_v4().to_string()));
    let sink = Arc::new(FnSink(|event| {
        if let Err(err) = write_event(&mut std::io::stdout().lock(), &event) {
            warn!(%err, "failed to write event to stdout");
        }
    }));
    let bridge = ChatBridge::new(Arc::clone(&session), Arc::clone(&transport), sink);
    info!(session_id = session.id(), transport = transport.name(), "chat session started");

    let mut lines = FramedRead::new(tokio::io::stdin(), LineCodec::new());
    while let Some(line) = lines.next().await {
        let line = match line? {
            Frame::Line(line) => line,
            Frame::Invalid(_) => {
                warn!("skipping input line that is not UTF-8");
                continue;
            }
            Frame::Oversized => {
                warn!("skipping over-long input line");
                continue;
            }
        };

        // One message at a time: the next line is read once the agent is done.
        if let Some(handle) = bridge.chat(&line) {
            if let Err(err) = handle.await {
                error!(%err, "chat task failed");
            }
        }
    }

    bridge.close();
    info!("chat session ended");
    Ok(())
}

/// Write one event as a JSON line. A closed stdout is an error, not a panic.
fn write_event(out: &mut impl Write, event: &StreamEvent) -> std::io::Result<()> {
    let line = serde_json::to_string(event)?;
    writeln!(out, "{line}")?;
    out.flush()
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries the event stream in chat mode.
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
