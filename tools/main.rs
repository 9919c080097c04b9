#![forbid(unsafe_code)]

//! `agent-bridge-tools`: tool responder launched by the agent from its
//! tool descriptor.
//!
//! Speaks line-delimited JSON-RPC on stdin/stdout. stdout carries protocol
//! frames only; all logging goes to stderr.

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use agent_bridge::responder::schema::SqliteSchema;
use agent_bridge::responder::ToolResponder;
use agent_bridge::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "agent-bridge-tools",
    about = "Schema tool responder for the agent bridge",
    version,
    long_about = None
)]
struct Cli {
    /// Database whose schema `check_schema` reports.
    #[arg(
        long,
        env = "BRIDGE_DATABASE_URL",
        default_value = "sqlite://db/development.sqlite3"
    )]
    database: String,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    info!(database = %args.database, "tool responder starting");
    let mut responder = ToolResponder::new(SqliteSchema::new(args.database));

    tokio::select! {
        result = responder.serve(tokio::io::stdin(), tokio::io::stdout()) => {
            if let Err(ref err) = result {
                error!(%err, "tool responder stopped");
            }
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, tool responder exiting");
            Ok(())
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);

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
