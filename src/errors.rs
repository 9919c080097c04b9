//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure, including missing credentials.
    Config(String),
    /// The agent executable could not be started.
    Spawn(String),
    /// File-system or I/O operation failure.
    Io(String),
    /// The agent process exited unsuccessfully.
    ProcessExit {
        /// Exit code, absent when the process was terminated by a signal.
        code: Option<i32>,
    },
    /// The backend query behind a tool call failed.
    ToolExecution(String),
    /// Database connection or query failure.
    Db(String),
    /// HTTP transport failure.
    Http(String),
}

impl AppError {
    /// Text delivered to the client in an `error` stream event.
    ///
    /// Every failure that reaches an event sink goes through this method so
    /// transports never need to branch on the failure kind.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Config(msg) => msg.clone(),
            Self::Spawn(msg) => format!("Failed to start agent: {msg}"),
            Self::ProcessExit { code: Some(code) } => {
                format!("Agent exited with status {code}. Check logs for details.")
            }
            Self::ProcessExit { code: None } => {
                "Agent was terminated by a signal. Check logs for details.".to_owned()
            }
            other => format!("Error: {other}"),
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::ProcessExit { code: Some(code) } => {
                write!(f, "process exit: status {code}")
            }
            Self::ProcessExit { code: None } => write!(f, "process exit: terminated by signal"),
            Self::ToolExecution(msg) => write!(f, "tool execution: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Http(msg) => write!(f, "http: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
