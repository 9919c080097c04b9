//! Tool descriptor materialization.
//!
//! Before each agent run a small JSON file is written telling the agent how
//! to launch the tool responder:
//!
//! ```json
//! { "mcpServers": { "schema-db": { "command": "…", "args": ["--database", "…"], "env": {} } } }
//! ```
//!
//! One file per session, named after the session id, removed as soon as the
//! agent exits.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::config::BridgeConfig;
use crate::{AppError, Result};

/// Sub-process tool server entry inside a descriptor.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ToolServerEntry {
    /// Executable the agent launches.
    pub command: String,
    /// Arguments for the executable.
    pub args: Vec<String>,
    /// Environment for the executable.
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct Descriptor<'a> {
    #[serde(rename = "mcpServers")]
    mcp_servers: BTreeMap<&'a str, &'a ToolServerEntry>,
}

/// Writes and removes per-session tool descriptors.
#[derive(Debug, Clone)]
pub struct DescriptorStore {
    dir: PathBuf,
    server_name: String,
    entry: ToolServerEntry,
}

impl DescriptorStore {
    /// Create a store writing into `dir` and registering `entry` as `server_name`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, server_name: impl Into<String>, entry: ToolServerEntry) -> Self {
        Self {
            dir: dir.into(),
            server_name: server_name.into(),
            entry,
        }
    }

    /// Build the store described by the bridge configuration.
    #[must_use]
    pub fn from_config(config: &BridgeConfig) -> Self {
        let mut args = config.tool_server.args.clone();
        args.push("--database".to_owned());
        args.push(config.database_url.clone());

        Self::new(
            config.descriptor_dir(),
            config.tool_server.name.clone(),
            ToolServerEntry {
                command: config.tool_server.resolved_command(),
                args,
                env: config.tool_server.env.clone(),
            },
        )
    }

    /// Directory descriptors are written into.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the descriptor for `session_id` is written to.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when the session id contains anything other
    /// than ASCII alphanumerics, `-` or `_`, since it becomes part of a file name.
    pub fn path_for(&self, session_id: &str) -> Result<PathBuf> {
        let valid = !session_id.is_empty()
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(AppError::Config(format!(
                "session id {session_id:?} is not usable in a descriptor file name"
            )));
        }
        Ok(self.dir.join(format!("mcp_config_{session_id}.json")))
    }

    /// Write the descriptor for `session_id` and return its path.
    ///
    /// The file is written to a temporary name in the same directory and
    /// renamed into place, so the agent never observes a partial descriptor.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for an unusable session id and
    /// `AppError::Io` when the directory or file cannot be written.
    pub fn materialize(&self, session_id: &str) -> Result<PathBuf> {
        let path = self.path_for(session_id)?;

        std::fs::create_dir_all(&self.dir).map_err(|err| {
            AppError::Io(format!(
                "failed to create descriptor dir {}: {err}",
                self.dir.display()
            ))
        })?;

        let mut servers = BTreeMap::new();
        servers.insert(self.server_name.as_str(), &self.entry);
        let body = serde_json::to_vec_pretty(&Descriptor {
            mcp_servers: servers,
        })
        .map_err(|err| AppError::Io(format!("failed to serialise descriptor: {err}")))?;

        let mut staged = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|err| AppError::Io(format!("failed to stage descriptor: {err}")))?;
        staged
            .write_all(&body)
            .map_err(|err| AppError::Io(format!("failed to write descriptor: {err}")))?;
        staged
            .persist(&path)
            .map_err(|err| AppError::Io(format!("failed to persist descriptor: {}", err.error)))?;

        debug!(session_id, path = %path.display(), "tool descriptor materialized");
        Ok(path)
    }
}

/// Remove a descriptor. Removing a path that does not exist is not an error.
///
/// # Errors
///
/// Returns `AppError::Io` for any failure other than the file being absent.
pub fn discard(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "tool descriptor discarded");
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(AppError::Io(format!(
            "failed to remove descriptor {}: {err}",
            path.display()
        ))),
    }
}
