//! Bridge configuration parsing, validation, and credential loading.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::{AppError, Result};

/// Environment variable holding an Anthropic API key.
pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

/// Environment variable holding an OAuth token for the agent CLI.
pub const OAUTH_TOKEN_VAR: &str = "CLAUDE_CODE_OAUTH_TOKEN";

fn default_workspace_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_agent_cli_args() -> Vec<String> {
    [
        "--print",
        "--verbose",
        "--dangerously-skip-permissions",
        "--output-format",
        "stream-json",
    ]
    .iter()
    .map(|arg| (*arg).to_owned())
    .collect()
}

fn default_database_url() -> String {
    "sqlite://db/development.sqlite3".into()
}

fn default_stderr_tail_lines() -> usize {
    5
}

fn default_tool_server_name() -> String {
    "schema-db".into()
}

fn default_http_port() -> u16 {
    3001
}

fn default_agent_service_url() -> String {
    "http://localhost:3001".into()
}

/// How the agent process reaches the tool responder.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct ToolServerConfig {
    /// Namespace under which the agent registers the tool server.
    pub name: String,
    /// Responder executable; defaults to `agent-bridge-tools` next to the
    /// running binary.
    pub command: Option<String>,
    /// Extra arguments placed before the generated `--database` flag.
    pub args: Vec<String>,
    /// Environment handed to the responder by the agent.
    pub env: BTreeMap<String, String>,
}

impl Default for ToolServerConfig {
    fn default() -> Self {
        Self {
            name: default_tool_server_name(),
            command: None,
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }
}

impl ToolServerConfig {
    /// Resolve the responder executable.
    #[must_use]
    pub fn resolved_command(&self) -> String {
        if let Some(ref command) = self.command {
            return command.clone();
        }

        let binary = format!("agent-bridge-tools{}", env::consts::EXE_SUFFIX);
        env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(&binary)))
            .map_or(binary, |path| path.to_string_lossy().into_owned())
    }
}

/// HTTP surface settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct HttpConfig {
    /// Port the `serve` command listens on.
    pub port: u16,
    /// Base URL of a remote agent service used by the HTTP transport.
    pub agent_service_url: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
            agent_service_url: default_agent_service_url(),
        }
    }
}

/// Bridge configuration parsed from `config.toml`.
///
/// Every field has a default so an empty file is a valid configuration.
/// Credentials are never read from the file; see [`Credentials`].
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct BridgeConfig {
    /// Working directory for the agent process.
    pub workspace_root: PathBuf,
    /// Agent executable. When absent the local `node_modules` install is
    /// preferred, then `npx`.
    pub agent_cli: Option<String>,
    /// Arguments placed before the descriptor flag and the message.
    pub agent_cli_args: Vec<String>,
    /// Directory holding per-session tool descriptors. A relative path is
    /// resolved against `workspace_root` on load.
    pub descriptor_dir: Option<PathBuf>,
    /// Tool responder registration.
    pub tool_server: ToolServerConfig,
    /// Backend database handed to the tool responder.
    pub database_url: String,
    /// HTTP settings for `serve` and the HTTP transport.
    pub http: HttpConfig,
    /// Number of trailing agent stderr lines logged on abnormal exit.
    pub stderr_tail_lines: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            agent_cli: None,
            agent_cli_args: default_agent_cli_args(),
            descriptor_dir: None,
            tool_server: ToolServerConfig::default(),
            database_url: default_database_url(),
            http: HttpConfig::default(),
            stderr_tail_lines: default_stderr_tail_lines(),
        }
    }
}

impl BridgeConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Directory where tool descriptors are written.
    #[must_use]
    pub fn descriptor_dir(&self) -> PathBuf {
        self.descriptor_dir
            .clone()
            .unwrap_or_else(|| self.workspace_root.join("tmp").join("mcp_configs"))
    }

    /// Program and leading arguments used to launch the agent.
    ///
    /// An explicit `agent_cli` wins. Otherwise a project-local install under
    /// `node_modules/.bin` is used when it is executable, falling back to
    /// `npx @anthropic-ai/claude-code`.
    #[must_use]
    pub fn agent_command(&self) -> Vec<String> {
        if let Some(ref cli) = self.agent_cli {
            return vec![cli.clone()];
        }

        let local = self
            .workspace_root
            .join("node_modules")
            .join(".bin")
            .join("claude");
        if is_executable(&local) {
            debug!(path = %local.display(), "using project-local agent cli");
            return vec![local.to_string_lossy().into_owned()];
        }

        vec!["npx".to_owned(), "@anthropic-ai/claude-code".to_owned()]
    }

    fn validate(&mut self) -> Result<()> {
        if self.tool_server.name.trim().is_empty() {
            return Err(AppError::Config("tool_server.name must not be empty".into()));
        }

        if self.database_url.trim().is_empty() {
            return Err(AppError::Config("database_url must not be empty".into()));
        }

        if let Some(ref cli) = self.agent_cli {
            if cli.trim().is_empty() {
                return Err(AppError::Config("agent_cli must not be empty".into()));
            }
        }

        let canonical_root = self
            .workspace_root
            .canonicalize()
            .map_err(|err| AppError::Config(format!("workspace_root invalid: {err}")))?;
        self.workspace_root = canonical_root;

        // The agent runs inside workspace_root and must resolve --mcp-config.
        if let Some(dir) = self.descriptor_dir.take() {
            self.descriptor_dir = Some(if dir.is_relative() {
                self.workspace_root.join(dir)
            } else {
                dir
            });
        }

        Ok(())
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Agent credentials, forwarded to the child through its environment only.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Value of [`API_KEY_VAR`], if set and non-empty.
    pub api_key: Option<String>,
    /// Value of [`OAUTH_TOKEN_VAR`], if set and non-empty.
    pub oauth_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("oauth_token", &self.oauth_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    /// Collect credentials from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Collect credentials through an arbitrary variable lookup.
    ///
    /// Empty values count as absent.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            api_key: non_empty(API_KEY_VAR),
            oauth_token: non_empty(OAUTH_TOKEN_VAR),
        }
    }

    /// Variables to inject into the agent environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when neither credential is present.
    pub fn env_vars(&self) -> Result<Vec<(&'static str, String)>> {
        let vars: Vec<(&'static str, String)> = [
            (API_KEY_VAR, self.api_key.clone()),
            (OAUTH_TOKEN_VAR, self.oauth_token.clone()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect();

        if vars.is_empty() {
            return Err(AppError::Config(format!(
                "No authentication configured. Set either {API_KEY_VAR} or {OAUTH_TOKEN_VAR} \
                 and restart the bridge."
            )));
        }

        Ok(vars)
    }
}
