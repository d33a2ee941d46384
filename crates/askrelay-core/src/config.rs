//! Relay configuration.
//!
//! Built once at startup from CLI flags / environment variables and shared
//! read-only with every request handler. Nothing here changes after the
//! listener is bound.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Default listening port (`AI_PORT`).
pub const DEFAULT_PORT: u16 = 8101;

/// Default location of the agent executable (`AGENT_CLI_PATH`).
pub const DEFAULT_AGENT_BIN: &str = "/usr/local/bin/agent";

/// `HOME` handed to the agent process.
pub const DEFAULT_AGENT_HOME: &str = "/var/www";

/// Model selector passed as `--model`.
pub const AGENT_MODEL: &str = "auto";

/// Per-invocation timeout in seconds (10 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Grace period after SIGTERM before SIGKILL.
pub const TERMINATE_GRACE_SECS: u64 = 5;

/// Longest accepted prompt, in characters, after trimming.
pub const MAX_PROMPT_CHARS: usize = 4000;

/// Largest accepted request body in bytes.
pub const MAX_BODY_BYTES: usize = 65_536;

/// Immutable relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Loopback port the listener binds to.
    pub port: u16,
    /// Project root: agent working directory and `--workspace` value.
    pub project_dir: PathBuf,
    /// Path to the agent executable.
    pub agent_bin: PathBuf,
    /// Value of `HOME` in the agent's environment.
    pub agent_home: PathBuf,
    pub model: String,
    /// How long one agent invocation may run.
    pub timeout: Duration,
    /// How long a timed-out agent gets between SIGTERM and SIGKILL.
    pub terminate_grace: Duration,
    pub max_prompt_chars: usize,
    pub max_body_bytes: usize,
}

impl RelayConfig {
    /// Create a configuration with default limits for the given project
    /// directory and agent binary.
    pub fn new(project_dir: impl Into<PathBuf>, agent_bin: impl Into<PathBuf>) -> Self {
        Self {
            port: DEFAULT_PORT,
            project_dir: project_dir.into(),
            agent_bin: agent_bin.into(),
            agent_home: PathBuf::from(DEFAULT_AGENT_HOME),
            model: AGENT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            terminate_grace: Duration::from_secs(TERMINATE_GRACE_SECS),
            max_prompt_chars: MAX_PROMPT_CHARS,
            max_body_bytes: MAX_BODY_BYTES,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_agent_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.agent_home = home.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_terminate_grace(mut self, grace: Duration) -> Self {
        self.terminate_grace = grace;
        self
    }

    /// Loopback-only listen address.
    pub const fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::LOCALHOST), self.port)
    }

    /// Check the configuration and canonicalize the project directory.
    ///
    /// The project directory must exist; a relative path is resolved against
    /// the current directory before canonicalization.
    pub fn validate(mut self) -> Result<Self> {
        if self.agent_bin.as_os_str().is_empty() {
            return Err(Error::Config("agent binary path is empty".to_string()));
        }
        if self.max_prompt_chars == 0 || self.max_body_bytes == 0 {
            return Err(Error::Config("request limits must be nonzero".to_string()));
        }
        self.project_dir = canonical_dir(&self.project_dir)?;
        Ok(self)
    }

    /// Make the project directory the process working directory.
    pub fn enter_project_dir(&self) -> Result<()> {
        std::env::set_current_dir(&self.project_dir)?;
        Ok(())
    }
}

fn canonical_dir(path: &Path) -> Result<PathBuf> {
    let resolved = path.canonicalize().map_err(|e| {
        Error::Config(format!(
            "project directory {} is not accessible: {e}",
            path.display()
        ))
    })?;
    if !resolved.is_dir() {
        return Err(Error::Config(format!(
            "project directory {} is not a directory",
            resolved.display()
        )));
    }
    Ok(resolved)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment() {
        let config = RelayConfig::new("/srv/app", DEFAULT_AGENT_BIN);
        assert_eq!(config.port, 8101);
        assert_eq!(config.model, "auto");
        assert_eq!(config.timeout, Duration::from_secs(600));
        assert_eq!(config.max_prompt_chars, 4000);
        assert_eq!(config.max_body_bytes, 65_536);
        assert_eq!(config.agent_home, PathBuf::from("/var/www"));
    }

    #[test]
    fn listen_addr_is_loopback() {
        let config = RelayConfig::new("/srv/app", "agent").with_port(9000);
        let addr = config.listen_addr();
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 9000);
    }

    #[test]
    fn validate_canonicalizes_project_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a");
        std::fs::create_dir(&nested).unwrap();
        let config = RelayConfig::new(nested.join(".."), "agent")
            .validate()
            .unwrap();
        assert_eq!(config.project_dir, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn validate_rejects_missing_project_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = RelayConfig::new(dir.path().join("missing"), "agent")
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn validate_rejects_file_as_project_dir() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        let err = RelayConfig::new(&file, "agent").validate().unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn validate_rejects_empty_agent_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = RelayConfig::new(dir.path(), "").validate().unwrap_err();
        assert!(err.to_string().contains("agent binary"));
    }
}
