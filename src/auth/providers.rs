//! Injected credential providers.
//!
//! The resolver never reaches for ambient process state directly; the host
//! session lookup and the external CLI invocation arrive as trait objects so
//! tests can substitute deterministic fakes.

use async_trait::async_trait;

use crate::error::{BhError, Result};

/// Asks the interactive host for a session token.
#[async_trait]
pub trait SessionTokenSource: Send + Sync {
    /// `Ok(None)` means no session is available; errors are treated as a
    /// missing token by the resolver.
    async fn session_token(&self) -> Result<Option<String>>;
}

/// Obtains a token by invoking a local helper CLI.
#[async_trait]
pub trait CliTokenSource: Send + Sync {
    async fn cli_token(&self) -> Result<Option<String>>;
}

/// Host-session provider for headless contexts: never has a session.
pub struct NoSession;

#[async_trait]
impl SessionTokenSource for NoSession {
    async fn session_token(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// CLI provider that is not configured.
pub struct NoCliToken;

#[async_trait]
impl CliTokenSource for NoCliToken {
    async fn cli_token(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Reads a token from the stdout of a helper process, e.g. `gh auth token`.
pub struct ProcessTokenSource {
    program: String,
    args: Vec<String>,
}

impl ProcessTokenSource {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|arg| (*arg).to_string()).collect(),
        }
    }

    /// The GitHub CLI token helper.
    pub fn github() -> Self {
        Self::new("gh", &["auth", "token"])
    }

    /// The GitLab CLI token helper.
    pub fn gitlab() -> Self {
        Self::new("glab", &["auth", "token"])
    }
}

#[async_trait]
impl CliTokenSource for ProcessTokenSource {
    async fn cli_token(&self) -> Result<Option<String>> {
        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .output()
            .await
            .map_err(|err| {
                BhError::Config(format!("invoke {} failed: {err}", self.program))
            })?;

        if !output.status.success() {
            tracing::debug!(
                program = %self.program,
                status = %output.status,
                "token helper exited unsuccessfully"
            );
            return Ok(None);
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Ok(None);
        }
        Ok(Some(token))
    }
}
