//! Session provider contract and its helper-command implementation
//!
//! The browser-driven parts of authentication (filling the login form,
//! visiting a listing anonymously) live outside this crate. The scraper only
//! needs a provider that can log in, log out and expose session cookies.

use crate::auth::{Credential, Token, TokenKind};
use crate::config::SessionConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Errors raised while obtaining a session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to start session helper '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Session helper I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session helper timed out after {0} seconds")]
    Timeout(u64),

    #[error("Session helper failed ({status}): {stderr}")]
    HelperFailed { status: String, stderr: String },

    #[error("Session helper produced invalid output: {0}")]
    InvalidOutput(#[from] serde_json::Error),

    #[error("Session has no {0} cookie")]
    MissingCookie(String),

    #[error("Anonymizing relay unavailable: {0}")]
    Relay(String),

    #[error("No accounts available")]
    NoAccounts,

    #[error("Session provider failure: {0}")]
    Provider(String),
}

/// Contract for the browser-driven session
///
/// Every method may be called again at any point to refresh a session.
#[async_trait]
pub trait SessionProvider: Send {
    /// Logs in with `credential` and returns the personal token
    async fn login(&mut self, credential: &Credential) -> Result<Token, SessionError>;

    /// Ends the current session (if any) and logs in with `credential`
    async fn relogin(&mut self, credential: &Credential) -> Result<Token, SessionError> {
        self.logout().await?;
        self.login(credential).await
    }

    /// Ends the current session; `Ok(false)` if there was none
    async fn logout(&mut self) -> Result<bool, SessionError>;

    /// Opens `page_url` without logging in, routed through `proxy`
    async fn open_anonymous(&mut self, page_url: &str, proxy: &str) -> Result<(), SessionError>;

    /// Reads a cookie from the current session
    fn get_cookie(&self, name: &str) -> Option<String>;

    /// Releases the browser session
    async fn close(&mut self) {}
}

/// Cookie as printed by the session helper
#[derive(Debug, Clone, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
}

/// `SessionProvider` backed by an external helper command
///
/// The helper is invoked as `<command> <args...> login <url>` or
/// `<command> <args...> visit <url> --proxy <proxy>` and must print a JSON
/// array of `{"name", "value"}` cookies on stdout. Credentials travel through
/// the `SESSION_LOGIN` / `SESSION_PASSWORD` environment variables.
pub struct ExternalSessionProvider {
    command: String,
    args: Vec<String>,
    timeout: Duration,
    login_url: String,
    cookies: HashMap<String, String>,
}

impl ExternalSessionProvider {
    pub fn new(config: &SessionConfig, login_url: &str) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            login_url: login_url.to_string(),
            cookies: HashMap::new(),
        }
    }

    async fn run_helper(
        &self,
        action: &[&str],
        envs: &[(&str, &str)],
    ) -> Result<Vec<SessionCookie>, SessionError> {
        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .args(action)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in envs {
            command.env(key, value);
        }

        let child = command.spawn().map_err(|source| SessionError::Spawn {
            command: self.command.clone(),
            source,
        })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| SessionError::Timeout(self.timeout.as_secs()))??;

        if !output.status.success() {
            return Err(SessionError::HelperFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }

    fn store(&mut self, cookies: Vec<SessionCookie>) {
        self.cookies = cookies
            .into_iter()
            .map(|cookie| (cookie.name, cookie.value))
            .collect();
    }

    fn token(&self, kind: TokenKind) -> Result<Token, SessionError> {
        kind.cookie_names()
            .iter()
            .find_map(|name| self.get_cookie(name))
            .map(|value| Token::new(kind, value))
            .ok_or_else(|| SessionError::MissingCookie(kind.cookie_names()[0].to_string()))
    }
}

#[async_trait]
impl SessionProvider for ExternalSessionProvider {
    async fn login(&mut self, credential: &Credential) -> Result<Token, SessionError> {
        tracing::info!("Logging in as {}", credential.login);

        let cookies = self
            .run_helper(
                &["login", self.login_url.as_str()],
                &[
                    ("SESSION_LOGIN", credential.login.as_str()),
                    ("SESSION_PASSWORD", credential.password.as_str()),
                ],
            )
            .await?;
        self.store(cookies);

        self.token(TokenKind::Personal)
    }

    async fn logout(&mut self) -> Result<bool, SessionError> {
        let had_session = !self.cookies.is_empty();
        self.cookies.clear();
        Ok(had_session)
    }

    async fn open_anonymous(&mut self, page_url: &str, proxy: &str) -> Result<(), SessionError> {
        tracing::debug!("Opening {} anonymously", page_url);

        let cookies = self
            .run_helper(&["visit", page_url, "--proxy", proxy], &[])
            .await?;
        self.store(cookies);
        Ok(())
    }

    fn get_cookie(&self, name: &str) -> Option<String> {
        self.cookies.get(name).cloned()
    }

    async fn close(&mut self) {
        self.cookies.clear();
    }
}
