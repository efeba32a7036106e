use crate::config::AnonymousConfig;
use crate::http::HttpError;
use reqwest::{Client, Proxy};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};

/// Locally spawned anonymizing relay exposing a SOCKS endpoint
///
/// The child process is killed when the relay is dropped, so an aborted
/// run never leaves a relay behind.
pub struct TorRelay {
    executable: String,
    socks_proxy: String,
    startup: Duration,
    check_url: String,
    child: Option<Child>,
}

impl TorRelay {
    pub fn new(config: &AnonymousConfig) -> Self {
        Self {
            executable: config.tor_executable.clone(),
            socks_proxy: config.socks_proxy.clone(),
            startup: Duration::from_secs(config.startup_secs),
            check_url: config.check_url.clone(),
            child: None,
        }
    }

    /// SOCKS URL clients should route through
    pub fn socks_proxy(&self) -> &str {
        &self.socks_proxy
    }

    /// Stops any running relay and starts a fresh one (new circuit)
    ///
    /// With `wait` set, sleeps for the configured startup time so the relay
    /// can bootstrap before it is used.
    pub async fn restart(&mut self, wait: bool) -> Result<(), HttpError> {
        self.terminate().await;

        let child = Command::new(&self.executable)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HttpError::Relay(format!("can't start '{}': {}", self.executable, e)))?;

        tracing::debug!("Relay started (pid {:?})", child.id());
        self.child = Some(child);

        if wait {
            tokio::time::sleep(self.startup).await;
        }
        Ok(())
    }

    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    tracing::warn!("Relay exited with {}", status);
                    false
                }
                Err(_) => false,
            },
            None => false,
        }
    }

    pub async fn terminate(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                tracing::debug!("Relay already stopped: {}", e);
            }
        }
    }

    /// Checks that the relay is alive and actually relays traffic
    pub async fn test_ok(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }

        let timeout = self.startup.max(Duration::from_secs(5));
        let client = match Proxy::all(self.socks_proxy.as_str())
            .and_then(|proxy| Client::builder().proxy(proxy).timeout(timeout).build())
        {
            Ok(client) => client,
            Err(e) => {
                tracing::error!("Can't build relay client: {}", e);
                return false;
            }
        };

        match client.get(&self.check_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!("Relay check failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(executable: &str) -> AnonymousConfig {
        AnonymousConfig {
            tor_executable: executable.to_string(),
            startup_secs: 0,
            ..AnonymousConfig::default()
        }
    }

    #[tokio::test]
    async fn test_missing_executable_is_relay_error() {
        let mut relay = TorRelay::new(&config("/nonexistent/relay-binary"));
        let result = relay.restart(false).await;
        assert!(matches!(result, Err(HttpError::Relay(_))));
        assert!(!relay.is_running());
        assert!(!relay.test_ok().await);
    }

    #[tokio::test]
    async fn test_not_started_relay_is_not_running() {
        let mut relay = TorRelay::new(&AnonymousConfig::default());
        assert!(!relay.is_running());
        relay.terminate().await;
        assert_eq!(relay.socks_proxy(), "socks5h://127.0.0.1:9050");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exited_relay_is_not_running() {
        let mut relay = TorRelay::new(&config("true"));
        relay.restart(false).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!relay.is_running());
        assert!(!relay.test_ok().await);
    }
}
