use crate::auth::{AccountRotator, Credential, SessionError, SessionProvider};
use crate::http::TorRelay;
use crate::state::ProgressStore;
use serde::Serialize;
use std::fmt;

/// Which access tier a token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Authenticated as a specific account
    Personal,
    /// Obtained through the anonymizing relay without logging in
    Anonymous,
}

impl TokenKind {
    /// Cookie names carrying this kind of token, preferred first
    pub fn cookie_names(self) -> [&'static str; 2] {
        match self {
            Self::Personal => ["access_token", "a_access_token"],
            Self::Anonymous => ["a_access_token", "access_token"],
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Personal => write!(f, "personal"),
            Self::Anonymous => write!(f, "anonymous"),
        }
    }
}

/// Opaque bearer token
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    kind: TokenKind,
    value: String,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("kind", &self.kind)
            .field("value", &"***")
            .finish()
    }
}

/// Acquires and refreshes both kinds of access tokens
///
/// Tokens live only in memory; every process start acquires fresh ones.
pub struct TokenManager {
    provider: Box<dyn SessionProvider>,
    accounts: AccountRotator,
    relay: Option<TorRelay>,
    anonymous_proxy: String,
    personal: Option<Token>,
    anonymous: Option<Token>,
    logged_in: bool,
}

impl TokenManager {
    /// # Arguments
    ///
    /// * `provider` - Browser-driven session
    /// * `accounts` - Credential pool, positioned at the persisted index
    /// * `relay` - Relay restarted before each anonymous acquisition
    /// * `anonymous_proxy` - Proxy URL the anonymous session is routed through
    pub fn new(
        provider: Box<dyn SessionProvider>,
        accounts: AccountRotator,
        relay: Option<TorRelay>,
        anonymous_proxy: &str,
    ) -> Self {
        Self {
            provider,
            accounts,
            relay,
            anonymous_proxy: anonymous_proxy.to_string(),
            personal: None,
            anonymous: None,
            logged_in: false,
        }
    }

    pub fn accounts(&self) -> &AccountRotator {
        &self.accounts
    }

    pub fn token(&self, kind: TokenKind) -> Option<&Token> {
        match kind {
            TokenKind::Personal => self.personal.as_ref(),
            TokenKind::Anonymous => self.anonymous.as_ref(),
        }
    }

    /// Obtains a personal token
    ///
    /// The first call logs in with the current account. Every later call is
    /// a refresh: the rotator advances, the new account index is checkpointed,
    /// and only then does the provider log in again.
    pub async fn acquire_personal(&mut self, progress: &mut ProgressStore) -> crate::Result<Token> {
        let token = if self.logged_in {
            let index = self.accounts.advance();
            progress.set_account_index(index);
            progress.save()?;

            let credential = self.accounts.current().clone();
            tracing::info!("Switching to account #{} ({})", index, credential.login);
            self.provider.relogin(&credential).await?
        } else {
            let credential = self.accounts.current().clone();
            self.provider.login(&credential).await?
        };

        self.logged_in = true;
        self.personal = Some(token.clone());
        Ok(token)
    }

    /// Obtains an anonymous token by opening `landing_url` through the relay
    pub async fn acquire_anonymous(&mut self, landing_url: &str) -> Result<Token, SessionError> {
        if let Some(relay) = self.relay.as_mut() {
            relay
                .restart(true)
                .await
                .map_err(|e| SessionError::Relay(e.to_string()))?;
            if !relay.test_ok().await {
                return Err(SessionError::Relay(
                    "relay is not passing traffic".to_string(),
                ));
            }
        }

        self.provider
            .open_anonymous(landing_url, &self.anonymous_proxy)
            .await?;

        let names = TokenKind::Anonymous.cookie_names();
        let value = names
            .iter()
            .find_map(|name| self.provider.get_cookie(name))
            .ok_or_else(|| SessionError::MissingCookie(names[0].to_string()))?;

        let token = Token::new(TokenKind::Anonymous, value);
        self.anonymous = Some(token.clone());
        Ok(token)
    }

    /// Logs in with the current account without touching any cursor
    pub async fn login_current(&mut self) -> Result<Token, SessionError> {
        let credential = self.accounts.current().clone();
        let token = self.provider.login(&credential).await?;
        self.logged_in = true;
        self.personal = Some(token.clone());
        Ok(token)
    }

    /// Moves to the next account and ends the current session (no checkpoint)
    ///
    /// The rotator advances even when logging out fails.
    pub async fn switch_account(&mut self) -> Result<Credential, SessionError> {
        self.accounts.advance();
        self.logged_in = false;
        self.personal = None;
        self.provider.logout().await?;
        Ok(self.accounts.current().clone())
    }

    /// Positions the rotator at `index` for the next login
    pub fn select_account(&mut self, index: usize) {
        self.accounts.set_index(index);
    }

    /// Releases the browser session and stops the relay
    pub async fn close(&mut self) {
        self.provider.close().await;
        if let Some(relay) = self.relay.as_mut() {
            relay.terminate().await;
        }
    }
}
