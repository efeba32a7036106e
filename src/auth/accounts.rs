use crate::auth::SessionError;
use crate::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// A login/password pair from the credential table
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credential {
    pub login: String,
    pub password: String,
}

impl Credential {
    pub fn new(login: &str, password: &str) -> Self {
        Self {
            login: login.to_string(),
            password: password.to_string(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("login", &self.login)
            .field("password", &"***")
            .finish()
    }
}

/// Reads the credential table (CSV with a `login,password` header)
///
/// # Arguments
///
/// * `path` - Path to the CSV file
///
/// # Returns
///
/// * `Ok(Vec<Credential>)` - Credentials in file order
/// * `Err(ConfigError)` - The file is unreadable, malformed, or has no rows
pub fn load_accounts(path: &Path) -> Result<Vec<Credential>, ConfigError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut credentials = Vec::new();
    for record in reader.deserialize() {
        let credential: Credential = record?;
        if credential.login.is_empty() {
            continue;
        }
        credentials.push(credential);
    }

    if credentials.is_empty() {
        return Err(ConfigError::EmptyInput {
            path: path.display().to_string(),
        });
    }

    Ok(credentials)
}

/// Cursor over the credential pool
///
/// `advance` wraps around to the first account after the last one.
#[derive(Debug, Clone)]
pub struct AccountRotator {
    credentials: Vec<Credential>,
    index: usize,
}

impl AccountRotator {
    /// Creates a rotator starting at `start_index`
    ///
    /// An out-of-range index (the table shrank since the last run) restarts
    /// at the first account.
    pub fn new(credentials: Vec<Credential>, start_index: usize) -> Result<Self, SessionError> {
        if credentials.is_empty() {
            return Err(SessionError::NoAccounts);
        }

        let index = if start_index < credentials.len() {
            start_index
        } else {
            tracing::warn!(
                "Saved account index {} is out of range ({} accounts), starting from 0",
                start_index,
                credentials.len()
            );
            0
        };

        Ok(Self { credentials, index })
    }

    pub fn current(&self) -> &Credential {
        &self.credentials[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Moves to the next account, returning the new index
    pub fn advance(&mut self) -> usize {
        if self.index + 1 >= self.credentials.len() {
            tracing::warn!("Out of accounts, starting from the first one");
            self.index = 0;
        } else {
            self.index += 1;
        }
        self.index
    }

    pub fn set_index(&mut self, index: usize) {
        self.index = index % self.credentials.len();
    }
}
