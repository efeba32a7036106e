//! Authentication for the marketplace API
//!
//! This module contains:
//! - `Credential` and `AccountRotator`: the login pool and its cursor
//! - `SessionProvider`: contract for the external browser-driven session
//! - `ExternalSessionProvider`: provider backed by a helper command
//! - `TokenManager`: acquires and refreshes personal and anonymous tokens

mod accounts;
mod session;
mod tokens;

pub use accounts::{load_accounts, AccountRotator, Credential};
pub use session::{ExternalSessionProvider, SessionCookie, SessionError, SessionProvider};
pub use tokens::{Token, TokenKind, TokenManager};
