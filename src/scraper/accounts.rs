use crate::auth::TokenManager;
use std::time::Duration;

/// Result of logging in with every credential
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AccountReport {
    /// Logins that authorized
    pub valid: Vec<String>,
    /// Logins that failed, with the reason
    pub invalid: Vec<(String, String)>,
}

impl AccountReport {
    pub fn all_valid(&self) -> bool {
        self.invalid.is_empty()
    }
}

/// Logs in with each account in turn, starting from the first
///
/// Unlike a scrape, this never writes the progress cursor. `delay` is
/// waited between consecutive authorizations.
pub async fn check_accounts(tokens: &mut TokenManager, delay: Duration) -> AccountReport {
    let mut report = AccountReport::default();
    let total = tokens.accounts().len();
    tokens.select_account(0);

    for position in 0..total {
        if position > 0 {
            tokio::time::sleep(delay).await;
            if let Err(e) = tokens.switch_account().await {
                tracing::warn!("Logout failed before account #{}: {}", position, e);
            }
        }

        let login = tokens.accounts().current().login.clone();
        tracing::info!("Checking account #{} ({}).", position, login);
        match tokens.login_current().await {
            Ok(_) => report.valid.push(login),
            Err(e) => {
                tracing::error!("Account {} is not valid: {}", login, e);
                report.invalid.push((login, e.to_string()));
            }
        }
    }

    if report.all_valid() {
        tracing::info!("All accounts are valid.");
    } else {
        tracing::warn!(
            "{} of {} accounts failed to log in.",
            report.invalid.len(),
            total
        );
    }

    tokens.close().await;
    report
}
