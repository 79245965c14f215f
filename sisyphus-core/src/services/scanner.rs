//! Breach scanner - finds active accounts past their check-in deadline

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::result::{Error, Result};
use crate::domain::{is_breached, AccountFailure, AccountState, BreachRecord};
use crate::ports::AccountStore;

/// Result of one scan
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Active accounts read from the store
    pub scanned: usize,
    /// Snapshots of breached accounts, in no particular order
    pub breaches: Vec<BreachRecord>,
    /// Active accounts skipped because their data is malformed
    pub invalid: Vec<AccountFailure>,
}

#[derive(Clone)]
pub struct BreachScanner {
    store: Arc<dyn AccountStore>,
}

impl BreachScanner {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Read every active account once and keep those past the deadline
    ///
    /// Fails only when the bulk read fails; a partial scan is never returned.
    pub fn scan(&self, now: DateTime<Utc>, grace_hours: u32) -> Result<ScanOutcome> {
        let accounts = self.store.list_active_accounts().map_err(|e| match e {
            Error::StoreUnavailable(_) => e,
            other => Error::store_unavailable(other.to_string()),
        })?;

        let mut outcome = ScanOutcome::default();
        for account in accounts.iter().filter(|a| a.active) {
            outcome.scanned += 1;
            match is_breached(account.last_check_in, now, grace_hours) {
                Ok(true) => outcome.breaches.push(BreachRecord::from(account)),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        account_id = %account.id,
                        kind = e.kind(),
                        "skipping account with invalid state"
                    );
                    outcome.invalid.push(AccountFailure::new(
                        account.id,
                        AccountState::Scanned,
                        e.kind(),
                        e.to_string(),
                    ));
                }
            }
        }

        Ok(outcome)
    }
}
