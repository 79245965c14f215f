//! Breach detection: deadline arithmetic and the scan-time snapshot

use std::fmt;

use chrono::{DateTime, Duration, Utc};

use super::account::{Account, AccountId};
use super::result::{Error, Result};

/// Decide whether a check-in deadline has been breached
///
/// Breached iff strictly more than `grace_hours` have elapsed since
/// `last_check_in`. A missing check-in is an invalid account, not a verdict.
pub fn is_breached(
    last_check_in: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    grace_hours: u32,
) -> Result<bool> {
    let last = last_check_in
        .ok_or_else(|| Error::invalid_state("account has no check-in timestamp"))?;
    let elapsed = now.signed_duration_since(last);
    Ok(elapsed > Duration::hours(i64::from(grace_hours)))
}

/// Snapshot of a breached account, taken at scan time
///
/// Lives for one sweep only and is owned by exactly one account pipeline.
#[derive(Clone)]
pub struct BreachRecord {
    pub account_id: AccountId,
    pub secret: String,
    pub contacts: Vec<String>,
    pub owner_address: String,
}

impl From<&Account> for BreachRecord {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.id,
            secret: account.secret.clone(),
            contacts: account.contacts.clone(),
            owner_address: account.owner_address.clone(),
        }
    }
}

impl fmt::Debug for BreachRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreachRecord")
            .field("account_id", &self.account_id)
            .field("secret", &"<redacted>")
            .field("contacts", &self.contacts.len())
            .finish()
    }
}
