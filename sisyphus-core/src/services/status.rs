//! Status service - account summaries and deadline overview

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::adapters::duckdb::DuckDbAccountStore;
use crate::domain::{is_breached, Account};

/// Status service for account summaries
///
/// Read-only: never exposes secrets and never changes account state.
pub struct StatusService {
    store: Arc<DuckDbAccountStore>,
    grace_hours: u32,
}

impl StatusService {
    pub fn new(store: Arc<DuckDbAccountStore>, grace_hours: u32) -> Self {
        Self { store, grace_hours }
    }

    /// Get overall status summary as of `now`
    pub fn get_status(&self, now: DateTime<Utc>) -> Result<StatusSummary> {
        let accounts = self.store.list_accounts()?;
        let summaries: Vec<AccountSummary> = accounts
            .iter()
            .map(|a| summarize(a, now, self.grace_hours))
            .collect();

        let active_accounts = accounts.iter().filter(|a| a.active).count() as i64;
        Ok(StatusSummary {
            total_accounts: accounts.len() as i64,
            active_accounts,
            sealed_accounts: accounts.len() as i64 - active_accounts,
            overdue_accounts: summaries.iter().filter(|s| s.overdue).count() as i64,
            grace_hours: self.grace_hours,
            accounts: summaries,
        })
    }
}

fn summarize(account: &Account, now: DateTime<Utc>, grace_hours: u32) -> AccountSummary {
    let hours_since_check_in = account
        .last_check_in
        .map(|t| (now - t).num_minutes() as f64 / 60.0);
    let hours_remaining = hours_since_check_in
        .filter(|_| account.active)
        .map(|h| grace_hours as f64 - h);
    let overdue = account.active
        && is_breached(account.last_check_in, now, grace_hours).unwrap_or(false);

    AccountSummary {
        id: account.id.0,
        username: account.username.clone(),
        active: account.active,
        fulfilled: account.fulfilled,
        day: account.day_number(now),
        hours_since_check_in,
        hours_remaining,
        overdue,
        contacts: account.contacts.len(),
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_accounts: i64,
    pub active_accounts: i64,
    pub sealed_accounts: i64,
    /// Active accounts the next sweep would disclose
    pub overdue_accounts: i64,
    pub grace_hours: u32,
    pub accounts: Vec<AccountSummary>,
}

#[derive(Debug, Serialize)]
pub struct AccountSummary {
    pub id: i64,
    pub username: String,
    pub active: bool,
    pub fulfilled: bool,
    pub day: Option<i64>,
    pub hours_since_check_in: Option<f64>,
    /// Negative once the deadline has passed; `None` for sealed accounts
    pub hours_remaining: Option<f64>,
    pub overdue: bool,
    pub contacts: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::demo::generate_demo_accounts;

    fn seeded_store(now: DateTime<Utc>) -> Arc<DuckDbAccountStore> {
        let store = DuckDbAccountStore::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        for account in generate_demo_accounts(now) {
            store.insert_account(&account).unwrap();
        }
        Arc::new(store)
    }

    #[test]
    fn test_status_counts() {
        let now = Utc::now();
        let service = StatusService::new(seeded_store(now), 24);

        let status = service.get_status(now).unwrap();
        assert_eq!(status.total_accounts, 4);
        assert_eq!(status.active_accounts, 3);
        assert_eq!(status.sealed_accounts, 1);
        assert_eq!(status.overdue_accounts, 2);
    }

    #[test]
    fn test_sealed_accounts_are_never_overdue() {
        let now = Utc::now();
        let service = StatusService::new(seeded_store(now), 24);

        let status = service.get_status(now).unwrap();
        let sealed = status
            .accounts
            .iter()
            .find(|a| a.username == "sealed")
            .unwrap();
        assert!(!sealed.overdue);
        assert!(sealed.hours_remaining.is_none());
    }

    #[test]
    fn test_status_does_not_serialize_secrets() {
        let now = Utc::now();
        let service = StatusService::new(seeded_store(now), 24);

        let json = serde_json::to_string(&service.get_status(now).unwrap()).unwrap();
        assert!(!json.contains("Camus"));
        assert!(!json.contains("night light"));
    }
}
