//! Sweep run report and per-account pipeline states

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::AccountId;
use super::delivery::DisclosureResult;

/// Per-account pipeline state within one sweep
///
/// `Done`, `Failed` and `Skipped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountState {
    Scanned,
    Disclosing,
    Sealing,
    Done,
    Failed,
    /// Breach detected but disclosure is disabled for this run
    Skipped,
}

impl AccountState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AccountState::Done | AccountState::Failed | AccountState::Skipped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountState::Scanned => "scanned",
            AccountState::Disclosing => "disclosing",
            AccountState::Sealing => "sealing",
            AccountState::Done => "done",
            AccountState::Failed => "failed",
            AccountState::Skipped => "skipped",
        }
    }
}

/// A per-account problem recorded in the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountFailure {
    pub account_id: AccountId,
    /// State the account was in when the problem occurred
    pub state: AccountState,
    /// Machine-readable error kind (e.g. `store_unavailable`, `timeout`)
    pub kind: String,
    pub message: String,
}

impl AccountFailure {
    pub fn new(
        account_id: AccountId,
        state: AccountState,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            state,
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Summary of one sweep invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub run_id: Uuid,
    /// Point in time the deadlines were evaluated against
    pub evaluated_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub grace_hours: u32,
    /// Active accounts read from the store
    pub scanned: usize,
    pub breached: usize,
    /// Fresh active -> inactive transitions performed by this run
    pub sealed: usize,
    /// Breached accounts another run had already sealed
    pub already_sealed: usize,
    /// Breached accounts left untouched because disclosure is disabled
    pub skipped: usize,
    pub deliveries_attempted: usize,
    pub deliveries_failed: usize,
    /// Per-account disclosure results, owner notice included
    pub disclosures: Vec<DisclosureResult>,
    pub failures: Vec<AccountFailure>,
    /// Accounts whose pipeline had not finished when the run timed out
    pub incomplete: Vec<AccountFailure>,
    pub timed_out: bool,
}

impl SweepReport {
    pub fn new(run_id: Uuid, evaluated_at: DateTime<Utc>, grace_hours: u32) -> Self {
        let started_at = Utc::now();
        Self {
            run_id,
            evaluated_at,
            started_at,
            finished_at: started_at,
            grace_hours,
            scanned: 0,
            breached: 0,
            sealed: 0,
            already_sealed: 0,
            skipped: 0,
            deliveries_attempted: 0,
            deliveries_failed: 0,
            disclosures: Vec::new(),
            failures: Vec::new(),
            incomplete: Vec::new(),
            timed_out: false,
        }
    }

    /// True when every breached account reached `Done` and nothing failed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.incomplete.is_empty() && !self.timed_out
    }
}
