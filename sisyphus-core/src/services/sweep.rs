//! Sweep service - scan, disclose and seal in one bounded run
//!
//! Each breached account runs its own pipeline task:
//! `Scanned -> Disclosing -> Sealing -> Done`, or `Failed` on an error that
//! belongs to that account. Pipelines never cancel each other, and only a
//! failed scan fails the run as a whole.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{
    AccountFailure, AccountId, AccountState, BreachRecord, DisclosureResult, SweepReport,
};
use crate::ports::{AccountStore, Notifier};
use crate::services::disclosure::DisclosureFanout;
use crate::services::scanner::{BreachScanner, ScanOutcome};
use crate::services::sealer::AccountSealer;

/// Default number of account pipelines allowed to run at once
pub const DEFAULT_MAX_CONCURRENT_ACCOUNTS: usize = 16;

/// Behavior switches for a sweep
#[derive(Debug, Clone)]
pub struct SweepOptions {
    /// When false, breached accounts are reported but neither disclosed nor sealed
    pub disclosure_enabled: bool,
    /// On timeout, abort in-flight pipelines instead of letting them finish
    pub abandon_in_flight: bool,
    pub max_concurrent_accounts: usize,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            disclosure_enabled: true,
            abandon_in_flight: false,
            max_concurrent_accounts: DEFAULT_MAX_CONCURRENT_ACCOUNTS,
        }
    }
}

/// Terminal result of one account pipeline
struct PipelineOutcome {
    account_id: AccountId,
    disclosure: DisclosureResult,
    sealed: Result<bool>,
}

/// Orchestrates scan -> fanout -> seal
pub struct SweepService {
    scanner: BreachScanner,
    fanout: DisclosureFanout,
    sealer: AccountSealer,
    options: SweepOptions,
}

impl SweepService {
    pub fn new(
        store: Arc<dyn AccountStore>,
        notifier: Arc<dyn Notifier>,
        options: SweepOptions,
    ) -> Self {
        Self {
            scanner: BreachScanner::new(Arc::clone(&store)),
            fanout: DisclosureFanout::new(notifier),
            sealer: AccountSealer::new(store),
            options,
        }
    }

    pub fn options(&self) -> &SweepOptions {
        &self.options
    }

    /// Run one sweep
    ///
    /// Returns `Err(StoreUnavailable)` only when the scan fails, in which case
    /// nothing was sent and nothing was sealed. Every other problem is recorded
    /// in the returned report. Accounts still in flight when `timeout` elapses
    /// are listed as incomplete; the next run will pick them up again.
    pub async fn run_sweep(
        &self,
        now: DateTime<Utc>,
        grace_hours: u32,
        timeout: Duration,
    ) -> Result<SweepReport> {
        let deadline = Instant::now() + timeout;
        let mut report = SweepReport::new(Uuid::new_v4(), now, grace_hours);
        tracing::info!(run_id = %report.run_id, grace_hours, "sweep started");

        let scan = match self.scan(now, grace_hours, deadline).await {
            Ok(scan) => scan,
            Err(e) => {
                tracing::error!(run_id = %report.run_id, error = %e, "scan failed, aborting sweep");
                return Err(e);
            }
        };

        report.scanned = scan.scanned;
        report.breached = scan.breaches.len();
        report.failures.extend(scan.invalid);

        if self.options.disclosure_enabled {
            self.process_breaches(scan.breaches, deadline, &mut report)
                .await;
        } else {
            for record in &scan.breaches {
                tracing::info!(
                    run_id = %report.run_id,
                    account_id = %record.account_id,
                    "disclosure disabled, leaving breached account untouched"
                );
            }
            report.skipped = scan.breaches.len();
        }

        report.finished_at = Utc::now();
        tracing::info!(
            run_id = %report.run_id,
            scanned = report.scanned,
            breached = report.breached,
            sealed = report.sealed,
            already_sealed = report.already_sealed,
            skipped = report.skipped,
            failures = report.failures.len(),
            incomplete = report.incomplete.len(),
            timed_out = report.timed_out,
            "sweep finished"
        );
        Ok(report)
    }

    async fn scan(
        &self,
        now: DateTime<Utc>,
        grace_hours: u32,
        deadline: Instant,
    ) -> Result<ScanOutcome> {
        let scanner = self.scanner.clone();
        let task = tokio::task::spawn_blocking(move || scanner.scan(now, grace_hours));

        match tokio::time::timeout_at(deadline, task).await {
            Ok(Ok(scan)) => scan,
            Ok(Err(e)) => Err(Error::store_unavailable(format!("scan task failed: {}", e))),
            Err(_) => Err(Error::store_unavailable("scan did not finish before the deadline")),
        }
    }

    async fn process_breaches(
        &self,
        breaches: Vec<BreachRecord>,
        deadline: Instant,
        report: &mut SweepReport,
    ) {
        let permits = Arc::new(Semaphore::new(self.options.max_concurrent_accounts.max(1)));
        let mut progress: HashMap<AccountId, watch::Receiver<AccountState>> = HashMap::new();
        let mut tasks = JoinSet::new();

        for record in breaches {
            let (state_tx, state_rx) = watch::channel(AccountState::Scanned);
            progress.insert(record.account_id, state_rx);
            tasks.spawn(run_pipeline(
                record,
                self.fanout.clone(),
                self.sealer.clone(),
                Arc::clone(&permits),
                state_tx,
            ));
        }

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok(outcome))) => {
                    progress.remove(&outcome.account_id);
                    record_outcome(report, outcome);
                }
                Ok(Some(Err(e))) => {
                    // The account stays in `progress` and is reported below
                    tracing::warn!(run_id = %report.run_id, error = %e, "account pipeline panicked");
                }
                Ok(None) => break,
                Err(_) => {
                    report.timed_out = true;
                    break;
                }
            }
        }

        if report.timed_out {
            if self.options.abandon_in_flight {
                tasks.abort_all();
            } else {
                tasks.detach_all();
            }
        }

        let mut leftover: Vec<(AccountId, AccountState)> = progress
            .into_iter()
            .map(|(id, state)| (id, *state.borrow()))
            .collect();
        leftover.sort_by_key(|(id, _)| *id);

        for (account_id, state) in leftover {
            if report.timed_out {
                tracing::warn!(
                    run_id = %report.run_id,
                    account_id = %account_id,
                    state = state.as_str(),
                    "account not sealed before the sweep deadline"
                );
                report.incomplete.push(AccountFailure::new(
                    account_id,
                    state,
                    "timeout",
                    format!(
                        "sweep deadline passed while the account was {}",
                        state.as_str()
                    ),
                ));
            } else {
                report.failures.push(AccountFailure::new(
                    account_id,
                    state,
                    "pipeline_panicked",
                    "account pipeline terminated unexpectedly",
                ));
            }
        }
    }
}

/// Disclose, then seal, one breached account
///
/// The seal is only attempted once every send for the account has finished,
/// whether or not the sends succeeded.
async fn run_pipeline(
    record: BreachRecord,
    fanout: DisclosureFanout,
    sealer: AccountSealer,
    permits: Arc<Semaphore>,
    state: watch::Sender<AccountState>,
) -> PipelineOutcome {
    let account_id = record.account_id;
    // The semaphore is never closed, so acquisition only fails if it is dropped
    let _permit = permits.acquire_owned().await.ok();

    state.send_replace(AccountState::Disclosing);
    let disclosure = fanout.disclose(record).await;

    state.send_replace(AccountState::Sealing);
    let sealed = sealer.seal_async(account_id).await;

    state.send_replace(if sealed.is_ok() {
        AccountState::Done
    } else {
        AccountState::Failed
    });

    PipelineOutcome {
        account_id,
        disclosure,
        sealed,
    }
}

fn record_outcome(report: &mut SweepReport, outcome: PipelineOutcome) {
    report.deliveries_attempted += outcome.disclosure.attempted();
    report.deliveries_failed += outcome.disclosure.failures();
    report.disclosures.push(outcome.disclosure);

    match outcome.sealed {
        Ok(true) => {
            tracing::info!(run_id = %report.run_id, account_id = %outcome.account_id, "account sealed");
            report.sealed += 1;
        }
        Ok(false) => {
            tracing::info!(
                run_id = %report.run_id,
                account_id = %outcome.account_id,
                "account already sealed by another run"
            );
            report.already_sealed += 1;
        }
        Err(e) => {
            tracing::warn!(
                run_id = %report.run_id,
                account_id = %outcome.account_id,
                state = AccountState::Sealing.as_str(),
                kind = e.kind(),
                error = %e,
                "sealing failed"
            );
            report.failures.push(AccountFailure::new(
                outcome.account_id,
                AccountState::Sealing,
                e.kind(),
                e.to_string(),
            ));
        }
    }
}
