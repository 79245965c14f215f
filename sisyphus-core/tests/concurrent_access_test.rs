//! Concurrent sealing tests
//!
//! Overlapping sweeps (a scheduled run racing a manual one) must transition
//! every account at most once. These tests hammer the compare-and-set seal
//! and run whole sweeps side by side against one DuckDB file.
//!
//! Run with: cargo test --test concurrent_access_test -- --nocapture

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

use chrono::{Duration as ChronoDuration, Utc};

use sisyphus_core::adapters::demo::DemoNotifier;
use sisyphus_core::adapters::duckdb::DuckDbAccountStore;
use sisyphus_core::domain::{Account, AccountId};
use sisyphus_core::ports::AccountStore;
use sisyphus_core::services::{AccountSealer, SweepOptions, SweepService};

/// Number of concurrent threads for stress tests
const THREAD_COUNT: usize = 6;

/// Number of accounts sealed per test
const ACCOUNT_COUNT: usize = 10;

fn create_store(temp_dir: &TempDir) -> Arc<DuckDbAccountStore> {
    let store = DuckDbAccountStore::new(&temp_dir.path().join("test_concurrent.duckdb")).unwrap();
    store.ensure_schema().unwrap();
    Arc::new(store)
}

fn seed_overdue(store: &DuckDbAccountStore, count: usize) -> Vec<AccountId> {
    (0..count)
        .map(|i| {
            let mut account = Account::new(
                AccountId(0),
                format!("user{}", i),
                format!("user{}@example.com", i),
                format!("secret {}", i),
                vec![format!("friend{}@example.com", i)],
            );
            account.last_check_in = Some(Utc::now() - ChronoDuration::hours(48));
            store.insert_account(&account).unwrap()
        })
        .collect()
}

/// Test: many threads seal the same accounts at the same moment
///
/// Exactly one seal per account may report a transition.
#[test]
fn test_concurrent_seals_transition_each_account_once() {
    let temp_dir = TempDir::new().unwrap();
    let store = create_store(&temp_dir);
    let ids = Arc::new(seed_overdue(&store, ACCOUNT_COUNT));

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let transitions = Arc::new(AtomicUsize::new(0));
    let error_count = Arc::new(AtomicUsize::new(0));

    let mut handles = vec![];
    for _ in 0..THREAD_COUNT {
        let barrier = Arc::clone(&barrier);
        let ids = Arc::clone(&ids);
        let transitions = Arc::clone(&transitions);
        let error_count = Arc::clone(&error_count);
        let sealer = AccountSealer::new(store.clone());

        handles.push(thread::spawn(move || {
            barrier.wait();
            for id in ids.iter() {
                match sealer.seal(*id) {
                    Ok(true) => {
                        transitions.fetch_add(1, Ordering::SeqCst);
                    }
                    Ok(false) => {}
                    Err(e) => {
                        println!("seal of {} failed: {}", id, e);
                        error_count.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(error_count.load(Ordering::SeqCst), 0);
    assert_eq!(transitions.load(Ordering::SeqCst), ACCOUNT_COUNT);
    assert!(store.list_active_accounts().unwrap().is_empty());
}

/// Test: two sweeps over the same store at the same time
///
/// Both may disclose an account (at-least-once), but the seals add up to
/// exactly one per account.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_sweeps_seal_each_account_once() {
    let temp_dir = TempDir::new().unwrap();
    let store = create_store(&temp_dir);
    seed_overdue(&store, ACCOUNT_COUNT);

    let now = Utc::now();
    let timeout = Duration::from_secs(30);
    let first = SweepService::new(
        store.clone(),
        Arc::new(DemoNotifier::new()),
        SweepOptions::default(),
    );
    let second = SweepService::new(
        store.clone(),
        Arc::new(DemoNotifier::new()),
        SweepOptions::default(),
    );

    let (a, b) = tokio::join!(
        first.run_sweep(now, 24, timeout),
        second.run_sweep(now, 24, timeout)
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a.failures.is_empty() && b.failures.is_empty());
    assert_eq!(a.sealed + b.sealed, ACCOUNT_COUNT);
    assert_eq!(
        a.sealed + a.already_sealed + b.sealed + b.already_sealed,
        a.breached + b.breached
    );
    assert!(store.list_active_accounts().unwrap().is_empty());
}
