//! Account sealer - the irreversible active -> inactive transition

use std::sync::Arc;

use crate::domain::result::{Error, Result};
use crate::domain::AccountId;
use crate::ports::AccountStore;

#[derive(Clone)]
pub struct AccountSealer {
    store: Arc<dyn AccountStore>,
}

impl AccountSealer {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Compare-and-set `active` from true to false
    ///
    /// Returns `true` if this call sealed the account, `false` if another run
    /// got there first.
    pub fn seal(&self, id: AccountId) -> Result<bool> {
        self.store.cas_active_false(id).map_err(|e| match e {
            Error::StoreUnavailable(_) => e,
            other => Error::store_unavailable(other.to_string()),
        })
    }

    /// `seal` on the blocking pool, for use from async pipelines
    ///
    /// A panic inside the store is resumed on the calling task.
    pub async fn seal_async(&self, id: AccountId) -> Result<bool> {
        let sealer = self.clone();
        match tokio::task::spawn_blocking(move || sealer.seal(id)).await {
            Ok(sealed) => sealed,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(Error::store_unavailable(format!("seal task failed: {}", e))),
        }
    }
}
