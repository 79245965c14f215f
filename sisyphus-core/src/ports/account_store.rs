//! Account store port - the relational store that owns accounts

use crate::domain::result::Result;
use crate::domain::{Account, AccountId};

/// Account store abstraction
///
/// Both calls are synchronous. The only error the core distinguishes is
/// `Error::StoreUnavailable`; implementations map every backend failure to it.
pub trait AccountStore: Send + Sync {
    /// Bulk read of every account with `active = true`
    fn list_active_accounts(&self) -> Result<Vec<Account>>;

    /// Conditional seal: set `active = false` only if it is still `true`
    ///
    /// Returns `true` when this call performed the transition and `false`
    /// when the account was already inactive (or does not exist).
    fn cas_active_false(&self, id: AccountId) -> Result<bool>;
}
