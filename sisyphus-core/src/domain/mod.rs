//! Core domain entities
//!
//! All enforcement entities are defined here. These are pure data structures
//! and pure functions - no I/O or external dependencies.

pub mod account;
pub mod breach;
pub mod delivery;
pub mod report;
pub mod result;

pub use account::{is_valid_address, Account, AccountId, MAX_CONTACTS};
pub use breach::{is_breached, BreachRecord};
pub use delivery::{DeliveryError, DeliveryErrorKind, DeliveryOutcome, DisclosureResult};
pub use report::{AccountFailure, AccountState, SweepReport};
