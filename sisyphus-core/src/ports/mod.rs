//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The enforcement
//! core depends only on these traits, not on concrete implementations.

mod account_store;
mod notifier;

pub use account_store::AccountStore;
pub use notifier::Notifier;
