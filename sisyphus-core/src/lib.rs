//! Sisyphus Core - enforcement engine for check-in commitments
//!
//! Accounts promise to check in regularly. An active account that misses its
//! deadline has its secret disclosed to its contacts and is then sealed.
//!
//! This crate follows hexagonal architecture:
//!
//! - **domain**: Core entities and the pure deadline rule
//! - **ports**: Trait definitions for the account store and notifier
//! - **services**: Scan, disclosure, sealing and the sweep that drives them
//! - **adapters**: Concrete implementations (DuckDB, HTTP mail API, demo)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use adapters::duckdb::DuckDbAccountStore;
use config::Config;
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::Error;
pub use domain::{
    Account, AccountFailure, AccountId, AccountState, DeliveryErrorKind, DisclosureResult,
    SweepReport,
};

/// Database file used outside demo mode
pub const DB_FILENAME: &str = "sisyphus.duckdb";

/// Main context for Sisyphus operations
///
/// Holds the configuration and the account store. The sweep service is built
/// on demand so read-only commands never need notifier settings.
pub struct SisyphusContext {
    pub config: Config,
    pub store: Arc<DuckDbAccountStore>,
    pub status_service: StatusService,
}

impl SisyphusContext {
    /// Create a new context for `sisyphus_dir`
    pub fn new(sisyphus_dir: &Path) -> Result<Self> {
        let config = Config::load(sisyphus_dir)?;
        Self::with_config(sisyphus_dir, config)
    }

    /// Create a context with an already loaded configuration
    pub fn with_config(sisyphus_dir: &Path, config: Config) -> Result<Self> {
        let db_filename = if config.demo_mode {
            DEMO_DB_FILENAME
        } else {
            DB_FILENAME
        };

        let store = Arc::new(DuckDbAccountStore::new(&sisyphus_dir.join(db_filename))?);
        store.ensure_schema()?;

        let status_service = StatusService::new(Arc::clone(&store), config.sweep.grace_hours);

        Ok(Self {
            config,
            store,
            status_service,
        })
    }

    /// Build a sweep service from the current configuration
    ///
    /// `disclosure_override` replaces the configured `disclosureEnabled`
    /// setting, e.g. for `sweep --dry-run`.
    pub fn sweep_service(&self, disclosure_override: Option<bool>) -> Result<SweepService> {
        let mut config = self.config.clone();
        if let Some(enabled) = disclosure_override {
            config.sweep.disclosure_enabled = enabled;
        }
        config.validate()?;

        let notifier = config.build_notifier()?;
        tracing::debug!(notifier = notifier.name(), "sweep notifier ready");

        Ok(SweepService::new(
            Arc::clone(&self.store) as Arc<dyn ports::AccountStore>,
            notifier,
            config.sweep_options(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_context_uses_demo_database_in_demo_mode() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.enable_demo_mode();

        let context = SisyphusContext::with_config(dir.path(), config).unwrap();
        assert_eq!(
            context.store.db_path(),
            Some(dir.path().join(DEMO_DB_FILENAME).as_path())
        );
    }

    #[test]
    fn test_status_works_without_notifier_settings() {
        let dir = tempdir().unwrap();
        let context = SisyphusContext::with_config(dir.path(), Config::default()).unwrap();

        assert!(context.status_service.get_status(chrono::Utc::now()).is_ok());
        assert!(context.sweep_service(None).is_err());
        assert!(context.sweep_service(Some(false)).is_ok());
    }
}
