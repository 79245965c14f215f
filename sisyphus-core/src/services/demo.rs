//! Demo service - manage demo mode
//!
//! Demo mode runs sweeps against demo.duckdb, seeded with sample accounts,
//! and records messages in memory instead of sending them.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;

use crate::adapters::demo::generate_demo_accounts;
use crate::adapters::duckdb::DuckDbAccountStore;
use crate::config::Config;

pub const DEMO_DB_FILENAME: &str = "demo.duckdb";

/// Demo service for managing demo mode
pub struct DemoService {
    sisyphus_dir: PathBuf,
}

impl DemoService {
    pub fn new(sisyphus_dir: &Path) -> Self {
        Self {
            sisyphus_dir: sisyphus_dir.to_path_buf(),
        }
    }

    /// Check if demo mode is currently enabled
    pub fn is_enabled(&self) -> Result<bool> {
        let config = Config::load(&self.sisyphus_dir)?;
        Ok(config.demo_mode)
    }

    /// Enable demo mode
    ///
    /// Recreates the demo database from scratch and seeds it with accounts
    /// whose check-ins are relative to the current time.
    pub fn enable(&self) -> Result<()> {
        self.remove_demo_database()?;

        let mut config = Config::load_file(&self.sisyphus_dir).unwrap_or_default();
        config.enable_demo_mode();
        config.save(&self.sisyphus_dir)?;

        let store = DuckDbAccountStore::new(&self.sisyphus_dir.join(DEMO_DB_FILENAME))?;
        store.ensure_schema()?;
        for account in generate_demo_accounts(Utc::now()) {
            store.insert_account(&account)?;
        }

        Ok(())
    }

    /// Disable demo mode, deleting the demo database when `clean` is set
    pub fn disable(&self, clean: bool) -> Result<()> {
        let mut config = Config::load_file(&self.sisyphus_dir).unwrap_or_default();
        config.disable_demo_mode();
        config.save(&self.sisyphus_dir)?;

        if clean {
            self.remove_demo_database()?;
        }

        Ok(())
    }

    fn remove_demo_database(&self) -> Result<()> {
        let demo_db = self.sisyphus_dir.join(DEMO_DB_FILENAME);
        let demo_wal = self.sisyphus_dir.join(format!("{}.wal", DEMO_DB_FILENAME));
        if demo_db.exists() {
            std::fs::remove_file(&demo_db)?;
        }
        if demo_wal.exists() {
            std::fs::remove_file(&demo_wal)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_enable_seeds_demo_database() {
        let dir = tempdir().unwrap();
        let service = DemoService::new(dir.path());

        service.enable().unwrap();

        assert!(Config::load_file(dir.path()).unwrap().demo_mode);
        let store = DuckDbAccountStore::new(&dir.path().join(DEMO_DB_FILENAME)).unwrap();
        assert_eq!(store.list_accounts().unwrap().len(), 4);
    }

    #[test]
    fn test_enable_twice_starts_fresh() {
        let dir = tempdir().unwrap();
        let service = DemoService::new(dir.path());

        service.enable().unwrap();
        service.enable().unwrap();

        let store = DuckDbAccountStore::new(&dir.path().join(DEMO_DB_FILENAME)).unwrap();
        assert_eq!(store.list_accounts().unwrap().len(), 4);
    }

    #[test]
    fn test_disable_with_clean_removes_database() {
        let dir = tempdir().unwrap();
        let service = DemoService::new(dir.path());

        service.enable().unwrap();
        service.disable(true).unwrap();

        assert!(!Config::load_file(dir.path()).unwrap().demo_mode);
        assert!(!dir.path().join(DEMO_DB_FILENAME).exists());
    }
}
