//! DuckDB account store implementation

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::{params, Connection};

use crate::domain::result::{Error, Result};
use crate::domain::{Account, AccountId, MAX_CONTACTS};
use crate::migrations::MIGRATIONS;
use crate::ports::AccountStore;
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Storage format for naive UTC timestamps
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

const ACCOUNT_COLUMNS: &str = "id, active, fulfilled, username, email, secret,
    creation_date::VARCHAR, last_push::VARCHAR,
    contact1, contact2, contact3, contact4, contact5";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// DuckDB-backed account store
///
/// A single connection guarded by a mutex; the conditional UPDATE in
/// `cas_active_false` is the only mutation the enforcement core performs.
pub struct DuckDbAccountStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbAccountStore {
    /// Open (or create) the account database
    ///
    /// Retries with exponential backoff when the file is locked by another
    /// process, e.g. a scheduled sweep overlapping with a manual one.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut attempt = 0;
        loop {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if !is_retryable_error(&err_msg) || attempt >= MAX_RETRIES - 1 {
                        return Err(Error::store_unavailable(err_msg));
                    }
                    let delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                    tracing::warn!(
                        delay_ms = delay.as_millis() as u64,
                        attempt = attempt + 1,
                        max = MAX_RETRIES,
                        error = %err_msg,
                        "account database busy, retrying"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }

    /// In-memory store, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> std::result::Result<Connection, duckdb::Error> {
        // Extension autoloading stays off; everything we need is statically linked
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Connection::open_with_flags(db_path, config)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::store_unavailable(format!("lock poisoned: {}", e)))
    }

    /// Path of the backing file, `None` for in-memory stores
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Run pending schema migrations
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.lock()?;
        MigrationService::new(&conn, MIGRATIONS).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    /// Insert an account and return its store-assigned id
    ///
    /// The id on `account` is ignored. Account creation normally belongs to
    /// the account API; this exists for seeding and tests.
    pub fn insert_account(&self, account: &Account) -> Result<AccountId> {
        if account.contacts.len() > MAX_CONTACTS {
            return Err(Error::invalid_state(format!(
                "account has {} contacts, at most {} are allowed",
                account.contacts.len(),
                MAX_CONTACTS
            )));
        }
        let contact = |i: usize| account.contacts.get(i).map(String::as_str);

        let conn = self.lock()?;
        let id: i64 = conn.query_row(
            "INSERT INTO users (active, fulfilled, username, email, secret,
                                creation_date, last_push,
                                contact1, contact2, contact3, contact4, contact5)
             VALUES (?, ?, ?, ?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP), ?, ?, ?, ?, ?)
             RETURNING id",
            params![
                account.active,
                account.fulfilled,
                &account.username,
                &account.owner_address,
                &account.secret,
                account.created_at.map(format_timestamp),
                account.last_check_in.map(format_timestamp),
                contact(0),
                contact(1),
                contact(2),
                contact(3),
                contact(4),
            ],
            |row| row.get(0),
        )?;
        Ok(AccountId(id))
    }

    /// Get one account by id
    pub fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM users WHERE id = ?", ACCOUNT_COLUMNS))?;
        let mut rows = stmt.query_map(params![id.0], row_to_account)?;
        match rows.next() {
            Some(account) => Ok(Some(account?)),
            None => Ok(None),
        }
    }

    /// Get all accounts, active or not, ordered by id
    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        self.query_accounts(&format!("SELECT {} FROM users ORDER BY id", ACCOUNT_COLUMNS))
    }

    /// Record a check-in ("push") for an active account
    ///
    /// Returns `false` when the account is sealed or unknown.
    pub fn record_check_in(&self, id: AccountId, at: DateTime<Utc>) -> Result<bool> {
        let conn = self.lock()?;
        let rows_changed = conn.execute(
            "UPDATE users SET last_push = CAST(? AS TIMESTAMP), fulfilled = true
             WHERE id = ? AND active = true",
            params![format_timestamp(at), id.0],
        )?;
        Ok(rows_changed == 1)
    }

    fn query_accounts(&self, sql: &str) -> Result<Vec<Account>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], row_to_account)?;

        let mut accounts = Vec::new();
        for account in rows {
            accounts.push(account?);
        }
        Ok(accounts)
    }
}

impl AccountStore for DuckDbAccountStore {
    fn list_active_accounts(&self) -> Result<Vec<Account>> {
        self.query_accounts(&format!(
            "SELECT {} FROM users WHERE active = true",
            ACCOUNT_COLUMNS
        ))
    }

    fn cas_active_false(&self, id: AccountId) -> Result<bool> {
        let conn = self.lock()?;
        let rows_changed = conn.execute(
            "UPDATE users SET active = false, fulfilled = false
             WHERE id = ? AND active = true",
            params![id.0],
        )?;
        Ok(rows_changed == 1)
    }
}

fn row_to_account(row: &duckdb::Row) -> std::result::Result<Account, duckdb::Error> {
    // Column indices from ACCOUNT_COLUMNS:
    // 0: id, 1: active, 2: fulfilled, 3: username, 4: email, 5: secret,
    // 6: creation_date, 7: last_push, 8..=12: contact1..contact5
    let created: Option<String> = row.get(6)?;
    let last_push: Option<String> = row.get(7)?;

    let mut contacts = Vec::with_capacity(MAX_CONTACTS);
    for idx in 8..8 + MAX_CONTACTS {
        if let Some(contact) = row.get::<_, Option<String>>(idx)? {
            if !contact.trim().is_empty() {
                contacts.push(contact);
            }
        }
    }

    Ok(Account {
        id: AccountId(row.get(0)?),
        active: row.get(1)?,
        fulfilled: row.get(2)?,
        username: row.get(3)?,
        owner_address: row.get(4)?,
        secret: row.get(5)?,
        created_at: created.as_deref().and_then(parse_timestamp),
        // An unparseable timestamp surfaces as a missing check-in (InvalidState)
        last_check_in: last_push.as_deref().and_then(parse_timestamp),
        contacts,
    })
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

/// Parse DuckDB's VARCHAR rendering of a TIMESTAMP as UTC
///
/// DuckDB drops the fractional part when it is zero.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .map(|dt| dt.and_utc())
        .ok()
}
