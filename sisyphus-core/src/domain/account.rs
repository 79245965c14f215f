//! Account domain model

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Maximum number of designated contacts per account
pub const MAX_CONTACTS: usize = 5;

/// Opaque account identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AccountId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
        )
        .expect("email pattern is valid")
    })
}

/// Check whether an address is syntactically deliverable
pub fn is_valid_address(address: &str) -> bool {
    email_pattern().is_match(address)
}

/// A user who has registered a secret and a check-in obligation
///
/// The secret is never printed by `Debug` and the type is not serializable,
/// so it cannot leak through logs or JSON output by accident.
#[derive(Clone)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub active: bool,
    /// True when the user has checked in during the current window
    pub fulfilled: bool,
    pub created_at: Option<DateTime<Utc>>,
    /// Nullable only before creation completes
    pub last_check_in: Option<DateTime<Utc>>,
    pub secret: String,
    /// Designated contacts, in the order they were registered
    pub contacts: Vec<String>,
    pub owner_address: String,
}

impl Account {
    /// Create a new active account that has just checked in
    pub fn new(
        id: AccountId,
        username: impl Into<String>,
        owner_address: impl Into<String>,
        secret: impl Into<String>,
        contacts: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            username: username.into(),
            active: true,
            fulfilled: false,
            created_at: Some(now),
            last_check_in: Some(now),
            secret: secret.into(),
            contacts,
            owner_address: owner_address.into(),
        }
    }

    /// One-based day counter of the commitment
    ///
    /// Returns `None` when the creation time is unknown.
    pub fn day_number(&self, now: DateTime<Utc>) -> Option<i64> {
        let created = self.created_at?;
        let elapsed = now.signed_duration_since(created);
        Some(elapsed.num_hours().max(0) / 24 + 1)
    }

    /// Validate account data
    pub fn validate(&self) -> Result<(), String> {
        if self.contacts.is_empty() {
            return Err("at least one contact is required".to_string());
        }
        if self.contacts.len() > MAX_CONTACTS {
            return Err(format!("at most {} contacts are allowed", MAX_CONTACTS));
        }
        if !is_valid_address(&self.owner_address) {
            return Err("owner email is invalid".to_string());
        }
        for (i, contact) in self.contacts.iter().enumerate() {
            if !is_valid_address(contact) {
                return Err(format!("contact{} email is invalid", i + 1));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("active", &self.active)
            .field("fulfilled", &self.fulfilled)
            .field("created_at", &self.created_at)
            .field("last_check_in", &self.last_check_in)
            .field("secret", &"<redacted>")
            .field("contacts", &self.contacts.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> Account {
        Account::new(
            AccountId(7),
            "sisyphus",
            "owner@example.com",
            "I pushed the boulder off the cliff",
            vec![
                "a@example.com".to_string(),
                "b@example.org".to_string(),
            ],
        )
    }

    #[test]
    fn test_address_validation() {
        assert!(is_valid_address("first.last+tag@mail.example.com"));
        assert!(!is_valid_address("no-at-sign"));
        assert!(!is_valid_address("trailing@"));
        assert!(!is_valid_address("bad@-domain.com"));
    }

    #[test]
    fn test_account_validation() {
        let mut account = sample();
        assert!(account.validate().is_ok());

        account.contacts.push("not an address".to_string());
        assert_eq!(
            account.validate().unwrap_err(),
            "contact3 email is invalid"
        );

        account.contacts = (0..6).map(|i| format!("c{}@example.com", i)).collect();
        assert!(account.validate().is_err());
    }

    #[test]
    fn test_day_number() {
        let mut account = sample();
        let created = Utc::now();
        account.created_at = Some(created);

        assert_eq!(account.day_number(created), Some(1));
        assert_eq!(account.day_number(created + Duration::hours(23)), Some(1));
        assert_eq!(account.day_number(created + Duration::hours(24)), Some(2));
        assert_eq!(account.day_number(created + Duration::days(9)), Some(10));

        account.created_at = None;
        assert_eq!(account.day_number(created), None);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("boulder"));
        assert!(rendered.contains("<redacted>"));
    }
}
