//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "app": { "demoMode": false },
//!   "sweep": { "graceHours": 24, "timeoutSecs": 300, "abandonInFlight": false,
//!              "disclosureEnabled": true, "maxConcurrentAccounts": 16,
//!              "intervalSecs": 3600 },
//!   "notifier": { "endpoint": "https://...", "from": "sisyphus@example.com",
//!                 "requestTimeoutSecs": 30, "smtpHost": "smtp.example.com",
//!                 "smtpPort": 587, "smtpUsername": null }
//! }
//! ```
//! The notifier API key (`SISYPHUS_NOTIFIER_API_KEY`) and the SMTP password
//! (`SISYPHUS_EMAIL_PASSWORD`) are read from the environment only and are
//! never written back to disk. An SMTP host takes precedence over an HTTP
//! endpoint.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::demo::DemoNotifier;
use crate::adapters::http_notifier::{HttpNotifier, DEFAULT_REQUEST_TIMEOUT};
use crate::adapters::smtp_notifier::{SmtpNotifier, DEFAULT_SMTP_PORT};
use crate::domain::result::{Error, Result as CoreResult};
use crate::ports::Notifier;
use crate::services::SweepOptions;

pub const ENV_GRACE_HOURS: &str = "SISYPHUS_GRACE_HOURS";
pub const ENV_DISCLOSURE_ENABLED: &str = "SISYPHUS_DISCLOSURE_ENABLED";
pub const ENV_DEMO_MODE: &str = "SISYPHUS_DEMO_MODE";
pub const ENV_EMAIL: &str = "SISYPHUS_EMAIL";
pub const ENV_NOTIFIER_ENDPOINT: &str = "SISYPHUS_NOTIFIER_ENDPOINT";
pub const ENV_NOTIFIER_API_KEY: &str = "SISYPHUS_NOTIFIER_API_KEY";
pub const ENV_SMTP_HOST: &str = "SISYPHUS_SMTP_HOST";
pub const ENV_EMAIL_PASSWORD: &str = "SISYPHUS_EMAIL_PASSWORD";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    app: AppSettings,
    #[serde(default)]
    sweep: SweepSettings,
    #[serde(default)]
    notifier: NotifierSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSettings {
    #[serde(default)]
    demo_mode: bool,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Sweep scheduling and behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SweepSettings {
    pub grace_hours: u32,
    pub timeout_secs: u64,
    pub abandon_in_flight: bool,
    pub disclosure_enabled: bool,
    pub max_concurrent_accounts: usize,
    /// Interval between sweeps for `sisyphus run`
    pub interval_secs: u64,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            grace_hours: 24,
            timeout_secs: 300,
            abandon_in_flight: false,
            disclosure_enabled: true,
            max_concurrent_accounts: crate::services::sweep::DEFAULT_MAX_CONCURRENT_ACCOUNTS,
            interval_secs: 3600,
        }
    }
}

impl SweepSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Outbound mail transport: an HTTP endpoint or an SMTP relay
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotifierSettings {
    pub endpoint: Option<String>,
    pub from: String,
    pub request_timeout_secs: u64,
    #[serde(skip)]
    pub api_key: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    /// Defaults to `from`
    pub smtp_username: Option<String>,
    #[serde(skip)]
    pub smtp_password: Option<String>,
}

impl NotifierSettings {
    /// Whether any real transport is configured
    pub fn has_transport(&self) -> bool {
        self.endpoint.is_some() || self.smtp_host.is_some()
    }
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            from: "sisyphus@example.com".to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            api_key: None,
            smtp_host: None,
            smtp_port: DEFAULT_SMTP_PORT,
            smtp_username: None,
            smtp_password: None,
        }
    }
}

impl std::fmt::Debug for NotifierSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierSettings")
            .field("endpoint", &self.endpoint)
            .field("from", &self.from)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &self.smtp_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Sisyphus configuration (simplified view of settings)
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub demo_mode: bool,
    pub sweep: SweepSettings,
    pub notifier: NotifierSettings,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "1" | "yes" | "TRUE" | "YES" => Some(true),
        "false" | "0" | "no" | "FALSE" | "NO" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load config from the data directory and apply environment overrides
    pub fn load(sisyphus_dir: &Path) -> Result<Self> {
        let mut config = Self::load_file(sisyphus_dir)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load settings.json only, ignoring the environment
    pub fn load_file(sisyphus_dir: &Path) -> Result<Self> {
        let settings_path = sisyphus_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content)
                .with_context(|| format!("invalid {}", settings_path.display()))?
        } else {
            SettingsFile::default()
        };

        Ok(Self {
            demo_mode: raw.app.demo_mode,
            sweep: raw.sweep.clone(),
            notifier: raw.notifier.clone(),
            _raw_settings: raw,
        })
    }

    /// Apply environment overrides using `lookup` to read variables
    ///
    /// Unparseable values are ignored and the file setting is kept.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(demo) = lookup(ENV_DEMO_MODE).as_deref().and_then(parse_bool) {
            self.demo_mode = demo;
        }
        if let Some(hours) = lookup(ENV_GRACE_HOURS).and_then(|v| v.trim().parse().ok()) {
            self.sweep.grace_hours = hours;
        }
        if let Some(enabled) = lookup(ENV_DISCLOSURE_ENABLED).as_deref().and_then(parse_bool) {
            self.sweep.disclosure_enabled = enabled;
        }
        if let Some(from) = lookup(ENV_EMAIL).filter(|v| !v.trim().is_empty()) {
            self.notifier.from = from;
        }
        if let Some(endpoint) = lookup(ENV_NOTIFIER_ENDPOINT).filter(|v| !v.trim().is_empty()) {
            self.notifier.endpoint = Some(endpoint);
        }
        if let Some(key) = lookup(ENV_NOTIFIER_API_KEY).filter(|v| !v.trim().is_empty()) {
            self.notifier.api_key = Some(key);
        }
        if let Some(host) = lookup(ENV_SMTP_HOST).filter(|v| !v.trim().is_empty()) {
            self.notifier.smtp_host = Some(host);
        }
        if let Some(password) = lookup(ENV_EMAIL_PASSWORD).filter(|v| !v.is_empty()) {
            self.notifier.smtp_password = Some(password);
        }
    }

    /// Save config to the data directory
    ///
    /// Preserves settings this crate doesn't manage. The API key is never saved.
    pub fn save(&self, sisyphus_dir: &Path) -> Result<()> {
        let settings_path = sisyphus_dir.join("settings.json");

        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content)
                .with_context(|| format!("invalid {}", settings_path.display()))?
        } else {
            SettingsFile::default()
        };

        settings.app.demo_mode = self.demo_mode;
        settings.sweep = self.sweep.clone();
        settings.notifier = self.notifier.clone();

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }

    pub fn enable_demo_mode(&mut self) {
        self.demo_mode = true;
    }

    pub fn disable_demo_mode(&mut self) {
        self.demo_mode = false;
    }

    /// Check the settings a sweep depends on
    pub fn validate(&self) -> CoreResult<()> {
        if self.sweep.timeout_secs == 0 {
            return Err(Error::config("sweep timeout must be greater than zero"));
        }
        if self.sweep.max_concurrent_accounts == 0 {
            return Err(Error::config("maxConcurrentAccounts must be greater than zero"));
        }
        if self.sweep.interval_secs == 0 {
            return Err(Error::config("sweep interval must be greater than zero"));
        }
        if !self.demo_mode && self.sweep.disclosure_enabled && !self.notifier.has_transport() {
            return Err(Error::config(format!(
                "disclosure is enabled but no notifier is configured (set {} or {})",
                ENV_NOTIFIER_ENDPOINT, ENV_SMTP_HOST
            )));
        }
        Ok(())
    }

    pub fn sweep_options(&self) -> SweepOptions {
        SweepOptions {
            disclosure_enabled: self.sweep.disclosure_enabled,
            abandon_in_flight: self.sweep.abandon_in_flight,
            max_concurrent_accounts: self.sweep.max_concurrent_accounts,
        }
    }

    /// Build the notifier a sweep should deliver through
    ///
    /// Demo mode, and dry runs with no transport, get an in-process notifier
    /// that records messages instead of sending them.
    pub fn build_notifier(&self) -> CoreResult<Arc<dyn Notifier>> {
        if self.demo_mode {
            return Ok(Arc::new(DemoNotifier::new()));
        }
        let request_timeout = Duration::from_secs(self.notifier.request_timeout_secs);
        if let Some(host) = &self.notifier.smtp_host {
            return Ok(Arc::new(SmtpNotifier::new(
                host,
                self.notifier.smtp_port,
                &self.notifier.from,
                self.notifier.smtp_username.clone(),
                self.notifier.smtp_password.clone(),
                request_timeout,
            )?));
        }
        match &self.notifier.endpoint {
            Some(endpoint) => Ok(Arc::new(HttpNotifier::new(
                endpoint,
                self.notifier.api_key.clone(),
                self.notifier.from.clone(),
                request_timeout,
            )?)),
            None if !self.sweep.disclosure_enabled => Ok(Arc::new(DemoNotifier::new())),
            None => Err(Error::config("no notifier endpoint configured")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_no_settings_file() {
        let dir = tempdir().unwrap();
        let config = Config::load_file(dir.path()).unwrap();

        assert!(!config.demo_mode);
        assert_eq!(config.sweep, SweepSettings::default());
        assert_eq!(config.sweep.grace_hours, 24);
        assert!(config.notifier.endpoint.is_none());
    }

    #[test]
    fn test_partial_settings_are_defaulted() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"sweep": {"graceHours": 48}, "notifier": {"endpoint": "https://mail.example.com/send"}}"#,
        )
        .unwrap();

        let config = Config::load_file(dir.path()).unwrap();
        assert_eq!(config.sweep.grace_hours, 48);
        assert_eq!(config.sweep.timeout_secs, 300);
        assert_eq!(
            config.notifier.endpoint.as_deref(),
            Some("https://mail.example.com/send")
        );
        assert_eq!(config.notifier.request_timeout_secs, 30);
    }

    #[test]
    fn test_malformed_settings_are_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let original = r#"{"sweep": {"graceHours": "72", "disclosureEnabled": false}}"#;
        std::fs::write(&path, original).unwrap();

        let err = Config::load_file(dir.path()).unwrap_err();
        assert!(err.to_string().contains("settings.json"));

        // Saving must not replace the broken file with defaults
        assert!(Config::default().save(dir.path()).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_file(dir.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let dir = tempdir().unwrap();
        let mut config = Config::load_file(dir.path()).unwrap();
        config.apply_env(env(&[
            (ENV_GRACE_HOURS, "12"),
            (ENV_DISCLOSURE_ENABLED, "no"),
            (ENV_EMAIL, "mailer@example.com"),
            (ENV_NOTIFIER_API_KEY, "k-123"),
        ]));

        assert_eq!(config.sweep.grace_hours, 12);
        assert!(!config.sweep.disclosure_enabled);
        assert_eq!(config.notifier.from, "mailer@example.com");
        assert_eq!(config.notifier.api_key.as_deref(), Some("k-123"));
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let mut config = Config::default();
        config.apply_env(env(&[(ENV_GRACE_HOURS, "soon"), (ENV_DISCLOSURE_ENABLED, "maybe")]));

        assert_eq!(config.sweep.grace_hours, 24);
        assert!(config.sweep.disclosure_enabled);
    }

    #[test]
    fn test_save_preserves_unmanaged_settings_and_drops_api_key() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"app": {"theme": "dark"}}"#,
        )
        .unwrap();

        let mut config = Config::load_file(dir.path()).unwrap();
        config.enable_demo_mode();
        config.notifier.api_key = Some("k-secret".to_string());
        config.save(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join("settings.json")).unwrap();
        assert!(content.contains("\"theme\": \"dark\""));
        assert!(content.contains("\"demoMode\": true"));
        assert!(!content.contains("k-secret"));

        let reloaded = Config::load_file(dir.path()).unwrap();
        assert!(reloaded.demo_mode);
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.notifier.endpoint = Some("https://mail.example.com/send".to_string());
        assert!(config.validate().is_ok());

        config.sweep.max_concurrent_accounts = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.sweep.max_concurrent_accounts = 4;
        config.sweep.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_demo_mode_and_dry_run_need_no_endpoint() {
        let mut config = Config::default();
        config.enable_demo_mode();
        assert!(config.validate().is_ok());
        assert_eq!(config.build_notifier().unwrap().name(), "demo");

        let mut config = Config::default();
        config.sweep.disclosure_enabled = false;
        assert!(config.validate().is_ok());
        assert_eq!(config.build_notifier().unwrap().name(), "demo");
    }

    // The SMTP connection pool is created on the tokio runtime
    #[tokio::test]
    async fn test_smtp_transport_from_env() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"notifier": {"from": "sisyphus@example.com", "smtpPort": 2525}}"#,
        )
        .unwrap();

        let mut config = Config::load_file(dir.path()).unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.apply_env(env(&[
            (ENV_SMTP_HOST, "smtp.example.com"),
            (ENV_EMAIL_PASSWORD, "hunter2"),
        ]));
        assert!(config.validate().is_ok());
        assert_eq!(config.notifier.smtp_port, 2525);
        assert_eq!(config.notifier.smtp_password.as_deref(), Some("hunter2"));
        assert_eq!(config.build_notifier().unwrap().name(), "smtp");
        assert!(!format!("{:?}", config).contains("hunter2"));

        config.save(dir.path()).unwrap();
        let content = std::fs::read_to_string(dir.path().join("settings.json")).unwrap();
        assert!(content.contains("smtp.example.com"));
        assert!(!content.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_smtp_host_takes_precedence_over_endpoint() {
        let mut config = Config::default();
        config.notifier.endpoint = Some("https://mail.example.com/send".to_string());
        assert_eq!(config.build_notifier().unwrap().name(), "http");

        config.notifier.smtp_host = Some("smtp.example.com".to_string());
        assert_eq!(config.build_notifier().unwrap().name(), "smtp");
    }

    #[test]
    fn test_api_key_is_redacted_in_debug() {
        let mut config = Config::default();
        config.notifier.api_key = Some("k-secret".to_string());
        assert!(!format!("{:?}", config).contains("k-secret"));
    }

    #[test]
    fn test_sweep_options() {
        let mut config = Config::default();
        config.sweep.abandon_in_flight = true;
        config.sweep.max_concurrent_accounts = 3;

        let options = config.sweep_options();
        assert!(options.abandon_in_flight);
        assert!(options.disclosure_enabled);
        assert_eq!(options.max_concurrent_accounts, 3);
    }
}
