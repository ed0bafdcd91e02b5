//! FilingWatch configuration system.
//!
//! A TOML file (default `~/.filingwatch/config.toml`) where every field has a
//! default, followed by environment overrides for secrets and deployment
//! knobs. Missing credentials are not a load error: [`FilingWatchConfig::validate`]
//! reports them as [`ConfigIssue`]s for logs and the health probe.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{FilingWatchError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FilingWatchConfig {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl FilingWatchConfig {
    /// Load config from the default path, falling back to defaults.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FilingWatchError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| FilingWatchError::Config(format!("Failed to parse config: {e}")))
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the FilingWatch home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".filingwatch")
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("EMAIL_PROVIDER") {
            match v.trim().to_lowercase().as_str() {
                "smtp" => self.transport.provider = TransportProvider::Smtp,
                "brevo" => self.transport.provider = TransportProvider::Brevo,
                other => tracing::warn!("⚠️ Ignoring unknown EMAIL_PROVIDER '{other}'"),
            }
        }
        if let Some(v) = get("EMAIL_USER") {
            self.transport.username = v;
        }
        if let Some(v) = get("EMAIL_PASS") {
            self.transport.password = v;
        }
        if let Some(v) = get("EMAIL_FROM") {
            self.transport.sender = v;
        }
        if let Some(v) = get("EMAIL_FROM_NAME") {
            self.transport.sender_name = v;
        }
        if let Some(v) = get("SMTP_HOST") {
            self.transport.smtp_host = v;
        }
        if let Some(v) = get("SMTP_PORT") {
            match v.trim().parse() {
                Ok(port) => self.transport.smtp_port = port,
                Err(_) => tracing::warn!("⚠️ Ignoring invalid SMTP_PORT '{v}'"),
            }
        }
        if let Some(v) = get("BREVO_API_KEY") {
            self.transport.api_key = v;
        }
        if let Some(v) = get("EMAIL_TO") {
            self.dispatch.recipients = v;
        }
        if let Some(v) = get("DATABASE_PATH") {
            self.store.path = v;
        }
        if let Some(v) = get("PORT") {
            match v.trim().parse() {
                Ok(port) => self.gateway.port = port,
                Err(_) => tracing::warn!("⚠️ Ignoring invalid PORT '{v}'"),
            }
        }
        if let Some(v) = get("ADMIN_TOKEN") {
            self.gateway.admin_token = Some(v);
        }
    }

    /// Check for configuration that would make every dispatch cycle a no-op.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let t = &self.transport;

        match t.provider {
            TransportProvider::Smtp => {
                if t.smtp_host.trim().is_empty() {
                    issues.push(ConfigIssue::new("transport.smtp_host", "SMTP host is not set"));
                }
                if t.username.is_empty() || t.password.is_empty() {
                    issues.push(ConfigIssue::new(
                        "transport.username",
                        "SMTP credentials missing (EMAIL_USER / EMAIL_PASS)",
                    ));
                }
            }
            TransportProvider::Brevo => {
                if t.api_key.is_empty() {
                    issues.push(ConfigIssue::new(
                        "transport.api_key",
                        "Brevo API key missing (BREVO_API_KEY)",
                    ));
                }
            }
        }

        if t.sender_address().is_none() {
            issues.push(ConfigIssue::new(
                "transport.sender",
                "sender address missing (EMAIL_FROM)",
            ));
        }

        if self.dispatch.recipient_list().is_empty() {
            issues.push(ConfigIssue::new(
                "dispatch.recipients",
                "no recipients configured (EMAIL_TO)",
            ));
        }

        if let Err(e) = self.log.utc_offset() {
            issues.push(ConfigIssue::new("log.utc_offset", e.to_string()));
        }

        issues
    }
}

/// A configuration problem surfaced to operators instead of crashing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigIssue {
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Which delivery provider backs the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportProvider {
    #[default]
    Smtp,
    Brevo,
}

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SmtpTls {
    #[default]
    Starttls,
    /// TLS from the first byte (port 465).
    Implicit,
    /// Plain connection, for local relays only.
    None,
}

/// Delivery provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub provider: TransportProvider,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_tls: SmtpTls,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// From address. Defaults to `username` for SMTP relays.
    #[serde(default)]
    pub sender: String,
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
    #[serde(default = "default_transport_timeout")]
    pub timeout_secs: u64,
}

fn default_smtp_host() -> String { "smtp.gmail.com".into() }
fn default_smtp_port() -> u16 { 587 }
fn default_api_base_url() -> String { "https://api.brevo.com".into() }
fn default_sender_name() -> String { "Filing Alerts".into() }
fn default_transport_timeout() -> u64 { 30 }

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            provider: TransportProvider::default(),
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            smtp_tls: SmtpTls::default(),
            username: String::new(),
            password: String::new(),
            api_key: String::new(),
            api_base_url: default_api_base_url(),
            sender: String::new(),
            sender_name: default_sender_name(),
            timeout_secs: default_transport_timeout(),
        }
    }
}

impl TransportConfig {
    /// Effective from address: `sender`, else the SMTP login.
    pub fn sender_address(&self) -> Option<&str> {
        let sender = self.sender.trim();
        if !sender.is_empty() {
            return Some(sender);
        }
        let user = self.username.trim();
        if self.provider == TransportProvider::Smtp && user.contains('@') {
            return Some(user);
        }
        None
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Dispatch batch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Comma-separated recipient addresses.
    #[serde(default)]
    pub recipients: String,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_message_delay_ms")]
    pub message_delay_ms: u64,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
}

fn default_interval_secs() -> u64 { 300 }
fn default_message_delay_ms() -> u64 { 1000 }
fn default_settle_delay_ms() -> u64 { 2000 }
fn default_subject_prefix() -> String { "BSE Announcement".into() }

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            recipients: String::new(),
            interval_secs: default_interval_secs(),
            message_delay_ms: default_message_delay_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            subject_prefix: default_subject_prefix(),
        }
    }
}

impl DispatchConfig {
    pub fn recipient_list(&self) -> Vec<String> {
        parse_recipients(&self.recipients)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn message_delay(&self) -> Duration {
        Duration::from_millis(self.message_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Split a comma-separated address list: entries trimmed, empties dropped.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// External scraper subprocess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    #[serde(default = "default_scraper_program")]
    pub program: String,
    #[serde(default = "default_scraper_args")]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default = "default_scraper_timeout")]
    pub timeout_secs: u64,
}

fn default_scraper_program() -> String { "python3".into() }
fn default_scraper_args() -> Vec<String> { vec!["finalscraper.py".into()] }
fn default_scraper_timeout() -> u64 { 900 }

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            program: default_scraper_program(),
            args: default_scraper_args(),
            working_dir: None,
            timeout_secs: default_scraper_timeout(),
        }
    }
}

impl ScraperConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn resolved_working_dir(&self) -> Option<PathBuf> {
        self.working_dir
            .as_deref()
            .map(|d| PathBuf::from(shellexpand::tilde(d).to_string()))
    }
}

/// Filing store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String { "~/.filingwatch/filings.db".into() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

impl StoreConfig {
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    /// When set, `POST /api/admin/trigger` requires a matching `X-Admin-Token`.
    #[serde(default)]
    pub admin_token: Option<String>,
}

fn default_port() -> u16 { 5000 }
fn default_host() -> String { "0.0.0.0".into() }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            admin_token: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Offset used for log timestamps and mail subject times, e.g. `+05:30`.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

fn default_utc_offset() -> String { "+05:30".into() }

impl Default for LogConfig {
    fn default() -> Self {
        Self { utc_offset: default_utc_offset() }
    }
}

impl LogConfig {
    pub fn utc_offset(&self) -> Result<FixedOffset> {
        parse_utc_offset(&self.utc_offset)
    }
}

/// Parse `UTC`, `Z`, or a `+HH:MM` / `-HH:MM` offset.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("utc") || raw.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0)
            .ok_or_else(|| FilingWatchError::Config("invalid zero offset".into()));
    }
    raw.parse::<FixedOffset>()
        .map_err(|e| FilingWatchError::Config(format!("invalid utc offset '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let cfg = FilingWatchConfig::default();
        assert_eq!(cfg.dispatch.interval(), Duration::from_secs(300));
        assert_eq!(cfg.dispatch.message_delay(), Duration::from_secs(1));
        assert_eq!(cfg.dispatch.settle_delay(), Duration::from_secs(2));
        assert_eq!(cfg.transport.provider, TransportProvider::Smtp);
    }

    #[test]
    fn test_parse_recipients() {
        assert_eq!(
            parse_recipients(" a@x.com, ,b@y.com ,, "),
            vec!["a@x.com".to_string(), "b@y.com".to_string()]
        );
        assert!(parse_recipients(" , ,").is_empty());
        assert!(parse_recipients("").is_empty());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg = FilingWatchConfig::from_toml(
            r#"
            [dispatch]
            recipients = "ops@example.com"
            interval_secs = 60

            [transport]
            provider = "brevo"
            api_key = "xkeysib-123"
            sender = "alerts@example.com"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.dispatch.interval_secs, 60);
        assert_eq!(cfg.dispatch.message_delay_ms, 1000);
        assert_eq!(cfg.transport.provider, TransportProvider::Brevo);
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = FilingWatchConfig::from_toml("[dispatch\n").unwrap_err();
        assert!(matches!(err, FilingWatchError::Config(_)));
    }

    #[test]
    fn test_validate_reports_missing_values() {
        let cfg = FilingWatchConfig::default();
        let fields: Vec<String> = cfg.validate().into_iter().map(|i| i.field).collect();
        assert!(fields.contains(&"transport.username".to_string()));
        assert!(fields.contains(&"transport.sender".to_string()));
        assert!(fields.contains(&"dispatch.recipients".to_string()));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("EMAIL_USER", "bot@gmail.com"),
            ("EMAIL_PASS", "app-password"),
            ("EMAIL_TO", "a@x.com, b@y.com"),
            ("SMTP_PORT", "465"),
            ("PORT", "not-a-port"),
            ("ADMIN_TOKEN", ""),
        ]);
        let mut cfg = FilingWatchConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.transport.username, "bot@gmail.com");
        assert_eq!(cfg.transport.smtp_port, 465);
        assert_eq!(cfg.gateway.port, 5000);
        assert_eq!(cfg.gateway.admin_token, None);
        assert_eq!(cfg.dispatch.recipient_list().len(), 2);
        // SMTP login doubles as the sender.
        assert_eq!(cfg.transport.sender_address(), Some("bot@gmail.com"));
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(parse_utc_offset("+05:30").unwrap().local_minus_utc(), 19800);
        assert_eq!(parse_utc_offset("UTC").unwrap().local_minus_utc(), 0);
        assert!(parse_utc_offset("Asia/Kolkata").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[gateway]\nport = 8080\n").unwrap();
        let cfg = FilingWatchConfig::load_from(&path).unwrap();
        assert_eq!(cfg.gateway.port, 8080);
    }
}
