//! Configuration for the PostgreSQL session store

use once_cell::sync::Lazy;
use pgsession_core::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// PostgreSQL truncates identifiers longer than this (NAMEDATALEN - 1)
const MAX_IDENTIFIER_LEN: usize = 63;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Name of the table sessions are stored in, optionally schema-qualified
/// (`sessions` or `auth.sessions`).
///
/// The name is interpolated into SQL text, so only plain unquoted identifiers
/// are accepted. It is a deployment-time value, never user input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(String);

impl TableName {
    /// Validate and wrap a table name
    ///
    /// # Errors
    /// - `Error::Config` if any part is empty, too long or not a plain identifier
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let parts: Vec<&str> = name.split('.').collect();

        if parts.len() > 2 {
            return Err(Error::Config(format!(
                "Invalid table name '{}': at most one schema qualifier is allowed",
                name
            )));
        }

        for part in &parts {
            if part.len() > MAX_IDENTIFIER_LEN {
                return Err(Error::Config(format!(
                    "Invalid table name '{}': '{}' exceeds {} bytes",
                    name, part, MAX_IDENTIFIER_LEN
                )));
            }
            if !IDENTIFIER.is_match(part) {
                return Err(Error::Config(format!(
                    "Invalid table name '{}': '{}' is not a plain identifier",
                    name, part
                )));
            }
        }

        Ok(Self(name))
    }

    /// The name as written in SQL statements
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The unqualified relation name
    pub fn relation(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// Name PostgreSQL gives the table's primary-key constraint
    pub fn primary_key_constraint(&self) -> String {
        derived_name(self.relation(), "_pkey")
    }

    /// Name of the index on `expires_at`
    pub fn expires_index(&self) -> String {
        derived_name(self.relation(), "_expires_at_idx")
    }
}

/// Append a suffix the way PostgreSQL does for implicit names: unquoted
/// identifiers are folded to lower case and the base is truncated so the
/// result fits in an identifier.
fn derived_name(base: &str, suffix: &str) -> String {
    let base = base.to_ascii_lowercase();
    let keep = MAX_IDENTIFIER_LEN.saturating_sub(suffix.len()).min(base.len());
    format!("{}{}", &base[..keep], suffix)
}

/// Whole milliseconds, rounded up so a non-zero duration never becomes zero
fn millis_ceil(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

impl Default for TableName {
    fn default() -> Self {
        Self("sessions".to_string())
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TableName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for TableName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TableName> for String {
    fn from(value: TableName) -> Self {
        value.0
    }
}

/// Configuration for the PostgreSQL session store
///
/// # Example
/// ```
/// use pgsession_postgres::StoreConfig;
/// use std::time::Duration;
///
/// let config = StoreConfig::default()
///     .with_table_name("auth_sessions")?
///     .with_sweep_interval(Duration::from_secs(60));
/// # Ok::<(), pgsession_core::Error>(())
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Table holding the sessions
    #[serde(default)]
    pub table_name: TableName,

    /// Run the expiration sweep every N milliseconds (0 = disabled)
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Fail store operations that take longer than N milliseconds (None = no limit)
    #[serde(default)]
    pub operation_timeout_ms: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_name: TableName::default(),
            sweep_interval_ms: default_sweep_interval_ms(),
            operation_timeout_ms: None,
        }
    }
}

fn default_sweep_interval_ms() -> u64 {
    5 * 60 * 1000 // Sweep every 5 minutes by default
}

impl StoreConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the table name
    ///
    /// # Errors
    /// - `Error::Config` if the name is not a valid identifier
    pub fn with_table_name(mut self, name: impl Into<String>) -> Result<Self> {
        self.table_name = TableName::new(name)?;
        Ok(self)
    }

    /// Set the sweep interval; `Duration::ZERO` disables the sweeper
    ///
    /// Sub-millisecond intervals are rounded up to 1 ms.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_ms = millis_ceil(interval);
        self
    }

    /// Set a per-operation timeout
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout_ms = Some(millis_ceil(timeout));
        self
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.operation_timeout_ms == Some(0) {
            return Err(Error::Config(
                "operation_timeout_ms must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.table_name.as_str(), "sessions");
        assert_eq!(config.sweep_interval(), Duration::from_secs(300));
        assert_eq!(config.operation_timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = StoreConfig::new()
            .with_table_name("auth.sessions")
            .unwrap()
            .with_sweep_interval(Duration::from_millis(10))
            .with_operation_timeout(Duration::from_secs(3));

        assert_eq!(config.table_name.as_str(), "auth.sessions");
        assert_eq!(config.sweep_interval(), Duration::from_millis(10));
        assert_eq!(config.operation_timeout(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_zero_interval_disables_sweeper() {
        let config = StoreConfig::new().with_sweep_interval(Duration::ZERO);
        assert_eq!(config.sweep_interval(), Duration::ZERO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = StoreConfig::new().with_operation_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_valid_table_names() {
        for name in ["sessions", "_sessions", "Sessions2", "auth.sessions", "a_b.c_d"] {
            assert!(TableName::new(name).is_ok(), "{} should be valid", name);
        }
    }

    #[test]
    fn test_invalid_table_names() {
        for name in [
            "",
            "1sessions",
            "sessions;drop table users",
            "my-sessions",
            "\"sessions\"",
            "a.b.c",
            ".sessions",
            "sessions.",
            "sessions ",
        ] {
            assert!(
                matches!(TableName::new(name), Err(Error::Config(_))),
                "{:?} should be rejected",
                name
            );
        }

        let too_long = "s".repeat(64);
        assert!(TableName::new(too_long).is_err());
    }

    #[test]
    fn test_derived_names() {
        let table = TableName::new("auth.sessions").unwrap();
        assert_eq!(table.relation(), "sessions");
        assert_eq!(table.primary_key_constraint(), "sessions_pkey");
        assert_eq!(table.expires_index(), "sessions_expires_at_idx");
    }

    #[test]
    fn test_derived_names_are_truncated() {
        let table = TableName::new("s".repeat(63)).unwrap();
        let pkey = table.primary_key_constraint();
        assert_eq!(pkey.len(), 63);
        assert!(pkey.ends_with("_pkey"));

        let index = table.expires_index();
        assert_eq!(index.len(), 63);
        assert!(index.ends_with("_expires_at_idx"));
    }

    #[test]
    fn test_derived_names_are_lowercase() {
        let table = TableName::new("Auth.Sessions2").unwrap();
        assert_eq!(table.as_str(), "Auth.Sessions2");
        assert_eq!(table.primary_key_constraint(), "sessions2_pkey");
        assert_eq!(table.expires_index(), "sessions2_expires_at_idx");
    }

    #[test]
    fn test_sub_millisecond_durations_round_up() {
        let config = StoreConfig::new()
            .with_sweep_interval(Duration::from_micros(500))
            .with_operation_timeout(Duration::from_nanos(1));

        assert_eq!(config.sweep_interval(), Duration::from_millis(1));
        assert_eq!(config.operation_timeout(), Some(Duration::from_millis(1)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_durations_keep_whole_milliseconds() {
        let config = StoreConfig::new()
            .with_sweep_interval(Duration::from_millis(1500))
            .with_operation_timeout(Duration::from_micros(2001));

        assert_eq!(config.sweep_interval(), Duration::from_millis(1500));
        assert_eq!(config.operation_timeout(), Some(Duration::from_millis(3)));
    }

    #[test]
    fn test_config_serialization() {
        let config: StoreConfig = serde_json::from_value(serde_json::json!({
            "table_name": "user_sessions",
            "sweep_interval_ms": 0,
        }))
        .unwrap();

        assert_eq!(config.table_name.as_str(), "user_sessions");
        assert_eq!(config.sweep_interval(), Duration::ZERO);

        let serialized = serde_json::to_value(&config).unwrap();
        assert_eq!(serialized["table_name"], "user_sessions");
    }

    #[test]
    fn test_config_rejects_invalid_table_name() {
        let result: std::result::Result<StoreConfig, _> =
            serde_json::from_value(serde_json::json!({ "table_name": "x; DROP TABLE y" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_defaults_when_fields_missing() {
        let config: StoreConfig = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(config.table_name.as_str(), "sessions");
        assert_eq!(config.sweep_interval_ms, 300_000);
    }
}
