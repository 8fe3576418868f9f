//! Run settings loaded from an optional YAML file.
//!
//! Every key is optional; anything missing takes its default. Command-line
//! flags are applied on top afterwards (see [`crate::cli::Cli::apply`]).
//!
//! ```yaml
//! mode: sequential
//! wait_timeout_secs: 15
//! navigation_timeout_secs: 45
//! priority: [ipinfo.io, db-ip.com]
//! compare_fields: [country, city, asn]
//! user_agent: "Mozilla/5.0 (X11; Linux x86_64)"
//! ```

use crate::aggregate::ExecutionMode;
use crate::error::ConfigError;
use crate::fetcher::http::DEFAULT_USER_AGENT;
use crate::models::Field;
use crate::scrapers::{self, FetchTimeouts};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub mode: ExecutionMode,
    pub wait_timeout_secs: u64,
    pub navigation_timeout_secs: u64,
    /// Source names, highest merge priority first.
    pub priority: Vec<String>,
    pub compare_fields: Vec<Field>,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        let timeouts = FetchTimeouts::default();
        Self {
            mode: ExecutionMode::default(),
            wait_timeout_secs: timeouts.wait.as_secs(),
            navigation_timeout_secs: timeouts.navigation.as_secs(),
            priority: scrapers::ALL.iter().map(|s| s.name.to_string()).collect(),
            compare_fields: Field::DEFAULT_COMPARISON.to_vec(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Settings {
    pub fn timeouts(&self) -> FetchTimeouts {
        FetchTimeouts {
            navigation: Duration::from_secs(self.navigation_timeout_secs),
            wait: Duration::from_secs(self.wait_timeout_secs),
        }
    }

    /// Priority names that match no built-in source. They are harmless but
    /// usually a typo.
    pub fn unknown_sources(&self) -> Vec<&str> {
        self.priority
            .iter()
            .map(String::as_str)
            .filter(|name| scrapers::by_name(name).is_none())
            .collect()
    }
}

/// Parse settings from YAML text.
pub fn parse(yaml: &str, path: &str) -> Result<Settings, ConfigError> {
    // An empty file is a valid "all defaults" config.
    if yaml.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })
}

#[instrument(level = "info", skip_all, fields(%path))]
pub fn load(path: &str) -> Result<Settings, ConfigError> {
    let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    let settings = parse(&yaml, path)?;
    info!(mode = ?settings.mode, "Loaded configuration");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.mode, ExecutionMode::Parallel);
        assert_eq!(settings.timeouts(), FetchTimeouts::default());
        assert_eq!(
            settings.priority,
            ["ipapi.com", "ipinfo.io", "db-ip.com", "whatismyipaddress.com"]
        );
        assert_eq!(settings.compare_fields, Field::DEFAULT_COMPARISON);
        assert!(settings.unknown_sources().is_empty());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings = parse("mode: sequential\nwait_timeout_secs: 3\n", "test.yaml").unwrap();
        assert_eq!(settings.mode, ExecutionMode::Sequential);
        assert_eq!(settings.timeouts().wait, Duration::from_secs(3));
        assert_eq!(settings.timeouts().navigation, Duration::from_secs(30));
        assert_eq!(settings.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_lists() {
        let yaml = "priority: [ipinfo.io, nowhere.example]\ncompare_fields: [asn, is_anycast]\n";
        let settings = parse(yaml, "test.yaml").unwrap();
        assert_eq!(settings.compare_fields, [Field::Asn, Field::IsAnycast]);
        assert_eq!(settings.unknown_sources(), ["nowhere.example"]);
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(parse("  \n", "empty.yaml").unwrap(), Settings::default());
    }

    #[test]
    fn test_bad_field_is_parse_error() {
        let err = parse("compare_fields: [altitude]", "bad.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "navigation_timeout_secs: 5").unwrap();
        let settings = load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(settings.timeouts().navigation, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = load("/nonexistent/ip_sources.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
