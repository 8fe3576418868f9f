//! Command-line interface definitions.
//!
//! Flags can also come from environment variables. Anything given here
//! overrides the YAML config file.

use crate::aggregate::ExecutionMode;
use crate::config::Settings;
use crate::models::Field;
use clap::Parser;

/// Look up IP addresses across several public intelligence sites.
///
/// # Examples
///
/// ```sh
/// # One address, results in the current directory
/// ip_sources 8.8.8.8
///
/// # Several addresses, one at a time per source, custom output dir
/// ip_sources -o ./out --sequential 8.8.8.8 2001:4860:4860::8888
///
/// # Prefer db-ip.com when merging and compare ASNs too
/// ip_sources --priority db-ip.com,ipinfo.io --compare country,city,asn 1.1.1.1
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// IPv4 or IPv6 addresses to look up
    #[arg(required = true)]
    pub addresses: Vec<String>,

    /// Directory the `ip_data_*.json` files are written to
    #[arg(short, long, env = "IP_SOURCES_OUTPUT_DIR", default_value = ".")]
    pub output_dir: String,

    /// Optional path to a YAML config file
    #[arg(short, long, env = "IP_SOURCES_CONFIG")]
    pub config: Option<String>,

    /// Query sources one after another instead of concurrently
    #[arg(long)]
    pub sequential: bool,

    /// Seconds to wait for each page-ready condition
    #[arg(long)]
    pub wait_timeout_secs: Option<u64>,

    /// Seconds allowed for page navigation
    #[arg(long)]
    pub navigation_timeout_secs: Option<u64>,

    /// Merge priority as a comma-separated list of source names
    #[arg(long, value_delimiter = ',')]
    pub priority: Vec<String>,

    /// Fields to compare across sources, comma-separated
    #[arg(long, value_delimiter = ',')]
    pub compare: Vec<Field>,

    /// User-Agent header sent to every source
    #[arg(long, env = "IP_SOURCES_USER_AGENT")]
    pub user_agent: Option<String>,
}

impl Cli {
    /// Overlay the flags that were given onto `settings`.
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if self.sequential {
            settings.mode = ExecutionMode::Sequential;
        }
        if let Some(secs) = self.wait_timeout_secs {
            settings.wait_timeout_secs = secs;
        }
        if let Some(secs) = self.navigation_timeout_secs {
            settings.navigation_timeout_secs = secs;
        }
        if !self.priority.is_empty() {
            settings.priority = self.priority.iter().map(|s| s.trim().to_string()).collect();
        }
        if !self.compare.is_empty() {
            settings.compare_fields = self.compare.clone();
        }
        if let Some(ua) = &self.user_agent {
            settings.user_agent = ua.clone();
        }
        settings
    }
}
