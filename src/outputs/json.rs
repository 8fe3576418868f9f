//! JSON output for aggregation runs.
//!
//! One file per queried address:
//!
//! ```text
//! output_dir/
//! ├── ip_data_8_8_8_8.json
//! └── ip_data_2001_4860_4860__8888.json
//! ```
//!
//! Each file holds the generation timestamp, the unified payload (every
//! source plus the combined record), the consistency payload and every
//! source's raw extracted map.

use crate::aggregate::AggregateOutcome;
use crate::consistency::ConsistencyReport;
use crate::models::{RawFields, UnifiedReport};
use crate::utils::output_path;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, instrument};

#[derive(Debug, Serialize)]
pub struct IpDataFile<'a> {
    pub generated_at: String,
    pub unified: &'a UnifiedReport,
    pub comparison: &'a ConsistencyReport,
    pub raw: &'a BTreeMap<String, RawFields>,
}

impl<'a> IpDataFile<'a> {
    pub fn new(outcome: &'a AggregateOutcome) -> Self {
        Self {
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            unified: &outcome.unified,
            comparison: &outcome.comparison,
            raw: &outcome.raw,
        }
    }
}

/// Write an [`AggregateOutcome`] to `ip_data_<address>.json`.
///
/// # Arguments
///
/// * `outcome` - The finished aggregation run
/// * `ip` - The queried address, used for the file name
/// * `output_dir` - Existing directory to write into
///
/// # Returns
///
/// The path written, or an error if serialization or the write fails.
#[instrument(level = "info", skip_all, fields(%ip, output_dir = %output_dir))]
pub async fn write_ip_data(
    outcome: &AggregateOutcome,
    ip: &str,
    output_dir: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(&IpDataFile::new(outcome))?;
    let path = output_path(output_dir, ip);

    info!(path = %path.display(), "Writing JSON");
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote IP data file");

    Ok(path)
}
