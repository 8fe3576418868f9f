//! # IP Sources
//!
//! Looks up IP addresses on several public IP intelligence sites, normalizes
//! what each one reports into a single schema, merges the results by source
//! priority and reports how well the sources agree.
//!
//! ## Sources
//!
//! - ipapi.com
//! - ipinfo.io
//! - db-ip.com
//! - whatismyipaddress.com
//!
//! ## Usage
//!
//! ```sh
//! ip_sources -o ./out 8.8.8.8 1.1.1.1
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching**: every source page is opened, waited on and read
//!    (concurrently by default)
//! 2. **Normalizing**: each source's raw key/value map becomes a unified record
//! 3. **Merging**: records are combined field by field in priority order
//! 4. **Comparing**: selected fields are checked for cross-source agreement
//! 5. **Output**: one JSON file per address

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod aggregate;
mod cli;
mod config;
mod consistency;
mod error;
mod fetcher;
mod merge;
mod models;
mod normalize;
mod outputs;
mod parsing;
mod scrapers;
mod utils;

use aggregate::Aggregator;
use cli::Cli;
use config::Settings;
use error::AggregateError;
use fetcher::HttpPageFetcher;
use outputs::json;
use utils::{ensure_writable_dir, shutdown_on, truncate_for_log};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("ip_sources starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(addresses = ?args.addresses, output_dir = %args.output_dir, "Parsed CLI arguments");

    // ---- Load config ----
    let settings = match &args.config {
        Some(path) => config::load(path)?,
        None => Settings::default(),
    };
    let settings = args.apply(settings);
    for name in settings.unknown_sources() {
        warn!(source = %name, "Priority lists an unknown source; it will be ignored");
    }
    debug!(?settings, "Effective settings");

    // Early check: ensure output dir is writable
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }

    let fetcher = HttpPageFetcher::new(&settings.user_agent)?;
    let aggregator = Aggregator::new(fetcher)
        .with_mode(settings.mode)
        .with_timeouts(settings.timeouts())
        .with_priority(settings.priority.clone())
        .with_comparison(settings.compare_fields.clone());

    // ---- Look up each address in turn ----
    let mut failures = 0usize;
    for ip in &args.addresses {
        let shutdown = shutdown_on(tokio::signal::ctrl_c());
        let outcome = match aggregator.run_until(ip, shutdown).await {
            Ok(outcome) => outcome,
            Err(e @ AggregateError::Cancelled(_)) => {
                warn!(error = %e, "Interrupted; skipping remaining addresses");
                return Err(e.into());
            }
            Err(e) => {
                error!(%ip, error = %e, "Skipping address");
                failures += 1;
                continue;
            }
        };

        if let Some(err) = &outcome.unified.combined.error {
            debug!(%ip, first_error = %truncate_for_log(err, 200), "At least one source failed");
        }

        let summary = outcome.comparison.summary;
        info!(
            %ip,
            sources = summary.total_sources,
            "Consistency: {}/{} fields consistent",
            summary.consistent_fields,
            summary.total_fields
        );

        if let Err(e) = json::write_ip_data(&outcome, ip, &args.output_dir).await {
            error!(%ip, error = %e, "Failed to write JSON");
            failures += 1;
        }
    }

    info!(
        addresses = args.addresses.len(),
        failures,
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "ip_sources finished"
    );

    if failures > 0 {
        return Err(format!("{failures} of {} addresses failed", args.addresses.len()).into());
    }
    Ok(())
}
