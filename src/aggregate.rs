//! Aggregation runs: fan out to every source, normalize, merge, compare.
//!
//! # Execution modes
//!
//! - [`ExecutionMode::Parallel`]: every source is queried concurrently and
//!   the run waits for all of them. A slow or failing source delays the
//!   result but never hides the others.
//! - [`ExecutionMode::Sequential`]: sources are queried one after another,
//!   for fetchers that can only drive one page at a time.
//!
//! # Cancellation
//!
//! Source futures are polled inside the run future itself, so dropping it
//! (or losing the race in [`Aggregator::run_until`]) drops every in-flight
//! source query and its page session. A cancelled run yields no partial
//! result.

use crate::consistency::{ConsistencyReport, analyze};
use crate::error::AggregateError;
use crate::fetcher::PageFetcher;
use crate::merge::merge;
use crate::models::{Field, RawFields, UnifiedRecord, UnifiedReport};
use crate::scrapers::{self, FetchTimeouts, SourceDescriptor, fetch_source};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::net::IpAddr;
use std::time::Instant;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Parallel,
    Sequential,
}

/// Everything one run produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateOutcome {
    pub unified: UnifiedReport,
    pub comparison: ConsistencyReport,
    /// Each source's extracted key/value map, including keys with no
    /// canonical field (threat level, currency, ...).
    pub raw: BTreeMap<String, RawFields>,
}

impl AggregateOutcome {
    pub fn with_raw(mut self, raw: BTreeMap<String, RawFields>) -> Self {
        self.raw = raw;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Aggregator<F> {
    fetcher: F,
    sources: Vec<SourceDescriptor>,
    priority: Vec<String>,
    compare: Vec<Field>,
    mode: ExecutionMode,
    timeouts: FetchTimeouts,
}

impl<F: PageFetcher> Aggregator<F> {
    /// All built-in sources, default priority, default comparison fields,
    /// parallel mode.
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            sources: scrapers::ALL.to_vec(),
            priority: scrapers::ALL.iter().map(|s| s.name.to_string()).collect(),
            compare: Field::DEFAULT_COMPARISON.to_vec(),
            mode: ExecutionMode::default(),
            timeouts: FetchTimeouts::default(),
        }
    }

    /// Merge priority, highest first. Sources not listed rank after listed
    /// ones, in query order.
    pub fn with_priority(mut self, priority: Vec<String>) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_comparison(mut self, fields: Vec<Field>) -> Self {
        self.compare = fields;
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_timeouts(mut self, timeouts: FetchTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Query every source for `ip` and build the unified and consistency
    /// reports.
    ///
    /// # Arguments
    ///
    /// * `ip` - IPv4 or IPv6 address; surrounding whitespace is ignored
    ///
    /// # Returns
    ///
    /// An [`AggregateOutcome`] with one record and one raw map per source,
    /// the combined record and the consistency report.
    ///
    /// # Errors
    ///
    /// Only an unparseable address fails the run, and it does so before any
    /// page is opened. Source failures show up as failed records.
    #[instrument(level = "info", skip(self), fields(mode = ?self.mode, sources = self.sources.len()))]
    pub async fn run(&self, ip: &str) -> Result<AggregateOutcome, AggregateError> {
        let ip = validate_address(ip)?;
        let t0 = Instant::now();

        let fetched = match self.mode {
            ExecutionMode::Parallel => {
                join_all(
                    self.sources
                        .iter()
                        .map(|source| fetch_source(&self.fetcher, source, &ip, self.timeouts)),
                )
                .await
            }
            ExecutionMode::Sequential => {
                let mut fetched = Vec::with_capacity(self.sources.len());
                for source in &self.sources {
                    fetched.push(fetch_source(&self.fetcher, source, &ip, self.timeouts).await);
                }
                fetched
            }
        };

        let records: Vec<UnifiedRecord> = self
            .sources
            .iter()
            .zip(&fetched)
            .map(|(source, fetch)| source.normalize(&fetch.fields, &ip))
            .collect();

        let failed = records.iter().filter(|r| r.is_failed()).count();
        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            total = records.len(),
            failed,
            "Collected source records"
        );

        let raw = fetched
            .into_iter()
            .map(|fetch| (fetch.source.to_string(), fetch.fields))
            .collect();
        Ok(build_outcome(&ip, records, &self.priority, &self.compare).with_raw(raw))
    }

    /// Like [`Aggregator::run`], but abandons the run as soon as `shutdown`
    /// completes. Nothing collected before cancellation is returned.
    pub async fn run_until(
        &self,
        ip: &str,
        shutdown: impl Future<Output = ()>,
    ) -> Result<AggregateOutcome, AggregateError> {
        tokio::select! {
            outcome = self.run(ip) => outcome,
            _ = shutdown => {
                warn!(%ip, "Aggregation cancelled; discarding in-flight sources");
                Err(AggregateError::Cancelled(ip.trim().to_string()))
            }
        }
    }
}

/// Reject anything that is not an IPv4 or IPv6 address.
pub fn validate_address(ip: &str) -> Result<String, AggregateError> {
    let trimmed = ip.trim();
    trimmed
        .parse::<IpAddr>()
        .map(|_| trimmed.to_string())
        .map_err(|_| AggregateError::InvalidAddress(ip.to_string()))
}

/// Merge `records` under `priority` and compare `compare` across them.
pub fn build_outcome(
    ip: &str,
    records: Vec<UnifiedRecord>,
    priority: &[String],
    compare: &[Field],
) -> AggregateOutcome {
    let rank = |record: &UnifiedRecord| {
        priority
            .iter()
            .position(|name| name.eq_ignore_ascii_case(&record.source))
            .unwrap_or(priority.len())
    };
    let mut ordered = records.clone();
    ordered.sort_by_key(rank);

    let combined = merge(&ordered, ip);
    let comparison = analyze(ip, &records, compare);
    info!(
        %ip,
        consistent = comparison.summary.consistent_fields,
        compared = comparison.summary.total_fields,
        "Built combined record"
    );

    AggregateOutcome {
        unified: UnifiedReport {
            sources: records.into_iter().map(|r| (r.source.clone(), r)).collect(),
            combined,
        },
        comparison,
        raw: BTreeMap::new(),
    }
}
