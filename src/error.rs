//! Error types for fetching, extraction, aggregation and configuration.
//!
//! Only [`AggregateError`] ever reaches the caller of an aggregation run.
//! Fetch and extraction failures are converted into error-tagged source
//! records at the adapter boundary (see [`crate::scrapers::fetch_source`]).

use std::time::Duration;
use thiserror::Error;

/// Failures raised by a [`crate::fetcher::PageFetcher`] or its pages.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The page could not be reached at all.
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("navigation to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Navigation did not finish within the bound.
    #[error("navigation to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    /// A page-ready condition never became true.
    #[error("selector `{selector}` did not appear within {timeout:?}")]
    SelectorTimeout { selector: String, timeout: Duration },

    /// An element required for an interaction is absent.
    #[error("no element matches `{0}`")]
    MissingElement(String),

    /// The selector itself is malformed.
    #[error("invalid selector `{0}`")]
    InvalidSelector(String),

    #[error("page session already closed")]
    Closed,
}

/// A whole-page extraction failure.
///
/// Individual missing fields are never errors; only a page whose root
/// container is absent fails the extractor.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExtractError {
    #[error("root container `{0}` not found in page")]
    MissingRoot(&'static str),
}

/// Anything that turns a source into a failed source record.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// Failures that stop an aggregation run as a whole.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AggregateError {
    /// The queried address is not an IPv4 or IPv6 address. Raised before any fetch.
    #[error("`{0}` is not a valid IP address")]
    InvalidAddress(String),

    /// The run was cancelled before every source completed.
    #[error("aggregation for {0} was cancelled")]
    Cancelled(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unknown field `{0}` in compare list")]
    UnknownField(String),
}
