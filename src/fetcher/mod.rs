//! Page fetching capability used by source adapters.
//!
//! The adapters only need a small set of page operations: navigate, wait for
//! a selector, read text or an attribute, click, and snapshot the rendered
//! markup. Anything that can provide those (a headless browser driver, or
//! the plain HTTP implementation in [`http`]) can back an aggregation run.
//!
//! # Session ownership
//!
//! Every call to [`PageFetcher::open`] yields a fresh [`Page`] that is owned
//! by exactly one adapter. The adapter closes it when it is done, on success
//! and on failure; a page dropped mid-flight (cancellation) must release its
//! resources in `Drop`.

use crate::error::FetchError;
use std::time::Duration;

pub mod http;

pub use http::HttpPageFetcher;

/// Opens page sessions.
pub trait PageFetcher {
    type Page: Page;

    /// Navigate a new session to `url`, failing if the page is not reachable
    /// within `timeout`.
    async fn open(&self, url: &str, timeout: Duration) -> Result<Self::Page, FetchError>;
}

/// One open page session.
pub trait Page {
    /// Wait until an element matching `selector` exists.
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration)
    -> Result<(), FetchError>;

    /// Trimmed text of the first element matching `selector`, if any.
    async fn text_content(&self, selector: &str) -> Result<Option<String>, FetchError>;

    /// Attribute `name` of the first element matching `selector`, if any.
    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, FetchError>;

    /// Click the first element matching `selector`.
    async fn click(&mut self, selector: &str) -> Result<(), FetchError>;

    /// The current rendered markup.
    async fn content(&self) -> Result<String, FetchError>;

    /// Tear the session down.
    async fn close(self) -> Result<(), FetchError>;
}
