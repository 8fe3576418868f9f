//! IP intelligence sources and the adapter that drives them.
//!
//! Every source is described by a [`SourceDescriptor`]: where its page lives,
//! which selectors must appear before the page counts as ready, any
//! interaction needed to reveal data, the extractor that reads the page, and
//! the field table the normalizer applies to what was extracted. The
//! interaction itself, navigate → wait → act → extract, is implemented once
//! in [`fetch_source`].
//!
//! # Supported Sources
//!
//! | Source | Module | Page | Notes |
//! |--------|--------|------|-------|
//! | ipapi.com | [`ipapi`] | demo widget | `data-demo-fill` cells, connection tab |
//! | ipinfo.io | [`ipinfo`] | `/<ip>` | two-column summary table |
//! | db-ip.com | [`dbip`] | `/<ip>` | network, threat and geo tables, map iframe |
//! | whatismyipaddress.com | [`whatismyipaddress`] | `/ip/<ip>` | `key: value` detail lines |
//!
//! # Failure containment
//!
//! [`fetch_source`] never returns an error. Navigation failures, unmet ready
//! conditions and extractor failures all come back as a raw map carrying only
//! an `error` key, which the normalizer turns into a failed record.

use crate::error::{ExtractError, SourceError};
use crate::fetcher::{Page, PageFetcher};
use crate::models::{RawFields, UnifiedRecord};
use crate::normalize::{FieldTable, normalize};
use scraper::Html;
use std::fmt;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub mod dbip;
pub mod ipapi;
pub mod ipinfo;
pub mod whatismyipaddress;

/// Reads a rendered page into raw key/value pairs. Pure; no I/O.
pub type Extractor = fn(&Html) -> Result<RawFields, ExtractError>;

/// A page interaction performed after the ready conditions hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Click(&'static str),
    WaitFor(&'static str),
}

#[derive(Clone, Copy)]
pub struct SourceDescriptor {
    /// Stable source name used in output and priority lists.
    pub name: &'static str,
    /// Page URL with an `{ip}` placeholder.
    pub endpoint: &'static str,
    /// Selectors that must all be present, checked in order.
    pub ready: &'static [&'static str],
    pub actions: &'static [Action],
    pub extract: Extractor,
    pub fields: FieldTable,
}

impl fmt::Debug for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDescriptor")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("ready", &self.ready)
            .field("actions", &self.actions)
            .finish_non_exhaustive()
    }
}

impl SourceDescriptor {
    pub fn url_for(&self, ip: &str) -> String {
        self.endpoint.replace("{ip}", &urlencoding::encode(ip))
    }

    pub fn normalize(&self, raw: &RawFields, ip: &str) -> UnifiedRecord {
        normalize(self.name, self.fields, raw, ip)
    }
}

/// All built-in sources, in default priority order.
pub const ALL: [SourceDescriptor; 4] = [
    ipapi::SOURCE,
    ipinfo::SOURCE,
    dbip::SOURCE,
    whatismyipaddress::SOURCE,
];

pub fn by_name(name: &str) -> Option<SourceDescriptor> {
    ALL.into_iter().find(|s| s.name.eq_ignore_ascii_case(name.trim()))
}

/// Bounds handed to the page fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTimeouts {
    pub navigation: Duration,
    /// Per ready condition.
    pub wait: Duration,
}

impl Default for FetchTimeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(30),
            wait: Duration::from_secs(10),
        }
    }
}

/// Outcome of one source query: the source name and its raw map, which
/// carries an `error` key when the source failed.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFetch {
    pub source: &'static str,
    pub fields: RawFields,
}

/// Query one source for `ip`.
///
/// The page session is opened here and closed here, whatever the outcome.
///
/// # Arguments
///
/// * `fetcher` - Opens the page session
/// * `descriptor` - Which source to query and how
/// * `ip` - The address, substituted into the source's endpoint
/// * `timeouts` - Navigation and per-ready-condition bounds
///
/// # Returns
///
/// A [`SourceFetch`] whose raw map holds the extracted fields, or only an
/// `error` key when navigation, a ready condition, an action or the
/// extractor failed. Failures never carry partial fields.
#[instrument(level = "info", skip_all, fields(source = descriptor.name, %ip))]
pub async fn fetch_source<F: PageFetcher>(
    fetcher: &F,
    descriptor: &SourceDescriptor,
    ip: &str,
    timeouts: FetchTimeouts,
) -> SourceFetch {
    let url = descriptor.url_for(ip);
    let fields = match fetcher.open(&url, timeouts.navigation).await {
        Ok(mut page) => {
            let outcome = drive(&mut page, descriptor, timeouts).await;
            if let Err(e) = page.close().await {
                warn!(error = %e, "Failed to close page session");
            }
            match outcome {
                Ok(fields) if fields.is_empty() => {
                    warn!(%url, "Page matched but yielded no fields");
                    fields
                }
                Ok(fields) => {
                    info!(count = fields.len(), "Extracted source fields");
                    fields
                }
                Err(e) => {
                    warn!(error = %e, %url, "Source failed");
                    RawFields::failed(e)
                }
            }
        }
        Err(e) => {
            warn!(error = %e, %url, "Navigation failed");
            RawFields::failed(e)
        }
    };

    SourceFetch {
        source: descriptor.name,
        fields,
    }
}

async fn drive<P: Page>(
    page: &mut P,
    descriptor: &SourceDescriptor,
    timeouts: FetchTimeouts,
) -> Result<RawFields, SourceError> {
    for selector in descriptor.ready {
        page.wait_for_selector(selector, timeouts.wait).await?;
    }
    for action in descriptor.actions {
        match action {
            Action::Click(selector) => page.click(selector).await?,
            Action::WaitFor(selector) => page.wait_for_selector(selector, timeouts.wait).await?,
        }
    }

    let markup = page.content().await?;
    let document = Html::parse_document(&markup);
    Ok((descriptor.extract)(&document)?)
}

#[cfg(test)]
pub(crate) mod testing {
    //! A scripted in-memory fetcher for adapter and aggregator tests.

    use super::*;
    use crate::error::FetchError;
    use scraper::Selector;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone)]
    pub enum Script {
        Serve(String),
        Fail(String),
        /// Never completes.
        Hang,
    }

    /// Serves fixed markup per URL prefix and counts open/closed sessions.
    #[derive(Debug, Clone, Default)]
    pub struct FakeFetcher {
        scripts: HashMap<String, Script>,
        opened: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
    }

    impl FakeFetcher {
        pub fn with(mut self, url_prefix: &str, script: Script) -> Self {
            self.scripts.insert(url_prefix.to_string(), script);
            self
        }

        pub fn serve(self, url_prefix: &str, html: &str) -> Self {
            self.with(url_prefix, Script::Serve(html.to_string()))
        }

        pub fn opened(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }

        pub fn closed(&self) -> usize {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[derive(Debug)]
    pub struct FakePage {
        html: String,
        closed: Arc<AtomicUsize>,
    }

    impl FakePage {
        fn find(&self, css: &str) -> Result<bool, FetchError> {
            let sel =
                Selector::parse(css).map_err(|_| FetchError::InvalidSelector(css.to_string()))?;
            Ok(Html::parse_document(&self.html).select(&sel).next().is_some())
        }
    }

    impl PageFetcher for FakeFetcher {
        type Page = FakePage;

        async fn open(&self, url: &str, timeout: Duration) -> Result<FakePage, FetchError> {
            let script = self
                .scripts
                .iter()
                .find(|(prefix, _)| url.starts_with(prefix.as_str()))
                .map(|(_, s)| s.clone());
            match script {
                Some(Script::Serve(html)) => {
                    self.opened.fetch_add(1, Ordering::SeqCst);
                    Ok(FakePage {
                        html,
                        closed: Arc::clone(&self.closed),
                    })
                }
                Some(Script::Fail(reason)) => Err(FetchError::Navigation {
                    url: url.to_string(),
                    reason,
                }),
                Some(Script::Hang) => futures::future::pending().await,
                None => Err(FetchError::Timeout {
                    url: url.to_string(),
                    timeout,
                }),
            }
        }
    }

    impl Page for FakePage {
        async fn wait_for_selector(
            &mut self,
            css: &str,
            timeout: Duration,
        ) -> Result<(), FetchError> {
            if self.find(css)? {
                Ok(())
            } else {
                Err(FetchError::SelectorTimeout {
                    selector: css.to_string(),
                    timeout,
                })
            }
        }

        async fn text_content(&self, _css: &str) -> Result<Option<String>, FetchError> {
            Ok(None)
        }

        async fn attribute(&self, _css: &str, _name: &str) -> Result<Option<String>, FetchError> {
            Ok(None)
        }

        async fn click(&mut self, css: &str) -> Result<(), FetchError> {
            if self.find(css)? {
                Ok(())
            } else {
                Err(FetchError::MissingElement(css.to_string()))
            }
        }

        async fn content(&self) -> Result<String, FetchError> {
            Ok(self.html.clone())
        }

        async fn close(self) -> Result<(), FetchError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FakeFetcher, Script};
    use super::*;

    const IPINFO_PAGE: &str = r#"<html><body><table><tbody>
        <tr><td>ASN</td><td>AS15169 - Google LLC</td></tr>
        <tr><td>Range</td><td>8.8.8.0/24</td></tr>
    </tbody></table></body></html>"#;

    #[test]
    fn test_url_for_substitutes_address() {
        assert_eq!(ipinfo::SOURCE.url_for("8.8.8.8"), "https://ipinfo.io/8.8.8.8");
        assert_eq!(
            ipinfo::SOURCE.url_for("2001:db8::1"),
            "https://ipinfo.io/2001%3Adb8%3A%3A1"
        );
    }

    #[test]
    fn test_by_name() {
        assert_eq!(by_name("DB-IP.com").map(|s| s.name), Some("db-ip.com"));
        assert!(by_name("example.org").is_none());
    }

    #[test]
    fn test_source_names_are_unique() {
        for (i, a) in ALL.iter().enumerate() {
            for b in &ALL[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[tokio::test]
    async fn test_fetch_source_success_closes_session() {
        let fetcher = FakeFetcher::default().serve("https://ipinfo.io/", IPINFO_PAGE);
        let result =
            fetch_source(&fetcher, &ipinfo::SOURCE, "8.8.8.8", FetchTimeouts::default()).await;

        assert_eq!(result.source, "ipinfo.io");
        assert_eq!(result.fields.get("asn_number"), Some("AS15169"));
        assert_eq!(result.fields.get("range"), Some("8.8.8.0/24"));
        assert_eq!(fetcher.opened(), 1);
        assert_eq!(fetcher.closed(), 1);
    }

    #[tokio::test]
    async fn test_fetch_source_navigation_failure_is_data() {
        let fetcher =
            FakeFetcher::default().with("https://ipinfo.io/", Script::Fail("refused".into()));
        let result =
            fetch_source(&fetcher, &ipinfo::SOURCE, "8.8.8.8", FetchTimeouts::default()).await;

        assert_eq!(result.source, "ipinfo.io");
        assert_eq!(result.fields.len(), 1);
        assert!(result.fields.error().unwrap().contains("refused"));
    }

    #[tokio::test]
    async fn test_unmet_ready_condition_fails_without_partial_data() {
        let fetcher = FakeFetcher::default().serve("https://ipinfo.io/", "<html><p>captcha</p></html>");
        let result =
            fetch_source(&fetcher, &ipinfo::SOURCE, "8.8.8.8", FetchTimeouts::default()).await;

        assert_eq!(result.fields.len(), 1);
        assert!(result.fields.error().unwrap().contains("tbody tr"));
        assert_eq!(fetcher.closed(), 1);
    }

    #[tokio::test]
    async fn test_page_without_values_is_empty_not_failed() {
        let page = "<html><table><tbody><tr><td>City</td><td> </td></tr></tbody></table></html>";
        let fetcher = FakeFetcher::default().serve("https://ipinfo.io/", page);
        let result =
            fetch_source(&fetcher, &ipinfo::SOURCE, "8.8.8.8", FetchTimeouts::default()).await;

        assert!(result.fields.is_empty());
        assert!(!ipinfo::SOURCE.normalize(&result.fields, "8.8.8.8").is_failed());
    }

    #[tokio::test]
    async fn test_missing_click_target_fails_source() {
        let page = r#"<html><span data-demo-fill="latitude">1</span></html>"#;
        let fetcher = FakeFetcher::default().serve("https://ipapi.com/", page);
        let result =
            fetch_source(&fetcher, &ipapi::SOURCE, "8.8.8.8", FetchTimeouts::default()).await;

        assert!(result.fields.error().is_some());
        assert_eq!(fetcher.opened(), fetcher.closed());
    }
}
