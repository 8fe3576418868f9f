//! Static HTTP page fetcher.
//!
//! Downloads the page once with `reqwest` and answers every page operation
//! from that snapshot with `scraper`. There is no script execution, so a
//! ready condition either holds in the downloaded document or it never will,
//! and a click only checks that its target exists (tabbed content is already
//! present in the static markup).

use super::{Page, PageFetcher};
use crate::error::FetchError;
use crate::parsing::element_text;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, instrument};

/// Default user agent; several sources refuse requests without a browser-like one.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetchError::Navigation {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpPageFetcher {
    type Page = HttpPage;

    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn open(&self, url: &str, timeout: Duration) -> Result<HttpPage, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| navigation_error(url, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| navigation_error(url, timeout, e))?;
        debug!(bytes = body.len(), "Downloaded page");

        Ok(HttpPage {
            url: url.to_string(),
            body: Some(body),
        })
    }
}

fn navigation_error(url: &str, timeout: Duration, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
            timeout,
        }
    } else {
        FetchError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

/// A downloaded document. `body` is `None` once closed.
#[derive(Debug)]
pub struct HttpPage {
    url: String,
    body: Option<String>,
}

impl HttpPage {
    fn document(&self) -> Result<Html, FetchError> {
        self.body
            .as_deref()
            .map(Html::parse_document)
            .ok_or(FetchError::Closed)
    }
}

fn selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|_| FetchError::InvalidSelector(css.to_string()))
}

impl Page for HttpPage {
    async fn wait_for_selector(
        &mut self,
        css: &str,
        timeout: Duration,
    ) -> Result<(), FetchError> {
        let sel = selector(css)?;
        if self.document()?.select(&sel).next().is_some() {
            Ok(())
        } else {
            Err(FetchError::SelectorTimeout {
                selector: css.to_string(),
                timeout,
            })
        }
    }

    async fn text_content(&self, css: &str) -> Result<Option<String>, FetchError> {
        let sel = selector(css)?;
        Ok(self.document()?.select(&sel).next().map(element_text))
    }

    async fn attribute(&self, css: &str, name: &str) -> Result<Option<String>, FetchError> {
        let sel = selector(css)?;
        Ok(self
            .document()?
            .select(&sel)
            .next()
            .and_then(|el| el.value().attr(name))
            .map(str::to_string))
    }

    async fn click(&mut self, css: &str) -> Result<(), FetchError> {
        let sel = selector(css)?;
        if self.document()?.select(&sel).next().is_some() {
            debug!(url = %self.url, selector = css, "Click target present in static document");
            Ok(())
        } else {
            Err(FetchError::MissingElement(css.to_string()))
        }
    }

    async fn content(&self) -> Result<String, FetchError> {
        self.body.clone().ok_or(FetchError::Closed)
    }

    async fn close(mut self) -> Result<(), FetchError> {
        self.body = None;
        Ok(())
    }
}
