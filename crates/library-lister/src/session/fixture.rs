//! In-memory session serving canned pages.

use super::html::{self, HtmlElement};
use super::{BrowsingSession, SessionError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Session that serves fixed HTML per URL and records what it was asked
#[derive(Default)]
pub struct FixtureSession {
    pages: HashMap<String, String>,
    /// Pages that render their items only after this many queries
    delayed: HashMap<String, usize>,
    current_url: String,
    pub visited: Vec<String>,
    waits: Mutex<Vec<Duration>>,
    queries: Mutex<usize>,
}

impl FixtureSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, body: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), body.into());
        self
    }

    /// Serve an empty body for `url` until it has been queried `queries` times
    pub fn with_delayed_page(mut self, url: &str, body: impl Into<String>, queries: usize) -> Self {
        self.delayed.insert(url.to_string(), queries);
        self.with_page(url, body)
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowsingSession for FixtureSession {
    type Element = HtmlElement;

    async fn goto(&mut self, url: &str) -> Result<(), SessionError> {
        self.visited.push(url.to_string());
        if !self.pages.contains_key(url) {
            return Err(SessionError::NotFound {
                url: url.to_string(),
            });
        }
        self.current_url = url.to_string();
        *self.queries.lock().unwrap() = 0;
        Ok(())
    }

    fn current_url(&self) -> &str {
        &self.current_url
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<HtmlElement>, SessionError> {
        let seen = {
            let mut queries = self.queries.lock().unwrap();
            *queries += 1;
            *queries
        };

        if let Some(&after) = self.delayed.get(&self.current_url) {
            if seen <= after {
                return Ok(Vec::new());
            }
        }

        let body = self
            .pages
            .get(&self.current_url)
            .map(String::as_str)
            .unwrap_or_default();
        html::select_all(body, selector)
    }

    async fn wait_for(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}

/// Render a listing page with the given items and pagination hrefs
///
/// An item with `None` for a field omits that sub-element.
pub fn listing_page(items: &[(Option<&str>, Option<&str>)], hrefs: &[&str]) -> String {
    let mut body = String::from("<html><body><ul id=\"listBooks\">");
    for (author, title) in items {
        body.push_str("<li>");
        if let Some(title) = title {
            body.push_str(&format!("<h3 class=\"title\">{}</h3>", title));
        }
        if let Some(author) = author {
            body.push_str(&format!("<p class=\"author\">{}</p>", author));
        }
        body.push_str("</li>");
    }
    body.push_str("</ul><div class=\"pagination\">");
    for href in hrefs {
        body.push_str(&format!("<a href=\"{}\">link</a>", href));
    }
    body.push_str("</div></body></html>");
    body
}
