//! Browsing session capability.
//!
//! The scanner only needs to navigate, query elements and wait. Those
//! operations are expressed as traits so the scanner can be driven by a
//! headless browser, a plain HTTP session or by in-memory fixtures.

pub mod browser;
pub mod html;
pub mod http;

#[cfg(test)]
pub(crate) mod fixture;

pub use browser::{BrowserElement, BrowserSession};
pub use html::HtmlElement;
pub use http::HttpSession;

use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a browsing session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("navigation to {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("navigation to {url} failed")]
    Navigation {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("navigation to {url} did not finish within {timeout:?}")]
    NavigationTimeout { url: String, timeout: Duration },

    #[error("session expired: {url} redirected to the login page")]
    SessionExpired { url: String },

    #[error("no page at {url}")]
    NotFound { url: String },

    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("login was rejected by {url}")]
    LoginRejected { url: String },

    #[error("failed to decode response from {url}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to parse JSON from {url}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Authenticated browsing capability
#[async_trait]
pub trait BrowsingSession: Send + Sync {
    type Element: ElementHandle;

    /// Load a page; the call returns once its content is available
    async fn goto(&mut self, url: &str) -> Result<(), SessionError>;

    /// URL of the page currently loaded, after redirects
    fn current_url(&self) -> &str;

    /// All elements of the current page matching a CSS selector
    async fn query_all(&self, selector: &str) -> Result<Vec<Self::Element>, SessionError>;

    async fn wait_for(&self, duration: Duration);
}

/// Element of a loaded page
#[async_trait]
pub trait ElementHandle: Send + Sync + Sized {
    async fn get_attribute(&self, name: &str) -> Result<Option<String>, SessionError>;

    async fn inner_text(&self) -> Result<String, SessionError>;

    /// First descendant matching a CSS selector
    async fn query_selector(&self, selector: &str) -> Result<Option<Self>, SessionError>;
}

/// Account-level operations around a browsing session
#[async_trait]
pub trait AccountSession: BrowsingSession {
    /// Log in through the site's login form
    async fn login(&mut self, login_url: &str, email: &str, password: &str)
        -> Result<(), SessionError>;

    /// Add `name=value` cookies (separated by `;`) for the given site URL
    async fn add_cookie(&mut self, site_url: &str, cookie: &str) -> Result<(), SessionError>;

    /// GET a JSON document with the session's credentials
    async fn fetch_json_value(&self, url: &str) -> Result<serde_json::Value, SessionError>;

    /// Release the session's resources
    async fn close(self) -> Result<(), SessionError>;
}

/// Whether a navigation to `requested` ended on the login page instead
///
/// The site answers requests from an expired session with a redirect to its
/// login form. Navigating to the login page itself is not an expiry.
pub(crate) fn landed_on_login(requested: &str, landed: &str, login_path: &str) -> bool {
    let (Ok(requested), Ok(landed)) = (Url::parse(requested), Url::parse(landed)) else {
        return false;
    };
    landed.path() == login_path && requested.path() != login_path
}

pub(crate) fn parse_url(url: &str) -> Result<Url, SessionError> {
    Url::parse(url).map_err(|e| SessionError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}
