//! Browsing session backed by a cookie-keeping HTTP client.

use super::html::{self, HtmlElement};
use super::{landed_on_login, parse_url, AccountSession, BrowsingSession, SessionError};
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::Client;
use serde::de::DeserializeOwned;
use shared::config::SiteConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// HTTP browsing session
///
/// Keeps cookies between requests, so a successful `login` (or an injected
/// session cookie) authenticates every later navigation.
pub struct HttpSession {
    /// HTTP client sharing `jar`
    client: Client,
    /// Cookie store
    jar: Arc<Jar>,
    /// Path of the site's login page
    login_path: String,
    /// Final URL of the last navigation
    current_url: String,
    /// Body of the last navigation
    body: String,
}

impl HttpSession {
    /// Create a session with the site's timeout and user agent
    pub fn new(site: &SiteConfig) -> Result<Self, SessionError> {
        let login_path = parse_url(&site.login_url())?.path().to_string();
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .timeout(Duration::from_secs(site.request_timeout_secs))
            .user_agent(site.user_agent.as_str())
            .cookie_provider(Arc::clone(&jar))
            .build()?;

        Ok(Self {
            client,
            jar,
            login_path,
            current_url: "about:blank".to_string(),
            body: String::new(),
        })
    }

    /// GET a JSON document with the session's cookies
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SessionError> {
        debug!(url = %url, "Fetching JSON");

        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| SessionError::Navigation {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.json::<T>().await.map_err(|source| SessionError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl BrowsingSession for HttpSession {
    type Element = HtmlElement;

    async fn goto(&mut self, url: &str) -> Result<(), SessionError> {
        debug!(url = %url, "Navigating");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| SessionError::Navigation {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = %status, "Navigation failed");
            return Err(SessionError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        if landed_on_login(url, &final_url, &self.login_path) {
            warn!(url = %url, landed_on = %final_url, "Session expired");
            return Err(SessionError::SessionExpired {
                url: url.to_string(),
            });
        }

        self.body = response
            .text()
            .await
            .map_err(|source| SessionError::Navigation {
                url: url.to_string(),
                source,
            })?;
        self.current_url = final_url;

        Ok(())
    }

    fn current_url(&self) -> &str {
        &self.current_url
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<HtmlElement>, SessionError> {
        html::select_all(&self.body, selector)
    }

    async fn wait_for(&self, duration: Duration) {
        sleep(duration).await;
    }
}

#[async_trait]
impl AccountSession for HttpSession {
    /// Submit the login form
    ///
    /// The site answers a rejected login by rendering the login page again,
    /// so landing back on the login path counts as a rejection.
    async fn login(
        &mut self,
        login_url: &str,
        email: &str,
        password: &str,
    ) -> Result<(), SessionError> {
        let login_path = parse_url(login_url)?.path().to_string();

        info!(url = %login_url, "Submitting login form");
        let response = self
            .client
            .post(login_url)
            .form(&[("email", email), ("password", password)])
            .send()
            .await
            .map_err(|source| SessionError::Navigation {
                url: login_url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %login_url, status = %status, "Login request failed");
            return Err(SessionError::Status {
                url: login_url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        self.body = response
            .text()
            .await
            .map_err(|source| SessionError::Navigation {
                url: login_url.to_string(),
                source,
            })?;
        self.current_url = final_url.to_string();

        if final_url.path() == login_path {
            warn!(url = %login_url, "Login rejected");
            return Err(SessionError::LoginRejected {
                url: login_url.to_string(),
            });
        }

        info!(landed_on = %final_url, "Logged in");
        Ok(())
    }

    async fn add_cookie(&mut self, site_url: &str, cookie: &str) -> Result<(), SessionError> {
        let url = parse_url(site_url)?;
        for part in cookie.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            self.jar.add_cookie_str(part, &url);
        }
        debug!(url = %url, "Session cookie added");
        Ok(())
    }

    async fn fetch_json_value(&self, url: &str) -> Result<serde_json::Value, SessionError> {
        self.fetch_json(url).await
    }

    async fn close(self) -> Result<(), SessionError> {
        Ok(())
    }
}
