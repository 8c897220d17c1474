//! Browsing session backed by a headless Chromium instance.
//!
//! Pages are rendered with their scripts, so listings that are filled in
//! client-side are visible to queries. Element handles are live DOM nodes.

use super::{landed_on_login, parse_url, AccountSession, BrowsingSession, ElementHandle, SessionError};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use shared::config::{BrowserConfig, SiteConfig};
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Find a Chromium executable: the configured one, or the first on `PATH`
pub fn find_chromium(config: &BrowserConfig) -> Option<PathBuf> {
    if let Some(path) = &config.executable {
        return Some(PathBuf::from(path));
    }

    ["google-chrome", "chromium", "chromium-browser"]
        .into_iter()
        .find_map(|name| which::which(name).ok())
}

/// Session driving one tab of a launched browser
pub struct BrowserSession {
    browser: Browser,
    page: Page,
    /// Drains browser events; ends with the browser
    handler: JoinHandle<()>,
    config: BrowserConfig,
    login_path: String,
    current_url: String,
}

impl BrowserSession {
    /// Launch a browser and open a blank tab
    pub async fn launch(site: &SiteConfig, config: &BrowserConfig) -> Result<Self, SessionError> {
        let login_path = parse_url(&site.login_url())?.path().to_string();
        let chrome_path = find_chromium(config)
            .ok_or_else(|| SessionError::Launch("no Chromium executable found".to_string()))?;

        let mut builder = LaunchConfig::builder()
            .chrome_executable(&chrome_path)
            .request_timeout(Duration::from_secs(site.request_timeout_secs))
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg(format!("--user-agent={}", site.user_agent));
        if !config.headless {
            builder = builder.with_head();
        }
        let launch_config = builder.build().map_err(SessionError::Launch)?;

        info!(executable = %chrome_path.display(), headless = config.headless, "Launching browser");
        let (browser, mut handler) = Browser::launch(launch_config).await?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "Browser event error");
                }
            }
        });

        let page = browser.new_page("about:blank").await?;

        Ok(Self {
            browser,
            page,
            handler,
            config: config.clone(),
            login_path,
            current_url: "about:blank".to_string(),
        })
    }

    fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.config.navigation_timeout_secs)
    }

    async fn page_url(&self, fallback: &str) -> Result<String, SessionError> {
        Ok(self
            .page
            .url()
            .await?
            .map(|u| u.to_string())
            .unwrap_or_else(|| fallback.to_string()))
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), SessionError> {
        self.page
            .find_element(selector)
            .await?
            .click()
            .await?
            .type_str(value)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl BrowsingSession for BrowserSession {
    type Element = BrowserElement;

    async fn goto(&mut self, url: &str) -> Result<(), SessionError> {
        debug!(url = %url, "Navigating");

        let limit = self.navigation_timeout();
        match timeout(limit, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                warn!(url = %url, error = %e, "Navigation failed");
                return Err(SessionError::Browser(e));
            }
            Err(_) => {
                warn!(url = %url, "Navigation timed out");
                return Err(SessionError::NavigationTimeout {
                    url: url.to_string(),
                    timeout: limit,
                });
            }
        }

        let final_url = self.page_url(url).await?;
        if landed_on_login(url, &final_url, &self.login_path) {
            warn!(url = %url, landed_on = %final_url, "Session expired");
            return Err(SessionError::SessionExpired {
                url: url.to_string(),
            });
        }
        self.current_url = final_url;

        Ok(())
    }

    fn current_url(&self) -> &str {
        &self.current_url
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<BrowserElement>, SessionError> {
        let elements = self.page.find_elements(selector).await?;
        Ok(elements.into_iter().map(BrowserElement).collect())
    }

    async fn wait_for(&self, duration: Duration) {
        sleep(duration).await;
    }
}

#[async_trait]
impl AccountSession for BrowserSession {
    /// Fill in and submit the login form
    ///
    /// A cookie consent dialog covering the form is declined first when
    /// present. Staying on the login page after submitting is a rejection.
    async fn login(
        &mut self,
        login_url: &str,
        email: &str,
        password: &str,
    ) -> Result<(), SessionError> {
        info!(url = %login_url, "Opening login form");
        self.page.goto(login_url).await?;

        if let Ok(decline) = self.page.find_element(&self.config.cookie_decline_selector).await {
            debug!("Declining cookie consent");
            decline.click().await?;
        }

        self.fill(&self.config.email_selector, email).await?;
        self.fill(&self.config.password_selector, password).await?;

        info!(url = %login_url, "Submitting login form");
        self.page
            .find_element(&self.config.submit_selector)
            .await?
            .click()
            .await?;

        let limit = self.navigation_timeout();
        match timeout(limit, self.page.wait_for_navigation()).await {
            Ok(navigated) => {
                navigated?;
            }
            Err(_) => {
                return Err(SessionError::NavigationTimeout {
                    url: login_url.to_string(),
                    timeout: limit,
                })
            }
        }

        let final_url = self.page_url(login_url).await?;
        self.current_url = final_url.clone();

        if parse_url(&final_url)?.path() == parse_url(login_url)?.path() {
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

        let mut cookies = Vec::new();
        for part in cookie.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = part.split_once('=').unwrap_or((part, ""));
            let param = CookieParam::builder()
                .name(name.trim())
                .value(value.trim())
                .url(url.as_str())
                .build()
                .map_err(|reason| SessionError::InvalidUrl {
                    url: site_url.to_string(),
                    reason,
                })?;
            cookies.push(param);
        }

        self.page.set_cookies(cookies).await?;
        debug!(url = %url, "Session cookie added");
        Ok(())
    }

    /// Fetch from inside the page, so the request carries the tab's cookies
    async fn fetch_json_value(&self, url: &str) -> Result<serde_json::Value, SessionError> {
        debug!(url = %url, "Fetching JSON");

        let json_error = |source| SessionError::Json {
            url: url.to_string(),
            source,
        };
        let target = serde_json::to_string(url).map_err(json_error)?;
        let script = format!(
            "fetch({target}, {{ headers: {{ 'Accept': 'application/json' }} }})\
             .then(r => {{ if (!r.ok) {{ throw new Error('status ' + r.status); }} return r.json(); }})"
        );

        self.page
            .evaluate(script.as_str())
            .await?
            .into_value::<serde_json::Value>()
            .map_err(json_error)
    }

    async fn close(self) -> Result<(), SessionError> {
        let mut session = self;
        info!("Closing browser");
        let closed = session.browser.close().await;
        if let Err(e) = session.browser.wait().await {
            debug!(error = %e, "Browser process did not exit cleanly");
        }
        session.handler.abort();
        closed?;
        Ok(())
    }
}

/// Live element of a browser page
pub struct BrowserElement(Element);

#[async_trait]
impl ElementHandle for BrowserElement {
    async fn get_attribute(&self, name: &str) -> Result<Option<String>, SessionError> {
        Ok(self.0.attribute(name).await?)
    }

    async fn inner_text(&self) -> Result<String, SessionError> {
        Ok(self.0.inner_text().await?.unwrap_or_default())
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<Self>, SessionError> {
        let mut found = self.0.find_elements(selector).await?;
        Ok((!found.is_empty()).then(|| BrowserElement(found.swap_remove(0))))
    }
}
