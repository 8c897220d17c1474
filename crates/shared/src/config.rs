//! Configuration management for the library lister.
//!
//! This module handles loading and parsing configuration from TOML files,
//! with sensible defaults for all settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bookseller site settings
    pub site: SiteConfig,

    /// Listing scanner settings
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Headless browser settings
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Bookseller site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site origin, without a trailing slash
    pub base_url: String,

    /// Path of the login form endpoint
    pub login_path: String,

    /// Path of the JSON endpoint with the account's library counters
    pub account_info_path: String,

    /// Path of the account library, category segments are appended to it
    pub library_path: String,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// User agent sent with every request
    pub user_agent: String,
}

/// Listing scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Selector for item elements of a listing page
    pub item_selector: String,

    /// Selector for the title element inside an item
    pub title_selector: String,

    /// Selector for the author element inside an item
    pub author_selector: String,

    /// Href prefix identifying pagination links
    pub pagination_link_prefix: String,

    /// How to wait for the listing after the page size change
    pub readiness: ReadinessConfig,
}

/// Readiness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ReadinessConfig {
    /// Wait a fixed delay
    Fixed { delay_ms: u64 },

    /// Poll until item elements appear or the timeout elapses
    Poll { interval_ms: u64, timeout_ms: u64 },
}

/// Headless browser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run without a visible window
    pub headless: bool,

    /// Chromium executable; searched on `PATH` when unset
    pub executable: Option<String>,

    /// Time allowed for one page load, in seconds
    pub navigation_timeout_secs: u64,

    /// Button dismissing the cookie consent dialog
    pub cookie_decline_selector: String,

    /// Login form email input
    pub email_selector: String,

    /// Login form password input
    pub password_selector: String,

    /// Login form submit button
    pub submit_selector: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log directory path
    pub log_dir: String,

    /// Default log level (trace, debug, info, warn, error)
    pub default_level: String,

    /// Enable console output
    pub console: bool,

    /// Enable file output
    pub file: bool,

    /// Enable JSON formatting for file logs
    pub json_format: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            item_selector: "ul#listBooks li".to_string(),
            title_selector: "h3.title".to_string(),
            author_selector: "p.author".to_string(),
            pagination_link_prefix: "/users/konto/biblioteka/".to_string(),
            readiness: ReadinessConfig::default(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            navigation_timeout_secs: 30,
            cookie_decline_selector: "button#CybotCookiebotDialogBodyButtonDecline".to_string(),
            email_selector: "input[name=\"email\"]".to_string(),
            password_selector: "input[name=\"password\"]".to_string(),
            submit_selector: "#log_in_submit".to_string(),
        }
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        ReadinessConfig::Fixed { delay_ms: 2000 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site: SiteConfig {
                base_url: "https://helion.pl".to_string(),
                login_path: "/users/login".to_string(),
                account_info_path: "/api/users/info".to_string(),
                library_path: "/users/konto/biblioteka".to_string(),
                request_timeout_secs: 30,
                user_agent: "library-lister/0.1.0".to_string(),
            },
            scanner: ScannerConfig::default(),
            browser: BrowserConfig::default(),
            logging: LoggingConfig {
                log_dir: "logs".to_string(),
                default_level: "info".to_string(),
                console: true,
                file: true,
                json_format: false,
            },
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// If the file doesn't exist, returns the default configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration saved successfully"
        );

        Ok(())
    }
}

impl SiteConfig {
    /// Absolute URL for a site path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub fn login_url(&self) -> String {
        self.url(&self.login_path)
    }

    pub fn account_info_url(&self) -> String {
        self.url(&self.account_info_path)
    }

    /// First listing page of a library category
    pub fn category_url(&self, segment: &str) -> String {
        format!(
            "{}/{}",
            self.url(self.library_path.trim_end_matches('/')),
            segment
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.site.base_url, "https://helion.pl");
        assert_eq!(config.scanner.item_selector, "ul#listBooks li");
        assert_eq!(
            config.scanner.readiness,
            ReadinessConfig::Fixed { delay_ms: 2000 }
        );
    }

    #[test]
    fn test_save_and_load_config() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.toml");

        let mut original_config = Config::default();
        original_config.scanner.readiness = ReadinessConfig::Poll {
            interval_ms: 250,
            timeout_ms: 5000,
        };
        original_config.save(&config_path)?;

        assert!(config_path.exists());

        let loaded_config = Config::from_file(&config_path)?;
        assert_eq!(loaded_config.site.base_url, original_config.site.base_url);
        assert_eq!(
            loaded_config.scanner.readiness,
            original_config.scanner.readiness
        );

        Ok(())
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        // Should return default config without error
        assert_eq!(config.site.login_path, "/users/login");
    }

    #[test]
    fn test_scanner_section_is_optional() -> Result<()> {
        let content = r#"
            [site]
            base_url = "http://localhost:8080/"
            login_path = "/login"
            account_info_path = "/info"
            library_path = "/library/"
            request_timeout_secs = 5
            user_agent = "test"

            [logging]
            log_dir = "logs"
            default_level = "debug"
            console = false
            file = false
            json_format = false
        "#;

        let config: Config = toml::from_str(content)?;
        assert_eq!(config.scanner.title_selector, "h3.title");
        assert!(config.browser.headless);
        assert_eq!(config.browser.executable, None);
        assert_eq!(
            config.site.category_url("ebooki"),
            "http://localhost:8080/library/ebooki"
        );

        Ok(())
    }

    #[test]
    fn test_url_resolution() {
        let config = Config::default();

        assert_eq!(config.site.login_url(), "https://helion.pl/users/login");
        assert_eq!(
            config.site.account_info_url(),
            "https://helion.pl/api/users/info"
        );
        assert_eq!(
            config.site.category_url("kursy"),
            "https://helion.pl/users/konto/biblioteka/kursy"
        );
    }

    #[test]
    fn test_browser_section_overrides() -> Result<()> {
        let mut config = Config::default();
        config.browser.headless = false;
        config.browser.executable = Some("/usr/bin/chromium".to_string());

        let content = toml::to_string_pretty(&config)?;
        let loaded: Config = toml::from_str(&content)?;

        assert!(!loaded.browser.headless);
        assert_eq!(loaded.browser.executable.as_deref(), Some("/usr/bin/chromium"));
        assert_eq!(loaded.browser.submit_selector, "#log_in_submit");

        Ok(())
    }
}
