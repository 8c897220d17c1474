//! Library lister orchestrator.
//!
//! Reads the account's library counters, then scans each requested category
//! that has items.

use crate::account::{self, LibrarySummary};
use crate::scanner::PagedCatalogScanner;
use crate::session::{AccountSession, HttpSession};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::config::SiteConfig;
use shared::{Category, CategoryListing};
use tracing::{error, info};

/// Listing of one category
#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub category: Category,
    pub items: CategoryListing,
}

/// Result of a lister run
#[derive(Debug, Clone, Serialize)]
pub struct ListerReport {
    pub generated_at: DateTime<Utc>,
    pub summary: LibrarySummary,
    pub categories: Vec<CategoryReport>,
    pub failed: Vec<Category>,
}

impl ListerReport {
    pub fn total_items(&self) -> usize {
        self.categories.iter().map(|report| report.items.len()).sum()
    }
}

/// Lists the library of an authenticated session
pub struct LibraryLister<S = HttpSession> {
    session: S,
    scanner: PagedCatalogScanner,
    site: SiteConfig,
}

impl<S: AccountSession> LibraryLister<S> {
    pub fn new(session: S, scanner: PagedCatalogScanner, site: SiteConfig) -> Self {
        Self {
            session,
            scanner,
            site,
        }
    }

    /// Give the session back, e.g. to close it
    pub fn into_session(self) -> S {
        self.session
    }

    /// Categories to scan: the requested ones (all when empty) that have items
    pub fn select_categories(summary: &LibrarySummary, requested: &[Category]) -> Vec<Category> {
        let requested: &[Category] = if requested.is_empty() {
            &Category::ALL
        } else {
            requested
        };

        let mut selected = Vec::new();
        for &category in requested {
            if summary.count(category) > 0 && !selected.contains(&category) {
                selected.push(category);
            }
        }
        selected
    }

    /// Read the library counters and scan the selected categories
    ///
    /// A category whose scan fails is reported in `failed`; the others still
    /// run.
    pub async fn run(&mut self, requested: &[Category]) -> Result<ListerReport> {
        info!("Starting library listing");

        let summary = account::fetch_summary(&self.session, &self.site.account_info_url())
            .await
            .context("Failed to read library summary")?;

        self.scanner.reporter().headline(&summary.headline());

        let categories = Self::select_categories(&summary, requested);
        info!(categories = categories.len(), "Selected categories");

        let mut report = ListerReport {
            generated_at: Utc::now(),
            summary,
            categories: Vec::with_capacity(categories.len()),
            failed: Vec::new(),
        };

        for (idx, category) in categories.iter().enumerate() {
            info!(
                progress = format!("{}/{}", idx + 1, categories.len()),
                category = %category,
                expected = summary.count(*category),
                "Processing category"
            );

            self.scanner.reporter().section(category.label());
            let url = self.site.category_url(category.path_segment());

            match self.scanner.scan(&mut self.session, &url).await {
                Ok(items) => report.categories.push(CategoryReport {
                    category: *category,
                    items,
                }),
                Err(e) => {
                    error!(
                        category = %category,
                        error = format!("{:#}", anyhow::Error::from(e)),
                        "Failed to scan category"
                    );
                    report.failed.push(*category);
                }
            }
        }

        info!(
            categories = report.categories.len(),
            items = report.total_items(),
            failed = report.failed.len(),
            "Library listing complete"
        );

        Ok(report)
    }
}
