//! Paged catalog scanner.
//!
//! Walks every listing page of one library category and returns its items
//! sorted by author:
//! 1. Reload the category with the page size forced to 100
//! 2. Infer the page count from pagination links
//! 3. Extract (author, title) pairs from each page
//! 4. Sort the aggregated items

use crate::pagination::{PageCountStrategy, PaginationLinkStrategy};
use crate::readiness::Readiness;
use crate::session::{BrowsingSession, ElementHandle, SessionError};
use shared::config::ScannerConfig;
use shared::{CategoryListing, LibraryItem};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Items per page requested through `onPage`
pub const PAGE_SIZE: u32 = 100;

/// Errors that abort a scan
///
/// A scan either returns every page or fails; items collected before the
/// failure are dropped.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to load listing page {url}")]
    Navigation {
        url: String,
        #[source]
        source: SessionError,
    },

    #[error("failed to query listing page {url}")]
    Query {
        url: String,
        #[source]
        source: SessionError,
    },
}

/// CSS selectors for the parts of a listing page
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    /// One element per library item
    pub item: String,
    /// Title element inside an item
    pub title: String,
    /// Author element inside an item
    pub author: String,
}

impl SiteSelectors {
    pub fn from_config(config: &ScannerConfig) -> Self {
        Self {
            item: config.item_selector.clone(),
            title: config.title_selector.clone(),
            author: config.author_selector.clone(),
        }
    }
}

/// Receives listing output as it is finalized
pub trait ItemReporter: Send + Sync {
    /// Called once with the account summary line
    fn headline(&self, _text: &str) {}

    /// Called before a category is scanned
    fn section(&self, _title: &str) {}

    /// Called for each item of a finished listing, in sorted order
    fn item(&self, item: &LibraryItem);
}

/// Reports items to the log only
#[derive(Debug, Default)]
pub struct LogReporter;

impl ItemReporter for LogReporter {
    fn section(&self, title: &str) {
        debug!(section = %title, "Listing section");
    }

    fn item(&self, item: &LibraryItem) {
        debug!(author = %item.author, title = %item.title, "Listed item");
    }
}

/// Prints `<author> - <title>` lines to stdout
#[derive(Debug, Default)]
pub struct StdoutReporter;

impl ItemReporter for StdoutReporter {
    fn headline(&self, text: &str) {
        println!("{}", text);
    }

    fn section(&self, title: &str) {
        println!("\n{}:", title);
    }

    fn item(&self, item: &LibraryItem) {
        println!("{}", item);
    }
}

/// Scanner for the paginated listing of one category
pub struct PagedCatalogScanner<P = PaginationLinkStrategy> {
    selectors: SiteSelectors,
    strategy: P,
    readiness: Readiness,
    reporter: Arc<dyn ItemReporter>,
}

impl PagedCatalogScanner<PaginationLinkStrategy> {
    /// Create a scanner for the site markup described in the configuration
    pub fn from_config(config: &ScannerConfig) -> Self {
        Self::new(
            SiteSelectors::from_config(config),
            PaginationLinkStrategy::new(config.pagination_link_prefix.as_str()),
            Readiness::from_config(&config.readiness, &config.item_selector),
        )
    }
}

impl<P: PageCountStrategy> PagedCatalogScanner<P> {
    pub fn new(selectors: SiteSelectors, strategy: P, readiness: Readiness) -> Self {
        Self {
            selectors,
            strategy,
            readiness,
            reporter: Arc::new(LogReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ItemReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn reporter(&self) -> &Arc<dyn ItemReporter> {
        &self.reporter
    }

    /// Scan all pages of the category whose first page is `base_url`
    ///
    /// The session must already be authenticated.
    pub async fn scan<S: BrowsingSession>(
        &self,
        session: &mut S,
        base_url: &str,
    ) -> Result<CategoryListing, ScanError> {
        info!(url = %base_url, "Scanning category");

        navigate(session, base_url).await?;
        let sized_url = with_query_param(base_url, "onPage", PAGE_SIZE);
        navigate(session, &sized_url).await?;

        self.readiness
            .settle(&*session)
            .await
            .map_err(|source| ScanError::Query {
                url: sized_url.clone(),
                source,
            })?;

        let listing_url = session.current_url().to_string();
        let total_pages = self.discover_page_count(&*session).await?;
        info!(url = %listing_url, total_pages, "Discovered listing pages");

        let mut extracted = Vec::new();
        for page in 1..=total_pages {
            let page_url = with_query_param(&listing_url, "page", page);
            navigate(session, &page_url).await?;

            let items = self.extract_page(&*session, &page_url).await?;
            debug!(page, items = items.len(), "Extracted listing page");
            extracted.extend(items);
        }

        let listing = CategoryListing::from_extracted(extracted);
        for item in &listing {
            self.reporter.item(item);
        }

        info!(url = %base_url, items = listing.len(), "Category scanned");
        Ok(listing)
    }

    async fn discover_page_count<S: BrowsingSession>(&self, session: &S) -> Result<u32, ScanError> {
        let url = session.current_url();
        let query_error = |source| ScanError::Query {
            url: url.to_string(),
            source,
        };

        let links = session
            .query_all(&self.strategy.link_selector())
            .await
            .map_err(query_error)?;

        let mut hrefs = Vec::with_capacity(links.len());
        for link in &links {
            if let Some(href) = link.get_attribute("href").await.map_err(query_error)? {
                hrefs.push(href);
            }
        }

        let index = self.strategy.page_index(&hrefs);
        if index.is_empty() {
            debug!(url = %url, links = links.len(), "No pagination links, assuming one page");
        }

        Ok(index.total_pages())
    }

    async fn extract_page<S: BrowsingSession>(
        &self,
        session: &S,
        page_url: &str,
    ) -> Result<Vec<LibraryItem>, ScanError> {
        let query_error = |source| ScanError::Query {
            url: page_url.to_string(),
            source,
        };

        let elements = session
            .query_all(&self.selectors.item)
            .await
            .map_err(query_error)?;

        let mut items = Vec::with_capacity(elements.len());
        for element in &elements {
            let title = field_text(element, &self.selectors.title)
                .await
                .map_err(query_error)?;
            let author = field_text(element, &self.selectors.author)
                .await
                .map_err(query_error)?;

            match (author, title) {
                (Some(author), Some(title)) => items.push(LibraryItem::new(author, title)),
                (author, title) => {
                    debug!(
                        url = %page_url,
                        has_author = author.is_some(),
                        has_title = title.is_some(),
                        "Skipping incomplete item"
                    );
                }
            }
        }

        Ok(items)
    }
}

async fn navigate<S: BrowsingSession>(session: &mut S, url: &str) -> Result<(), ScanError> {
    session
        .goto(url)
        .await
        .map_err(|source| ScanError::Navigation {
            url: url.to_string(),
            source,
        })
}

/// Trimmed text of the first descendant matching `selector`, if non-empty
async fn field_text<E: ElementHandle>(
    element: &E,
    selector: &str,
) -> Result<Option<String>, SessionError> {
    let Some(field) = element.query_selector(selector).await? else {
        return Ok(None);
    };

    let text = field.inner_text().await?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}

/// Append `key=value` to a URL's query string
pub fn with_query_param(url: &str, key: &str, value: impl std::fmt::Display) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", url, separator, key, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fixture::{listing_page, FixtureSession};
    use std::sync::Mutex;
    use std::time::Duration;

    const BASE: &str = "https://shop.test/users/konto/biblioteka/ebooki";
    const SIZED: &str = "https://shop.test/users/konto/biblioteka/ebooki?onPage=100";

    fn page_url(page: u32) -> String {
        format!("{}&page={}", SIZED, page)
    }

    fn link(page: &str) -> String {
        format!("/users/konto/biblioteka/ebooki?onPage=100&page={}", page)
    }

    fn scanner() -> PagedCatalogScanner {
        PagedCatalogScanner::from_config(&ScannerConfig::default())
    }

    /// Session where the sized page doubles as page 1
    fn session_with_pages(pages: &[String]) -> FixtureSession {
        let mut session = FixtureSession::new()
            .with_page(BASE, "<html></html>")
            .with_page(SIZED, pages[0].clone());
        for (idx, body) in pages.iter().enumerate() {
            session = session.with_page(&page_url(idx as u32 + 1), body.clone());
        }
        session
    }

    fn pairs(listing: &CategoryListing) -> Vec<(&str, &str)> {
        listing
            .iter()
            .map(|item| (item.author.as_str(), item.title.as_str()))
            .collect()
    }

    #[derive(Default)]
    struct CollectingReporter {
        lines: Mutex<Vec<String>>,
    }

    impl ItemReporter for CollectingReporter {
        fn item(&self, item: &LibraryItem) {
            self.lines.lock().unwrap().push(item.to_string());
        }
    }

    #[tokio::test]
    async fn test_two_page_category() {
        let links = [link("1"), link("2")];
        let links: Vec<&str> = links.iter().map(String::as_str).collect();
        let pages = vec![
            listing_page(
                &[(Some("Zoe"), Some("Book A")), (Some("anna"), Some("Book B"))],
                &links,
            ),
            listing_page(&[(Some("Marek"), Some("Book C"))], &links),
        ];
        let mut session = session_with_pages(&pages);
        let reporter = Arc::new(CollectingReporter::default());
        let scanner = scanner().with_reporter(reporter.clone());

        let listing = scanner.scan(&mut session, BASE).await.unwrap();

        assert_eq!(
            pairs(&listing),
            vec![("anna", "Book B"), ("Marek", "Book C"), ("Zoe", "Book A")]
        );
        assert_eq!(
            *reporter.lines.lock().unwrap(),
            vec!["anna - Book B", "Marek - Book C", "Zoe - Book A"]
        );
        assert_eq!(
            session.visited,
            vec![BASE.to_string(), SIZED.to_string(), page_url(1), page_url(2)]
        );
        assert_eq!(session.waits(), vec![Duration::from_millis(2000)]);
    }

    #[tokio::test]
    async fn test_visits_up_to_highest_linked_page() {
        let links = [link("1"), link("3"), link("7")];
        let links: Vec<&str> = links.iter().map(String::as_str).collect();
        let pages: Vec<String> = (1..=7)
            .map(|n| {
                let title = format!("Book {}", n);
                listing_page(&[(Some("Author"), Some(title.as_str()))], &links)
            })
            .collect();
        let mut session = session_with_pages(&pages).with_page(&page_url(8), "<html></html>");

        let listing = scanner().scan(&mut session, BASE).await.unwrap();

        let visited_pages: Vec<String> = session.visited[2..].to_vec();
        assert_eq!(visited_pages, (1..=7).map(page_url).collect::<Vec<_>>());
        // equal authors keep page order
        let titles: Vec<&str> = listing.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Book 1", "Book 2", "Book 3", "Book 4", "Book 5", "Book 6", "Book 7"]
        );
    }

    #[tokio::test]
    async fn test_no_pagination_visits_one_page() {
        let pages = vec![listing_page(&[(Some("Nowak"), Some("Jedyna"))], &[])];
        let mut session = session_with_pages(&pages);

        let listing = scanner().scan(&mut session, BASE).await.unwrap();

        assert_eq!(pairs(&listing), vec![("Nowak", "Jedyna")]);
        assert_eq!(session.visited.len(), 3);
        assert_eq!(session.visited[2], page_url(1));
    }

    #[tokio::test]
    async fn test_links_outside_library_are_ignored() {
        let pages = vec![listing_page(
            &[(Some("Nowak"), Some("Jedyna"))],
            &["/promocje?page=9", "https://elsewhere.test/users/konto/biblioteka/x?page=4"],
        )];
        let mut session = session_with_pages(&pages);

        scanner().scan(&mut session, BASE).await.unwrap();

        assert_eq!(session.visited.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_category() {
        let pages = vec![listing_page(&[], &[])];
        let mut session = session_with_pages(&pages);

        let listing = scanner().scan(&mut session, BASE).await.unwrap();

        assert!(listing.is_empty());
    }

    #[tokio::test]
    async fn test_incomplete_items_are_skipped() {
        let pages = vec![listing_page(
            &[
                (Some("Celina"), Some("Pierwsza")),
                (Some("   "), Some("Bez autora")),
                (None, Some("Brak elementu")),
                (Some("Adam"), None),
                (Some("Adam"), Some("  ")),
                (Some("Bogdan"), Some("Druga")),
            ],
            &[],
        )];
        let mut session = session_with_pages(&pages);

        let listing = scanner().scan(&mut session, BASE).await.unwrap();

        assert_eq!(
            pairs(&listing),
            vec![("Bogdan", "Druga"), ("Celina", "Pierwsza")]
        );
    }

    #[tokio::test]
    async fn test_values_are_trimmed() {
        let pages = vec![listing_page(&[(Some("  Ewa  "), Some("\n Tytuł \n"))], &[])];
        let mut session = session_with_pages(&pages);

        let listing = scanner().scan(&mut session, BASE).await.unwrap();

        assert_eq!(pairs(&listing), vec![("Ewa", "Tytuł")]);
    }

    #[tokio::test]
    async fn test_line_breaks_inside_fields_become_spaces() {
        let pages = vec![listing_page(
            &[(Some("Jan Kowalski<br>Anna Nowak"), Some("Rust<br/>w praktyce"))],
            &[],
        )];
        let mut session = session_with_pages(&pages);

        let listing = scanner().scan(&mut session, BASE).await.unwrap();

        assert_eq!(
            pairs(&listing),
            vec![("Jan Kowalski Anna Nowak", "Rust w praktyce")]
        );
    }

    #[tokio::test]
    async fn test_table_rows_as_items() {
        let config = ScannerConfig {
            item_selector: "table#library tr".to_string(),
            title_selector: "td.title".to_string(),
            author_selector: "td.author".to_string(),
            ..ScannerConfig::default()
        };
        let page = r#"<table id="library">
            <tr><td class="title">Czysty kod</td><td class="author">Martin</td></tr>
            <tr><td class="title">Wzorce projektowe</td><td class="author">Gamma</td></tr>
        </table>"#
            .to_string();
        let mut session = session_with_pages(&[page]);

        let listing = PagedCatalogScanner::from_config(&config)
            .scan(&mut session, BASE)
            .await
            .unwrap();

        assert_eq!(
            pairs(&listing),
            vec![("Gamma", "Wzorce projektowe"), ("Martin", "Czysty kod")]
        );
    }

    #[tokio::test]
    async fn test_navigation_failure_aborts_scan() {
        let links = [link("1"), link("2")];
        let links: Vec<&str> = links.iter().map(String::as_str).collect();
        let first = listing_page(&[(Some("Zoe"), Some("Book A"))], &links);
        // page 2 is missing
        let mut session = FixtureSession::new()
            .with_page(BASE, "<html></html>")
            .with_page(SIZED, first.clone())
            .with_page(&page_url(1), first);
        let reporter = Arc::new(CollectingReporter::default());

        let result = scanner()
            .with_reporter(reporter.clone())
            .scan(&mut session, BASE)
            .await;

        match result {
            Err(ScanError::Navigation { url, .. }) => assert_eq!(url, page_url(2)),
            other => panic!("expected navigation error, got {:?}", other),
        }
        assert!(reporter.lines.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_base_url_failure_aborts_scan() {
        let mut session = FixtureSession::new();

        let result = scanner().scan(&mut session, BASE).await;

        assert!(matches!(result, Err(ScanError::Navigation { .. })));
        assert_eq!(session.visited, vec![BASE.to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_selector_is_query_error() {
        let mut config = ScannerConfig::default();
        config.item_selector = "ul[[".to_string();
        config.readiness = shared::config::ReadinessConfig::Fixed { delay_ms: 0 };
        let pages = vec![listing_page(&[], &[])];
        let mut session = session_with_pages(&pages);

        let result = PagedCatalogScanner::from_config(&config)
            .scan(&mut session, BASE)
            .await;

        assert!(matches!(result, Err(ScanError::Query { .. })));
    }

    #[test]
    fn test_with_query_param() {
        assert_eq!(with_query_param(BASE, "onPage", PAGE_SIZE), SIZED);
        assert_eq!(with_query_param(SIZED, "page", 3), page_url(3));
    }
}
