//! Page count discovery.
//!
//! The listing pages carry no page count, so it is inferred from the
//! pagination links rendered on the first page.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static PAGE_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[?&;])page=([^&#;]*)").expect("page parameter pattern is valid"));

/// Page numbers seen in pagination links
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageIndex {
    pages: BTreeSet<u32>,
}

impl PageIndex {
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Highest page number seen, or 1 when there were no pagination links
    pub fn total_pages(&self) -> u32 {
        self.pages.iter().next_back().copied().unwrap_or(1).max(1)
    }
}

impl FromIterator<u32> for PageIndex {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self {
            pages: iter.into_iter().collect(),
        }
    }
}

/// Strategy for inferring how many listing pages a category has
pub trait PageCountStrategy: Send + Sync {
    /// Selector for the elements whose `href` carries pagination
    fn link_selector(&self) -> String;

    /// Build the page index from the hrefs of the matched links
    fn page_index(&self, hrefs: &[String]) -> PageIndex;
}

/// Reads `page=<N>` from links under the account library path
#[derive(Debug, Clone)]
pub struct PaginationLinkStrategy {
    link_prefix: String,
}

impl PaginationLinkStrategy {
    pub fn new(link_prefix: impl Into<String>) -> Self {
        Self {
            link_prefix: link_prefix.into(),
        }
    }
}

impl PageCountStrategy for PaginationLinkStrategy {
    fn link_selector(&self) -> String {
        format!("a[href^=\"{}\"]", self.link_prefix)
    }

    fn page_index(&self, hrefs: &[String]) -> PageIndex {
        hrefs.iter().filter_map(|href| page_number(href)).collect()
    }
}

/// Value of the `page` query parameter, if present and numeric
pub fn page_number(href: &str) -> Option<u32> {
    let value = PAGE_PARAM.captures(href)?.get(1)?.as_str();
    match value.parse() {
        Ok(page) => Some(page),
        Err(_) => {
            tracing::debug!(href = %href, "Ignoring malformed page parameter");
            None
        }
    }
}
