//! Library lister for fetching the purchased items of a bookseller account.
//!
//! This library logs into the account through a headless browser or a plain
//! HTTP session, reads its library counters, and walks the paginated library
//! views of each category into sorted listings.

pub mod account;
pub mod lister;
pub mod pagination;
pub mod readiness;
pub mod scanner;
pub mod session;

pub use account::LibrarySummary;
pub use lister::{CategoryReport, LibraryLister, ListerReport};
pub use pagination::{PageCountStrategy, PageIndex, PaginationLinkStrategy};
pub use readiness::Readiness;
pub use scanner::{ItemReporter, LogReporter, PagedCatalogScanner, ScanError, StdoutReporter};
pub use session::{
    AccountSession, BrowserElement, BrowserSession, BrowsingSession, ElementHandle, HttpSession,
    SessionError,
};
