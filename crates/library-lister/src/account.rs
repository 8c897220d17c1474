//! Account library counters.

use crate::session::{AccountSession, SessionError};
use serde::{Deserialize, Serialize};
use shared::Category;
use tracing::info;

/// Response of the account info endpoint
#[derive(Debug, Clone, Deserialize)]
struct AccountInfo {
    #[serde(default)]
    biblioteka: LibrarySummary,
}

/// Number of owned items per library section
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySummary {
    #[serde(default)]
    pub ebooks: u32,
    #[serde(default)]
    pub audiobooks: u32,
    #[serde(default)]
    pub courses: u32,
    #[serde(default)]
    pub addition: u32,
}

impl LibrarySummary {
    pub fn count(&self, category: Category) -> u32 {
        match category {
            Category::Ebooks => self.ebooks,
            Category::Audiobooks => self.audiobooks,
            Category::Courses => self.courses,
        }
    }

    /// One-line summary listing the non-empty sections
    ///
    /// An empty library leaves the line with just the site prefix.
    pub fn headline(&self) -> String {
        let parts: Vec<String> = [
            ("ebooki", self.ebooks),
            ("audiobooki", self.audiobooks),
            ("kursy", self.courses),
            ("dodatki", self.addition),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(name, count)| format!("{}: {}", name, count))
        .collect();

        format!("helion.pl - {}", parts.join(", "))
    }
}

/// Read the library counters of the logged-in account
pub async fn fetch_summary<S: AccountSession>(
    session: &S,
    url: &str,
) -> Result<LibrarySummary, SessionError> {
    let value = session.fetch_json_value(url).await?;
    let info: AccountInfo = serde_json::from_value(value).map_err(|source| SessionError::Json {
        url: url.to_string(),
        source,
    })?;
    let summary = info.biblioteka;

    info!(
        ebooks = summary.ebooks,
        audiobooks = summary.audiobooks,
        courses = summary.courses,
        addition = summary.addition,
        "Library summary"
    );

    Ok(summary)
}
