//! Data models for the project.
//!
//! This module defines the records extracted from an account library and the
//! library categories the site exposes.

use serde::{Deserialize, Serialize};

/// One purchased item as shown in a library listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryItem {
    pub author: String,
    pub title: String,
}

impl LibraryItem {
    pub fn new(author: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            title: title.into(),
        }
    }

    /// Key used to order items within a listing
    pub fn sort_key(&self) -> String {
        self.author.to_lowercase()
    }
}

impl std::fmt::Display for LibraryItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.author, self.title)
    }
}

/// Items of one category, ordered by author
///
/// The ordering is case-insensitive and stable: items whose authors compare
/// equal keep the order in which they were extracted. Duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryListing {
    items: Vec<LibraryItem>,
}

impl CategoryListing {
    /// Build a listing from items in extraction order
    pub fn from_extracted(mut items: Vec<LibraryItem>) -> Self {
        // sort_by_cached_key is stable
        items.sort_by_cached_key(LibraryItem::sort_key);
        Self { items }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LibraryItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

}

impl<'a> IntoIterator for &'a CategoryListing {
    type Item = &'a LibraryItem;
    type IntoIter = std::slice::Iter<'a, LibraryItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Library section of an account
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Ebooks,
    Audiobooks,
    Courses,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Ebooks, Category::Audiobooks, Category::Courses];

    /// Path segment of the category under the account library path
    pub fn path_segment(&self) -> &'static str {
        match self {
            Category::Ebooks => "ebooki",
            Category::Audiobooks => "audiobooki",
            Category::Courses => "kursy",
        }
    }

    /// Section label as the site names it
    pub fn label(&self) -> &'static str {
        match self {
            Category::Ebooks => "Ebooki",
            Category::Audiobooks => "Audiobooki",
            Category::Courses => "Kursy",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Ebooks => write!(f, "ebooks"),
            Category::Audiobooks => write!(f, "audiobooks"),
            Category::Courses => write!(f, "courses"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ebooks" => Ok(Category::Ebooks),
            "audiobooks" => Ok(Category::Audiobooks),
            "courses" => Ok(Category::Courses),
            _ => Err(anyhow::anyhow!("Invalid category: {}", s)),
        }
    }
}
