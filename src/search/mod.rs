//! Search utilities for browsing the collection.

pub mod query;
pub mod sort;

pub use sort::SortOption;

/// Lowercases text for searching. Works on any letters, not just ASCII.
pub fn fold(text: &str) -> String {
    text.to_lowercase()
}

/// What the collection list is currently showing.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CollectionFilter {
    /// Text to look for in whisky names, distilleries, and regions.
    ///
    /// Blank text matches everything.
    pub text: Option<String>,

    pub sort: SortOption,
}

impl CollectionFilter {
    pub fn new(text: impl Into<String>, sort: SortOption) -> Self {
        Self {
            text: Some(text.into()),
            sort,
        }
    }
}
