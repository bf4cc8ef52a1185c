//! Helps to sort the collection.

use chrono::NaiveDate;

use crate::models::WhiskyWithTastings;

/// Different sorts users can apply to the collection list.
///
/// Every sort is stable, so whiskies that compare equal keep the order the
/// search gave them (name, then id).
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum SortOption {
    /// Most recently tasted first. Untasted whiskies go last.
    #[default]
    DateDesc,
    /// Earliest first tasting first. Untasted whiskies go first.
    DateAsc,
    NameAsc,
    DistilleryAsc,
    /// Best effective score first.
    RatingDesc,
    /// Lowest effective score first.
    RatingAsc,
}

impl SortOption {
    /// Sorts the given whiskies in place.
    pub fn apply(&self, whiskies: &mut [WhiskyWithTastings]) {
        match self {
            SortOption::DateDesc => whiskies.sort_by(|a, b| latest(b).cmp(&latest(a))),
            SortOption::DateAsc => whiskies.sort_by(|a, b| earliest(a).cmp(&earliest(b))),
            SortOption::NameAsc => whiskies.sort_by(|a, b| {
                a.whisky
                    .whisky_name
                    .to_lowercase()
                    .cmp(&b.whisky.whisky_name.to_lowercase())
            }),
            SortOption::DistilleryAsc => whiskies.sort_by(|a, b| {
                a.whisky
                    .distillery
                    .to_lowercase()
                    .cmp(&b.whisky.distillery.to_lowercase())
            }),
            SortOption::RatingDesc => whiskies.sort_by(|a, b| best(b).total_cmp(&best(a))),
            SortOption::RatingAsc => whiskies.sort_by(|a, b| worst(a).total_cmp(&worst(b))),
        }
    }
}

fn latest(w: &WhiskyWithTastings) -> Option<NaiveDate> {
    w.tastings.iter().map(|t| t.date).max()
}

fn earliest(w: &WhiskyWithTastings) -> Option<NaiveDate> {
    w.tastings.iter().map(|t| t.date).min()
}

// untasted whiskies rate as zero
fn best(w: &WhiskyWithTastings) -> f64 {
    w.best_score().unwrap_or(0.0)
}

fn worst(w: &WhiskyWithTastings) -> f64 {
    w.worst_score().unwrap_or(0.0)
}
