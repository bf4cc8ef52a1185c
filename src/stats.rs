//! Aggregate numbers about the whole collection.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::models::{tasting::round_to_half, AromaTagCount, WhiskyWithTastings};

/// How many whiskies the "best whiskies" list holds.
pub const TOP_WHISKIES: usize = 5;
/// How many regions the region breakdown holds.
pub const TOP_REGIONS: usize = 8;
/// How many aroma tags the statistics ask the database for.
pub const TOP_AROMAS: u32 = 10;

/// Averages over every tasting in the collection, rounded to half points.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct AverageScores {
    pub nose: f64,
    pub palate: f64,
    pub finish: f64,
    pub overall: f64,
}

/// One whisky in the "best whiskies" list.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct RankedWhisky {
    pub id: Uuid,
    pub distillery: String,
    pub whisky_name: String,
    /// Mean effective score of its tastings. Not rounded.
    pub average_score: f64,
    pub tasting_count: usize,
}

/// Everything the statistics screen shows.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct CollectionStats {
    pub whisky_count: usize,
    pub tasting_count: usize,
    pub distillery_count: usize,
    pub country_count: usize,

    /// `None` until something's been tasted.
    pub averages: Option<AverageScores>,

    pub top_whiskies: Vec<RankedWhisky>,

    /// Whisky counts per country, biggest first. Blank countries are
    /// counted as "Unknown".
    pub by_country: Vec<(String, usize)>,

    /// Whisky counts per region, biggest first. Blank regions are left out.
    pub by_region: Vec<(String, usize)>,

    pub top_aromas: Vec<AromaTagCount>,
}

impl CollectionStats {
    /// Crunches the numbers for the given collection.
    ///
    /// `top_aromas` comes straight from the database, since tag usage isn't
    /// part of [`WhiskyWithTastings`].
    pub fn compute(collection: &[WhiskyWithTastings], top_aromas: Vec<AromaTagCount>) -> Self {
        let tastings = || collection.iter().flat_map(|w| w.tastings.iter());
        let tasting_count = tastings().count();

        let distillery_count = distinct_non_blank(collection.iter().map(|w| &w.whisky.distillery));
        let country_count = distinct_non_blank(collection.iter().map(|w| &w.whisky.country));

        let averages = (tasting_count > 0).then(|| {
            let n = tasting_count as f64;
            let mean = |f: fn(&crate::models::TastingEntry) -> f64| {
                round_to_half(tastings().map(f).sum::<f64>() / n)
            };

            AverageScores {
                nose: mean(|t| t.nose_score),
                palate: mean(|t| t.palate_score),
                finish: mean(|t| t.finish_score),
                overall: mean(|t| t.effective_overall_score()),
            }
        });

        let mut top_whiskies: Vec<RankedWhisky> = collection
            .iter()
            .filter_map(|w| {
                w.average_score().map(|average_score| RankedWhisky {
                    id: w.whisky.id,
                    distillery: w.whisky.distillery.clone(),
                    whisky_name: w.whisky.whisky_name.clone(),
                    average_score,
                    tasting_count: w.tastings.len(),
                })
            })
            .collect();
        top_whiskies.sort_by(|a, b| b.average_score.total_cmp(&a.average_score));
        top_whiskies.truncate(TOP_WHISKIES);

        let by_country = count_by(collection.iter().map(|w| {
            let country = w.whisky.country.trim();
            if country.is_empty() {
                "Unknown".to_string()
            } else {
                country.to_string()
            }
        }));

        let mut by_region = count_by(
            collection
                .iter()
                .map(|w| w.whisky.region.trim())
                .filter(|r| !r.is_empty())
                .map(str::to_string),
        );
        by_region.truncate(TOP_REGIONS);

        Self {
            whisky_count: collection.len(),
            tasting_count,
            distillery_count,
            country_count,
            averages,
            top_whiskies,
            by_country,
            by_region,
            top_aromas,
        }
    }
}

fn distinct_non_blank<'a>(values: impl Iterator<Item = &'a String>) -> usize {
    values
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect::<HashSet<_>>()
        .len()
}

/// Counts each key, biggest count first. Ties keep first-seen order.
fn count_by(keys: impl Iterator<Item = String>) -> Vec<(String, usize)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();

    for key in keys {
        match index.get(&key) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(key.clone(), counts.len());
                counts.push((key, 1));
            }
        }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}
