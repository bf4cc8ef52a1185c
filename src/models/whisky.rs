use camino::Utf8PathBuf;
use sqlx::{query::Query, sqlite::SqliteArguments, Sqlite};
use uuid::Uuid;

use crate::{database::InsertIntoTable, search::fold};

use super::tasting::TastingEntry;

/// A bottle, independent of any tasting session.
#[derive(
    Clone, Debug, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize, sqlx::FromRow,
)]
pub struct Whisky {
    /// Unique ID identifying this bottle. Assigned once, at creation.
    pub id: Uuid,

    pub distillery: String,
    pub country: String,
    pub region: String,
    pub whisky_name: String,
    pub batch_code: String,

    /// Age statement, in years.
    pub age: Option<i32>,
    pub bottling_year: Option<i32>,

    /// Alcohol by volume, in percent.
    pub abv: Option<f64>,
    pub cask_type: Option<String>,

    /// Absolute path to a photo of the bottle, if the user took one.
    pub photo_path: Option<String>,
}

impl Whisky {
    /// Creates a whisky with a fresh id and none of the optional details.
    pub fn new(distillery: impl Into<String>, whisky_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            distillery: distillery.into(),
            country: String::new(),
            region: String::new(),
            whisky_name: whisky_name.into(),
            batch_code: String::new(),
            age: None,
            bottling_year: None,
            abv: None,
            cask_type: None,
            photo_path: None,
        }
    }

    /// Grabs the path of the bottle photo, if any.
    pub fn photo_path(&self) -> Option<Utf8PathBuf> {
        self.photo_path.clone().map(Utf8PathBuf::from)
    }

    /// What makes two records the same bottle, ignoring ids.
    pub fn natural_key(&self) -> BottleKey {
        bottle_key(&self.distillery, &self.whisky_name)
    }
}

/// Distillery and name, both lowercased.
pub type BottleKey = (String, String);

/// The natural key for a bottle with the given distillery and name.
///
/// Imports match whiskies on this, so "TALISKER" finds "Talisker".
pub fn bottle_key(distillery: &str, whisky_name: &str) -> BottleKey {
    (distillery.to_lowercase(), whisky_name.to_lowercase())
}

impl InsertIntoTable for Whisky {
    fn make_insertion_query(&self) -> Query<'_, Sqlite, SqliteArguments<'_>> {
        // NOTE: if changing `WHISKIES_TABLE`, also change this!
        self.bind_all(sqlx::query(
            r#"
            INSERT INTO whiskies
            (id, distillery, country, region, whisky_name, batch_code, age, bottling_year,
             abv, cask_type, photo_path, distillery_folded, region_folded, whisky_name_folded)
            VALUES
            ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14);
            "#,
        ))
    }
}

impl Whisky {
    /// Like [`InsertIntoTable::make_insertion_query`], but updates the row in
    /// place when the whisky already exists.
    pub(crate) fn make_upsert_query(&self) -> Query<'_, Sqlite, SqliteArguments<'_>> {
        self.bind_all(sqlx::query(
            r#"
            INSERT INTO whiskies
            (id, distillery, country, region, whisky_name, batch_code, age, bottling_year,
             abv, cask_type, photo_path, distillery_folded, region_folded, whisky_name_folded)
            VALUES
            ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT(id)
            DO UPDATE SET
                distillery = excluded.distillery,
                country = excluded.country,
                region = excluded.region,
                whisky_name = excluded.whisky_name,
                batch_code = excluded.batch_code,
                age = excluded.age,
                bottling_year = excluded.bottling_year,
                abv = excluded.abv,
                cask_type = excluded.cask_type,
                photo_path = excluded.photo_path,
                distillery_folded = excluded.distillery_folded,
                region_folded = excluded.region_folded,
                whisky_name_folded = excluded.whisky_name_folded;
            "#,
        ))
    }

    /// Binds every column, in the order the queries above list them.
    fn bind_all<'q>(
        &'q self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        query
            .bind(self.id)
            .bind(&self.distillery)
            .bind(&self.country)
            .bind(&self.region)
            .bind(&self.whisky_name)
            .bind(&self.batch_code)
            .bind(self.age)
            .bind(self.bottling_year)
            .bind(self.abv)
            .bind(&self.cask_type)
            .bind(&self.photo_path)
            .bind(fold(&self.distillery))
            .bind(fold(&self.region))
            .bind(fold(&self.whisky_name))
    }
}

/// A whisky, alongside every tasting of it.
#[derive(Clone, Debug, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
pub struct WhiskyWithTastings {
    pub whisky: Whisky,
    pub tastings: Vec<TastingEntry>,
}

impl WhiskyWithTastings {
    /// The best effective score among this whisky's tastings.
    pub fn best_score(&self) -> Option<f64> {
        self.tastings
            .iter()
            .map(TastingEntry::effective_overall_score)
            .max_by(f64::total_cmp)
    }

    /// The worst effective score among this whisky's tastings.
    pub fn worst_score(&self) -> Option<f64> {
        self.tastings
            .iter()
            .map(TastingEntry::effective_overall_score)
            .min_by(f64::total_cmp)
    }

    /// The mean effective score, or `None` for an untasted whisky.
    pub fn average_score(&self) -> Option<f64> {
        if self.tastings.is_empty() {
            return None;
        }

        let sum: f64 = self
            .tastings
            .iter()
            .map(TastingEntry::effective_overall_score)
            .sum();
        Some(sum / self.tastings.len() as f64)
    }
}
