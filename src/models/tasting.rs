use camino::Utf8PathBuf;
use chrono::NaiveDate;
use sqlx::{query::Query, sqlite::SqliteArguments, Sqlite};
use uuid::Uuid;

use crate::database::InsertIntoTable;

/// How much the nose counts towards the automatic overall score.
pub const NOSE_WEIGHT: f64 = 0.3;
/// How much the palate counts towards the automatic overall score.
pub const PALATE_WEIGHT: f64 = 0.5;
/// How much the finish counts towards the automatic overall score.
pub const FINISH_WEIGHT: f64 = 0.2;

/// Computes the automatic overall score from the three component scores.
pub fn compute_overall_score_auto(nose: f64, palate: f64, finish: f64) -> f64 {
    NOSE_WEIGHT * nose + PALATE_WEIGHT * palate + FINISH_WEIGHT * finish
}

/// Rounds a score to the nearest half point, for display.
pub fn round_to_half(score: f64) -> f64 {
    (score * 2.0).round() / 2.0
}

/// One dated tasting session of a whisky.
#[derive(
    Clone, Debug, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize, sqlx::FromRow,
)]
pub struct TastingEntry {
    pub id: Uuid,

    /// The whisky this tasting belongs to.
    pub whisky_id: Uuid,

    /// The calendar day of the tasting.
    pub date: NaiveDate,

    /// A free label, like "at Ben's" or "second pour". May be empty.
    ///
    /// Together with `whisky_id` and `date`, this should be unique.
    pub alias: String,

    /// Free-form, since people write prices in all sorts of ways.
    pub price: String,

    /// 1 to 10.
    pub nose_score: f64,
    /// 1 to 10.
    pub palate_score: f64,
    /// 1 to 10.
    pub finish_score: f64,

    /// Derived from the component scores. Never recomputed in place.
    pub overall_score_auto: f64,

    /// The user's own overall score, when they disagree with the formula.
    pub overall_score_user: Option<f64>,

    pub nose_notes: Option<String>,
    pub palate_notes: Option<String>,
    pub finish_notes: Option<String>,

    /// Absolute path to the bottle photo taken for this session.
    pub bottle_photo_path: Option<String>,
}

impl TastingEntry {
    /// Creates a tasting with a fresh id. The automatic overall score is
    /// computed from the given component scores.
    pub fn new(
        whisky_id: Uuid,
        date: NaiveDate,
        alias: impl Into<String>,
        nose_score: f64,
        palate_score: f64,
        finish_score: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            whisky_id,
            date,
            alias: alias.into(),
            price: String::new(),
            nose_score,
            palate_score,
            finish_score,
            overall_score_auto: compute_overall_score_auto(nose_score, palate_score, finish_score),
            overall_score_user: None,
            nose_notes: None,
            palate_notes: None,
            finish_notes: None,
            bottle_photo_path: None,
        }
    }

    /// The user's override if there is one. Otherwise, the automatic score.
    pub fn effective_overall_score(&self) -> f64 {
        self.overall_score_user.unwrap_or(self.overall_score_auto)
    }

    /// Grabs the path of the bottle photo, if any.
    pub fn bottle_photo_path(&self) -> Option<Utf8PathBuf> {
        self.bottle_photo_path.clone().map(Utf8PathBuf::from)
    }

    /// What makes two tastings the same session, ignoring ids.
    pub fn natural_key(&self) -> SessionKey {
        session_key(self.whisky_id, self.date, &self.alias)
    }
}

/// Whisky, day, and alias of a tasting.
pub type SessionKey = (Uuid, NaiveDate, String);

/// The natural key for a tasting of the given whisky, day, and alias.
///
/// The alias is compared exactly.
pub fn session_key(whisky_id: Uuid, date: NaiveDate, alias: &str) -> SessionKey {
    (whisky_id, date, alias.to_string())
}

impl InsertIntoTable for TastingEntry {
    fn make_insertion_query(&self) -> Query<'_, Sqlite, SqliteArguments<'_>> {
        // NOTE: if changing `TASTINGS_TABLE`, also change this!
        self.bind_all(sqlx::query(
            r#"
            INSERT INTO tastings
            (id, whisky_id, date, alias, price, nose_score, palate_score, finish_score, overall_score_auto, overall_score_user, nose_notes, palate_notes, finish_notes, bottle_photo_path)
            VALUES
            ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14);
            "#,
        ))
    }
}

impl TastingEntry {
    /// Makes a query that inserts this tasting, or updates it in place when it
    /// already exists.
    pub(crate) fn make_upsert_query(&self) -> Query<'_, Sqlite, SqliteArguments<'_>> {
        self.bind_all(sqlx::query(
            r#"
            INSERT INTO tastings
            (id, whisky_id, date, alias, price, nose_score, palate_score, finish_score, overall_score_auto, overall_score_user, nose_notes, palate_notes, finish_notes, bottle_photo_path)
            VALUES
            ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT(id)
            DO UPDATE SET
                whisky_id = excluded.whisky_id,
                date = excluded.date,
                alias = excluded.alias,
                price = excluded.price,
                nose_score = excluded.nose_score,
                palate_score = excluded.palate_score,
                finish_score = excluded.finish_score,
                overall_score_auto = excluded.overall_score_auto,
                overall_score_user = excluded.overall_score_user,
                nose_notes = excluded.nose_notes,
                palate_notes = excluded.palate_notes,
                finish_notes = excluded.finish_notes,
                bottle_photo_path = excluded.bottle_photo_path;
            "#,
        ))
    }

    /// Binds every column, in table order.
    fn bind_all<'q>(
        &'q self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        query
            .bind(self.id)
            .bind(self.whisky_id)
            .bind(self.date)
            .bind(&self.alias)
            .bind(&self.price)
            .bind(self.nose_score)
            .bind(self.palate_score)
            .bind(self.finish_score)
            .bind(self.overall_score_auto)
            .bind(self.overall_score_user)
            .bind(&self.nose_notes)
            .bind(&self.palate_notes)
            .bind(&self.finish_notes)
            .bind(&self.bottle_photo_path)
    }
}
