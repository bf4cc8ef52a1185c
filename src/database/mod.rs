//! Helps to connect to the database.
//!
//! The journal keeps everything in one SQLite file. Use [`Database::open`] to
//! get a handle, then pass that handle around. There's no global pool.

use camino::Utf8Path;
use chrono::NaiveDate;
use sea_query::SqliteQueryBuilder;
use sea_query_binder::SqlxBinder as _;
use sqlx::{
    query::Query,
    sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};
use uuid::Uuid;

use crate::{
    config::Config,
    error::DatabaseError,
    models::{
        tags::default_aroma_tags, AromaTagCount, TastingAroma, TastingEntry, Whisky,
        WhiskyWithTastings,
    },
    search::{query::whisky_search, CollectionFilter},
    stats::{CollectionStats, TOP_AROMAS},
};

pub mod store;

pub use store::Store;
use store::group_tastings;

pub const WHISKIES_TABLE: &str = "whiskies";
pub const TASTINGS_TABLE: &str = "tastings";
pub const AROMA_TAGS_TABLE: &str = "aroma_tags";
pub const TASTING_AROMAS_TABLE: &str = "tasting_aromas";

/// The name of the database file inside the data directory.
pub const JOURNAL_DB_FILE: &str = "snifter.sqlite";

pub(crate) const ALL_WHISKIES_QUERY: &str = "SELECT * FROM whiskies ORDER BY whisky_name, id";
pub(crate) const ALL_TASTINGS_QUERY: &str = "SELECT * FROM tastings ORDER BY date, alias, id";

/// Types that know how to put themselves into their table.
pub trait InsertIntoTable {
    fn make_insertion_query(&self) -> Query<'_, Sqlite, SqliteArguments<'_>>;
}

/// A handle to the journal's database.
///
/// Cloning is cheap. All clones share one connection pool.
#[derive(Clone, Debug)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Opens (or creates) the database described by the config.
    pub async fn open(config: &Config) -> Result<Self, DatabaseError> {
        Self::connect(&config.database_path()).await
    }

    /// Opens (or creates) the database at the given path, then migrates it.
    #[tracing::instrument]
    pub async fn connect(path: &Utf8Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .inspect_err(|e| tracing::error!("Failed to connect to journal database. err: {e}"))
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        // we'll also run migrations here real quick
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    "Database connection succeeded, but migrating the database failed! err: {e}"
                )
            })
            .map_err(DatabaseError::MigrationFailed)?;

        Ok(Self { pool })
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Closes every connection. Other clones of this handle stop working, too.
    pub async fn close(&self) {
        self.pool.close().await
    }

    /// Fills the tag table with the default taxonomy, but only when it's empty.
    ///
    /// Returns whether anything was added.
    #[tracing::instrument(skip(self))]
    pub async fn seed_aroma_tags_if_empty(&self) -> Result<bool, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM aroma_tags")
            .fetch_one(&mut *conn)
            .await?;
        drop(conn);

        if count > 0 {
            tracing::debug!("Aroma tags already present ({count}). Not seeding.");
            return Ok(false);
        }

        let defaults = default_aroma_tags();
        tracing::info!("Seeding {} default aroma tags.", defaults.len());
        self.insert_aroma_tags(&defaults).await?;
        Ok(true)
    }

    /// Finds a whisky by its id.
    pub async fn whisky(&self, id: Uuid) -> Result<Option<Whisky>, DatabaseError> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query_as::<_, Whisky>("SELECT * FROM whiskies WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(DatabaseError::from)
    }

    /// Finds a whisky by its id, along with its tastings.
    pub async fn whisky_with_tastings(
        &self,
        id: Uuid,
    ) -> Result<Option<WhiskyWithTastings>, DatabaseError> {
        let Some(whisky) = self.whisky(id).await? else {
            return Ok(None);
        };

        let tastings = self.tastings_for_whisky(id).await?;
        Ok(Some(WhiskyWithTastings { whisky, tastings }))
    }

    /// Adds a whisky, or updates it if it's already here.
    #[tracing::instrument(skip_all, fields(id = %whisky.id))]
    pub async fn save_whisky(&self, whisky: &Whisky) -> Result<(), DatabaseError> {
        let mut conn = self.pool.acquire().await?;

        whisky
            .make_upsert_query()
            .execute(&mut *conn)
            .await
            .inspect_err(|e| tracing::error!("Whisky upsert failed! err: {e}"))
            .map_err(|e| DatabaseError::InsertionFailed(e.to_string()))
            .map(|_query_response| ())
    }

    /// Finds a tasting by its id.
    pub async fn tasting(&self, id: Uuid) -> Result<Option<TastingEntry>, DatabaseError> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query_as::<_, TastingEntry>("SELECT * FROM tastings WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(DatabaseError::from)
    }

    /// All tastings of one whisky, oldest first.
    pub async fn tastings_for_whisky(
        &self,
        whisky_id: Uuid,
    ) -> Result<Vec<TastingEntry>, DatabaseError> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query_as::<_, TastingEntry>(
            "SELECT * FROM tastings WHERE whisky_id = $1 ORDER BY date, alias, id",
        )
        .bind(whisky_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(DatabaseError::from)
    }

    /// Looks for a tasting that's already recorded under the same whisky, day,
    /// and alias.
    ///
    /// The UI uses this to warn before saving a duplicate entry.
    pub async fn find_duplicate_tasting(
        &self,
        whisky_id: Uuid,
        date: NaiveDate,
        alias: &str,
    ) -> Result<Option<TastingEntry>, DatabaseError> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query_as::<_, TastingEntry>(
            "SELECT * FROM tastings WHERE whisky_id = $1 AND date = $2 AND alias = $3 LIMIT 1",
        )
        .bind(whisky_id)
        .bind(date)
        .bind(alias)
        .fetch_optional(&mut *conn)
        .await
        .map_err(DatabaseError::from)
    }

    /// Saves a tasting and replaces its aroma links, all at once.
    #[tracing::instrument(skip_all, fields(id = %tasting.id, links = aromas.len()))]
    pub async fn save_tasting_with_aromas(
        &self,
        tasting: &TastingEntry,
        aromas: &[TastingAroma],
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        tasting
            .make_upsert_query()
            .execute(&mut *tx)
            .await
            .inspect_err(|e| tracing::error!("Tasting upsert failed! err: {e}"))
            .map_err(|e| DatabaseError::InsertionFailed(e.to_string()))?;

        sqlx::query("DELETE FROM tasting_aromas WHERE tasting_id = $1")
            .bind(tasting.id)
            .execute(&mut *tx)
            .await?;

        for link in aromas.iter().filter(|link| link.tasting_id == tasting.id) {
            link.make_insertion_query()
                .execute(&mut *tx)
                .await
                .map_err(|e| DatabaseError::InsertionFailed(e.to_string()))?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// The aroma links of one tasting.
    pub async fn aromas_for_tasting(
        &self,
        tasting_id: Uuid,
    ) -> Result<Vec<TastingAroma>, DatabaseError> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query_as::<_, TastingAroma>("SELECT * FROM tasting_aromas WHERE tasting_id = $1")
            .bind(tasting_id)
            .fetch_all(&mut *conn)
            .await
            .map_err(DatabaseError::from)
    }

    /// Deletes a whisky with all of its tastings and their aroma links.
    ///
    /// Returns whether the whisky existed.
    #[tracing::instrument(skip(self))]
    pub async fn delete_whisky(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        // children first. the foreign keys won't let us do it the other way
        sqlx::query(
            "DELETE FROM tasting_aromas WHERE tasting_id IN (SELECT id FROM tastings WHERE whisky_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM tastings WHERE whisky_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM whiskies WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }

    /// Deletes a tasting and its aroma links.
    ///
    /// Returns whether the tasting existed.
    #[tracing::instrument(skip(self))]
    pub async fn delete_tasting(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM tasting_aromas WHERE tasting_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM tastings WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }

    /// The most used aroma tags, most used first.
    pub async fn top_aroma_tags(&self, limit: u32) -> Result<Vec<AromaTagCount>, DatabaseError> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query_as::<_, AromaTagCount>(
            r#"
            SELECT at.name AS name, at.category AS category, COUNT(*) AS count
            FROM tasting_aromas ta
            JOIN aroma_tags at ON ta.aroma_id = at.id
            GROUP BY ta.aroma_id
            ORDER BY count DESC, at.name
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&mut *conn)
        .await
        .map_err(DatabaseError::from)
    }

    /// Browses the collection: whiskies matching the filter's text, sorted the
    /// way it asks.
    #[tracing::instrument(skip(self))]
    pub async fn search_whiskies(
        &self,
        filter: &CollectionFilter,
    ) -> Result<Vec<WhiskyWithTastings>, DatabaseError> {
        let (select, values) = whisky_search(filter.text.as_deref()).build_sqlx(SqliteQueryBuilder);
        tracing::debug!("Made whisky search: `{select}`");

        let mut tx = self.pool.begin().await?;
        let whiskies = sqlx::query_as_with::<_, Whisky, _>(&select, values)
            .fetch_all(&mut *tx)
            .await?;
        let tastings = sqlx::query_as::<_, TastingEntry>(ALL_TASTINGS_QUERY)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        let mut found = group_tastings(whiskies, tastings);
        filter.sort.apply(&mut found);
        Ok(found)
    }

    /// Numbers for the statistics screen.
    #[tracing::instrument(skip(self))]
    pub async fn collection_stats(&self) -> Result<CollectionStats, DatabaseError> {
        let collection = self.whiskies_with_tastings().await?;
        let top_aromas = self.top_aroma_tags(TOP_AROMAS).await?;

        Ok(CollectionStats::compute(&collection, top_aromas))
    }
}
