//! The narrow view of the store that exporting and importing rely on.

use core::future::Future;
use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    error::DatabaseError,
    models::{AromaTag, TastingAroma, TastingEntry, Whisky, WhiskyWithTastings},
};

use super::{Database, InsertIntoTable};

/// Bulk reads and additive writes over the whole collection.
///
/// Every read loads *everything* of one kind in a single call, so callers can
/// work in time linear to the collection. Inserts never overwrite an existing
/// row.
pub trait Store: Send + Sync {
    /// Every whisky, each with all of its tastings.
    fn whiskies_with_tastings(
        &self,
    ) -> impl Future<Output = Result<Vec<WhiskyWithTastings>, DatabaseError>> + Send;

    /// Every whisky, without tastings.
    fn whiskies(&self) -> impl Future<Output = Result<Vec<Whisky>, DatabaseError>> + Send;

    /// Every tasting, for every whisky.
    fn tastings(&self) -> impl Future<Output = Result<Vec<TastingEntry>, DatabaseError>> + Send;

    /// Every aroma tag.
    fn aroma_tags(&self) -> impl Future<Output = Result<Vec<AromaTag>, DatabaseError>> + Send;

    /// Every link between a tasting and an aroma tag.
    fn tasting_aromas(
        &self,
    ) -> impl Future<Output = Result<Vec<TastingAroma>, DatabaseError>> + Send;

    /// Adds all the given tags in one batch.
    fn insert_aroma_tags(
        &self,
        tags: &[AromaTag],
    ) -> impl Future<Output = Result<(), DatabaseError>> + Send;

    fn insert_whisky(&self, whisky: &Whisky)
        -> impl Future<Output = Result<(), DatabaseError>> + Send;

    /// Adds a tasting. Its whisky must already exist.
    fn insert_tasting(
        &self,
        tasting: &TastingEntry,
    ) -> impl Future<Output = Result<(), DatabaseError>> + Send;

    /// Links a tasting to aroma tags. Links that already exist are left alone.
    fn insert_tasting_aromas(
        &self,
        links: &[TastingAroma],
    ) -> impl Future<Output = Result<(), DatabaseError>> + Send;
}

impl Store for Database {
    #[tracing::instrument(skip_all)]
    async fn whiskies_with_tastings(&self) -> Result<Vec<WhiskyWithTastings>, DatabaseError> {
        // one transaction, so the two reads see the same collection
        let mut tx = self
            .pool
            .begin()
            .await
            .inspect_err(|e| tracing::error!("Failed to get database connection! err: {e}"))?;

        let whiskies = sqlx::query_as::<_, Whisky>(super::ALL_WHISKIES_QUERY)
            .fetch_all(&mut *tx)
            .await?;
        let tastings = sqlx::query_as::<_, TastingEntry>(super::ALL_TASTINGS_QUERY)
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(group_tastings(whiskies, tastings))
    }

    #[tracing::instrument(skip_all)]
    async fn whiskies(&self) -> Result<Vec<Whisky>, DatabaseError> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query_as::<_, Whisky>(super::ALL_WHISKIES_QUERY)
            .fetch_all(&mut *conn)
            .await
            .map_err(DatabaseError::from)
    }

    #[tracing::instrument(skip_all)]
    async fn tastings(&self) -> Result<Vec<TastingEntry>, DatabaseError> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query_as::<_, TastingEntry>(super::ALL_TASTINGS_QUERY)
            .fetch_all(&mut *conn)
            .await
            .map_err(DatabaseError::from)
    }

    #[tracing::instrument(skip_all)]
    async fn aroma_tags(&self) -> Result<Vec<AromaTag>, DatabaseError> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query_as::<_, AromaTag>("SELECT * FROM aroma_tags ORDER BY category, name")
            .fetch_all(&mut *conn)
            .await
            .map_err(DatabaseError::from)
    }

    #[tracing::instrument(skip_all)]
    async fn tasting_aromas(&self) -> Result<Vec<TastingAroma>, DatabaseError> {
        let mut conn = self.pool.acquire().await?;

        // insertion order, so exported tag lists come out the way they went in
        sqlx::query_as::<_, TastingAroma>("SELECT * FROM tasting_aromas ORDER BY rowid")
            .fetch_all(&mut *conn)
            .await
            .map_err(DatabaseError::from)
    }

    #[tracing::instrument(skip_all, fields(count = tags.len()))]
    async fn insert_aroma_tags(&self, tags: &[AromaTag]) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        for tag in tags {
            tag.make_insertion_query()
                .execute(&mut *tx)
                .await
                .inspect_err(|e| tracing::error!("Aroma tag insertion failed! err: {e}"))
                .map_err(|e| DatabaseError::InsertionFailed(e.to_string()))?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(id = %whisky.id))]
    async fn insert_whisky(&self, whisky: &Whisky) -> Result<(), DatabaseError> {
        let mut conn = self.pool.acquire().await?;

        whisky
            .make_insertion_query()
            .execute(&mut *conn)
            .await
            .inspect_err(|e| tracing::error!("Whisky insertion failed! err: {e}"))
            .map_err(|e| DatabaseError::InsertionFailed(e.to_string()))
            .map(|_query_response| ())
    }

    #[tracing::instrument(skip_all, fields(id = %tasting.id))]
    async fn insert_tasting(&self, tasting: &TastingEntry) -> Result<(), DatabaseError> {
        let mut conn = self.pool.acquire().await?;

        tasting
            .make_insertion_query()
            .execute(&mut *conn)
            .await
            .inspect_err(|e| tracing::error!("Tasting insertion failed! err: {e}"))
            .map_err(|e| DatabaseError::InsertionFailed(e.to_string()))
            .map(|_query_response| ())
    }

    #[tracing::instrument(skip_all, fields(count = links.len()))]
    async fn insert_tasting_aromas(&self, links: &[TastingAroma]) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        for link in links {
            link.make_insertion_query()
                .execute(&mut *tx)
                .await
                .inspect_err(|e| tracing::error!("Tasting aroma insertion failed! err: {e}"))
                .map_err(|e| DatabaseError::InsertionFailed(e.to_string()))?;
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Hands each tasting to its whisky, keeping the order of both lists.
///
/// Tastings whose whisky isn't in `whiskies` are dropped.
pub(crate) fn group_tastings(
    whiskies: Vec<Whisky>,
    tastings: Vec<TastingEntry>,
) -> Vec<WhiskyWithTastings> {
    let mut by_whisky: HashMap<Uuid, Vec<TastingEntry>> = HashMap::new();
    for tasting in tastings {
        by_whisky.entry(tasting.whisky_id).or_default().push(tasting);
    }

    whiskies
        .into_iter()
        .map(|whisky| WhiskyWithTastings {
            tastings: by_whisky.remove(&whisky.id).unwrap_or_default(),
            whisky,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn grouping_keeps_order_and_drops_orphans() {
        let a = Whisky::new("Talisker", "10");
        let b = Whisky::new("Ardbeg", "Uigeadail");
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();

        let t1 = TastingEntry::new(b.id, day(1), "", 5.0, 5.0, 5.0);
        let t2 = TastingEntry::new(a.id, day(2), "", 6.0, 6.0, 6.0);
        let t3 = TastingEntry::new(b.id, day(3), "", 7.0, 7.0, 7.0);
        let orphan = TastingEntry::new(Uuid::new_v4(), day(4), "", 1.0, 1.0, 1.0);

        let grouped = group_tastings(
            vec![a.clone(), b.clone()],
            vec![t1.clone(), t2.clone(), t3.clone(), orphan],
        );

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].whisky, a);
        assert_eq!(grouped[0].tastings, vec![t2]);
        assert_eq!(grouped[1].whisky, b);
        assert_eq!(grouped[1].tastings, vec![t1, t3]);
    }
}
