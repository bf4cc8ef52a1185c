//! Merges an archive back into the collection.
//!
//! Importing is additive. Whiskies and tastings are matched against what's
//! already stored by their natural keys, and anything that matches is left
//! alone. Importing the same archive twice changes nothing the second time.

use std::{
    collections::{HashMap, HashSet},
    fs::File,
};

use camino::{Utf8Path, Utf8PathBuf};
use uuid::Uuid;
use zip::ZipArchive;

use crate::{
    config::Config,
    database::Store,
    error::ArchiveError,
    models::{
        tags::AromaIdent,
        tasting::{compute_overall_score_auto, session_key, SessionKey},
        whisky::{bottle_key, BottleKey},
        AromaCategory, AromaTag, SenseType, TastingAroma, TastingEntry, Whisky,
    },
};

use super::{
    photos, scratch::ScratchDir, CancelFlag, ExportDocument, ImportResult, TastingDocument,
    WhiskyDocument, MANIFEST_ENTRY,
};

/// How far a transported overall score may drift from the recomputed one
/// before it counts as the user's own score.
pub const SCORE_OVERRIDE_TOLERANCE: f64 = 0.01;

/// Reads archives made by [`super::ArchiveWriter`] into a store.
pub struct ArchiveReader<'a, S: Store> {
    store: &'a S,
    config: &'a Config,
    cancel: CancelFlag,
}

impl<'a, S: Store> ArchiveReader<'a, S> {
    pub fn new(store: &'a S, config: &'a Config) -> Self {
        Self {
            store,
            config,
            cancel: CancelFlag::new(),
        }
    }

    /// Lets someone else stop this import early.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Imports the archive at the given path.
    ///
    /// This never fails outright. Problems end up in the result's `errors`,
    /// and the counts say how much made it in before they happened.
    #[tracing::instrument(skip(self))]
    pub async fn import(&self, archive: &Utf8Path) -> ImportResult {
        let mut result = ImportResult::default();

        match self.try_import(archive, &mut result).await {
            Ok(()) => tracing::info!(
                "Imported {} whiskies, {} tastings, and {} photos with {} problem(s).",
                result.whiskies_imported,
                result.tastings_imported,
                result.photos_imported,
                result.errors.len(),
            ),
            Err(e) => {
                tracing::error!("Import of `{archive}` stopped. err: {e}");
                result.errors.push(e.to_string());
            }
        }

        result
    }

    async fn try_import(
        &self,
        archive: &Utf8Path,
        result: &mut ImportResult,
    ) -> Result<(), ArchiveError> {
        // dropping this removes everything we extracted, however we leave
        let scratch = ScratchDir::create(&self.config.scratch_root()).await?;

        let document = {
            let archive = archive.to_path_buf();
            let into = scratch.path().to_path_buf();
            tokio::task::spawn_blocking(move || extract(&archive, &into)).await??;

            read_manifest(scratch.path()).await?
        };
        document.check_version()?;
        tracing::debug!(
            "Manifest has {} whiskies and {} tastings.",
            document.whiskies.len(),
            document.tasting_count()
        );

        // nothing is written before this point, so a bad photo dir leaves the
        // store untouched
        let photo_dir = self.config.photo_dir();
        tokio::fs::create_dir_all(&photo_dir)
            .await
            .map_err(|e| ArchiveError::io(&photo_dir, e))?;

        // everything below may write to the store. load what we match against first
        let whiskies = self.store.whiskies().await?;
        let tastings = self.store.tastings().await?;
        let tags = self.store.aroma_tags().await?;

        let mut merge = Merge {
            store: self.store,
            scratch: scratch.path(),
            photo_dir,
            known: KnownRecords::new(&whiskies, &tastings),
            tags: TagIndex::new(&tags),
            result,
        };

        merge.create_missing_tags(&document).await?;

        for whisky in &document.whiskies {
            self.cancel.check()?;
            merge.whisky(whisky).await?;
        }

        Ok(())
    }
}

/// Unpacks every entry of the archive into `into`, keeping relative paths.
///
/// Entries whose names would land outside `into` are skipped.
fn extract(archive: &Utf8Path, into: &Utf8Path) -> Result<(), ArchiveError> {
    let file = File::open(archive)
        .inspect_err(|e| tracing::error!("Can't open archive at `{archive}`. err: {e}"))
        .map_err(|e| ArchiveError::io(archive, e))?;
    let mut zip = ZipArchive::new(file).map_err(|e| ArchiveError::zip(archive, e))?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| ArchiveError::zip(archive, e))?;

        let Some(relative) = entry
            .enclosed_name()
            .and_then(|p| Utf8PathBuf::from_path_buf(p).ok())
        else {
            tracing::warn!("Skipping archive entry `{}` with an unsafe name.", entry.name());
            continue;
        };
        let out = into.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out).map_err(|e| ArchiveError::io(&out, e))?;
            continue;
        }

        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
        }
        let mut file = File::create(&out).map_err(|e| ArchiveError::io(&out, e))?;
        std::io::copy(&mut entry, &mut file).map_err(|e| ArchiveError::io(&out, e))?;
    }

    tracing::debug!("Extracted {} entries into `{into}`.", zip.len());
    Ok(())
}

/// Reads and parses the extracted manifest.
async fn read_manifest(scratch: &Utf8Path) -> Result<ExportDocument, ArchiveError> {
    let path = scratch.join(MANIFEST_ENTRY);

    let text = match tokio::fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::error!("Archive has no `{MANIFEST_ENTRY}`.");
            return Err(ArchiveError::ManifestMissing);
        }
        Err(e) => return Err(ArchiveError::io(&path, e)),
    };

    serde_json::from_str(&text)
        .inspect_err(|e| tracing::error!("Manifest isn't valid. err: {e}"))
        .map_err(ArchiveError::ManifestParse)
}

/// What's already stored, keyed the way imports match records.
///
/// Records created during an import are added as they go, so a manifest
/// can't duplicate itself either.
struct KnownRecords {
    whiskies: HashMap<BottleKey, Uuid>,
    whisky_ids: HashSet<Uuid>,
    tastings: HashSet<SessionKey>,
    tasting_ids: HashSet<Uuid>,
}

impl KnownRecords {
    fn new(whiskies: &[Whisky], tastings: &[TastingEntry]) -> Self {
        let mut known = Self {
            whiskies: HashMap::new(),
            whisky_ids: HashSet::new(),
            tastings: HashSet::new(),
            tasting_ids: HashSet::new(),
        };

        for whisky in whiskies {
            known.add_whisky(whisky);
        }
        for tasting in tastings {
            known.add_tasting(tasting);
        }

        known
    }

    fn find_whisky(&self, distillery: &str, whisky_name: &str) -> Option<Uuid> {
        self.whiskies
            .get(&bottle_key(distillery, whisky_name))
            .copied()
    }

    fn add_whisky(&mut self, whisky: &Whisky) {
        // the first one wins, like a front-to-back search would
        self.whiskies.entry(whisky.natural_key()).or_insert(whisky.id);
        self.whisky_ids.insert(whisky.id);
    }

    fn has_tasting(&self, whisky_id: Uuid, doc: &TastingDocument) -> bool {
        self.tastings
            .contains(&session_key(whisky_id, doc.date, &doc.alias))
    }

    fn add_tasting(&mut self, tasting: &TastingEntry) {
        self.tastings.insert(tasting.natural_key());
        self.tasting_ids.insert(tasting.id);
    }
}

/// Looks up aroma tags by name.
///
/// An exact match wins. Otherwise, names are compared trimmed and ignoring
/// case, so "honey " finds "Honey".
struct TagIndex {
    exact: HashMap<String, AromaIdent>,
    folded: HashMap<String, AromaIdent>,
}

impl TagIndex {
    fn new(tags: &[AromaTag]) -> Self {
        let mut index = Self {
            exact: HashMap::new(),
            folded: HashMap::new(),
        };
        for tag in tags {
            index.add(tag);
        }

        index
    }

    fn fold(name: &str) -> String {
        name.trim().to_lowercase()
    }

    fn add(&mut self, tag: &AromaTag) {
        self.exact.entry(tag.name.clone()).or_insert(tag.id);
        self.folded.entry(Self::fold(&tag.name)).or_insert(tag.id);
    }

    fn resolve(&self, name: &str) -> Option<AromaIdent> {
        self.exact
            .get(name)
            .or_else(|| self.folded.get(&Self::fold(name)))
            .copied()
    }
}

/// One import's worth of matching and inserting.
struct Merge<'a, 'r, S: Store> {
    store: &'a S,
    scratch: &'a Utf8Path,
    photo_dir: Utf8PathBuf,
    known: KnownRecords,
    tags: TagIndex,
    result: &'r mut ImportResult,
}

impl<S: Store> Merge<'_, '_, S> {
    /// Adds every tag name the manifest uses but the store doesn't know, all
    /// in one batch.
    async fn create_missing_tags(&mut self, document: &ExportDocument) -> Result<(), ArchiveError> {
        let mut created: Vec<AromaTag> = Vec::new();

        for name in document.tag_names() {
            if self.tags.resolve(name).is_some() || name.trim().is_empty() {
                continue;
            }

            let tag = AromaTag::new(name.trim(), AromaCategory::Imported);
            tracing::debug!("Creating aroma tag `{}` for the import.", tag.name);
            self.tags.add(&tag);
            created.push(tag);
        }

        if !created.is_empty() {
            self.store.insert_aroma_tags(&created).await?;
            tracing::info!("Created {} new aroma tags.", created.len());
        }

        Ok(())
    }

    async fn whisky(&mut self, doc: &WhiskyDocument) -> Result<(), ArchiveError> {
        let whisky_id = match self.known.find_whisky(&doc.distillery, &doc.whisky_name) {
            Some(existing) => {
                tracing::debug!(
                    "`{} {}` is already here. Only adding its tastings.",
                    doc.distillery,
                    doc.whisky_name
                );
                existing
            }
            None => self.insert_whisky(doc).await?,
        };

        for tasting in &doc.tastings {
            self.tasting(whisky_id, doc, tasting).await?;
        }

        Ok(())
    }

    async fn insert_whisky(&mut self, doc: &WhiskyDocument) -> Result<Uuid, ArchiveError> {
        let photo_path = match &doc.photo {
            Some(reference) => {
                let context = format!("the bottle of {} {}", doc.distillery, doc.whisky_name);
                self.copy_photo(reference, &context).await
            }
            None => None,
        };

        let whisky = Whisky {
            id: self.fresh_whisky_id(doc.id),
            distillery: doc.distillery.clone(),
            country: doc.country.clone(),
            region: doc.region.clone(),
            whisky_name: doc.whisky_name.clone(),
            batch_code: doc.batch_code.clone(),
            age: doc.age,
            bottling_year: doc.bottling_year,
            abv: doc.abv,
            cask_type: doc.cask_type.clone(),
            photo_path: photo_path.map(String::from),
        };

        self.store.insert_whisky(&whisky).await?;
        self.known.add_whisky(&whisky);
        self.result.whiskies_imported += 1;

        Ok(whisky.id)
    }

    async fn tasting(
        &mut self,
        whisky_id: Uuid,
        whisky: &WhiskyDocument,
        doc: &TastingDocument,
    ) -> Result<(), ArchiveError> {
        if self.known.has_tasting(whisky_id, doc) {
            tracing::debug!(
                "Tasting of `{}` on {} (alias `{}`) is already here. Skipping it.",
                whisky.whisky_name,
                doc.date,
                doc.alias
            );
            return Ok(());
        }

        let photo_path = match &doc.bottle_photo {
            Some(reference) => {
                let context = format!(
                    "the tasting of {} {} on {}",
                    whisky.distillery, whisky.whisky_name, doc.date
                );
                self.copy_photo(reference, &context).await
            }
            None => None,
        };

        // never trust a transported derived score
        let auto = compute_overall_score_auto(doc.nose_score, doc.palate_score, doc.finish_score);
        let user = doc
            .overall_score
            .filter(|score| (score - auto).abs() > SCORE_OVERRIDE_TOLERANCE);

        let tasting = TastingEntry {
            id: self.fresh_tasting_id(doc.id),
            whisky_id,
            date: doc.date,
            alias: doc.alias.clone(),
            price: doc.price.clone(),
            nose_score: doc.nose_score,
            palate_score: doc.palate_score,
            finish_score: doc.finish_score,
            overall_score_auto: auto,
            overall_score_user: user,
            nose_notes: doc.nose_notes.clone(),
            palate_notes: doc.palate_notes.clone(),
            finish_notes: doc.finish_notes.clone(),
            bottle_photo_path: photo_path.map(String::from),
        };

        self.store.insert_tasting(&tasting).await?;
        self.known.add_tasting(&tasting);

        let links = self.links_for(&tasting, doc);
        if !links.is_empty() {
            self.store.insert_tasting_aromas(&links).await?;
        }

        self.result.tastings_imported += 1;
        Ok(())
    }

    /// Turns a tasting's tag names back into links. Names without a tag are
    /// dropped.
    fn links_for(&mut self, tasting: &TastingEntry, doc: &TastingDocument) -> Vec<TastingAroma> {
        let mut links = Vec::new();

        for sense in SenseType::ALL {
            for name in doc.tags(sense) {
                if name.trim().is_empty() {
                    continue;
                }

                match self.tags.resolve(name) {
                    Some(aroma_id) => {
                        let link = TastingAroma::new(tasting.id, aroma_id, sense);
                        if !links.contains(&link) {
                            links.push(link);
                        }
                    }
                    None => {
                        tracing::warn!("No aroma tag named `{name}`. Dropping it from a tasting.");
                        self.result.errors.push(format!(
                            "Aroma tag `{name}` couldn't be found, so a tasting on {} was imported without it.",
                            tasting.date
                        ));
                    }
                }
            }
        }

        links
    }

    /// Copies a photo out of the archive. Problems only cost the photo.
    async fn copy_photo(&mut self, reference: &str, context: &str) -> Option<Utf8PathBuf> {
        let mut source = photos::resolve(self.scratch, reference);
        if let Some(path) = &source {
            let is_file = tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file());
            if !is_file {
                source = None;
            }
        }

        let Some(source) = source else {
            tracing::warn!("Photo `{reference}` for {context} isn't in the archive.");
            self.result.errors.push(format!(
                "Photo `{reference}` for {context} was missing from the archive."
            ));
            return None;
        };

        match photos::copy_into(&source, &self.photo_dir).await {
            Ok(destination) => {
                self.result.photos_imported += 1;
                Some(destination)
            }
            Err(e) => {
                tracing::warn!("Failed to copy photo `{reference}` for {context}. err: {e}");
                self.result
                    .errors
                    .push(format!("Photo `{reference}` for {context} couldn't be copied: {e}"));
                None
            }
        }
    }

    /// Keeps the manifest's id unless something else already has it.
    fn fresh_whisky_id(&self, id: Uuid) -> Uuid {
        if self.known.whisky_ids.contains(&id) {
            tracing::debug!("Whisky id `{id}` is taken by another bottle. Using a new one.");
            return Uuid::new_v4();
        }

        id
    }

    fn fresh_tasting_id(&self, id: Uuid) -> Uuid {
        if self.known.tasting_ids.contains(&id) {
            tracing::debug!("Tasting id `{id}` is taken by another tasting. Using a new one.");
            return Uuid::new_v4();
        }

        id
    }
}
