//! The manifest: a portable copy of the collection, written as `data.json`.
//!
//! Tag ids become tag names, and absolute photo paths become archive-relative
//! ones, so the document makes sense on any installation.

use std::collections::{HashMap, HashSet};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    error::ArchiveError,
    models::{
        tags::AromaIdent, AromaTag, SenseType, TastingAroma, TastingEntry, Whisky,
        WhiskyWithTastings,
    },
};

use super::{photos, photos::PhotoEntry, MANIFEST_VERSION};

/// The whole collection, ready to be serialized.
///
/// Missing optional fields default to empty values when parsing, so older
/// or newer manifests still load.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    /// `major.minor`. Only the major part is checked.
    #[serde(default = "default_version")]
    pub version: String,

    /// ISO calendar date of the export. Informational.
    #[serde(default)]
    pub export_date: String,

    #[serde(default)]
    pub whiskies: Vec<WhiskyDocument>,
}

fn default_version() -> String {
    MANIFEST_VERSION.to_string()
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhiskyDocument {
    pub id: Uuid,
    pub distillery: String,
    pub whisky_name: String,

    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub batch_code: String,

    pub age: Option<i32>,
    pub bottling_year: Option<i32>,
    pub abv: Option<f64>,
    pub cask_type: Option<String>,

    /// The bottle photo, as `photos/<file name>`.
    #[serde(default)]
    pub photo: Option<String>,

    #[serde(default)]
    pub tastings: Vec<TastingDocument>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TastingDocument {
    pub id: Uuid,
    pub date: NaiveDate,

    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub price: String,

    pub nose_score: f64,
    pub palate_score: f64,
    pub finish_score: f64,

    /// The effective overall score at export time.
    ///
    /// When absent, the tasting is imported with only its automatic score.
    #[serde(default)]
    pub overall_score: Option<f64>,

    pub nose_notes: Option<String>,
    pub palate_notes: Option<String>,
    pub finish_notes: Option<String>,

    #[serde(default)]
    pub nose_tags: Vec<String>,
    #[serde(default)]
    pub palate_tags: Vec<String>,
    #[serde(default)]
    pub finish_tags: Vec<String>,

    /// `photos/<file name>`, if the photo made it into the archive.
    #[serde(default)]
    pub bottle_photo: Option<String>,
}

impl TastingDocument {
    /// The tag names recorded for one sense.
    pub fn tags(&self, sense: SenseType) -> &[String] {
        match sense {
            SenseType::Nose => &self.nose_tags,
            SenseType::Palate => &self.palate_tags,
            SenseType::Finish => &self.finish_tags,
        }
    }
}

impl ExportDocument {
    /// Builds a document (and the list of photos to pack next to it) from
    /// the loaded collection.
    ///
    /// `photo_exists` decides whether a photo path is still worth
    /// referencing. Photos it rejects are left out of the document.
    ///
    /// Photo entries come out in manifest order, one per photo. Photos that
    /// share a file name get numbered entry names.
    pub fn build(
        collection: &[WhiskyWithTastings],
        tags: &[AromaTag],
        links: &[TastingAroma],
        export_date: NaiveDate,
        photo_exists: impl Fn(&Utf8Path) -> bool,
    ) -> (Self, Vec<PhotoEntry>) {
        let tag_names: HashMap<AromaIdent, &str> =
            tags.iter().map(|t| (t.id, t.name.as_str())).collect();

        let mut links_by_tasting: HashMap<Uuid, Vec<&TastingAroma>> = HashMap::new();
        for link in links {
            links_by_tasting.entry(link.tasting_id).or_default().push(link);
        }

        let mut photos = PhotoList::default();
        let mut reference_photo = |path: Option<&Utf8Path>| -> Option<String> {
            let path = path?;
            if !photo_exists(path) {
                tracing::debug!("Photo `{path}` is gone. Exporting without it.");
                return None;
            }

            photos.push(path)
        };

        let whiskies = collection
            .iter()
            .map(|WhiskyWithTastings { whisky, tastings }| {
                let photo = reference_photo(whisky.photo_path.as_deref().map(Utf8Path::new));

                let tastings = tastings
                    .iter()
                    .map(|tasting| {
                        let links = links_by_tasting
                            .get(&tasting.id)
                            .map(Vec::as_slice)
                            .unwrap_or_default();
                        let names = |sense: SenseType| -> Vec<String> {
                            links
                                .iter()
                                .filter(|l| l.sense_type == sense)
                                .filter_map(|l| tag_names.get(&l.aroma_id))
                                .map(|name| name.to_string())
                                .collect()
                        };

                        let bottle_photo = reference_photo(
                            tasting.bottle_photo_path.as_deref().map(Utf8Path::new),
                        );

                        TastingDocument::from_entry(
                            tasting,
                            [
                                names(SenseType::Nose),
                                names(SenseType::Palate),
                                names(SenseType::Finish),
                            ],
                            bottle_photo,
                        )
                    })
                    .collect();

                WhiskyDocument::from_whisky(whisky, photo, tastings)
            })
            .collect();

        let document = Self {
            version: MANIFEST_VERSION.to_string(),
            export_date: export_date.format("%Y-%m-%d").to_string(),
            whiskies,
        };

        (document, photos.entries)
    }

    /// Rejects manifests written by an incompatible version of the format.
    pub fn check_version(&self) -> Result<(), ArchiveError> {
        let major = self.version.split('.').next().unwrap_or_default().trim();

        if major != "1" {
            tracing::error!("Can't read a manifest with version `{}`.", self.version);
            return Err(ArchiveError::UnsupportedVersion(self.version.clone()));
        }

        Ok(())
    }

    /// Every tag name used anywhere in the document, in order of first
    /// appearance.
    pub fn tag_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();

        self.whiskies
            .iter()
            .flat_map(|w| w.tastings.iter())
            .flat_map(|t| SenseType::ALL.into_iter().flat_map(|s| t.tags(s)))
            .map(String::as_str)
            .filter(|name| seen.insert(*name))
            .collect()
    }

    pub fn tasting_count(&self) -> usize {
        self.whiskies.iter().map(|w| w.tastings.len()).sum()
    }
}

impl WhiskyDocument {
    fn from_whisky(whisky: &Whisky, photo: Option<String>, tastings: Vec<TastingDocument>) -> Self {
        Self {
            id: whisky.id,
            distillery: whisky.distillery.clone(),
            whisky_name: whisky.whisky_name.clone(),
            country: whisky.country.clone(),
            region: whisky.region.clone(),
            batch_code: whisky.batch_code.clone(),
            age: whisky.age,
            bottling_year: whisky.bottling_year,
            abv: whisky.abv,
            cask_type: whisky.cask_type.clone(),
            photo,
            tastings,
        }
    }
}

impl TastingDocument {
    fn from_entry(
        tasting: &TastingEntry,
        [nose_tags, palate_tags, finish_tags]: [Vec<String>; 3],
        bottle_photo: Option<String>,
    ) -> Self {
        Self {
            id: tasting.id,
            date: tasting.date,
            alias: tasting.alias.clone(),
            price: tasting.price.clone(),
            nose_score: tasting.nose_score,
            palate_score: tasting.palate_score,
            finish_score: tasting.finish_score,
            overall_score: Some(tasting.effective_overall_score()),
            nose_notes: tasting.nose_notes.clone(),
            palate_notes: tasting.palate_notes.clone(),
            finish_notes: tasting.finish_notes.clone(),
            nose_tags,
            palate_tags,
            finish_tags,
            bottle_photo,
        }
    }
}

/// Photo entries, one per source file, without repeating an entry name.
#[derive(Default)]
struct PhotoList {
    by_source: HashMap<Utf8PathBuf, String>,
    by_entry: HashMap<String, Utf8PathBuf>,
    entries: Vec<PhotoEntry>,
}

impl PhotoList {
    /// Gives back the entry name for a photo, adding it the first time it's
    /// seen.
    ///
    /// Different photos with the same file name get numbered entry names,
    /// like `photos/bottle_1.jpg`.
    fn push(&mut self, source: &Utf8Path) -> Option<String> {
        if let Some(entry_name) = self.by_source.get(source) {
            return Some(entry_name.clone());
        }

        let mut entry_name = photos::entry_name(source)?;
        let mut n = 0;
        while let Some(taken) = self.by_entry.get(&entry_name) {
            tracing::warn!(
                "Photos `{taken}` and `{source}` both want `{entry_name}` in the archive. \
                Renaming the second one."
            );
            n += 1;
            entry_name = photos::numbered_entry_name(source, n)?;
        }

        self.by_source
            .insert(source.to_path_buf(), entry_name.clone());
        self.by_entry
            .insert(entry_name.clone(), source.to_path_buf());
        self.entries.push(PhotoEntry {
            entry_name: entry_name.clone(),
            source: source.to_path_buf(),
        });

        Some(entry_name)
    }
}
