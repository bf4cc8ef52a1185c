//! Writes the collection out as an archive.

use std::{fs::File, io::Write as _};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{Local, NaiveDateTime};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::{
    config::Config,
    database::Store,
    error::ArchiveError,
    models::{AromaTag, TastingAroma, WhiskyWithTastings},
};

use super::{photos::PhotoEntry, CancelFlag, ExportDocument, MANIFEST_ENTRY};

/// Packs the whole collection into one archive in the backup directory.
pub struct ArchiveWriter<'a, S: Store> {
    store: &'a S,
    config: &'a Config,
    cancel: CancelFlag,
}

impl<'a, S: Store> ArchiveWriter<'a, S> {
    pub fn new(store: &'a S, config: &'a Config) -> Self {
        Self {
            store,
            config,
            cancel: CancelFlag::new(),
        }
    }

    /// Lets someone else stop this export early.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Exports everything, returning the path of the new archive.
    ///
    /// The store is read exactly three times, no matter how big the
    /// collection is. On failure, no archive is left behind.
    #[tracing::instrument(skip_all)]
    pub async fn export(&self) -> Result<Utf8PathBuf, ArchiveError> {
        let collection = self
            .store
            .whiskies_with_tastings()
            .await
            .inspect_err(|e| tracing::error!("Couldn't load the collection for export. err: {e}"))?;
        let links = self.store.tasting_aromas().await?;
        let tags = self.store.aroma_tags().await?;
        self.cancel.check()?;

        let backup_dir = self.config.backup_dir();
        tokio::fs::create_dir_all(&backup_dir)
            .await
            .map_err(|e| ArchiveError::io(&backup_dir, e))?;

        let started = Local::now().naive_local();
        let cancel = self.cancel.clone();

        // all of this is blocking file work, so keep it off the runtime
        let path = tokio::task::spawn_blocking(move || {
            write_collection(&backup_dir, started, &collection, &tags, &links, &cancel)
        })
        .await??;

        Ok(path)
    }
}

/// Builds the manifest and writes the archive, start to finish.
fn write_collection(
    backup_dir: &Utf8Path,
    started: NaiveDateTime,
    collection: &[WhiskyWithTastings],
    tags: &[AromaTag],
    links: &[TastingAroma],
    cancel: &CancelFlag,
) -> Result<Utf8PathBuf, ArchiveError> {
    let (document, photos) =
        ExportDocument::build(collection, tags, links, started.date(), |p| p.is_file());
    let manifest = serde_json::to_vec_pretty(&document).map_err(ArchiveError::ManifestEncode)?;
    cancel.check()?;

    let target = archive_path(backup_dir, started);
    write_archive_atomically(&target, &manifest, &photos, cancel)?;

    tracing::info!(
        "Exported {} whiskies ({} tastings, {} photos) to `{target}`.",
        document.whiskies.len(),
        document.tasting_count(),
        photos.len(),
    );
    Ok(target)
}

/// `whisky_backup_<timestamp>.zip`, plus a counter if that's taken.
fn archive_path(backup_dir: &Utf8Path, started: NaiveDateTime) -> Utf8PathBuf {
    let stamp = started.format("%Y%m%d_%H%M%S");
    let first = backup_dir.join(format!("whisky_backup_{stamp}.zip"));
    if !first.exists() {
        return first;
    }

    (1_u32..)
        .map(|n| backup_dir.join(format!("whisky_backup_{stamp}_{n}.zip")))
        .find(|path| !path.exists())
        .unwrap_or(first)
}

/// Writes the archive next to `target`, then moves it into place.
///
/// If anything fails, the half-written file is removed.
fn write_archive_atomically(
    target: &Utf8Path,
    manifest: &[u8],
    photos: &[PhotoEntry],
    cancel: &CancelFlag,
) -> Result<(), ArchiveError> {
    let partial = Utf8PathBuf::from(format!("{target}.partial"));

    if let Err(e) = write_archive(&partial, manifest, photos, cancel) {
        tracing::warn!("Export failed. Removing the partial archive at `{partial}`. err: {e}");
        if let Err(remove_err) = std::fs::remove_file(&partial) {
            tracing::debug!("Partial archive wasn't removed. err: {remove_err}");
        }
        return Err(e);
    }

    std::fs::rename(&partial, target).map_err(|e| ArchiveError::io(target, e))
}

/// Writes the manifest and then every photo, in order.
fn write_archive(
    path: &Utf8Path,
    manifest: &[u8],
    photos: &[PhotoEntry],
    cancel: &CancelFlag,
) -> Result<(), ArchiveError> {
    let file = File::create(path).map_err(|e| ArchiveError::io(path, e))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(MANIFEST_ENTRY, options)
        .map_err(|e| ArchiveError::zip(path, e))?;
    zip.write_all(manifest)
        .map_err(|e| ArchiveError::io(path, e))?;

    for photo in photos {
        cancel.check()?;

        // it was there a moment ago. if it's gone now, the export fails
        let mut source =
            File::open(&photo.source).map_err(|e| ArchiveError::io(&photo.source, e))?;

        zip.start_file(photo.entry_name.as_str(), options)
            .map_err(|e| ArchiveError::zip(path, e))?;
        std::io::copy(&mut source, &mut zip).map_err(|e| ArchiveError::io(&photo.source, e))?;
    }

    zip.finish().map_err(|e| ArchiveError::zip(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use temp_dir::TempDir;

    use super::*;

    #[test]
    fn archive_names_never_collide() {
        let dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        let started = NaiveDate::from_ymd_opt(2025, 2, 3)
            .unwrap()
            .and_hms_opt(4, 5, 6)
            .unwrap();

        let first = archive_path(&dir, started);
        assert_eq!(first.file_name(), Some("whisky_backup_20250203_040506.zip"));

        std::fs::write(&first, b"taken").unwrap();
        let second = archive_path(&dir, started);
        assert_eq!(second.file_name(), Some("whisky_backup_20250203_040506_1.zip"));
    }

    #[test]
    fn failed_writes_leave_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        let target = dir.join("whisky_backup.zip");

        // this photo was there when the manifest was built, but not anymore
        let photos = [PhotoEntry {
            entry_name: "photos/oban.jpg".into(),
            source: dir.join("oban.jpg"),
        }];

        let res = write_archive_atomically(&target, b"{}", &photos, &CancelFlag::new());
        assert!(matches!(res, Err(ArchiveError::Io { .. })), "got: {res:?}");

        let leftovers = std::fs::read_dir(&dir).unwrap().count();
        assert_eq!(leftovers, 0, "no archive, partial or otherwise");
    }

    #[test]
    fn cancelled_exports_write_nothing() {
        let dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

        let cancel = CancelFlag::new();
        cancel.cancel();

        let res = write_collection(&dir, Local::now().naive_local(), &[], &[], &[], &cancel);
        assert!(matches!(res, Err(ArchiveError::Cancelled)));
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    }
}
