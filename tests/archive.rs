//! Exporting and importing whole collections.
//!
//! Most tests here either round-trip a real export or hand-build an archive
//! with the `zip` crate to poke at one import rule.

mod common;

#[cfg(test)]
mod tests {
    use std::{
        fs::File,
        io::Write as _,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use camino::{Utf8Path, Utf8PathBuf};
    use serde_json::json;
    use snifter::{
        archive::{ArchiveReader, ArchiveWriter, CancelFlag, ImportResult},
        database::{Database, Store},
        error::DatabaseError,
        models::{
            AromaCategory, AromaTag, SenseType, TastingAroma, TastingEntry, Whisky,
            WhiskyWithTastings,
        },
    };
    use zip::{write::SimpleFileOptions, ZipWriter};

    use crate::common::{self, Setup};

    /// A store that counts how often it's read from.
    struct CountingStore {
        inner: Database,
        reads: AtomicUsize,
    }

    impl CountingStore {
        fn read(&self) {
            self.reads.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Store for CountingStore {
        async fn whiskies_with_tastings(
            &self,
        ) -> Result<Vec<WhiskyWithTastings>, DatabaseError> {
            self.read();
            self.inner.whiskies_with_tastings().await
        }

        async fn whiskies(&self) -> Result<Vec<Whisky>, DatabaseError> {
            self.read();
            self.inner.whiskies().await
        }

        async fn tastings(&self) -> Result<Vec<TastingEntry>, DatabaseError> {
            self.read();
            self.inner.tastings().await
        }

        async fn aroma_tags(&self) -> Result<Vec<AromaTag>, DatabaseError> {
            self.read();
            self.inner.aroma_tags().await
        }

        async fn tasting_aromas(&self) -> Result<Vec<TastingAroma>, DatabaseError> {
            self.read();
            self.inner.tasting_aromas().await
        }

        async fn insert_aroma_tags(&self, tags: &[AromaTag]) -> Result<(), DatabaseError> {
            self.inner.insert_aroma_tags(tags).await
        }

        async fn insert_whisky(&self, whisky: &Whisky) -> Result<(), DatabaseError> {
            self.inner.insert_whisky(whisky).await
        }

        async fn insert_tasting(&self, tasting: &TastingEntry) -> Result<(), DatabaseError> {
            self.inner.insert_tasting(tasting).await
        }

        async fn insert_tasting_aromas(
            &self,
            links: &[TastingAroma],
        ) -> Result<(), DatabaseError> {
            self.inner.insert_tasting_aromas(links).await
        }
    }

    async fn export(setup: &Setup) -> Utf8PathBuf {
        ArchiveWriter::new(&setup.db, &setup.config)
            .export()
            .await
            .expect("export should work")
    }

    async fn import(setup: &Setup, archive: &Utf8Path) -> ImportResult {
        ArchiveReader::new(&setup.db, &setup.config)
            .import(archive)
            .await
    }

    /// Writes an archive by hand, with the given manifest text and photos.
    fn hand_made_archive(
        dir: &Utf8Path,
        manifest: Option<&str>,
        photos: &[(&str, &[u8])],
    ) -> Utf8PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join(format!("hand_made_{}.zip", uuid::Uuid::new_v4()));

        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        let options = SimpleFileOptions::default();
        if let Some(manifest) = manifest {
            zip.start_file("data.json", options).unwrap();
            zip.write_all(manifest.as_bytes()).unwrap();
        }
        for (name, bytes) in photos {
            zip.start_file(*name, options).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap();

        path
    }

    fn manifest(whiskies: serde_json::Value) -> String {
        json!({ "version": "1.0", "exportDate": "2025-01-01", "whiskies": whiskies }).to_string()
    }

    fn tasting_json(id: uuid::Uuid, date: &str, alias: &str, overall: f64) -> serde_json::Value {
        json!({
            "id": id,
            "date": date,
            "alias": alias,
            "price": "",
            "noseScore": 6.0,
            "palateScore": 7.0,
            "finishScore": 5.0,
            "overallScore": overall,
            "noseNotes": null,
            "palateNotes": null,
            "finishNotes": null,
            "noseTags": [],
            "palateTags": [],
            "finishTags": [],
            "bottlePhoto": null
        })
    }

    fn whisky_json(
        distillery: &str,
        name: &str,
        tastings: Vec<serde_json::Value>,
    ) -> serde_json::Value {
        json!({
            "id": uuid::Uuid::new_v4(),
            "distillery": distillery,
            "whiskyName": name,
            "country": "Scotland",
            "region": "",
            "batchCode": "",
            "age": null,
            "bottlingYear": null,
            "abv": null,
            "caskType": null,
            "tastings": tastings
        })
    }

    /// How many entries are left in the scratch root.
    fn scratch_leftovers(setup: &Setup) -> usize {
        match std::fs::read_dir(setup.config.scratch_root()) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    /// Exporting reads the store three times, however many records it has.
    #[tokio::test]
    async fn export_reads_the_store_three_times() {
        let setup = common::setup().await;
        common::fill_sample(&setup).await;

        let store = CountingStore {
            inner: setup.db.clone(),
            reads: AtomicUsize::new(0),
        };
        let path = ArchiveWriter::new(&store, &setup.config)
            .export()
            .await
            .unwrap();

        assert_eq!(store.reads.load(Ordering::SeqCst), 3);
        assert!(path.exists());
        assert!(path.starts_with(setup.config.backup_dir()));
        assert!(path.file_name().unwrap().starts_with("whisky_backup_"));
        assert_eq!(path.extension(), Some("zip"));
    }

    /// The archive holds a manifest and the one photo, nothing else.
    #[tokio::test]
    async fn export_contents() {
        let setup = common::setup().await;
        let sample = common::fill_sample(&setup).await;
        let path = export(&setup).await;

        let mut zip = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let mut names: Vec<_> = zip.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, ["data.json", "photos/talisker_first.jpg"]);

        let manifest: serde_json::Value =
            serde_json::from_reader(zip.by_name("data.json").unwrap()).unwrap();
        assert_eq!(manifest["version"], "1.0");

        let whiskies = manifest["whiskies"].as_array().unwrap();
        assert_eq!(whiskies.len(), 3);

        let talisker = whiskies
            .iter()
            .find(|w| w["distillery"] == "Talisker")
            .unwrap();
        assert_eq!(talisker["id"], sample.talisker.id.to_string());
        assert_eq!(talisker["age"], 10);

        let first = &talisker["tastings"][0];
        assert_eq!(first["date"], "2024-01-05");
        assert_eq!(first["noseTags"], json!(["Peat"]));
        assert_eq!(first["palateTags"], json!(["Honey"]));
        assert_eq!(first["finishTags"], json!(["Peat"]));
        assert_eq!(first["bottlePhoto"], "photos/talisker_first.jpg");
        assert_eq!(first["noseNotes"], "sea spray");

        let second = &talisker["tastings"][1];
        assert_eq!(second["overallScore"], 9.0, "the effective score travels");
        assert_eq!(second["bottlePhoto"], serde_json::Value::Null);
    }

    /// Exporting, then importing into an empty journal, gives the same
    /// collection back.
    #[tokio::test]
    async fn round_trip_into_an_empty_journal() {
        let source = common::setup().await;
        let sample = common::fill_sample(&source).await;
        let archive = export(&source).await;

        let target = common::setup().await;
        let result = import(&target, &archive).await;

        assert_eq!(
            result,
            ImportResult {
                whiskies_imported: 3,
                tastings_imported: 3,
                photos_imported: 1,
                errors: Vec::new(),
            }
        );

        let collection = target.db.whiskies_with_tastings().await.unwrap();
        assert_eq!(collection.len(), 3);

        // ids survive when nothing's in the way
        let talisker = target
            .db
            .whisky_with_tastings(sample.talisker.id)
            .await
            .unwrap()
            .expect("talisker should be there");
        assert_eq!(talisker.whisky.region, "Islands");
        assert_eq!(talisker.whisky.abv, Some(45.8));
        assert_eq!(talisker.tastings.len(), 2);

        let first = target.db.tasting(sample.first.id).await.unwrap().unwrap();
        assert_eq!(first.overall_score_user, None);
        assert!((first.overall_score_auto - 6.3).abs() < 1e-9);
        assert_eq!(first.nose_notes.as_deref(), Some("sea spray"));

        // and the photo came along, into the managed photo directory
        let photo = first.bottle_photo_path().expect("photo path");
        assert!(photo.starts_with(target.config.photo_dir()));
        assert_eq!(tokio::fs::read(&photo).await.unwrap(), sample.photo_bytes);

        let second = target.db.tasting(sample.second.id).await.unwrap().unwrap();
        assert_eq!(second.overall_score_user, Some(9.0));
        assert_eq!(second.price, "12 EUR");

        // tags came in by name, under the import bucket
        let tags = target.db.aroma_tags().await.unwrap();
        assert_eq!(tags.len(), 2);
        assert!(tags.iter().all(|t| t.category == AromaCategory::Imported));

        let links = target.db.aromas_for_tasting(sample.first.id).await.unwrap();
        assert_eq!(links.len(), 3);
        let peat = tags.iter().find(|t| t.name == "Peat").unwrap();
        assert!(links.contains(&TastingAroma::new(sample.first.id, peat.id, SenseType::Nose)));
        assert!(links.contains(&TastingAroma::new(
            sample.first.id,
            peat.id,
            SenseType::Finish
        )));
    }

    /// Importing the same archive twice only does anything the first time.
    #[tokio::test]
    async fn importing_twice_changes_nothing() {
        let source = common::setup().await;
        common::fill_sample(&source).await;
        let archive = export(&source).await;

        let target = common::setup().await;
        let first = import(&target, &archive).await;
        assert_eq!(first.tastings_imported, 3);
        let before = target.db.whiskies_with_tastings().await.unwrap();

        let second = import(&target, &archive).await;
        assert_eq!(second.whiskies_imported, 0);
        assert_eq!(second.tastings_imported, 0);
        assert_eq!(second.errors, first.errors);
        assert_eq!(target.db.whiskies_with_tastings().await.unwrap(), before);
        assert_eq!(target.db.aroma_tags().await.unwrap().len(), 2);

        // and re-importing into the journal it came from is a no-op, too
        let back_home = import(&source, &archive).await;
        assert_eq!(back_home.whiskies_imported, 0);
        assert_eq!(back_home.tastings_imported, 0);
        assert!(back_home.is_clean());
    }

    /// "TALISKER 10" is the same bottle as "Talisker 10".
    #[tokio::test]
    async fn whiskies_match_ignoring_case() {
        let setup = common::setup().await;
        let sample = common::fill_sample(&setup).await;

        let archive = hand_made_archive(
            &setup.root.join("incoming"),
            Some(&manifest(json!([whisky_json(
                "TALISKER",
                "10",
                vec![tasting_json(uuid::Uuid::new_v4(), "2025-05-05", "", 6.3)]
            )]))),
            &[],
        );
        let result = import(&setup, &archive).await;

        assert_eq!(result.whiskies_imported, 0);
        assert_eq!(result.tastings_imported, 1);
        assert!(result.is_clean(), "{:?}", result.errors);

        let talisker = setup
            .db
            .whisky_with_tastings(sample.talisker.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(talisker.whisky.distillery, "Talisker", "existing data is kept");
        assert_eq!(talisker.tastings.len(), 3);
    }

    /// Transported scores only pin an override when they really differ from
    /// the formula.
    #[tokio::test]
    async fn overall_scores_are_recomputed() {
        let setup = common::setup().await;
        let (close, pinned, drifted) = (
            uuid::Uuid::new_v4(),
            uuid::Uuid::new_v4(),
            uuid::Uuid::new_v4(),
        );

        let archive = hand_made_archive(
            &setup.root.join("incoming"),
            Some(&manifest(json!([whisky_json(
                "Springbank",
                "10",
                vec![
                    tasting_json(close, "2025-01-01", "", 6.305),
                    tasting_json(pinned, "2025-01-02", "", 9.0),
                    tasting_json(drifted, "2025-01-03", "", 6.32),
                ]
            )]))),
            &[],
        );
        let result = import(&setup, &archive).await;
        assert_eq!(result.tastings_imported, 3);

        let close = setup.db.tasting(close).await.unwrap().unwrap();
        assert!((close.overall_score_auto - 6.3).abs() < 1e-9);
        assert_eq!(close.overall_score_user, None);
        assert!((close.effective_overall_score() - 6.3).abs() < 1e-9);

        let pinned = setup.db.tasting(pinned).await.unwrap().unwrap();
        assert_eq!(pinned.overall_score_user, Some(9.0));
        assert_eq!(pinned.effective_overall_score(), 9.0);

        let drifted = setup.db.tasting(drifted).await.unwrap().unwrap();
        assert_eq!(drifted.overall_score_user, Some(6.32));
    }

    /// Two tastings with the same day and alias: only the first gets in.
    #[tokio::test]
    async fn duplicate_tastings_in_one_manifest() {
        let setup = common::setup().await;
        let (first, second) = (uuid::Uuid::new_v4(), uuid::Uuid::new_v4());

        let archive = hand_made_archive(
            &setup.root.join("incoming"),
            Some(&manifest(json!([whisky_json(
                "Springbank",
                "15",
                vec![
                    tasting_json(first, "2025-01-01", "bar", 7.0),
                    tasting_json(second, "2025-01-01", "bar", 8.0),
                ]
            )]))),
            &[],
        );
        let result = import(&setup, &archive).await;

        assert_eq!(result.tastings_imported, 1);
        assert!(result.is_clean(), "duplicates aren't errors");
        assert!(setup.db.tasting(first).await.unwrap().is_some());
        assert!(setup.db.tasting(second).await.unwrap().is_none());
    }

    /// A photo the manifest mentions, but the archive lacks, costs only the
    /// photo.
    #[tokio::test]
    async fn missing_photos_are_soft_failures() {
        let setup = common::setup().await;
        let id = uuid::Uuid::new_v4();

        let mut tasting = tasting_json(id, "2025-01-01", "", 6.3);
        tasting["bottlePhoto"] = json!("photos/nope.jpg");
        let archive = hand_made_archive(
            &setup.root.join("incoming"),
            Some(&manifest(json!([whisky_json("Kilkerran", "12", vec![tasting])]))),
            &[],
        );
        let result = import(&setup, &archive).await;

        assert_eq!(result.whiskies_imported, 1);
        assert_eq!(result.tastings_imported, 1);
        assert_eq!(result.photos_imported, 0);
        assert_eq!(result.errors.len(), 1, "{:?}", result.errors);
        assert!(result.errors[0].contains("photos/nope.jpg"));

        let tasting = setup.db.tasting(id).await.unwrap().unwrap();
        assert_eq!(tasting.bottle_photo_path, None);
    }

    /// A corrupt manifest means nothing happens at all.
    #[tokio::test]
    async fn corrupt_manifest_imports_nothing() {
        let setup = common::setup().await;

        let archive = hand_made_archive(
            &setup.root.join("incoming"),
            Some(r#"{ "version": "1.0", "whiskies": [ { "id": "#),
            &[],
        );
        let result = import(&setup, &archive).await;

        assert_eq!(result.whiskies_imported, 0);
        assert_eq!(result.tastings_imported, 0);
        assert_eq!(result.photos_imported, 0);
        assert_eq!(result.errors.len(), 1);

        assert!(setup.db.whiskies().await.unwrap().is_empty());
        assert!(setup.db.tastings().await.unwrap().is_empty());
        assert_eq!(scratch_leftovers(&setup), 0);
    }

    /// Structural problems each give one error and zero counts.
    #[tokio::test]
    async fn structural_failures() {
        let setup = common::setup().await;
        let incoming = setup.root.join("incoming");

        // no manifest
        let no_manifest = hand_made_archive(&incoming, None, &[("photos/a.jpg", b"a")]);
        let result = import(&setup, &no_manifest).await;
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("data.json"), "{:?}", result.errors);

        // not a zip at all
        let not_zip = incoming.join("not_a_zip.zip");
        std::fs::write(&not_zip, b"hello there").unwrap();
        let result = import(&setup, &not_zip).await;
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.tastings_imported, 0);

        // doesn't exist
        let result = import(&setup, &incoming.join("missing.zip")).await;
        assert_eq!(result.errors.len(), 1);

        // from the future
        let future_manifest = json!({
            "version": "2.0",
            "whiskies": [whisky_json("Ardbeg", "Ten", vec![])]
        });
        let future = hand_made_archive(&incoming, Some(&future_manifest.to_string()), &[]);
        let result = import(&setup, &future).await;
        assert_eq!(result.whiskies_imported, 0);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("2.0"));

        assert!(setup.db.whiskies().await.unwrap().is_empty());
        assert_eq!(scratch_leftovers(&setup), 0, "scratch dirs are always removed");
    }

    /// When the photo directory can't be made, the import stops before it
    /// touches the store.
    #[tokio::test]
    async fn unusable_photo_dir_writes_nothing() {
        let setup = common::setup().await;

        // a plain file where the directory should go
        std::fs::write(setup.config.photo_dir(), b"not a directory").unwrap();

        let mut tasting = tasting_json(uuid::Uuid::new_v4(), "2025-01-01", "", 6.3);
        tasting["noseTags"] = json!(["Wet Dog"]);
        let archive = hand_made_archive(
            &setup.root.join("incoming"),
            Some(&manifest(json!([whisky_json("Glengyle", "12", vec![tasting])]))),
            &[],
        );
        let result = import(&setup, &archive).await;

        assert_eq!(result.errors.len(), 1, "{:?}", result.errors);
        assert_eq!(result.whiskies_imported, 0);
        assert_eq!(result.tastings_imported, 0);
        assert!(setup.db.aroma_tags().await.unwrap().is_empty(), "no tags either");
        assert!(setup.db.whiskies().await.unwrap().is_empty());
        assert_eq!(scratch_leftovers(&setup), 0);
    }

    /// Tag names find existing tags even with different casing, and new ones
    /// are made once.
    #[tokio::test]
    async fn tags_are_matched_or_created() {
        let setup = common::setup().await;
        setup.db.seed_aroma_tags_if_empty().await.unwrap();
        let before = setup.db.aroma_tags().await.unwrap();
        let honey = before.iter().find(|t| t.name == "Honey").unwrap().clone();

        let id = uuid::Uuid::new_v4();
        let mut tasting = tasting_json(id, "2025-01-01", "", 6.3);
        tasting["noseTags"] = json!(["honey ", "Wet Dog"]);
        tasting["palateTags"] = json!(["Honey", "wet dog"]);
        let archive = hand_made_archive(
            &setup.root.join("incoming"),
            Some(&manifest(json!([whisky_json("Benromach", "10", vec![tasting])]))),
            &[],
        );
        let result = import(&setup, &archive).await;
        assert!(result.is_clean(), "{:?}", result.errors);

        let after = setup.db.aroma_tags().await.unwrap();
        assert_eq!(after.len(), before.len() + 1, "only `Wet Dog` is new");
        let wet_dog = after.iter().find(|t| t.name == "Wet Dog").unwrap();
        assert_eq!(wet_dog.category, AromaCategory::Imported);

        let links = setup.db.aromas_for_tasting(id).await.unwrap();
        assert_eq!(links.len(), 4);
        assert!(links.contains(&TastingAroma::new(id, honey.id, SenseType::Nose)));
        assert!(links.contains(&TastingAroma::new(id, wet_dog.id, SenseType::Palate)));
    }

    /// Photos travel for bottles, too.
    #[tokio::test]
    async fn whisky_photos_round_trip() {
        let source = common::setup().await;
        let photo = common::photo(&source.root.join("camera"), "oban.jpg", b"oban").await;
        let mut oban = Whisky::new("Oban", "14");
        oban.photo_path = Some(photo.to_string());
        source.db.save_whisky(&oban).await.unwrap();

        let archive = export(&source).await;
        let target = common::setup().await;
        let result = import(&target, &archive).await;
        assert_eq!(result.photos_imported, 1);

        let oban = target.db.whisky(oban.id).await.unwrap().unwrap();
        let path = oban.photo_path().unwrap();
        assert_eq!(path, target.config.photo_dir().join("oban.jpg"));
        assert_eq!(tokio::fs::read(path).await.unwrap(), b"oban");
    }

    /// Two different photos named the same both make it through.
    #[tokio::test]
    async fn photos_with_the_same_file_name() {
        let source = common::setup().await;
        let phone = common::photo(&source.root.join("phone"), "bottle.jpg", b"oban").await;
        let camera = common::photo(&source.root.join("camera"), "bottle.jpg", b"jura").await;

        let mut oban = Whisky::new("Oban", "14");
        oban.photo_path = Some(phone.to_string());
        source.db.save_whisky(&oban).await.unwrap();
        let mut jura = Whisky::new("Jura", "10");
        jura.photo_path = Some(camera.to_string());
        source.db.save_whisky(&jura).await.unwrap();

        let archive = export(&source).await;
        let target = common::setup().await;
        let result = import(&target, &archive).await;
        assert_eq!(result.photos_imported, 2);
        assert!(result.is_clean(), "{:?}", result.errors);

        let photo_of = |whisky: Whisky| whisky.photo_path().unwrap();
        let oban = photo_of(target.db.whisky(oban.id).await.unwrap().unwrap());
        let jura = photo_of(target.db.whisky(jura.id).await.unwrap().unwrap());
        assert_ne!(oban, jura);
        assert_eq!(tokio::fs::read(oban).await.unwrap(), b"oban");
        assert_eq!(tokio::fs::read(jura).await.unwrap(), b"jura");
    }

    /// An imported id that's taken by some other record gets replaced.
    #[tokio::test]
    async fn colliding_ids_get_fresh_ones() {
        let setup = common::setup().await;
        let sample = common::fill_sample(&setup).await;

        let mut whisky = whisky_json(
            "Glen Scotia",
            "Victoriana",
            vec![tasting_json(sample.third.id, "2025-01-01", "", 6.3)],
        );
        whisky["id"] = json!(sample.talisker.id);
        let archive = hand_made_archive(
            &setup.root.join("incoming"),
            Some(&manifest(json!([whisky]))),
            &[],
        );
        let result = import(&setup, &archive).await;
        assert_eq!(result.whiskies_imported, 1);
        assert_eq!(result.tastings_imported, 1);

        // the existing ones weren't touched
        let talisker = setup.db.whisky(sample.talisker.id).await.unwrap().unwrap();
        assert_eq!(talisker, sample.talisker);
        let third = setup.db.tasting(sample.third.id).await.unwrap().unwrap();
        assert_eq!(third, sample.third);

        let collection = setup.db.whiskies_with_tastings().await.unwrap();
        let scotia = collection
            .iter()
            .find(|w| w.whisky.distillery == "Glen Scotia")
            .unwrap();
        assert_ne!(scotia.whisky.id, sample.talisker.id);
        assert_eq!(scotia.tastings.len(), 1);
        assert_ne!(scotia.tastings[0].id, sample.third.id);
    }

    /// A cancelled import stops, reports it, and still cleans up.
    #[tokio::test]
    async fn cancelled_import() {
        let source = common::setup().await;
        common::fill_sample(&source).await;
        let archive = export(&source).await;

        let target = common::setup().await;
        let cancel = CancelFlag::new();
        cancel.cancel();

        let result = ArchiveReader::new(&target.db, &target.config)
            .with_cancel(cancel)
            .import(&archive)
            .await;

        assert_eq!(result.whiskies_imported, 0);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("cancelled"));
        assert_eq!(scratch_leftovers(&target), 0);
    }
}
