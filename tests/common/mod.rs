//! The parent of the other tests.
//!
//! Mostly to import the setup stuff below.

#![allow(dead_code, reason = "each test binary uses a different part of this")]

use std::str::FromStr as _;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;
use snifter::{
    config::{BugReportInfo, Config},
    database::{Database, Store as _},
    models::{AromaCategory, AromaTag, SenseType, TastingAroma, TastingEntry, Whisky},
};
use temp_dir::TempDir;
use tracing_subscriber::{filter, layer::SubscriberExt as _, util::SubscriberInitExt as _, Layer};

/// Everything one test needs: a private data directory, its config, and an
/// open database.
///
/// Keep this alive for the whole test. Dropping it deletes the directory.
pub struct Setup {
    pub dir: TempDir,
    pub root: Utf8PathBuf,
    pub config: Config,
    pub db: Database,
}

/// call this at the top of any new test func! :)
pub async fn setup() -> Setup {
    start_logging();

    let dir = TempDir::new().expect("create temp dir");
    let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("temp dir is utf-8");

    let config = Config::new(
        root.join("data"),
        root.join("cache"),
        new_bug_report_info_testing(),
    );
    let db = Database::open(&config).await.expect("open database");

    Setup {
        dir,
        root,
        config,
        db,
    }
}

/// Starts logging, unless another test in this binary already did.
pub fn start_logging() {
    _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_test_writer()
                .with_filter(filter::EnvFilter::from_str("DEBUG,sqlx=INFO").unwrap()),
        )
        .try_init();
}

/// Sample bug report information for usage in tests, to decrease
/// verbosity.
pub fn new_bug_report_info_testing() -> BugReportInfo {
    BugReportInfo {
        app_name: "bug report info testing info".to_string(),
        app_version: "0.1.0".to_string(),
        device: "desktop".to_string(),
        display: "lineage_and_some_other_stuff".to_string(),
        target_triple: "x86_64-farts-gnu".to_string(),
        commit: "unknown".to_string(),
        repo: "https://example.com/snifter".to_string(),
        build_time: "unknown".to_string(),
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Writes a small fake photo and returns its path.
pub async fn photo(dir: &Utf8Path, name: &str, bytes: &[u8]) -> Utf8PathBuf {
    tokio::fs::create_dir_all(dir).await.expect("make photo dir");
    let path = dir.join(name);
    tokio::fs::write(&path, bytes).await.expect("write photo");
    path
}

/// A little collection to export:
///
/// - Talisker 10, with two tastings (one with a photo, one with an override)
/// - Lagavulin 16, with one tasting
/// - Ardbeg Ten, untasted
pub struct Sample {
    pub talisker: Whisky,
    pub lagavulin: Whisky,
    pub ardbeg: Whisky,
    pub first: TastingEntry,
    pub second: TastingEntry,
    pub third: TastingEntry,
    pub peat: AromaTag,
    pub honey: AromaTag,
    pub photo_bytes: Vec<u8>,
}

pub async fn fill_sample(setup: &Setup) -> Sample {
    let db = &setup.db;
    let photo_bytes = b"\xFF\xD8\xFF not really a jpeg".to_vec();
    let bottle = photo(
        &setup.root.join("camera"),
        "talisker_first.jpg",
        &photo_bytes,
    )
    .await;

    let peat = AromaTag::new("Peat", AromaCategory::SmokePeat);
    let honey = AromaTag::new("Honey", AromaCategory::Sweet);
    db.insert_aroma_tags(&[peat.clone(), honey.clone()])
        .await
        .unwrap();

    let mut talisker = Whisky::new("Talisker", "10");
    talisker.country = "Scotland".into();
    talisker.region = "Islands".into();
    talisker.age = Some(10);
    talisker.abv = Some(45.8);
    let mut lagavulin = Whisky::new("Lagavulin", "16");
    lagavulin.country = "Scotland".into();
    lagavulin.region = "Islay".into();
    let ardbeg = Whisky::new("Ardbeg", "Ten");
    for w in [&talisker, &lagavulin, &ardbeg] {
        db.save_whisky(w).await.unwrap();
    }

    let mut first = TastingEntry::new(talisker.id, date(2024, 1, 5), "", 6.0, 7.0, 5.0);
    first.bottle_photo_path = Some(bottle.to_string());
    first.nose_notes = Some("sea spray".into());
    let mut second = TastingEntry::new(talisker.id, date(2024, 2, 1), "at Sam's", 8.0, 8.0, 7.0);
    second.overall_score_user = Some(9.0);
    second.price = "12 EUR".into();
    let third = TastingEntry::new(lagavulin.id, date(2024, 3, 9), "", 9.0, 9.0, 9.0);

    db.save_tasting_with_aromas(
        &first,
        &[
            TastingAroma::new(first.id, peat.id, SenseType::Nose),
            TastingAroma::new(first.id, honey.id, SenseType::Palate),
            TastingAroma::new(first.id, peat.id, SenseType::Finish),
        ],
    )
    .await
    .unwrap();
    db.save_tasting_with_aromas(&second, &[]).await.unwrap();
    db.save_tasting_with_aromas(
        &third,
        &[TastingAroma::new(third.id, peat.id, SenseType::Nose)],
    )
    .await
    .unwrap();

    Sample {
        talisker,
        lagavulin,
        ardbeg,
        first,
        second,
        third,
        peat,
        honey,
        photo_bytes,
    }
}
