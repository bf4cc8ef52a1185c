/*! # `snifter`

The backend of a whisky-tasting journal.

## Purpose

This crate keeps track of bottles ("whiskies") and the tasting sessions
recorded for each of them: scores, notes, aroma tags, and photos. The mobile
UI sits on top and talks to it through plain async calls.

Its main job is moving the whole collection between installations. An export
packs everything into one ZIP archive (a `data.json` manifest plus the
photos), and an import merges such an archive back in without ever creating
duplicates or touching what's already there.

## Usage

Build a [`config::Config`], open a [`database::Database`] with it, and hand
both to a [`journal::Journal`]:

```no_run
# async fn f() -> Result<(), snifter::error::JournalError> {
use camino::Utf8Path;
use snifter::{config::Config, database::Database, journal::Journal};

let config = Config::from_disk(Utf8Path::new("/data/user/0/snifter/files")).await?;
let db = Database::open(&config).await?;
db.seed_aroma_tags_if_empty().await?;

let journal = Journal::new(db, config);
let archive = journal.export_collection().await?;
let result = journal.import_collection(&archive).await;
assert!(result.is_clean());
# Ok(())
# }
```

## Status

- [x] Export and merge-import of the whole collection
- [x] Searching and sorting the collection
- [x] Statistics
*/

pub mod archive;
pub mod config;
pub mod database;
pub mod error;
pub mod journal;
pub mod models;
pub mod search;
pub mod stats;
