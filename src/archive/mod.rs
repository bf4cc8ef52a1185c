//! Moves the whole collection in and out of a single archive file.
//!
//! An archive is a ZIP file with a `data.json` manifest (see
//! [`ExportDocument`]) and one `photos/<file>` entry per photo the manifest
//! points at. [`ArchiveWriter`] makes them, and [`ArchiveReader`] merges them
//! back into a store without duplicating anything.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::error::ArchiveError;

pub mod document;
pub mod photos;
pub mod reader;
mod scratch;
pub mod writer;

pub use document::{ExportDocument, TastingDocument, WhiskyDocument};
pub use reader::ArchiveReader;
pub use writer::ArchiveWriter;

/// The archive entry holding the manifest.
pub const MANIFEST_ENTRY: &str = "data.json";

/// The folder, inside the archive, that photos are written to.
pub const PHOTOS_PREFIX: &str = "photos";

/// The manifest version this crate writes.
pub const MANIFEST_VERSION: &str = "1.0";

/// A cooperative stop button for a running export or import.
///
/// Clones share the same flag. Runs check it between whiskies.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks whatever's running to stop at its next check.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clears a previous request, so the flag can be used for another run.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Fails with [`ArchiveError::Cancelled`] once a stop was requested.
    pub(crate) fn check(&self) -> Result<(), ArchiveError> {
        if self.is_cancelled() {
            tracing::info!("Stopping early, since the run was cancelled.");
            return Err(ArchiveError::Cancelled);
        }

        Ok(())
    }
}

/// What an import did.
///
/// A structural failure (unreadable archive, bad manifest) gives zero counts
/// and a single error. Soft failures, like a missing photo, only add a
/// message.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub whiskies_imported: usize,
    pub tastings_imported: usize,
    pub photos_imported: usize,
    pub errors: Vec<String>,
}

impl ImportResult {
    /// A result for an import that didn't get anywhere.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
            ..Default::default()
        }
    }

    /// Whether nothing went wrong at all.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}
