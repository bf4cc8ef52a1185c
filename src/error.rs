use core::error::Error;
use pisserror::Error;

use crate::config::BugReportInfo;

/// Stick this at the end of bug warnings/errors.
///
/// It helps users find out where to report bugs when looking at logs.
pub fn bug_msg(info: &BugReportInfo) -> String {
    format!(
        "this is a bug, so please report it! you can do so by heading to this git repo: {}",
        info.repo
    )
}

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("The database has encountered an error. See: `{_0}`")]
    DatabaseError(#[from] DatabaseError),

    #[error("Exporting or importing the collection failed. See: `{_0}`")]
    ArchiveError(#[from] ArchiveError),

    #[error("The journal's config is unusable. See: `{_0}`")]
    ConfigError(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to connect to the database. See: {_0}")]
    ConnectionError(String),

    #[error("Connected to the database, but migrating it failed. See: {_0}")]
    MigrationFailed(sqlx::migrate::MigrateError),

    #[error("Failed to complete database query. See: {_0}")]
    QueryFailed(#[from] sqlx::Error),

    #[error("Couldn't continue with database insertion. See: {_0}")]
    InsertionFailed(String),
}

/// Failures while writing or reading a collection archive.
///
/// During an import, only the structural ones end up here. Per-record
/// problems (like a missing photo) are collected as messages instead.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Another export or import is already running. Wait for it to finish first.")]
    Busy,

    #[error("The export or import was cancelled before it finished.")]
    Cancelled,

    #[error("File system operation failed at `{path}`. See: `{err}`")]
    Io { path: String, err: std::io::Error },

    #[error("The archive at `{path}` couldn't be read or written as a ZIP file. See: `{err}`")]
    Zip {
        path: String,
        err: zip::result::ZipError,
    },

    #[error("The archive doesn't contain a `data.json` manifest.")]
    ManifestMissing,

    #[error("Failed to parse the archive's `data.json` manifest. See: `{_0}`")]
    ManifestParse(serde_json::Error),

    #[error("Failed to encode the collection as a manifest. See: `{_0}`")]
    ManifestEncode(serde_json::Error),

    #[error("The manifest has version `{_0}`, which this app can't read.")]
    UnsupportedVersion(String),

    #[error("The database has encountered an error. See: `{_0}`")]
    DatabaseError(#[from] DatabaseError),

    #[error("A `tokio` task unexpectedly panicked. See: `{_0}`")]
    TokioJoinError(#[from] tokio::task::JoinError),
}

impl ArchiveError {
    /// Wraps an I/O error with the path it happened at.
    pub(crate) fn io(path: impl AsRef<str>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_string(),
            err,
        }
    }

    /// Wraps a ZIP error with the archive path it happened at.
    pub(crate) fn zip(path: impl AsRef<str>, err: zip::result::ZipError) -> Self {
        Self::Zip {
            path: path.as_ref().to_string(),
            err,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    /// during fs read from disk
    #[error("Failed to read config file. See: `{_0}`")]
    ReadFailed(#[from] tokio::io::Error),

    #[error("Failed to write config file. See: `{_0}`")]
    WriteFailed(std::io::Error),

    /// parsing
    #[error("Failed to parse config file. See: `{_0}`")]
    ParseFailed(#[from] toml::de::Error),

    #[error("Failed to encode the config for saving. See: `{_0}`")]
    EncodeFailed(#[from] toml::ser::Error),

    /// when we read from disk, the paths should be equal
    #[error("The config file had data paths that didn't match the current ones.")]
    PathMismatch,
}
