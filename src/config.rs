use camino::{Utf8Path, Utf8PathBuf};

use crate::{
    database::JOURNAL_DB_FILE,
    error::{bug_msg, ConfigError},
};

/// Where the config lives, relative to the data directory.
const CONFIG_FILE: &str = "shared_prefs/config.toml";

/// The journal's on-disk layout, plus some info for bug reports.
///
/// The app builds one of these at startup and hands it to whatever needs it.
/// There's no global copy.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
pub struct Config {
    /// Path to the app's data directory.
    ///
    /// The database, managed photos, and backups all live in here.
    pub data_dir: Utf8PathBuf,

    /// Path to the app's cache directory.
    pub cache_dir: Utf8PathBuf,

    /// Information for automatically reporting bugs.
    pub bug_report_info: BugReportInfo,
}

impl Config {
    pub fn new(
        data_dir: Utf8PathBuf,
        cache_dir: Utf8PathBuf,
        bug_report_info: BugReportInfo,
    ) -> Self {
        Self {
            data_dir,
            cache_dir,
            bug_report_info,
        }
    }

    /// Attempts to read a previous `Config` from disk.
    ///
    /// Note that this may fail across versions, requiring new configs.
    #[tracing::instrument]
    pub async fn from_disk(data_dir: &Utf8Path) -> Result<Self, ConfigError> {
        // read the config from disk
        let s = tokio::fs::read_to_string(data_dir.join(CONFIG_FILE))
            .await
            .map_err(ConfigError::ReadFailed)?;

        // parse with `toml` crate
        let s: Self = toml::from_str(s.as_str()).map_err(ConfigError::ParseFailed)?;

        // ensure paths are equal
        if s.data_dir.as_path() != data_dir {
            tracing::error!(
                "loaded config from disk, but it had some weird paths. {}",
                bug_msg(&s.bug_report_info)
            );
            return Err(ConfigError::PathMismatch);
        }

        Ok(s)
    }

    /// Writes this config to disk, where [`Config::from_disk`] will find it.
    #[tracing::instrument(skip(self))]
    pub async fn save_to_disk(&self) -> Result<(), ConfigError> {
        let path = self.data_dir.join(CONFIG_FILE);
        let s = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ConfigError::WriteFailed)?;
        }

        tokio::fs::write(&path, s)
            .await
            .inspect_err(|e| tracing::warn!("Failed to save config to `{path}`. err: {e}"))
            .map_err(ConfigError::WriteFailed)?;
        Ok(())
    }

    /// The SQLite file backing the journal.
    pub fn database_path(&self) -> Utf8PathBuf {
        self.data_dir.join(JOURNAL_DB_FILE)
    }

    /// The managed photo directory. Imported photos are copied in here.
    pub fn photo_dir(&self) -> Utf8PathBuf {
        self.data_dir.join("photos")
    }

    /// Where exported archives are written.
    pub fn backup_dir(&self) -> Utf8PathBuf {
        self.data_dir.join("backups")
    }

    /// Parent of the per-import scratch directories.
    pub fn scratch_root(&self) -> Utf8PathBuf {
        self.cache_dir.join("import_temp")
    }
}

/// Some info to help with bug reporting.
///
/// I really want this for telling users where to report bugs.
#[derive(Clone, Debug, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
pub struct BugReportInfo {
    pub app_name: String,
    pub app_version: String,

    pub target_triple: String,
    pub build_time: String,

    /// the device string (e.g. `Google Pixel 6 Pro (raven)`)
    pub device: String,
    /// that big string you get from an Android's `Build.DISPLAY` field
    pub display: String,

    pub commit: String,
    pub repo: String,
}
