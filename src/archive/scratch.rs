use camino::{Utf8Path, Utf8PathBuf};
use uuid::Uuid;

use crate::error::ArchiveError;

/// A private folder that an archive gets extracted into.
///
/// Every import gets its own. It's removed when this is dropped, no matter
/// how the import ended.
#[derive(Debug)]
pub(crate) struct ScratchDir {
    path: Utf8PathBuf,
}

impl ScratchDir {
    /// Creates a fresh, empty scratch folder under `root`.
    pub(crate) async fn create(root: &Utf8Path) -> Result<Self, ArchiveError> {
        let path = root.join(format!("import-{}", Uuid::new_v4()));

        // a leftover from a crashed run would be a surprise, but clear it anyway
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&path)
                .await
                .map_err(|e| ArchiveError::io(&path, e))?;
        }

        tokio::fs::create_dir_all(&path)
            .await
            .inspect_err(|e| {
                tracing::error!("Failed to create scratch directory `{path}`. err: {e}")
            })
            .map_err(|e| ArchiveError::io(&path, e))?;

        tracing::debug!("Created scratch directory at `{path}`.");
        Ok(Self { path })
    }

    pub(crate) fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!("Removed scratch directory at `{}`.", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (),
            Err(e) => tracing::warn!(
                "Failed to remove scratch directory at `{}`. err: {e}",
                self.path
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use temp_dir::TempDir;

    use super::*;

    #[tokio::test]
    async fn scratch_is_unique_and_removed_on_drop() {
        let root = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(root.path().to_path_buf()).unwrap();

        let a = ScratchDir::create(&root).await.unwrap();
        let b = ScratchDir::create(&root).await.unwrap();
        assert_ne!(a.path(), b.path());

        std::fs::write(a.path().join("data.json"), "{}").unwrap();
        let a_path = a.path().to_path_buf();
        drop(a);

        assert!(!a_path.exists(), "scratch dir should be gone");
        assert!(b.path().exists(), "other scratch dirs are left alone");
    }
}
