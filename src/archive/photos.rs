//! Photos, as they travel between the photo directory and an archive.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

use super::PHOTOS_PREFIX;

/// A photo to put into an archive.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PhotoEntry {
    /// Where it goes inside the archive, like `photos/bottle.jpg`.
    pub entry_name: String,

    /// Where the bytes are read from.
    pub source: Utf8PathBuf,
}

/// The archive entry name for a photo on disk: `photos/<file name>`.
///
/// Returns `None` for paths without a file name.
pub fn entry_name(path: &Utf8Path) -> Option<String> {
    path.file_name()
        .map(|file_name| format!("{PHOTOS_PREFIX}/{file_name}"))
}

/// Like [`entry_name`], with `_<n>` added to the file stem:
/// `photos/bottle_2.jpg`.
pub fn numbered_entry_name(path: &Utf8Path, n: usize) -> Option<String> {
    let stem = path.file_stem()?;

    Some(match path.extension() {
        Some(extension) => format!("{PHOTOS_PREFIX}/{stem}_{n}.{extension}"),
        None => format!("{PHOTOS_PREFIX}/{stem}_{n}"),
    })
}

/// Finds a manifest's photo reference inside an extracted archive.
///
/// References that try to leave `root` (absolute paths, `..`) never resolve.
/// Doesn't check that the file is actually there.
pub(crate) fn resolve(root: &Utf8Path, reference: &str) -> Option<Utf8PathBuf> {
    let reference = Utf8Path::new(reference);

    let mut components = reference.components().peekable();
    components.peek()?;
    if !components.all(|c| matches!(c, Utf8Component::Normal(_))) {
        tracing::warn!("Photo reference `{reference}` points outside the archive. Ignoring it.");
        return None;
    }

    Some(root.join(reference))
}

/// Copies a photo into the photo directory, under its own file name.
///
/// An existing file with that name is overwritten, since it's the same photo
/// coming back. Returns the photo's new path.
pub(crate) async fn copy_into(
    source: &Utf8Path,
    photo_dir: &Utf8Path,
) -> Result<Utf8PathBuf, std::io::Error> {
    let Some(file_name) = source.file_name() else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("photo path `{source}` has no file name"),
        ));
    };

    let destination = photo_dir.join(file_name);
    tokio::fs::copy(source, &destination).await?;

    tracing::debug!("Copied photo `{source}` to `{destination}`.");
    Ok(destination)
}
