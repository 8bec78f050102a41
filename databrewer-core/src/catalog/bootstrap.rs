//! Fetching the default recipe collection
//!
//! The default recipes ship as a gzipped tarball. Only regular files are
//! kept, flattened to their basenames, so the archive's top-level directory
//! (`databrewer-recipes-master/` and the like) does not matter.

use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{BrewerError, CatalogError};
use crate::transfer::{Downloader, ProgressObserver};

/// Unpack every regular file of `archive` into `target`, returning how many
///
/// Existing files with the same name are overwritten.
pub fn extract_recipes(archive: &Path, target: &Path) -> Result<usize, CatalogError> {
    let archive_err = |source| CatalogError::Archive {
        path: archive.to_path_buf(),
        source,
    };

    fs::create_dir_all(target).map_err(|source| CatalogError::Io {
        path: target.to_path_buf(),
        source,
    })?;

    let file = File::open(archive).map_err(archive_err)?;
    let mut tarball = tar::Archive::new(GzDecoder::new(file));

    let mut extracted = 0;
    for entry in tarball.entries().map_err(archive_err)? {
        let mut entry = entry.map_err(archive_err)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = entry.path().map_err(archive_err)?.into_owned();
        let Some(name) = path.file_name() else {
            continue;
        };

        let dest = target.join(name);
        debug!(entry = %path.display(), dest = %dest.display(), "Extracting recipe");
        entry.unpack(&dest).map_err(archive_err)?;
        extracted += 1;
    }

    Ok(extracted)
}

/// Download the archive at `url` and extract it into `target`
pub async fn bootstrap_default_recipes(
    downloader: &dyn Downloader,
    url: &str,
    target: &Path,
    progress: &mut dyn ProgressObserver,
) -> Result<usize, BrewerError> {
    let temp = tempfile::tempdir().map_err(|source| CatalogError::Io {
        path: std::env::temp_dir(),
        source,
    })?;
    let archive = temp.path().join("recipes.tar.gz");

    info!(url, "Downloading default recipes");
    downloader.fetch(url, &archive, progress).await?;

    let count = extract_recipes(&archive, target)?;
    info!(count, target = %target.display(), "Extracted default recipes");
    Ok(count)
}
