//! Downloading a selection of recipe files into a directory
//!
//! Per batch: refuse restricted recipes, ask for confirmation unless forced,
//! then fetch each file in order. A file is written to `<filename>.part` and
//! renamed into place only once complete, so an interrupted or failed
//! transfer never leaves a file that looks finished.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::downloader::Downloader;
use super::progress::ProgressObserver;
use crate::error::TransferError;
use crate::recipe::{FileSpec, Recipe};

/// Suffix of in-progress downloads
pub const PART_SUFFIX: &str = ".part";

/// Where `file` is written while downloading into `dir`
pub fn part_path(dir: &Path, file: &FileSpec) -> PathBuf {
    dir.join(format!("{}{PART_SUFFIX}", file.filename))
}

/// Options for one batch
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Directory the files are written to
    pub output_dir: PathBuf,
    /// Skip confirmation and overwrite existing files
    pub force: bool,
}

/// What a completed batch did
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TransferReport {
    /// Final paths of the files fetched
    pub downloaded: Vec<PathBuf>,
    /// Existing paths that were left alone
    pub skipped: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    Completed(TransferReport),
    /// The user answered no at the confirmation prompt
    Declined,
}

/// Drives a [`Downloader`] over a batch of files
pub struct Transfer<'a> {
    downloader: &'a dyn Downloader,
    cancel: Arc<AtomicBool>,
}

impl<'a> Transfer<'a> {
    pub fn new(downloader: &'a dyn Downloader) -> Self {
        Self {
            downloader,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Halt the batch before the next file once `flag` is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Download `files` of `recipe`
    ///
    /// `confirm` sees the full selection and is only called when not forced.
    /// The first failing file aborts the batch; its `.part` file is kept.
    pub async fn run<F>(
        &self,
        recipe: &Recipe,
        files: &[FileSpec],
        options: &TransferOptions,
        confirm: F,
        progress: &mut dyn ProgressObserver,
    ) -> Result<TransferOutcome, TransferError>
    where
        F: FnOnce(&[FileSpec]) -> bool,
    {
        if recipe.restricted {
            warn!(recipe = %recipe.name, "Refusing to download restricted dataset");
            return Err(TransferError::Restricted(recipe.name.clone()));
        }

        if !options.force && !confirm(files) {
            debug!(recipe = %recipe.name, "Download declined");
            return Ok(TransferOutcome::Declined);
        }

        let dir = &options.output_dir;
        fs::create_dir_all(dir).map_err(|source| TransferError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut report = TransferReport::default();
        for file in files {
            if self.cancel.load(Ordering::SeqCst) {
                return Err(TransferError::Interrupted);
            }

            let target = dir.join(&file.filename);
            if target.exists() && !options.force {
                debug!(file = %file.name, path = %target.display(), "Skipping existing file");
                progress.skipped(file, &target);
                report.skipped.push(target);
                continue;
            }

            self.fetch_one(file, &target, dir, progress)
                .await
                .map_err(|source| TransferError::Failed {
                    file: file.name.clone(),
                    source: Box::new(source),
                })?;
            progress.finished(file, &target);
            report.downloaded.push(target);
        }

        info!(
            recipe = %recipe.name,
            downloaded = report.downloaded.len(),
            skipped = report.skipped.len(),
            "Transfer completed"
        );
        Ok(TransferOutcome::Completed(report))
    }

    async fn fetch_one(
        &self,
        file: &FileSpec,
        target: &Path,
        dir: &Path,
        progress: &mut dyn ProgressObserver,
    ) -> Result<(), TransferError> {
        let part = part_path(dir, file);
        progress.started(file);

        let bytes = self.downloader.fetch(&file.url, &part, progress).await?;

        fs::rename(&part, target).map_err(|source| TransferError::Io {
            path: target.to_path_buf(),
            source,
        })?;

        info!(file = %file.name, bytes, path = %target.display(), "Downloaded file");
        Ok(())
    }
}
