//! Dataset commands: update, list, search, info, download and files

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use databrewer_core::catalog::{
    bootstrap_default_recipes, lookup, update_index, CatalogStore, FileIndex,
};
use databrewer_core::recipe::{resolve_files, FileSpec, NameSpec, Recipe};
use databrewer_core::transfer::{
    format_size, Downloader, NetworkDownloader, ProbeStatus, Transfer, TransferOptions,
    TransferOutcome,
};
use databrewer_core::{CatalogError, Settings, TransferError};

use crate::output::{self, DownloadProgress};

const NO_DATASETS: &str = "No datasets found.";

/// Open the index, failing when nothing has been indexed yet
fn open_index(settings: &Settings) -> Result<FileIndex> {
    let index = FileIndex::open(&settings.index_dir)?;
    if index.is_empty() {
        return Err(CatalogError::Empty.into());
    }
    Ok(index)
}

/// Resolve a `name[pattern]` spec to its recipe and selected files
fn select(settings: &Settings, spec: &str) -> Result<(Recipe, Vec<FileSpec>)> {
    let name_spec = NameSpec::parse(spec);
    let index = open_index(settings)?;
    let recipe = lookup(&index, &name_spec.recipe)?;
    let files = resolve_files(&recipe, &name_spec.pattern)?;
    debug!(recipe = %recipe.name, pattern = %name_spec.pattern, selected = files.len(), "Resolved name spec");
    Ok((recipe, files))
}

pub async fn update(settings: &Settings, recreate: bool, quiet: bool) -> Result<()> {
    if let Some(url) = &settings.recipes_default_url {
        let downloader = NetworkDownloader::new()?;
        let mut progress = DownloadProgress::with_label(quiet, "default recipes");
        let count = bootstrap_default_recipes(
            &downloader,
            url,
            &settings.default_recipes_dir(),
            &mut progress,
        )
        .await
        .context("Failed to fetch default recipes")?;
        info!(count, "Default recipes refreshed");
    } else {
        debug!("No default recipes URL configured, indexing local recipes only");
    }

    let mut index = FileIndex::open_or_create(&settings.index_dir, recreate)?;
    let count = update_index(&mut index, &settings.recipes_dir)?;
    if !quiet {
        println!("Indexed {count} recipes into {}", index.path().display());
    }
    Ok(())
}

pub fn list(settings: &Settings, json: bool) -> Result<()> {
    let recipes = open_index(settings)?.list()?;
    if recipes.is_empty() {
        bail!(NO_DATASETS);
    }
    output::print_recipes(&recipes, json)
}

pub fn search(settings: &Settings, query: &[String], json: bool) -> Result<()> {
    let query = query.join(" ");
    let recipes = open_index(settings)?.search(&query)?;
    if recipes.is_empty() {
        bail!(NO_DATASETS);
    }
    output::print_recipes(&recipes, json)
}

pub async fn info(settings: &Settings, spec: &str, check: bool) -> Result<()> {
    let (recipe, files) = select(settings, spec)?;
    if files.is_empty() && !NameSpec::parse(spec).selects_all() {
        return Err(CatalogError::FileNotFound(spec.to_string()).into());
    }

    output::print_recipe_header(&recipe);
    if files.is_empty() {
        return Ok(());
    }

    let downloader = if check {
        Some(NetworkDownloader::new()?)
    } else {
        None
    };
    let dataset_dir = settings.dataset_dir(&recipe.name);

    println!();
    println!("Files:");
    for file in &files {
        let mut line = format!("  {} - {}", file.name, file.url);
        if let Some(downloader) = &downloader {
            let label = check_label(downloader, &recipe, file).await;
            line.push_str(&format!(" [{label}]"));
        }
        println!("{line}");

        let local = dataset_dir.join(&file.filename);
        if local.exists() {
            println!("    {}", local.display());
        }
    }
    Ok(())
}

/// Availability label shown by `info --check`
async fn check_label(downloader: &dyn Downloader, recipe: &Recipe, file: &FileSpec) -> String {
    if recipe.restricted || file.restricted {
        return "restricted".to_string();
    }

    match downloader.probe(&file.url).await {
        ProbeStatus::Size(bytes) => format_size(bytes),
        ProbeStatus::Unknown => "unknown".to_string(),
        ProbeStatus::Status(code) => format!("status:{code}"),
        ProbeStatus::Failed(reason) => {
            debug!(url = %file.url, %reason, "Availability check failed");
            "check-failed".to_string()
        }
    }
}

pub async fn download(
    settings: &Settings,
    spec: &str,
    output_dir: Option<PathBuf>,
    force: bool,
    quiet: bool,
) -> Result<()> {
    let (recipe, files) = select(settings, spec)?;
    if files.is_empty() {
        return Err(CatalogError::FileNotFound(spec.to_string()).into());
    }

    println!("Selected Files:");
    output::print_files(&files);

    // Ask before the transfer future starts: Ctrl-C is not delivered during
    // a blocking stdin read. Restricted recipes are refused without asking.
    let approved =
        force || recipe.restricted || output::confirm("Confirm to download all the listed files");

    let options = TransferOptions {
        output_dir: output_dir.unwrap_or_else(|| settings.dataset_dir(&recipe.name)),
        force,
    };
    let downloader = NetworkDownloader::new()?;
    let cancel = Arc::new(AtomicBool::new(false));
    let transfer = Transfer::new(&downloader).with_cancel_flag(cancel.clone());
    let mut progress = DownloadProgress::new(quiet);

    let outcome = tokio::select! {
        result = transfer.run(&recipe, &files, &options, |_| approved, &mut progress) => result?,
        _ = tokio::signal::ctrl_c() => {
            cancel.store(true, Ordering::SeqCst);
            warn!(recipe = %recipe.name, "Download interrupted, partial files left in place");
            return Err(TransferError::Interrupted.into());
        }
    };

    match outcome {
        TransferOutcome::Declined => bail!("Aborted"),
        TransferOutcome::Completed(report) => {
            if !quiet {
                println!(
                    "Downloaded {} file(s), skipped {} in {}",
                    report.downloaded.len(),
                    report.skipped.len(),
                    options.output_dir.display()
                );
            }
            Ok(())
        }
    }
}

pub fn files(settings: &Settings, spec: &str) -> Result<()> {
    let (recipe, files) = select(settings, spec)?;
    if files.is_empty() {
        return Err(CatalogError::FileNotFound(spec.to_string()).into());
    }

    let dataset_dir = settings.dataset_dir(&recipe.name);
    for file in &files {
        println!("{}", dataset_dir.join(&file.filename).display());
    }
    Ok(())
}
