//! Terminal presentation: tables, progress bars and prompts

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::Path;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

use databrewer_core::recipe::{FileSpec, Recipe};
use databrewer_core::transfer::ProgressObserver;

const DESCRIPTION_WIDTH: usize = 60;

/// Table row for list and search results
#[derive(Tabled)]
struct RecipeRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Description")]
    description: String,
}

/// Table row for a recipe's files
#[derive(Tabled)]
struct FileRow {
    #[tabled(rename = "File")]
    name: String,
    #[tabled(rename = "URL")]
    url: String,
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let head: String = text.chars().take(width - 3).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

fn render<T: Tabled>(rows: &[T]) -> String {
    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string()
}

/// Print recipes as a table, or as a JSON array
pub fn print_recipes(recipes: &[Recipe], json: bool) -> Result<()> {
    if json {
        let values: Vec<serde_json::Value> = recipes
            .iter()
            .map(|recipe| {
                serde_json::json!({
                    "name": recipe.name,
                    "description": recipe.description,
                    "homepage": recipe.homepage,
                    "keywords": recipe.keywords,
                    "restricted": recipe.restricted,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
        return Ok(());
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .map(|recipe| RecipeRow {
            name: recipe.name.clone(),
            description: truncate(recipe.short_description(), DESCRIPTION_WIDTH),
        })
        .collect();
    println!("{}", render(&rows));
    Ok(())
}

/// Print a file selection as a table of names and URLs
pub fn print_files(files: &[FileSpec]) {
    let rows: Vec<FileRow> = files
        .iter()
        .map(|file| FileRow {
            name: file.name.clone(),
            url: file.url.clone(),
        })
        .collect();
    println!("{}", render(&rows));
}

/// Print the header fields of a recipe
pub fn print_recipe_header(recipe: &Recipe) {
    println!("Name:        {}", recipe.name);
    if let Some(description) = &recipe.description {
        let mut lines = description.lines();
        println!("Description: {}", lines.next().unwrap_or(""));
        for line in lines {
            println!("             {line}");
        }
    }
    if let Some(homepage) = &recipe.homepage {
        println!("Homepage:    {homepage}");
    }
    if !recipe.keywords.is_empty() {
        println!("Keywords:    {}", recipe.keywords.join(", "));
    }
    if recipe.restricted {
        println!("Restricted:  yes");
    }
}

/// Ask a yes/no question on the terminal, defaulting to yes
///
/// End of input counts as no.
pub fn confirm(prompt: &str) -> bool {
    print!("{prompt} [Y/n]: ");
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(0) | Err(_) => {
            println!();
            false
        }
        Ok(_) => parse_answer(&answer),
    }
}

fn parse_answer(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "" | "y" | "yes"
    )
}

/// Progress observer drawing one indicatif bar per file
pub struct DownloadProgress {
    quiet: bool,
    label: String,
    bar: Option<ProgressBar>,
}

impl DownloadProgress {
    pub fn new(quiet: bool) -> Self {
        Self::with_label(quiet, "")
    }

    /// Observer for a download that does not go through `started`
    pub fn with_label(quiet: bool, label: &str) -> Self {
        Self {
            quiet,
            label: label.to_string(),
            bar: None,
        }
    }

    fn bar(&mut self) -> &ProgressBar {
        let quiet = self.quiet;
        let label = self.label.clone();
        self.bar.get_or_insert_with(|| {
            if quiet {
                return ProgressBar::hidden();
            }
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} {msg} {bytes:>8}/{total_bytes:8} [{wide_bar}] {bytes_per_sec}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
            );
            bar.set_message(label);
            bar
        })
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl ProgressObserver for DownloadProgress {
    fn started(&mut self, file: &FileSpec) {
        self.finish();
        self.label = file.filename.clone();
    }

    fn advanced(&mut self, bytes: u64, total: Option<u64>) {
        let bar = self.bar();
        if let Some(total) = total {
            if bar.length() != Some(total) {
                bar.set_length(total);
            }
        }
        bar.set_position(bytes);
    }

    fn finished(&mut self, _file: &FileSpec, path: &Path) {
        self.finish();
        if !self.quiet {
            println!("Saved {}", path.display());
        }
    }

    fn skipped(&mut self, file: &FileSpec, _path: &Path) {
        println!("File '{}' already exists. Skipping.", file.filename);
    }
}

impl Drop for DownloadProgress {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer_defaults_to_yes() {
        assert!(parse_answer("\n"));
        assert!(parse_answer("Y\n"));
        assert!(parse_answer("yes"));
        assert!(!parse_answer("n\n"));
        assert!(!parse_answer("nope"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long description", 10), "a long ...");
    }
}
