//! Config subcommands

use anyhow::Result;
use clap::Subcommand;

use databrewer_core::Settings;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the resolved configuration as YAML
    Show,
    /// Print the path of a single setting
    Get {
        /// One of: root_dir, index_dir, datasets_dir, recipes_dir, recipes_default_url
        key: String,
    },
}

impl ConfigCommand {
    pub fn execute(self, settings: &Settings) -> Result<()> {
        match self {
            ConfigCommand::Show => {
                print!("{}", settings.to_yaml()?);
                Ok(())
            }
            ConfigCommand::Get { key } => {
                for value in lookup(settings, &key)? {
                    println!("{value}");
                }
                Ok(())
            }
        }
    }
}

fn lookup(settings: &Settings, key: &str) -> Result<Vec<String>> {
    let values = match key {
        "root_dir" => vec![settings.root_dir.display().to_string()],
        "index_dir" => vec![settings.index_dir.display().to_string()],
        "datasets_dir" => vec![settings.datasets_dir.display().to_string()],
        "recipes_dir" => settings
            .recipes_dir
            .iter()
            .map(|dir| dir.display().to_string())
            .collect(),
        "recipes_default_url" => settings.recipes_default_url.iter().cloned().collect(),
        other => anyhow::bail!("Unknown setting '{other}'"),
    };
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn settings() -> Settings {
        Settings {
            root_dir: PathBuf::from("/data"),
            index_dir: PathBuf::from("/data/index"),
            datasets_dir: PathBuf::from("/data/datasets"),
            recipes_dir: vec![PathBuf::from("/data/recipes"), PathBuf::from("/mine")],
            recipes_default_url: None,
        }
    }

    #[test]
    fn test_lookup_known_keys() {
        let settings = settings();
        assert_eq!(lookup(&settings, "index_dir").unwrap(), vec!["/data/index"]);
        assert_eq!(
            lookup(&settings, "recipes_dir").unwrap(),
            vec!["/data/recipes", "/mine"]
        );
        assert!(lookup(&settings, "recipes_default_url").unwrap().is_empty());
    }

    #[test]
    fn test_lookup_unknown_key() {
        assert!(lookup(&settings(), "colour").is_err());
    }
}
