//! Integration tests for the catalog module

#[cfg(test)]
mod integration_tests {
    use crate::catalog::{lookup, update_index, CatalogStore, FileIndex};
    use crate::error::{BrewerError, CatalogError, RecipeError};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_recipe(dir: &Path, name: &str, content: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(format!("{name}.yaml")), content).unwrap();
    }

    /// Recipes from several directories end up searchable
    #[test]
    fn test_update_index_from_directories() {
        let temp = TempDir::new().unwrap();
        let defaults = temp.path().join("recipes");
        let extra = temp.path().join("mine");
        write_recipe(
            &defaults,
            "mnist",
            "name: mnist\ndescription: Handwritten digits\nkeywords: [images]\n",
        );
        write_recipe(&extra, "iris", "name: iris\ndescription: Flowers\n");

        let mut index = FileIndex::create(&temp.path().join("index"));
        let count = update_index(&mut index, &[defaults, extra]).unwrap();
        assert_eq!(count, 2);

        let reopened = FileIndex::open(&temp.path().join("index")).unwrap();
        assert_eq!(reopened.search("digits").unwrap()[0].name, "mnist");
        let iris = reopened.get("iris").unwrap().unwrap();
        assert!(iris.source.unwrap().ends_with("mine/iris.yaml"));
    }

    /// Later directories override earlier definitions of the same name
    #[test]
    fn test_later_directory_wins() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("first");
        let second = temp.path().join("second");
        write_recipe(&first, "iris", "name: iris\ndescription: old\n");
        write_recipe(&second, "iris-copy", "name: iris\ndescription: new\n");

        let mut index = FileIndex::create(&temp.path().join("index"));
        update_index(&mut index, &[first, second]).unwrap();

        let iris = index.get("iris").unwrap().unwrap();
        assert_eq!(iris.description.as_deref(), Some("new"));
    }

    /// A broken recipe aborts the update without touching the stored index
    #[test]
    fn test_parse_failure_aborts_update() {
        let temp = TempDir::new().unwrap();
        let recipes = temp.path().join("recipes");
        let index_dir = temp.path().join("index");
        write_recipe(&recipes, "good", "name: good\n");
        write_recipe(&recipes, "zbroken", "name: [oops\n");

        let mut index = FileIndex::create(&index_dir);
        let result = update_index(&mut index, &[recipes]);

        assert!(matches!(
            result,
            Err(BrewerError::Recipe(RecipeError::Parse { .. }))
        ));
        assert!(FileIndex::open(&index_dir).unwrap().is_empty());
    }

    #[test]
    fn test_lookup_distinguishes_empty_and_missing() {
        let temp = TempDir::new().unwrap();
        let recipes = temp.path().join("recipes");
        let mut index = FileIndex::create(&temp.path().join("index"));

        assert!(matches!(lookup(&index, "mnist"), Err(CatalogError::Empty)));

        write_recipe(&recipes, "mnist", "name: mnist\n");
        update_index(&mut index, &[recipes]).unwrap();

        assert_eq!(lookup(&index, "mnist").unwrap().name, "mnist");
        match lookup(&index, "cifar") {
            Err(CatalogError::RecipeNotFound(name)) => assert_eq!(name, "cifar"),
            other => panic!("expected RecipeNotFound, got {other:?}"),
        }
    }
}
