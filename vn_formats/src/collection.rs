use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use walkdir::WalkDir;

use crate::script::ScenarioScript;

/// Every scenario script found under a scripts root, keyed by scenario key.
#[derive(Debug, Clone)]
pub struct ScriptCollection {
    scripts: BTreeMap<String, LoadedScript>,
}

#[derive(Debug, Clone)]
pub struct LoadedScript {
    pub path: PathBuf,
    pub script: ScenarioScript,
}

impl ScriptCollection {
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            bail!("{} is not a directory", dir.display());
        }

        let mut paths: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case("json"))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        let mut scripts = BTreeMap::new();
        for path in paths {
            let script = ScenarioScript::load(&path)
                .with_context(|| format!("loading scenario script {}", path.display()))?;
            if let Some(previous) = scripts.insert(
                script.key.clone(),
                LoadedScript {
                    path: path.clone(),
                    script,
                },
            ) {
                bail!(
                    "scenario key {} defined by both {} and {}",
                    previous.script.key,
                    previous.path.display(),
                    path.display()
                );
            }
        }

        if scripts.is_empty() {
            bail!("no scenario scripts found in {}", dir.display());
        }

        Ok(Self { scripts })
    }

    pub fn get(&self, key: &str) -> Option<&ScenarioScript> {
        self.scripts.get(key).map(|loaded| &loaded.script)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &LoadedScript)> {
        self.scripts.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.scripts.keys()
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::ScriptCollection;

    const MINIMAL: &str = r#"{
        "key": "KEY",
        "title": "Test",
        "layout": "trio",
        "start": 1,
        "dialogues": [ { "id": 1, "text": "Hi.", "terminal": true } ]
    }"#;

    #[test]
    fn loads_scripts_recursively_and_keys_by_scenario() {
        let dir = tempfile::tempdir().expect("temp dir");
        let nested = dir.path().join("chapter2");
        fs::create_dir(&nested).expect("nested dir");
        fs::write(
            dir.path().join("intro.json"),
            MINIMAL.replace("KEY", "scenario1"),
        )
        .expect("write intro");
        fs::write(
            nested.join("followup.json"),
            MINIMAL.replace("KEY", "scenario2a"),
        )
        .expect("write followup");

        let collection = ScriptCollection::load_from_dir(dir.path()).expect("collection loads");
        assert_eq!(collection.len(), 2);
        assert!(collection.get("scenario1").is_some());
        assert!(collection.get("scenario2a").is_some());
        assert!(collection.get("scenario3").is_none());
    }

    #[test]
    fn rejects_duplicate_scenario_keys() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join("a.json"), MINIMAL.replace("KEY", "scenario1"))
            .expect("write a");
        fs::write(dir.path().join("b.json"), MINIMAL.replace("KEY", "scenario1"))
            .expect("write b");

        let err = ScriptCollection::load_from_dir(dir.path()).expect_err("duplicate key rejected");
        assert!(err.to_string().contains("scenario1"));
    }

    #[test]
    fn rejects_missing_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("nope");
        assert!(ScriptCollection::load_from_dir(&missing).is_err());
    }
}
