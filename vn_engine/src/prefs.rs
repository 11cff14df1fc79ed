use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Keys the settings screens persist alongside the unlock ledger.
pub const GLOBAL_VOLUME_KEY: &str = "volume.global";
pub const BGM_VOLUME_KEY: &str = "volume.bgm";
pub const SFX_VOLUME_KEY: &str = "volume.sfx";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Bool(bool),
    Float(f64),
    Text(String),
}

/// Durable key-value settings, persisted as pretty JSON. A missing file is
/// an empty store; every mutation stays in memory until `save`.
#[derive(Debug, Clone)]
pub struct PrefsStore {
    path: PathBuf,
    values: BTreeMap<String, PrefValue>,
}

impl PrefsStore {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.is_file() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading preferences from {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing preferences in {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, values })
    }

    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.values)
            .context("serializing preferences to JSON")?;
        fs::write(&self.path, json)
            .with_context(|| format!("writing preferences to {}", self.path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        match self.values.get(key) {
            Some(PrefValue::Text(value)) => value.clone(),
            _ => default.to_string(),
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(PrefValue::Bool(value)) => *value,
            _ => default,
        }
    }

    pub fn get_float(&self, key: &str, default: f64) -> f64 {
        match self.values.get(key) {
            Some(PrefValue::Float(value)) => *value,
            _ => default,
        }
    }

    pub fn set_string(&mut self, key: &str, value: &str) {
        self.values
            .insert(key.to_string(), PrefValue::Text(value.to_string()));
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.values.insert(key.to_string(), PrefValue::Bool(value));
    }

    pub fn set_float(&mut self, key: &str, value: f64) {
        self.values.insert(key.to_string(), PrefValue::Float(value));
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }
}
