use std::path::PathBuf;

use serde::Serialize;
use vn_formats::ScriptCollection;

use crate::unlock::UnlockLedger;

/// Menu-facing view of every scenario under the scripts root, with its
/// unlock state. The first scenario (lexicographically by key) is always
/// playable; the rest consult the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioCatalog {
    entries: Vec<ScenarioEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioEntry {
    pub key: String,
    pub title: String,
    pub path: PathBuf,
    pub unlocked: bool,
}

impl ScenarioCatalog {
    pub fn build(collection: &ScriptCollection, ledger: &UnlockLedger) -> Self {
        let entries = collection
            .iter()
            .enumerate()
            .map(|(index, (key, loaded))| ScenarioEntry {
                key: key.clone(),
                title: loaded.script.title.clone(),
                path: loaded.path.clone(),
                unlocked: index == 0 || ledger.is_unlocked(key),
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[ScenarioEntry] {
        &self.entries
    }

    pub fn is_unlocked(&self, key: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.key == key && entry.unlocked)
    }

    /// One line per scenario, in menu order.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&format!(
                "{:<8} {} ({})\n",
                if entry.unlocked { "unlocked" } else { "locked" },
                entry.key,
                entry.title,
            ));
        }
        out
    }
}
