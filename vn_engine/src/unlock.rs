use std::collections::BTreeMap;

use log::{info, warn};

use crate::events::EventLogHandle;
use crate::prefs::PrefsStore;

const UNLOCK_PREFIX: &str = "scenario.unlocked.";
const LAST_OUTCOME_KEY: &str = "outcome.last_category";

/// Which scenarios the player has opened up, durable across runs through
/// the preferences store. Unknown keys are locked.
pub struct UnlockLedger {
    store: PrefsStore,
}

impl UnlockLedger {
    pub fn new(store: PrefsStore) -> Self {
        Self { store }
    }

    pub fn is_unlocked(&self, scenario_key: &str) -> bool {
        self.store
            .get_bool(&format!("{UNLOCK_PREFIX}{scenario_key}"), false)
    }

    /// Idempotent: unlocking twice leaves the same ledger state as once.
    pub fn unlock(&mut self, scenario_key: &str) {
        self.store
            .set_bool(&format!("{UNLOCK_PREFIX}{scenario_key}"), true);
        info!("unlocked scenario {scenario_key}");
    }

    /// Maps the run's leading category through the scenario's outcome
    /// table and unlocks the target. Returns the unlocked key, or None
    /// when the category has no mapping (logged, ignored).
    pub fn unlock_by_outcome(
        &mut self,
        category: &str,
        outcomes: &BTreeMap<String, String>,
        events: &EventLogHandle,
    ) -> Option<String> {
        let Some(scenario_key) = outcomes.get(category) else {
            warn!("no scenario outcome mapped for category {category}");
            events
                .borrow_mut()
                .log(format!("scenario.unlock.unmapped {category}"));
            return None;
        };
        self.unlock(scenario_key);
        self.store.set_string(LAST_OUTCOME_KEY, category);
        events
            .borrow_mut()
            .log(format!("scenario.unlock {scenario_key}"));
        Some(scenario_key.clone())
    }

    pub fn last_outcome(&self) -> Option<String> {
        let value = self.store.get_string(LAST_OUTCOME_KEY, "");
        (!value.is_empty()).then_some(value)
    }

    pub fn store(&self) -> &PrefsStore {
        &self.store
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.store.save()
    }
}
