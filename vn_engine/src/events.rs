use std::cell::RefCell;
use std::rc::Rc;

use log::debug;
use serde::Serialize;

/// Ordered transcript of everything the runtime did, in dot-separated
/// marker form (`dialogue.start 7569`, `portrait.fade_in left`). This is
/// the primary observable output of a headless run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct EventLog {
    entries: Vec<String>,
}

impl EventLog {
    pub fn log(&mut self, entry: impl Into<String>) {
        let entry = entry.into();
        debug!("{entry}");
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|entry| entry.contains(needle))
    }
}

/// Shared handle: the session, presentation coordinator, and runner all
/// append to the same transcript on the single logical thread.
pub type EventLogHandle = Rc<RefCell<EventLog>>;

pub fn shared_log() -> EventLogHandle {
    Rc::new(RefCell::new(EventLog::default()))
}
