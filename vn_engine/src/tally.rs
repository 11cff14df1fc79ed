use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

/// Running count of scoring-category selections for one dialogue run.
///
/// Each response counts at most once: re-recording a response id that is
/// already marked selected is a no-op, so a twitchy double click cannot
/// inflate a category.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ResponseTally {
    counts: BTreeMap<String, u32>,
    selected: BTreeSet<u32>,
}

impl ResponseTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one selection. Returns false when the response id was
    /// already counted.
    pub fn record(&mut self, category: &str, response_id: u32) -> bool {
        if !self.selected.insert(response_id) {
            return false;
        }
        *self.counts.entry(category.to_string()).or_insert(0) += 1;
        true
    }

    pub fn count(&self, category: &str) -> u32 {
        self.counts.get(category).copied().unwrap_or(0)
    }

    pub fn is_selected(&self, response_id: u32) -> bool {
        self.selected.contains(&response_id)
    }

    /// The category with the strictly highest count. Ties resolve to the
    /// lexicographically first category; the BTreeMap enumeration order is
    /// the fixed tie-break order. None while the tally is empty.
    pub fn leading_category(&self) -> Option<&str> {
        let mut leader: Option<(&str, u32)> = None;
        for (category, count) in &self.counts {
            match leader {
                Some((_, best)) if *count <= best => {}
                _ => leader = Some((category.as_str(), *count)),
            }
        }
        leader.map(|(category, _)| category)
    }

    pub fn counts(&self) -> &BTreeMap<String, u32> {
        &self.counts
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn selections(&self) -> usize {
        self.selected.len()
    }
}

#[cfg(test)]
mod tests {
    use super::ResponseTally;

    #[test]
    fn record_accumulates_per_category() {
        let mut tally = ResponseTally::new();
        assert!(tally.record("A", 1));
        assert!(tally.record("A", 2));
        assert!(tally.record("B", 3));

        assert_eq!(tally.count("A"), 2);
        assert_eq!(tally.count("B"), 1);
        assert_eq!(tally.leading_category(), Some("A"));
    }

    #[test]
    fn repeat_of_same_response_counts_once() {
        let mut tally = ResponseTally::new();
        assert!(tally.record("A", 7));
        assert!(!tally.record("A", 7));
        assert!(!tally.record("B", 7));

        assert_eq!(tally.count("A"), 1);
        assert_eq!(tally.count("B"), 0);
        assert!(tally.is_selected(7));
        assert_eq!(tally.selections(), 1);
    }

    #[test]
    fn empty_tally_has_no_leader() {
        let tally = ResponseTally::new();
        assert_eq!(tally.leading_category(), None);
        assert_eq!(tally.count("A"), 0);
    }

    #[test]
    fn tie_resolves_to_lexicographically_first_category() {
        for _ in 0..16 {
            let mut tally = ResponseTally::new();
            tally.record("B", 1);
            tally.record("A", 2);
            assert_eq!(tally.leading_category(), Some("A"));
        }
    }

    #[test]
    fn strictly_higher_count_beats_earlier_category() {
        let mut tally = ResponseTally::new();
        tally.record("A", 1);
        tally.record("B", 2);
        tally.record("B", 3);
        assert_eq!(tally.leading_category(), Some("B"));
    }
}
