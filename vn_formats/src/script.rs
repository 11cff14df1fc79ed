use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Named portrait position on the dialogue stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotId {
    Left,
    CenterLeft,
    Center,
    CenterRight,
    Right,
}

impl SlotId {
    pub fn label(&self) -> &'static str {
        match self {
            SlotId::Left => "left",
            SlotId::CenterLeft => "center_left",
            SlotId::Center => "center",
            SlotId::CenterRight => "center_right",
            SlotId::Right => "right",
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which portrait slots a scenario stages. The three-slot layout is the
/// common case; the five-slot layout adds the two intermediate positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotLayout {
    Trio,
    Quintet,
}

impl SlotLayout {
    pub fn slots(&self) -> &'static [SlotId] {
        match self {
            SlotLayout::Trio => &[SlotId::Left, SlotId::Center, SlotId::Right],
            SlotLayout::Quintet => &[
                SlotId::Left,
                SlotId::CenterLeft,
                SlotId::Center,
                SlotId::CenterRight,
                SlotId::Right,
            ],
        }
    }

    pub fn contains(&self, slot: SlotId) -> bool {
        self.slots().contains(&slot)
    }
}

/// Per-slot visual directives attached to a dialogue node.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortraitDirective {
    pub sprite: Option<String>,
    pub visible: bool,
    pub talking: bool,
    pub fade_in: bool,
    pub fade_out: bool,
    pub mirrored: bool,
}

/// A single dialogue line plus its presentation directives and transition
/// target. Exactly one of {responses, next, terminal} should claim the
/// outgoing transition; `ScenarioScript::validate` flags the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueNode {
    pub id: u32,
    pub text: String,
    #[serde(default)]
    pub responses: Vec<u32>,
    #[serde(default)]
    pub next: Option<u32>,
    #[serde(default)]
    pub terminal: bool,
    #[serde(default)]
    pub portraits: BTreeMap<SlotId, PortraitDirective>,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub background_fade_in: bool,
    #[serde(default)]
    pub background_fade_out: bool,
    #[serde(default)]
    pub text_color: Option<String>,
}

impl DialogueNode {
    pub fn has_responses(&self) -> bool {
        !self.responses.is_empty()
    }
}

/// A selectable branch option, tagged with the scoring category it feeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseOption {
    pub id: u32,
    pub text: String,
    pub category: String,
    #[serde(default)]
    pub next: Option<u32>,
    #[serde(default)]
    pub speaker_slot: Option<SlotId>,
}

/// One scenario's worth of dialogue content. Loaded once per run and
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioScript {
    pub key: String,
    pub title: String,
    pub layout: SlotLayout,
    pub start: u32,
    /// Leading tally category -> scenario key to unlock when the run ends.
    #[serde(default)]
    pub outcomes: BTreeMap<String, String>,
    pub dialogues: Vec<DialogueNode>,
    #[serde(default)]
    pub responses: Vec<ResponseOption>,
}

impl ScenarioScript {
    pub fn parse(input: &str) -> Result<Self> {
        serde_json::from_str(input).context("parsing scenario script JSON")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading scenario script {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Structural checks over the node/response tables. Returns every
    /// finding rather than stopping at the first.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        let mut dialogue_ids = BTreeSet::new();
        for node in &self.dialogues {
            if !dialogue_ids.insert(node.id) {
                issues.push(ValidationIssue::DuplicateDialogueId { id: node.id });
            }
        }
        let mut response_ids = BTreeSet::new();
        for response in &self.responses {
            if !response_ids.insert(response.id) {
                issues.push(ValidationIssue::DuplicateResponseId { id: response.id });
            }
        }

        if !dialogue_ids.contains(&self.start) {
            issues.push(ValidationIssue::MissingStartNode { id: self.start });
        }

        for node in &self.dialogues {
            // Responses and a next id cannot both claim the transition; a
            // terminal flag alongside responses is legal (it makes the node
            // terminal-eligible when a picked response has no next node).
            if node.has_responses() && node.next.is_some() {
                issues.push(ValidationIssue::ConflictingTransitions { id: node.id });
            } else if node.next.is_some() && node.terminal {
                issues.push(ValidationIssue::ShadowedTerminal { id: node.id });
            } else if !node.has_responses() && node.next.is_none() && !node.terminal {
                issues.push(ValidationIssue::DeadEnd { id: node.id });
            }

            if node.responses.len() > 2 {
                issues.push(ValidationIssue::TooManyResponses {
                    id: node.id,
                    count: node.responses.len(),
                });
            }

            if let Some(next) = node.next {
                if !dialogue_ids.contains(&next) {
                    issues.push(ValidationIssue::DanglingNext { id: node.id, next });
                }
            }

            for response in &node.responses {
                if !response_ids.contains(response) {
                    issues.push(ValidationIssue::DanglingResponse {
                        id: node.id,
                        response: *response,
                    });
                }
            }

            for slot in node.portraits.keys() {
                if !self.layout.contains(*slot) {
                    issues.push(ValidationIssue::SlotOutsideLayout {
                        id: node.id,
                        slot: *slot,
                    });
                }
            }
        }

        for response in &self.responses {
            if response.category.trim().is_empty() {
                issues.push(ValidationIssue::EmptyCategory {
                    response: response.id,
                });
            }
            if let Some(next) = response.next {
                if !dialogue_ids.contains(&next) {
                    issues.push(ValidationIssue::DanglingResponseNext {
                        response: response.id,
                        next,
                    });
                }
            }
            if let Some(slot) = response.speaker_slot {
                if !self.layout.contains(slot) {
                    issues.push(ValidationIssue::ResponseSlotOutsideLayout {
                        response: response.id,
                        slot,
                    });
                }
            }
        }

        issues
    }
}

/// A structural problem found in a scenario script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    DuplicateDialogueId { id: u32 },
    DuplicateResponseId { id: u32 },
    MissingStartNode { id: u32 },
    ConflictingTransitions { id: u32 },
    ShadowedTerminal { id: u32 },
    DeadEnd { id: u32 },
    TooManyResponses { id: u32, count: usize },
    DanglingNext { id: u32, next: u32 },
    DanglingResponse { id: u32, response: u32 },
    DanglingResponseNext { response: u32, next: u32 },
    SlotOutsideLayout { id: u32, slot: SlotId },
    ResponseSlotOutsideLayout { response: u32, slot: SlotId },
    EmptyCategory { response: u32 },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::DuplicateDialogueId { id } => {
                write!(f, "dialogue id {id} appears more than once")
            }
            ValidationIssue::DuplicateResponseId { id } => {
                write!(f, "response id {id} appears more than once")
            }
            ValidationIssue::MissingStartNode { id } => {
                write!(f, "start node {id} is not in the dialogue table")
            }
            ValidationIssue::ConflictingTransitions { id } => {
                write!(f, "dialogue {id} claims both responses and a next node")
            }
            ValidationIssue::ShadowedTerminal { id } => {
                write!(f, "dialogue {id} is terminal but its next node always wins")
            }
            ValidationIssue::DeadEnd { id } => {
                write!(f, "dialogue {id} has no responses, next node, or terminal flag")
            }
            ValidationIssue::TooManyResponses { id, count } => {
                write!(f, "dialogue {id} lists {count} responses (limit is 2)")
            }
            ValidationIssue::DanglingNext { id, next } => {
                write!(f, "dialogue {id} points at missing next node {next}")
            }
            ValidationIssue::DanglingResponse { id, response } => {
                write!(f, "dialogue {id} lists missing response {response}")
            }
            ValidationIssue::DanglingResponseNext { response, next } => {
                write!(f, "response {response} points at missing next node {next}")
            }
            ValidationIssue::SlotOutsideLayout { id, slot } => {
                write!(f, "dialogue {id} stages slot {slot} outside the layout")
            }
            ValidationIssue::ResponseSlotOutsideLayout { response, slot } => {
                write!(f, "response {response} names speaker slot {slot} outside the layout")
            }
            ValidationIssue::EmptyCategory { response } => {
                write!(f, "response {response} has an empty category tag")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u32) -> DialogueNode {
        DialogueNode {
            id,
            text: format!("line {id}"),
            responses: Vec::new(),
            next: None,
            terminal: false,
            portraits: BTreeMap::new(),
            background: None,
            background_fade_in: false,
            background_fade_out: false,
            text_color: None,
        }
    }

    fn response(id: u32, category: &str, next: Option<u32>) -> ResponseOption {
        ResponseOption {
            id,
            text: format!("choice {id}"),
            category: category.to_string(),
            next,
            speaker_slot: None,
        }
    }

    fn script(dialogues: Vec<DialogueNode>, responses: Vec<ResponseOption>) -> ScenarioScript {
        ScenarioScript {
            key: "scenario1".to_string(),
            title: "Scenario 1".to_string(),
            layout: SlotLayout::Trio,
            start: dialogues.first().map(|node| node.id).unwrap_or(0),
            outcomes: BTreeMap::new(),
            dialogues,
            responses,
        }
    }

    #[test]
    fn parse_round_trips_minimal_script() {
        let json = r#"{
            "key": "scenario1",
            "title": "Scenario 1",
            "layout": "trio",
            "start": 1,
            "dialogues": [
                { "id": 1, "text": "Hello.", "next": 2 },
                { "id": 2, "text": "Goodbye.", "terminal": true }
            ]
        }"#;

        let script = ScenarioScript::parse(json).expect("script parses");
        assert_eq!(script.dialogues.len(), 2);
        assert_eq!(script.dialogues[0].next, Some(2));
        assert!(script.dialogues[1].terminal);
        assert!(script.validate().is_empty());
    }

    #[test]
    fn validate_flags_conflicting_transitions() {
        let mut branching = node(1);
        branching.responses = vec![10, 11];
        branching.next = Some(2);
        let mut end = node(2);
        end.terminal = true;

        let script = script(
            vec![branching, end],
            vec![response(10, "A", Some(2)), response(11, "B", Some(2))],
        );

        assert_eq!(
            script.validate(),
            vec![ValidationIssue::ConflictingTransitions { id: 1 }]
        );
    }

    #[test]
    fn validate_flags_dangling_references() {
        let mut first = node(1);
        first.next = Some(99);
        let script = script(vec![first], Vec::new());

        let issues = script.validate();
        assert!(issues.contains(&ValidationIssue::DanglingNext { id: 1, next: 99 }));
        // A node whose only transition target is missing still claims one.
        assert!(!issues
            .iter()
            .any(|issue| matches!(issue, ValidationIssue::DeadEnd { .. })));
    }

    #[test]
    fn validate_flags_slots_outside_layout() {
        let mut first = node(1);
        first.terminal = true;
        first
            .portraits
            .insert(SlotId::CenterLeft, PortraitDirective::default());
        let script = script(vec![first], Vec::new());

        assert_eq!(
            script.validate(),
            vec![ValidationIssue::SlotOutsideLayout {
                id: 1,
                slot: SlotId::CenterLeft,
            }]
        );
    }

    #[test]
    fn validate_flags_empty_category_and_wide_branch() {
        let mut branching = node(1);
        branching.responses = vec![10, 11, 12];
        let mut end = node(2);
        end.terminal = true;

        let script = script(
            vec![branching, end],
            vec![
                response(10, "A", Some(2)),
                response(11, " ", Some(2)),
                response(12, "B", Some(2)),
            ],
        );

        let issues = script.validate();
        assert!(issues.contains(&ValidationIssue::TooManyResponses { id: 1, count: 3 }));
        assert!(issues.contains(&ValidationIssue::EmptyCategory { response: 11 }));
    }
}
