use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// One scripted player input for a headless run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlannedAction {
    /// Click the advance control (also confirms the end of the scenario).
    Advance,
    /// Skip the typewriter mid-line.
    Skip,
    /// Pick the offered response at `index` (0 or 1).
    Select { index: usize },
    /// Let `frames` ticks pass without input.
    Wait { frames: u32 },
}

/// What to pick at a branch once the scripted plan has run dry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChoicePolicy {
    #[default]
    First,
    Last,
    Alternate,
}

impl ChoicePolicy {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(ChoicePolicy::First),
            "last" => Ok(ChoicePolicy::Last),
            "alternate" => Ok(ChoicePolicy::Alternate),
            other => Err(anyhow!("unknown choice policy: {other}")),
        }
    }
}

/// Maintains the scripted inputs in play order, plus the auto-play policy
/// that takes over when they run out.
#[derive(Debug, Clone)]
pub struct InputPlan {
    pending: VecDeque<PlannedAction>,
    history: Vec<PlannedAction>,
    policy: ChoicePolicy,
    alternate_flip: bool,
}

impl InputPlan {
    pub fn new<A>(actions: A, policy: ChoicePolicy) -> Self
    where
        A: IntoIterator<Item = PlannedAction>,
    {
        InputPlan {
            pending: actions.into_iter().collect(),
            history: Vec::new(),
            policy,
            alternate_flip: false,
        }
    }

    pub fn auto(policy: ChoicePolicy) -> Self {
        Self::new(Vec::new(), policy)
    }

    pub fn load(path: &Path, policy: ChoicePolicy) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading input plan {}", path.display()))?;
        let actions: Vec<PlannedAction> = serde_json::from_str(&text)
            .with_context(|| format!("parsing input plan {}", path.display()))?;
        Ok(Self::new(actions, policy))
    }

    pub fn peek(&self) -> Option<&PlannedAction> {
        self.pending.front()
    }

    pub fn next(&mut self) -> Option<PlannedAction> {
        let action = self.pending.pop_front()?;
        self.history.push(action);
        Some(action)
    }

    /// Branch choice when no `Select` is scripted: policy-driven over the
    /// number of offered responses.
    pub fn auto_choice(&mut self, offered: usize) -> usize {
        if offered == 0 {
            return 0;
        }
        match self.policy {
            ChoicePolicy::First => 0,
            ChoicePolicy::Last => offered - 1,
            ChoicePolicy::Alternate => {
                let index = if self.alternate_flip { offered - 1 } else { 0 };
                self.alternate_flip = !self.alternate_flip;
                index
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn history(&self) -> &[PlannedAction] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::{ChoicePolicy, InputPlan, PlannedAction};

    #[test]
    fn plan_preserves_order_and_history() {
        let mut plan = InputPlan::new(
            vec![
                PlannedAction::Skip,
                PlannedAction::Select { index: 1 },
                PlannedAction::Advance,
            ],
            ChoicePolicy::First,
        );

        assert_eq!(plan.peek(), Some(&PlannedAction::Skip));
        assert_eq!(plan.next(), Some(PlannedAction::Skip));
        assert_eq!(plan.next(), Some(PlannedAction::Select { index: 1 }));
        assert_eq!(plan.next(), Some(PlannedAction::Advance));
        assert_eq!(plan.next(), None);
        assert_eq!(plan.history().len(), 3);
    }

    #[test]
    fn plan_json_round_trips() {
        let json = r#"[
            { "action": "skip" },
            { "action": "select", "index": 0 },
            { "action": "wait", "frames": 30 },
            { "action": "advance" }
        ]"#;
        let actions: Vec<PlannedAction> = serde_json::from_str(json).expect("plan parses");
        assert_eq!(actions[1], PlannedAction::Select { index: 0 });
        assert_eq!(actions[2], PlannedAction::Wait { frames: 30 });
    }

    #[test]
    fn alternate_policy_flips_between_ends() {
        let mut plan = InputPlan::auto(ChoicePolicy::Alternate);
        assert_eq!(plan.auto_choice(2), 0);
        assert_eq!(plan.auto_choice(2), 1);
        assert_eq!(plan.auto_choice(2), 0);
    }

    #[test]
    fn policy_parse_rejects_unknown_values() {
        assert_eq!(
            ChoicePolicy::parse("LAST").expect("parse"),
            ChoicePolicy::Last
        );
        assert!(ChoicePolicy::parse("random").is_err());
    }
}
