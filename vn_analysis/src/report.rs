use std::collections::BTreeMap;

use serde::Serialize;
use vn_formats::{ScenarioScript, ScriptCollection};

use crate::graph::walk_script;

/// Combined structural-validation and graph findings for one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptReport {
    pub key: String,
    pub title: String,
    pub node_count: usize,
    pub response_count: usize,
    pub issues: Vec<String>,
    pub unreachable_nodes: Vec<u32>,
    pub terminal_reachable: bool,
    pub branch_nodes: u32,
    pub category_capacity: BTreeMap<String, u32>,
}

impl ScriptReport {
    pub fn finding_count(&self) -> usize {
        self.issues.len() + self.unreachable_nodes.len() + usize::from(!self.terminal_reachable)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{} ({}): {} node(s), {} response(s), {} branch point(s)\n",
            self.key, self.title, self.node_count, self.response_count, self.branch_nodes
        ));
        for (category, capacity) in &self.category_capacity {
            out.push_str(&format!("  category {category}: up to {capacity} selection(s)\n"));
        }
        for issue in &self.issues {
            out.push_str(&format!("  issue: {issue}\n"));
        }
        if !self.unreachable_nodes.is_empty() {
            let listed: Vec<String> = self
                .unreachable_nodes
                .iter()
                .map(|id| id.to_string())
                .collect();
            out.push_str(&format!("  unreachable nodes: {}\n", listed.join(", ")));
        }
        if !self.terminal_reachable {
            out.push_str("  no ending is reachable from the start node\n");
        }
        out
    }
}

pub fn analyze_script(script: &ScenarioScript) -> ScriptReport {
    let summary = walk_script(script);
    ScriptReport {
        key: script.key.clone(),
        title: script.title.clone(),
        node_count: script.dialogues.len(),
        response_count: script.responses.len(),
        issues: script
            .validate()
            .iter()
            .map(|issue| issue.to_string())
            .collect(),
        unreachable_nodes: summary.unreachable_nodes,
        terminal_reachable: summary.terminal_reachable,
        branch_nodes: summary.branch_nodes,
        category_capacity: summary.category_capacity,
    }
}

pub fn analyze_collection(collection: &ScriptCollection) -> Vec<ScriptReport> {
    collection
        .iter()
        .map(|(_, loaded)| analyze_script(&loaded.script))
        .collect()
}
