use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::Serialize;
use vn_formats::ScenarioScript;

/// What a breadth-first walk from the start node can actually reach.
#[derive(Debug, Clone, Serialize)]
pub struct GraphSummary {
    pub reachable_nodes: BTreeSet<u32>,
    pub unreachable_nodes: Vec<u32>,
    pub reachable_responses: BTreeSet<u32>,
    /// A run can end properly: some reachable node is terminal, or a
    /// reachable response without a next node sits on a terminal-eligible
    /// node.
    pub terminal_reachable: bool,
    pub branch_nodes: u32,
    /// Selections attainable per category across one exhaustive sweep of
    /// the reachable responses. An upper bound, not a single-run tally.
    pub category_capacity: BTreeMap<String, u32>,
}

/// Walks next-ids and response next-ids from the start node. Dangling
/// references are skipped here; structural validation reports them.
pub fn walk_script(script: &ScenarioScript) -> GraphSummary {
    let nodes: BTreeMap<u32, &vn_formats::DialogueNode> = script
        .dialogues
        .iter()
        .map(|node| (node.id, node))
        .collect();
    let responses: BTreeMap<u32, &vn_formats::ResponseOption> = script
        .responses
        .iter()
        .map(|response| (response.id, response))
        .collect();

    let mut reachable_nodes = BTreeSet::new();
    let mut reachable_responses = BTreeSet::new();
    let mut terminal_reachable = false;
    let mut branch_nodes = 0;

    let mut queue = VecDeque::new();
    if nodes.contains_key(&script.start) {
        queue.push_back(script.start);
    }

    while let Some(id) = queue.pop_front() {
        if !reachable_nodes.insert(id) {
            continue;
        }
        let Some(node) = nodes.get(&id) else {
            continue;
        };

        if node.has_responses() {
            branch_nodes += 1;
            for response_id in &node.responses {
                let Some(response) = responses.get(response_id) else {
                    continue;
                };
                reachable_responses.insert(response.id);
                match response.next {
                    Some(next) if nodes.contains_key(&next) => queue.push_back(next),
                    Some(_) => {}
                    None if node.terminal => terminal_reachable = true,
                    None => {}
                }
            }
        } else if let Some(next) = node.next {
            if nodes.contains_key(&next) {
                queue.push_back(next);
            }
        } else if node.terminal {
            terminal_reachable = true;
        }
    }

    let unreachable_nodes = script
        .dialogues
        .iter()
        .map(|node| node.id)
        .filter(|id| !reachable_nodes.contains(id))
        .collect();

    let mut category_capacity: BTreeMap<String, u32> = BTreeMap::new();
    for response_id in &reachable_responses {
        if let Some(response) = responses.get(response_id) {
            *category_capacity
                .entry(response.category.clone())
                .or_insert(0) += 1;
        }
    }

    GraphSummary {
        reachable_nodes,
        unreachable_nodes,
        reachable_responses,
        terminal_reachable,
        branch_nodes,
        category_capacity,
    }
}
