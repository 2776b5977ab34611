//! Read-only traversal. Nothing here suspends or generates; an unresolved
//! choice is handed back to the caller, which routes it to the orchestrator.

use crate::core::model::{Choice, NodeId, Story};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<'a> {
    Linked(&'a NodeId),
    Unresolved(&'a Choice),
    UnknownChoice,
    UnknownNode,
}

pub fn resolve<'a>(story: &'a Story, from_id: &str, choice_id: &str) -> Resolution<'a> {
    let Some(from) = story.node(from_id) else {
        return Resolution::UnknownNode;
    };
    match from.choice(choice_id) {
        Some(Choice { to: Some(to), .. }) => Resolution::Linked(to),
        Some(choice) => Resolution::Unresolved(choice),
        None => Resolution::UnknownChoice,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub node_id: NodeId,
    pub title: String,
    pub depth: usize,
    pub open_choices: usize,
}

/// Depth-first walk from the root in choice order; each node appears once.
pub fn outline(story: &Story) -> Vec<OutlineEntry> {
    let mut entries = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![(story.root_id.clone(), 0usize)];

    while let Some((id, depth)) = stack.pop() {
        if !seen.insert(id.clone()) {
            continue;
        }
        let Some(node) = story.node(&id) else {
            continue;
        };
        entries.push(OutlineEntry {
            node_id: node.id.clone(),
            title: node.title.clone(),
            depth,
            open_choices: node.choices.iter().filter(|c| !c.is_resolved()).count(),
        });
        for choice in node.choices.iter().rev() {
            if let Some(to) = &choice.to {
                if !seen.contains(to) {
                    stack.push((to.clone(), depth + 1));
                }
            }
        }
    }
    entries
}

/// Nodes kept in the story but not reachable from the root, sorted by id.
pub fn unreachable(story: &Story) -> Vec<NodeId> {
    let reachable: HashSet<NodeId> = outline(story).into_iter().map(|e| e.node_id).collect();
    let mut ids: Vec<NodeId> = story
        .nodes
        .keys()
        .filter(|id| !reachable.contains(*id))
        .cloned()
        .collect();
    ids.sort();
    ids
}
