//! Pure graph mutations.
//!
//! Every function takes the current [`Story`] by reference and returns a new
//! value. The input is never touched, so a reader holding the old story never
//! observes a half-applied change and a failed operation just drops its result.
//!
//! Link requests with stale references (unknown node, unknown target, index
//! out of range, unknown choice id) are silent no-ops that return an equal
//! story. Callers that care compare the result with the input.

use crate::core::id::new_id;
use crate::core::model::{Choice, ChoiceId, Story, StoryNode};
use std::collections::HashMap;

pub const DEFAULT_ROOT_TITLE: &str = "Chapter 1";
pub const DEFAULT_ROOT_CONTENT: &str = "Start your journey...";

pub fn create_empty_story(title: &str) -> Story {
    let root = StoryNode {
        id: new_id(),
        title: DEFAULT_ROOT_TITLE.to_string(),
        content: DEFAULT_ROOT_CONTENT.to_string(),
        choices: Vec::new(),
    };
    let mut nodes = HashMap::new();
    let root_id = root.id.clone();
    nodes.insert(root_id.clone(), root);
    Story {
        id: new_id(),
        title: title.to_string(),
        root_id,
        nodes,
    }
}

/// Inserts `node` under its own id. An existing node with that id is replaced.
pub fn add_node(story: &Story, node: StoryNode) -> Story {
    let mut next = story.clone();
    next.nodes.insert(node.id.clone(), node);
    next
}

pub fn link_choice_by_index(
    story: &Story,
    from_id: &str,
    choice_index: usize,
    to_id: &str,
) -> Story {
    let Some(from) = story.nodes.get(from_id) else {
        return story.clone();
    };
    if !story.nodes.contains_key(to_id) || choice_index >= from.choices.len() {
        return story.clone();
    }
    with_choice_linked(story, from, choice_index, to_id)
}

pub fn link_choice_by_id(story: &Story, from_id: &str, choice_id: &str, to_id: &str) -> Story {
    let Some(from) = story.nodes.get(from_id) else {
        return story.clone();
    };
    if !story.nodes.contains_key(to_id) {
        return story.clone();
    }
    match from.choices.iter().position(|c| c.id == choice_id) {
        Some(index) => with_choice_linked(story, from, index, to_id),
        None => story.clone(),
    }
}

/// Appends an unresolved choice to the end of `from_id`'s choices.
///
/// Returns the new story and the fresh choice id, or the input story and an
/// empty id when `from_id` is unknown.
pub fn append_choice(story: &Story, from_id: &str, text: &str) -> (Story, ChoiceId) {
    let Some(from) = story.nodes.get(from_id) else {
        return (story.clone(), String::new());
    };
    let choice_id = new_id();
    let mut choices = from.choices.clone();
    choices.push(Choice {
        id: choice_id.clone(),
        text: text.to_string(),
        to: None,
    });
    let updated = StoryNode {
        choices,
        ..from.clone()
    };
    (replace_node(story, updated), choice_id)
}

/// Replaces the root node's scene while keeping the root id.
pub fn replace_root_scene(
    story: &Story,
    title: &str,
    content: &str,
    choices: Vec<Choice>,
) -> Story {
    let root = StoryNode {
        id: story.root_id.clone(),
        title: title.to_string(),
        content: content.to_string(),
        choices,
    };
    replace_node(story, root)
}

fn with_choice_linked(story: &Story, from: &StoryNode, index: usize, to_id: &str) -> Story {
    let choices = from
        .choices
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if i == index {
                Choice {
                    to: Some(to_id.to_string()),
                    ..c.clone()
                }
            } else {
                c.clone()
            }
        })
        .collect();
    let updated = StoryNode {
        choices,
        ..from.clone()
    };
    replace_node(story, updated)
}

fn replace_node(story: &Story, node: StoryNode) -> Story {
    let mut next = story.clone();
    next.nodes.insert(node.id.clone(), node);
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(id: &str, choices: &[&str]) -> StoryNode {
        StoryNode {
            id: id.to_string(),
            title: id.to_uppercase(),
            content: format!("Scene {}", id),
            choices: choices
                .iter()
                .enumerate()
                .map(|(i, text)| Choice {
                    id: format!("{}-c{}", id, i),
                    text: text.to_string(),
                    to: None,
                })
                .collect(),
        }
    }

    fn two_node_story() -> Story {
        let story = create_empty_story("Test");
        let root_id = story.root_id.clone();
        let story = replace_root_scene(
            &story,
            "Gate",
            "A rune pulses.",
            scene(&root_id, &["left", "right"]).choices,
        );
        add_node(&story, scene("n2", &[]))
    }

    #[test]
    fn test_create_empty_story() {
        let story = create_empty_story("Test");
        assert_eq!(story.title, "Test");
        assert_eq!(story.nodes.len(), 1);
        let root = story.root().unwrap();
        assert_eq!(root.id, story.root_id);
        assert!(root.choices.is_empty());
        assert_eq!(root.title, DEFAULT_ROOT_TITLE);
        assert_ne!(story.id, story.root_id);
    }

    #[test]
    fn test_add_node_overwrites_same_id() {
        let story = create_empty_story("Test");
        let once = add_node(&story, scene("n", &["a"]));
        let mut replacement = scene("n", &[]);
        replacement.title = "Replaced".to_string();
        let twice = add_node(&once, replacement);
        assert_eq!(twice.nodes.len(), 2);
        assert_eq!(twice.node("n").unwrap().title, "Replaced");
        assert_eq!(once.node("n").unwrap().choices.len(), 1);
    }

    #[test]
    fn test_mutations_leave_input_untouched() {
        let story = two_node_story();
        let before = story.clone();
        let root_id = story.root_id.clone();

        let _ = add_node(&story, scene("n3", &[]));
        let _ = link_choice_by_index(&story, &root_id, 0, "n2");
        let _ = link_choice_by_id(&story, &root_id, &format!("{}-c1", root_id), "n2");
        let _ = append_choice(&story, &root_id, "wait");

        assert_eq!(story, before);
    }

    #[test]
    fn test_link_by_index_sets_target() {
        let story = two_node_story();
        let root_id = story.root_id.clone();
        let linked = link_choice_by_index(&story, &root_id, 1, "n2");
        let root = linked.root().unwrap();
        assert_eq!(root.choices[0].to, None);
        assert_eq!(root.choices[1].to.as_deref(), Some("n2"));
        assert_eq!(root.choices[1].text, "right");
    }

    #[test]
    fn test_link_with_stale_reference_is_noop() {
        let story = two_node_story();
        let root_id = story.root_id.clone();

        assert_eq!(link_choice_by_index(&story, "ghost", 0, "n2"), story);
        assert_eq!(link_choice_by_index(&story, &root_id, 0, "ghost"), story);
        assert_eq!(link_choice_by_index(&story, &root_id, 2, "n2"), story);
        assert_eq!(link_choice_by_id(&story, "ghost", "x", "n2"), story);
        assert_eq!(link_choice_by_id(&story, &root_id, "unknown-choice", "n2"), story);
        assert_eq!(
            link_choice_by_id(&story, &root_id, &format!("{}-c0", root_id), "ghost"),
            story
        );
    }

    #[test]
    fn test_append_choice_goes_last_and_unlinked() {
        let story = two_node_story();
        let root_id = story.root_id.clone();
        let (next, choice_id) = append_choice(&story, &root_id, "left");
        assert!(!choice_id.is_empty());
        let root = next.root().unwrap();
        assert_eq!(root.choices.len(), 3);
        let last = root.choices.last().unwrap();
        assert_eq!(last.id, choice_id);
        assert_eq!(last.text, "left");
        assert!(last.to.is_none());
        // duplicate text is kept
        assert_eq!(root.choices[0].text, "left");
    }

    #[test]
    fn test_append_choice_unknown_node_returns_sentinel() {
        let story = two_node_story();
        let (next, choice_id) = append_choice(&story, "ghost", "anything");
        assert_eq!(choice_id, "");
        assert_eq!(next, story);
    }

    #[test]
    fn test_add_then_link_by_id_resolves() {
        let story = create_empty_story("Test");
        let root_id = story.root_id.clone();
        let (story, choice_id) = append_choice(&story, &root_id, "open the door");
        let story = add_node(&story, scene("n2", &[]));
        let story = link_choice_by_id(&story, &root_id, &choice_id, "n2");
        assert_eq!(
            story.node(&root_id).and_then(|n| n.choice(&choice_id)).and_then(|c| c.to.as_deref()),
            Some("n2")
        );
        assert!(story.validate().is_ok());
    }
}
