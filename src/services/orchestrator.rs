//! Turns a player's decision into a new node plus the edge leading to it.
//!
//! Work is split into [`plan`] (read the story, build the request),
//! generation (the only suspending step) and [`commit`] (apply against the
//! story current at that moment). Commit is all-or-nothing.

use crate::core::error::GenerateError;
use crate::core::graph::{
    add_node, append_choice, create_empty_story, link_choice_by_id, replace_root_scene,
};
use crate::core::id::new_id;
use crate::core::model::{Choice, ChoiceId, NodeId, Story, StoryNode};
use crate::core::navigation::{resolve, Resolution};
use crate::services::generator::{Generation, GenerationRequest, StoryGenerator};

/// Category and premise shared by every request of a story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryParams {
    pub category: String,
    pub seed: String,
}

impl StoryParams {
    pub fn new(category: impl Into<String>, seed: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            seed: seed.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// An existing choice on the from-node.
    Choice(ChoiceId),
    /// Free text with no existing choice behind it.
    Direction(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    Existing(ChoiceId),
    Append(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAdvance {
    pub from_id: NodeId,
    pub link: LinkTarget,
    pub request: GenerationRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Navigate(NodeId),
    Generate(PendingAdvance),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advance {
    pub story: Story,
    pub node_id: NodeId,
    pub generated: bool,
}

pub fn plan(
    story: &Story,
    from_id: &str,
    selection: &Selection,
    params: &StoryParams,
) -> Result<Step, GenerateError> {
    let from = story
        .node(from_id)
        .ok_or_else(|| GenerateError::UnknownNode(from_id.to_string()))?;

    let (link, direction) = match selection {
        Selection::Choice(choice_id) => match resolve(story, from_id, choice_id) {
            Resolution::Linked(to) => return Ok(Step::Navigate(to.clone())),
            Resolution::Unresolved(choice) => {
                (LinkTarget::Existing(choice.id.clone()), choice.text.clone())
            }
            Resolution::UnknownChoice | Resolution::UnknownNode => {
                return Err(GenerateError::UnknownChoice {
                    node_id: from_id.to_string(),
                    choice_id: choice_id.clone(),
                })
            }
        },
        Selection::Direction(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(GenerateError::EmptyDirection);
            }
            (LinkTarget::Append(text.to_string()), text.to_string())
        }
    };

    let request = GenerationRequest::new(
        &params.category,
        &params.seed,
        Some(&direction),
        Some(&from.content),
    );
    request.validate()?;

    Ok(Step::Generate(PendingAdvance {
        from_id: from_id.to_string(),
        link,
        request,
    }))
}

pub fn build_node(generation: Generation) -> StoryNode {
    StoryNode {
        id: new_id(),
        title: generation.title,
        content: generation.content,
        choices: generation
            .choices
            .into_iter()
            .map(|text| Choice {
                id: new_id(),
                text,
                to: None,
            })
            .collect(),
    }
}

/// Applies a finished generation to `story`, re-reading the from-node so
/// edits committed since the request was planned are kept.
pub fn commit(
    story: &Story,
    pending: &PendingAdvance,
    generation: Generation,
) -> Result<(Story, NodeId), GenerateError> {
    let from = story
        .node(&pending.from_id)
        .ok_or_else(|| GenerateError::UnknownNode(pending.from_id.clone()))?;
    if let LinkTarget::Existing(choice_id) = &pending.link {
        if from.choice(choice_id).is_none() {
            return Err(GenerateError::UnknownChoice {
                node_id: pending.from_id.clone(),
                choice_id: choice_id.clone(),
            });
        }
    }

    let node = build_node(generation);
    let node_id = node.id.clone();
    let with_node = add_node(story, node);

    let next = match &pending.link {
        LinkTarget::Existing(choice_id) => {
            link_choice_by_id(&with_node, &pending.from_id, choice_id, &node_id)
        }
        LinkTarget::Append(text) => {
            let (appended, choice_id) = append_choice(&with_node, &pending.from_id, text);
            link_choice_by_id(&appended, &pending.from_id, &choice_id, &node_id)
        }
    };

    log::info!(
        "Linked node {} from {} ({} nodes)",
        node_id,
        pending.from_id,
        next.nodes.len()
    );
    Ok((next, node_id))
}

pub async fn advance(
    story: &Story,
    from_id: &str,
    selection: &Selection,
    params: &StoryParams,
    generator: &dyn StoryGenerator,
) -> Result<Advance, GenerateError> {
    match plan(story, from_id, selection, params)? {
        Step::Navigate(node_id) => Ok(Advance {
            story: story.clone(),
            node_id,
            generated: false,
        }),
        Step::Generate(pending) => {
            let generation = generator.generate(&pending.request).await?;
            let (story, node_id) = commit(story, &pending, generation)?;
            Ok(Advance {
                story,
                node_id,
                generated: true,
            })
        }
    }
}

/// A new story whose root is the generated opening scene.
pub async fn begin_story(
    generator: &dyn StoryGenerator,
    params: &StoryParams,
    title: &str,
) -> Result<Story, GenerateError> {
    let request = GenerationRequest::new(&params.category, &params.seed, None, None);
    request.validate()?;
    let generation = generator.generate(&request).await?;

    let empty = create_empty_story(title);
    let opening = build_node(generation);
    let story = replace_root_scene(&empty, &opening.title, &opening.content, opening.choices);
    log::info!("Started story {} ({})", story.id, story.title);
    Ok(story)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::{add_node, append_choice, create_empty_story, link_choice_by_id};
    use crate::core::navigation::{resolve, Resolution};
    use crate::services::generator::mock::{generation, ScriptedGenerator};

    fn params() -> StoryParams {
        StoryParams::new("Fantasy", "At dawn, the rune pulsed.")
    }

    fn root_with_choice(text: &str) -> (Story, NodeId, ChoiceId) {
        let story = create_empty_story("Test");
        let root = story.root_id.clone();
        let (story, choice) = append_choice(&story, &root, text);
        (story, root, choice)
    }

    #[tokio::test]
    async fn test_custom_direction_branch() {
        let story = create_empty_story("Test");
        let n1 = story.root_id.clone();
        let generator = ScriptedGenerator::new(vec![Ok(generation("T", "C", &["left", "right"]))]);

        let result = advance(
            &story,
            &n1,
            &Selection::Direction("open the door".to_string()),
            &params(),
            &generator,
        )
        .await
        .unwrap();

        assert!(result.generated);
        let from = result.story.node(&n1).unwrap();
        assert_eq!(from.choices.len(), 1);
        assert_eq!(from.choices[0].text, "open the door");
        assert_eq!(from.choices[0].to.as_ref(), Some(&result.node_id));

        let n2 = result.story.node(&result.node_id).unwrap();
        assert_eq!(n2.title, "T");
        assert_eq!(n2.content, "C");
        let texts: Vec<&str> = n2.choices.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["left", "right"]);
        assert!(n2.choices.iter().all(|c| c.to.is_none()));

        // input untouched
        assert!(story.node(&n1).unwrap().choices.is_empty());
    }

    #[tokio::test]
    async fn test_request_carries_direction_and_context() {
        let (story, root, choice) = root_with_choice("climb the tower");
        let generator = ScriptedGenerator::new(vec![Ok(generation("Top", "Wind.", &[]))]);

        advance(&story, &root, &Selection::Choice(choice), &params(), &generator)
            .await
            .unwrap();

        let requests = generator.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].category, "Fantasy");
        assert_eq!(requests[0].seed, "At dawn, the rune pulsed.");
        assert_eq!(requests[0].direction.as_deref(), Some("climb the tower"));
        assert_eq!(
            requests[0].context.as_deref(),
            Some(story.root().unwrap().content.as_str())
        );
    }

    #[tokio::test]
    async fn test_existing_unresolved_choice_is_linked_in_place() {
        let (story, root, choice) = root_with_choice("climb the tower");
        let generator = ScriptedGenerator::new(vec![Ok(generation("Top", "Wind.", &["jump"]))]);

        let selection = Selection::Choice(choice.clone());
        let result = advance(&story, &root, &selection, &params(), &generator)
            .await
            .unwrap();

        let from = result.story.node(&root).unwrap();
        assert_eq!(from.choices.len(), 1);
        assert_eq!(
            resolve(&result.story, &root, &choice),
            Resolution::Linked(&result.node_id)
        );
    }

    #[tokio::test]
    async fn test_resolved_choice_navigates_without_generation() {
        let (story, root, choice) = root_with_choice("go");
        let story = add_node(
            &story,
            StoryNode {
                id: "n2".to_string(),
                title: "Two".to_string(),
                content: String::new(),
                choices: vec![],
            },
        );
        let story = link_choice_by_id(&story, &root, &choice, "n2");
        let generator = ScriptedGenerator::new(vec![]);

        let result = advance(&story, &root, &Selection::Choice(choice), &params(), &generator)
            .await
            .unwrap();

        assert!(!result.generated);
        assert_eq!(result.node_id, "n2");
        assert_eq!(result.story, story);
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_generation_commits_nothing() {
        let (story, root, choice) = root_with_choice("go");
        let before = story.clone();
        let generator = ScriptedGenerator::new(vec![
            Err(GenerateError::Provider("HTTP 500".to_string())),
            Err(GenerateError::Malformed("empty response".to_string())),
        ]);

        let selection = Selection::Direction("run".to_string());
        let err = advance(&story, &root, &selection, &params(), &generator)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("HTTP 500"));

        let err = advance(&story, &root, &Selection::Choice(choice), &params(), &generator)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::Malformed(_)));

        assert_eq!(story, before);
    }

    #[tokio::test]
    async fn test_invalid_selection_issues_no_request() {
        let (story, root, _) = root_with_choice("go");
        let generator = ScriptedGenerator::new(vec![]);

        let selection = Selection::Direction("x".to_string());
        let err = advance(&story, "ghost", &selection, &params(), &generator)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::UnknownNode(_)));

        let selection = Selection::Choice("nope".to_string());
        let err = advance(&story, &root, &selection, &params(), &generator)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::UnknownChoice { .. }));

        let selection = Selection::Direction("   ".to_string());
        let err = advance(&story, &root, &selection, &params(), &generator)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::EmptyDirection));

        let err = advance(
            &story,
            &root,
            &Selection::Direction("x".to_string()),
            &StoryParams::new("Fantasy", " "),
            &generator,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GenerateError::EmptySeed));

        assert_eq!(generator.call_count(), 0);
    }

    #[test]
    fn test_commit_rereads_from_node() {
        let story = create_empty_story("Test");
        let root = story.root_id.clone();
        let Step::Generate(first) =
            plan(&story, &root, &Selection::Direction("north".to_string()), &params()).unwrap()
        else {
            panic!("expected generation");
        };
        let Step::Generate(second) =
            plan(&story, &root, &Selection::Direction("south".to_string()), &params()).unwrap()
        else {
            panic!("expected generation");
        };

        let (after_first, _) = commit(&story, &first, generation("N", "", &[])).unwrap();
        let (after_both, _) = commit(&after_first, &second, generation("S", "", &[])).unwrap();

        let texts: Vec<&str> = after_both
            .root()
            .unwrap()
            .choices
            .iter()
            .map(|c| c.text.as_str())
            .collect();
        assert_eq!(texts, vec!["north", "south"]);
        assert_eq!(after_both.nodes.len(), 3);
        assert!(after_both.validate().is_ok());
    }

    #[test]
    fn test_commit_against_vanished_choice_fails_cleanly() {
        let (story, root, choice) = root_with_choice("go");
        let Step::Generate(pending) =
            plan(&story, &root, &Selection::Choice(choice), &params()).unwrap()
        else {
            panic!("expected generation");
        };
        let replaced = create_empty_story("Other");

        assert!(matches!(
            commit(&replaced, &pending, generation("X", "", &[])),
            Err(GenerateError::UnknownNode(_))
        ));

        let mut without_choice = story.clone();
        if let Some(node) = without_choice.nodes.get_mut(&root) {
            node.choices.clear();
        }
        assert!(matches!(
            commit(&without_choice, &pending, generation("X", "", &[])),
            Err(GenerateError::UnknownChoice { .. })
        ));
    }

    #[tokio::test]
    async fn test_begin_story_installs_opening_scene_as_root() {
        let opening = generation("Gate", "A rune pulses.", &["enter", "wait"]);
        let generator = ScriptedGenerator::new(vec![Ok(opening)]);
        let story = begin_story(&generator, &params(), "My Story").await.unwrap();

        assert_eq!(story.title, "My Story");
        assert_eq!(story.nodes.len(), 1);
        let root = story.root().unwrap();
        assert_eq!(root.title, "Gate");
        assert_eq!(root.choices.len(), 2);
        let requests = generator.requests.lock().unwrap();
        assert_eq!(requests[0].direction, None);
        assert_eq!(requests[0].context, None);
    }

    #[tokio::test]
    async fn test_begin_story_failure_produces_nothing() {
        let offline = GenerateError::Provider("offline".to_string());
        let generator = ScriptedGenerator::new(vec![Err(offline)]);
        assert!(begin_story(&generator, &params(), "My Story").await.is_err());
    }
}
