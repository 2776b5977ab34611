//! Story graph entities.
//!
//! A [`Story`] exclusively owns its nodes. Choices are edges that stay
//! unresolved (`to == None`) until a successor node has been generated.
//! The serialized form is the interchange format for snapshots, exports and
//! remote rows.

use crate::core::error::StoryError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type NodeId = String;
pub type ChoiceId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: ChoiceId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<NodeId>,
}

impl Choice {
    pub fn is_resolved(&self) -> bool {
        self.to.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryNode {
    pub id: NodeId,
    pub title: String,
    /// Prose of the scene; generators are asked for 400-600 words.
    pub content: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

impl StoryNode {
    pub fn choice(&self, choice_id: &str) -> Option<&Choice> {
        self.choices.iter().find(|c| c.id == choice_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: String,
    pub title: String,
    pub root_id: NodeId,
    pub nodes: HashMap<NodeId, StoryNode>,
}

impl Story {
    pub fn node(&self, id: &str) -> Option<&StoryNode> {
        self.nodes.get(id)
    }

    pub fn root(&self) -> Option<&StoryNode> {
        self.nodes.get(&self.root_id)
    }

    pub fn is_valid(&self) -> bool {
        is_valid_story(self)
    }

    /// Checks the graph invariants: the root exists and every resolved
    /// choice points at a node of this story.
    pub fn validate(&self) -> Result<(), StoryError> {
        if !self.is_valid() {
            return Err(StoryError::MissingRoot(self.root_id.clone()));
        }
        for node in self.nodes.values() {
            for choice in &node.choices {
                if let Some(target) = &choice.to {
                    if !self.nodes.contains_key(target) {
                        return Err(StoryError::DanglingChoice {
                            node_id: node.id.clone(),
                            choice_id: choice.id.clone(),
                            target: target.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Parses and validates a story. Nothing malformed gets past this.
    pub fn from_json(json: &str) -> Result<Self, StoryError> {
        let story: Story = serde_json::from_str(json)?;
        story.validate()?;
        Ok(story)
    }

    pub fn to_json_pretty(&self) -> Result<String, StoryError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub fn is_valid_story(story: &Story) -> bool {
    story.nodes.contains_key(&story.root_id)
}
