//! Single-writer editing session.
//!
//! The session is the only owner of the current [`Story`]. Generation runs
//! outside of it: [`Session::begin`] hands out a [`Ticket`], the caller awaits
//! [`run_ticket`] without holding the session, and [`Session::finish`] applies
//! the result as one whole-story swap. Requests for different nodes may be in
//! flight at once; each commits against the story current when it finishes.

use crate::core::error::{GenerateError, StoryError};
use crate::core::model::{NodeId, Story, StoryNode};
use crate::services::generator::{Generation, StoryGenerator};
use crate::services::orchestrator::{commit, plan, PendingAdvance, Selection, Step, StoryParams};
use futures_util::future::{AbortHandle, AbortRegistration, Abortable};
use std::collections::{HashMap, HashSet};

#[derive(Debug)]
pub struct Ticket {
    seq: u64,
    pending: PendingAdvance,
    registration: AbortRegistration,
}

#[derive(Debug)]
pub struct Completion {
    seq: u64,
    pending: PendingAdvance,
    outcome: Result<Generation, GenerateError>,
}

#[derive(Debug)]
pub enum Begin {
    Navigated(NodeId),
    Pending(Ticket),
}

/// Runs the generation for `ticket`. Aborting the ticket's handle resolves
/// this with `GenerateError::Cancelled`.
pub async fn run_ticket(generator: &dyn StoryGenerator, ticket: Ticket) -> Completion {
    let Ticket {
        seq,
        pending,
        registration,
    } = ticket;
    let outcome = match Abortable::new(generator.generate(&pending.request), registration).await {
        Ok(result) => result,
        Err(_aborted) => Err(GenerateError::Cancelled),
    };
    Completion {
        seq,
        pending,
        outcome,
    }
}

#[derive(Debug)]
pub struct Session {
    story: Story,
    current: NodeId,
    params: StoryParams,
    busy: HashSet<NodeId>,
    errors: HashMap<NodeId, String>,
    in_flight: HashMap<NodeId, (u64, AbortHandle)>,
    next_seq: u64,
}

impl Session {
    pub fn new(story: Story, params: StoryParams) -> Result<Self, StoryError> {
        story.validate()?;
        Ok(Self {
            current: story.root_id.clone(),
            story,
            params,
            busy: HashSet::new(),
            errors: HashMap::new(),
            in_flight: HashMap::new(),
            next_seq: 0,
        })
    }

    pub fn story(&self) -> &Story {
        &self.story
    }

    pub fn current_id(&self) -> &str {
        &self.current
    }

    pub fn current_node(&self) -> Option<&StoryNode> {
        self.story.node(&self.current)
    }

    pub fn is_busy(&self, node_id: &str) -> bool {
        self.busy.contains(node_id)
    }

    pub fn error_for(&self, node_id: &str) -> Option<&str> {
        self.errors.get(node_id).map(String::as_str)
    }

    /// Moves the position to `node_id` if it exists.
    pub fn go_to(&mut self, node_id: &str) -> bool {
        if self.story.nodes.contains_key(node_id) {
            self.current = node_id.to_string();
            true
        } else {
            false
        }
    }

    pub fn restart(&mut self) {
        self.current = self.story.root_id.clone();
    }

    /// Installs a story from outside (import, snapshot, remote load). An
    /// invalid story is rejected and the current one kept.
    pub fn replace_story(&mut self, story: Story) -> Result<(), StoryError> {
        story.validate()?;
        self.cancel_all();
        self.errors.clear();
        self.current = story.root_id.clone();
        log::info!("Installed story {} ({} nodes)", story.id, story.nodes.len());
        self.story = story;
        Ok(())
    }

    /// Navigates along a resolved choice, or prepares a generation request.
    /// A request already in flight for the same node is aborted.
    pub fn begin(&mut self, from_id: &str, selection: &Selection) -> Result<Begin, GenerateError> {
        let pending = match plan(&self.story, from_id, selection, &self.params) {
            Ok(Step::Navigate(node_id)) => {
                self.current = node_id.clone();
                return Ok(Begin::Navigated(node_id));
            }
            Ok(Step::Generate(pending)) => pending,
            Err(e) => {
                self.errors.insert(from_id.to_string(), e.to_string());
                return Err(e);
            }
        };

        if let Some((_, previous)) = self.in_flight.remove(from_id) {
            log::debug!("Superseding in-flight request for {}", from_id);
            previous.abort();
        }

        self.next_seq += 1;
        let seq = self.next_seq;
        let (handle, registration) = AbortHandle::new_pair();
        self.in_flight.insert(from_id.to_string(), (seq, handle));
        self.busy.insert(from_id.to_string());
        self.errors.remove(from_id);

        Ok(Begin::Pending(Ticket {
            seq,
            pending,
            registration,
        }))
    }

    /// Applies a finished request. Returns the new node id, `None` when the
    /// request was cancelled or superseded, or the generation error (which is
    /// also recorded for the node).
    pub fn finish(&mut self, completion: Completion) -> Result<Option<NodeId>, GenerateError> {
        let from_id = completion.pending.from_id.clone();
        let is_latest =
            matches!(self.in_flight.get(&from_id), Some((seq, _)) if *seq == completion.seq);
        if !is_latest {
            log::debug!("Discarding stale result for {}", from_id);
            return Ok(None);
        }
        self.in_flight.remove(&from_id);
        self.busy.remove(&from_id);

        let generation = match completion.outcome {
            Ok(generation) => generation,
            Err(e) if e.is_cancelled() => return Ok(None),
            Err(e) => {
                log::warn!("Generation from {} failed: {}", from_id, e);
                self.errors.insert(from_id, e.to_string());
                return Err(e);
            }
        };

        match commit(&self.story, &completion.pending, generation) {
            Ok((story, node_id)) => {
                self.story = story;
                self.current = node_id.clone();
                Ok(Some(node_id))
            }
            Err(e) => {
                self.errors.insert(from_id, e.to_string());
                Err(e)
            }
        }
    }

    pub fn cancel(&mut self, node_id: &str) {
        if let Some((_, handle)) = self.in_flight.remove(node_id) {
            handle.abort();
        }
        self.busy.remove(node_id);
    }

    pub fn cancel_all(&mut self) {
        for (_, (_, handle)) in self.in_flight.drain() {
            handle.abort();
        }
        self.busy.clear();
    }

    /// Begin, run and finish in one call. `Ok(None)` means the request was
    /// cancelled.
    pub async fn advance(
        &mut self,
        generator: &dyn StoryGenerator,
        from_id: &str,
        selection: &Selection,
    ) -> Result<Option<NodeId>, GenerateError> {
        match self.begin(from_id, selection)? {
            Begin::Navigated(node_id) => Ok(Some(node_id)),
            Begin::Pending(ticket) => {
                let completion = run_ticket(generator, ticket).await;
                self.finish(completion)
            }
        }
    }
}
