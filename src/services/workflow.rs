use crate::core::config::Config;
use crate::core::io::Storage;
use crate::core::graph::create_empty_story;
use crate::core::model::{Story, StoryNode};
use crate::core::navigation::{outline, unreachable, OutlineEntry};
use crate::services::generator::StoryGenerator;
use crate::services::orchestrator::Selection;
use crate::services::persistence::{StoryStore, StorySummary};
use crate::services::session::{run_ticket, Begin, Session};
use crate::services::setup::SetupOutcome;
use crate::services::snapshot::{export_story, import_story, SnapshotStore};
use crate::utils::progress::spinner;
use anyhow::Result;
use inquire::{Confirm, InquireError, Select, Text};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Choose(String),
    Direction,
    Outline,
    Restart,
    SaveRemote,
    LoadRemote,
    DeleteRemote,
    Export,
    Import,
    Discard,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MenuItem {
    label: String,
    action: Action,
}

impl MenuItem {
    fn new(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

fn menu_items(story: &Story, node: &StoryNode, remote: bool) -> Vec<MenuItem> {
    let mut items: Vec<MenuItem> = node
        .choices
        .iter()
        .map(|choice| {
            let label = match choice.to.as_ref().and_then(|to| story.node(to)) {
                Some(target) => format!("{} -> {}", choice.text, target.title),
                None => format!("{} (new)", choice.text),
            };
            MenuItem::new(label, Action::Choose(choice.id.clone()))
        })
        .collect();

    items.push(MenuItem::new("Write your own direction...", Action::Direction));
    items.push(MenuItem::new("Story outline", Action::Outline));
    if node.id != story.root_id {
        items.push(MenuItem::new("Restart from the beginning", Action::Restart));
    }
    if remote {
        items.push(MenuItem::new("Save to cloud", Action::SaveRemote));
        items.push(MenuItem::new("Load from cloud", Action::LoadRemote));
        items.push(MenuItem::new("Delete from cloud", Action::DeleteRemote));
    }
    items.push(MenuItem::new("Export JSON", Action::Export));
    items.push(MenuItem::new("Import JSON", Action::Import));
    items.push(MenuItem::new("Discard saved story and start over", Action::Discard));
    items.push(MenuItem::new("Quit", Action::Quit));
    items
}

fn outline_label(entry: &OutlineEntry) -> String {
    let open = match entry.open_choices {
        0 => String::new(),
        1 => " (1 open choice)".to_string(),
        n => format!(" ({} open choices)", n),
    };
    format!("{}{}{}", "  ".repeat(entry.depth), entry.title, open)
}

fn summary_label(summary: &StorySummary) -> String {
    match &summary.updated_at {
        Some(at) => format!("{} ({})", summary.title, at),
        None => summary.title.clone(),
    }
}

/// Outline row for the jump prompt. Labels repeat, so the entry rides along.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OutlineItem(OutlineEntry);

impl fmt::Display for OutlineItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", outline_label(&self.0))
    }
}

fn outline_items(story: &Story) -> Vec<OutlineItem> {
    outline(story).into_iter().map(OutlineItem).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SummaryItem(StorySummary);

impl fmt::Display for SummaryItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", summary_label(&self.0))
    }
}

/// `None` when the user dismissed the prompt.
fn optional<T>(answer: Result<T, InquireError>) -> Result<Option<T>> {
    match answer {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled) | Err(InquireError::OperationInterrupted) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub struct WorkflowManager {
    config: Config,
    session: Session,
    generator: Box<dyn StoryGenerator>,
    store: Box<dyn StoryStore>,
    storage: Arc<dyn Storage>,
    snapshots: SnapshotStore,
}

impl WorkflowManager {
    pub fn new(
        config: Config,
        generator: Box<dyn StoryGenerator>,
        store: Box<dyn StoryStore>,
        storage: Arc<dyn Storage>,
        snapshots: SnapshotStore,
        start: SetupOutcome,
    ) -> Result<Self> {
        let session = Session::new(start.story, start.params)?;
        Ok(Self {
            config,
            session,
            generator,
            store,
            storage,
            snapshots,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        self.snapshot().await;
        loop {
            let Some(node) = self.session.current_node().cloned() else {
                log::warn!("Current node vanished, returning to the root");
                self.session.restart();
                continue;
            };
            self.render(&node);

            let items = menu_items(self.session.story(), &node, self.store.is_configured());
            let item = match Select::new("What next?", items).with_page_size(12).prompt() {
                Ok(item) => item,
                Err(InquireError::OperationCanceled) => continue,
                Err(InquireError::OperationInterrupted) => break,
                Err(e) => return Err(e.into()),
            };

            match item.action {
                Action::Choose(choice_id) => {
                    self.advance(&node.id, Selection::Choice(choice_id)).await?;
                }
                Action::Direction => {
                    let Some(direction) = optional(Text::new("What happens next?").prompt())? else {
                        continue;
                    };
                    if direction.trim().is_empty() {
                        continue;
                    }
                    self.advance(&node.id, Selection::Direction(direction)).await?;
                }
                Action::Outline => self.show_outline()?,
                Action::Restart => self.session.restart(),
                Action::SaveRemote => self.save_remote().await,
                Action::LoadRemote => self.load_remote().await?,
                Action::DeleteRemote => self.delete_remote().await?,
                Action::Export => self.export().await,
                Action::Import => self.import().await?,
                Action::Discard => self.discard().await?,
                Action::Quit => break,
            }
        }
        println!("Story saved locally at {}", self.snapshots.path());
        Ok(())
    }

    fn render(&self, node: &StoryNode) {
        println!("\n=== {} :: {} ===\n", self.session.story().title, node.title);
        println!("{}\n", node.content);
        if let Some(error) = self.session.error_for(&node.id) {
            println!("[last attempt failed: {}]\n", error);
        }
    }

    async fn advance(&mut self, from_id: &str, selection: Selection) -> Result<()> {
        let ticket = match self.session.begin(from_id, &selection) {
            Ok(Begin::Navigated(_)) => return Ok(()),
            Ok(Begin::Pending(ticket)) => ticket,
            Err(e) => {
                println!("{}", e);
                return Ok(());
            }
        };

        let pb = spinner("Writing the next scene... (Ctrl-C to cancel)");
        let run = run_ticket(self.generator.as_ref(), ticket);
        tokio::pin!(run);
        let completion = tokio::select! {
            completion = &mut run => completion,
            _ = tokio::signal::ctrl_c() => {
                self.session.cancel(from_id);
                run.await
            }
        };
        pb.finish_and_clear();

        match self.session.finish(completion) {
            Ok(Some(_)) => self.snapshot().await,
            Ok(None) => println!("Cancelled."),
            Err(e) => println!("{}", e),
        }
        Ok(())
    }

    fn show_outline(&mut self) -> Result<()> {
        let story = self.session.story();
        let orphans = unreachable(story);
        if !orphans.is_empty() {
            println!("{} scene(s) are not reachable from the beginning.", orphans.len());
        }

        let items = outline_items(story);
        let picked = optional(Select::new("Jump to scene:", items).with_page_size(15).prompt())?;
        if let Some(OutlineItem(entry)) = picked {
            self.session.go_to(&entry.node_id);
        }
        Ok(())
    }

    async fn snapshot(&self) {
        if let Err(e) = self.snapshots.save(self.session.story()).await {
            log::warn!("Snapshot failed: {:#}", e);
        }
    }

    async fn save_remote(&self) {
        let pb = spinner("Saving...");
        let saved = self.store.save(self.session.story()).await;
        pb.finish_and_clear();
        match saved {
            Ok(id) => println!("Saved to cloud as {}", id),
            Err(e) => println!("Save failed: {}", e),
        }
    }

    async fn pick_remote(&self, prompt: &str) -> Result<Option<StorySummary>> {
        let summaries = match self.store.list().await {
            Ok(summaries) => summaries,
            Err(e) => {
                println!("Could not list stories: {}", e);
                return Ok(None);
            }
        };
        if summaries.is_empty() {
            println!("No stories saved yet.");
            return Ok(None);
        }
        let items: Vec<SummaryItem> = summaries.into_iter().map(SummaryItem).collect();
        let picked = optional(Select::new(prompt, items).prompt())?;
        Ok(picked.map(|SummaryItem(summary)| summary))
    }

    async fn load_remote(&mut self) -> Result<()> {
        let Some(summary) = self.pick_remote("Load which story?").await? else {
            return Ok(());
        };
        match self.store.load(&summary.id).await {
            Ok(story) => self.install(story).await,
            Err(e) => println!("Load failed: {}", e),
        }
        Ok(())
    }

    async fn delete_remote(&mut self) -> Result<()> {
        let Some(summary) = self.pick_remote("Delete which story?").await? else {
            return Ok(());
        };
        let confirmed = optional(
            Confirm::new(&format!("Delete \"{}\" from the cloud?", summary.title))
                .with_default(false)
                .prompt(),
        )?;
        if confirmed != Some(true) {
            return Ok(());
        }
        match self.store.delete(&summary.id).await {
            Ok(()) => println!("Deleted."),
            Err(e) => println!("Delete failed: {}", e),
        }
        Ok(())
    }

    async fn export(&self) {
        let folder = &self.config.export_folder;
        match export_story(self.storage.as_ref(), folder, self.session.story()).await {
            Ok(path) => println!("Exported to {}", path),
            Err(e) => println!("Export failed: {:#}", e),
        }
    }

    async fn import(&mut self) -> Result<()> {
        let mut files: Vec<String> = self
            .storage
            .list(&self.config.export_folder)
            .await?
            .into_iter()
            .filter(|path| path.ends_with(".json"))
            .collect();
        let other = "Other path...".to_string();
        files.push(other.clone());

        let Some(mut path) = optional(Select::new("Import which file?", files).prompt())? else {
            return Ok(());
        };
        if path == other {
            let Some(typed) = optional(Text::new("Path to story JSON:").prompt())? else {
                return Ok(());
            };
            path = typed.trim().to_string();
        }

        match import_story(self.storage.as_ref(), &path).await {
            Ok(story) => self.install(story).await,
            Err(e) => println!("Import failed: {}", e),
        }
        Ok(())
    }

    async fn discard(&mut self) -> Result<()> {
        let confirmed = optional(
            Confirm::new("Discard the saved story and start over?")
                .with_default(false)
                .prompt(),
        )?;
        if confirmed == Some(true) {
            self.start_over().await?;
            println!("Started a new empty story.");
        }
        Ok(())
    }

    /// Clears the local snapshot and swaps in an empty story.
    async fn start_over(&mut self) -> Result<()> {
        self.snapshots.clear().await?;
        self.session.replace_story(create_empty_story(&self.config.story.title))?;
        Ok(())
    }

    async fn install(&mut self, story: Story) {
        let title = story.title.clone();
        match self.session.replace_story(story) {
            Ok(()) => {
                println!("Loaded \"{}\"", title);
                self.snapshot().await;
            }
            Err(e) => println!("{}", e),
        }
    }
}
