use crate::core::config::Config;
use crate::core::graph::create_empty_story;
use crate::core::model::Story;
use crate::services::generator::StoryGenerator;
use crate::services::genres::{
    effective_category, random_seed_for_genre, shuffle_seed, CUSTOM_GENRE, GENRES,
};
use crate::services::orchestrator::{begin_story, StoryParams};
use crate::services::snapshot::SnapshotStore;
use crate::utils::progress::spinner;
use crate::utils::text::excerpt;
use anyhow::{anyhow, Result};
use inquire::{Confirm, Select, Text};
use std::fmt;

/// Story and generation parameters the workflow starts from.
#[derive(Debug)]
pub struct SetupOutcome {
    pub story: Story,
    pub params: StoryParams,
}

impl SetupOutcome {
    /// Parameters for a story that was not started in this run: the opening
    /// scene stands in for the premise.
    pub fn resumed(story: Story, category: &str) -> Self {
        let seed = story
            .root()
            .map(|root| root.content.trim().to_string())
            .filter(|content| !content.is_empty())
            .unwrap_or_else(|| story.title.clone());
        Self {
            params: StoryParams::new(category, seed),
            story,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PremiseAction {
    Accept,
    Shuffle,
    Write,
}

impl fmt::Display for PremiseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PremiseAction::Accept => "Use this premise",
            PremiseAction::Shuffle => "Shuffle",
            PremiseAction::Write => "Write my own",
        };
        write!(f, "{}", label)
    }
}

fn genre_cursor(category: &str) -> usize {
    GENRES
        .iter()
        .position(|g| g.eq_ignore_ascii_case(category))
        .or_else(|| GENRES.iter().position(|g| *g == CUSTOM_GENRE))
        .unwrap_or(0)
}

pub async fn run_setup(
    config: &mut Config,
    generator: &dyn StoryGenerator,
    snapshots: &SnapshotStore,
) -> Result<SetupOutcome> {
    match snapshots.load().await {
        Ok(Some(story)) => {
            let question = format!("Resume \"{}\" ({} scenes)?", story.title, story.nodes.len());
            let resume = Confirm::new(&question).with_default(true).prompt()?;
            if resume {
                return Ok(SetupOutcome::resumed(story, &config.story.category));
            }
        }
        Ok(None) => {}
        Err(e) => {
            log::warn!("Ignoring saved snapshot: {}", e);
            println!("The saved story could not be read and will be replaced.");
        }
    }

    let genre = Select::new("Genre:", GENRES.to_vec())
        .with_starting_cursor(genre_cursor(&config.story.category))
        .prompt()?;
    let custom = if genre == CUSTOM_GENRE {
        Text::new("Describe your genre:").prompt()?
    } else {
        String::new()
    };
    let category = effective_category(genre, &custom);

    let seed = choose_premise(generator, genre, &category).await?;
    let title = Text::new("Story title:")
        .with_default(&config.story.title)
        .prompt()?;
    let params = StoryParams::new(category.clone(), seed);

    let pb = spinner("Writing the opening scene...");
    let started = begin_story(generator, &params, title.trim()).await;
    pb.finish_and_clear();

    let story = match started {
        Ok(story) => story,
        Err(e) => {
            println!("Could not generate the opening scene: {}", e);
            let fallback = Confirm::new("Start from an empty story instead?")
                .with_default(true)
                .prompt()?;
            if !fallback {
                return Err(anyhow!("Story setup aborted: {}", e));
            }
            create_empty_story(title.trim())
        }
    };

    if config.story.category != category {
        if let Err(e) = Config::remember_category(&category) {
            log::warn!("Could not remember the chosen genre: {}", e);
        }
        config.story.category = category;
    }

    Ok(SetupOutcome { story, params })
}

async fn choose_premise(
    generator: &dyn StoryGenerator,
    genre: &str,
    category: &str,
) -> Result<String> {
    let mut seed = random_seed_for_genre(genre);
    loop {
        println!("\nPremise: {}", excerpt(&seed, 240));
        let actions = vec![PremiseAction::Accept, PremiseAction::Shuffle, PremiseAction::Write];
        match Select::new("Premise:", actions).prompt()? {
            PremiseAction::Accept => return Ok(seed),
            PremiseAction::Shuffle => {
                let pb = spinner("Finding a new premise...");
                seed = shuffle_seed(generator, category).await;
                pb.finish_and_clear();
            }
            PremiseAction::Write => {
                let typed = Text::new("Your premise:").with_initial_value(&seed).prompt()?;
                if !typed.trim().is_empty() {
                    seed = typed.trim().to_string();
                }
            }
        }
    }
}
