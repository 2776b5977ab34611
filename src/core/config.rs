use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::services::llm::{LlmConfig, OpenAIConfig};
use crate::services::persistence::{StoreConfig, SupabaseConfig};

pub const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_snapshot")]
    pub snapshot_folder: String,

    #[serde(default = "default_export")]
    pub export_folder: String,

    #[serde(default)]
    pub story: StoryDefaults,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoryDefaults {
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for StoryDefaults {
    fn default() -> Self {
        Self {
            category: default_category(),
            title: default_title(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot_folder: default_snapshot(),
            export_folder: default_export(),
            story: StoryDefaults::default(),
            llm: LlmConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

fn default_snapshot() -> String {
    ".storyloom".to_string()
}
fn default_export() -> String {
    "exports".to_string()
}
pub fn default_category() -> String {
    "Fantasy".to_string()
}
fn default_title() -> String {
    "My Story".to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Reads the YAML config at `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::warn!("{} not found, using defaults", path.display());
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn remember_category(category: &str) -> Result<()> {
        Self::persist_category(Path::new(CONFIG_FILE), category)
    }

    /// Writes `category` as the default genre of the file at `path`. Only what
    /// the file already held is written back, so environment overrides stay
    /// out of it.
    pub fn persist_category(path: &Path, category: &str) -> Result<()> {
        let mut on_disk = Self::load_from(path)?;
        on_disk.story.category = category.to_string();
        on_disk.save_to(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.snapshot_folder)?;
        fs::create_dir_all(&self.export_folder)?;
        Ok(())
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Fills credentials from the environment-style lookup `var`.
    pub fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = var("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()) {
            match self.llm.openai.as_mut() {
                Some(openai) if openai.api_key.trim().is_empty() => openai.api_key = key,
                Some(_) => {}
                None => {
                    self.llm.openai = Some(OpenAIConfig {
                        api_key: key,
                        model: "gpt-4o-mini".to_string(),
                        base_url: None,
                    })
                }
            }
            if self.llm.provider == "stub" {
                self.llm.provider = "openai".to_string();
            }
        }

        let url = var("SUPABASE_URL").filter(|v| !v.trim().is_empty());
        let anon_key = var("SUPABASE_ANON_KEY").filter(|v| !v.trim().is_empty());
        if let (Some(url), Some(anon_key)) = (url, anon_key) {
            self.store.supabase = Some(SupabaseConfig { url, anon_key });
        }
    }
}
