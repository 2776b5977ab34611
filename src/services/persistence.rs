//! Remote story storage over a PostgREST (Supabase) table.

use crate::core::config::Config;
use crate::core::error::StoreError;
use crate::core::model::{NodeId, Story, StoryNode};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use url::Url;

const LIST_LIMIT: usize = 50;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    pub supabase: Option<SupabaseConfig>,
    #[serde(default = "default_table")]
    pub table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            supabase: None,
            table: default_table(),
        }
    }
}

fn default_table() -> String {
    "stories".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorySummary {
    pub id: String,
    pub title: String,
    pub updated_at: Option<String>,
}

#[async_trait]
pub trait StoryStore: Send + Sync + Debug {
    /// Inserts or overwrites the story; returns its id.
    async fn save(&self, story: &Story) -> Result<String, StoreError>;
    async fn load(&self, id: &str) -> Result<Story, StoreError>;
    /// Newest first.
    async fn list(&self) -> Result<Vec<StorySummary>, StoreError>;
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
    fn is_configured(&self) -> bool;
}

pub fn create_store(config: &Config) -> Box<dyn StoryStore> {
    match &config.store.supabase {
        Some(cfg) if !cfg.url.trim().is_empty() && !cfg.anon_key.trim().is_empty() => {
            match SupabaseStore::new(cfg, &config.store.table) {
                Ok(store) => Box::new(store),
                Err(e) => {
                    log::warn!("Remote store disabled: {}", e);
                    Box::new(UnconfiguredStore)
                }
            }
        }
        _ => {
            log::info!("No remote store configured");
            Box::new(UnconfiguredStore)
        }
    }
}

// --- Unconfigured ---
#[derive(Debug, Default)]
pub struct UnconfiguredStore;

#[async_trait]
impl StoryStore for UnconfiguredStore {
    async fn save(&self, _story: &Story) -> Result<String, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn load(&self, _id: &str) -> Result<Story, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn list(&self) -> Result<Vec<StorySummary>, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn delete(&self, _id: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    fn is_configured(&self) -> bool {
        false
    }
}

// --- Supabase ---
#[derive(Debug)]
pub struct SupabaseStore {
    endpoint: Url,
    anon_key: String,
    client: reqwest::Client,
}

#[derive(Serialize, Deserialize)]
struct StoryRow {
    id: String,
    title: String,
    root_id: NodeId,
    nodes: HashMap<NodeId, StoryNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<String>,
}

impl From<&Story> for StoryRow {
    fn from(story: &Story) -> Self {
        Self {
            id: story.id.clone(),
            title: story.title.clone(),
            root_id: story.root_id.clone(),
            nodes: story.nodes.clone(),
            updated_at: None,
        }
    }
}

impl From<StoryRow> for Story {
    fn from(row: StoryRow) -> Self {
        Story {
            id: row.id,
            title: row.title,
            root_id: row.root_id,
            nodes: row.nodes,
        }
    }
}

impl SupabaseStore {
    pub fn new(config: &SupabaseConfig, table: &str) -> Result<Self, StoreError> {
        let endpoint = table_endpoint(&config.url, table)?;
        Ok(Self {
            endpoint,
            anon_key: config.anon_key.clone(),
            client: reqwest::Client::new(),
        })
    }

    fn url_with(&self, pairs: &[(&str, &str)]) -> Url {
        let mut url = self.endpoint.clone();
        if !pairs.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in pairs {
                query.append_pair(key, value);
            }
        }
        url
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        Err(StoreError::Remote(format!("{} - {}", status, text)))
    }
}

fn table_endpoint(base: &str, table: &str) -> Result<Url, StoreError> {
    let base = base.trim().trim_end_matches('/');
    let url = format!("{}/rest/v1/{}", base, table.trim());
    Url::parse(&url).map_err(|e| StoreError::Remote(format!("Invalid store url {}: {}", url, e)))
}

#[async_trait]
impl StoryStore for SupabaseStore {
    async fn save(&self, story: &Story) -> Result<String, StoreError> {
        story.validate()?;
        let url = self.url_with(&[("on_conflict", "id")]);
        let response = self
            .request(reqwest::Method::POST, url)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[StoryRow::from(story)])
            .send()
            .await?;
        Self::check(response).await?;
        log::info!("Saved story {} remotely", story.id);
        Ok(story.id.clone())
    }

    async fn load(&self, id: &str) -> Result<Story, StoreError> {
        let filter = format!("eq.{}", id);
        let url = self.url_with(&[
            ("select", "id,title,root_id,nodes,updated_at"),
            ("id", filter.as_str()),
            ("limit", "1"),
        ]);
        let response = self.request(reqwest::Method::GET, url).send().await?;
        let body = Self::check(response).await?.text().await?;
        let mut rows: Vec<StoryRow> = serde_json::from_str(&body)?;
        if rows.is_empty() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let story: Story = rows.swap_remove(0).into();
        story.validate()?;
        Ok(story)
    }

    async fn list(&self) -> Result<Vec<StorySummary>, StoreError> {
        let limit = LIST_LIMIT.to_string();
        let url = self.url_with(&[
            ("select", "id,title,updated_at"),
            ("order", "updated_at.desc"),
            ("limit", limit.as_str()),
        ]);
        let response = self.request(reqwest::Method::GET, url).send().await?;
        let body = Self::check(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let filter = format!("eq.{}", id);
        let url = self.url_with(&[("id", filter.as_str())]);
        let response = self.request(reqwest::Method::DELETE, url).send().await?;
        Self::check(response).await?;
        log::info!("Deleted remote story {}", id);
        Ok(())
    }

    fn is_configured(&self) -> bool {
        true
    }
}
