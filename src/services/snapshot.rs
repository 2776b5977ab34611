//! Local story snapshot plus JSON import/export.

use crate::core::error::StoryError;
use crate::core::io::Storage;
use crate::core::model::Story;
use anyhow::{Context, Result};
use std::sync::Arc;

pub const SNAPSHOT_FILE: &str = "story.json";

/// Last-write-wins copy of the story being edited.
pub struct SnapshotStore {
    storage: Arc<dyn Storage>,
    path: String,
}

impl SnapshotStore {
    pub fn new(storage: Arc<dyn Storage>, folder: &str) -> Self {
        Self {
            storage,
            path: join(folder, SNAPSHOT_FILE),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub async fn save(&self, story: &Story) -> Result<()> {
        let json = story.to_json_pretty()?;
        self.storage
            .write(&self.path, json.as_bytes())
            .await
            .with_context(|| format!("Failed to write snapshot {}", self.path))?;
        log::debug!("Snapshot written to {}", self.path);
        Ok(())
    }

    /// `None` when no snapshot exists.
    pub async fn load(&self) -> Result<Option<Story>, StoryError> {
        let exists = self
            .storage
            .exists(&self.path)
            .await
            .map_err(|e| StoryError::Io(e.to_string()))?;
        if !exists {
            return Ok(None);
        }
        let story = read_story(self.storage.as_ref(), &self.path).await?;
        Ok(Some(story))
    }

    pub async fn clear(&self) -> Result<()> {
        if self.storage.exists(&self.path).await? {
            self.storage.delete(&self.path).await?;
        }
        Ok(())
    }
}

fn join(folder: &str, file: &str) -> String {
    let folder = folder.trim_end_matches('/');
    if folder.is_empty() {
        file.to_string()
    } else {
        format!("{}/{}", folder, file)
    }
}

async fn read_story(storage: &dyn Storage, path: &str) -> Result<Story, StoryError> {
    let json = storage
        .read_to_string(path)
        .await
        .map_err(|e| StoryError::Io(format!("{:#}", e)))?;
    Story::from_json(&json)
}

pub async fn export_story(storage: &dyn Storage, folder: &str, story: &Story) -> Result<String> {
    let path = join(folder, &format!("story-{}.json", story.id));
    let json = story.to_json_pretty()?;
    storage.write(&path, json.as_bytes()).await?;
    log::info!("Exported story to {}", path);
    Ok(path)
}

pub async fn import_story(storage: &dyn Storage, path: &str) -> Result<Story, StoryError> {
    let story = read_story(storage, path).await?;
    log::info!("Imported story {} from {}", story.id, path);
    Ok(story)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::{append_choice, create_empty_story};
    use crate::core::io::NativeStorage;
    use tempfile::tempdir;

    fn storage(dir: &tempfile::TempDir) -> Arc<dyn Storage> {
        Arc::new(NativeStorage::with_root(dir.path()))
    }

    #[tokio::test]
    async fn test_snapshot_save_load_clear() {
        let dir = tempdir().unwrap();
        let snapshots = SnapshotStore::new(storage(&dir), ".storyloom");
        assert_eq!(snapshots.load().await.unwrap(), None);

        let story = create_empty_story("Saved");
        let root = story.root_id.clone();
        let (story, _) = append_choice(&story, &root, "onward");
        snapshots.save(&story).await.unwrap();
        assert_eq!(snapshots.load().await.unwrap(), Some(story.clone()));

        let (newer, _) = append_choice(&story, &root, "back");
        snapshots.save(&newer).await.unwrap();
        assert_eq!(snapshots.load().await.unwrap(), Some(newer));

        snapshots.clear().await.unwrap();
        assert_eq!(snapshots.load().await.unwrap(), None);
        snapshots.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_snapshot_is_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir);
        let snapshots = SnapshotStore::new(storage.clone(), ".storyloom");

        let mut story = create_empty_story("Broken");
        story.root_id = "gone".to_string();
        let json = serde_json::to_string(&story).unwrap();
        storage.write(snapshots.path(), json.as_bytes()).await.unwrap();
        assert!(matches!(snapshots.load().await, Err(StoryError::MissingRoot(_))));

        storage.write(snapshots.path(), b"{ not json").await.unwrap();
        assert!(matches!(snapshots.load().await, Err(StoryError::Json(_))));
    }

    #[tokio::test]
    async fn test_export_then_import() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir);
        let story = create_empty_story("Exported");

        let path = export_story(storage.as_ref(), "exports", &story).await.unwrap();
        assert_eq!(path, format!("exports/story-{}.json", story.id));
        assert!(dir.path().join(&path).exists());

        let imported = import_story(storage.as_ref(), &path).await.unwrap();
        assert_eq!(imported, story);
    }

    #[tokio::test]
    async fn test_import_rejects_dangling_choice_and_missing_file() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir);

        let story = create_empty_story("Dangling");
        let root = story.root_id.clone();
        let (mut story, _) = append_choice(&story, &root, "nowhere");
        if let Some(node) = story.nodes.get_mut(&root) {
            node.choices[0].to = Some("missing".to_string());
        }
        let json = serde_json::to_string(&story).unwrap();
        storage.write("bad.json", json.as_bytes()).await.unwrap();

        assert!(matches!(
            import_story(storage.as_ref(), "bad.json").await,
            Err(StoryError::DanglingChoice { .. })
        ));
        assert!(matches!(
            import_story(storage.as_ref(), "absent.json").await,
            Err(StoryError::Io(_))
        ));
    }
}
