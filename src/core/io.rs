use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait Storage: Send + Sync {
    async fn read(&self, path: &str) -> Result<Vec<u8>>;
    async fn write(&self, path: &str, content: &[u8]) -> Result<()>;
    async fn delete(&self, path: &str) -> Result<()>;
    async fn exists(&self, path: &str) -> Result<bool>;
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    async fn read_to_string(&self, path: &str) -> Result<String> {
        let bytes = self.read(path).await?;
        String::from_utf8(bytes).with_context(|| format!("{} is not valid UTF-8", path))
    }
}

/// Filesystem storage. Relative paths resolve against `root`.
pub struct NativeStorage {
    root: PathBuf,
}

impl NativeStorage {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("."),
        }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }
}

impl Default for NativeStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for NativeStorage {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path);
        tokio::fs::read(&full)
            .await
            .with_context(|| format!("Failed to read {}", full.display()))
    }

    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&full, content)
            .await
            .with_context(|| format!("Failed to write {}", full.display()))?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path);
        if tokio::fs::try_exists(&full).await? {
            if full.is_dir() {
                tokio::fs::remove_dir_all(&full).await?;
            } else {
                tokio::fs::remove_file(&full).await?;
            }
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.resolve(path)).await?)
    }

    /// Entries directly under `prefix`, returned as paths relative to the root
    /// when `prefix` was relative. Sorted for stable listings.
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let full = self.resolve(prefix);
        let mut entries = Vec::new();

        if !tokio::fs::try_exists(&full).await? {
            return Ok(entries);
        }
        if full.is_dir() {
            let mut dir = tokio::fs::read_dir(&full).await?;
            while let Some(entry) = dir.next_entry().await? {
                let name = entry.file_name().to_string_lossy().to_string();
                entries.push(Path::new(prefix).join(name).to_string_lossy().to_string());
            }
        } else {
            entries.push(prefix.to_string());
        }
        entries.sort();
        Ok(entries)
    }
}
