use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::Backend;

pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        Ok(Self { root })
    }

    /// Like [`LocalBackend::new`], but creates the directory if it does not exist yet.
    pub fn init(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create directory: {}", root.display()))?;
        Ok(Self { root })
    }

    fn full_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let full = self.full_path(name);
        tokio::fs::read(&full)
            .await
            .with_context(|| format!("failed to read: {}", full.display()))
    }

    async fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        let full = self.full_path(name);
        let tmp = self.full_path(&format!(".{name}.tmp"));
        tokio::fs::write(&tmp, data)
            .await
            .with_context(|| format!("failed to write: {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &full)
            .await
            .with_context(|| format!("failed to replace: {}", full.display()))
    }

    async fn list(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&self.root)
            .await
            .with_context(|| format!("failed to list: {}", self.root.display()))?;
        while let Some(entry) = read_dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                entries.push(name.to_string());
            }
        }
        entries.sort();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_backend_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::init(dir.path().join("cache")).unwrap();

        backend.write("subjects.json", b"{}").await.unwrap();
        assert!(dir.path().join("cache").join("subjects.json").is_file());
        assert_eq!(backend.read("subjects.json").await.unwrap(), b"{}");

        backend.write("subjects.json", b"[]").await.unwrap();
        assert_eq!(backend.read("subjects.json").await.unwrap(), b"[]");

        let list = backend.list().await.unwrap();
        assert_eq!(list, vec!["subjects.json"]);
    }

    #[tokio::test]
    async fn missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path().join("absent")).unwrap();
        assert!(backend.list().await.unwrap().is_empty());
        assert!(backend.read("assignments.json").await.is_err());
    }
}
