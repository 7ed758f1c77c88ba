use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::Backend;

/// In-process backend. Counts writes so callers can observe write suppression.
#[derive(Default)]
pub struct MemoryBackend {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    writes: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from pre-existing file contents, e.g. a cache written by an earlier run.
    pub fn with_files<I, K, V>(files: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        let files = files
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            files: Mutex::new(files),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        self.files.lock().await.clone()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        self.files
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such entry: {name}"))
    }

    async fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        self.files
            .lock()
            .await
            .insert(name.to_string(), data.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.files.lock().await.keys().cloned().collect())
    }
}
