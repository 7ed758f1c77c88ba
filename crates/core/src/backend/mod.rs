pub mod local;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

/// Flat object storage for cache entries. Names are plain file names, no directories.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn read(&self, name: &str) -> Result<Vec<u8>>;
    async fn write(&self, name: &str, data: &[u8]) -> Result<()>;
    async fn list(&self) -> Result<Vec<String>>;
}
