use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use wksync_core::CacheStore;
use wksync_core::backend::local::LocalBackend;

use crate::commands::sync::open_synchronizer;
use crate::config::AppConfig;

#[derive(Args)]
pub struct ShowArgs {
    /// Cache key, e.g. `subjects` or `subject-440`; lists all keys when omitted
    key: Option<String>,

    /// Fetch the entry from this API path when it is not cached yet, e.g. /subjects/440
    #[arg(long, requires = "key")]
    fetch: Option<String>,
}

pub async fn run(args: ShowArgs, config_path: &Path) -> Result<()> {
    let config = AppConfig::load(config_path)?;

    if let (Some(key), Some(path)) = (args.key.as_deref(), args.fetch.as_deref()) {
        let mut synchronizer = open_synchronizer(&config).await?;
        let resource = synchronizer.resource(key, path).await?;
        println!("{}", serde_json::to_string_pretty(&resource)?);
        return Ok(());
    }

    let backend = Arc::new(LocalBackend::new(&config.cache_dir)?);
    let store = CacheStore::open(backend).await?;

    match args.key {
        Some(key) => {
            let value: serde_json::Value = store
                .get(&key)?
                .ok_or_else(|| anyhow::anyhow!("no cache entry '{key}'"))?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        None if store.is_empty() => println!("Cache is empty."),
        None => {
            for key in store.keys() {
                println!("{key}");
            }
        }
    }
    Ok(())
}
