use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use tracing::{info, warn};

use wksync_api::{ApiClient, Credentials, RateLimiter};
use wksync_core::backend::local::LocalBackend;
use wksync_core::sync::SyncReport;
use wksync_core::{CacheStore, CollectionSpec, Synchronizer};

use crate::config::AppConfig;
use crate::progress;

#[derive(Args)]
pub struct SyncArgs {
    /// Collection to sync; repeatable (default: every configured collection)
    #[arg(short, long = "collection")]
    collections: Vec<String>,

    /// Only these record ids are needed, e.g. --ids 440,441 (requires exactly one --collection)
    #[arg(long, value_delimiter = ',', requires = "collections")]
    ids: Vec<u64>,
}

/// Build a synchronizer from config: credentials, shared rate limiter, cache directory.
pub async fn open_synchronizer(config: &AppConfig) -> Result<Synchronizer<ApiClient>> {
    let credentials = Credentials::load(&config.token_file)?;
    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit.max_requests,
        config.rate_limit.window(),
    ));
    let api = ApiClient::new(&config.base_url, credentials, limiter)?;

    let backend = Arc::new(LocalBackend::init(&config.cache_dir)?);
    let store = CacheStore::open(backend)
        .await
        .with_context(|| format!("failed to load cache from {}", config.cache_dir.display()))?;
    Ok(Synchronizer::new(store, api))
}

/// Collections to sync and, optionally, the ids needed from them.
///
/// Ids only make sense within one collection's id space, so `--ids` needs exactly one
/// `--collection`.
fn selection<'a>(
    config: &'a AppConfig,
    args: &SyncArgs,
) -> Result<(Vec<&'a CollectionSpec>, Option<BTreeSet<u64>>)> {
    if !args.ids.is_empty() && args.collections.len() != 1 {
        anyhow::bail!(
            "--ids needs exactly one --collection (got {})",
            args.collections.len()
        );
    }

    let selected: Vec<&CollectionSpec> = if args.collections.is_empty() {
        config.collections.iter().collect()
    } else {
        args.collections
            .iter()
            .map(|name| {
                config
                    .find_collection(name)
                    .ok_or_else(|| anyhow::anyhow!("collection '{name}' is not configured"))
            })
            .collect::<Result<_>>()?
    };
    let needed: Option<BTreeSet<u64>> =
        (!args.ids.is_empty()).then(|| args.ids.iter().copied().collect());
    Ok((selected, needed))
}

pub async fn run(args: SyncArgs, config_path: &Path) -> Result<()> {
    let config = AppConfig::load(config_path)?;
    let (selected, needed) = selection(&config, &args)?;

    let mut synchronizer = open_synchronizer(&config).await?;
    let mut failed = Vec::new();

    for collection in selected {
        let spinner = progress::create_spinner(&format!("Syncing {}...", collection.name));
        let result = tokio::select! {
            result = synchronizer.sync_with_report(collection, needed.as_ref()) => result,
            _ = tokio::signal::ctrl_c() => {
                spinner.abandon_with_message("interrupted");
                anyhow::bail!("interrupted; cache left as of the last completed sync");
            }
        };

        match result {
            Ok((view, report)) => {
                spinner.finish_with_message(format!(
                    "{} {}: {}",
                    style("ok").green(),
                    collection.name,
                    describe(&report, view.len())
                ));
            }
            Err(e) => {
                warn!(collection = %collection.name, error = %e, "sync failed, keeping cached data");
                spinner.abandon_with_message(format!(
                    "{} {}: {e}",
                    style("failed").red(),
                    collection.name
                ));
                failed.push(collection.name.clone());
            }
        }
    }

    if !failed.is_empty() {
        anyhow::bail!(
            "{} collection(s) failed to sync: {}",
            failed.len(),
            failed.join(", ")
        );
    }
    info!("sync complete");
    Ok(())
}

fn describe(report: &SyncReport, returned: usize) -> String {
    let watermark = report
        .watermark
        .map(|w| w.to_string())
        .unwrap_or_else(|| "-".into());
    if report.reason.is_none() {
        format!("nothing requested ({} cached)", report.total)
    } else if report.unchanged {
        format!(
            "unchanged ({} cached, {returned} returned, as of {watermark})",
            report.total
        )
    } else {
        format!(
            "{} fetched over {} page(s), {} cached, {returned} returned, as of {watermark}",
            report.fetched, report.pages, report.total
        )
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn args(collections: &[&str], ids: &[u64]) -> SyncArgs {
        SyncArgs {
            collections: collections.iter().map(|c| c.to_string()).collect(),
            ids: ids.to_vec(),
        }
    }

    #[test]
    fn ids_apply_to_a_single_collection() {
        let config = AppConfig::default();
        let (selected, needed) = selection(&config, &args(&["subjects"], &[440, 441])).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "subjects");
        assert_eq!(needed, Some(BTreeSet::from([440, 441])));
    }

    #[test]
    fn ids_without_exactly_one_collection_are_rejected() {
        let config = AppConfig::default();
        assert!(selection(&config, &args(&[], &[440])).is_err());
        assert!(selection(&config, &args(&["subjects", "assignments"], &[440])).is_err());
        assert!(crate::Cli::try_parse_from(["wksync", "sync", "--ids", "440"]).is_err());
    }

    #[test]
    fn no_selection_means_every_collection() {
        let config = AppConfig::default();
        let (selected, needed) = selection(&config, &args(&[], &[])).unwrap();
        assert_eq!(selected.len(), config.collections.len());
        assert_eq!(needed, None);
    }

    #[test]
    fn unknown_collection_is_an_error() {
        let config = AppConfig::default();
        assert!(selection(&config, &args(&["kanji"], &[])).is_err());
    }
}
