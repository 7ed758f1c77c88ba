use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use wksync_api::Credentials;

use crate::config::AppConfig;

#[derive(Args)]
pub struct InitArgs {
    /// API token (prompted for when omitted)
    #[arg(long)]
    token: Option<String>,

    /// Overwrite an existing config with defaults
    #[arg(long)]
    force: bool,
}

pub async fn run(args: InitArgs, config_path: &Path) -> Result<()> {
    let config = if config_path.exists() && !args.force {
        AppConfig::load(config_path)?
    } else {
        let config = AppConfig::default();
        config.save(config_path)?;
        config
    };

    let token = match args.token {
        Some(token) => token,
        None => dialoguer::Password::new()
            .with_prompt("API token")
            .interact()
            .context("failed to read API token")?,
    };
    Credentials::new(token)?.save(&config.token_file)?;

    info!(
        config_path = %config_path.display(),
        token_file = %config.token_file.display(),
        "wksync initialized"
    );
    println!("Config:      {}", config_path.display());
    println!("Credentials: {}", config.token_file.display());
    println!("Cache:       {}", config.cache_dir.display());
    Ok(())
}
