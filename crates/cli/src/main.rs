mod commands;
mod config;
mod progress;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "wksync",
    version,
    about = "Incremental, rate-limited sync of remote collections into a local cache"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Config file (default: <config dir>/wksync/wksync.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config_path = cli.config.unwrap_or_else(config::AppConfig::default_path);
    match cli.command {
        commands::Command::Init(args) => commands::init::run(args, &config_path).await,
        commands::Command::Sync(args) => commands::sync::run(args, &config_path).await,
        commands::Command::Show(args) => commands::show::run(args, &config_path).await,
    }
}
