pub mod init;
pub mod show;
pub mod sync;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Command {
    /// Store the API token and write a default config
    Init(init::InitArgs),
    /// Bring cached collections up to date
    Sync(sync::SyncArgs),
    /// Print a cached entry, or list all keys
    Show(show::ShowArgs),
}
