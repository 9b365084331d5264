use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "fader",
    about = "Fader: bucket and file store mirrored to a workspace directory",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store database file
    #[arg(long, global = true, default_value = "fader.redb")]
    pub db: PathBuf,

    /// Workspace directory, overriding the configuration
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize and reconcile the workspace once
    Sync,
    /// Keep the store in step with the workspace until interrupted
    Watch(WatchArgs),
    /// Write the whole store to an archive file
    Export(ExportArgs),
    /// Load an archive file into the store
    Import(ImportArgs),
}

#[derive(Args)]
pub struct WatchArgs {
    /// Use OS notifications instead of polling
    #[arg(long)]
    pub live: bool,
}

#[derive(Args)]
pub struct ExportArgs {
    #[arg(long)]
    pub out: PathBuf,
    #[arg(long, default_value = env!("CARGO_PKG_VERSION"))]
    pub version: String,
    #[arg(long, default_value = "")]
    pub author: String,
    #[arg(long, default_value = "")]
    pub description: String,
}

#[derive(Args)]
pub struct ImportArgs {
    pub file: PathBuf,
    /// Abort on the first bad line instead of skipping it
    #[arg(long)]
    pub strict: bool,
}
