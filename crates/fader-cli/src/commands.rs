use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use fader_archive::Archive;
use fader_store::{DbManager, RedbStore};
use fader_sync::{DriverKind, InitOutcome, SyncConfig, Synchronizer};
use fader_types::ImportPolicy;
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let store = open_store(&cli)?;
    debug!(
        db = %cli.db.display(),
        workspace = %config.workspace.display(),
        policy = ?config.import_policy,
        "configuration loaded"
    );
    match cli.command {
        Command::Sync => cmd_sync(store, config),
        Command::Watch(args) => cmd_watch(store, config, args),
        Command::Export(args) => cmd_export(store, config, args),
        Command::Import(args) => cmd_import(store, config, args),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<SyncConfig> {
    let mut config = match &cli.config {
        Some(path) => SyncConfig::load(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => SyncConfig::default(),
    };
    if let Some(workspace) = &cli.workspace {
        config.workspace = workspace.clone();
    }
    Ok(config)
}

fn open_store(cli: &Cli) -> anyhow::Result<Arc<dyn DbManager>> {
    let store = RedbStore::open(&cli.db)
        .with_context(|| format!("opening store {}", cli.db.display()))?;
    Ok(Arc::new(store))
}

fn cmd_sync(store: Arc<dyn DbManager>, config: SyncConfig) -> anyhow::Result<()> {
    let workspace = config.workspace.display().to_string();
    let sync = Synchronizer::new(store, config);
    match sync.sync()? {
        InitOutcome::Noop => println!("Store and workspace {} are both empty.", workspace.bold()),
        InitOutcome::Exported(stats) => println!(
            "{} Exported {} buckets, {} files into {}",
            "✓".green().bold(),
            stats.buckets,
            stats.files,
            workspace.bold()
        ),
        InitOutcome::Imported(stats) => {
            println!(
                "{} Imported {} buckets, {} files from {}",
                "✓".green().bold(),
                stats.buckets,
                stats.files,
                workspace.bold()
            );
            if stats.failed > 0 {
                println!("  {} {} entries skipped", "!".yellow().bold(), stats.failed);
            }
        }
        InitOutcome::AlreadyDone => {}
    }
    Ok(())
}

fn cmd_watch(store: Arc<dyn DbManager>, mut config: SyncConfig, args: WatchArgs) -> anyhow::Result<()> {
    if args.live {
        config.driver = DriverKind::Live;
    }
    let runtime = tokio::runtime::Runtime::new().context("starting runtime")?;
    runtime.block_on(async move {
        let workspace = config.workspace.display().to_string();
        let driver = config.driver;
        let sync = Synchronizer::new(store, config);
        let handle = match driver {
            DriverKind::Poll => sync.watch().await?,
            DriverKind::Live => sync.watch_live().await?,
        };
        println!(
            "Watching {} ({:?} driver). Press Ctrl-C to stop.",
            workspace.bold(),
            driver
        );
        tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
        handle.stop().await?;
        println!("{} Stopped.", "✓".green());
        Ok::<_, anyhow::Error>(())
    })
}

fn cmd_export(store: Arc<dyn DbManager>, config: SyncConfig, args: ExportArgs) -> anyhow::Result<()> {
    let archive = Archive::new(store, config.import_policy);
    let data = archive.export(&args.version, &args.author, &args.description)?;
    std::fs::write(&args.out, &data)
        .with_context(|| format!("writing {}", args.out.display()))?;
    println!(
        "{} Wrote {} ({} bytes)",
        "✓".green().bold(),
        args.out.display().to_string().bold(),
        data.len()
    );
    Ok(())
}

fn cmd_import(store: Arc<dyn DbManager>, config: SyncConfig, args: ImportArgs) -> anyhow::Result<()> {
    let policy = if args.strict {
        ImportPolicy::Strict
    } else {
        config.import_policy
    };
    let data = std::fs::read(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let report = Archive::new(store, policy).import_with_report(&data)?;

    match &report.info {
        Some(info) => println!(
            "Archive {} by {} from {}: {}",
            info.version.yellow(),
            info.author.bold(),
            info.created_at.to_rfc3339(),
            info.description
        ),
        None => println!("{} Archive has no readable info line", "!".yellow().bold()),
    }
    println!(
        "{} Applied {} buckets, {} files",
        "✓".green().bold(),
        report.buckets_applied,
        report.files_applied
    );
    if report.skipped > 0 {
        println!("  {} {} lines skipped", "!".yellow().bold(), report.skipped);
    }
    Ok(())
}
