//! Folio admin CLI (folio-admin) - Main entry point
//!
//! Manages site content: recordings, the food gallery, guitar tabs,
//! visitor comments, the guestbook, editable page text and playback
//! settings. Media files are uploaded to bucket storage and referenced by
//! their public URLs.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use folio_common::config::{resolve_root_folder, FolioPaths, TomlConfig};
use folio_common::db::init_database;
use folio_common::storage::BucketStore;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{AdminContext, Command};

/// Command-line arguments for folio-admin
#[derive(Parser, Debug)]
#[command(name = "folio-admin")]
#[command(about = "Content administration for the Folio portfolio site")]
#[command(version)]
struct Args {
    /// Root folder holding the database and buckets
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Print listings as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load_or_default();

    // Logs go to stderr so listings on stdout stay machine-readable
    let level = &config.logging.level;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("folio_admin={level},folio_common={level},folio_player={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let root = resolve_root_folder(args.root_folder.as_deref(), &config);
    let paths = FolioPaths::new(&root);
    debug!(root = %paths.root.display(), "Resolved root folder");

    let db = init_database(&paths.database)
        .await
        .with_context(|| format!("Failed to open database {}", paths.database.display()))?;
    let store = BucketStore::new(&paths.buckets, &config.storage.public_base_url);

    let ctx = AdminContext {
        db,
        store,
        json: args.json,
    };
    commands::run(args.command, &ctx).await?;

    ctx.db.close().await;
    debug!("Done");
    Ok(())
}
