//! Admin subcommands

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use folio_common::db::comments::{self, CommentTarget};
use folio_common::db::food::{self, FoodItem};
use folio_common::db::settings::{self, PlaybackTuning};
use folio_common::db::tabs::{self, TabEmbed};
use folio_common::db::tracks::{self, Track};
use folio_common::db::{guestbook, pages};
use folio_common::storage::{
    BucketStore, StoredObject, COVERS_BUCKET, FOOD_BUCKET, SOUNDFONTS_BUCKET, TABS_BUCKET,
    TRACKS_BUCKET,
};
use folio_player::program::{resolve_instrument, GM_INSTRUMENTS};
use folio_player::soundfont::{self, check_programs, SoundFontInfo};
use folio_player::Program;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

pub struct AdminContext {
    pub db: SqlitePool,
    pub store: BucketStore,
    /// Print listings as JSON instead of text
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Music recordings
    #[command(subcommand)]
    Track(TrackCommand),

    /// Food photo gallery
    #[command(subcommand)]
    Food(FoodCommand),

    /// Guitar tabs
    #[command(subcommand)]
    Tab(TabCommand),

    /// Visitor comment moderation
    #[command(subcommand)]
    Comment(CommentCommand),

    #[command(subcommand)]
    Guestbook(GuestbookCommand),

    /// Editable page text
    #[command(subcommand)]
    Page(PageCommand),

    /// Playback settings
    #[command(subcommand)]
    Settings(SettingsCommand),

    #[command(subcommand)]
    Soundfont(SoundfontCommand),

    /// List General MIDI instruments
    Instruments,
}

#[derive(Subcommand, Debug)]
pub enum TrackCommand {
    /// Upload an audio file and append it to the recordings
    Add {
        file: PathBuf,
        /// Defaults to the file name
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Cover image to upload
        #[arg(long)]
        cover: Option<PathBuf>,
        #[arg(long)]
        duration_ms: Option<i64>,
    },
    List,
    /// Delete a track, its uploads and its comments
    Remove { id: Uuid },
    /// Set display order (every track id, first to last)
    Reorder { ids: Vec<Uuid> },
}

#[derive(Subcommand, Debug)]
pub enum FoodCommand {
    /// Upload a photo and append it to the gallery
    Add {
        image: PathBuf,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    List,
    Remove { id: Uuid },
    Reorder { ids: Vec<Uuid> },
}

#[derive(Subcommand, Debug)]
pub enum TabCommand {
    /// Upload a tab file (Guitar Pro, MusicXML)
    Add {
        file: PathBuf,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        artist: Option<String>,
        /// Program number or GM instrument name
        #[arg(long)]
        instrument: Option<Program>,
    },
    List,
    Remove { id: Uuid },
    Reorder { ids: Vec<Uuid> },
}

#[derive(Subcommand, Debug)]
pub enum CommentCommand {
    List {
        /// Only comments awaiting approval
        #[arg(long)]
        pending: bool,
    },
    Approve { id: Uuid },
    Remove { id: Uuid },
}

#[derive(Subcommand, Debug)]
pub enum GuestbookCommand {
    List {
        #[arg(long, default_value = "50")]
        limit: u32,
    },
    Remove { id: Uuid },
}

#[derive(Subcommand, Debug)]
pub enum PageCommand {
    Get { key: String },
    Set { key: String, value: String },
    List {
        /// Only keys starting with this prefix
        #[arg(default_value = "")]
        prefix: String,
    },
    Remove { key: String },
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    Show,
    /// Upload and activate a soundfont
    SetSoundfont { file: PathBuf },
    /// Site-wide default instrument (number or GM name)
    SetInstrument { instrument: Program },
    /// Default playback speed (clamped to 0.25-2.0)
    SetSpeed { speed: f64 },
    /// Position reconciliation timing
    SetTuning(TuningArgs),
}

#[derive(Args, Debug)]
pub struct TuningArgs {
    #[arg(long)]
    glitch_threshold_ms: Option<u64>,
    #[arg(long)]
    reassert_delay_ms: Option<u64>,
    #[arg(long)]
    pause_glitch_window_ms: Option<u64>,
    #[arg(long)]
    resume_guard_timeout_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum SoundfontCommand {
    /// List presets and check coverage of the instruments in use
    Scan { file: PathBuf },
}

pub async fn run(command: Command, ctx: &AdminContext) -> Result<()> {
    match command {
        Command::Track(cmd) => run_track(cmd, ctx).await,
        Command::Food(cmd) => run_food(cmd, ctx).await,
        Command::Tab(cmd) => run_tab(cmd, ctx).await,
        Command::Comment(cmd) => run_comment(cmd, ctx).await,
        Command::Guestbook(cmd) => run_guestbook(cmd, ctx).await,
        Command::Page(cmd) => run_page(cmd, ctx).await,
        Command::Settings(cmd) => run_settings(cmd, ctx).await,
        Command::Soundfont(SoundfontCommand::Scan { file }) => scan_soundfont(&file, ctx).await,
        Command::Instruments => {
            let default = settings::get_default_instrument(&ctx.db).await?;
            for (program, name) in GM_INSTRUMENTS.iter().enumerate() {
                let marker = if program == default as usize { "*" } else { " " };
                println!("{marker}{program:>4}  {name}");
            }
            Ok(())
        }
    }
}

async fn run_track(cmd: TrackCommand, ctx: &AdminContext) -> Result<()> {
    match cmd {
        TrackCommand::Add {
            file,
            title,
            description,
            cover,
            duration_ms,
        } => {
            let audio = upload(ctx, TRACKS_BUCKET, &file).await?;
            let cover = match cover {
                Some(path) => match upload(ctx, COVERS_BUCKET, &path).await {
                    Ok(stored) => Some(stored),
                    Err(e) => {
                        discard(ctx, Some(&audio)).await;
                        return Err(e);
                    }
                },
                None => None,
            };

            let mut track = Track::new(title_or_stem(title, &file), &audio.public_url);
            track.description = description;
            track.cover_url = cover.as_ref().map(|c| c.public_url.clone());
            track.duration_ms = duration_ms;

            match tracks::insert_track(&ctx.db, &track).await {
                Ok(track) => {
                    info!(id = %track.id, title = %track.title, "Track added");
                    println!("{}", track.id);
                    Ok(())
                }
                Err(e) => {
                    discard(ctx, Some(&audio)).await;
                    discard(ctx, cover.as_ref()).await;
                    Err(e).context("Failed to save track")
                }
            }
        }
        TrackCommand::List => {
            let tracks = tracks::list_tracks(&ctx.db).await?;
            print_list(ctx, &tracks, |t| {
                format!("{}  {:>3}  {}  {}", t.id, t.sort_order, t.title, t.audio_url)
            })
        }
        TrackCommand::Remove { id } => {
            let track = tracks::delete_track(&ctx.db, id)
                .await
                .with_context(|| format!("Failed to remove track {}", id))?;
            remove_media(ctx, &track.audio_url).await;
            if let Some(cover) = &track.cover_url {
                remove_media(ctx, cover).await;
            }
            let comments = comments::delete_comments_for(&ctx.db, CommentTarget::Track, id).await?;
            info!(id = %id, comments, "Track removed");
            println!("Removed {}", track.title);
            Ok(())
        }
        TrackCommand::Reorder { ids } => {
            tracks::reorder_tracks(&ctx.db, &ids)
                .await
                .context("Failed to reorder tracks")?;
            Ok(())
        }
    }
}

async fn run_food(cmd: FoodCommand, ctx: &AdminContext) -> Result<()> {
    match cmd {
        FoodCommand::Add {
            image,
            title,
            description,
        } => {
            let photo = upload(ctx, FOOD_BUCKET, &image).await?;
            let mut item = FoodItem::new(title_or_stem(title, &image), &photo.public_url);
            item.description = description;

            match food::insert_food_item(&ctx.db, &item).await {
                Ok(item) => {
                    info!(id = %item.id, title = %item.title, "Food item added");
                    println!("{}", item.id);
                    Ok(())
                }
                Err(e) => {
                    discard(ctx, Some(&photo)).await;
                    Err(e).context("Failed to save food item")
                }
            }
        }
        FoodCommand::List => {
            let items = food::list_food_items(&ctx.db).await?;
            print_list(ctx, &items, |i| {
                format!("{}  {:>3}  {}  {}", i.id, i.sort_order, i.title, i.image_url)
            })
        }
        FoodCommand::Remove { id } => {
            let item = food::delete_food_item(&ctx.db, id)
                .await
                .with_context(|| format!("Failed to remove food item {}", id))?;
            remove_media(ctx, &item.image_url).await;
            comments::delete_comments_for(&ctx.db, CommentTarget::Food, id).await?;
            println!("Removed {}", item.title);
            Ok(())
        }
        FoodCommand::Reorder { ids } => {
            food::reorder_food_items(&ctx.db, &ids)
                .await
                .context("Failed to reorder food items")?;
            Ok(())
        }
    }
}

async fn run_tab(cmd: TabCommand, ctx: &AdminContext) -> Result<()> {
    match cmd {
        TabCommand::Add {
            file,
            title,
            artist,
            instrument,
        } => {
            let stored = upload(ctx, TABS_BUCKET, &file).await?;
            let mut tab = TabEmbed::new(title_or_stem(title, &file), &stored.public_url);
            tab.artist = artist;
            tab.default_instrument = instrument.map(Program::number);

            match tabs::insert_tab(&ctx.db, &tab).await {
                Ok(tab) => {
                    info!(id = %tab.id, title = %tab.title, "Tab added");
                    println!("{}", tab.id);
                    Ok(())
                }
                Err(e) => {
                    discard(ctx, Some(&stored)).await;
                    Err(e).context("Failed to save tab")
                }
            }
        }
        TabCommand::List => {
            let tabs = tabs::list_tabs(&ctx.db).await?;
            let site_default = settings::get_default_instrument(&ctx.db).await?;
            print_list(ctx, &tabs, |t| {
                let program = resolve_instrument(t.default_instrument, Some(site_default));
                format!(
                    "{}  {:>3}  {}{}  [{}]",
                    t.id,
                    t.sort_order,
                    t.title,
                    t.artist.as_deref().map(|a| format!(" - {}", a)).unwrap_or_default(),
                    program
                )
            })
        }
        TabCommand::Remove { id } => {
            let tab = tabs::delete_tab(&ctx.db, id)
                .await
                .with_context(|| format!("Failed to remove tab {}", id))?;
            remove_media(ctx, &tab.file_url).await;
            comments::delete_comments_for(&ctx.db, CommentTarget::Tab, id).await?;
            println!("Removed {}", tab.title);
            Ok(())
        }
        TabCommand::Reorder { ids } => {
            tabs::reorder_tabs(&ctx.db, &ids)
                .await
                .context("Failed to reorder tabs")?;
            Ok(())
        }
    }
}

async fn run_comment(cmd: CommentCommand, ctx: &AdminContext) -> Result<()> {
    match cmd {
        CommentCommand::List { pending } => {
            let comments = if pending {
                comments::list_pending_comments(&ctx.db).await?
            } else {
                comments::list_all_comments(&ctx.db).await?
            };
            print_list(ctx, &comments, |c| {
                format!(
                    "{}  {}  {}:{}  {}: {}",
                    c.id,
                    if c.approved { "approved" } else { "pending " },
                    c.target,
                    c.target_id,
                    c.author_name,
                    c.body
                )
            })
        }
        CommentCommand::Approve { id } => {
            comments::approve_comment(&ctx.db, id)
                .await
                .with_context(|| format!("Failed to approve comment {}", id))?;
            info!(id = %id, "Comment approved");
            Ok(())
        }
        CommentCommand::Remove { id } => {
            comments::delete_comment(&ctx.db, id)
                .await
                .with_context(|| format!("Failed to remove comment {}", id))?;
            Ok(())
        }
    }
}

async fn run_guestbook(cmd: GuestbookCommand, ctx: &AdminContext) -> Result<()> {
    match cmd {
        GuestbookCommand::List { limit } => {
            let messages = guestbook::list_messages(&ctx.db, limit).await?;
            print_list(ctx, &messages, |m| {
                format!(
                    "{}  {}  {}: {}",
                    m.id,
                    m.created_at.format("%Y-%m-%d %H:%M"),
                    m.author_name,
                    m.body
                )
            })
        }
        GuestbookCommand::Remove { id } => {
            guestbook::delete_message(&ctx.db, id)
                .await
                .with_context(|| format!("Failed to remove guestbook message {}", id))?;
            Ok(())
        }
    }
}

async fn run_page(cmd: PageCommand, ctx: &AdminContext) -> Result<()> {
    match cmd {
        PageCommand::Get { key } => match pages::get_page_content(&ctx.db, &key).await? {
            Some(value) => {
                println!("{}", value);
                Ok(())
            }
            None => bail!("No page content for {}", key),
        },
        PageCommand::Set { key, value } => {
            pages::set_page_content(&ctx.db, &key, &value)
                .await
                .with_context(|| format!("Failed to set {}", key))?;
            Ok(())
        }
        PageCommand::List { prefix } => {
            let entries = pages::list_page_content(&ctx.db, &prefix).await?;
            if ctx.json {
                let map: serde_json::Map<String, serde_json::Value> = entries
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&map)?);
            } else {
                for (key, value) in entries {
                    println!("{} = {}", key, value);
                }
            }
            Ok(())
        }
        PageCommand::Remove { key } => {
            if !pages::delete_page_content(&ctx.db, &key).await? {
                bail!("No page content for {}", key);
            }
            Ok(())
        }
    }
}

async fn run_settings(cmd: SettingsCommand, ctx: &AdminContext) -> Result<()> {
    match cmd {
        SettingsCommand::Show => {
            for (key, value) in settings::list_settings(&ctx.db).await? {
                println!("{} = {}", key, value.as_deref().unwrap_or("(unset)"));
            }
            Ok(())
        }
        SettingsCommand::SetSoundfont { file } => {
            // Reject files the synthesizer could not load before uploading
            let info = soundfont::scan_file(&file)
                .await
                .with_context(|| format!("{} is not a usable soundfont", file.display()))?;
            let default = settings::get_default_instrument(&ctx.db).await?;
            if !info.has_program(default) {
                warn!(
                    program = default,
                    "Soundfont has no preset for the default instrument"
                );
            }

            let stored = upload(ctx, SOUNDFONTS_BUCKET, &file).await?;
            settings::set_active_soundfont_url(&ctx.db, &stored.public_url).await?;
            info!(url = %stored.public_url, presets = info.presets.len(), "Soundfont activated");
            println!("{}", stored.public_url);
            Ok(())
        }
        SettingsCommand::SetInstrument { instrument } => {
            settings::set_default_instrument(&ctx.db, instrument.number()).await?;
            println!("Default instrument: {}", instrument);
            Ok(())
        }
        SettingsCommand::SetSpeed { speed } => {
            settings::set_playback_speed(&ctx.db, speed).await?;
            println!(
                "Playback speed: {}",
                settings::get_playback_speed(&ctx.db).await?
            );
            Ok(())
        }
        SettingsCommand::SetTuning(args) => {
            let current = settings::load_playback_tuning(&ctx.db).await?;
            let tuning = PlaybackTuning {
                glitch_threshold_ms: args.glitch_threshold_ms.unwrap_or(current.glitch_threshold_ms),
                reassert_delay_ms: args.reassert_delay_ms.unwrap_or(current.reassert_delay_ms),
                pause_glitch_window_ms: args
                    .pause_glitch_window_ms
                    .unwrap_or(current.pause_glitch_window_ms),
                resume_guard_timeout_ms: args
                    .resume_guard_timeout_ms
                    .unwrap_or(current.resume_guard_timeout_ms),
            };
            settings::save_playback_tuning(&ctx.db, &tuning).await?;

            // Print what will actually be used after clamping
            let effective = settings::load_playback_tuning(&ctx.db).await?;
            println!("{:#?}", effective);
            Ok(())
        }
    }
}

async fn scan_soundfont(file: &Path, ctx: &AdminContext) -> Result<()> {
    let info = soundfont::scan_file(file)
        .await
        .with_context(|| format!("Failed to scan {}", file.display()))?;

    // Instruments the site can ask for: every tab's, plus the site default
    let site_default = settings::get_default_instrument(&ctx.db).await?;
    let mut programs = vec![site_default];
    for tab in tabs::list_tabs(&ctx.db).await? {
        programs.push(resolve_instrument(tab.default_instrument, Some(site_default)).number());
    }
    let report = check_programs(&info, programs, true);

    if ctx.json {
        #[derive(Serialize)]
        struct ScanOutput<'a> {
            soundfont: &'a SoundFontInfo,
            compatibility: &'a soundfont::CompatibilityReport,
        }
        let output = ScanOutput {
            soundfont: &info,
            compatibility: &report,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Name:    {}", info.name.as_deref().unwrap_or("(unnamed)"));
    if let Some(version) = info.version {
        println!("Version: {}.{}", version.major, version.minor);
    }
    println!("Presets: {}", info.presets.len());
    for preset in &info.presets {
        println!("  {:>3}:{:<3}  {}", preset.bank, preset.program, preset.name);
    }

    for program in &report.missing_programs {
        println!("Missing: {}", Program::new(*program)?);
    }
    if report.needs_percussion && !report.has_percussion_kit {
        println!("Missing: percussion kit (bank 128)");
    }
    if report.is_compatible() {
        println!("All instruments in use are covered");
    }
    Ok(())
}

async fn upload(ctx: &AdminContext, bucket: &str, path: &Path) -> Result<StoredObject> {
    ctx.store
        .upload_file(bucket, path)
        .await
        .with_context(|| format!("Failed to upload {}", path.display()))
}

/// Best-effort cleanup of an upload whose database row was not written
async fn discard(ctx: &AdminContext, object: Option<&StoredObject>) {
    let Some(object) = object else { return };
    if let Err(e) = ctx.store.remove(&object.bucket, &object.object).await {
        warn!(object = %object.object, error = %e, "Failed to clean up upload");
    }
}

/// Remove the stored file behind a content URL; external URLs are left alone
async fn remove_media(ctx: &AdminContext, url: &str) {
    match ctx.store.remove_by_url(url).await {
        Ok(true) => {}
        Ok(false) => warn!(url, "Media not in bucket storage, left in place"),
        Err(e) => warn!(url, error = %e, "Failed to remove media"),
    }
}

fn title_or_stem(title: Option<String>, path: &Path) -> String {
    title.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    })
}

fn print_list<T: Serialize>(ctx: &AdminContext, items: &[T], line: impl Fn(&T) -> String) -> Result<()> {
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(items)?);
    } else if items.is_empty() {
        println!("(none)");
    } else {
        for item in items {
            println!("{}", line(item));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use folio_common::db::init_memory_database;
    use tempfile::TempDir;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(subcommand)]
        command: Command,
    }

    fn parse(args: &[&str]) -> Command {
        let mut argv = vec!["folio-admin"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().command
    }

    async fn context(dir: &TempDir) -> AdminContext {
        AdminContext {
            db: init_memory_database().await.unwrap(),
            store: BucketStore::new(dir.path().join("buckets"), "https://cdn.example.com/public"),
            json: false,
        }
    }

    #[test]
    fn test_instrument_arguments_accept_names() {
        match parse(&["tab", "add", "waltz.gp5", "--instrument", "nylon"]) {
            Command::Tab(TabCommand::Add { instrument, .. }) => {
                assert_eq!(instrument.map(Program::number), Some(24));
            }
            other => panic!("unexpected {:?}", other),
        }

        match parse(&["settings", "set-instrument", "25"]) {
            Command::Settings(SettingsCommand::SetInstrument { instrument }) => {
                assert_eq!(instrument.number(), 25);
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(TestCli::try_parse_from(["folio-admin", "settings", "set-instrument", "200"]).is_err());
    }

    #[test]
    fn test_tuning_flags() {
        match parse(&["settings", "set-tuning", "--glitch-threshold-ms", "750"]) {
            Command::Settings(SettingsCommand::SetTuning(args)) => {
                assert_eq!(args.glitch_threshold_ms, Some(750));
                assert_eq!(args.reassert_delay_ms, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_track_add_and_remove_cleans_up() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir).await;
        let audio = dir.path().join("Night Drive.mp3");
        std::fs::write(&audio, b"ID3").unwrap();

        run(
            Command::Track(TrackCommand::Add {
                file: audio,
                title: None,
                description: Some("  ".to_string()),
                cover: None,
                duration_ms: Some(215_000),
            }),
            &ctx,
        )
        .await
        .unwrap();

        let listed = tracks::list_tracks(&ctx.db).await.unwrap();
        assert_eq!(listed.len(), 1);
        let track = &listed[0];
        assert_eq!(track.title, "Night Drive");
        assert_eq!(track.description, None);
        assert!(track.audio_url.starts_with("https://cdn.example.com/public/tracks/"));
        assert_eq!(ctx.store.list(TRACKS_BUCKET).await.unwrap().len(), 1);

        comments::add_comment(&ctx.db, CommentTarget::Track, track.id, "Ana", "Great!")
            .await
            .unwrap();

        run(Command::Track(TrackCommand::Remove { id: track.id }), &ctx)
            .await
            .unwrap();
        assert!(tracks::list_tracks(&ctx.db).await.unwrap().is_empty());
        assert!(ctx.store.list(TRACKS_BUCKET).await.unwrap().is_empty());
        assert!(comments::list_all_comments(&ctx.db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_unknown_track_fails() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir).await;
        let result = run(Command::Track(TrackCommand::Remove { id: Uuid::new_v4() }), &ctx).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_missing_upload_file_fails_without_row() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir).await;
        let result = run(
            Command::Food(FoodCommand::Add {
                image: dir.path().join("missing.jpg"),
                title: None,
                description: None,
            }),
            &ctx,
        )
        .await;
        assert!(result.is_err());
        assert!(food::list_food_items(&ctx.db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_tuning_keeps_unspecified_values() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir).await;

        run(
            Command::Settings(SettingsCommand::SetTuning(TuningArgs {
                glitch_threshold_ms: Some(800),
                reassert_delay_ms: None,
                pause_glitch_window_ms: None,
                resume_guard_timeout_ms: None,
            })),
            &ctx,
        )
        .await
        .unwrap();

        let tuning = settings::load_playback_tuning(&ctx.db).await.unwrap();
        assert_eq!(tuning.glitch_threshold_ms, 800);
        assert_eq!(tuning.reassert_delay_ms, PlaybackTuning::default().reassert_delay_ms);
    }

    #[tokio::test]
    async fn test_set_soundfont_rejects_non_soundfont() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir).await;
        let file = dir.path().join("font.sf2");
        std::fs::write(&file, b"not a soundfont at all").unwrap();

        let result = run(Command::Settings(SettingsCommand::SetSoundfont { file }), &ctx).await;
        assert!(result.is_err());
        assert!(ctx.store.list(SOUNDFONTS_BUCKET).await.unwrap().is_empty());
        assert_eq!(settings::get_active_soundfont_url(&ctx.db).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_page_remove_missing_key_fails() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir).await;
        run(
            Command::Page(PageCommand::Set {
                key: "home.intro".to_string(),
                value: "Hi, I play guitar and cook.".to_string(),
            }),
            &ctx,
        )
        .await
        .unwrap();

        run(Command::Page(PageCommand::Remove { key: "home.intro".to_string() }), &ctx)
            .await
            .unwrap();
        assert!(run(Command::Page(PageCommand::Remove { key: "home.intro".to_string() }), &ctx)
            .await
            .is_err());
    }
}
