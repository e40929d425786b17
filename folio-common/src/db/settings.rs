//! Site-wide settings
//!
//! Values live as text in the `settings` table. All settings are site-wide: the active soundfont, the default
//! synthesizer instrument and the playback reconciliation tuning.

use crate::error::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use tracing::info;

pub const KEY_ACTIVE_SOUNDFONT_URL: &str = "active_soundfont_url";
pub const KEY_DEFAULT_INSTRUMENT: &str = "default_instrument";
pub const KEY_GLITCH_THRESHOLD_MS: &str = "playback_glitch_threshold_ms";
pub const KEY_REASSERT_DELAY_MS: &str = "playback_reassert_delay_ms";
pub const KEY_PAUSE_GLITCH_WINDOW_MS: &str = "playback_pause_glitch_window_ms";
pub const KEY_RESUME_GUARD_TIMEOUT_MS: &str = "playback_resume_guard_timeout_ms";
pub const KEY_PLAYBACK_SPEED: &str = "playback_speed";

/// Acoustic Guitar (steel)
pub const DEFAULT_INSTRUMENT: u8 = 25;
pub const DEFAULT_GLITCH_THRESHOLD_MS: u64 = 500;
pub const DEFAULT_REASSERT_DELAY_MS: u64 = 30;
pub const DEFAULT_PAUSE_GLITCH_WINDOW_MS: u64 = 500;
pub const DEFAULT_RESUME_GUARD_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_PLAYBACK_SPEED: f64 = 1.0;

pub const MIN_PLAYBACK_SPEED: f64 = 0.25;
pub const MAX_PLAYBACK_SPEED: f64 = 2.0;

/// Position reconciliation timing
///
/// These are empirical values against one engine's observed behavior and
/// are stored in the database so they can be re-tuned per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackTuning {
    /// A report this far behind the last known position right after a
    /// resume is treated as a spurious rewind
    pub glitch_threshold_ms: u64,
    /// Delay before the position is asserted a second time after play
    pub reassert_delay_ms: u64,
    /// How long a pause keeps the one-shot backward-glitch suppression armed
    pub pause_glitch_window_ms: u64,
    /// Upper bound on how long the resume guard stays armed
    pub resume_guard_timeout_ms: u64,
}

impl Default for PlaybackTuning {
    fn default() -> Self {
        Self {
            glitch_threshold_ms: DEFAULT_GLITCH_THRESHOLD_MS,
            reassert_delay_ms: DEFAULT_REASSERT_DELAY_MS,
            pause_glitch_window_ms: DEFAULT_PAUSE_GLITCH_WINDOW_MS,
            resume_guard_timeout_ms: DEFAULT_RESUME_GUARD_TIMEOUT_MS,
        }
    }
}

/// Get active soundfont URL (None if the engine's bundled font is used)
pub async fn get_active_soundfont_url(db: &Pool<Sqlite>) -> Result<Option<String>> {
    Ok(get_setting::<String>(db, KEY_ACTIVE_SOUNDFONT_URL)
        .await?
        .filter(|url| !url.is_empty()))
}

/// Set active soundfont URL
pub async fn set_active_soundfont_url(db: &Pool<Sqlite>, url: &str) -> Result<()> {
    let url = url.trim();
    if url.is_empty() {
        return Err(Error::InvalidInput("Soundfont URL is empty".to_string()));
    }
    set_setting(db, KEY_ACTIVE_SOUNDFONT_URL, url).await
}

/// Get default synthesizer instrument (General MIDI program 0-127)
pub async fn get_default_instrument(db: &Pool<Sqlite>) -> Result<u8> {
    match get_setting::<u8>(db, KEY_DEFAULT_INSTRUMENT).await? {
        Some(program) if program <= 127 => Ok(program),
        _ => Ok(DEFAULT_INSTRUMENT),
    }
}

/// Set default synthesizer instrument
pub async fn set_default_instrument(db: &Pool<Sqlite>, program: u8) -> Result<()> {
    if program > 127 {
        return Err(Error::InvalidInput(format!(
            "MIDI program must be 0-127, got {}",
            program
        )));
    }
    set_setting(db, KEY_DEFAULT_INSTRUMENT, program).await
}

/// Get playback speed multiplier, clamped to the supported range
pub async fn get_playback_speed(db: &Pool<Sqlite>) -> Result<f64> {
    Ok(get_setting::<f64>(db, KEY_PLAYBACK_SPEED)
        .await?
        .filter(|speed| speed.is_finite())
        .map(clamp_playback_speed)
        .unwrap_or(DEFAULT_PLAYBACK_SPEED))
}

/// Set playback speed multiplier (clamped)
pub async fn set_playback_speed(db: &Pool<Sqlite>, speed: f64) -> Result<()> {
    if !speed.is_finite() {
        return Err(Error::InvalidInput("Playback speed must be finite".to_string()));
    }
    set_setting(db, KEY_PLAYBACK_SPEED, clamp_playback_speed(speed)).await
}

pub fn clamp_playback_speed(speed: f64) -> f64 {
    speed.clamp(MIN_PLAYBACK_SPEED, MAX_PLAYBACK_SPEED)
}

/// Load reconciliation timing from settings table
///
/// Missing keys fall back to defaults; stored values are clamped:
/// - glitch threshold: 50-5000ms
/// - re-assertion delay: 0-1000ms
/// - pause glitch window: 10-5000ms
/// - resume guard timeout: 50-10000ms
pub async fn load_playback_tuning(db: &Pool<Sqlite>) -> Result<PlaybackTuning> {
    let defaults = PlaybackTuning::default();

    let glitch_threshold_ms = get_setting::<u64>(db, KEY_GLITCH_THRESHOLD_MS)
        .await?
        .map(|v| v.clamp(50, 5000))
        .unwrap_or(defaults.glitch_threshold_ms);
    let reassert_delay_ms = get_setting::<u64>(db, KEY_REASSERT_DELAY_MS)
        .await?
        .map(|v| v.clamp(0, 1000))
        .unwrap_or(defaults.reassert_delay_ms);
    let pause_glitch_window_ms = get_setting::<u64>(db, KEY_PAUSE_GLITCH_WINDOW_MS)
        .await?
        .map(|v| v.clamp(10, 5000))
        .unwrap_or(defaults.pause_glitch_window_ms);
    let resume_guard_timeout_ms = get_setting::<u64>(db, KEY_RESUME_GUARD_TIMEOUT_MS)
        .await?
        .map(|v| v.clamp(50, 10_000))
        .unwrap_or(defaults.resume_guard_timeout_ms);

    Ok(PlaybackTuning {
        glitch_threshold_ms,
        reassert_delay_ms,
        pause_glitch_window_ms,
        resume_guard_timeout_ms,
    })
}

/// Persist reconciliation timing
pub async fn save_playback_tuning(db: &Pool<Sqlite>, tuning: &PlaybackTuning) -> Result<()> {
    set_setting(db, KEY_GLITCH_THRESHOLD_MS, tuning.glitch_threshold_ms).await?;
    set_setting(db, KEY_REASSERT_DELAY_MS, tuning.reassert_delay_ms).await?;
    set_setting(db, KEY_PAUSE_GLITCH_WINDOW_MS, tuning.pause_glitch_window_ms).await?;
    set_setting(db, KEY_RESUME_GUARD_TIMEOUT_MS, tuning.resume_guard_timeout_ms).await?;
    Ok(())
}

/// All settings as (key, value) pairs, sorted by key
pub async fn list_settings(db: &Pool<Sqlite>) -> Result<Vec<(String, Option<String>)>> {
    let rows: Vec<(String, Option<String>)> =
        sqlx::query_as("SELECT key, value FROM settings ORDER BY key")
            .fetch_all(db)
            .await?;
    Ok(rows)
}

/// Typed read of one setting
///
/// None when the key is absent or NULL; an unparseable value is a
/// `Config` error.
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(db)
            .await?;

    match value.flatten() {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Upsert one setting
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    let value_str = value.to_string();

    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value_str)
    .execute(db)
    .await?;

    Ok(())
}

/// Seed default settings, resetting NULL values
pub(crate) async fn init_default_settings(db: &Pool<Sqlite>) -> Result<()> {
    ensure_setting(db, KEY_DEFAULT_INSTRUMENT, &DEFAULT_INSTRUMENT.to_string()).await?;
    ensure_setting(db, KEY_PLAYBACK_SPEED, &DEFAULT_PLAYBACK_SPEED.to_string()).await?;
    ensure_setting(db, KEY_GLITCH_THRESHOLD_MS, &DEFAULT_GLITCH_THRESHOLD_MS.to_string()).await?;
    ensure_setting(db, KEY_REASSERT_DELAY_MS, &DEFAULT_REASSERT_DELAY_MS.to_string()).await?;
    ensure_setting(
        db,
        KEY_PAUSE_GLITCH_WINDOW_MS,
        &DEFAULT_PAUSE_GLITCH_WINDOW_MS.to_string(),
    )
    .await?;
    ensure_setting(
        db,
        KEY_RESUME_GUARD_TIMEOUT_MS,
        &DEFAULT_RESUME_GUARD_TIMEOUT_MS.to_string(),
    )
    .await?;
    Ok(())
}

async fn ensure_setting(db: &Pool<Sqlite>, key: &str, default_value: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO settings (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        WHERE settings.value IS NULL
        "#,
    )
    .bind(key)
    .bind(default_value)
    .execute(db)
    .await?;

    if result.rows_affected() > 0 {
        info!("Initialized setting '{}' with default value: {}", key, default_value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_database;

    #[tokio::test]
    async fn test_defaults_seeded() {
        let db = init_memory_database().await.unwrap();

        assert_eq!(get_default_instrument(&db).await.unwrap(), DEFAULT_INSTRUMENT);
        assert_eq!(get_playback_speed(&db).await.unwrap(), 1.0);
        assert_eq!(load_playback_tuning(&db).await.unwrap(), PlaybackTuning::default());
        assert_eq!(get_active_soundfont_url(&db).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_default_instrument_get_set() {
        let db = init_memory_database().await.unwrap();

        set_default_instrument(&db, 29).await.unwrap();
        assert_eq!(get_default_instrument(&db).await.unwrap(), 29);

        let err = set_default_instrument(&db, 128).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(get_default_instrument(&db).await.unwrap(), 29);
    }

    #[tokio::test]
    async fn test_soundfont_url_get_set() {
        let db = init_memory_database().await.unwrap();

        set_active_soundfont_url(&db, "  https://cdn.example.com/fonts/sonivox.sf2 ")
            .await
            .unwrap();
        assert_eq!(
            get_active_soundfont_url(&db).await.unwrap().as_deref(),
            Some("https://cdn.example.com/fonts/sonivox.sf2")
        );

        assert!(set_active_soundfont_url(&db, "   ").await.is_err());
    }

    #[tokio::test]
    async fn test_playback_speed_clamped() {
        let db = init_memory_database().await.unwrap();

        set_playback_speed(&db, 0.5).await.unwrap();
        assert_eq!(get_playback_speed(&db).await.unwrap(), 0.5);

        set_playback_speed(&db, 8.0).await.unwrap();
        assert_eq!(get_playback_speed(&db).await.unwrap(), MAX_PLAYBACK_SPEED);

        // Out-of-range value written behind our back is clamped on read
        set_setting(&db, KEY_PLAYBACK_SPEED, 0.01).await.unwrap();
        assert_eq!(get_playback_speed(&db).await.unwrap(), MIN_PLAYBACK_SPEED);

        assert!(set_playback_speed(&db, f64::NAN).await.is_err());
    }

    #[tokio::test]
    async fn test_playback_tuning_roundtrip_and_clamp() {
        let db = init_memory_database().await.unwrap();

        let tuning = PlaybackTuning {
            glitch_threshold_ms: 750,
            reassert_delay_ms: 50,
            pause_glitch_window_ms: 300,
            resume_guard_timeout_ms: 2000,
        };
        save_playback_tuning(&db, &tuning).await.unwrap();
        assert_eq!(load_playback_tuning(&db).await.unwrap(), tuning);

        set_setting(&db, KEY_GLITCH_THRESHOLD_MS, 1).await.unwrap();
        set_setting(&db, KEY_REASSERT_DELAY_MS, 99_999).await.unwrap();
        let clamped = load_playback_tuning(&db).await.unwrap();
        assert_eq!(clamped.glitch_threshold_ms, 50);
        assert_eq!(clamped.reassert_delay_ms, 1000);
    }

    #[tokio::test]
    async fn test_generic_setting_get_set() {
        let db = init_memory_database().await.unwrap();

        set_setting(&db, "test_int", 42).await.unwrap();
        let value: Option<i32> = get_setting(&db, "test_int").await.unwrap();
        assert_eq!(value, Some(42));

        // Update value (UPSERT)
        set_setting(&db, "test_int", 43).await.unwrap();
        let value: Option<i32> = get_setting(&db, "test_int").await.unwrap();
        assert_eq!(value, Some(43));

        // Non-existent key should return None
        let value: Option<String> = get_setting(&db, "nonexistent").await.unwrap();
        assert_eq!(value, None);

        // Unparseable value is a config error
        set_setting(&db, "test_int", "forty-two").await.unwrap();
        let result: Result<Option<i32>> = get_setting(&db, "test_int").await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_null_value_reset_by_init() {
        let db = init_memory_database().await.unwrap();

        sqlx::query("UPDATE settings SET value = NULL WHERE key = ?")
            .bind(KEY_DEFAULT_INSTRUMENT)
            .execute(&db)
            .await
            .unwrap();
        init_default_settings(&db).await.unwrap();

        let value: Option<u8> = get_setting(&db, KEY_DEFAULT_INSTRUMENT).await.unwrap();
        assert_eq!(value, Some(DEFAULT_INSTRUMENT));
    }
}
