//! # Folio Common Library
//!
//! Shared code for the portfolio crates:
//! - Content tables and settings (SQLite via sqlx)
//! - Bucket storage for uploaded media
//! - Event types (FolioEvent enum) and EventBus
//! - Configuration loading

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod storage;

pub use error::{Error, Result};
pub use events::{EventBus, FolioEvent, PlaybackState};
