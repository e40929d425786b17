//! Error types for folio-player

use thiserror::Error;

use crate::engine::EngineError;
use crate::soundfont::SoundFontError;

#[derive(Error, Debug)]
pub enum PlayerError {
    /// Engine rejected a command that cannot be silently skipped
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// MIDI program outside 0-127 or unknown instrument name
    #[error("Invalid MIDI program: {0}")]
    InvalidProgram(String),

    #[error("SoundFont error: {0}")]
    SoundFont(#[from] SoundFontError),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] folio_common::Error),
}

pub type Result<T> = std::result::Result<T, PlayerError>;
